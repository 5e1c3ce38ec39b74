//! Error taxonomy for the reconciliation engine.
//!
//! Each subsystem returns its own precise error type; [`EngineError`]
//! aggregates them with `#[from]` so the CLI boundary can match on a single
//! enum without the engine itself losing precision internally.

use thiserror::Error;

use crate::validator::ProblemReport;

/// Errors raised while loading or dumping a declared configuration document
/// for the declared-configuration codec.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{category}.{name}: missing required parameter `{parameter}`")]
    MissingRequiredParameter {
        category: String,
        name: String,
        parameter: String,
    },

    #[error("{category}.{name}: parameter `{parameter}` has the wrong type, expected {expected}")]
    ParameterTypeMismatch {
        category: String,
        name: String,
        parameter: String,
        expected: String,
    },

    #[error("{category}.{name}: more than one of {parameters:?} was specified, expected exactly one")]
    MultipleParametersSpecified {
        category: String,
        name: String,
        parameters: Vec<String>,
    },

    #[error("{category}.{name}: one of {parameters:?} is required")]
    OneOfMissing {
        category: String,
        name: String,
        parameters: Vec<String>,
    },

    #[error("duplicate name `{name}` in {category}")]
    DuplicateNames { category: String, name: String },

    #[error("unrecognised top-level key `{0}` in declared document")]
    UnrecognisedKey(String),

    #[error(transparent)]
    InvalidModel(#[from] InvalidModelError),
}

/// Raised by `ConfigCodec::dump` when the model fails validation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("model is not valid, cannot be dumped: {problems:?}")]
pub struct InvalidModelError {
    pub problems: ProblemReport,
}

/// Model-integrity errors for model-validation failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("organization is not valid: {0:?}")]
    InvalidOrganization(ProblemReport),

    #[error("orgunit hierarchy cycle detected: {0:?}")]
    OrgunitHierarchyCycle(Vec<String>),
}

impl ModelError {
    pub fn raise_if_invalid(problems: ProblemReport) -> Result<(), ModelError> {
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ModelError::InvalidOrganization(problems))
        }
    }
}

/// Transport-categorised errors returned by a [`crate::provider::ProviderClient`].
#[derive(Error, Debug, Clone, PartialEq)]
#[error("provider error [{code}]: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The well-known "entity does not exist" code the engine treats as
    /// benign on delete.
    pub const NOT_FOUND: &'static str = "ResourceNotFound";

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Self::NOT_FOUND, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Self::NOT_FOUND
    }

    pub const CANCELLED: &'static str = "Cancelled";

    pub fn cancelled() -> Self {
        Self::new(Self::CANCELLED, "operation cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == Self::CANCELLED
    }

    pub const UNIMPLEMENTED: &'static str = "Unimplemented";

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Self::UNIMPLEMENTED, message)
    }
}

/// Provider precondition errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderPreconditionError {
    #[error("declared root account {declared_root} is already a member of another organization (actual master is {actual_master})")]
    OrganizationMemberAccount {
        declared_root: String,
        actual_master: String,
    },

    #[error("operation `{0}` requires an actual (AWS-backed) model")]
    NotAwsModel(String),
}

/// Credential-related errors raised at session construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CredentialsError {
    #[error("access keys invalid for profile `{0}`")]
    AccessKeysInvalid(String),

    #[error("role name not specified for provisioner")]
    RoleNameNotSpecified,
}

/// The crate-wide error used at the CLI boundary only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Precondition(#[from] ProviderPreconditionError),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}
