use serde::{Deserialize, Serialize};

use crate::value_objects::DocumentRef;

/// A service-control policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub document: DocumentRef,
    /// Declared as metadata; mandatory when loaded from the provider.
    /// `None` on a freshly declared policy means "not yet known",
    /// which the Differ treats as `false` for the skip rule.
    #[serde(default)]
    pub aws_managed: Option<bool>,
}

impl Policy {
    pub fn is_aws_managed(&self) -> bool {
        self.aws_managed.unwrap_or(false)
    }
}

/// Well-known AWS-managed SCP names the Validator accepts as policy
/// references even though they never appear in `Organization.policies`.
pub const AWS_MANAGED_POLICY_NAMES: &[&str] = &[
    "FullAWSAccess",
    "DenyAllServices",
    "RestrictedAccessPolicy",
];

pub fn is_known_policy_name(name: &str) -> bool {
    AWS_MANAGED_POLICY_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_aws_access_is_a_known_policy_name() {
        assert!(is_known_policy_name("FullAWSAccess"));
        assert!(!is_known_policy_name("my-custom-scp"));
    }
}
