use serde::{Deserialize, Serialize};

/// Whether an [`crate::model::Organization`] was built from a declared
/// document or discovered from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSource {
    Declared,
    Actual,
}
