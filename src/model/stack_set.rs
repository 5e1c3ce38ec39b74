use serde::{Deserialize, Serialize};

use crate::value_objects::DocumentRef;

/// A named target (account, orgunit, or group) a [`StackSet`] deploys into,
/// with the regions to deploy in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackTarget {
    pub name: String,
    pub regions: Vec<String>,
}

/// A cross-account stack-template resource. Validated by
/// referential integrity only; actual stack convergence is out of scope
/// and is represented here only insofar as needed to validate
/// references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackSet {
    pub name: String,
    pub template: DocumentRef,
    #[serde(default)]
    pub accounts: Vec<StackTarget>,
    #[serde(default)]
    pub orgunits: Vec<StackTarget>,
    #[serde(default)]
    pub groups: Vec<StackTarget>,
}

impl StackSet {
    pub fn all_targets(&self) -> impl Iterator<Item = &StackTarget> {
        self.accounts
            .iter()
            .chain(self.orgunits.iter())
            .chain(self.groups.iter())
    }
}
