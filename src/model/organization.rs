use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::model::{Account, OrgUnit, Policy, StackSet};
use crate::value_objects::{FeatureSet, ModelSource, ProvisionerConfig};

/// Provider-assigned child ids of a parent, split by kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChildIds {
    pub orgunit_ids: HashSet<String>,
    pub account_ids: HashSet<String>,
}

/// The Organization aggregate: the root of both the declared and the actual
/// model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub root_account_id: String,
    #[serde(default)]
    pub feature_set: FeatureSet,
    pub source: ModelSource,
    /// Meaningful on `actual` only.
    #[serde(default)]
    pub exists: bool,
    /// Populated by the Loader on `actual`.
    #[serde(default)]
    pub root_parent_id: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub root_policies: IndexSet<String>,
    #[serde(default)]
    pub provisioner: ProvisionerConfig,

    #[serde(default)]
    pub accounts: IndexMap<String, Account>,
    #[serde(default)]
    pub orgunits: IndexMap<String, OrgUnit>,
    #[serde(default)]
    pub policies: IndexMap<String, Policy>,
    #[serde(default)]
    pub stacks: IndexMap<String, StackSet>,

    /// Derived indices, built by the Loader only.
    #[serde(default, skip_serializing)]
    pub account_ids_to_names: HashMap<String, String>,
    #[serde(default, skip_serializing)]
    pub orgunit_ids_to_names: HashMap<String, String>,
    #[serde(default, skip_serializing)]
    pub ids_to_children: HashMap<String, ChildIds>,
}

impl Organization {
    pub fn declared(root_account_id: impl Into<String>) -> Self {
        Self::new(root_account_id, ModelSource::Declared)
    }

    /// An empty `actual` model, ready for the Loader to populate.
    pub fn actual(root_account_id: impl Into<String>) -> Self {
        Self::new(root_account_id, ModelSource::Actual)
    }

    fn new(root_account_id: impl Into<String>, source: ModelSource) -> Self {
        Self {
            root_account_id: root_account_id.into(),
            feature_set: FeatureSet::default(),
            source,
            exists: false,
            root_parent_id: None,
            org_id: None,
            root_policies: IndexSet::new(),
            provisioner: ProvisionerConfig::default(),
            accounts: IndexMap::new(),
            orgunits: IndexMap::new(),
            policies: IndexMap::new(),
            stacks: IndexMap::new(),
            account_ids_to_names: HashMap::new(),
            orgunit_ids_to_names: HashMap::new(),
            ids_to_children: HashMap::new(),
        }
    }

    pub fn is_declared(&self) -> bool {
        self.source == ModelSource::Declared
    }

    pub fn is_actual(&self) -> bool {
        self.source == ModelSource::Actual
    }

    pub fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.get(name)
    }

    pub fn orgunit(&self, name: &str) -> Option<&OrgUnit> {
        self.orgunits.get(name)
    }

    pub fn policy(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    pub fn stack(&self, name: &str) -> Option<&StackSet> {
        self.stacks.get(name)
    }

    /// A deep copy used by the ConvergenceDriver as the `updated` staging
    /// model.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_model_starts_empty_and_nonexistent() {
        let org = Organization::declared("123456789012");
        assert!(org.is_declared());
        assert!(!org.exists);
        assert!(org.accounts.is_empty());
    }

    #[test]
    fn snapshot_is_an_independent_deep_copy() {
        let mut org = Organization::actual("123456789012");
        org.accounts
            .insert("a".into(), Account::new("a", "a@example.com"));
        let snap = org.snapshot();
        org.accounts
            .insert("b".into(), Account::new("b", "b@example.com"));
        assert_eq!(snap.accounts.len(), 1);
        assert_eq!(org.accounts.len(), 2);
    }
}
