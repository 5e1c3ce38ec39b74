use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::value_objects::Regions;

/// A member account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub name: String,
    pub owner_email: String,
    /// Mandatory on `actual` models, optional while declaring a new account
    /// (absence selects the `create` action in the Differ).
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub regions: Regions,
    #[serde(default)]
    pub policies: HashSet<String>,
    #[serde(default)]
    pub groups: HashSet<String>,
    /// Derived by the Validator; names of orgunits claiming this
    /// account as a child, in discovery order.
    #[serde(default, skip_serializing)]
    pub parent_references: Vec<String>,
}

impl Account {
    pub fn new(name: impl Into<String>, owner_email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_email: owner_email.into(),
            account_id: None,
            regions: Regions::default(),
            policies: HashSet::new(),
            groups: HashSet::new(),
            parent_references: Vec::new(),
        }
    }

    /// `root_account_id` is `Organization.root_account_id`; an account is
    /// the root account if its name or provider-assigned id matches it.
    pub fn is_root(&self, root_account_id: &str) -> bool {
        self.name == root_account_id || self.account_id.as_deref() == Some(root_account_id)
    }

    pub fn is_orphaned(&self, root_account_id: &str) -> bool {
        self.parent_references.is_empty() && !self.is_root(root_account_id)
    }

    pub fn has_multiple_parents(&self) -> bool {
        self.parent_references.len() > 1
    }
}
