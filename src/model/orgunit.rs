use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// An organizational unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgUnit {
    pub name: String,
    /// Provider-assigned id; present on `actual` models only.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub child_orgunits: HashSet<String>,
    #[serde(default)]
    pub accounts: HashSet<String>,
    #[serde(default)]
    pub policies: HashSet<String>,
    /// Derived by the Validator; names of orgunits
    /// claiming this orgunit as a child, in discovery order. At most one
    /// entry on a valid model.
    #[serde(default, skip_serializing)]
    pub parent_references: Vec<String>,
}

impl OrgUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            child_orgunits: HashSet::new(),
            accounts: HashSet::new(),
            policies: HashSet::new(),
            parent_references: Vec::new(),
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_references.is_empty()
    }

    pub fn has_multiple_parents(&self) -> bool {
        self.parent_references.len() > 1
    }
}
