use serde::{Deserialize, Serialize};

/// The capability level of an Organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSet {
    #[serde(rename = "ALL")]
    All,
    #[serde(rename = "CONSOLIDATED_BILLING")]
    ConsolidatedBilling,
}

impl Default for FeatureSet {
    fn default() -> Self {
        FeatureSet::All
    }
}

impl std::fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureSet::All => write!(f, "ALL"),
            FeatureSet::ConsolidatedBilling => write!(f, "CONSOLIDATED_BILLING"),
        }
    }
}
