use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ordered_map::OrderedMap;

/// Per-region stack-provisioner parameters attached to an account. The
/// engine validates shape only and preserves the mapping verbatim on
/// round-trip; it never interprets `parameters` (the stack provisioner
/// that would is out of scope).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegionSpec {
    #[serde(default)]
    pub parameters: OrderedMap,
}

/// `Account.regions`: region name -> parameters.
pub type Regions = IndexMap<String, RegionSpec>;
