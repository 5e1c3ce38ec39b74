use serde::{Deserialize, Serialize};

use super::ordered_map::{ordered_maps_equal, OrderedMap};

/// A reference to a document that is either an external file location or an
/// embedded ordered mapping — exactly one must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DocumentRef {
    Location(String),
    Content(OrderedMap),
}

impl DocumentRef {
    pub fn location(&self) -> Option<&str> {
        match self {
            DocumentRef::Location(l) => Some(l),
            DocumentRef::Content(_) => None,
        }
    }

    pub fn content(&self) -> Option<&OrderedMap> {
        match self {
            DocumentRef::Content(c) => Some(c),
            DocumentRef::Location(_) => None,
        }
    }
}

impl PartialEq for DocumentRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DocumentRef::Location(a), DocumentRef::Location(b)) => a == b,
            (DocumentRef::Content(a), DocumentRef::Content(b)) => ordered_maps_equal(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_variants_compare_by_value() {
        let a = DocumentRef::Location("s3://bucket/policy.json".to_string());
        let b = DocumentRef::Location("s3://bucket/policy.json".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn mixed_variants_never_equal() {
        let a = DocumentRef::Location("s3://bucket/policy.json".to_string());
        let b = DocumentRef::Content(OrderedMap::new());
        assert_ne!(a, b);
    }
}
