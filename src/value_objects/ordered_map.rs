//! Ordered-mapping alias used wherever key order from the source document
//! must be preserved on round-trip.

use indexmap::IndexMap;
use serde_yaml::Value;

/// A YAML mapping that remembers the order its keys were declared in.
pub type OrderedMap = IndexMap<String, Value>;

/// Order-insensitive deep equality for two ordered mappings, used by the
/// Differ's comparable-attribute-set equality where *unordered*
/// collections compare equal regardless of order but *ordered* mapping
/// values (policy documents) must still compare their own key order.
pub fn ordered_maps_equal(a: &OrderedMap, b: &OrderedMap) -> bool {
    a.len() == b.len() && a.iter().eq(b.iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_order_and_equal_values() {
        let mut a = OrderedMap::new();
        a.insert("x".into(), Value::from(1));
        a.insert("y".into(), Value::from(2));
        let mut b = OrderedMap::new();
        b.insert("x".into(), Value::from(1));
        b.insert("y".into(), Value::from(2));
        assert!(ordered_maps_equal(&a, &b));
    }

    #[test]
    fn different_order_is_not_equal() {
        let mut a = OrderedMap::new();
        a.insert("x".into(), Value::from(1));
        a.insert("y".into(), Value::from(2));
        let mut b = OrderedMap::new();
        b.insert("y".into(), Value::from(2));
        b.insert("x".into(), Value::from(1));
        assert!(!ordered_maps_equal(&a, &b));
    }
}
