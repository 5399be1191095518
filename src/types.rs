//! Core domain types for kingraph.
//!
//! A [`NodeRecord`] is the normalised form of one node-shaped JSON object
//! from the remote API: the fields the traversals need (id, generation,
//! parent references) are lifted out, everything else rides along in
//! `payload` untouched.

use serde::Serialize;
use serde_json::{Map, Value};

/// Remote node identifier. Always positive; `0` is treated as "no node".
pub type NodeId = u64;

// ---------------------------------------------------------------------------
// NodeRecord
// ---------------------------------------------------------------------------

/// One fetched node. Immutable once cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub generation: Option<u32>,
    pub matron_id: Option<NodeId>,
    pub sire_id: Option<NodeId>,
    /// Every other field of the fetched object, passed through unmodified.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

const MATRON_KEYS: &[&str] = &["matron_id", "matronId"];
const SIRE_KEYS: &[&str] = &["sire_id", "sireId"];
const GENERATION_KEYS: &[&str] = &["generation", "gen"];
const CANONICAL_KEYS: &[&str] = &["matron_id", "sire_id", "generation"];

impl NodeRecord {
    /// Build a bare record with no payload.
    pub fn new(id: NodeId, matron_id: Option<NodeId>, sire_id: Option<NodeId>) -> Self {
        Self {
            id,
            generation: None,
            matron_id,
            sire_id,
            payload: Map::new(),
        }
    }

    /// Normalise a node-shaped JSON value.
    ///
    /// Returns `None` when the value is not an object or has no usable id.
    /// Malformed parent references are dropped (treated as "no edge").
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut obj) = value else {
            return None;
        };
        let id = obj.get("id").and_then(as_node_id)?;
        obj.remove("id");

        let matron_id = parent_reference(&obj, MATRON_KEYS, "matron");
        let sire_id = parent_reference(&obj, SIRE_KEYS, "sire");

        let generation = GENERATION_KEYS
            .iter()
            .find_map(|key| obj.get(*key).and_then(as_generation));

        // the typed fields serialize under these names; aliases stay put
        for key in CANONICAL_KEYS {
            obj.remove(*key);
        }

        Some(Self {
            id,
            generation,
            matron_id,
            sire_id,
            payload: obj,
        })
    }

    /// Parent ids that are present, matron first.
    pub fn parent_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.matron_id.into_iter().chain(self.sire_id)
    }
}

/// Read a parent reference from the flat keys, falling back to a nested
/// `{ "<nested>": { "id": .. } }` object.
fn parent_reference(obj: &Map<String, Value>, flat_keys: &[&str], nested: &str) -> Option<NodeId> {
    if let Some(id) = flat_keys.iter().find_map(|key| obj.get(*key).and_then(as_node_id)) {
        return Some(id);
    }
    obj.get(nested)
        .and_then(|v| v.get("id"))
        .and_then(as_node_id)
}

/// Interpret a JSON value as a node id: positive integers or numeric strings.
pub fn as_node_id(value: &Value) -> Option<NodeId> {
    let id = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<NodeId>().ok()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

fn as_generation(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|g| u32::try_from(g).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// DepthBudget
// ---------------------------------------------------------------------------

/// Remaining hops a pending expansion may take toward ancestors and
/// descendants. The two counters are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct DepthBudget {
    pub parents: u32,
    pub children: u32,
}

impl DepthBudget {
    pub fn new(parents: u32, children: u32) -> Self {
        Self { parents, children }
    }

    /// `true` when `self` is at least as deep as `other` in both directions.
    pub fn covers(&self, other: &Self) -> bool {
        self.parents >= other.parents && self.children >= other.children
    }

    /// Elementwise maximum.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            parents: self.parents.max(other.parents),
            children: self.children.max(other.children),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn parses_flat_parent_ids() {
        let rec = NodeRecord::from_value(json!({
            "id": 42, "matron_id": 7, "sire_id": 9, "generation": 3, "name": "Whiskers"
        }))
        .unwrap();
        assert_eq!(rec.id, 42);
        assert_eq!(rec.matron_id, Some(7));
        assert_eq!(rec.sire_id, Some(9));
        assert_eq!(rec.generation, Some(3));
        assert_eq!(rec.payload.get("name"), Some(&json!("Whiskers")));
        assert!(!rec.payload.contains_key("matron_id"));
    }

    #[test]
    fn parses_nested_parent_objects() {
        let rec = NodeRecord::from_value(json!({
            "id": "100",
            "matron": {"id": 5, "name": "Mom"},
            "sire": {"id": "6"},
            "gen": 2
        }))
        .unwrap();
        assert_eq!(rec.id, 100);
        assert_eq!(rec.matron_id, Some(5));
        assert_eq!(rec.sire_id, Some(6));
        assert_eq!(rec.generation, Some(2));
        // nested objects and aliases are opaque payload
        assert!(rec.payload.contains_key("matron"));
        assert_eq!(rec.payload.get("gen"), Some(&json!(2)));
    }

    #[test]
    fn camel_case_keys_are_accepted() {
        let rec = NodeRecord::from_value(json!({"id": 1, "matronId": 2, "sireId": 3})).unwrap();
        assert_eq!(rec.parent_ids().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn alias_keys_pass_through_untouched() {
        let rec = NodeRecord::from_value(json!({"id": 1, "matronId": 2, "sireId": "3", "gen": 4})).unwrap();
        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            out,
            json!({
                "id": 1, "generation": 4, "matron_id": 2, "sire_id": 3,
                "matronId": 2, "sireId": "3", "gen": 4
            })
        );
        let again = NodeRecord::from_value(out).unwrap();
        assert_eq!(again, rec);
    }

    #[test]
    fn malformed_parents_are_dropped() {
        let rec = NodeRecord::from_value(json!({
            "id": 1, "matronId": "abc", "sire_id": 0, "matron": null
        }))
        .unwrap();
        assert_eq!(rec.parent_ids().count(), 0);
        // unusable alias values stay in the payload untouched
        assert_eq!(rec.payload.get("matronId"), Some(&json!("abc")));
        assert!(!rec.payload.contains_key("sire_id"));
    }

    #[test_case(json!({"name": "x"}) ; "missing id")]
    #[test_case(json!({"id": 0}) ; "zero id")]
    #[test_case(json!({"id": -4}) ; "negative id")]
    #[test_case(json!({"id": 1.5}) ; "fractional id")]
    #[test_case(json!({"id": "x12"}) ; "non numeric string")]
    #[test_case(json!([1, 2]) ; "not an object")]
    fn rejects_records_without_usable_id(value: Value) {
        assert!(NodeRecord::from_value(value).is_none());
    }

    #[test]
    fn serializes_normalised_fields_and_payload() {
        let rec = NodeRecord::from_value(json!({"id": 3, "sire_id": 1, "color": "mintgreen"})).unwrap();
        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            out,
            json!({"id": 3, "generation": null, "matron_id": null, "sire_id": 1, "color": "mintgreen"})
        );
    }

    #[test]
    fn reparsing_serialized_record_is_stable() {
        let rec = NodeRecord::from_value(json!({"id": 8, "gen": "x", "hue": 3})).unwrap();
        let again = NodeRecord::from_value(serde_json::to_value(&rec).unwrap()).unwrap();
        assert_eq!(again, rec);
    }

    #[test]
    fn budget_merge_is_elementwise_max() {
        let a = DepthBudget::new(3, 0);
        let b = DepthBudget::new(1, 2);
        assert_eq!(a.merge(&b), DepthBudget::new(3, 2));
        assert!(a.merge(&b).covers(&a));
        assert!(a.merge(&b).covers(&b));
        assert!(!a.covers(&b));
    }
}
