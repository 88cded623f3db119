use std::collections::HashMap;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One fetched copy of a page's block/collection graph.
///
/// `block` keeps the provider's insertion order: rows are surfaced in the
/// order they appear here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordMap {
    #[serde(default, deserialize_with = "null_as_default")]
    pub block: IndexMap<String, Record<Block>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collection: IndexMap<String, Record<Collection>>,
}

/// A value that fails to decode is dropped on its own, leaving the rest of
/// the snapshot usable.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Record<T> {
    #[serde(default, deserialize_with = "lenient")]
    pub value: Option<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Block {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parent_id: String,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub view_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: HashMap<String, Value>,
    /// Epoch milliseconds.
    #[serde(default, deserialize_with = "millis")]
    pub created_time: Option<i64>,
}

impl Block {
    /// A database embedded in the page, inline or full-page.
    pub fn is_collection_view(&self) -> bool {
        matches!(self.kind.as_str(), "collection_view" | "collection_view_page")
    }

    pub fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Collection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub schema: IndexMap<String, PropertySchema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertySchema {
    #[serde(default)]
    pub name: String,
}

impl RecordMap {
    /// Blocks with a readable value, keyed by block id, in map order.
    pub fn blocks(&self) -> impl Iterator<Item = (&str, &Block)> {
        self.block
            .iter()
            .filter_map(|(id, rec)| rec.value.as_ref().map(|b| (id.as_str(), b)))
    }

    pub fn collection(&self, id: &str) -> Option<&Collection> {
        self.collection.get(id).and_then(|rec| rec.value.as_ref())
    }

    /// Fold a later response into this one. Existing keys keep their
    /// position; their values are replaced.
    pub fn merge(&mut self, other: RecordMap) {
        for (id, rec) in other.block {
            if rec.value.is_some() || !self.block.contains_key(&id) {
                self.block.insert(id, rec);
            }
        }
        for (id, rec) in other.collection {
            if rec.value.is_some() || !self.collection.contains_key(&id) {
                self.collection.insert(id, rec);
            }
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

/// Timestamps sometimes arrive as floats.
fn millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> RecordMap {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn keeps_block_order() {
        let map = parse(json!({
            "block": {
                "c": { "value": { "id": "c", "type": "page" } },
                "a": { "value": { "id": "a", "type": "page" } },
                "b": { "value": { "id": "b", "type": "page" } }
            }
        }));
        let ids: Vec<&str> = map.blocks().map(|(id, _)| id).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn tolerates_nulls_and_missing_values() {
        let map = parse(json!({
            "block": {
                "x": { "role": "none" },
                "y": { "value": { "id": "y", "type": "page", "properties": null, "parent_id": null } }
            },
            "collection": null
        }));
        assert_eq!(map.blocks().count(), 1);
        let (_, y) = map.blocks().next().unwrap();
        assert!(y.properties.is_empty());
        assert!(y.parent_id.is_empty());
        assert!(map.collection.is_empty());
    }

    #[test]
    fn bad_block_is_skipped_alone() {
        let map = parse(json!({
            "block": {
                "good": { "value": { "type": "page", "parent_id": "col" } },
                "odd": { "value": { "type": "text", "view_ids": "not-a-list" } },
                "worse": { "value": 42 },
                "after": { "value": { "type": "page", "parent_id": "col" } }
            }
        }));
        let ids: Vec<&str> = map.blocks().map(|(id, _)| id).collect();
        assert_eq!(ids, ["good", "after"]);
        assert_eq!(map.block.len(), 4);
    }

    #[test]
    fn null_type_and_float_created_time() {
        let map = parse(json!({
            "block": {
                "n": { "value": { "type": null } },
                "f": { "value": { "type": "page", "created_time": 1.5e12 } }
            }
        }));
        let blocks: Vec<(&str, &Block)> = map.blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].1.kind.is_empty());
        assert_eq!(blocks[1].1.created_time, Some(1_500_000_000_000));
    }

    #[test]
    fn collection_view_kinds() {
        let inline = Block { kind: "collection_view".into(), ..Default::default() };
        let full = Block { kind: "collection_view_page".into(), ..Default::default() };
        let page = Block { kind: "page".into(), ..Default::default() };
        assert!(inline.is_collection_view());
        assert!(full.is_collection_view());
        assert!(!page.is_collection_view());
        assert!(page.is_page());
    }

    #[test]
    fn merge_keeps_position_and_fills_values() {
        let mut base = parse(json!({
            "block": {
                "a": { "value": { "id": "a", "type": "page" } },
                "b": { "role": "none" }
            }
        }));
        let later = parse(json!({
            "block": {
                "c": { "value": { "id": "c", "type": "page" } },
                "b": { "value": { "id": "b", "type": "page" } },
                "a": { "role": "none" }
            },
            "collection": {
                "col": { "value": { "id": "col", "schema": {} } }
            }
        }));
        base.merge(later);
        let ids: Vec<&str> = base.blocks().map(|(id, _)| id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(base.collection("col").is_some());
    }
}
