//! Table rows: a few statically known columns plus whatever else the table carries.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::RecordId;

/// One row of a table.
///
/// `id`, the connection status and the editable fields are typed. Unknown
/// columns (and known columns whose value has an unexpected type) are kept
/// verbatim in `extra`, so they survive a round trip through the console.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub id: RecordId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    pub connected: bool,
    pub valid: bool,
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Row {
    /// Creates a row with only an identifier.
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            hostname: None,
            mac: None,
            connected: false,
            valid: false,
            features: Vec::new(),
            mark: None,
            extra: BTreeMap::new(),
        }
    }

    /// Builds a row from a JSON object whose `id` may carry its table.
    ///
    /// The `id` may be a `table:key` string, a bare key string, or a number.
    /// A `table:` prefix is stripped only when it names `table`; any other
    /// string, colons included, is the key. Returns `None` when the value is
    /// not an object or has no usable `id`.
    pub fn from_json(table: &str, value: Value) -> Option<Row> {
        Self::decode(table, value, false)
    }

    /// Builds a row from a table record whose `id` column is always a bare key.
    ///
    /// Used for rows read straight from a SQL table, where `x` and `t:x` are
    /// two different keys.
    pub fn from_record(table: &str, value: Value) -> Option<Row> {
        Self::decode(table, value, true)
    }

    fn decode(table: &str, value: Value, bare: bool) -> Option<Row> {
        let Value::Object(mut map) = value else {
            return None;
        };

        let id = match map.remove("id")? {
            Value::String(s) if s.is_empty() => return None,
            Value::String(s) if bare => RecordId::new(table, s),
            Value::String(s) => {
                let own = s
                    .strip_prefix(table)
                    .and_then(|rest| rest.strip_prefix(':'))
                    .filter(|key| !key.is_empty())
                    .map(str::to_string);
                RecordId::new(table, own.unwrap_or(s))
            }
            Value::Number(n) => RecordId::new(table, n.to_string()),
            _ => return None,
        };

        let mut row = Row::new(id);
        row.hostname = take_string(&mut map, "hostname");
        row.mac = take_string(&mut map, "mac");
        row.mark = take_string(&mut map, "mark");
        row.connected = take_bool(&mut map, "connected").unwrap_or(false);
        row.valid = take_bool(&mut map, "valid").unwrap_or(false);
        row.features = take_string_list(&mut map, "features").unwrap_or_default();
        row.extra = map.into_iter().collect();
        Some(row)
    }

    /// Serializes the row back to a JSON object.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Returns the value of a column by name, typed or not.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.to_string())),
            "hostname" => self.hostname.clone().map(Value::String),
            "mac" => self.mac.clone().map(Value::String),
            "connected" => Some(Value::Bool(self.connected)),
            "valid" => Some(Value::Bool(self.valid)),
            "features" => Some(Value::Array(
                self.features.iter().cloned().map(Value::String).collect(),
            )),
            "mark" => self.mark.clone().map(Value::String),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Applies a set of field values on top of this row, as a partial update would.
    pub fn merged(&self, fields: &Map<String, Value>) -> Row {
        let mut value = self.to_json();
        if let Value::Object(map) = &mut value {
            for (k, v) in fields {
                if k != "id" {
                    map.insert(k.clone(), v.clone());
                }
            }
        }
        Row::from_json(self.id.table(), value).unwrap_or_else(|| self.clone())
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(_)) => match map.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        Some(Value::Null) => {
            map.remove(key);
            None
        }
        _ => None,
    }
}

fn take_bool(map: &mut Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key) {
        Some(Value::Bool(b)) => {
            let b = *b;
            map.remove(key);
            Some(b)
        }
        Some(Value::Null) => {
            map.remove(key);
            None
        }
        _ => None,
    }
}

fn take_string_list(map: &mut Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let list = match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()?,
        Some(Value::Null) => Vec::new(),
        _ => return None,
    };
    map.remove(key);
    Some(list)
}

/// The editable subset of a device row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowPatch {
    pub valid: bool,
    pub features: Vec<String>,
    pub mark: String,
}

impl RowPatch {
    /// Pre-fills a patch from the row being edited.
    pub fn from_row(row: &Row) -> Self {
        Self {
            valid: row.valid,
            features: row.features.clone(),
            mark: row.mark.clone().unwrap_or_default(),
        }
    }

    /// Field map sent with a partial update. Features are sorted.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut features = self.features.clone();
        features.sort();
        features.dedup();

        let mut map = Map::new();
        map.insert("valid".to_string(), Value::Bool(self.valid));
        map.insert(
            "features".to_string(),
            Value::Array(features.into_iter().map(Value::String).collect()),
        );
        map.insert("mark".to_string(), Value::String(self.mark.clone()));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_splits_known_and_extra() {
        let row = Row::from_json(
            "devices",
            json!({
                "id": "devices:abc",
                "hostname": "box-1",
                "mac": "AA:BB",
                "connected": true,
                "features": ["USB", "Tidal"],
                "created_at": "2025-01-01T00:00:00Z",
                "firmware": 7
            }),
        )
        .unwrap();

        assert_eq!(row.id, RecordId::new("devices", "abc"));
        assert_eq!(row.hostname.as_deref(), Some("box-1"));
        assert!(row.connected);
        assert!(!row.valid);
        assert_eq!(row.features, vec!["USB", "Tidal"]);
        assert_eq!(row.extra.get("firmware"), Some(&json!(7)));
        assert!(row.extra.contains_key("created_at"));
    }

    #[test]
    fn test_from_json_qualifies_bare_and_numeric_ids() {
        let row = Row::from_json("devices", json!({"id": 42})).unwrap();
        assert_eq!(row.id.to_string(), "devices:42");

        let row = Row::from_json("devices", json!({"id": "k1"})).unwrap();
        assert_eq!(row.id.to_string(), "devices:k1");
    }

    #[test]
    fn test_colon_in_key_stays_in_table() {
        let row = Row::from_json("devices", json!({"id": "3C:22:FB:10:00:01"})).unwrap();
        assert_eq!(row.id.table(), "devices");
        assert_eq!(row.id.key(), "3C:22:FB:10:00:01");

        let back = Row::from_json("devices", row.to_json()).unwrap();
        assert_eq!(back.id, row.id);
        assert_eq!(row.merged(&Map::new()).id, row.id);
    }

    #[test]
    fn test_from_record_keeps_prefixed_keys_distinct() {
        let plain = Row::from_record("t", json!({"id": "x"})).unwrap();
        let prefixed = Row::from_record("t", json!({"id": "t:x"})).unwrap();
        assert_eq!(plain.id, RecordId::new("t", "x"));
        assert_eq!(prefixed.id, RecordId::new("t", "t:x"));

        let mac = Row::from_record("devices", json!({"id": "3C:22:FB:10:00:01"})).unwrap();
        assert_eq!(mac.id.to_string(), "devices:3C:22:FB:10:00:01");
        assert!(Row::from_record("t", json!({"id": ""})).is_none());
    }

    #[test]
    fn test_from_json_without_id_is_rejected() {
        assert!(Row::from_json("devices", json!({"hostname": "x"})).is_none());
        assert!(Row::from_json("devices", json!({"id": null})).is_none());
        assert!(Row::from_json("devices", json!([1, 2])).is_none());
    }

    #[test]
    fn test_mistyped_known_field_is_kept_in_extra() {
        let row = Row::from_json("t", json!({"id": 1, "connected": "yes"})).unwrap();
        assert!(!row.connected);
        assert_eq!(row.extra.get("connected"), Some(&json!("yes")));
        assert_eq!(row.to_json()["connected"], json!("yes"));
    }

    #[test]
    fn test_unknown_columns_round_trip() {
        let original = json!({"id": "t:1", "name": "a", "nested": {"x": [1, 2]}});
        let row = Row::from_json("t", original).unwrap();
        let back = Row::from_json("t", row.to_json()).unwrap();
        assert_eq!(back, row);
        assert_eq!(back.field("nested"), Some(json!({"x": [1, 2]})));
    }

    #[test]
    fn test_merged_applies_fields_but_keeps_id() {
        let row = Row::from_json("t", json!({"id": 1, "mark": "old"})).unwrap();
        let mut fields = Map::new();
        fields.insert("mark".into(), json!("new"));
        fields.insert("id".into(), json!("t:999"));
        let merged = row.merged(&fields);
        assert_eq!(merged.id, row.id);
        assert_eq!(merged.mark.as_deref(), Some("new"));
    }

    #[test]
    fn test_patch_sorts_features() {
        let patch = RowPatch {
            valid: true,
            features: vec!["USB".into(), "QQMusic".into(), "USB".into()],
            mark: "note".into(),
        };
        let fields = patch.to_fields();
        assert_eq!(fields["features"], json!(["QQMusic", "USB"]));
        assert_eq!(fields["valid"], json!(true));
        assert_eq!(fields["mark"], json!("note"));
    }
}
