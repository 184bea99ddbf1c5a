//! JSON intake for stores, records, and schemas.
//!
//! Stores arrive as plain JSON documents: an object of models, each an
//! object of records keyed by id. Table keys that parse as integers are
//! normalized to numeric ids, so `{"1": {...}}` and an id field `1` agree.
//! Schema documents deserialize straight through serde.

use serde_json::Value as Json;

use crate::error::ConvertError;
use crate::id::RecordId;
use crate::schema::Schema;
use crate::store::Store;
use crate::value::{Record, Value};

/// Converts any JSON value into a [`Value`]. Total: objects become records,
/// arrays become lists, numbers become `Int` when integral.
pub fn value_from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(value_from_json).collect()),
        Json::Object(fields) => Value::Record(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), value_from_json(v)))
                .collect(),
        ),
    }
}

/// Converts a JSON object into a [`Record`].
pub fn record_from_json(json: &Json) -> Result<Record, ConvertError> {
    match json {
        Json::Object(fields) => Ok(fields
            .iter()
            .map(|(k, v)| (k.clone(), value_from_json(v)))
            .collect()),
        _ => Err(ConvertError::ExpectedObject {
            context: "record".to_string(),
        }),
    }
}

/// Converts a JSON document into a [`Store`].
///
/// The document must be an object of objects of objects. Record keys that
/// are all-digit strings become [`RecordId::Int`], matching how id *fields*
/// parse, so foreign keys and table keys compare equal.
pub fn store_from_json(json: &Json) -> Result<Store, ConvertError> {
    let models = match json {
        Json::Object(models) => models,
        _ => {
            return Err(ConvertError::ExpectedObject {
                context: "store".to_string(),
            })
        }
    };

    let mut store = Store::new();
    for (model, table) in models {
        let records = match table {
            Json::Object(records) => records,
            _ => {
                return Err(ConvertError::ExpectedObject {
                    context: format!("table '{}'", model),
                })
            }
        };
        for (key, record) in records {
            store.insert(model.clone(), id_from_key(key), record_from_json(record)?);
        }
    }
    Ok(store)
}

/// Deserializes a schema document.
pub fn schema_from_json(json: &Json) -> Result<Schema, ConvertError> {
    Ok(serde_json::from_value(json.clone())?)
}

fn id_from_key(key: &str) -> RecordId {
    match key.parse::<i64>() {
        Ok(n) => RecordId::Int(n),
        Err(_) => RecordId::Str(key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_keys_are_coerced() {
        let store = store_from_json(&json!({
            "user": {
                "1": { "id": 1, "name": "ada" },
                "abc": { "id": "abc" }
            }
        }))
        .unwrap();

        assert!(store.record("user", &RecordId::Int(1)).is_some());
        assert!(store.record("user", &RecordId::from("abc")).is_some());
        assert!(store.record("user", &RecordId::from("1")).is_none());
    }

    #[test]
    fn values_convert_recursively() {
        let v = value_from_json(&json!({
            "ids": [1, 2],
            "flag": true,
            "ratio": 0.5,
            "none": null
        }));
        let record = v.as_record().unwrap();
        assert_eq!(
            record.get("ids"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(record.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(record.get("ratio"), Some(&Value::Float(0.5)));
        assert_eq!(record.get("none"), Some(&Value::Null));
    }

    #[test]
    fn malformed_store_shapes_are_rejected() {
        assert!(matches!(
            store_from_json(&json!([1, 2])),
            Err(ConvertError::ExpectedObject { .. })
        ));
        assert!(matches!(
            store_from_json(&json!({ "user": [1] })),
            Err(ConvertError::ExpectedObject { .. })
        ));
        assert!(matches!(
            store_from_json(&json!({ "user": { "1": 5 } })),
            Err(ConvertError::ExpectedObject { .. })
        ));
    }

    #[test]
    fn schema_parses_through_serde() {
        let schema = schema_from_json(&json!({
            "a": { "b_id": { "type": "parent", "model": "b" } }
        }))
        .unwrap();
        assert!(schema.contains_model("a"));
    }
}
