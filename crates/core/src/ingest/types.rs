use crate::ingest::error::FetchError;
use serde_json::Value;

/// One row of a provider table, keyed by the provider's own column names.
pub type Record = serde_json::Map<String, Value>;

/// Accepts a bare array of row objects or an object wrapping one under `data`/`items`/`records`.
pub fn records_from_json(endpoint: &str, body: Value) -> Result<Vec<Record>, FetchError> {
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(mut obj) => {
            let wrapped = ["data", "items", "records"]
                .iter()
                .find_map(|k| match obj.remove(*k) {
                    Some(Value::Array(rows)) => Some(rows),
                    _ => None,
                });
            match wrapped {
                Some(rows) => rows,
                None => {
                    return Err(FetchError::Decode {
                        endpoint: endpoint.to_string(),
                        detail: "object response without a row array".to_string(),
                    })
                }
            }
        }
        other => {
            return Err(FetchError::Decode {
                endpoint: endpoint.to_string(),
                detail: format!("expected an array of rows, got {}", type_name(&other)),
            })
        }
    };

    Ok(rows
        .into_iter()
        .filter_map(|row| match row {
            Value::Object(obj) => Some(obj),
            _ => None,
        })
        .collect())
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_bare_and_wrapped_arrays() {
        let bare = records_from_json("e", json!([{"a": 1}, {"a": 2}])).unwrap();
        assert_eq!(bare.len(), 2);

        let wrapped = records_from_json("e", json!({"data": [{"a": 1}], "code": 0})).unwrap();
        assert_eq!(wrapped.len(), 1);
    }

    #[test]
    fn drops_non_object_rows_and_rejects_scalars() {
        let rows = records_from_json("e", json!([{"a": 1}, 3, "x"])).unwrap();
        assert_eq!(rows.len(), 1);

        let err = records_from_json("e", json!("nope")).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }
}
