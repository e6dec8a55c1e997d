use serde_json::{Map, Value};

/// Parse a `;`-delimited `key=value` payload into an open field map.
///
/// Chunks without an `=` are skipped silently. Values that parse as a
/// base-10 integer are stored as integers; everything else, floats and the
/// empty string included, stays a string.
pub fn coerce_fields(payload: &str) -> Map<String, Value> {
    let mut fields = Map::new();

    for chunk in payload.split(';') {
        let (key, value) = match chunk.split_once('=') {
            Some(pair) => pair,
            None => continue,
        };

        match value.parse::<i64>() {
            Ok(number) => fields.insert(key.to_string(), Value::from(number)),
            Err(_) => fields.insert(key.to_string(), Value::from(value)),
        };
    }

    fields
}
