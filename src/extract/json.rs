//! JSON extraction: recursive flattening into searchable text.

use serde_json::Value;

use super::{collapse_whitespace, ExtractedFields};

/// Extracts a JSON document. Returns `None` when the bytes do not parse;
/// the caller degrades to plain-text handling.
pub fn extract(bytes: &[u8]) -> Option<ExtractedFields> {
    let value: Value = serde_json::from_slice(bytes).ok()?;

    let title = match &value {
        Value::Object(map) => ["title", "name", "id"]
            .iter()
            .find_map(|key| map.get(*key))
            .map(scalar_to_string)
            .filter(|t| !t.is_empty()),
        _ => None,
    };

    Some(ExtractedFields {
        title: Some(title.unwrap_or_else(|| "JSON Document".to_string())),
        content: collapse_whitespace(&flatten(&value)),
        metadata: serde_json::Map::new(),
        tags: Vec::new(),
    })
}

/// Flattens a JSON value into `"key: value"` tokens so structured data is
/// full-text searchable. Arrays concatenate their flattened items;
/// objects emit space-separated `key: value` pairs; primitives are
/// stringified.
fn flatten(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, flatten(v)))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => flatten(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefers_title_then_name_then_id() {
        let fields = extract(br#"{"name": "pkg", "title": "Package Spec"}"#).unwrap();
        assert_eq!(fields.title.as_deref(), Some("Package Spec"));

        let fields = extract(br#"{"name": "pkg", "id": "p1"}"#).unwrap();
        assert_eq!(fields.title.as_deref(), Some("pkg"));

        let fields = extract(br#"{"version": 1}"#).unwrap();
        assert_eq!(fields.title.as_deref(), Some("JSON Document"));
    }

    #[test]
    fn nested_structure_flattens_to_key_value_tokens() {
        let fields =
            extract(br#"{"server": {"host": "localhost", "ports": [80, 443]}}"#).unwrap();
        assert_eq!(fields.content, "server: host: localhost ports: 80 443");
    }

    #[test]
    fn primitives_are_stringified() {
        let fields = extract(br#"{"debug": true, "retries": null}"#).unwrap();
        assert!(fields.content.contains("debug: true"));
        assert!(fields.content.contains("retries: null"));
    }

    #[test]
    fn invalid_json_returns_none() {
        assert!(extract(b"{not json").is_none());
    }
}
