//! Uniform value representation across backends.
//!
//! One two-branch rule everywhere, never backend-specific heuristics: raw
//! bytes that decode as UTF-8 and parse as a well-formed JSON document are
//! exposed as structured values; UTF-8 text that is not JSON stays opaque
//! text; anything else is binary. On write, operator input is tried as JSON
//! first and stored verbatim as plain text when the parse fails. This keeps
//! round-trip behavior predictable.

use serde::{Deserialize, Serialize};

/// A cache value in the panel's uniform representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    /// Well-formed JSON document, pretty-printable.
    Structured(serde_json::Value),
    /// UTF-8 text that is not valid JSON.
    Text(String),
    /// Raw bytes that are not valid UTF-8.
    Binary(Vec<u8>),
}

impl CacheValue {
    /// Classify raw bytes read from a backend.
    pub fn from_stored_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::from_stored_text(text),
            Err(_) => CacheValue::Binary(bytes.to_vec()),
        }
    }

    /// Classify text read from a backend.
    pub fn from_stored_text(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => CacheValue::Structured(value),
            Err(_) => CacheValue::Text(text.to_string()),
        }
    }

    /// Parse operator input for a write. Same rule as reads: JSON if it
    /// parses, plain text otherwise.
    pub fn parse_input(input: &str) -> Self {
        Self::from_stored_text(input)
    }

    /// Tag describing the value's representation.
    pub fn type_tag(&self) -> &'static str {
        match self {
            CacheValue::Structured(_) => "structured",
            CacheValue::Text(_) => "text",
            CacheValue::Binary(_) => "binary",
        }
    }

    /// The value in the backend's native byte representation. Structured
    /// values serialize to compact JSON.
    pub fn to_storage_bytes(&self) -> Vec<u8> {
        match self {
            CacheValue::Structured(value) => value.to_string().into_bytes(),
            CacheValue::Text(text) => text.clone().into_bytes(),
            CacheValue::Binary(bytes) => bytes.clone(),
        }
    }

    /// Human-oriented rendering. Structured values pretty-print; binary
    /// values render as a length placeholder rather than raw bytes.
    pub fn display_string(&self) -> String {
        match self {
            CacheValue::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            CacheValue::Text(text) => text.clone(),
            CacheValue::Binary(bytes) => format!("<{} bytes of binary data>", bytes.len()),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            CacheValue::Structured(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_document_is_structured() {
        let value = CacheValue::from_stored_text(r#"{"a": 1}"#);
        assert_eq!(value, CacheValue::Structured(json!({"a": 1})));
        assert_eq!(value.type_tag(), "structured");
    }

    #[test]
    fn test_plain_text_stays_text() {
        let value = CacheValue::from_stored_text("alice");
        assert_eq!(value, CacheValue::Text("alice".to_string()));
        assert_eq!(value.type_tag(), "text");
    }

    #[test]
    fn test_invalid_utf8_is_binary() {
        let value = CacheValue::from_stored_bytes(&[0xFF, 0xFE, 0x00]);
        assert_eq!(value.type_tag(), "binary");
    }

    #[test]
    fn test_bare_number_parses_as_structured() {
        let value = CacheValue::from_stored_text("42");
        assert_eq!(value, CacheValue::Structured(json!(42)));
    }

    #[test]
    fn test_storage_roundtrip_structured() {
        let original = CacheValue::parse_input(r#"{"a": 1, "b": [true, null]}"#);
        let bytes = original.to_storage_bytes();
        let reread = CacheValue::from_stored_bytes(&bytes);
        assert_eq!(original, reread);
    }

    #[test]
    fn test_storage_roundtrip_text() {
        let original = CacheValue::parse_input("not json at all");
        let bytes = original.to_storage_bytes();
        assert_eq!(CacheValue::from_stored_bytes(&bytes), original);
    }

    #[test]
    fn test_write_input_defaults_to_text_on_parse_failure() {
        // Unterminated object: JSON parsing fails, so it stores verbatim.
        let value = CacheValue::parse_input(r#"{"a": 1"#);
        assert_eq!(value.type_tag(), "text");
        assert_eq!(value.to_storage_bytes(), br#"{"a": 1"#.to_vec());
    }

    #[test]
    fn test_display_string_pretty_prints_structured() {
        let value = CacheValue::parse_input(r#"{"a":1}"#);
        let rendered = value.display_string();
        assert!(rendered.contains("\"a\": 1"));
    }

    #[test]
    fn test_display_string_binary_placeholder() {
        let value = CacheValue::Binary(vec![0xFF; 8]);
        assert_eq!(value.display_string(), "<8 bytes of binary data>");
    }

    #[test]
    fn test_empty_input_is_text() {
        assert_eq!(CacheValue::parse_input(""), CacheValue::Text(String::new()));
    }
}
