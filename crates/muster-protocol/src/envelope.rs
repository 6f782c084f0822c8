//! The tagged key/value form of one wire message.
//!
//! An envelope is a JSON object with an integral `uri` type tag and the
//! message's non-empty fields. Text that is not an object, or carries no
//! usable tag, parses to nothing; the dispatch layer drops it silently
//! because foreign traffic on a shared bus is expected, not exceptional.

use serde_json::{Map, Value};

/// Wire name of the type tag member.
pub const URI_FIELD: &str = "uri";

/// One decoded wire message, tagged by type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Envelope {
    /// Numeric type tag.
    pub uri: u32,
    /// Non-empty message fields keyed by wire name (`uri` excluded).
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Create an envelope for a type tag with no fields.
    #[must_use]
    pub fn new(uri: u32) -> Self {
        Self {
            uri,
            fields: Map::new(),
        }
    }

    /// Parse envelope text.
    ///
    /// Returns `None` for non-JSON input, non-object JSON, or an object
    /// without a non-negative integral `uri` member.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let Value::Object(mut fields) = value else {
            return None;
        };
        let uri = fields.remove(URI_FIELD)?.as_u64()?;
        Some(Self {
            uri: u32::try_from(uri).ok()?,
            fields,
        })
    }

    /// Raw value of a field, if present on the wire.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Serialize to wire text with the `uri` member restored.
    #[must_use]
    pub fn to_wire(&self) -> String {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        let _ = object.insert(URI_FIELD.to_owned(), Value::from(self.uri));
        object.extend(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Object(object).to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_minimal() {
        let env = Envelope::parse(r#"{"uri":3}"#).unwrap();
        assert_eq!(env.uri, 3);
        assert!(env.fields.is_empty());
    }

    #[test]
    fn parse_with_fields() {
        let env = Envelope::parse(r#"{"uri":1,"identity":"w1","workerKind":2}"#).unwrap();
        assert_eq!(env.uri, 1);
        assert_eq!(env.field("identity"), Some(&json!("w1")));
        assert_eq!(env.field("workerKind"), Some(&json!(2)));
        assert!(env.field("uri").is_none(), "uri is not a field");
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(Envelope::parse("not json at all").is_none());
    }

    #[test]
    fn parse_rejects_non_object() {
        assert!(Envelope::parse("[1,2,3]").is_none());
        assert!(Envelope::parse("42").is_none());
    }

    #[test]
    fn parse_rejects_missing_uri() {
        assert!(Envelope::parse(r#"{"identity":"w1"}"#).is_none());
    }

    #[test]
    fn parse_rejects_non_integral_uri() {
        assert!(Envelope::parse(r#"{"uri":"ping"}"#).is_none());
        assert!(Envelope::parse(r#"{"uri":-1}"#).is_none());
    }

    #[test]
    fn to_wire_restores_uri() {
        let mut env = Envelope::new(4);
        let _ = env.fields.insert("echoedTimestamp".into(), json!(1234));
        let parsed = Envelope::parse(&env.to_wire()).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn to_wire_of_empty_envelope() {
        let env = Envelope::new(9);
        assert_eq!(env.to_wire(), r#"{"uri":9}"#);
    }
}
