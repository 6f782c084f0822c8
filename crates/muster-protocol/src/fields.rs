//! Field descriptor tables and typed-default coercion.
//!
//! Every message type declares a static table of `(name, kind)` descriptors.
//! One generic encode routine omits fields whose value is empty for its
//! kind, and one generic decode routine coerces whatever shows up on the
//! wire back into the declared kind, falling back to the type's default.
//! The coercion is deliberately permissive: numeric fields accept numeric
//! strings, booleans follow JSON truthiness.

use serde_json::Value;

/// Declared kind of one wire field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 string, empty value `""`.
    Str,
    /// Signed integer, empty value `0`.
    Int,
    /// Floating point, empty value `0.0`.
    Float,
    /// Boolean, empty value `false`.
    Bool,
    /// List of floats, empty value `[]`.
    FloatList,
}

/// One entry of a message type's field descriptor table.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    /// Wire name of the field.
    pub name: &'static str,
    /// Declared kind, driving coercion on decode.
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Shorthand constructor for descriptor tables.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// A typed field value, as read from or written to a message record.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// String value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// List-of-floats value.
    FloatList(Vec<f64>),
}

impl FieldValue {
    /// Whether this value equals its kind's natural empty value.
    ///
    /// Empty values are omitted by the encoder; the decoder restores them
    /// from the type's default.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Str(s) => s.is_empty(),
            Self::Int(n) => *n == 0,
            Self::Float(f) => *f == 0.0,
            Self::Bool(b) => !b,
            Self::FloatList(items) => items.is_empty(),
        }
    }

    /// JSON representation for the wire envelope.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.clone()),
            Self::Int(n) => Value::from(*n),
            Self::Float(f) => Value::from(*f),
            Self::Bool(b) => Value::Bool(*b),
            Self::FloatList(items) => Value::from(items.clone()),
        }
    }
}

/// Coerce a raw JSON value into the declared kind.
///
/// Returns `None` when the value is falsy or cannot be read as the declared
/// kind; the caller keeps the field's default in that case.
#[must_use]
pub fn coerce(kind: FieldKind, raw: &Value) -> Option<FieldValue> {
    if !is_truthy(raw) {
        return None;
    }
    match kind {
        FieldKind::Str => match raw {
            Value::String(s) => Some(FieldValue::Str(s.clone())),
            Value::Number(n) => Some(FieldValue::Str(n.to_string())),
            _ => None,
        },
        FieldKind::Int => as_i64(raw).map(FieldValue::Int),
        FieldKind::Float => as_f64(raw).map(FieldValue::Float),
        FieldKind::Bool => Some(FieldValue::Bool(true)),
        FieldKind::FloatList => match raw {
            Value::Array(items) => Some(FieldValue::FloatList(
                items.iter().filter_map(as_f64).collect(),
            )),
            _ => None,
        },
    }
}

/// JSON truthiness: `null`, `false`, `0`, `""`, and `[]` are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
