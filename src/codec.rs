//! Pluggable pieces of the envelope wire format.
//!
//! A [`Binding`](crate::registry::Binding) turns a concrete value into a payload tree with
//! serde, then hands it to its [`PayloadCodec`] and finally lays tag and payload out
//! according to its [`Layout`], unless a [`Wrapper`] takes over the whole envelope.
use crate::error::CodecError;
use serde_json::{Map, Value};

pub const DEFAULT_TYPE_KEY: &str = "type";
pub const DEFAULT_VALUE_KEY: &str = "data";

/// Property names used by the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys {
    pub type_key: String,
    pub value_key: String,
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            type_key: DEFAULT_TYPE_KEY.to_string(),
            value_key: DEFAULT_VALUE_KEY.to_string(),
        }
    }
}

/// How tag and payload share the envelope object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// `{ "<type_key>": tag, "<value_key>": payload }`
    #[default]
    Nested,
    /// `{ "<type_key>": tag, ...payload members }`. The payload must be an object.
    Flat,
}

/// The marshal/unmarshal pair applied to payload trees.
pub trait PayloadCodec: Send + Sync {
    fn marshal(&self, payload: Value) -> Result<Value, CodecError>;
    fn unmarshal(&self, fragment: Value) -> Result<Value, CodecError>;
}

/// Payload trees go on the wire as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn marshal(&self, payload: Value) -> Result<Value, CodecError> {
        Ok(payload)
    }

    fn unmarshal(&self, fragment: Value) -> Result<Value, CodecError> {
        Ok(fragment)
    }
}

/// Payloads travel as embedded JSON text: `{"type":"s1","data":"{\"A\":0}"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl PayloadCodec for StringCodec {
    fn marshal(&self, payload: Value) -> Result<Value, CodecError> {
        Ok(Value::String(serde_json::to_string(&payload)?))
    }

    fn unmarshal(&self, fragment: Value) -> Result<Value, CodecError> {
        match fragment {
            Value::String(text) => Ok(serde_json::from_str(&text)?),
            Value::Null => Ok(Value::Null),
            other => Err(CodecError::InvalidEnvelope {
                reason: format!("expected the payload as JSON text, found {}", kind_of(&other)),
            }),
        }
    }
}

/// Replaces the envelope layout entirely.
///
/// `wrap` may produce any JSON text; `unwrap` must split an incoming document back into
/// its tag and payload.
pub trait Wrapper: Send + Sync {
    fn wrap(&self, keys: &Keys, tag: &str, payload: Value) -> Result<String, CodecError>;
    fn unwrap(&self, keys: &Keys, document: Value) -> Result<(String, Value), CodecError>;
}

/// Encodes envelopes as a two element array, `["s1", {"A":0}]`. Keys are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct TupleWrapper;

impl Wrapper for TupleWrapper {
    fn wrap(&self, _keys: &Keys, tag: &str, payload: Value) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&(tag, payload))?)
    }

    fn unwrap(&self, _keys: &Keys, document: Value) -> Result<(String, Value), CodecError> {
        match document {
            Value::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(Value::String(tag)), Some(payload)) => Ok((tag, payload)),
                    _ => Err(CodecError::Wrapper {
                        reason: "the first element must be the tag string".to_string(),
                    }),
                }
            }
            other => Err(CodecError::Wrapper {
                reason: format!("expected a [tag, payload] pair, found {}", kind_of(&other)),
            }),
        }
    }
}

/// Lays out `tag` and `payload` as an envelope object.
pub(crate) fn assemble(
    keys: &Keys,
    layout: Layout,
    tag: &str,
    payload: Value,
) -> Result<Value, CodecError> {
    match layout {
        Layout::Nested => {
            let mut envelope = Map::new();
            envelope.insert(keys.type_key.clone(), Value::String(tag.to_string()));
            envelope.insert(keys.value_key.clone(), payload);
            Ok(Value::Object(envelope))
        }
        Layout::Flat => match payload {
            Value::Object(mut members) => {
                if members.contains_key(&keys.type_key) {
                    return Err(CodecError::FlatLayout {
                        tag: tag.to_string(),
                        reason: format!("the payload already has a `{}` member", keys.type_key),
                    });
                }
                members.insert(keys.type_key.clone(), Value::String(tag.to_string()));
                Ok(Value::Object(members))
            }
            other => Err(CodecError::FlatLayout {
                tag: tag.to_string(),
                reason: format!("the payload is {}, not an object", kind_of(&other)),
            }),
        },
    }
}

/// Splits an envelope object into its tag and payload.
pub(crate) fn disassemble(
    keys: &Keys,
    layout: Layout,
    document: Value,
) -> Result<(String, Value), CodecError> {
    let mut members = match document {
        Value::Object(members) => members,
        other => {
            return Err(CodecError::InvalidEnvelope {
                reason: format!("expected an object, found {}", kind_of(&other)),
            })
        }
    };
    let tag = match members.remove(&keys.type_key) {
        Some(Value::String(tag)) => tag,
        Some(other) => {
            return Err(CodecError::InvalidEnvelope {
                reason: format!("`{}` must be a string, found {}", keys.type_key, kind_of(&other)),
            })
        }
        None => {
            return Err(CodecError::InvalidEnvelope {
                reason: format!("missing `{}` member", keys.type_key),
            })
        }
    };
    let payload = match layout {
        Layout::Nested => members.remove(&keys.value_key).unwrap_or(Value::Null),
        Layout::Flat => Value::Object(members),
    };
    Ok((tag, payload))
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_round_trip() {
        let keys = Keys::default();
        let envelope = assemble(&keys, Layout::Nested, "s1", json!({"A": 1})).unwrap();
        assert_eq!(envelope, json!({"type": "s1", "data": {"A": 1}}));
        let (tag, payload) = disassemble(&keys, Layout::Nested, envelope).unwrap();
        assert_eq!(tag, "s1");
        assert_eq!(payload, json!({"A": 1}));
    }

    #[test]
    fn test_flat_merges_tag() {
        let keys = Keys::default();
        let envelope = assemble(&keys, Layout::Flat, "s1", json!({"A": 1})).unwrap();
        assert_eq!(envelope, json!({"type": "s1", "A": 1}));
        let (_, payload) = disassemble(&keys, Layout::Flat, envelope).unwrap();
        assert_eq!(payload, json!({"A": 1}));
    }

    #[test]
    fn test_flat_rejects_scalars_and_collisions() {
        let keys = Keys::default();
        assert!(matches!(
            assemble(&keys, Layout::Flat, "n", json!(3)),
            Err(CodecError::FlatLayout { .. })
        ));
        assert!(matches!(
            assemble(&keys, Layout::Flat, "n", json!({"type": 1})),
            Err(CodecError::FlatLayout { .. })
        ));
    }

    #[test]
    fn test_missing_tag_is_invalid() {
        let keys = Keys::default();
        let result = disassemble(&keys, Layout::Nested, json!({"data": {}}));
        assert!(matches!(result, Err(CodecError::InvalidEnvelope { .. })));
    }

    #[test]
    fn test_string_codec() {
        let encoded = StringCodec.marshal(json!({"A": 0})).unwrap();
        assert_eq!(encoded, json!("{\"A\":0}"));
        assert_eq!(StringCodec.unmarshal(encoded).unwrap(), json!({"A": 0}));
    }

    #[test]
    fn test_tuple_wrapper() {
        let keys = Keys::default();
        let text = TupleWrapper.wrap(&keys, "s2", json!({"B": "x"})).unwrap();
        assert_eq!(text, r#"["s2",{"B":"x"}]"#);
        let (tag, payload) = TupleWrapper.unwrap(&keys, json!(["s2", {"B": "x"}])).unwrap();
        assert_eq!(tag, "s2");
        assert_eq!(payload, json!({"B": "x"}));
    }
}
