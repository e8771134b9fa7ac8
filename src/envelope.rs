//! The polymorphic carrier `G<T>`.
//!
//! `T` is a capability set written as a trait object, `G<dyn Speaker>`. The concrete
//! types behind it, and the wire options, come from the binding installed with
//! [`bind`](crate::registry::bind).
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tagjson::{DowncastSync, G};
//!
//! trait Speaker: DowncastSync {
//!     fn speak(&self) -> String;
//! }
//!
//! #[derive(Serialize, Deserialize)]
//! struct Parrot {
//!     word: String,
//! }
//!
//! impl Speaker for Parrot {
//!     fn speak(&self) -> String {
//!         self.word.clone()
//!     }
//! }
//!
//! tagjson::bind!(dyn Speaker { "parrot" => Parrot });
//!
//! let speaker = G::<dyn Speaker>::of(Parrot { word: "hello".into() }).unwrap();
//! assert_eq!(speaker.to_json().unwrap(), r#"{"data":{"word":"hello"},"type":"parrot"}"#);
//!
//! let back = G::<dyn Speaker>::from_json(r#"{"type":"parrot","data":{"word":"hi"}}"#).unwrap();
//! assert_eq!(back.value().map(|s| s.speak()), Some("hi".to_string()));
//! ```
use crate::error::CodecError;
use crate::registry::{self, Binding};
use downcast_rs::{Downcast, DowncastSync};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

/// A value of capability set `T` that is undefined, null, or present.
///
/// Use `#[serde(default, skip_serializing_if = "G::is_undefined")]` on struct fields so that
/// an undefined envelope is left out and a missing key decodes as undefined.
pub enum G<T: ?Sized + 'static> {
    Undefined,
    Null,
    Present(Box<T>),
}

impl<T: ?Sized + 'static> Default for G<T> {
    fn default() -> Self {
        G::Undefined
    }
}

impl<T: ?Sized + 'static> G<T> {
    pub fn null() -> Self {
        G::Null
    }

    pub fn undefined() -> Self {
        G::Undefined
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, G::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, G::Null)
    }

    pub fn has_value(&self) -> bool {
        matches!(self, G::Present(_))
    }

    /// The carried value. A trait object has no zero value, so absence is `None`.
    pub fn value(&self) -> Option<&T> {
        match self {
            G::Present(value) => Some(&**value),
            _ => None,
        }
    }

    pub fn value_mut(&mut self) -> Option<&mut T> {
        match self {
            G::Present(value) => Some(&mut **value),
            _ => None,
        }
    }

    pub fn into_inner(self) -> Option<Box<T>> {
        match self {
            G::Present(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: ?Sized + DowncastSync> G<T> {
    /// Wraps an already boxed value, running the binding's initializer.
    ///
    /// # Errors
    /// [`CodecError::NotBound`] when `T` has no binding or the concrete type behind
    /// `value` is not one of its variants.
    pub fn present(value: Box<T>) -> Result<Self, CodecError> {
        let binding = binding::<T>()?;
        let tag = binding
            .tag_of(&*value)
            .ok_or_else(|| not_bound::<T>("the boxed value's type"))?
            .to_string();
        binding.initialize(&tag, value).map(G::Present)
    }

    /// Upcasts a concrete value through the registry, running the initializer.
    pub fn of<C: Any>(value: C) -> Result<Self, CodecError> {
        binding::<T>()?.upcast(value).map(G::Present)
    }

    /// Borrows the occupant as concrete type `C`.
    pub fn downcast_ref<C: Any>(&self) -> Option<&C> {
        self.value()
            .and_then(|value| Downcast::as_any(value).downcast_ref::<C>())
    }

    /// The tag of the occupant.
    pub fn type_name(&self) -> Option<String> {
        let value = self.value()?;
        registry::lookup::<T>()?
            .tag_of(value)
            .map(str::to_string)
    }

    /// Encodes into a JSON tree. Undefined and null both encode as `null`.
    pub fn encode(&self) -> Result<Value, CodecError> {
        match self {
            G::Present(value) => binding::<T>()?.encode(value),
            _ => Ok(Value::Null),
        }
    }

    /// Decodes a JSON tree. `null` decodes to [`G::Null`].
    pub fn decode(document: Value) -> Result<Self, CodecError> {
        if document.is_null() {
            return Ok(G::Null);
        }
        Ok(match binding::<T>()?.decode(document)? {
            Some(value) => G::Present(value),
            None => G::Null,
        })
    }

    /// Decodes JSON text. Empty input decodes to [`G::Null`].
    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        if text.trim().is_empty() {
            return Ok(G::Null);
        }
        Self::decode(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&self.encode()?)?)
    }

    /// Decodes `document` into `self`. On failure `self` is left undefined.
    pub fn load(&mut self, document: Value) -> Result<(), CodecError> {
        *self = G::Undefined;
        *self = Self::decode(document)?;
        Ok(())
    }
}

fn binding<T: ?Sized + DowncastSync>() -> Result<Arc<Binding<T>>, CodecError> {
    registry::lookup::<T>().ok_or_else(|| not_bound::<T>("any type"))
}

fn not_bound<T: ?Sized>(concrete: &str) -> CodecError {
    CodecError::NotBound {
        capability: type_name::<T>(),
        concrete: concrete.to_string(),
    }
}

impl<T: ?Sized + DowncastSync> Serialize for G<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            G::Present(_) => self
                .encode()
                .map_err(<S::Error as ser::Error>::custom)?
                .serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de, T: ?Sized + DowncastSync> Deserialize<'de> for G<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            Some(document) => G::decode(document).map_err(<D::Error as de::Error>::custom),
            None => Ok(G::Null),
        }
    }
}

impl<T: ?Sized + fmt::Debug + 'static> fmt::Debug for G<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            G::Undefined => f.write_str("Undefined"),
            G::Null => f.write_str("Null"),
            G::Present(value) => f.debug_tuple("Present").field(&value).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    trait Unbound: DowncastSync {}

    struct Lonely;

    impl Unbound for Lonely {}

    #[test]
    fn test_states_without_binding() {
        let undefined = G::<dyn Unbound>::default();
        assert!(undefined.is_undefined());
        assert_eq!(undefined.encode().unwrap(), Value::Null);
        assert!(G::<dyn Unbound>::null().encode().unwrap().is_null());
        assert!(G::<dyn Unbound>::from_json("  ").unwrap().is_null());
    }

    #[test]
    fn test_unbound_capability() {
        assert!(matches!(
            G::<dyn Unbound>::of(Lonely),
            Err(CodecError::NotBound { .. })
        ));
        assert!(matches!(
            G::<dyn Unbound>::decode(json!({"type": "x", "data": {}})),
            Err(CodecError::NotBound { .. })
        ));
    }

    #[test]
    fn test_failed_load_leaves_undefined() {
        let mut target = G::<dyn Unbound>::null();
        assert!(target.load(json!({"type": "x"})).is_err());
        assert!(target.is_undefined());
    }
}
