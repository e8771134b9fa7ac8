use crate::error::{CodecError, PathError};
use crate::path::JsonPath;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

/// A decoded JSON value that remembers how it was reached.
///
/// Every [`get`](JsonObject::get) returns a child handle whose parent is the handle it was
/// called on, so a caller can walk back up after drilling into a document. Handles are
/// cheap to clone.
///
/// ```
/// use tagjson::JsonObject;
///
/// let doc: JsonObject = r#"{"people": {"name": "young"}}"#.parse().unwrap();
/// let name = doc.get("$.people.name").unwrap();
/// assert_eq!(name.value(), &serde_json::json!("young"));
/// assert_eq!(name.parent().unwrap().value(), doc.value());
/// ```
#[derive(Debug, Clone)]
pub struct JsonObject {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    data: Value,
    parent: Option<JsonObject>,
}

impl JsonObject {
    /// A root handle over `data`.
    pub fn new(data: Value) -> Self {
        Self {
            inner: Arc::new(Inner { data, parent: None }),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn value(&self) -> &Value {
        &self.inner.data
    }

    pub fn into_value(self) -> Value {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner.data,
            Err(shared) => shared.data.clone(),
        }
    }

    /// Evaluates `path` against this handle's value.
    ///
    /// # Errors
    /// Only compile errors are reported. A path that leads nowhere gives a child
    /// holding `null`.
    pub fn get(&self, path: &str) -> Result<JsonObject, PathError> {
        let path = JsonPath::parse(path)?;
        Ok(self.query(&path))
    }

    /// Like [`get`](JsonObject::get) with an already compiled path.
    pub fn query(&self, path: &JsonPath) -> JsonObject {
        JsonObject {
            inner: Arc::new(Inner {
                data: path.query(&self.inner.data),
                parent: Some(self.clone()),
            }),
        }
    }

    /// The handle `get` was called on; `None` for a root.
    pub fn parent(&self) -> Option<&JsonObject> {
        self.inner.parent.as_ref()
    }

    /// The handle at the top of the chain, which may be `self`.
    pub fn root(&self) -> &JsonObject {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }
}

impl FromStr for JsonObject {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JsonObject::from_json(s)
    }
}

impl From<Value> for JsonObject {
    fn from(data: Value) -> Self {
        JsonObject::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parent_chain() {
        let root = JsonObject::new(json!({"a": {"b": {"c": 1}}}));
        let a = root.get("$.a").unwrap();
        let c = a.get("$.b.c").unwrap();
        assert_eq!(c.value(), &json!(1));
        assert_eq!(c.parent().unwrap().value(), &json!({"b": {"c": 1}}));
        assert!(Arc::ptr_eq(&c.root().inner, &root.inner));
        assert!(root.is_root() && root.parent().is_none());
    }

    #[test]
    fn test_missing_path_is_null() {
        let root = JsonObject::new(json!({"a": 1}));
        assert!(root.get("$.nope").unwrap().value().is_null());
    }

    #[test]
    fn test_compile_error_propagates() {
        let root = JsonObject::new(json!({}));
        assert!(root.get("a.b").is_err());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            JsonObject::from_json("{"),
            Err(CodecError::Json(_))
        ));
    }
}
