use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A field that is either missing, explicitly `null`, or holds a value.
///
/// Pair it with `#[serde(default, skip_serializing_if = "Optional::is_undefined")]`
/// so that a missing key decodes to [`Optional::Undefined`] and an undefined value is
/// left out on encode. Without `skip_serializing_if`, undefined encodes as `null`, and
/// without `default`, a missing key decodes as [`Optional::Null`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Optional<T> {
    #[default]
    Undefined,
    Null,
    Present(T),
}

impl<T> Optional<T> {
    pub fn present(value: T) -> Self {
        Optional::Present(value)
    }

    pub fn null() -> Self {
        Optional::Null
    }

    pub fn undefined() -> Self {
        Optional::Undefined
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Optional::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Optional::Null)
    }

    pub fn has_value(&self) -> bool {
        matches!(self, Optional::Present(_))
    }

    /// True for both `null` and a present value, i.e. the key was written.
    pub fn is_set(&self) -> bool {
        !self.is_undefined()
    }

    pub fn set_null(&mut self) {
        *self = Optional::Null;
    }

    /// Resets to undefined.
    pub fn clear(&mut self) {
        *self = Optional::Undefined;
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Optional::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_mut(&mut self) -> Option<&mut T> {
        match self {
            Optional::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Optional::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Optional<U> {
        match self {
            Optional::Undefined => Optional::Undefined,
            Optional::Null => Optional::Null,
            Optional::Present(value) => Optional::Present(f(value)),
        }
    }
}

impl<T: Default + Clone> Optional<T> {
    /// The carried value, or `T::default()` when undefined or null.
    pub fn value(&self) -> T {
        self.as_ref().cloned().unwrap_or_default()
    }
}

impl<T> From<T> for Optional<T> {
    fn from(value: T) -> Self {
        Optional::Present(value)
    }
}

impl<T> From<Option<T>> for Optional<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Optional::Present(value),
            None => Optional::Null,
        }
    }
}

impl<T: Serialize> Serialize for Optional<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Optional::Present(value) => value.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Optional<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // A fresh value is built on every call, so no earlier state survives.
        Option::<T>::deserialize(deserializer).map(Optional::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_and_predicates() {
        let undefined = Optional::<i32>::undefined();
        assert!(undefined.is_undefined() && !undefined.is_null() && !undefined.has_value());

        let null = Optional::<i32>::null();
        assert!(null.is_null() && null.is_set() && !null.has_value());

        let present = Optional::present(7);
        assert!(present.has_value() && present.is_set());
        assert_eq!(present.value(), 7);
    }

    #[test]
    fn test_value_defaults_when_absent() {
        assert_eq!(Optional::<String>::null().value(), "");
        assert_eq!(Optional::<i64>::undefined().value(), 0);
    }

    #[test]
    fn test_mutators() {
        let mut opt = Optional::present("a".to_string());
        opt.set_null();
        assert!(opt.is_null());
        opt.clear();
        assert!(opt.is_undefined());
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Optional::from(Some(1)), Optional::Present(1));
        assert_eq!(Optional::<i32>::from(None), Optional::Null);
    }
}
