//! Process-wide map from capability sets (trait objects such as `dyn Speaker`) to the
//! concrete types that implement them, each under a string tag.
//!
//! Bindings are installed once, usually at start-up, and read on every encode and decode.
//! Writers are serialized by a mutex and publish a fresh snapshot; readers clone the
//! current snapshot handle and never wait on a writer for longer than that clone.
use crate::codec::{self, JsonCodec, Keys, Layout, PayloadCodec, Wrapper};
use crate::error::{CodecError, RegistryError};
use downcast_rs::{Downcast, DowncastSync};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Post-decode and on-construct transformation of a carried value.
pub type Initializer<T> = Arc<dyn Fn(Box<T>) -> Box<T> + Send + Sync>;

type Encoder<T> = fn(&T) -> Result<Value, CodecError>;
type Decoder<T> = Arc<dyn Fn(Value) -> Result<Box<T>, CodecError> + Send + Sync>;

/// Identity of a concrete type bound under a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConcreteType {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

struct Variant<T: ?Sized + 'static> {
    tag: String,
    concrete: ConcreteType,
    encode: Encoder<T>,
    decode: Decoder<T>,
    // Holds the `fn(Box<C>) -> Box<T>` the variant was registered with.
    upcast: Box<dyn Any + Send + Sync>,
}

/// Every tag of one capability set `T`, plus the wire options that go with them.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tagjson::{codec::Layout, registry::Binding, DowncastSync};
///
/// trait Shape: DowncastSync {
///     fn area(&self) -> f64;
/// }
///
/// #[derive(Serialize, Deserialize)]
/// struct Square {
///     side: f64,
/// }
///
/// impl Shape for Square {
///     fn area(&self) -> f64 {
///         self.side * self.side
///     }
/// }
///
/// tagjson::bind(
///     Binding::<dyn Shape>::new()
///         .variant::<Square>("square", |v| v)
///         .type_key("kind")
///         .layout(Layout::Flat),
/// );
/// ```
pub struct Binding<T: ?Sized + 'static> {
    keys: Keys,
    layout: Layout,
    codec: Arc<dyn PayloadCodec>,
    wrapper: Option<Arc<dyn Wrapper>>,
    initializer: Option<Initializer<T>>,
    variants: Vec<Variant<T>>,
    by_tag: HashMap<String, usize>,
    by_type: HashMap<TypeId, usize>,
    conflicts: Vec<RegistryError>,
}

impl<T: ?Sized + DowncastSync> Default for Binding<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + DowncastSync> Binding<T> {
    pub fn new() -> Self {
        Self {
            keys: Keys::default(),
            layout: Layout::default(),
            codec: Arc::new(JsonCodec),
            wrapper: None,
            initializer: None,
            variants: Vec::new(),
            by_tag: HashMap::new(),
            by_type: HashMap::new(),
            conflicts: Vec::new(),
        }
    }

    /// Registers concrete type `C` under `tag`.
    ///
    /// `upcast` is almost always `|v| v`; it exists so the compiler can coerce
    /// `Box<C>` into `Box<T>`. Duplicate tags or concrete types are reported by
    /// [`bind`] / [`try_bind`].
    pub fn variant<C>(mut self, tag: impl Into<String>, upcast: fn(Box<C>) -> Box<T>) -> Self
    where
        C: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let tag = tag.into();
        let concrete = ConcreteType {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
        };
        if self.by_tag.contains_key(&tag) {
            self.conflicts.push(RegistryError::DuplicateTag {
                capability: type_name::<T>(),
                tag,
            });
            return self;
        }
        if self.by_type.contains_key(&concrete.type_id) {
            self.conflicts.push(RegistryError::DuplicateConcrete {
                capability: type_name::<T>(),
                concrete: concrete.type_name,
            });
            return self;
        }

        let decode: Decoder<T> = Arc::new(move |payload: Value| {
            let value: C = serde_json::from_value(payload)?;
            Ok(upcast(Box::new(value)))
        });
        let index = self.variants.len();
        self.by_tag.insert(tag.clone(), index);
        self.by_type.insert(concrete.type_id, index);
        self.variants.push(Variant {
            tag,
            concrete,
            encode: encode_variant::<T, C>,
            decode,
            upcast: Box::new(upcast),
        });
        self
    }

    pub fn type_key(mut self, key: impl Into<String>) -> Self {
        self.keys.type_key = key.into();
        self
    }

    pub fn value_key(mut self, key: impl Into<String>) -> Self {
        self.keys.value_key = key.into();
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn codec(mut self, codec: impl PayloadCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn wrapper(mut self, wrapper: impl Wrapper + 'static) -> Self {
        self.wrapper = Some(Arc::new(wrapper));
        self
    }

    /// The hook must hand back a value of the concrete type it was given.
    pub fn initializer(mut self, hook: impl Fn(Box<T>) -> Box<T> + Send + Sync + 'static) -> Self {
        self.initializer = Some(Arc::new(hook));
        self
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn current_layout(&self) -> Layout {
        self.layout
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|variant| variant.tag.as_str())
    }

    /// The concrete type registered under `tag`.
    pub fn concrete(&self, tag: &str) -> Option<ConcreteType> {
        self.by_tag.get(tag).map(|&index| self.variants[index].concrete)
    }

    /// The tag of the concrete type behind `value`.
    pub fn tag_of(&self, value: &T) -> Option<&str> {
        self.variant_of(value).map(|variant| variant.tag.as_str())
    }

    fn variant_of(&self, value: &T) -> Option<&Variant<T>> {
        self.by_type
            .get(&concrete_id(value))
            .map(|&index| &self.variants[index])
    }

    /// Converts a concrete value into the capability set and runs the initializer.
    pub fn upcast<C: Any>(&self, value: C) -> Result<Box<T>, CodecError> {
        let variant = self
            .by_type
            .get(&TypeId::of::<C>())
            .map(|&index| &self.variants[index])
            .ok_or_else(|| CodecError::NotBound {
                capability: type_name::<T>(),
                concrete: type_name::<C>().to_string(),
            })?;
        let upcast = variant
            .upcast
            .downcast_ref::<fn(Box<C>) -> Box<T>>()
            .ok_or_else(|| CodecError::NotBound {
                capability: type_name::<T>(),
                concrete: type_name::<C>().to_string(),
            })?;
        self.initialize(&variant.tag, upcast(Box::new(value)))
    }

    /// Applies the initializer, if any, and checks it kept the concrete type.
    pub(crate) fn initialize(&self, tag: &str, value: Box<T>) -> Result<Box<T>, CodecError> {
        let Some(hook) = &self.initializer else {
            return Ok(value);
        };
        let before = concrete_id(&*value);
        let value = hook(value);
        if concrete_id(&*value) != before {
            return Err(CodecError::IncompatibleConcrete {
                capability: type_name::<T>(),
                tag: tag.to_string(),
            });
        }
        Ok(value)
    }

    /// Encodes `value` into an envelope tree.
    pub fn encode(&self, value: &T) -> Result<Value, CodecError> {
        let variant = self.variant_of(value).ok_or_else(|| CodecError::NotBound {
            capability: type_name::<T>(),
            concrete: "the carried value's type".to_string(),
        })?;
        let payload = self.codec.marshal((variant.encode)(value)?)?;
        match &self.wrapper {
            Some(wrapper) => {
                let text = wrapper.wrap(&self.keys, &variant.tag, payload)?;
                Ok(serde_json::from_str(&text)?)
            }
            None => codec::assemble(&self.keys, self.layout, &variant.tag, payload),
        }
    }

    /// Decodes an envelope tree. `null` yields `None`.
    pub fn decode(&self, document: Value) -> Result<Option<Box<T>>, CodecError> {
        if document.is_null() {
            return Ok(None);
        }
        let (tag, payload) = match &self.wrapper {
            Some(wrapper) => wrapper.unwrap(&self.keys, document)?,
            None => codec::disassemble(&self.keys, self.layout, document)?,
        };
        let index = *self
            .by_tag
            .get(&tag)
            .ok_or_else(|| CodecError::UnknownTag {
                capability: type_name::<T>(),
                tag: tag.clone(),
            })?;
        let variant = &self.variants[index];
        let value = (variant.decode)(self.codec.unmarshal(payload)?)?;
        if concrete_id(&*value) != variant.concrete.type_id {
            return Err(CodecError::IncompatibleConcrete {
                capability: type_name::<T>(),
                tag,
            });
        }
        self.initialize(&tag, value).map(Some)
    }
}

fn encode_variant<T, C>(value: &T) -> Result<Value, CodecError>
where
    T: ?Sized + DowncastSync,
    C: Serialize + 'static,
{
    match Downcast::as_any(value).downcast_ref::<C>() {
        Some(concrete) => Ok(serde_json::to_value(concrete)?),
        None => Err(CodecError::NotBound {
            capability: type_name::<T>(),
            concrete: type_name::<C>().to_string(),
        }),
    }
}

/// The `TypeId` of the concrete value behind a trait object.
pub(crate) fn concrete_id<T: ?Sized + DowncastSync>(value: &T) -> TypeId {
    Any::type_id(Downcast::as_any(value))
}

type Snapshot = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

struct Registry {
    published: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        published: RwLock::new(Arc::new(HashMap::new())),
        writer: Mutex::new(()),
    })
}

/// Installs `binding` for capability set `T`.
///
/// # Errors
/// Returns the first conflict recorded while building the binding, or
/// [`RegistryError::DuplicateBinding`] when `T` is already bound.
pub fn try_bind<T: ?Sized + DowncastSync>(binding: Binding<T>) -> Result<(), RegistryError> {
    if let Some(conflict) = binding.conflicts.first() {
        warn!("rejected binding for {}: {conflict}", type_name::<T>());
        return Err(conflict.clone());
    }

    let registry = registry();
    let _writer = registry.writer.lock();
    let current = registry.published.read().clone();
    let key = TypeId::of::<T>();
    if current.contains_key(&key) {
        warn!("rejected second binding for {}", type_name::<T>());
        return Err(RegistryError::DuplicateBinding {
            capability: type_name::<T>(),
        });
    }

    debug!(
        "binding {} with tags [{}]",
        type_name::<T>(),
        binding.tags().collect::<Vec<_>>().join(", ")
    );
    let mut next = (*current).clone();
    next.insert(key, Arc::new(binding));
    *registry.published.write() = Arc::new(next);
    Ok(())
}

/// Installs `binding` for capability set `T`.
///
/// # Panics
/// Panics on any configuration error; see [`try_bind`] for the fallible form.
pub fn bind<T: ?Sized + DowncastSync>(binding: Binding<T>) {
    if let Err(err) = try_bind(binding) {
        panic!("{err}");
    }
}

/// The binding installed for capability set `T`.
pub fn lookup<T: ?Sized + DowncastSync>() -> Option<Arc<Binding<T>>> {
    let snapshot = registry().published.read().clone();
    let entry = snapshot.get(&TypeId::of::<T>())?.clone();
    entry.downcast::<Binding<T>>().ok()
}

/// The concrete type bound under `tag` for capability set `T`.
pub fn detail_type<T: ?Sized + DowncastSync>(tag: &str) -> Option<ConcreteType> {
    lookup::<T>()?.concrete(tag)
}

/// Binds a capability set to its tagged variants.
///
/// ```ignore
/// tagjson::bind!(dyn Speaker { "s1" => S1, "s2" => S2 });
/// ```
#[macro_export]
macro_rules! bind {
    ($capability:ty { $($tag:expr => $concrete:ty),* $(,)? }) => {
        $crate::registry::bind(
            $crate::registry::Binding::<$capability>::new()
                $(.variant::<$concrete>($tag, |value: ::std::boxed::Box<$concrete>| -> ::std::boxed::Box<$capability> { value }))*
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    trait Animal: DowncastSync {
        fn sound(&self) -> String;
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Dog {
        name: String,
    }

    impl Animal for Dog {
        fn sound(&self) -> String {
            format!("{} barks", self.name)
        }
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Cat;

    impl Animal for Cat {
        fn sound(&self) -> String {
            "meow".to_string()
        }
    }

    fn animals() -> Binding<dyn Animal> {
        Binding::<dyn Animal>::new()
            .variant::<Dog>("dog", |v| v)
            .variant::<Cat>("cat", |v| v)
    }

    #[test]
    fn test_encode_decode_through_binding() {
        let binding = animals();
        let dog: Box<dyn Animal> = Box::new(Dog {
            name: "Rex".to_string(),
        });
        let tree = binding.encode(&*dog).unwrap();
        assert_eq!(tree, json!({"type": "dog", "data": {"name": "Rex"}}));

        let decoded = binding.decode(tree).unwrap().unwrap();
        assert_eq!(decoded.sound(), "Rex barks");
        assert_eq!(binding.tag_of(&*decoded), Some("dog"));
    }

    #[test]
    fn test_duplicate_tag_is_recorded() {
        let binding = Binding::<dyn Animal>::new()
            .variant::<Dog>("pet", |v| v)
            .variant::<Cat>("pet", |v| v);
        assert_eq!(
            binding.conflicts.first(),
            Some(&RegistryError::DuplicateTag {
                capability: type_name::<dyn Animal>(),
                tag: "pet".to_string(),
            })
        );
    }

    #[test]
    fn test_duplicate_concrete_is_recorded() {
        let binding = Binding::<dyn Animal>::new()
            .variant::<Dog>("dog", |v| v)
            .variant::<Dog>("hound", |v| v);
        assert!(matches!(
            binding.conflicts.first(),
            Some(RegistryError::DuplicateConcrete { .. })
        ));
    }

    #[test]
    fn test_initializer_must_keep_concrete_type() {
        let binding = animals().initializer(|_| -> Box<dyn Animal> { Box::new(Cat) });
        let result = binding.decode(json!({"type": "dog", "data": {"name": "Rex"}}));
        assert!(matches!(
            result,
            Err(CodecError::IncompatibleConcrete { .. })
        ));
    }

    #[test]
    fn test_upcast_unknown_concrete() {
        #[derive(Serialize, Deserialize)]
        struct Fish;
        impl Animal for Fish {
            fn sound(&self) -> String {
                String::new()
            }
        }
        let binding = animals();
        assert!(matches!(
            binding.upcast(Fish),
            Err(CodecError::NotBound { .. })
        ));
    }

    #[test]
    fn test_concrete_lookup() {
        let binding = animals();
        let concrete = binding.concrete("cat").unwrap();
        assert_eq!(concrete.type_id, TypeId::of::<Cat>());
        assert!(binding.concrete("cow").is_none());
    }

    trait Marker<const N: usize>: DowncastSync {}

    trait Steady: DowncastSync {}

    #[derive(Serialize, Deserialize)]
    struct Mark;

    impl<const N: usize> Marker<N> for Mark {}

    impl Steady for Mark {}

    fn bind_marker<const N: usize>() {
        bind(Binding::<dyn Marker<N>>::new().variant::<Mark>("mark", |v| v));
    }

    #[test]
    fn test_lookups_run_alongside_binds() {
        bind(Binding::<dyn Steady>::new().variant::<Mark>("steady", |v| v));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1_000 {
                        let binding = lookup::<dyn Steady>().unwrap();
                        assert_eq!(binding.tags().collect::<Vec<_>>(), ["steady"]);
                    }
                });
            }
            scope.spawn(|| {
                bind_marker::<0>();
                bind_marker::<1>();
                bind_marker::<2>();
                bind_marker::<3>();
                bind_marker::<4>();
                bind_marker::<5>();
            });
        });

        assert!(lookup::<dyn Marker<0>>().is_some());
        assert!(lookup::<dyn Marker<5>>().is_some());
        assert!(lookup::<dyn Marker<6>>().is_none());
        assert!(lookup::<dyn Steady>().is_some());
    }
}
