//! Data-transformation kernel built around JSON.
//!
//! * [`G<T>`] carries a value of an open set of concrete types behind a trait object and
//!   encodes it as a tagged envelope, driven by the process-wide [`registry`].
//! * [`Optional<T>`] tells *undefined*, *null* and *present* apart across a serde round-trip.
//! * [`JsonPath`] compiles and evaluates a small JSONPath dialect over [`serde_json::Value`].
//! * [`formula`] parses and evaluates arithmetic expressions with variables and functions.
//! * [`sort`] re-emits JSON text with object keys in lexical order.
pub mod codec;
pub mod envelope;
pub mod error;
pub mod formula;
pub mod object;
pub mod optional;
pub mod path;
pub mod registry;
pub mod scan;
pub mod sort;

pub use downcast_rs::DowncastSync;
pub use envelope::G;
pub use error::Error;
pub use object::JsonObject;
pub use optional::Optional;
pub use path::JsonPath;
pub use registry::{bind, lookup, try_bind, Binding};
