use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Any error produced by this crate.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sort(#[from] SortError),
}

/// Configuration mistakes detected while binding a capability set.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tag `{tag}` is bound more than once for `{capability}`")]
    #[diagnostic(
        code(registry::duplicate_tag),
        help("Every tag must name exactly one concrete type within a capability set.")
    )]
    DuplicateTag {
        capability: &'static str,
        tag: String,
    },

    #[error("Concrete type `{concrete}` is bound more than once for `{capability}`")]
    #[diagnostic(
        code(registry::duplicate_concrete),
        help("A concrete type can carry only one tag within a capability set.")
    )]
    DuplicateConcrete {
        capability: &'static str,
        concrete: &'static str,
    },

    #[error("Capability set `{capability}` is already bound")]
    #[diagnostic(
        code(registry::duplicate_binding),
        help("Bind each capability set exactly once, with all of its variants.")
    )]
    DuplicateBinding { capability: &'static str },
}

/// Failures while encoding or decoding a polymorphic envelope.
#[derive(Error, Debug, Diagnostic)]
pub enum CodecError {
    #[error("Type `{concrete}` is not bound to `{capability}`")]
    #[diagnostic(
        code(codec::not_bound),
        help("Register the concrete type with `bind` before encoding it.")
    )]
    NotBound {
        capability: &'static str,
        concrete: String,
    },

    #[error("Tag `{tag}` is not bound to `{capability}`")]
    #[diagnostic(
        code(codec::unknown_tag),
        help("The document names a variant this process does not know about.")
    )]
    UnknownTag {
        capability: &'static str,
        tag: String,
    },

    #[error("Invalid envelope: {reason}")]
    #[diagnostic(
        code(codec::invalid_envelope),
        help("An envelope is an object carrying a string tag and a payload.")
    )]
    InvalidEnvelope { reason: String },

    #[error("Decoded value for tag `{tag}` is not the concrete type bound to `{capability}`")]
    #[diagnostic(
        code(codec::incompatible_concrete),
        help("Initializers must return a value of the same concrete type they receive.")
    )]
    IncompatibleConcrete {
        capability: &'static str,
        tag: String,
    },

    #[error("Flat layout cannot encode tag `{tag}`: {reason}")]
    #[diagnostic(
        code(codec::flat_layout),
        help("Flat layout merges the tag into the payload, which must be a JSON object without that key.")
    )]
    FlatLayout { tag: String, reason: String },

    #[error("Wrapper failed: {reason}")]
    #[diagnostic(code(codec::wrapper))]
    Wrapper { reason: String },

    #[error(transparent)]
    #[diagnostic(code(codec::json))]
    Json(#[from] serde_json::Error),
}

/// A path expression that does not belong to the accepted grammar.
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum PathError {
    #[error("Unexpected token in path")]
    #[diagnostic(
        code(path::unexpected_token),
        help("Paths look like `$.a.b[0]`, `$..name`, `$.list[1:3]` or `$.map.*`.")
    )]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected {expected}, but found this")]
        span: SourceSpan,
        expected: String,
    },

    #[error("Unexpected end of path")]
    #[diagnostic(code(path::unexpected_eof), help("The path ended in the middle of a step."))]
    UnexpectedEof {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected {expected} here")]
        span: SourceSpan,
        expected: String,
    },

    #[error("Illegal character `{found}` in path")]
    #[diagnostic(
        code(path::illegal_character),
        help("Quoted keys, filters `?(..)` and unions are not supported.")
    )]
    IllegalCharacter {
        #[source_code]
        src: NamedSource<String>,
        #[label("not part of the path grammar")]
        span: SourceSpan,
        found: char,
    },

    #[error("Invalid index in path")]
    #[diagnostic(code(path::invalid_index))]
    InvalidIndex {
        #[source_code]
        src: NamedSource<String>,
        #[label("{reason}")]
        span: SourceSpan,
        reason: String,
    },
}

/// Compile and runtime failures of the formula engine.
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum FormulaError {
    #[error("{message}")]
    #[diagnostic(code(formula::syntax))]
    Syntax {
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
        message: String,
    },

    #[error("Unknown function `{name}`")]
    #[diagnostic(
        code(formula::unknown_function),
        help("Built-in functions are MIN, MAX, AVG and SUM; others must be registered first.")
    )]
    UnknownFunction {
        #[source_code]
        src: NamedSource<String>,
        #[label("no function with this name")]
        span: SourceSpan,
        name: String,
    },

    #[error("Function `{name}` is not registered")]
    #[diagnostic(code(formula::unresolved_function))]
    UnresolvedFunction { name: String },

    #[error("Bad arguments for `{name}`: {message}")]
    #[diagnostic(code(formula::arity))]
    Arity {
        #[source_code]
        src: NamedSource<String>,
        #[label("called here")]
        span: SourceSpan,
        name: String,
        message: String,
    },

    #[error("Function `{name}` is already registered")]
    #[diagnostic(code(formula::duplicate_function))]
    DuplicateFunction { name: String },

    #[error("Division by zero")]
    #[diagnostic(code(formula::divide_by_zero))]
    DivideByZero { pos: usize, end: usize },

    #[error("Type mismatch: {message}")]
    #[diagnostic(
        code(formula::type_mismatch),
        help("Operands and function arguments must be numbers or null.")
    )]
    TypeMismatch { message: String },
}

impl FormulaError {
    /// Byte offset where the offending source starts, when the error has one.
    pub fn pos(&self) -> Option<usize> {
        self.range().map(|(pos, _)| pos)
    }

    /// Byte offset one past the offending source, when the error has one.
    pub fn end(&self) -> Option<usize> {
        self.range().map(|(_, end)| end)
    }

    fn range(&self) -> Option<(usize, usize)> {
        match self {
            FormulaError::Syntax { span, .. }
            | FormulaError::UnknownFunction { span, .. }
            | FormulaError::Arity { span, .. } => Some((span.offset(), span.offset() + span.len())),
            FormulaError::DivideByZero { pos, end } => Some((*pos, *end)),
            _ => None,
        }
    }
}

/// A document the lexical sorter could not tokenize or structure.
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SortError {
    #[error("{message}")]
    #[diagnostic(code(sort::syntax), help("Only well-formed JSON objects and arrays can be sorted."))]
    Syntax {
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
        message: String,
    },
}
