//! Schema derivation and resolver errors.
use displaydoc::Display;
use serde_json_bytes::Value as JsonValue;
use thiserror::Error;
use tower::BoxError;

use crate::configuration::ConfigurationError;
use crate::graphql::Error;
use crate::json_ext::Path;

/// Build-time configuration errors.
///
/// These abort schema assembly: a process whose schema cannot be derived should not start.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum SchemaError {
    /// unknown class '{class}'
    UnknownClass { class: String },

    /// type '{name}' is registered twice
    DuplicateType { name: String },

    /// field '{coordinate}' is declared twice
    DuplicateField { coordinate: String },

    /// annotation '{annotation}' is wired to handler '{handler}', which handles '{expected}'
    AnnotationTargetMismatch {
        annotation: String,
        handler: String,
        expected: String,
    },

    /// annotation '{annotation}' names unknown directive handler '{handler}'
    UnknownDirectiveHandler { annotation: String, handler: String },

    /// class '{class}' names unknown restriction factory '{factory}'
    UnknownRestrictionFactory { class: String, factory: String },

    /// generic class '{class}' declares {expected} type parameter(s) but {found} were bound
    UnmappedGeneric {
        class: String,
        expected: usize,
        found: usize,
    },

    /// type variable '{variable}' in '{context}' is not bound
    UnboundTypeVariable { variable: String, context: String },

    /// unsupported type '{ty}': {reason}
    UnsupportedShape { ty: String, reason: String },

    /// class '{class}' has no {arity}-argument constructor
    MissingConstructor { class: String, arity: usize },

    /// could not instantiate '{class}': {reason}
    Instantiation { class: String, reason: String },

    /// class '{class}' is not annotated as an entity
    NotAnEntity { class: String },

    /// entity '{entity}' cannot be used as an input
    NoInputType { entity: String },

    /// entity '{entity}' cannot be used as an output
    NoOutputType { entity: String },

    /// member '{member}' has no invoker
    NotInvocable { member: String },

    /// operation '{method}' must be static
    OperationNotStatic { method: String },

    /// subscription '{method}' must return a stream
    SubscriptionNotStream { method: String },

    /// no coercion is registered for scalar class '{class}'
    UnknownScalar { class: String },

    /// '{name}' is not a valid GraphQL name
    InvalidName { name: String },

    /// the derived schema is invalid: {0}
    Validation(String),

    /// configuration error: {0}
    Configuration(#[from] ConfigurationError),
}

/// Failures converting a loosely-typed input into an application value.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum ConversionError {
    /// expected {expected}, found {found}
    Expected { expected: String, found: String },

    /// '{constant}' is not a constant of enum '{enumeration}'
    UnknownEnumConstant {
        enumeration: String,
        constant: String,
    },

    /// one-of input '{input}' requires exactly one populated branch, found {count}
    OneOf { input: String, count: usize },

    /// {0}
    Coercion(#[from] CoercionError),

    /// could not construct '{class}': {reason}
    Construction { class: String, reason: String },

    /// value resolver for '{key}' is not built
    Unresolved { key: String },
}

impl ConversionError {
    pub(crate) fn expected(expected: impl Into<String>, found: &JsonValue) -> Self {
        ConversionError::Expected {
            expected: expected.into(),
            found: json_kind(found).to_string(),
        }
    }
}

pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "object",
    }
}

/// cannot coerce {scalar}: {reason}
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    pub scalar: String,
    pub reason: String,
}

impl CoercionError {
    pub(crate) fn new(scalar: &str, reason: impl Into<String>) -> Self {
        Self {
            scalar: scalar.to_string(),
            reason: reason.into(),
        }
    }
}

/// Per-request field errors.
///
/// Each is scoped to the field that raised it: the execution engine reports it at the field's
/// path and keeps resolving sibling fields.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum FieldError {
    /// unauthorized access to '{field}'
    Unauthorized { field: String },

    /// no authorization check matches '{method}'
    NoAuthorizerMatch { method: String },

    /// context object '{name}' not found
    ContextNotFound { name: String },

    /// invalid argument '{argument}': {source}
    Conversion {
        argument: String,
        source: ConversionError,
    },

    /// unsupported type: '{abstract_type}' cannot represent '{runtime}'
    UnsupportedType {
        abstract_type: String,
        runtime: String,
    },

    /// {0}
    Application(BoxError),

    /// restriction policy for '{type_name}' could not be created: {reason}
    Policy { type_name: String, reason: String },
}

impl FieldError {
    /// Convert the field error to a GraphQL error located at `path`.
    pub fn to_graphql_error(&self, path: Option<Path>) -> Error {
        let mut builder = Error::builder()
            .message(self.to_string())
            .extension_code(self.extension_code());
        if let Some(path) = path {
            builder = builder.path(path);
        }
        match self {
            FieldError::Conversion { argument, .. } => {
                builder = builder.extension("argument", argument.as_str());
            }
            FieldError::UnsupportedType { abstract_type, .. } => {
                builder = builder.extension("type", abstract_type.as_str());
            }
            _ => {}
        }
        builder.build()
    }
}

/// Errors that carry a machine-readable code in their GraphQL `extensions`.
pub trait ErrorExtension
where
    Self: Sized,
{
    fn extension_code(&self) -> String {
        "INTERNAL_SERVER_ERROR".to_string()
    }
}

impl ErrorExtension for FieldError {
    fn extension_code(&self) -> String {
        match self {
            FieldError::Unauthorized { .. } => "UNAUTHORIZED_FIELD_OR_TYPE",
            FieldError::NoAuthorizerMatch { .. } => "NO_AUTHORIZER_MATCH",
            FieldError::ContextNotFound { .. } => "CONTEXT_NOT_FOUND",
            FieldError::Conversion { .. } => "ARGUMENT_CONVERSION_FAILED",
            FieldError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            FieldError::Application(_) => "APPLICATION_ERROR",
            FieldError::Policy { .. } => "RESTRICTION_POLICY_FAILED",
        }
        .to_string()
    }
}
