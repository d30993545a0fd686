//! GraphQL errors, as attached to field paths in a partial response.

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;

use crate::json_ext::Object;
use crate::json_ext::Path;

/// A [GraphQL error](https://spec.graphql.org/October2021/#sec-Errors)
/// as may be found in the `errors` field of a GraphQL response.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Error {
    /// The error message.
    pub message: String,

    /// If this is a field error, the JSON path to that field in the response data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,

    /// The optional GraphQL extensions for this error.
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

impl Error {
    /// Returns a builder that builds a GraphQL [`Error`] from its components.
    pub fn builder() -> ErrorBuilder {
        ErrorBuilder::default()
    }
}

#[derive(Default)]
pub struct ErrorBuilder {
    message: String,
    path: Option<Path>,
    extensions: Object,
    extension_code: Option<String>,
}

impl ErrorBuilder {
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn path(mut self, path: impl Into<Path>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn extension(mut self, key: impl Into<ByteString>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Sets the "code" in the extension map. Ignored if the extensions already carry a code.
    pub fn extension_code(mut self, code: impl Into<String>) -> Self {
        self.extension_code = Some(code.into());
        self
    }

    pub fn build(self) -> Error {
        let mut extensions = self.extensions;
        if let Some(code) = self.extension_code {
            extensions
                .entry("code")
                .or_insert_with(|| Value::String(code.into()));
        }
        Error {
            message: self.message,
            path: self.path,
            extensions,
        }
    }
}
