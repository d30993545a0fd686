//! Per-request state handed to every data fetcher.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value as JsonValue;
use tokio::sync::OnceCell;

use crate::directives::restriction::RestrictionPolicy;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::meta::Value;

/// Holds [`RequestContext`] entries.
pub type Entries = Arc<DashMap<String, Value>>;

pub(crate) type PolicyCell = Arc<OnceCell<Arc<dyn RestrictionPolicy>>>;

/// State shared by every field resolved for one request.
///
/// Dropping the context drops the restriction policies created for it.
#[derive(Default)]
pub struct RequestContext {
    global: Option<Value>,
    entries: Entries,
    policies: DashMap<Arc<str>, PolicyCell>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context carrying the application's global request-context object.
    pub fn with_global(global: impl Into<Value>) -> Self {
        RequestContext {
            global: Some(global.into()),
            ..Default::default()
        }
    }

    pub fn global(&self) -> Option<&Value> {
        self.global.as_ref()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// The single-flight cell holding the restriction policy created under `key`.
    pub(crate) fn policy_cell(&self, key: &Arc<str>) -> PolicyCell {
        self.policies.entry(key.clone()).or_default().clone()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("global", &self.global)
            .field("entries", &self.entries)
            .field("policies", &self.policies.len())
            .finish()
    }
}

/// What a data fetcher knows about the field it resolves.
#[derive(Clone, Debug)]
pub struct Environment {
    pub field_name: String,
    pub parent_type: String,
    /// The parent object; `Null` for root operations.
    pub source: Value,
    pub arguments: Object,
    /// Side-channel value handed down by the parent resolver.
    pub local_context: Option<Value>,
    pub context: Arc<RequestContext>,
    pub path: Path,
}

#[buildstructor::buildstructor]
impl Environment {
    #[builder(visibility = "pub")]
    fn new(
        field_name: String,
        parent_type: String,
        source: Option<Value>,
        arguments: HashMap<String, JsonValue>,
        local_context: Option<Value>,
        context: Option<Arc<RequestContext>>,
        path: Option<Path>,
    ) -> Self {
        let path = path.unwrap_or_else(|| Path::empty().join(field_name.as_str()));
        Environment {
            field_name,
            parent_type,
            source: source.unwrap_or_default(),
            arguments: arguments
                .into_iter()
                .map(|(name, value)| (ByteString::from(name), value))
                .collect(),
            local_context,
            context: context.unwrap_or_default(),
            path,
        }
    }

    pub fn argument(&self, name: &str) -> Option<&JsonValue> {
        self.arguments.get(name)
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn builder_defaults() {
        let env = Environment::builder()
            .field_name("user".to_string())
            .parent_type("Query".to_string())
            .argument("id".to_string(), json!(7))
            .build();
        assert_eq!(env.argument("id"), Some(&json!(7)));
        assert!(env.source.is_null());
        assert_eq!(env.path.to_string(), "/user");
        assert!(env.context.global().is_none());
    }

    #[test]
    fn context_entries() {
        let context = RequestContext::with_global("tenant-a");
        assert_eq!(context.insert("locale", "en-NZ"), None);
        assert_eq!(context.get("locale"), Some(Value::from("en-NZ")));
        assert_eq!(context.global(), Some(&Value::from("tenant-a")));
    }
}
