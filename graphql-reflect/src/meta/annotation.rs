use std::sync::Arc;

use indexmap::IndexMap;

use super::ClassName;
use super::Value;

/// Marks a class as a schema entity. `schema` is one of `TYPE`, `INPUT` or `BOTH`.
pub const ENTITY: &str = "Entity";
pub const QUERY: &str = "Query";
pub const MUTATION: &str = "Mutation";
pub const SUBSCRIPTION: &str = "Subscription";
/// Hides a member (or enum constant) from the schema.
pub const IGNORE: &str = "GraphQLIgnore";
/// Hides a member from input types only.
pub const INPUT_IGNORE: &str = "InputIgnore";
/// Marks a parameter (or a whole class) as injected from the request context.
pub const CONTEXT: &str = "Context";
pub const ID: &str = "Id";
pub const DESCRIPTION: &str = "Description";
pub const DEPRECATED: &str = "Deprecated";
pub const NULLABLE: &str = "Nullable";
/// `value` lists the member classes, in resolution order.
pub const UNION: &str = "Union";
/// `value` lists the branch classes of a one-of input.
pub const ONE_OF: &str = "OneOf";
/// `value` names a restriction factory registered on the schema builder.
pub const RESTRICT: &str = "Restrict";
/// Marks an annotation class as a schema-emitted directive.
pub const DIRECTIVE: &str = "Directive";
/// Marks an annotation class as a programmatic directive; `value` names its handler.
pub const DATA_FETCHER_WRAPPER: &str = "DataFetcherWrapper";

/// An annotation instance attached to a class, member, parameter or enum constant.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub name: ClassName,
    pub values: IndexMap<Arc<str>, Value>,
}

impl Annotation {
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            name: name.into(),
            values: IndexMap::new(),
        }
    }

    pub fn with(mut self, accessor: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.values.insert(accessor.into(), value.into());
        self
    }

    /// Shorthand for the conventional `value` accessor.
    pub fn with_value(self, value: impl Into<Value>) -> Self {
        self.with("value", value)
    }

    pub fn get(&self, accessor: &str) -> Option<&Value> {
        self.values.get(accessor)
    }

    pub fn str(&self, accessor: &str) -> Option<&str> {
        self.get(accessor).and_then(Value::as_str)
    }

    /// Reads a list of names, accepting a single string as a one-element list.
    pub fn strings(&self, accessor: &str) -> Vec<&str> {
        match self.get(accessor) {
            Some(Value::List(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(value) => value.as_str().into_iter().collect(),
            None => Vec::new(),
        }
    }
}

/// The annotations carried by one declaration, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    pub fn get(&self, name: &str) -> Option<&Annotation> {
        self.0.iter().find(|a| &*a.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.0.push(annotation);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    pub fn description(&self) -> Option<&str> {
        self.get(DESCRIPTION).and_then(|a| a.str("value"))
    }
}

impl FromIterator<Annotation> for Annotations {
    fn from_iter<T: IntoIterator<Item = Annotation>>(iter: T) -> Self {
        Annotations(iter.into_iter().collect())
    }
}
