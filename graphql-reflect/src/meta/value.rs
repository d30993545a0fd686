//! Runtime application values.
//!
//! Resolvers hand [`Value`]s back and forth with the host application: arguments are converted
//! into values before an [`Invoker`] runs, and whatever the invoker produces is wrapped in an
//! [`Output`] so synchronous, asynchronous and streaming members share one calling convention.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::TimeDelta;
use chrono::Utc;
use chrono_tz::Tz;
use displaydoc::Display;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use indexmap::IndexMap;
use parking_lot::RwLock;
use thiserror::Error;
use tower::BoxError;

use super::ClassName;

/// An application value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum(EnumValue),
    List(Vec<Value>),
    Object(Object),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Duration(TimeDelta),
    Timezone(Tz),
    Opaque(Opaque),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Enum(e) => Some(&e.constant),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Name of the class this value is a runtime instance of.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some("Boolean"),
            Value::Int(_) => Some("Long"),
            Value::Float(_) => Some("Float"),
            Value::String(_) => Some("String"),
            Value::Enum(e) => Some(&e.class),
            Value::List(_) => Some("Vec"),
            Value::Object(o) => Some(o.class()),
            Value::DateTime(_) => Some("DateTime"),
            Value::Date(_) => Some("Date"),
            Value::Duration(_) => Some("Duration"),
            Value::Timezone(_) => Some("Timezone"),
            Value::Opaque(o) => Some(&o.class),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Enum(e) => write!(f, "Enum({}.{})", e.class, e.constant),
            Value::List(l) => f.debug_list().entries(l).finish(),
            Value::Object(o) => o.fmt(f),
            Value::DateTime(d) => f.debug_tuple("DateTime").field(d).finish(),
            Value::Date(d) => f.debug_tuple("Date").field(d).finish(),
            Value::Duration(d) => f.debug_tuple("Duration").field(d).finish(),
            Value::Timezone(tz) => f.debug_tuple("Timezone").field(tz).finish(),
            Value::Opaque(o) => write!(f, "Opaque({})", o.class),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Timezone(a), Value::Timezone(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// One constant of an enum class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub class: ClassName,
    pub constant: Arc<str>,
}

impl EnumValue {
    pub fn new(class: impl Into<ClassName>, constant: impl Into<Arc<str>>) -> Self {
        Self {
            class: class.into(),
            constant: constant.into(),
        }
    }
}

/// A shared handle on an instance of an application class.
#[derive(Clone)]
pub struct Object(Arc<Instance>);

struct Instance {
    class: ClassName,
    properties: RwLock<IndexMap<Arc<str>, Value>>,
}

impl Object {
    pub fn new(class: impl Into<ClassName>) -> Self {
        Object(Arc::new(Instance {
            class: class.into(),
            properties: Default::default(),
        }))
    }

    pub fn with(self, property: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.set(property, value.into());
        self
    }

    pub fn class(&self) -> &str {
        &self.0.class
    }

    pub fn get(&self, property: &str) -> Value {
        self.0
            .properties
            .read()
            .get(property)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set(&self, property: impl Into<Arc<str>>, value: Value) {
        self.0.properties.write().insert(property.into(), value);
    }

    /// A snapshot of the instance's properties, in assignment order.
    pub fn properties(&self) -> Vec<(Arc<str>, Value)> {
        self.0
            .properties
            .read()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.0.class == other.0.class
                && *self.0.properties.read() == *other.0.properties.read())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(&self.0.class);
        for (name, value) in self.0.properties.read().iter() {
            s.field(name, value);
        }
        s.finish()
    }
}

/// A host value the schema never looks into, tagged with the class it stands for.
#[derive(Clone)]
pub struct Opaque {
    pub class: ClassName,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(class: impl Into<ClassName>, inner: T) -> Self {
        Self {
            class: class.into(),
            inner: Arc::new(inner),
        }
    }

    pub fn from_arc(class: impl Into<ClassName>, inner: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            class: class.into(),
            inner,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

/// What a member invocation produced.
pub enum Output {
    Value(Value),
    Future(BoxFuture<'static, Result<Value, BoxError>>),
    Stream(BoxStream<'static, Result<Value, BoxError>>),
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Output::Future(_) => f.write_str("Future"),
            Output::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl<T: Into<Value>> From<T> for Output {
    fn from(value: T) -> Self {
        Output::Value(value.into())
    }
}

/// Invoker failures.
#[derive(Error, Display, Debug)]
pub enum InvocationError {
    /// {0}
    Target(BoxError),

    /// cannot invoke '{member}': {reason}
    IllegalAccess { member: String, reason: String },
}

impl InvocationError {
    /// Strips one level of invocation wrapping.
    pub fn unwrap_target(self) -> BoxError {
        match self {
            InvocationError::Target(inner) => inner,
            other => other.into(),
        }
    }
}

/// Calls a member: `(receiver, arguments) -> output`.
pub type Invoker =
    Arc<dyn Fn(Option<&Value>, Vec<Value>) -> Result<Output, InvocationError> + Send + Sync>;
