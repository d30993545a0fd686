//! Class metadata.
//!
//! The schema is derived from a description of the application's classes rather than from an
//! SDL document. The host (or a code generator) describes each class once: its kind, generic
//! parameters, declared supertypes, annotations and members, together with the [`Invoker`]s
//! that call into application code. [`ClassPath`] indexes those descriptions.

mod annotation;
pub(crate) mod class_path;
mod value;

use std::fmt;
use std::sync::Arc;

use heck::ToUpperCamelCase;
use indexmap::IndexMap;

pub use self::annotation::*;
pub use self::class_path::ClassPath;
pub use self::class_path::Supertype;
pub use self::value::EnumValue;
pub use self::value::InvocationError;
pub use self::value::Invoker;
pub use self::value::Object;
pub use self::value::Opaque;
pub use self::value::Output;
pub use self::value::Value;
use crate::type_shape::Modifier;

/// Simple class name, unique within a [`ClassPath`].
pub type ClassName = Arc<str>;

/// Type variable name → concrete type.
pub type GenericBindings = IndexMap<Arc<str>, TypeRef>;

/// The universal base class every class implicitly extends.
pub const OBJECT_CLASS: &str = "Object";
/// The per-field request environment, injectable into any resolver.
pub const ENVIRONMENT_CLASS: &str = "Environment";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Abstract,
    Interface,
    Record,
    Enum,
    Annotation,
}

impl ClassKind {
    pub fn is_abstract(self) -> bool {
        matches!(self, ClassKind::Abstract | ClassKind::Interface)
    }
}

/// A declared type occurrence.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Class { name: ClassName, args: Vec<TypeRef> },
    Array(Box<TypeRef>),
    Var(Arc<str>),
}

impl TypeRef {
    pub fn class(name: impl Into<ClassName>) -> Self {
        TypeRef::Class {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<ClassName>, args: impl IntoIterator<Item = TypeRef>) -> Self {
        TypeRef::Class {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn array(inner: TypeRef) -> Self {
        TypeRef::Array(Box::new(inner))
    }

    pub fn var(name: impl Into<Arc<str>>) -> Self {
        TypeRef::Var(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        Self::generic("Vec", [inner])
    }

    pub fn optional(inner: TypeRef) -> Self {
        Self::generic("Option", [inner])
    }

    pub fn future(inner: TypeRef) -> Self {
        Self::generic("Future", [inner])
    }

    pub fn stream(inner: TypeRef) -> Self {
        Self::generic("Stream", [inner])
    }

    /// Replaces type variables with their bindings. Returns the first unbound variable on failure.
    pub fn substitute(&self, bindings: &GenericBindings) -> Result<TypeRef, Arc<str>> {
        Ok(match self {
            TypeRef::Var(var) => bindings.get(var).cloned().ok_or_else(|| var.clone())?,
            TypeRef::Array(inner) => TypeRef::array(inner.substitute(bindings)?),
            TypeRef::Class { name, args } => TypeRef::Class {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|arg| arg.substitute(bindings))
                    .collect::<Result<_, _>>()?,
            },
        })
    }

    /// Name fragment contributed to an entity key by a generic binding.
    pub(crate) fn key_fragment(&self) -> String {
        match self {
            TypeRef::Var(var) => var.to_string(),
            TypeRef::Array(inner) => format!("Array_{}", inner.key_fragment()),
            TypeRef::Class { name, args } => std::iter::once(name.to_string())
                .chain(args.iter().map(TypeRef::key_fragment))
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Var(var) => f.write_str(var),
            TypeRef::Array(inner) => write!(f, "{inner}[]"),
            TypeRef::Class { name, args } if args.is_empty() => f.write_str(name),
            TypeRef::Class { name, args } => {
                write!(f, "{name}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_synthetic: bool,
}

#[derive(Clone, Debug)]
pub struct ParamMeta {
    pub name: Arc<str>,
    pub ty: TypeRef,
    pub annotations: Annotations,
}

impl ParamMeta {
    pub fn new(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Annotations::default(),
        }
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// A method, including annotation accessors.
#[derive(Clone)]
pub struct MethodMeta {
    pub name: Arc<str>,
    /// Filled in when the method is added to a class.
    pub declaring_class: ClassName,
    pub params: Vec<ParamMeta>,
    pub return_type: TypeRef,
    pub annotations: Annotations,
    pub modifiers: Modifiers,
    /// Default of an annotation accessor.
    pub default_value: Option<Value>,
    pub invoker: Option<Invoker>,
}

impl MethodMeta {
    pub fn new(name: impl Into<Arc<str>>, return_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            declaring_class: OBJECT_CLASS.into(),
            params: Vec::new(),
            return_type,
            annotations: Annotations::default(),
            modifiers: Modifiers::default(),
            default_value: None,
            invoker: None,
        }
    }

    /// `get<Property>()` reading the property off the receiver.
    pub fn getter(property: &str, ty: TypeRef) -> Self {
        Self::property_reader(format!("get{}", property.to_upper_camel_case()), property, ty)
    }

    /// `is<Property>()` reading a boolean property off the receiver.
    pub fn is_getter(property: &str) -> Self {
        Self::property_reader(
            format!("is{}", property.to_upper_camel_case()),
            property,
            TypeRef::class("Boolean"),
        )
    }

    fn property_reader(name: String, property: &str, ty: TypeRef) -> Self {
        let property: Arc<str> = property.into();
        let member = name.clone();
        Self::new(name, ty).invoke_with(move |receiver, _| match receiver {
            Some(Value::Object(object)) => Ok(Output::Value(object.get(&property))),
            _ => Err(InvocationError::IllegalAccess {
                member: member.clone(),
                reason: "receiver is not an object".to_string(),
            }),
        })
    }

    /// `set<Property>(value)` writing the property on the receiver.
    pub fn setter(property: &str, ty: TypeRef) -> Self {
        let name = format!("set{}", property.to_upper_camel_case());
        let member = name.clone();
        let property: Arc<str> = property.into();
        let param = ParamMeta::new(property.clone(), ty);
        Self::new(name, TypeRef::class("void"))
            .param(param)
            .invoke_with(move |receiver, mut args| match (receiver, args.pop()) {
                (Some(Value::Object(object)), Some(value)) => {
                    object.set(property.clone(), value);
                    Ok(Output::Value(Value::Null))
                }
                _ => Err(InvocationError::IllegalAccess {
                    member: member.clone(),
                    reason: "expected an object receiver and one argument".to_string(),
                }),
            })
    }

    pub fn param(mut self, param: ParamMeta) -> Self {
        self.params.push(param);
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn as_static(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }

    pub fn as_abstract(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self.invoker = None;
        self
    }

    pub fn as_synthetic(mut self) -> Self {
        self.modifiers.is_synthetic = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn invoke_with<F>(mut self, invoker: F) -> Self
    where
        F: Fn(Option<&Value>, Vec<Value>) -> Result<Output, InvocationError>
            + Send
            + Sync
            + 'static,
    {
        self.invoker = Some(Arc::new(invoker));
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_class, self.name)
    }
}

impl fmt::Debug for MethodMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodMeta")
            .field("name", &self.name)
            .field("declaring_class", &self.declaring_class)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .field("modifiers", &self.modifiers)
            .finish_non_exhaustive()
    }
}

/// A declared instance (or static) field.
#[derive(Clone, Debug)]
pub struct FieldMeta {
    pub name: Arc<str>,
    pub ty: TypeRef,
    pub annotations: Annotations,
    pub modifiers: Modifiers,
}

impl FieldMeta {
    pub fn new(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Annotations::default(),
            modifiers: Modifiers::default(),
        }
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn as_static(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }
}

#[derive(Clone)]
pub struct ConstructorMeta {
    pub params: Vec<ParamMeta>,
    pub invoker: Invoker,
}

impl ConstructorMeta {
    pub fn new<F>(params: Vec<ParamMeta>, invoker: F) -> Self
    where
        F: Fn(Option<&Value>, Vec<Value>) -> Result<Output, InvocationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            params,
            invoker: Arc::new(invoker),
        }
    }

    /// Zero-argument constructor producing an empty instance.
    fn empty(class: ClassName) -> Self {
        Self::new(Vec::new(), move |_, _| {
            Ok(Output::Value(Value::Object(Object::new(class.clone()))))
        })
    }

    /// Positional constructor assigning each declared instance field in order.
    fn canonical(class: ClassName, fields: &[FieldMeta]) -> Self {
        let params: Vec<_> = fields
            .iter()
            .filter(|f| !f.modifiers.is_static)
            .map(|f| ParamMeta::new(f.name.clone(), f.ty.clone()))
            .collect();
        let names: Vec<Arc<str>> = params.iter().map(|p| p.name.clone()).collect();
        Self::new(params, move |_, args| {
            let object = Object::new(class.clone());
            for (name, value) in names.iter().zip(args) {
                object.set(name.clone(), value);
            }
            Ok(Output::Value(Value::Object(object)))
        })
    }
}

impl fmt::Debug for ConstructorMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorMeta")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct EnumConstant {
    pub name: Arc<str>,
    pub annotations: Annotations,
}

#[derive(Clone, Debug)]
pub struct ClassMeta {
    pub name: ClassName,
    pub package: Arc<str>,
    pub kind: ClassKind,
    pub type_params: Vec<Arc<str>>,
    pub superclass: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub annotations: Annotations,
    pub methods: Vec<Arc<MethodMeta>>,
    pub fields: Vec<FieldMeta>,
    pub constructors: Vec<ConstructorMeta>,
    pub constants: Vec<EnumConstant>,
    /// Set on container classes the type-shape resolver unwraps.
    pub wrapper: Option<Modifier>,
}

impl ClassMeta {
    pub fn builder(name: impl Into<ClassName>) -> ClassBuilder {
        ClassBuilder::new(name.into())
    }

    pub fn qualified_name(&self) -> String {
        if self.package.is_empty() {
            self.name.to_string()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodMeta>> {
        self.methods.iter().find(|m| &*m.name == name)
    }

    pub fn is_entity(&self) -> bool {
        self.annotations.has(ENTITY)
    }
}

/// Assembles a [`ClassMeta`].
pub struct ClassBuilder {
    class: ClassMeta,
}

impl ClassBuilder {
    fn new(name: ClassName) -> Self {
        Self {
            class: ClassMeta {
                name,
                package: "".into(),
                kind: ClassKind::Class,
                type_params: Vec::new(),
                superclass: None,
                interfaces: Vec::new(),
                annotations: Annotations::default(),
                methods: Vec::new(),
                fields: Vec::new(),
                constructors: Vec::new(),
                constants: Vec::new(),
                wrapper: None,
            },
        }
    }

    pub fn package(mut self, package: impl Into<Arc<str>>) -> Self {
        self.class.package = package.into();
        self
    }

    pub fn kind(mut self, kind: ClassKind) -> Self {
        self.class.kind = kind;
        self
    }

    pub fn type_param(mut self, name: impl Into<Arc<str>>) -> Self {
        self.class.type_params.push(name.into());
        self
    }

    pub fn extends(mut self, superclass: TypeRef) -> Self {
        self.class.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: TypeRef) -> Self {
        self.class.interfaces.push(interface);
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.class.annotations.push(annotation);
        self
    }

    /// Shorthand for `annotate(Annotation::new(ENTITY))`.
    pub fn entity(self) -> Self {
        self.annotate(Annotation::new(ENTITY))
    }

    pub fn method(mut self, method: MethodMeta) -> Self {
        self.class.methods.push(Arc::new(method));
        self
    }

    pub fn field(mut self, field: FieldMeta) -> Self {
        self.class.fields.push(field);
        self
    }

    pub fn constructor(mut self, constructor: ConstructorMeta) -> Self {
        self.class.constructors.push(constructor);
        self
    }

    pub fn constant(mut self, name: impl Into<Arc<str>>) -> Self {
        self.class.constants.push(EnumConstant {
            name: name.into(),
            annotations: Annotations::default(),
        });
        self
    }

    pub fn annotated_constant(mut self, name: impl Into<Arc<str>>, annotation: Annotation) -> Self {
        let mut annotations = Annotations::default();
        annotations.push(annotation);
        self.class.constants.push(EnumConstant {
            name: name.into(),
            annotations,
        });
        self
    }

    pub fn wrapper(mut self, modifier: Modifier) -> Self {
        self.class.wrapper = Some(modifier);
        self
    }

    pub fn build(self) -> ClassMeta {
        let mut class = self.class;
        let owner = class.name.clone();
        for method in &mut class.methods {
            Arc::make_mut(method).declaring_class = owner.clone();
        }
        if class.constructors.is_empty() {
            match class.kind {
                ClassKind::Class => class.constructors.push(ConstructorMeta::empty(owner)),
                ClassKind::Record => class
                    .constructors
                    .push(ConstructorMeta::canonical(owner, &class.fields)),
                _ => {}
            }
        }
        class
    }
}
