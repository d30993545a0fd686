//! Directives derived from annotations.
//!
//! Two kinds of annotation classes contribute directives:
//!
//! * classes annotated `Directive` are emitted into the schema as directive definitions, and
//!   every use of the annotation becomes an applied directive on the annotated element;
//! * classes annotated `DataFetcherWrapper` are programmatic: the annotation's `value` names a
//!   [`DirectiveHandler`] registered on the schema builder, which wraps the fetcher of every
//!   annotated member.

pub mod authorization;
pub mod restriction;

use std::fmt;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::ast::Argument;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::DirectiveDefinition;
use apollo_compiler::ast::DirectiveLocation;
use apollo_compiler::ast::InputValueDefinition;
use apollo_compiler::ast::IntValue;
use apollo_compiler::name;
use apollo_compiler::schema;
use apollo_compiler::schema::Component;
use async_trait::async_trait;
use heck::ToLowerCamelCase;
use indexmap::IndexMap;

use self::restriction::RestrictionFactory;
use crate::entity;
use crate::entity::EntityRegistry;
use crate::error::FieldError;
use crate::error::SchemaError;
use crate::fetcher::DataFetcher;
use crate::fetcher::Environment;
use crate::fetcher::Resolved;
use crate::meta::Annotation;
use crate::meta::Annotations;
use crate::meta::ClassKind;
use crate::meta::ClassMeta;
use crate::meta::ClassName;
use crate::meta::DATA_FETCHER_WRAPPER;
use crate::meta::DEPRECATED;
use crate::meta::DIRECTIVE;
use crate::meta::GenericBindings;
use crate::meta::Value;
use crate::scalars::format_duration;
use crate::type_shape::TypeShape;

/// Wraps the data fetcher of every member carrying the annotation it handles.
#[async_trait]
pub trait DirectiveHandler: Send + Sync {
    /// Simple class name of the annotation this handler is wired to.
    fn annotation(&self) -> &str;

    /// Resolves the field, typically by calling `next` and transforming its result.
    async fn wrap(
        &self,
        annotation: &Annotation,
        env: Environment,
        next: DataFetcher,
    ) -> Result<Resolved, FieldError>;
}

/// Handlers, restriction factories and authorizers registered on the schema builder.
#[derive(Clone, Default)]
pub(crate) struct Policies {
    pub(crate) handlers: IndexMap<Arc<str>, Arc<dyn DirectiveHandler>>,
    pub(crate) factories: IndexMap<Arc<str>, Arc<dyn RestrictionFactory>>,
    /// Restriction factory guarding a class, for classes without a `Restrict` annotation.
    pub(crate) restricted: IndexMap<ClassName, Arc<str>>,
    /// Authorizer class by package.
    pub(crate) authorizers: IndexMap<Arc<str>, ClassName>,
}

impl fmt::Debug for Policies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policies")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("restricted", &self.restricted)
            .field("authorizers", &self.authorizers)
            .finish()
    }
}

/// A directive emitted into the schema, derived from an annotation class.
#[derive(Debug)]
pub struct SchemaDirective {
    definition: Node<DirectiveDefinition>,
    /// Accessor name and default value, in declaration order.
    accessors: Vec<(Name, Option<Value>)>,
}

impl SchemaDirective {
    pub fn definition(&self) -> &Node<DirectiveDefinition> {
        &self.definition
    }

    /// The directive applied by one use of the annotation. Accessors that are neither set nor
    /// defaulted are left out.
    pub fn apply(&self, annotation: &Annotation) -> Directive {
        let arguments = self
            .accessors
            .iter()
            .filter_map(|(accessor, default)| {
                let value = annotation.get(accessor).or(default.as_ref())?;
                (!value.is_null()).then(|| {
                    Node::new(Argument {
                        name: accessor.clone(),
                        value: Node::new(to_ast_value(value)),
                    })
                })
            })
            .collect();
        Directive {
            name: self.definition.name.clone(),
            arguments,
        }
    }
}

/// Defines the schema directive of an annotation class marked `Directive`.
///
/// The directive is named after the class in lower camel case. Its arguments are the class's
/// accessors, and its locations come from the marker's `locations`, defaulting to every
/// type-system location.
pub(crate) fn define(
    registry: &mut EntityRegistry,
    class: &Arc<ClassMeta>,
) -> Result<Arc<SchemaDirective>, SchemaError> {
    if let Some(defined) = registry.schema_directive(&class.name) {
        return Ok(defined);
    }
    let Some(marker) = class.annotations.get(DIRECTIVE) else {
        return Err(SchemaError::UnsupportedShape {
            ty: class.qualified_name(),
            reason: "annotation class is not marked as a directive".to_string(),
        });
    };

    let mut arguments = Vec::with_capacity(class.methods.len());
    let mut accessors = Vec::with_capacity(class.methods.len());
    for accessor in class.methods.iter().filter(|m| m.params.is_empty()) {
        let shape = TypeShape::resolve(
            registry.class_path(),
            &accessor.return_type,
            &GenericBindings::new(),
        )?;
        let argument = entity::name(&accessor.name)?;
        arguments.push(Node::new(InputValueDefinition {
            description: accessor.annotations.description().map(Into::into),
            name: argument.clone(),
            ty: Node::new(registry.get_input_type(&shape, &accessor.annotations)?),
            default_value: accessor
                .default_value
                .as_ref()
                .map(|value| Node::new(to_ast_value(value))),
            directives: Default::default(),
        }));
        accessors.push((argument, accessor.default_value.clone()));
    }

    let declared = marker.strings("locations");
    let locations = if declared.is_empty() {
        TYPE_SYSTEM_LOCATIONS.to_vec()
    } else {
        declared
            .into_iter()
            .filter_map(|location| {
                let parsed = parse_location(location);
                if parsed.is_none() {
                    tracing::warn!(
                        directive = %class.name,
                        location,
                        "ignoring unknown directive location"
                    );
                }
                parsed
            })
            .collect()
    };

    let directive = Arc::new(SchemaDirective {
        definition: Node::new(DirectiveDefinition {
            description: class.annotations.description().map(Into::into),
            name: entity::name(&class.name.to_lower_camel_case())?,
            arguments,
            repeatable: marker
                .get("repeatable")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            locations,
        }),
        accessors,
    });
    tracing::debug!(directive = %directive.definition.name, "defined schema directive");
    registry.insert_schema_directive(class.name.clone(), directive.clone())?;
    Ok(directive)
}

const TYPE_SYSTEM_LOCATIONS: &[DirectiveLocation] = &[
    DirectiveLocation::Schema,
    DirectiveLocation::Scalar,
    DirectiveLocation::Object,
    DirectiveLocation::FieldDefinition,
    DirectiveLocation::ArgumentDefinition,
    DirectiveLocation::Interface,
    DirectiveLocation::Union,
    DirectiveLocation::Enum,
    DirectiveLocation::EnumValue,
    DirectiveLocation::InputObject,
    DirectiveLocation::InputFieldDefinition,
];

fn parse_location(location: &str) -> Option<DirectiveLocation> {
    TYPE_SYSTEM_LOCATIONS
        .iter()
        .find(|known| known.to_string() == location)
        .cloned()
}

/// The schema directives applied by `annotations`, in declaration order.
///
/// `Deprecated` maps to the built-in `@deprecated`. Annotation classes marked `Directive` that
/// were not defined yet (they live outside the scanned packages) are defined on first use.
pub(crate) fn applied(
    registry: &mut EntityRegistry,
    annotations: &Annotations,
) -> Result<Vec<Directive>, SchemaError> {
    let mut directives = Vec::new();
    for annotation in annotations.iter() {
        if &*annotation.name == DEPRECATED {
            directives.push(deprecated(annotation));
            continue;
        }
        let directive = match registry.schema_directive(&annotation.name) {
            Some(directive) => directive,
            None => {
                let Some(class) = registry.class_path().get(&annotation.name).cloned() else {
                    continue;
                };
                if class.kind != ClassKind::Annotation || !class.annotations.has(DIRECTIVE) {
                    continue;
                }
                define(registry, &class)?
            }
        };
        directives.push(directive.apply(annotation));
    }
    Ok(directives)
}

fn deprecated(annotation: &Annotation) -> Directive {
    let reason = annotation.str("reason").or_else(|| annotation.str("value"));
    Directive {
        name: name!("deprecated"),
        arguments: reason
            .map(|reason| {
                Node::new(Argument {
                    name: name!("reason"),
                    value: Node::new(ast::Value::String(reason.into())),
                })
            })
            .into_iter()
            .collect(),
    }
}

pub(crate) fn ast_list(directives: Vec<Directive>) -> ast::DirectiveList {
    ast::DirectiveList(directives.into_iter().map(Node::new).collect())
}

pub(crate) fn component_list(directives: Vec<Directive>) -> schema::DirectiveList {
    schema::DirectiveList(directives.into_iter().map(Component::new).collect())
}

/// The handler wired to a programmatic annotation class, or `None` for any other class.
pub(crate) fn handler_for(
    registry: &EntityRegistry,
    class: &ClassMeta,
) -> Result<Option<Arc<dyn DirectiveHandler>>, SchemaError> {
    let Some(marker) = class.annotations.get(DATA_FETCHER_WRAPPER) else {
        return Ok(None);
    };
    let handler_name = marker.str("value").unwrap_or_default();
    let handler = registry
        .policies()
        .handlers
        .get(handler_name)
        .cloned()
        .ok_or_else(|| SchemaError::UnknownDirectiveHandler {
            annotation: class.qualified_name(),
            handler: handler_name.to_string(),
        })?;
    if handler.annotation() != &*class.name {
        return Err(SchemaError::AnnotationTargetMismatch {
            annotation: class.name.to_string(),
            handler: handler_name.to_string(),
            expected: handler.annotation().to_string(),
        });
    }
    Ok(Some(handler))
}

/// Wraps `fetcher` with the handler of every programmatic annotation on `member`.
///
/// Handlers apply in declaration order, each wrapping the previous one, so the last declared
/// annotation runs outermost.
pub(crate) fn wrap(
    registry: &EntityRegistry,
    member: &str,
    annotations: &Annotations,
    mut fetcher: DataFetcher,
) -> Result<DataFetcher, SchemaError> {
    for annotation in annotations.iter() {
        let Some(class) = registry.class_path().get(&annotation.name) else {
            continue;
        };
        let Some(handler) = handler_for(registry, class)? else {
            continue;
        };
        tracing::debug!(member, annotation = %annotation.name, "wrapping data fetcher");
        let annotation = Arc::new(annotation.clone());
        let next = fetcher;
        fetcher = Arc::new(move |env: Environment| {
            let handler = handler.clone();
            let annotation = annotation.clone();
            let next = next.clone();
            Box::pin(async move { handler.wrap(&annotation, env, next).await })
        });
    }
    Ok(fetcher)
}

/// Renders an application value as a GraphQL literal.
pub(crate) fn to_ast_value(value: &Value) -> ast::Value {
    match value {
        Value::Null | Value::Opaque(_) => ast::Value::Null,
        Value::Boolean(b) => ast::Value::Boolean(*b),
        Value::Int(i) => ast::Value::Int(IntValue::new_parsed(&i.to_string())),
        Value::Float(f) if f.is_finite() => ast::Value::Float((*f).into()),
        Value::Float(_) => ast::Value::Null,
        Value::String(s) => ast::Value::String(s.as_str().into()),
        Value::Enum(e) => match Name::new(&e.constant) {
            Ok(constant) => ast::Value::Enum(constant),
            Err(_) => ast::Value::String(e.constant.to_string()),
        },
        Value::List(items) => {
            ast::Value::List(items.iter().map(|item| Node::new(to_ast_value(item))).collect())
        }
        Value::Object(object) => ast::Value::Object(
            object
                .properties()
                .into_iter()
                .filter_map(|(property, value)| {
                    let property = Name::new(&property).ok()?;
                    Some((property, Node::new(to_ast_value(&value))))
                })
                .collect(),
        ),
        Value::DateTime(date_time) => ast::Value::String(
            date_time.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
        ),
        Value::Date(date) => ast::Value::String(date.to_string()),
        Value::Duration(duration) => ast::Value::String(format_duration(*duration)),
        Value::Timezone(tz) => ast::Value::String(tz.name().to_string()),
    }
}
