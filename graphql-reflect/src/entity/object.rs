//! Object, interface and input object types derived from class members.
//!
//! Output fields come from getters (`getName()`, or `isActive()` returning a boolean) declared on
//! the class or any of its supertypes; for records they come from the declared fields. A getter
//! may declare parameters: contextual ones are injected, the rest become field arguments. Input
//! fields come from single-argument setters, or from the record's canonical constructor.
//!
//! An abstract entity emits an interface. A concrete entity that other entities extend emits an
//! interface under its own name plus a concrete object under the direct name, so a field typed
//! with the entity can still return an instance of the class itself.

use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::ast::InputValueDefinition;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::InputObjectType;
use apollo_compiler::schema::InterfaceType;
use apollo_compiler::schema::ObjectType;
use serde_json_bytes::Value as JsonValue;

use super::EntityHolder;
use super::EntityKind;
use super::EntityRegistry;
use super::ValueResolver;
use super::name;
use super::not_an_input;
use super::type_resolver;
use crate::code_registry::FieldCoordinate;
use crate::directives;
use crate::error::ConversionError;
use crate::error::SchemaError;
use crate::fetcher;
use crate::meta::Annotations;
use crate::meta::ClassMeta;
use crate::meta::ClassName;
use crate::meta::GenericBindings;
use crate::meta::IGNORE;
use crate::meta::INPUT_IGNORE;
use crate::meta::Invoker;
use crate::meta::MethodMeta;
use crate::meta::Output;
use crate::meta::TypeRef;
use crate::meta::Value;
use crate::type_shape::TypeShape;

type Fields = IndexMap<Name, Component<FieldDefinition>>;

/// A class in the inheritance chain, with its type parameters bound.
struct Scope {
    class: Arc<ClassMeta>,
    bindings: GenericBindings,
}

/// A member contributing one field, with the bindings of its declaring scope.
struct Member {
    field: String,
    method: Arc<MethodMeta>,
    bindings: GenericBindings,
}

pub(super) fn build(
    registry: &mut EntityRegistry,
    holder: &Arc<EntityHolder>,
) -> Result<(), SchemaError> {
    let class = holder.class().clone();
    let mut scopes = vec![Scope {
        class: class.clone(),
        bindings: holder.bindings().clone(),
    }];
    scopes.extend(
        registry
            .class_path()
            .supertypes(&class, holder.bindings())?
            .into_iter()
            .map(|supertype| Scope {
                class: supertype.class,
                bindings: supertype.bindings,
            }),
    );

    if let Some(output) = holder.output_name().cloned() {
        let implements = interfaces(registry, &scopes[1..])?;
        let is_interface = holder.object_name() != Some(&output);
        if is_interface {
            let fields = interface_fields(registry, holder, &scopes)?;
            let directives = directives::applied(registry, &class.annotations)?;
            registry.insert_type(ExtendedType::Interface(Node::new(InterfaceType {
                description: class.annotations.description().map(Into::into),
                name: output.clone(),
                implements_interfaces: implements.clone(),
                directives: directives::component_list(directives),
                fields,
            })))?;
        }
        if let Some(object) = holder.object_name().cloned() {
            let mut implements = implements;
            if is_interface {
                implements.insert(ComponentName::from(output.clone()));
            }
            let fields = object_fields(registry, holder, &object, &scopes)?;
            let directives = directives::applied(registry, &class.annotations)?;
            registry.insert_type(ExtendedType::Object(Node::new(ObjectType {
                description: class.annotations.description().map(Into::into),
                name: object,
                implements_interfaces: implements,
                directives: directives::component_list(directives),
                fields,
            })))?;
        }
        if is_interface {
            type_resolver::register_interface(registry, holder)?;
        }
    }

    let resolver = match holder.input_name().cloned() {
        Some(input) if !class.kind.is_abstract() => match holder.kind() {
            EntityKind::Record => record_input(registry, holder, input)?,
            _ => object_input(registry, holder, input, &scopes)?,
        },
        _ => not_an_input(class.name.clone()),
    };
    holder.set_resolver(resolver);
    Ok(())
}

/// The output types of every entity ancestor, nearest first.
fn interfaces(
    registry: &mut EntityRegistry,
    ancestors: &[Scope],
) -> Result<IndexSet<ComponentName>, SchemaError> {
    let mut implements = IndexSet::default();
    for scope in ancestors.iter().filter(|scope| scope.class.is_entity()) {
        let ancestor = registry.build_entity(&scope.class, &scope.bindings)?;
        if !matches!(ancestor.kind(), EntityKind::Object | EntityKind::Record) {
            continue;
        }
        if let Some(output) = ancestor.output_name() {
            implements.insert(ComponentName::from(output.clone()));
        }
    }
    Ok(implements)
}

fn interface_fields(
    registry: &mut EntityRegistry,
    holder: &EntityHolder,
    scopes: &[Scope],
) -> Result<Fields, SchemaError> {
    if holder.kind() == EntityKind::Record {
        return record_fields(registry, holder, None);
    }
    let mut fields = Fields::default();
    for member in getters(scopes) {
        let (arguments, shape) = fetcher::signature(registry, &member.method, &member.bindings)?;
        let ty = registry.get_type(&shape, &member.method.annotations)?;
        let field_name = name(&member.field)?;
        let directives = directives::applied(registry, &member.method.annotations)?;
        fields.insert(
            field_name.clone(),
            Component::new(FieldDefinition {
                description: member.method.annotations.description().map(Into::into),
                name: field_name,
                arguments,
                ty,
                directives: directives::ast_list(directives),
            }),
        );
    }
    Ok(fields)
}

fn object_fields(
    registry: &mut EntityRegistry,
    holder: &EntityHolder,
    object: &Name,
    scopes: &[Scope],
) -> Result<Fields, SchemaError> {
    if holder.kind() == EntityKind::Record {
        return record_fields(registry, holder, Some(object));
    }
    let mut fields = Fields::default();
    for member in getters(scopes) {
        let compiled = fetcher::compile(registry, &member.method, &member.bindings)?;
        let ty = registry.get_type(&compiled.shape, &member.method.annotations)?;
        let field_name = name(&member.field)?;
        let fetcher = registry.restrict(&compiled.shape, compiled.fetcher)?;
        registry.code_registry_mut().register_fetcher(
            FieldCoordinate::new(object.clone(), field_name.clone()),
            fetcher,
        );
        let directives = directives::applied(registry, &member.method.annotations)?;
        fields.insert(
            field_name.clone(),
            Component::new(FieldDefinition {
                description: member.method.annotations.description().map(Into::into),
                name: field_name,
                arguments: compiled.arguments,
                ty,
                directives: directives::ast_list(directives),
            }),
        );
    }
    Ok(fields)
}

/// Output fields of a record: its declared instance fields, read straight off the value.
fn record_fields(
    registry: &mut EntityRegistry,
    holder: &EntityHolder,
    object: Option<&Name>,
) -> Result<Fields, SchemaError> {
    let class = holder.class().clone();
    let mut fields = Fields::default();
    for field in class
        .fields
        .iter()
        .filter(|field| !field.modifiers.is_static && !field.annotations.has(IGNORE))
    {
        let shape = TypeShape::resolve(registry.class_path(), &field.ty, holder.bindings())?;
        let ty = registry.get_type(&shape, &field.annotations)?;
        let field_name = name(&field.name)?;
        if let Some(object) = object {
            let fetcher = registry.restrict(&shape, fetcher::property(field.name.clone()))?;
            registry.code_registry_mut().register_fetcher(
                FieldCoordinate::new(object.clone(), field_name.clone()),
                fetcher,
            );
        }
        let directives = directives::applied(registry, &field.annotations)?;
        fields.insert(
            field_name.clone(),
            Component::new(FieldDefinition {
                description: field.annotations.description().map(Into::into),
                name: field_name,
                arguments: Vec::new(),
                ty,
                directives: directives::ast_list(directives),
            }),
        );
    }
    Ok(fields)
}

/// Getters visible on the class, one per field name, nearest declaration first. A concrete
/// declaration further up the chain replaces an abstract one.
fn getters(scopes: &[Scope]) -> Vec<Member> {
    let mut members: IndexMap<String, Member> = IndexMap::default();
    for scope in scopes {
        for method in &scope.class.methods {
            let Some(field) = getter_property(method) else {
                continue;
            };
            let replaces = match members.get(&field) {
                None => true,
                Some(existing) => {
                    existing.method.modifiers.is_abstract && !method.modifiers.is_abstract
                }
            };
            if replaces {
                members.insert(
                    field.clone(),
                    Member {
                        field,
                        method: method.clone(),
                        bindings: scope.bindings.clone(),
                    },
                );
            }
        }
    }
    members.into_values().collect()
}

fn getter_property(method: &MethodMeta) -> Option<String> {
    if method.modifiers.is_static
        || method.modifiers.is_synthetic
        || method.annotations.has(IGNORE)
    {
        return None;
    }
    if let Some(property) = accessor_suffix(&method.name, "get") {
        return (!is_class(&method.return_type, "void")).then(|| decapitalize(property));
    }
    accessor_suffix(&method.name, "is")
        .filter(|_| is_class(&method.return_type, "Boolean"))
        .map(decapitalize)
}

fn setter_property(method: &MethodMeta) -> Option<String> {
    if method.modifiers.is_static
        || method.params.len() != 1
        || method.annotations.has(IGNORE)
        || method.annotations.has(INPUT_IGNORE)
    {
        return None;
    }
    accessor_suffix(&method.name, "set").map(decapitalize)
}

fn accessor_suffix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix)
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
}

fn is_class(ty: &TypeRef, class: &str) -> bool {
    matches!(ty, TypeRef::Class { name, .. } if &**name == class)
}

/// `Name` becomes `name`, but an acronym such as `URL` is kept as is.
fn decapitalize(property: &str) -> String {
    let mut chars = property.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_uppercase() => {
            property.to_string()
        }
        (Some(first), _) => first
            .to_lowercase()
            .chain(property[first.len_utf8()..].chars())
            .collect(),
        (None, _) => String::new(),
    }
}

struct Assignment {
    field: String,
    setter: Invoker,
    resolver: ValueResolver,
}

/// Input object of a class: one field per setter. Inputs construct an empty instance and call
/// the setters of the fields present.
fn object_input(
    registry: &mut EntityRegistry,
    holder: &EntityHolder,
    input: Name,
    scopes: &[Scope],
) -> Result<ValueResolver, SchemaError> {
    let class = holder.class().clone();
    let constructor = class
        .constructors
        .iter()
        .find(|constructor| constructor.params.is_empty())
        .map(|constructor| constructor.invoker.clone())
        .ok_or_else(|| SchemaError::MissingConstructor {
            class: class.qualified_name(),
            arity: 0,
        })?;

    let mut seen = IndexSet::default();
    let mut fields = IndexMap::default();
    let mut assignments = Vec::new();
    for scope in scopes {
        for method in &scope.class.methods {
            let Some(field) = setter_property(method) else {
                continue;
            };
            if !seen.insert(field.clone()) {
                continue;
            }
            let setter = method
                .invoker
                .clone()
                .ok_or_else(|| SchemaError::NotInvocable {
                    member: method.qualified_name(),
                })?;
            let param = &method.params[0];
            let annotations: Annotations = method
                .annotations
                .iter()
                .chain(param.annotations.iter())
                .cloned()
                .collect();
            let shape = TypeShape::resolve(registry.class_path(), &param.ty, &scope.bindings)?;
            let field_name = name(&field)?;
            let directives = directives::applied(registry, &annotations)?;
            fields.insert(
                field_name.clone(),
                Component::new(InputValueDefinition {
                    description: annotations.description().map(Into::into),
                    name: field_name,
                    ty: Node::new(registry.get_input_type(&shape, &annotations)?),
                    default_value: None,
                    directives: directives::ast_list(directives),
                }),
            );
            assignments.push(Assignment {
                field,
                setter,
                resolver: registry.get_resolver(&shape, &annotations)?,
            });
        }
    }
    insert_input(registry, &class, input, fields)?;

    let class_name = class.name.clone();
    Ok(Arc::new(move |value| {
        let JsonValue::Object(map) = value else {
            return Err(ConversionError::expected(class_name.to_string(), value));
        };
        let instance = construct(&class_name, &constructor, Vec::new())?;
        for assignment in &assignments {
            let Some(field) = map.get(assignment.field.as_str()) else {
                continue;
            };
            let field = (assignment.resolver)(field)?;
            (assignment.setter)(Some(&instance), vec![field]).map_err(|error| {
                ConversionError::Construction {
                    class: class_name.to_string(),
                    reason: error.to_string(),
                }
            })?;
        }
        Ok(instance)
    }))
}

/// Input object of a record: one field per record component, passed positionally to the
/// canonical constructor. Absent fields are passed as null.
fn record_input(
    registry: &mut EntityRegistry,
    holder: &EntityHolder,
    input: Name,
) -> Result<ValueResolver, SchemaError> {
    let class = holder.class().clone();
    let components: Vec<_> = class
        .fields
        .iter()
        .filter(|field| !field.modifiers.is_static)
        .collect();
    let constructor = class
        .constructors
        .iter()
        .find(|constructor| constructor.params.len() == components.len())
        .map(|constructor| constructor.invoker.clone())
        .ok_or_else(|| SchemaError::MissingConstructor {
            class: class.qualified_name(),
            arity: components.len(),
        })?;

    let mut fields = IndexMap::default();
    let mut resolvers: Vec<(Arc<str>, ValueResolver)> = Vec::with_capacity(components.len());
    for component in components {
        let shape = TypeShape::resolve(registry.class_path(), &component.ty, holder.bindings())?;
        resolvers.push((
            component.name.clone(),
            registry.get_resolver(&shape, &component.annotations)?,
        ));
        if component.annotations.has(IGNORE) || component.annotations.has(INPUT_IGNORE) {
            continue;
        }
        let field_name = name(&component.name)?;
        let directives = directives::applied(registry, &component.annotations)?;
        fields.insert(
            field_name.clone(),
            Component::new(InputValueDefinition {
                description: component.annotations.description().map(Into::into),
                name: field_name,
                ty: Node::new(registry.get_input_type(&shape, &component.annotations)?),
                default_value: None,
                directives: directives::ast_list(directives),
            }),
        );
    }
    insert_input(registry, &class, input, fields)?;

    let class_name = class.name.clone();
    Ok(Arc::new(move |value| {
        let JsonValue::Object(map) = value else {
            return Err(ConversionError::expected(class_name.to_string(), value));
        };
        let args = resolvers
            .iter()
            .map(|(field, resolver)| match map.get(&**field) {
                Some(value) => resolver(value),
                None => Ok(Value::Null),
            })
            .collect::<Result<Vec<_>, _>>()?;
        construct(&class_name, &constructor, args)
    }))
}

fn insert_input(
    registry: &mut EntityRegistry,
    class: &ClassMeta,
    input: Name,
    fields: IndexMap<Name, Component<InputValueDefinition>>,
) -> Result<(), SchemaError> {
    // GraphQL has no empty input objects; using one as an argument then fails validation.
    if fields.is_empty() {
        tracing::debug!(input = %input, "no input fields, skipping input type");
        return Ok(());
    }
    registry.insert_type(ExtendedType::InputObject(Node::new(InputObjectType {
        description: class.annotations.description().map(Into::into),
        name: input,
        directives: Default::default(),
        fields,
    })))
}

fn construct(
    class: &ClassName,
    constructor: &Invoker,
    args: Vec<Value>,
) -> Result<Value, ConversionError> {
    match constructor(None, args) {
        Ok(Output::Value(value)) => Ok(value),
        Ok(_) => Err(ConversionError::Construction {
            class: class.to_string(),
            reason: "constructors must return synchronously".to_string(),
        }),
        Err(error) => Err(ConversionError::Construction {
            class: class.to_string(),
            reason: error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;

    use super::*;
    use crate::configuration::Configuration;
    use crate::meta::Annotation;
    use crate::meta::ClassKind;
    use crate::meta::ClassPath;
    use crate::meta::FieldMeta;
    use crate::meta::Object;
    use crate::meta::ParamMeta;

    fn shapes() -> ClassPath {
        ClassPath::new()
            .with(
                ClassMeta::builder("Shape")
                    .kind(ClassKind::Abstract)
                    .entity()
                    .method(MethodMeta::getter("area", TypeRef::class("Float")).as_abstract())
                    .build(),
            )
            .with(
                ClassMeta::builder("Square")
                    .entity()
                    .extends(TypeRef::class("Shape"))
                    .method(MethodMeta::getter("side", TypeRef::class("Float")))
                    .method(MethodMeta::getter("area", TypeRef::class("Float")))
                    .method(MethodMeta::setter("side", TypeRef::class("Float")))
                    .build(),
            )
            .with(
                ClassMeta::builder("Cube")
                    .entity()
                    .extends(TypeRef::class("Square"))
                    .method(MethodMeta::getter("volume", TypeRef::class("Float")))
                    .build(),
            )
            .with(
                ClassMeta::builder("Point")
                    .kind(ClassKind::Record)
                    .entity()
                    .field(FieldMeta::new("x", TypeRef::class("Int")))
                    .field(FieldMeta::new("y", TypeRef::class("Int")))
                    .build(),
            )
    }

    fn registry(class_path: ClassPath) -> EntityRegistry {
        EntityRegistry::new(Arc::new(class_path), Arc::new(Configuration::default()))
    }

    fn build(registry: &mut EntityRegistry, class: &str) -> Arc<EntityHolder> {
        let class = registry.class_path().require(class).unwrap().clone();
        registry.build_entity(&class, &GenericBindings::new()).unwrap()
    }

    #[test]
    fn accessor_names() {
        assert_eq!(decapitalize("Name"), "name");
        assert_eq!(decapitalize("URL"), "URL");
        assert_eq!(decapitalize("X"), "x");

        let getter = MethodMeta::getter("firstName", TypeRef::class("String"));
        assert_eq!(getter_property(&getter).as_deref(), Some("firstName"));
        assert_eq!(getter_property(&MethodMeta::is_getter("active")).as_deref(), Some("active"));
        let not_boolean = MethodMeta::new("isReady", TypeRef::class("String"));
        assert_eq!(getter_property(&not_boolean), None);
        let lowercase = MethodMeta::new("getaway", TypeRef::class("String"));
        assert_eq!(getter_property(&lowercase), None);
        let ignored = MethodMeta::getter("secret", TypeRef::class("String"))
            .annotate(Annotation::new(IGNORE));
        assert_eq!(getter_property(&ignored), None);
        let with_param = MethodMeta::new("getItem", TypeRef::class("String"))
            .param(ParamMeta::new("index", TypeRef::class("Int")));
        assert_eq!(getter_property(&with_param).as_deref(), Some("item"));
        let static_getter = MethodMeta::getter("count", TypeRef::class("Int")).as_static();
        assert_eq!(getter_property(&static_getter), None);
    }

    #[test]
    fn extended_entities_emit_direct_objects() {
        let mut registry = registry(shapes());
        build(&mut registry, "Shape");

        let Some(ExtendedType::Interface(shape)) = registry.type_definition("Shape") else {
            panic!("Shape should be an interface");
        };
        assert_eq!(shape.fields["area"].ty.to_string(), "Float!");

        let Some(ExtendedType::Interface(square)) = registry.type_definition("Square") else {
            panic!("Square should be an interface");
        };
        assert!(square.implements_interfaces.iter().any(|i| i.as_str() == "Shape"));

        let Some(ExtendedType::Object(direct)) = registry.type_definition("Square_DIRECT") else {
            panic!("Square_DIRECT should be an object");
        };
        let implements: Vec<_> = direct.implements_interfaces.iter().map(|i| i.as_str()).collect();
        assert_eq!(implements, vec!["Shape", "Square"]);
        let fields: Vec<_> = direct.fields.keys().map(|f| f.as_str()).collect();
        assert_eq!(fields, vec!["side", "area"]);

        let Some(ExtendedType::Object(cube)) = registry.type_definition("Cube") else {
            panic!("Cube should be an object");
        };
        let fields: Vec<_> = cube.fields.keys().map(|f| f.as_str()).collect();
        assert_eq!(fields, vec!["volume", "side", "area"]);
        assert!(registry.code_registry().fetcher("Cube", "area").is_some());
        assert!(registry.code_registry().fetcher("Square_DIRECT", "side").is_some());

        let resolve = registry.code_registry().type_resolver("Square").unwrap();
        let square = Value::Object(Object::new("Square"));
        assert_eq!(resolve(&square).unwrap().as_str(), "Square_DIRECT");
        let cube = Value::Object(Object::new("Cube"));
        assert_eq!(resolve(&cube).unwrap().as_str(), "Cube");
    }

    fn person() -> ClassPath {
        let greeting = MethodMeta::new("getGreeting", TypeRef::class("String"))
            .param(ParamMeta::new("prefix", TypeRef::class("String")))
            .invoke_with(|receiver, args| {
                let name = receiver.and_then(Value::as_object).map(|person| person.get("name"));
                let name = name.as_ref().and_then(Value::as_str).unwrap_or_default();
                let prefix = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(Output::Value(Value::from(format!("{prefix}, {name}"))))
            });
        let viewer = MethodMeta::new("getViewer", TypeRef::class("String"))
            .param(ParamMeta::new("env", TypeRef::class("Environment")))
            .invoke_with(|_, args| {
                let field = match args.first() {
                    Some(Value::Opaque(env)) => env
                        .downcast_ref::<fetcher::Environment>()
                        .map(|env| format!("{}.{}", env.parent_type, env.field_name)),
                    _ => None,
                };
                Ok(Output::Value(field.map(Value::from).unwrap_or_default()))
            });
        ClassPath::new().with(
            ClassMeta::builder("Person")
                .entity()
                .method(MethodMeta::getter("name", TypeRef::class("String")))
                .method(greeting)
                .method(viewer)
                .build(),
        )
    }

    #[tokio::test]
    async fn getters_with_parameters_take_arguments() {
        let mut registry = registry(person());
        build(&mut registry, "Person");
        let Some(ExtendedType::Object(object)) = registry.type_definition("Person") else {
            panic!("Person should be an object");
        };
        let fields: Vec<_> = object.fields.keys().map(|f| f.as_str()).collect();
        assert_eq!(fields, vec!["name", "greeting", "viewer"]);
        let arguments: Vec<_> = object.fields["greeting"]
            .arguments
            .iter()
            .map(|argument| format!("{}: {}", argument.name, argument.ty))
            .collect();
        assert_eq!(arguments, vec!["prefix: String!"]);
        assert!(object.fields["viewer"].arguments.is_empty());

        let ada = Value::Object(Object::new("Person").with("name", "Ada"));
        let env = fetcher::Environment::builder()
            .field_name("greeting".to_string())
            .parent_type("Person".to_string())
            .source(ada.clone())
            .argument("prefix".to_string(), json!("Hello"))
            .build();
        let greeting = registry.code_registry().fetcher("Person", "greeting").unwrap();
        let value = greeting(env).await.unwrap().into_value();
        assert_eq!(value, Some(Value::from("Hello, Ada")));

        let env = fetcher::Environment::builder()
            .field_name("viewer".to_string())
            .parent_type("Person".to_string())
            .source(ada)
            .build();
        let viewer = registry.code_registry().fetcher("Person", "viewer").unwrap();
        let value = viewer(env).await.unwrap().into_value();
        assert_eq!(value, Some(Value::from("Person.viewer")));
    }

    #[test]
    fn object_inputs_call_setters() {
        let mut registry = registry(shapes());
        let cube = build(&mut registry, "Cube");
        let Some(ExtendedType::InputObject(input)) = registry.type_definition("CubeInput") else {
            panic!("CubeInput should be an input object");
        };
        assert_eq!(input.fields["side"].ty.to_string(), "Float!");

        let value = cube.resolver()(&json!({ "side": 2.0 })).unwrap();
        let instance = value.as_object().unwrap();
        assert_eq!(instance.class(), "Cube");
        assert_eq!(instance.get("side"), Value::Float(2.0));

        let err = cube.resolver()(&json!("square")).unwrap_err();
        assert_eq!(err.to_string(), "expected Cube, found string");
    }

    #[test]
    fn records_use_their_components() {
        let mut registry = registry(shapes());
        let point = build(&mut registry, "Point");
        let Some(ExtendedType::Object(object)) = registry.type_definition("Point") else {
            panic!("Point should be an object");
        };
        assert_eq!(object.fields["x"].ty.to_string(), "Int!");
        assert!(registry.type_definition("PointInput").is_some());

        let value = point.resolver()(&json!({ "x": 1, "y": 2 })).unwrap();
        let point = value.as_object().unwrap();
        assert_eq!(point.get("x"), Value::Int(1));
        assert_eq!(point.get("y"), Value::Int(2));
    }

    #[test]
    fn abstract_entities_are_not_inputs() {
        let mut registry = registry(shapes());
        let shape = build(&mut registry, "Shape");
        assert!(shape.input_name().is_none());
        assert!(shape.resolver()(&json!({})).is_err());
    }
}
