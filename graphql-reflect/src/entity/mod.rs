//! The entity registry.
//!
//! Every schema type derived from a class is owned by one [`EntityHolder`], keyed by its
//! [`EntityKey`]. Holders live in an arena of slots: a slot is declared (and its type names
//! fixed) before its builder runs, so a type graph that refers back to itself sees the names
//! of the slot under construction instead of recursing.

mod enumeration;
mod object;
mod scalar;
mod type_resolver;
mod union;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::name;
use apollo_compiler::ast::DirectiveDefinition;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::schema::ExtendedType;
use serde_json_bytes::Value as JsonValue;

pub use self::type_resolver::TypeResolver;
use crate::code_registry::CodeRegistry;
use crate::configuration::Configuration;
use crate::directives::Policies;
use crate::directives::SchemaDirective;
use crate::directives::restriction;
use crate::error::ConversionError;
use crate::error::SchemaError;
use crate::fetcher::DataFetcher;
use crate::meta::Annotations;
use crate::meta::ClassKind;
use crate::meta::ClassMeta;
use crate::meta::ClassName;
use crate::meta::ClassPath;
use crate::meta::ENTITY;
use crate::meta::GenericBindings;
use crate::meta::ID;
use crate::meta::NULLABLE;
use crate::meta::ONE_OF;
use crate::meta::RESTRICT;
use crate::meta::UNION;
use crate::meta::Value;
use crate::scalars::Scalars;
use crate::type_shape::Modifier;
use crate::type_shape::TypeShape;

/// Converts a loosely-typed input into an application value.
pub type ValueResolver =
    Arc<dyn Fn(&JsonValue) -> Result<Value, ConversionError> + Send + Sync>;

/// Canonical schema name of an entity: the class name followed by each generic binding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(class: &ClassMeta, bindings: &GenericBindings) -> Self {
        let mut key = class.name.to_string();
        for bound in bindings.values() {
            key.push('_');
            key.push_str(&bound.key_fragment());
        }
        EntityKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the concrete object emitted next to the interface of an extended entity.
    pub fn direct(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.0)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Enum,
    Scalar,
    Union,
    OneOf,
    Record,
    Object,
}

/// Which schema types an entity contributes, from `Entity(schema = ..)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchemaOption {
    Type,
    Input,
    #[default]
    Both,
}

impl SchemaOption {
    fn of(class: &ClassMeta) -> Self {
        match class.annotations.get(ENTITY).and_then(|a| a.str("schema")) {
            Some("TYPE") => SchemaOption::Type,
            Some("INPUT") => SchemaOption::Input,
            _ => SchemaOption::Both,
        }
    }
}

/// The output type, input type and value resolver of one entity.
pub struct EntityHolder {
    key: EntityKey,
    kind: EntityKind,
    option: SchemaOption,
    class: Arc<ClassMeta>,
    bindings: GenericBindings,
    output: Option<Name>,
    object: Option<Name>,
    input: Option<Name>,
    resolver: Arc<OnceLock<ValueResolver>>,
}

impl EntityHolder {
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn option(&self) -> SchemaOption {
        self.option
    }

    pub fn class(&self) -> &Arc<ClassMeta> {
        &self.class
    }

    pub fn bindings(&self) -> &GenericBindings {
        &self.bindings
    }

    /// Name of the output type, which is an interface for abstract and extended entities.
    pub fn output_name(&self) -> Option<&Name> {
        self.output.as_ref()
    }

    /// Name of the concrete object type values of this exact class resolve to.
    pub fn object_name(&self) -> Option<&Name> {
        self.object.as_ref()
    }

    pub fn input_name(&self) -> Option<&Name> {
        self.input.as_ref()
    }

    /// The holder's value resolver. Usable before the holder is built: it binds on first call.
    pub fn resolver(&self) -> ValueResolver {
        let slot = self.resolver.clone();
        let key = self.key.clone();
        Arc::new(move |input| match slot.get() {
            Some(resolver) => resolver(input),
            None => Err(ConversionError::Unresolved {
                key: key.to_string(),
            }),
        })
    }

    fn set_resolver(&self, resolver: ValueResolver) {
        if self.resolver.set(resolver).is_err() {
            tracing::warn!(entity = %self.key, "entity built twice, keeping the first resolver");
        }
    }
}

impl fmt::Debug for EntityHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHolder")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("output", &self.output)
            .field("object", &self.object)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Declared,
    Building,
    Built,
}

struct Slot {
    holder: Arc<EntityHolder>,
    state: SlotState,
}

/// Memoized store of entity holders, and the schema types they emitted.
pub struct EntityRegistry {
    class_path: Arc<ClassPath>,
    configuration: Arc<Configuration>,
    scalars: Scalars,
    policies: Policies,
    slots: Vec<Slot>,
    keys: HashMap<EntityKey, usize>,
    types: IndexMap<Name, ExtendedType>,
    directives: IndexMap<ClassName, Arc<SchemaDirective>>,
    code_registry: CodeRegistry,
}

impl EntityRegistry {
    pub fn new(class_path: Arc<ClassPath>, configuration: Arc<Configuration>) -> Self {
        EntityRegistry {
            class_path,
            configuration,
            scalars: Scalars::new(),
            policies: Policies::default(),
            slots: Vec::new(),
            keys: HashMap::new(),
            types: IndexMap::default(),
            directives: IndexMap::default(),
            code_registry: CodeRegistry::default(),
        }
    }

    pub(crate) fn with_scalars(mut self, scalars: Scalars) -> Self {
        self.scalars = scalars;
        self
    }

    pub(crate) fn with_policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    pub fn class_path(&self) -> &Arc<ClassPath> {
        &self.class_path
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub(crate) fn scalars(&self) -> &Scalars {
        &self.scalars
    }

    pub(crate) fn policies(&self) -> &Policies {
        &self.policies
    }

    pub fn code_registry(&self) -> &CodeRegistry {
        &self.code_registry
    }

    pub(crate) fn code_registry_mut(&mut self) -> &mut CodeRegistry {
        &mut self.code_registry
    }

    /// A type emitted so far.
    pub fn type_definition(&self, name: &str) -> Option<&ExtendedType> {
        self.types.get(name)
    }

    /// The holder for the base of `shape`, declared on first request. Building is deferred
    /// until a type or resolver is asked for.
    pub fn get_entity(&mut self, shape: &TypeShape) -> Result<Arc<EntityHolder>, SchemaError> {
        self.declare(&shape.base, &shape.bindings)
    }

    /// The output type for `shape`, wrapped per its modifiers.
    pub fn get_type(
        &mut self,
        shape: &TypeShape,
        annotations: &Annotations,
    ) -> Result<Type, SchemaError> {
        let base = if is_id(shape, annotations) {
            name!("ID")
        } else {
            let holder = self.build_entity(&shape.base, &shape.bindings)?;
            holder
                .output
                .clone()
                .ok_or_else(|| SchemaError::NoOutputType {
                    entity: holder.key.to_string(),
                })?
        };
        Ok(wrap_type(
            base,
            &shape.value_modifiers(),
            annotations.has(NULLABLE),
        ))
    }

    /// The input type for `shape`, wrapped per its modifiers.
    pub fn get_input_type(
        &mut self,
        shape: &TypeShape,
        annotations: &Annotations,
    ) -> Result<Type, SchemaError> {
        let base = if is_id(shape, annotations) {
            name!("ID")
        } else {
            let holder = self.build_entity(&shape.base, &shape.bindings)?;
            holder
                .input
                .clone()
                .ok_or_else(|| SchemaError::NoInputType {
                    entity: holder.key.to_string(),
                })?
        };
        Ok(wrap_type(
            base,
            &shape.value_modifiers(),
            annotations.has(NULLABLE),
        ))
    }

    /// The value resolver for `shape`: the base entity's resolver lifted through its list
    /// modifiers. Null converts to null at every level.
    pub fn get_resolver(
        &mut self,
        shape: &TypeShape,
        annotations: &Annotations,
    ) -> Result<ValueResolver, SchemaError> {
        let mut resolver = match self.scalars.get("ID") {
            Some(id) if is_id(shape, annotations) => scalar::resolver(id.clone()),
            _ => self.build_entity(&shape.base, &shape.bindings)?.resolver(),
        };
        for modifier in shape.value_modifiers().into_iter().rev() {
            if modifier == Modifier::Array {
                resolver = list_resolver(resolver);
            }
        }
        Ok(null_passing(resolver))
    }

    /// Declares and builds the entity for `class` with `bindings`.
    pub(crate) fn build_entity(
        &mut self,
        class: &Arc<ClassMeta>,
        bindings: &GenericBindings,
    ) -> Result<Arc<EntityHolder>, SchemaError> {
        let holder = self.declare(class, bindings)?;
        if let Some(&index) = self.keys.get(&holder.key) {
            self.ensure_built(index)?;
        }
        Ok(holder)
    }

    fn declare(
        &mut self,
        class: &Arc<ClassMeta>,
        bindings: &GenericBindings,
    ) -> Result<Arc<EntityHolder>, SchemaError> {
        let kind = self.classify(class)?;
        let key = match kind {
            EntityKind::Scalar => EntityKey(
                self.scalars
                    .get(&class.name)
                    .map(|coercion| coercion.name().to_string())
                    .unwrap_or_else(|| class.name.to_string()),
            ),
            EntityKind::Enum => EntityKey::new(class, &GenericBindings::new()),
            _ => EntityKey::new(class, bindings),
        };
        if let Some(&index) = self.keys.get(&key) {
            return Ok(self.slots[index].holder.clone());
        }

        let option = SchemaOption::of(class);
        let type_name = name(key.as_str())?;
        let input_name = match option {
            SchemaOption::Input => Some(type_name.clone()),
            SchemaOption::Both => Some(name(&format!(
                "{key}{}",
                self.configuration.input_suffix
            ))?),
            SchemaOption::Type => None,
        };
        let (output, object, input) = match kind {
            EntityKind::Enum | EntityKind::Scalar => {
                (Some(type_name.clone()), None, Some(type_name))
            }
            EntityKind::Union => (Some(type_name), None, None),
            EntityKind::OneOf => (
                (option != SchemaOption::Input).then_some(type_name),
                None,
                input_name,
            ),
            EntityKind::Record | EntityKind::Object if class.kind.is_abstract() => {
                ((option != SchemaOption::Input).then_some(type_name), None, None)
            }
            EntityKind::Record | EntityKind::Object => {
                if option == SchemaOption::Input {
                    (None, None, input_name)
                } else {
                    let extended = self
                        .class_path
                        .subclasses(&class.name)
                        .any(|subclass| subclass.is_entity());
                    let object = if extended {
                        name(&key.direct(&self.configuration.direct_suffix))?
                    } else {
                        type_name.clone()
                    };
                    (Some(type_name), Some(object), input_name)
                }
            }
        };

        let holder = Arc::new(EntityHolder {
            key: key.clone(),
            kind,
            option,
            class: class.clone(),
            bindings: if kind == EntityKind::Enum {
                GenericBindings::new()
            } else {
                bindings.clone()
            },
            output,
            object,
            input,
            resolver: Default::default(),
        });
        tracing::debug!(entity = %key, kind = ?kind, "declared entity");
        self.keys.insert(key, self.slots.len());
        self.slots.push(Slot {
            holder: holder.clone(),
            state: SlotState::Declared,
        });
        Ok(holder)
    }

    fn classify(&self, class: &ClassMeta) -> Result<EntityKind, SchemaError> {
        if self.scalars.contains(&class.name) {
            return Ok(EntityKind::Scalar);
        }
        if class.kind == ClassKind::Enum {
            return Ok(EntityKind::Enum);
        }
        if !class.is_entity() {
            return Err(SchemaError::NotAnEntity {
                class: class.qualified_name(),
            });
        }
        Ok(if class.annotations.has(UNION) {
            EntityKind::Union
        } else if class.annotations.has(ONE_OF) {
            EntityKind::OneOf
        } else if class.kind == ClassKind::Record {
            EntityKind::Record
        } else {
            EntityKind::Object
        })
    }

    fn ensure_built(&mut self, index: usize) -> Result<(), SchemaError> {
        if self.slots[index].state != SlotState::Declared {
            return Ok(());
        }
        self.slots[index].state = SlotState::Building;
        let holder = self.slots[index].holder.clone();
        match holder.kind {
            EntityKind::Enum => enumeration::build(self, &holder)?,
            EntityKind::Scalar => scalar::build(self, &holder)?,
            EntityKind::Union => union::build_union(self, &holder)?,
            EntityKind::OneOf => union::build_one_of(self, &holder)?,
            EntityKind::Record | EntityKind::Object => object::build(self, &holder)?,
        }
        self.slots[index].state = SlotState::Built;
        tracing::debug!(entity = %holder.key, "built entity");
        Ok(())
    }

    pub(crate) fn insert_type(&mut self, definition: ExtendedType) -> Result<(), SchemaError> {
        let name = definition.name().clone();
        if self.types.contains_key(&name) {
            return Err(SchemaError::DuplicateType {
                name: name.to_string(),
            });
        }
        self.types.insert(name, definition);
        Ok(())
    }

    pub(crate) fn schema_directive(&self, class: &str) -> Option<Arc<SchemaDirective>> {
        self.directives.get(class).cloned()
    }

    pub(crate) fn insert_schema_directive(
        &mut self,
        class: ClassName,
        directive: Arc<SchemaDirective>,
    ) -> Result<(), SchemaError> {
        let name = &directive.definition().name;
        if self
            .directives
            .values()
            .any(|existing| &existing.definition().name == name)
        {
            return Err(SchemaError::DuplicateType {
                name: format!("@{name}"),
            });
        }
        self.directives.insert(class, directive);
        Ok(())
    }

    /// Wraps a fetcher returning `shape` with the restriction policy guarding its base class.
    pub(crate) fn restrict(
        &self,
        shape: &TypeShape,
        fetcher: DataFetcher,
    ) -> Result<DataFetcher, SchemaError> {
        let class = &shape.base;
        let factory_name: Option<Arc<str>> = class
            .annotations
            .get(RESTRICT)
            .and_then(|annotation| annotation.str("value"))
            .map(Into::into)
            .or_else(|| self.policies.restricted.get(&class.name).cloned());
        let Some(factory_name) = factory_name else {
            return Ok(fetcher);
        };
        let factory = self
            .policies
            .factories
            .get(&factory_name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownRestrictionFactory {
                class: class.qualified_name(),
                factory: factory_name.to_string(),
            })?;
        Ok(restriction::restrict(
            class.name.clone(),
            factory,
            shape,
            fetcher,
        ))
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        IndexMap<Name, ExtendedType>,
        IndexMap<Name, Node<DirectiveDefinition>>,
        CodeRegistry,
    ) {
        let directive_definitions = self
            .directives
            .values()
            .map(|directive| {
                (
                    directive.definition().name.clone(),
                    directive.definition().clone(),
                )
            })
            .collect();
        (self.types, directive_definitions, self.code_registry)
    }
}

fn is_id(shape: &TypeShape, annotations: &Annotations) -> bool {
    annotations.has(ID) && shape.is_class("String")
}

/// Validates `value` as a GraphQL name.
pub(crate) fn name(value: &str) -> Result<Name, SchemaError> {
    Name::new(value).map_err(|_| SchemaError::InvalidName {
        name: value.to_string(),
    })
}

/// Applies nullability and list wrapping for a modifier stack given outermost first.
///
/// Modifiers are replayed innermost first with a `required` flag: `Optional` clears it, and
/// `Array` wraps the current type as non-null if required, then as a list, then sets it again.
/// A type still required at the end, and not annotated nullable, is wrapped as non-null.
pub fn wrap_type(base: Name, modifiers: &[Modifier], nullable: bool) -> Type {
    let mut ty = Type::Named(base);
    let mut required = true;
    for modifier in modifiers.iter().rev() {
        match modifier {
            Modifier::Optional => required = false,
            Modifier::Array => {
                if required {
                    ty = ty.non_null();
                }
                ty = ty.list();
                required = true;
            }
            Modifier::Async | Modifier::Stream => {}
        }
    }
    if required && !nullable {
        ty = ty.non_null();
    }
    ty
}

fn list_resolver(element: ValueResolver) -> ValueResolver {
    Arc::new(move |input| match input {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| match item {
                JsonValue::Null => Ok(Value::Null),
                item => element(item),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        single => Ok(Value::List(vec![element(single)?])),
    })
}

fn null_passing(resolver: ValueResolver) -> ValueResolver {
    Arc::new(move |input| match input {
        JsonValue::Null => Ok(Value::Null),
        input => resolver(input),
    })
}

/// A resolver for holders that have no input type.
fn not_an_input(class: ClassName) -> ValueResolver {
    Arc::new(move |_| {
        Err(ConversionError::Construction {
            class: class.to_string(),
            reason: "not an input type".to_string(),
        })
    })
}
