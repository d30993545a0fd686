//! Schema assembly.
//!
//! [`SchemaBuilder`] scans the class path, derives every entity and operation, and hands back an
//! [`ExecutableSchema`]: the validated schema together with the [`CodeRegistry`] the execution
//! engine dispatches through.

use std::fmt;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::name;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::validation::Valid;

use crate::code_registry::CodeRegistry;
use crate::code_registry::FieldCoordinate;
use crate::configuration::Configuration;
use crate::directives;
use crate::directives::DirectiveHandler;
use crate::directives::Policies;
use crate::directives::authorization;
use crate::directives::restriction::RestrictionFactory;
use crate::entity;
use crate::entity::EntityRegistry;
use crate::error::FieldError;
use crate::error::SchemaError;
use crate::fetcher;
use crate::fetcher::DataFetcher;
use crate::meta::Annotation;
use crate::meta::Annotations;
use crate::meta::ClassKind;
use crate::meta::ClassMeta;
use crate::meta::ClassName;
use crate::meta::ClassPath;
use crate::meta::DIRECTIVE;
use crate::meta::GenericBindings;
use crate::meta::MUTATION;
use crate::meta::MethodMeta;
use crate::meta::QUERY;
use crate::meta::SUBSCRIPTION;
use crate::meta::Value;
use crate::scalars::Coercion;
use crate::scalars::Scalars;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    const ALL: [OperationKind; 3] = [
        OperationKind::Query,
        OperationKind::Mutation,
        OperationKind::Subscription,
    ];

    fn annotation(self) -> &'static str {
        match self {
            OperationKind::Query => QUERY,
            OperationKind::Mutation => MUTATION,
            OperationKind::Subscription => SUBSCRIPTION,
        }
    }

    fn root_type(self) -> Name {
        match self {
            OperationKind::Query => name!("Query"),
            OperationKind::Mutation => name!("Mutation"),
            OperationKind::Subscription => name!("Subscription"),
        }
    }
}

/// Collects the extension points of a schema, then derives it from a class path.
pub struct SchemaBuilder {
    class_path: Arc<ClassPath>,
    configuration: Configuration,
    scalars: Scalars,
    policies: Policies,
    schema_annotations: Annotations,
}

impl SchemaBuilder {
    pub fn new(class_path: impl Into<Arc<ClassPath>>) -> Self {
        Self {
            class_path: class_path.into(),
            configuration: Configuration::default(),
            scalars: Scalars::new(),
            policies: Policies::default(),
            schema_annotations: Annotations::default(),
        }
    }

    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Maps `class` to a custom scalar.
    pub fn scalar(mut self, class: impl Into<ClassName>, coercion: impl Coercion + 'static) -> Self {
        self.scalars.register(class, coercion);
        self
    }

    /// Registers the handler that annotation classes marked `DataFetcherWrapper(value = name)`
    /// are wired to.
    pub fn directive_handler(
        mut self,
        name: impl Into<Arc<str>>,
        handler: impl DirectiveHandler + 'static,
    ) -> Self {
        self.policies.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Registers a restriction factory under `name`, for `Restrict(value = name)`.
    pub fn restriction_factory(
        mut self,
        name: impl Into<Arc<str>>,
        factory: impl RestrictionFactory + 'static,
    ) -> Self {
        self.policies.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Guards every value of `class` with the restriction factory registered under `factory`.
    pub fn restrict(mut self, class: impl Into<ClassName>, factory: impl Into<Arc<str>>) -> Self {
        self.policies.restricted.insert(class.into(), factory.into());
        self
    }

    /// Registers `class` as the authorizer of the operations declared under `package`.
    pub fn authorizer(mut self, package: impl Into<Arc<str>>, class: impl Into<ClassName>) -> Self {
        self.policies.authorizers.insert(package.into(), class.into());
        self
    }

    /// Applies the schema directive of `annotation` to the schema definition.
    pub fn schema_annotation(mut self, annotation: Annotation) -> Self {
        self.schema_annotations.push(annotation);
        self
    }

    #[tracing::instrument(skip_all, level = "trace")]
    pub fn build(self) -> Result<ExecutableSchema, SchemaError> {
        for (class, factory) in &self.policies.restricted {
            if !self.policies.factories.contains_key(factory) {
                return Err(SchemaError::UnknownRestrictionFactory {
                    class: class.to_string(),
                    factory: factory.to_string(),
                });
            }
        }

        let configuration = Arc::new(self.configuration);
        let mut registry = EntityRegistry::new(self.class_path.clone(), configuration.clone())
            .with_scalars(self.scalars)
            .with_policies(self.policies);
        let classes: Vec<Arc<ClassMeta>> = self
            .class_path
            .scan(&configuration.packages)
            .cloned()
            .collect();

        for class in classes.iter().filter(|c| c.kind == ClassKind::Annotation) {
            if class.annotations.has(DIRECTIVE) {
                directives::define(&mut registry, class)?;
            }
            directives::handler_for(&registry, class)?;
        }

        let unbound = GenericBindings::new();
        for class in &classes {
            if class.is_entity() && class.type_params.is_empty() && class.kind != ClassKind::Annotation
            {
                registry.build_entity(class, &unbound)?;
            }
        }

        let mut roots: IndexMap<Name, IndexMap<Name, Component<FieldDefinition>>> =
            IndexMap::default();
        for class in &classes {
            for method in &class.methods {
                for kind in OperationKind::ALL {
                    let Some(annotation) = method.annotations.get(kind.annotation()) else {
                        continue;
                    };
                    let field = operation(&mut registry, class, method, kind, annotation)?;
                    let fields = roots.entry(kind.root_type()).or_default();
                    if fields.contains_key(&field.name) {
                        return Err(SchemaError::DuplicateField {
                            coordinate: format!("{}.{}", kind.root_type(), field.name),
                        });
                    }
                    fields.insert(field.name.clone(), field);
                }
            }
        }
        for (root, fields) in &roots {
            registry.insert_type(ExtendedType::Object(Node::new(ObjectType {
                description: None,
                name: root.clone(),
                implements_interfaces: Default::default(),
                directives: Default::default(),
                fields: fields.clone(),
            })))?;
        }
        let schema_directives = directives::applied(&mut registry, &self.schema_annotations)?;

        let (types, directive_definitions, code_registry) = registry.into_parts();
        let type_count = types.len();
        let mut schema = Schema::new();
        schema.types.extend(types);
        schema.directive_definitions.extend(directive_definitions);
        {
            let definition = schema.schema_definition.make_mut();
            for kind in OperationKind::ALL {
                if !roots.contains_key(&kind.root_type()) {
                    continue;
                }
                let root = Some(ComponentName::from(kind.root_type()));
                match kind {
                    OperationKind::Query => definition.query = root,
                    OperationKind::Mutation => definition.mutation = root,
                    OperationKind::Subscription => definition.subscription = root,
                }
            }
            definition
                .directives
                .0
                .extend(schema_directives.into_iter().map(Component::new));
        }

        let schema = if configuration.validate {
            schema
                .validate()
                .map_err(|invalid| SchemaError::Validation(invalid.errors.to_string()))?
        } else {
            Valid::assume_valid(schema)
        };
        tracing::debug!(types = type_count, "derived schema");
        Ok(ExecutableSchema {
            schema,
            code_registry,
        })
    }
}

/// Compiles one operation into a root field.
///
/// The fetcher is wrapped, innermost first, with the member's programmatic directives, the
/// restriction guarding its return type and the authorizer of its package.
fn operation(
    registry: &mut EntityRegistry,
    class: &ClassMeta,
    method: &MethodMeta,
    kind: OperationKind,
    annotation: &Annotation,
) -> Result<Component<FieldDefinition>, SchemaError> {
    if !method.modifiers.is_static {
        return Err(SchemaError::OperationNotStatic {
            method: method.qualified_name(),
        });
    }
    let compiled = fetcher::compile(registry, method, &GenericBindings::new())?;
    if kind == OperationKind::Subscription && !compiled.shape.is_stream() {
        return Err(SchemaError::SubscriptionNotStream {
            method: method.qualified_name(),
        });
    }
    let ty = registry.get_type(&compiled.shape, &method.annotations)?;
    let fetcher = registry.restrict(&compiled.shape, compiled.fetcher)?;
    let fetcher = authorization::wrap(registry, class, method, fetcher)?;

    let field_name = entity::name(annotation.str("value").unwrap_or(&*method.name))?;
    registry.code_registry_mut().register_fetcher(
        FieldCoordinate::new(kind.root_type(), field_name.clone()),
        fetcher,
    );
    tracing::debug!(
        root = %kind.root_type(),
        field = %field_name,
        method = %method.qualified_name(),
        "registered operation"
    );
    let directives = directives::applied(registry, &method.annotations)?;
    Ok(Component::new(FieldDefinition {
        description: method.annotations.description().map(Into::into),
        name: field_name,
        arguments: compiled.arguments,
        ty,
        directives: directives::ast_list(directives),
    }))
}

/// A derived schema, ready for an execution engine.
pub struct ExecutableSchema {
    schema: Valid<Schema>,
    code_registry: CodeRegistry,
}

impl ExecutableSchema {
    pub fn builder(class_path: impl Into<Arc<ClassPath>>) -> SchemaBuilder {
        SchemaBuilder::new(class_path)
    }

    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    /// The schema in SDL, without built-in definitions.
    pub fn sdl(&self) -> String {
        self.schema.to_string()
    }

    pub fn code_registry(&self) -> &CodeRegistry {
        &self.code_registry
    }

    pub fn fetcher(&self, type_name: &str, field_name: &str) -> Option<&DataFetcher> {
        self.code_registry.fetcher(type_name, field_name)
    }

    /// The concrete object type `value` resolves to as an instance of `abstract_type`.
    pub fn resolve_type(&self, abstract_type: &str, value: &Value) -> Result<Name, FieldError> {
        match self.code_registry.type_resolver(abstract_type) {
            Some(resolver) => resolver(value),
            None => Err(FieldError::UnsupportedType {
                abstract_type: abstract_type.to_string(),
                runtime: value.class_name().unwrap_or("null").to_string(),
            }),
        }
    }

    pub fn scalar(&self, name: &str) -> Option<&Arc<dyn Coercion>> {
        self.code_registry.scalar(name)
    }
}

impl fmt::Debug for ExecutableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableSchema")
            .field("code_registry", &self.code_registry)
            .finish_non_exhaustive()
    }
}
