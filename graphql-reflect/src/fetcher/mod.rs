//! Data fetchers: the per-field callables handed to the execution engine.
//!
//! A fetcher is compiled once per member at schema build time. Its [`ArgumentBinder`] decides,
//! for every declared parameter, whether the value comes from the request context or from a
//! field argument converted through the parameter's value resolver.

pub mod environment;

use std::fmt;
use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast::InputValueDefinition;
use futures::StreamExt;
use futures::TryStreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json_bytes::Value as JsonValue;

pub use self::environment::Environment;
pub use self::environment::RequestContext;
use crate::directives;
use crate::entity;
use crate::entity::EntityRegistry;
use crate::entity::ValueResolver;
use crate::error::FieldError;
use crate::error::SchemaError;
use crate::meta::CONTEXT;
use crate::meta::ClassName;
use crate::meta::ClassPath;
use crate::meta::ENVIRONMENT_CLASS;
use crate::meta::GenericBindings;
use crate::meta::MethodMeta;
use crate::meta::Opaque;
use crate::meta::Output;
use crate::meta::ParamMeta;
use crate::meta::Value;
use crate::type_shape::TypeShape;

/// What a fetcher resolved to.
pub enum Resolved {
    Value(Value),
    Stream(BoxStream<'static, Result<Value, FieldError>>),
}

impl Resolved {
    /// The resolved value, if the fetcher did not produce a stream.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Value(value) => Some(value),
            Resolved::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<BoxStream<'static, Result<Value, FieldError>>> {
        match self {
            Resolved::Value(_) => None,
            Resolved::Stream(stream) => Some(stream),
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolved::Stream(_) => f.write_str("Stream"),
        }
    }
}

pub type FetchFuture = BoxFuture<'static, Result<Resolved, FieldError>>;

/// Resolves one field for one request.
pub type DataFetcher = Arc<dyn Fn(Environment) -> FetchFuture + Send + Sync>;

/// Brings synchronous, asynchronous and streaming invoker outputs to one shape.
pub(crate) async fn resolve_output(output: Output) -> Result<Resolved, FieldError> {
    match output {
        Output::Value(value) => Ok(Resolved::Value(value)),
        Output::Future(future) => future
            .await
            .map(Resolved::Value)
            .map_err(FieldError::Application),
        Output::Stream(stream) => Ok(Resolved::Stream(
            stream.map_err(FieldError::Application).boxed(),
        )),
    }
}

#[derive(Clone)]
enum ParamBinding {
    Environment,
    Context { class: ClassName },
    Argument { resolver: ValueResolver },
}

/// The compiled argument-binding plan of one member.
#[derive(Clone)]
pub(crate) struct ArgumentBinder {
    params: Arc<[(Arc<str>, ParamBinding)]>,
    class_path: Arc<ClassPath>,
}

impl ArgumentBinder {
    /// Compiles a binding per parameter, returning the schema arguments of the ones bound from
    /// field arguments.
    pub(crate) fn compile(
        registry: &mut EntityRegistry,
        params: &[ParamMeta],
        bindings: &GenericBindings,
    ) -> Result<(Self, Vec<Node<InputValueDefinition>>), SchemaError> {
        let mut plan = Vec::with_capacity(params.len());
        let mut arguments = Vec::new();
        for param in params {
            let shape = TypeShape::resolve(registry.class_path(), &param.ty, bindings)?;
            let binding = if shape.is_class(ENVIRONMENT_CLASS) {
                ParamBinding::Environment
            } else if is_contextual(registry, param, &shape) {
                ParamBinding::Context {
                    class: shape.base.name.clone(),
                }
            } else {
                let directives = directives::applied(registry, &param.annotations)?;
                arguments.push(Node::new(InputValueDefinition {
                    description: param.annotations.description().map(Into::into),
                    name: entity::name(&param.name)?,
                    ty: Node::new(registry.get_input_type(&shape, &param.annotations)?),
                    default_value: None,
                    directives: directives::ast_list(directives),
                }));
                ParamBinding::Argument {
                    resolver: registry.get_resolver(&shape, &param.annotations)?,
                }
            };
            plan.push((param.name.clone(), binding));
        }
        let binder = ArgumentBinder {
            params: plan.into(),
            class_path: registry.class_path().clone(),
        };
        Ok((binder, arguments))
    }

    pub(crate) fn bind(&self, env: &Environment) -> Result<Vec<Value>, FieldError> {
        self.params
            .iter()
            .map(|(name, binding)| self.bind_param(name, binding, env))
            .collect()
    }

    fn bind_param(
        &self,
        name: &str,
        binding: &ParamBinding,
        env: &Environment,
    ) -> Result<Value, FieldError> {
        match binding {
            ParamBinding::Environment => {
                Ok(Value::Opaque(Opaque::new(ENVIRONMENT_CLASS, env.clone())))
            }
            ParamBinding::Context { class } => {
                let matches = |value: &Value| self.class_path.is_instance(value, class);
                env.context
                    .global()
                    .filter(|value| matches(value))
                    .cloned()
                    .or_else(|| env.local_context.clone().filter(|value| matches(value)))
                    .or_else(|| env.context.get(name).filter(|value| matches(value)))
                    .ok_or_else(|| FieldError::ContextNotFound {
                        name: name.to_string(),
                    })
            }
            ParamBinding::Argument { resolver } => {
                let input = env.argument(name).unwrap_or(&JsonValue::Null);
                resolver(input).map_err(|source| FieldError::Conversion {
                    argument: name.to_string(),
                    source,
                })
            }
        }
    }
}

fn is_contextual(registry: &EntityRegistry, param: &ParamMeta, shape: &TypeShape) -> bool {
    param.annotations.has(CONTEXT)
        || shape.base.annotations.has(CONTEXT)
        || registry
            .configuration()
            .global_context
            .as_deref()
            .is_some_and(|global| shape.is_class(global))
}

/// A member compiled into a fetcher.
pub(crate) struct CompiledMember {
    pub(crate) arguments: Vec<Node<InputValueDefinition>>,
    pub(crate) shape: TypeShape,
    pub(crate) fetcher: DataFetcher,
}

/// Compiles `method` into a fetcher, with its programmatic directives applied.
///
/// `bindings` binds the type variables of the declaring class.
pub(crate) fn compile(
    registry: &mut EntityRegistry,
    method: &MethodMeta,
    bindings: &GenericBindings,
) -> Result<CompiledMember, SchemaError> {
    let member = method.qualified_name();
    let invoker = method
        .invoker
        .clone()
        .ok_or_else(|| SchemaError::NotInvocable {
            member: member.clone(),
        })?;
    let shape = TypeShape::resolve(registry.class_path(), &method.return_type, bindings)?;
    let (binder, arguments) = ArgumentBinder::compile(registry, &method.params, bindings)?;
    let is_static = method.modifiers.is_static;

    let fetcher: DataFetcher = Arc::new(move |env: Environment| {
        let binder = binder.clone();
        let invoker = invoker.clone();
        Box::pin(async move {
            let args = binder.bind(&env)?;
            let receiver = if is_static { None } else { Some(&env.source) };
            let output = invoker(receiver, args)
                .map_err(|error| FieldError::Application(error.unwrap_target()))?;
            resolve_output(output).await
        })
    });
    let fetcher = directives::wrap(registry, &member, &method.annotations, fetcher)?;

    tracing::debug!(
        member = %member,
        arguments = arguments.len(),
        "compiled data fetcher"
    );
    Ok(CompiledMember {
        arguments,
        shape,
        fetcher,
    })
}

/// The schema arguments and return shape of a member that is declared but never invoked, such
/// as an abstract getter contributing an interface field.
pub(crate) fn signature(
    registry: &mut EntityRegistry,
    method: &MethodMeta,
    bindings: &GenericBindings,
) -> Result<(Vec<Node<InputValueDefinition>>, TypeShape), SchemaError> {
    let shape = TypeShape::resolve(registry.class_path(), &method.return_type, bindings)?;
    let (_, arguments) = ArgumentBinder::compile(registry, &method.params, bindings)?;
    Ok((arguments, shape))
}

/// Reads `property` off the parent object.
pub(crate) fn property(property: Arc<str>) -> DataFetcher {
    Arc::new(move |env: Environment| {
        let value = match &env.source {
            Value::Object(object) => object.get(&property),
            _ => Value::Null,
        };
        Box::pin(futures::future::ready(Ok(Resolved::Value(value))))
    })
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use serde_json_bytes::json;

    use super::*;

    #[tokio::test]
    async fn outputs_share_one_shape() {
        let value = resolve_output(Output::Value(Value::from(1))).await.unwrap();
        assert_eq!(value.into_value(), Some(Value::Int(1)));

        let future = Output::Future(Box::pin(async { Ok(Value::from("later")) }));
        let value = resolve_output(future).await.unwrap();
        assert_eq!(value.into_value(), Some(Value::from("later")));

        let failed = Output::Future(Box::pin(async { Err("boom".into()) }));
        let error = resolve_output(failed).await.unwrap_err();
        assert_eq!(error.to_string(), "boom");

        let items = Output::Stream(stream::iter(vec![Ok(Value::from(1)), Ok(Value::from(2))]).boxed());
        let collected: Vec<_> = resolve_output(items)
            .await
            .unwrap()
            .into_stream()
            .unwrap()
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(collected, vec![Value::Int(1), Value::Int(2)]);
    }

    #[tokio::test]
    async fn property_fetcher_reads_the_source() {
        let source = crate::meta::Object::new("Point").with("x", 3);
        let env = Environment::builder()
            .field_name("x".to_string())
            .parent_type("Point".to_string())
            .source(Value::Object(source))
            .argument("unused".to_string(), json!(null))
            .build();
        let value = property("x".into())(env).await.unwrap();
        assert_eq!(value.into_value(), Some(Value::Int(3)));
    }
}
