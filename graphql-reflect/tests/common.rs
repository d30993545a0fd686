//! A small application described through class metadata, shared by the integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use graphql_reflect::DataFetcher;
use graphql_reflect::DirectiveHandler;
use graphql_reflect::Environment;
use graphql_reflect::ExecutableSchema;
use graphql_reflect::FieldError;
use graphql_reflect::RequestContext;
use graphql_reflect::Resolved;
use graphql_reflect::RestrictionFactory;
use graphql_reflect::RestrictionPolicy;
use graphql_reflect::SchemaBuilder;
use graphql_reflect::meta::Annotation;
use graphql_reflect::meta::ClassKind;
use graphql_reflect::meta::ClassMeta;
use graphql_reflect::meta::ClassPath;
use graphql_reflect::meta::MethodMeta;
use graphql_reflect::meta::Object;
use graphql_reflect::meta::Output;
use graphql_reflect::meta::ParamMeta;
use graphql_reflect::meta::TypeRef;
use graphql_reflect::meta::Value;
use serde_json_bytes::Value as JsonValue;
use tower::BoxError;

fn class(name: &str) -> TypeRef {
    TypeRef::class(name)
}

fn param(name: &str, ty: TypeRef) -> ParamMeta {
    ParamMeta::new(name, ty)
}

fn operation(kind: &str, name: &str, ty: TypeRef) -> MethodMeta {
    MethodMeta::new(name, ty)
        .annotate(Annotation::new(kind))
        .as_static()
}

fn string_arg(args: &[Value], index: usize) -> String {
    args.get(index)
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .to_string()
}

/// `app.shapes`: an abstract base extended by three concrete shapes.
fn shapes(class_path: ClassPath) -> ClassPath {
    let concrete = |name: &str, extra: &str| {
        ClassMeta::builder(name)
            .package("app.shapes")
            .entity()
            .extends(class("Shape"))
            .method(MethodMeta::getter("area", class("Float")))
            .method(MethodMeta::getter(extra, class("Float")))
            .build()
    };
    let all_shapes = operation("Query", "shapes", TypeRef::list(class("Shape"))).invoke_with(
        |_, _| {
            Ok(Output::from(vec![
                Value::from(Object::new("Circle").with("area", 3.5).with("radius", 1.0)),
                Value::from(Object::new("Square").with("area", 4.0).with("side", 2.0)),
                Value::from(Object::new("Triangle").with("area", 6.0).with("base", 4.0)),
            ]))
        },
    );
    class_path
        .with(
            ClassMeta::builder("Shape")
                .package("app.shapes")
                .kind(ClassKind::Abstract)
                .entity()
                .method(MethodMeta::getter("area", class("Float")).as_abstract())
                .build(),
        )
        .with(concrete("Circle", "radius"))
        .with(concrete("Square", "side"))
        .with(concrete("Triangle", "base"))
        .with(
            ClassMeta::builder("ShapeQueries")
                .package("app.shapes")
                .method(all_shapes)
                .build(),
        )
}

fn document(title: &str, visible: bool) -> Value {
    Value::from(
        Object::new("Document")
            .with("title", title)
            .with("visible", visible),
    )
}

/// `app.docs`: documents guarded by the `visibility` restriction factory.
fn documents(class_path: ClassPath) -> ClassPath {
    let by_flags = operation("Query", "documents", TypeRef::list(class("Document")))
        .param(param("flags", TypeRef::list(class("Boolean"))))
        .invoke_with(|_, args| {
            let flags = args.first().and_then(Value::as_list).unwrap_or_default();
            let documents: Vec<Value> = flags
                .iter()
                .enumerate()
                .map(|(index, flag)| {
                    document(&format!("doc-{index}"), flag.as_bool().unwrap_or(false))
                })
                .collect();
            Ok(Output::from(documents))
        });
    let feed = operation("Subscription", "feed", TypeRef::stream(class("Document")))
        .invoke_with(|_, _| {
            let items = stream::iter(vec![Ok::<_, BoxError>(document("draft", false))]);
            Ok(Output::Stream(items.boxed()))
        });
    class_path
        .with(
            ClassMeta::builder("CacheControl")
                .package("app.directives")
                .kind(ClassKind::Annotation)
                .annotate(
                    Annotation::new("Directive")
                        .with("locations", vec!["OBJECT", "FIELD_DEFINITION"]),
                )
                .method(MethodMeta::new("maxAge", class("Int")).default_value(60))
                .build(),
        )
        .with(
            ClassMeta::builder("Upper")
                .package("app.directives")
                .kind(ClassKind::Annotation)
                .annotate(Annotation::new("DataFetcherWrapper").with_value("upper"))
                .build(),
        )
        .with(
            ClassMeta::builder("Document")
                .package("app.docs")
                .entity()
                .annotate(Annotation::new("Restrict").with_value("visibility"))
                .annotate(Annotation::new("CacheControl").with("maxAge", 30))
                .method(
                    MethodMeta::getter("title", class("String")).annotate(Annotation::new("Upper")),
                )
                .method(MethodMeta::is_getter("visible"))
                .build(),
        )
        .with(
            ClassMeta::builder("DocumentOperations")
                .package("app.docs")
                .method(by_flags)
                .method(feed)
                .build(),
        )
}

/// `app.accounts`: operations guarded by `AccountAuthorizer`.
fn accounts(class_path: ClassPath) -> ClassPath {
    let check = |name: &str, params: &[&str]| {
        params.iter().fold(
            MethodMeta::new(name, class("Boolean")),
            |method, name| method.param(param(name, class("String"))),
        )
    };
    let echo_first = |method: MethodMeta| {
        method.invoke_with(|_, args| Ok(Output::from(string_arg(&args, 0))))
    };
    class_path
        .with(
            ClassMeta::builder("Accounts")
                .package("app.accounts")
                .method(echo_first(
                    operation("Query", "account", class("String"))
                        .param(param("id", class("String")))
                        .param(param("tenant", class("String"))),
                ))
                .method(echo_first(
                    operation("Query", "ticket", class("String"))
                        .param(param("id", class("String"))),
                ))
                .method(echo_first(
                    operation("Query", "statement", class("String"))
                        .param(param("id", class("String"))),
                ))
                .method(echo_first(operation("Mutation", "audit", class("String"))))
                .build(),
        )
        .with(
            ClassMeta::builder("AccountAuthorizer")
                .package("app")
                .method(check("account", &["id"]).invoke_with(|_, _| Ok(Output::from(true))))
                .method(
                    check("account", &["id", "tenant"])
                        .invoke_with(|_, args| Ok(Output::from(string_arg(&args, 1) == "acme"))),
                )
                .method(
                    check("ticket", &["id"])
                        .invoke_with(|_, args| Ok(Output::from(string_arg(&args, 0) == "a"))),
                )
                .method(check("ticket", &["id"]).invoke_with(|_, args| {
                    let granted = string_arg(&args, 0) == "b";
                    Ok(Output::Future(Box::pin(async move {
                        Ok::<_, BoxError>(Value::from(granted))
                    })))
                }))
                .method(
                    check("statement", &["id"])
                        .param(param("owner", class("User")).annotate(Annotation::new("Context")))
                        .invoke_with(|_, args| match args.get(1) {
                            Some(Value::Object(owner)) => {
                                Ok(Output::from(owner.get("name") == Value::from("ada")))
                            }
                            _ => Ok(Output::from(false)),
                        }),
                )
                .method(
                    check("statement", &["id"])
                        .invoke_with(|_, args| Ok(Output::from(string_arg(&args, 0) == "open"))),
                )
                .build(),
        )
}

/// `app.pets`: a union and a one-of input over the same two pets.
fn pets(class_path: ClassPath) -> ClassPath {
    let pet = |name: &str| {
        ClassMeta::builder(name)
            .package("app.pets")
            .entity()
            .method(MethodMeta::getter("name", class("String")))
            .method(MethodMeta::setter("name", class("String")))
            .build()
    };
    let find = operation("Query", "pet", class("Pet"))
        .param(param("kind", class("String")))
        .invoke_with(|_, args| {
            let kind = string_arg(&args, 0);
            Ok(Output::from(Object::new(kind).with("name", "Rex")))
        });
    let adopt = operation("Mutation", "adopt", class("String"))
        .param(param("choice", class("PetChoice")))
        .invoke_with(|_, args| {
            let name = match args.first() {
                Some(Value::Object(pet)) => {
                    format!("{} {}", pet.class(), pet.get("name").as_str().unwrap_or("?"))
                }
                _ => "nobody".to_string(),
            };
            Ok(Output::from(name))
        });
    class_path
        .with(pet("Cat"))
        .with(pet("Dog"))
        .with(ClassMeta::builder("Fish").package("app.pets").build())
        .with(
            ClassMeta::builder("Pet")
                .package("app.pets")
                .entity()
                .annotate(Annotation::new("Union").with_value(vec!["Cat", "Dog"]))
                .build(),
        )
        .with(
            ClassMeta::builder("PetChoice")
                .package("app.pets")
                .entity()
                .annotate(Annotation::new("OneOf").with_value(vec!["Cat", "Dog"]))
                .build(),
        )
        .with(
            ClassMeta::builder("Shelter")
                .package("app.pets")
                .method(find)
                .method(adopt)
                .build(),
        )
}

/// `app.misc`: a context-bound operation and a `Long` operation.
fn misc(class_path: ClassPath) -> ClassPath {
    let whoami = operation("Query", "whoami", class("String"))
        .param(param("user", class("User")).annotate(Annotation::new("Context")))
        .invoke_with(|_, args| match args.first() {
            Some(Value::Object(user)) => Ok(Output::from(user.get("name"))),
            _ => Ok(Output::from(Value::Null)),
        });
    let double = operation("Query", "double", class("Long"))
        .param(param("value", class("Long")))
        .invoke_with(|_, args| match args.first() {
            Some(Value::Int(value)) => Ok(Output::from(value * 2)),
            _ => Ok(Output::from(Value::Null)),
        });
    class_path
        .with(ClassMeta::builder("User").package("app.misc").build())
        .with(
            ClassMeta::builder("Misc")
                .package("app.misc")
                .method(whoami)
                .method(double)
                .build(),
        )
}

pub fn class_path() -> ClassPath {
    [shapes, documents, accounts, pets, misc]
        .into_iter()
        .fold(ClassPath::new(), |class_path, add| add(class_path))
}

/// Allows documents flagged visible.
struct Visible;

#[async_trait]
impl RestrictionPolicy for Visible {
    async fn allow(&self, value: &Value) -> Result<bool, BoxError> {
        let object = value.as_object().ok_or("not a document")?;
        Ok(object.get("visible").as_bool().unwrap_or(false))
    }
}

#[derive(Clone, Default)]
pub struct VisibilityFactory {
    pub created: Arc<AtomicUsize>,
}

impl VisibilityFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RestrictionFactory for VisibilityFactory {
    async fn create(&self, _env: &Environment) -> Result<Arc<dyn RestrictionPolicy>, BoxError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(Arc::new(Visible))
    }
}

struct Upper;

#[async_trait]
impl DirectiveHandler for Upper {
    fn annotation(&self) -> &str {
        "Upper"
    }

    async fn wrap(
        &self,
        _annotation: &Annotation,
        env: Environment,
        next: DataFetcher,
    ) -> Result<Resolved, FieldError> {
        match next(env).await? {
            Resolved::Value(Value::String(s)) => {
                Ok(Resolved::Value(Value::String(s.to_uppercase())))
            }
            other => Ok(other),
        }
    }
}

pub fn upper() -> impl DirectiveHandler {
    Upper
}

pub fn builder(factory: &VisibilityFactory) -> SchemaBuilder {
    SchemaBuilder::new(class_path())
        .restriction_factory("visibility", factory.clone())
        .directive_handler("upper", upper())
        .authorizer("app.accounts", "AccountAuthorizer")
}

pub fn schema() -> (ExecutableSchema, VisibilityFactory) {
    let factory = VisibilityFactory::default();
    let schema = builder(&factory).build().expect("the fixture schema is valid");
    (schema, factory)
}

/// Calls the fetcher of `type_name.field_name` the way an execution engine would.
pub async fn fetch(
    schema: &ExecutableSchema,
    context: &Arc<RequestContext>,
    (type_name, field_name): (&str, &str),
    arguments: Vec<(&str, JsonValue)>,
    source: Value,
) -> Result<Resolved, FieldError> {
    let fetcher = schema
        .fetcher(type_name, field_name)
        .unwrap_or_else(|| panic!("no fetcher for {type_name}.{field_name}"));
    let arguments: HashMap<String, JsonValue> = arguments
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    let env = Environment::builder()
        .field_name(field_name.to_string())
        .parent_type(type_name.to_string())
        .source(source)
        .arguments(arguments)
        .context(context.clone())
        .build();
    fetcher(env).await
}

/// Like [`fetch`] for a root field, expecting a plain value.
pub async fn query(
    schema: &ExecutableSchema,
    context: &Arc<RequestContext>,
    coordinate: (&str, &str),
    arguments: Vec<(&str, JsonValue)>,
) -> Result<Value, FieldError> {
    fetch(schema, context, coordinate, arguments, Value::Null)
        .await
        .map(|resolved| resolved.into_value().unwrap_or_default())
}
