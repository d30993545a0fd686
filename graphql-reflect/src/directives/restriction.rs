//! Row-level restriction of returned values.
//!
//! A class guarded by a restriction factory has every value of that class checked before it
//! leaves a fetcher. The factory creates one policy per request and class, the first time a
//! guarded field resolves; concurrent fields of the same request share that single creation.
//! Denied list elements are dropped, a denied optional value becomes null, and a denied stream
//! element is skipped.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::future::join_all;
use tower::BoxError;

use crate::error::FieldError;
use crate::fetcher::DataFetcher;
use crate::fetcher::Environment;
use crate::fetcher::Resolved;
use crate::meta::ClassName;
use crate::meta::Value;
use crate::type_shape::Modifier;
use crate::type_shape::TypeShape;

/// Decides, per value, whether it may be returned.
#[async_trait]
pub trait RestrictionPolicy: Send + Sync {
    async fn allow(&self, value: &Value) -> Result<bool, BoxError>;
}

/// Creates the restriction policy of one request.
#[async_trait]
pub trait RestrictionFactory: Send + Sync {
    async fn create(&self, env: &Environment) -> Result<Arc<dyn RestrictionPolicy>, BoxError>;
}

/// Guards `fetcher`, whose values are of class `type_name`, with the policy `factory` creates.
pub(crate) fn restrict(
    type_name: ClassName,
    factory: Arc<dyn RestrictionFactory>,
    shape: &TypeShape,
    fetcher: DataFetcher,
) -> DataFetcher {
    let modifiers: Arc<[Modifier]> = shape.value_modifiers().into();
    let element_modifiers: Arc<[Modifier]> = shape.element_modifiers().into();
    Arc::new(move |env: Environment| {
        let type_name = type_name.clone();
        let factory = factory.clone();
        let fetcher = fetcher.clone();
        let modifiers = modifiers.clone();
        let element_modifiers = element_modifiers.clone();
        Box::pin(async move {
            let policy = policy(&type_name, &factory, &env).await?;
            match fetcher(env).await? {
                Resolved::Value(value) => Ok(Resolved::Value(
                    filter(&policy, &modifiers, value).await.unwrap_or_default(),
                )),
                Resolved::Stream(stream) => Ok(Resolved::Stream(
                    stream
                        .filter_map(move |item| {
                            let policy = policy.clone();
                            let modifiers = element_modifiers.clone();
                            async move {
                                match item {
                                    Ok(value) => filter(&policy, &modifiers, value).await.map(Ok),
                                    Err(error) => Some(Err(error)),
                                }
                            }
                        })
                        .boxed(),
                )),
            }
        })
    })
}

/// The request's policy for `type_name`, created on first use.
async fn policy(
    type_name: &Arc<str>,
    factory: &Arc<dyn RestrictionFactory>,
    env: &Environment,
) -> Result<Arc<dyn RestrictionPolicy>, FieldError> {
    let cell = env.context.policy_cell(type_name);
    cell.get_or_try_init(|| async {
        tracing::debug!(type_name = %type_name, "creating restriction policy");
        factory.create(env).await
    })
    .await
    .cloned()
    .map_err(|error| FieldError::Policy {
        type_name: type_name.to_string(),
        reason: error.to_string(),
    })
}

/// Filters `value` through `policy` following `modifiers`, outermost first. `None` means the
/// value itself was denied.
fn filter<'a>(
    policy: &'a Arc<dyn RestrictionPolicy>,
    modifiers: &'a [Modifier],
    value: Value,
) -> BoxFuture<'a, Option<Value>> {
    Box::pin(async move {
        if value.is_null() {
            return Some(Value::Null);
        }
        match (modifiers.split_first(), value) {
            (Some((Modifier::Array, inner)), Value::List(items)) => {
                let items = join_all(items.into_iter().map(|item| filter(policy, inner, item)))
                    .await
                    .into_iter()
                    .flatten()
                    .collect();
                Some(Value::List(items))
            }
            (Some((Modifier::Optional, inner)), value) => {
                Some(filter(policy, inner, value).await.unwrap_or_default())
            }
            (_, value) => allowed(policy, &value).await.then_some(value),
        }
    })
}

async fn allowed(policy: &Arc<dyn RestrictionPolicy>, value: &Value) -> bool {
    match policy.allow(value).await {
        Ok(allowed) => allowed,
        Err(error) => {
            tracing::warn!(error = %error, "restriction check failed, denying value");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use futures::stream;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fetcher::RequestContext;
    use crate::meta::ClassPath;
    use crate::meta::GenericBindings;
    use crate::meta::TypeRef;

    /// Allows every integer but 13.
    struct NotThirteen;

    #[async_trait]
    impl RestrictionPolicy for NotThirteen {
        async fn allow(&self, value: &Value) -> Result<bool, BoxError> {
            match value {
                Value::Int(13) => Ok(false),
                Value::Int(_) => Ok(true),
                other => Err(format!("cannot check {other:?}").into()),
            }
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    #[async_trait]
    impl RestrictionFactory for CountingFactory {
        async fn create(
            &self,
            _env: &Environment,
        ) -> Result<Arc<dyn RestrictionPolicy>, BoxError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(Arc::new(NotThirteen))
        }
    }

    struct FailingFactory;

    #[async_trait]
    impl RestrictionFactory for FailingFactory {
        async fn create(
            &self,
            _env: &Environment,
        ) -> Result<Arc<dyn RestrictionPolicy>, BoxError> {
            Err("policy store unavailable".into())
        }
    }

    fn shape(ty: TypeRef) -> TypeShape {
        TypeShape::resolve(&ClassPath::new(), &ty, &GenericBindings::new()).unwrap()
    }

    fn returning(value: Value) -> DataFetcher {
        Arc::new(move |_| {
            let value = value.clone();
            Box::pin(async move { Ok(Resolved::Value(value)) })
        })
    }

    fn env(context: &Arc<RequestContext>) -> Environment {
        Environment::builder()
            .field_name("numbers".to_string())
            .parent_type("Query".to_string())
            .context(context.clone())
            .build()
    }

    async fn run(ty: TypeRef, value: Value) -> Value {
        let factory = Arc::new(CountingFactory::default());
        let fetcher = restrict("Long".into(), factory, &shape(ty), returning(value));
        let context = Arc::new(RequestContext::new());
        fetcher(env(&context)).await.unwrap().into_value().unwrap()
    }

    #[tokio::test]
    async fn lists_drop_denied_elements() {
        let list = || TypeRef::list(TypeRef::class("Long"));
        assert_eq!(run(list(), Value::List(vec![])).await, Value::List(vec![]));
        assert_eq!(
            run(list(), Value::from(vec![13])).await,
            Value::List(vec![])
        );
        assert_eq!(
            run(list(), Value::from(vec![1, 13, 2, 13, 3])).await,
            Value::from(vec![1, 2, 3])
        );
    }

    #[tokio::test]
    async fn denied_optional_values_become_null() {
        let nested = TypeRef::list(TypeRef::optional(TypeRef::class("Long")));
        assert_eq!(
            run(nested, Value::from(vec![1, 13])).await,
            Value::List(vec![Value::Int(1), Value::Null])
        );
        let single = TypeRef::optional(TypeRef::class("Long"));
        assert_eq!(run(single, Value::Int(13)).await, Value::Null);
    }

    #[tokio::test]
    async fn failing_checks_deny() {
        let list = TypeRef::list(TypeRef::class("Long"));
        assert_eq!(
            run(list, Value::List(vec![Value::from("x"), Value::Int(4)])).await,
            Value::from(vec![4])
        );
    }

    #[tokio::test]
    async fn streams_skip_denied_elements() {
        let factory = Arc::new(CountingFactory::default());
        let fetcher: DataFetcher = Arc::new(|_| {
            Box::pin(async {
                let items = stream::iter(vec![Ok(Value::Int(13))]).boxed();
                Ok(Resolved::Stream(items))
            })
        });
        let ty = TypeRef::stream(TypeRef::class("Long"));
        let fetcher = restrict("Long".into(), factory, &shape(ty), fetcher);
        let context = Arc::new(RequestContext::new());
        let items: Vec<_> = fetcher(env(&context))
            .await
            .unwrap()
            .into_stream()
            .unwrap()
            .collect()
            .await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn one_policy_per_request() {
        let factory = Arc::new(CountingFactory::default());
        let ty = TypeRef::list(TypeRef::class("Long"));
        let fetcher = restrict(
            "Long".into(),
            factory.clone(),
            &shape(ty),
            returning(Value::from(vec![1])),
        );

        let context = Arc::new(RequestContext::new());
        let fields = (0..8).map(|_| fetcher(env(&context)));
        for result in join_all(fields).await {
            assert!(result.is_ok());
        }
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);

        let next_request = Arc::new(RequestContext::new());
        fetcher(env(&next_request)).await.unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn factory_failures_are_field_errors() {
        let ty = TypeRef::class("Long");
        let fetcher = restrict(
            "Long".into(),
            Arc::new(FailingFactory),
            &shape(ty),
            returning(Value::Int(1)),
        );
        let context = Arc::new(RequestContext::new());
        let err = fetcher(env(&context)).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "restriction policy for 'Long' could not be created: policy store unavailable"
        );
    }
}
