//! Operation authorization.
//!
//! An authorizer is a class registered for a package. An operation is guarded by the authorizer
//! of the nearest enclosing package of its declaring class. The checks for an operation are the
//! authorizer's methods sharing the operation's name and returning a boolean (possibly
//! asynchronously). When several exist, the ones whose parameter names overlap most with the
//! operation's parameters are kept; the operation runs when any of them grants access.

use std::sync::Arc;

use futures::FutureExt;
use itertools::Itertools;

use crate::entity::EntityRegistry;
use crate::error::FieldError;
use crate::error::SchemaError;
use crate::fetcher::ArgumentBinder;
use crate::fetcher::DataFetcher;
use crate::fetcher::Environment;
use crate::fetcher::resolve_output;
use crate::meta::ClassMeta;
use crate::meta::ClassPath;
use crate::meta::GenericBindings;
use crate::meta::Invoker;
use crate::meta::MethodMeta;
use crate::meta::Output;
use crate::meta::Value;
use crate::type_shape::TypeShape;

/// One compiled authorization check.
#[derive(Clone)]
struct Check {
    binder: ArgumentBinder,
    invoker: Invoker,
    receiver: Option<Value>,
}

impl Check {
    async fn grants(&self, env: &Environment) -> Result<bool, FieldError> {
        let args = self.binder.bind(env)?;
        let output = (self.invoker)(self.receiver.as_ref(), args)
            .map_err(|error| FieldError::Application(error.unwrap_target()))?;
        let granted = resolve_output(output)
            .await?
            .into_value()
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        Ok(granted)
    }
}

/// The authorizer class registered for the nearest enclosing package of `class`.
fn nearest_authorizer(
    registry: &EntityRegistry,
    class: &ClassMeta,
) -> Result<Option<Arc<ClassMeta>>, SchemaError> {
    let authorizers = &registry.policies().authorizers;
    let mut package: &str = &class.package;
    loop {
        if let Some(authorizer) = authorizers.get(package) {
            return registry.class_path().require(authorizer).cloned().map(Some);
        }
        match package.rfind('.') {
            Some(dot) => package = &package[..dot],
            None if !package.is_empty() => package = "",
            None => return Ok(None),
        }
    }
}

/// Guards the fetcher of operation `method`, declared on `class`, with its authorizer.
///
/// Without an authorizer the fetcher is returned unchanged. When the authorizer declares no
/// matching check, every call fails. Tied checks are alternatives: the first to grant runs the
/// fetcher. If none grants, the call fails with the first check error, or `Unauthorized`.
pub(crate) fn wrap(
    registry: &mut EntityRegistry,
    class: &ClassMeta,
    method: &MethodMeta,
    fetcher: DataFetcher,
) -> Result<DataFetcher, SchemaError> {
    let Some(authorizer) = nearest_authorizer(registry, class)? else {
        return Ok(fetcher);
    };
    let instance = instantiate(&authorizer)?;

    let class_path = registry.class_path().clone();
    let candidates: Vec<_> = authorizer
        .methods
        .iter()
        .filter(|candidate| candidate.name == method.name)
        .filter(|candidate| returns_boolean(&class_path, candidate))
        .collect();
    let checks = candidates
        .into_iter()
        .max_set_by_key(|candidate| overlap(candidate, method))
        .into_iter()
        .map(|candidate| {
            let invoker = candidate
                .invoker
                .clone()
                .ok_or_else(|| SchemaError::NotInvocable {
                    member: candidate.qualified_name(),
                })?;
            let (binder, _) =
                ArgumentBinder::compile(registry, &candidate.params, &GenericBindings::new())?;
            Ok(Check {
                binder,
                invoker,
                receiver: (!candidate.modifiers.is_static).then(|| instance.clone()),
            })
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;
    tracing::debug!(
        operation = %method.qualified_name(),
        authorizer = %authorizer.qualified_name(),
        checks = checks.len(),
        "guarding operation"
    );

    let checks: Arc<[Check]> = checks.into();
    let operation = method.qualified_name();
    Ok(Arc::new(move |env: Environment| {
        let checks = checks.clone();
        let fetcher = fetcher.clone();
        let operation = operation.clone();
        async move {
            if checks.is_empty() {
                return Err(FieldError::NoAuthorizerMatch { method: operation });
            }
            // A failing check counts as a denial; the remaining alternatives still run.
            let mut failure = None;
            for check in checks.iter() {
                let granted = check.grants(&env).await;
                match granted {
                    Ok(true) => return fetcher(env).await,
                    Ok(false) => {}
                    Err(error) => {
                        tracing::warn!(
                            operation = %operation,
                            error = %error,
                            "authorization check failed"
                        );
                        failure.get_or_insert(error);
                    }
                }
            }
            Err(failure.unwrap_or_else(|| FieldError::Unauthorized {
                field: env.field_name.clone(),
            }))
        }
        .boxed()
    }))
}

fn instantiate(authorizer: &ClassMeta) -> Result<Value, SchemaError> {
    let constructor = authorizer
        .constructors
        .iter()
        .find(|constructor| constructor.params.is_empty())
        .ok_or_else(|| SchemaError::MissingConstructor {
            class: authorizer.qualified_name(),
            arity: 0,
        })?;
    match (constructor.invoker)(None, Vec::new()) {
        Ok(Output::Value(instance)) => Ok(instance),
        Ok(_) => Err(SchemaError::Instantiation {
            class: authorizer.qualified_name(),
            reason: "constructors must return synchronously".to_string(),
        }),
        Err(error) => Err(SchemaError::Instantiation {
            class: authorizer.qualified_name(),
            reason: error.to_string(),
        }),
    }
}

fn returns_boolean(class_path: &ClassPath, candidate: &MethodMeta) -> bool {
    TypeShape::resolve(class_path, &candidate.return_type, &GenericBindings::new())
        .is_ok_and(|shape| {
            shape.is_class("Boolean") && !shape.is_stream() && shape.value_modifiers().is_empty()
        })
}

/// Number of the candidate's parameter names the operation also declares.
fn overlap(candidate: &MethodMeta, operation: &MethodMeta) -> usize {
    candidate
        .params
        .iter()
        .filter(|param| operation.params.iter().any(|p| p.name == param.name))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;
    use crate::directives::Policies;

    fn with_authorizers(authorizers: &[(&str, &str)]) -> EntityRegistry {
        let class_path = ClassPath::new()
            .with(ClassMeta::builder("RootAuth").package("app").build())
            .with(ClassMeta::builder("AdminAuth").package("app.admin").build())
            .with(ClassMeta::builder("Users").package("app.admin.users").build())
            .with(ClassMeta::builder("Other").package("lib").build());
        let mut policies = Policies::default();
        for (package, class) in authorizers {
            policies
                .authorizers
                .insert((*package).into(), (*class).into());
        }
        EntityRegistry::new(Arc::new(class_path), Arc::new(Configuration::default()))
            .with_policies(policies)
    }

    fn nearest(registry: &EntityRegistry, class: &str) -> Option<String> {
        let class = registry.class_path().require(class).unwrap();
        nearest_authorizer(registry, class)
            .unwrap()
            .map(|authorizer| authorizer.name.to_string())
    }

    #[test]
    fn nearest_package_wins() {
        let registry = with_authorizers(&[("app", "RootAuth"), ("app.admin", "AdminAuth")]);
        assert_eq!(nearest(&registry, "Users").as_deref(), Some("AdminAuth"));
        assert_eq!(nearest(&registry, "RootAuth").as_deref(), Some("RootAuth"));
        assert_eq!(nearest(&registry, "Other"), None);

        let registry = with_authorizers(&[("", "RootAuth")]);
        assert_eq!(nearest(&registry, "Other").as_deref(), Some("RootAuth"));
    }

    #[test]
    fn overlap_counts_shared_parameter_names() {
        use crate::meta::ParamMeta;
        use crate::meta::TypeRef;

        let param = |name: &str| ParamMeta::new(name, TypeRef::class("String"));
        let operation = MethodMeta::new("user", TypeRef::class("String"))
            .param(param("id"))
            .param(param("tenant"));
        let by_id = MethodMeta::new("user", TypeRef::class("Boolean")).param(param("id"));
        let by_both = MethodMeta::new("user", TypeRef::class("Boolean"))
            .param(param("tenant"))
            .param(param("id"));
        let unrelated = MethodMeta::new("user", TypeRef::class("Boolean")).param(param("role"));
        assert_eq!(overlap(&by_id, &operation), 1);
        assert_eq!(overlap(&by_both, &operation), 2);
        assert_eq!(overlap(&unrelated, &operation), 0);
    }
}
