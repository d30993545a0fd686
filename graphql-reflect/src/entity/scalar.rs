use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::ScalarType;

use super::EntityHolder;
use super::EntityRegistry;
use super::ValueResolver;
use crate::directives;
use crate::error::SchemaError;
use crate::scalars::Coercion;

/// Emits the scalar definition (unless GraphQL defines it) and registers its coercion.
pub(super) fn build(
    registry: &mut EntityRegistry,
    holder: &Arc<EntityHolder>,
) -> Result<(), SchemaError> {
    let class = holder.class().clone();
    let coercion = registry
        .scalars()
        .get(&class.name)
        .cloned()
        .ok_or_else(|| SchemaError::UnknownScalar {
            class: class.qualified_name(),
        })?;
    let Some(type_name) = holder.output_name().cloned() else {
        return Ok(());
    };

    if !coercion.is_built_in() {
        let directives = directives::applied(registry, &class.annotations)?;
        registry.insert_type(ExtendedType::Scalar(Node::new(ScalarType {
            description: class
                .annotations
                .description()
                .or(coercion.description())
                .map(Into::into),
            name: type_name.clone(),
            directives: directives::component_list(directives),
        })))?;
    }
    registry
        .code_registry_mut()
        .register_scalar(type_name, coercion.clone());
    holder.set_resolver(resolver(coercion));
    Ok(())
}

pub(super) fn resolver(coercion: Arc<dyn Coercion>) -> ValueResolver {
    Arc::new(move |input| Ok(coercion.parse_value(input)?))
}
