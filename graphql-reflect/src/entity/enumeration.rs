use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::EnumType;
use apollo_compiler::schema::EnumValueDefinition;
use apollo_compiler::schema::ExtendedType;
use serde_json_bytes::Value as JsonValue;

use super::EntityHolder;
use super::EntityRegistry;
use super::name;
use crate::directives;
use crate::error::ConversionError;
use crate::error::SchemaError;
use crate::meta::EnumValue;
use crate::meta::IGNORE;
use crate::meta::Value;

/// One enum value per constant not marked ignored. Inputs resolve to the constant itself.
pub(super) fn build(
    registry: &mut EntityRegistry,
    holder: &Arc<EntityHolder>,
) -> Result<(), SchemaError> {
    let class = holder.class().clone();
    let Some(type_name) = holder.output_name().cloned() else {
        return Ok(());
    };

    let mut values = IndexMap::default();
    let mut constants = Vec::new();
    for constant in class
        .constants
        .iter()
        .filter(|constant| !constant.annotations.has(IGNORE))
    {
        let value = name(&constant.name)?;
        let directives = directives::applied(registry, &constant.annotations)?;
        values.insert(
            value.clone(),
            Component::new(EnumValueDefinition {
                description: constant.annotations.description().map(Into::into),
                value,
                directives: directives::ast_list(directives),
            }),
        );
        constants.push(constant.name.clone());
    }

    let directives = directives::applied(registry, &class.annotations)?;
    registry.insert_type(ExtendedType::Enum(Node::new(EnumType {
        description: class.annotations.description().map(Into::into),
        name: type_name,
        directives: directives::component_list(directives),
        values,
    })))?;

    let enumeration = class.name.clone();
    holder.set_resolver(Arc::new(move |input| {
        let JsonValue::String(constant) = input else {
            return Err(ConversionError::expected(format!("enum {enumeration}"), input));
        };
        constants
            .iter()
            .find(|known| &***known == constant.as_str())
            .map(|known| Value::Enum(EnumValue::new(enumeration.clone(), known.clone())))
            .ok_or_else(|| ConversionError::UnknownEnumConstant {
                enumeration: enumeration.to_string(),
                constant: constant.as_str().to_string(),
            })
    }));
    Ok(())
}
