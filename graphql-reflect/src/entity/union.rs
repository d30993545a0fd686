//! Unions and one-of inputs.
//!
//! Both list their member classes on the annotation's `value`. A union is output-only; a
//! one-of entity is a union on output and, on input, an input object with one nullable field
//! per branch of which exactly one must be populated.

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast::InputValueDefinition;
use apollo_compiler::ast::Type;
use apollo_compiler::collections::IndexMap;
use apollo_compiler::collections::IndexSet;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ComponentName;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::InputObjectType;
use apollo_compiler::schema::UnionType;
use heck::ToLowerCamelCase;
use serde_json_bytes::Value as JsonValue;

use super::EntityHolder;
use super::EntityRegistry;
use super::ValueResolver;
use super::name;
use super::not_an_input;
use super::type_resolver;
use crate::directives;
use crate::error::ConversionError;
use crate::error::SchemaError;
use crate::meta::ClassMeta;
use crate::meta::ClassName;
use crate::meta::GenericBindings;
use crate::meta::ONE_OF;
use crate::meta::UNION;

pub(super) fn build_union(
    registry: &mut EntityRegistry,
    holder: &Arc<EntityHolder>,
) -> Result<(), SchemaError> {
    let members = member_classes(registry, holder, UNION)?;
    emit_union(registry, holder, &members)?;
    holder.set_resolver(not_an_input(holder.class().name.clone()));
    Ok(())
}

pub(super) fn build_one_of(
    registry: &mut EntityRegistry,
    holder: &Arc<EntityHolder>,
) -> Result<(), SchemaError> {
    let branches = member_classes(registry, holder, ONE_OF)?;
    emit_union(registry, holder, &branches)?;

    let Some(input_name) = holder.input_name().cloned() else {
        holder.set_resolver(not_an_input(holder.class().name.clone()));
        return Ok(());
    };
    let unbound = GenericBindings::new();
    let mut fields = IndexMap::default();
    let mut resolvers: Vec<(String, ValueResolver)> = Vec::with_capacity(branches.len());
    for branch in &branches {
        let entity = registry.build_entity(branch, &unbound)?;
        let branch_input = entity
            .input_name()
            .cloned()
            .ok_or_else(|| SchemaError::NoInputType {
                entity: entity.key().to_string(),
            })?;
        let field = branch.name.to_lower_camel_case();
        let field_name = name(&field)?;
        fields.insert(
            field_name.clone(),
            Component::new(InputValueDefinition {
                description: branch.annotations.description().map(Into::into),
                name: field_name,
                ty: Node::new(Type::Named(branch_input)),
                default_value: None,
                directives: Default::default(),
            }),
        );
        resolvers.push((field, entity.resolver()));
    }

    let class = holder.class().clone();
    registry.insert_type(ExtendedType::InputObject(Node::new(InputObjectType {
        description: class.annotations.description().map(Into::into),
        name: input_name.clone(),
        directives: Default::default(),
        fields,
    })))?;

    holder.set_resolver(Arc::new(move |input| {
        let JsonValue::Object(map) = input else {
            return Err(ConversionError::expected(input_name.as_str(), input));
        };
        let mut populated = resolvers
            .iter()
            .filter_map(|(field, resolver)| match map.get(field.as_str()) {
                None | Some(JsonValue::Null) => None,
                Some(value) => Some((resolver, value)),
            });
        match (populated.next(), populated.count()) {
            (Some((resolver, value)), 0) => resolver(value),
            (first, rest) => Err(ConversionError::OneOf {
                input: input_name.to_string(),
                count: usize::from(first.is_some()) + rest,
            }),
        }
    }));
    Ok(())
}

fn member_classes(
    registry: &EntityRegistry,
    holder: &EntityHolder,
    annotation: &str,
) -> Result<Vec<Arc<ClassMeta>>, SchemaError> {
    let class = holder.class();
    class
        .annotations
        .get(annotation)
        .map(|annotation| annotation.strings("value"))
        .unwrap_or_default()
        .into_iter()
        .map(|member| registry.class_path().require(member).cloned())
        .collect()
}

fn emit_union(
    registry: &mut EntityRegistry,
    holder: &Arc<EntityHolder>,
    members: &[Arc<ClassMeta>],
) -> Result<(), SchemaError> {
    let Some(union_name) = holder.output_name().cloned() else {
        return Ok(());
    };
    let unbound = GenericBindings::new();
    let mut member_names = IndexSet::default();
    let mut dispatch: Vec<(ClassName, _)> = Vec::with_capacity(members.len());
    for member in members {
        let entity = registry.build_entity(member, &unbound)?;
        let object = entity
            .object_name()
            .cloned()
            .ok_or_else(|| SchemaError::NoOutputType {
                entity: entity.key().to_string(),
            })?;
        member_names.insert(ComponentName::from(object.clone()));
        dispatch.push((member.name.clone(), object));
    }

    let class = holder.class();
    let directives = directives::applied(registry, &class.annotations)?;
    registry.insert_type(ExtendedType::Union(Node::new(UnionType {
        description: class.annotations.description().map(Into::into),
        name: union_name.clone(),
        directives: directives::component_list(directives),
        members: member_names,
    })))?;
    type_resolver::register_union(registry, union_name, dispatch);
    Ok(())
}
