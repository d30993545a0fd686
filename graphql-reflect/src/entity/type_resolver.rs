//! Runtime type resolution for interfaces and unions.

use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::collections::IndexMap;

use super::EntityHolder;
use super::EntityRegistry;
use crate::error::FieldError;
use crate::error::SchemaError;
use crate::meta::ClassName;
use crate::meta::ClassPath;
use crate::meta::GenericBindings;
use crate::meta::TypeRef;
use crate::meta::Value;

/// Maps a runtime value of an abstract type to the name of its concrete object type.
pub type TypeResolver = Arc<dyn Fn(&Value) -> Result<Name, FieldError> + Send + Sync>;

/// Registers the resolver of the interface emitted for `holder`.
///
/// Candidates are the concrete, non-generic entities whose supertype chain contains the
/// interface's class with the same bindings, plus the class itself when it is concrete, mapped
/// to its direct object under any bindings. A
/// value resolves by walking its runtime class up the superclass chain until a candidate
/// matches, so an instance of an unmapped subclass lands on its nearest mapped ancestor.
pub(super) fn register_interface(
    registry: &mut EntityRegistry,
    holder: &Arc<EntityHolder>,
) -> Result<(), SchemaError> {
    let Some(interface) = holder.output_name().cloned() else {
        return Ok(());
    };
    let class_path = registry.class_path().clone();
    let unbound = GenericBindings::new();

    let mut candidates: IndexMap<ClassName, Name> = IndexMap::default();
    // Instances of the class itself, whatever its bindings, land on the direct object.
    if let Some(object) = holder.object_name() {
        candidates.insert(holder.class().name.clone(), object.clone());
    }
    for candidate in class_path.scan(&[]) {
        if !candidate.is_entity()
            || candidate.kind.is_abstract()
            || !candidate.type_params.is_empty()
            || candidate.name == holder.class().name
        {
            continue;
        }
        let implements = class_path
            .supertypes(candidate, &unbound)?
            .iter()
            .any(|s| s.class.name == holder.class().name && &s.bindings == holder.bindings());
        if !implements {
            continue;
        }
        let entity = registry.build_entity(candidate, &unbound)?;
        if let Some(object) = entity.object_name() {
            candidates.insert(candidate.name.clone(), object.clone());
        }
    }
    tracing::debug!(
        interface = %interface,
        candidates = candidates.len(),
        "registered interface type resolver"
    );

    let abstract_type = interface.clone();
    let resolver: TypeResolver = Arc::new(move |value| {
        let runtime = value.class_name().unwrap_or("null");
        let mut current = Some(runtime);
        while let Some(class) = current {
            if let Some(object) = candidates.get(class) {
                return Ok(object.clone());
            }
            current = superclass(&class_path, class);
        }
        Err(FieldError::UnsupportedType {
            abstract_type: interface.to_string(),
            runtime: runtime.to_string(),
        })
    });
    registry
        .code_registry_mut()
        .register_type_resolver(abstract_type, resolver);
    Ok(())
}

fn superclass<'a>(class_path: &'a ClassPath, class: &str) -> Option<&'a str> {
    match class_path.get(class)?.superclass.as_ref()? {
        TypeRef::Class { name, .. } => Some(name),
        _ => None,
    }
}

/// Registers the resolver of a union: members are tried in declaration order.
pub(super) fn register_union(
    registry: &mut EntityRegistry,
    union: Name,
    members: Vec<(ClassName, Name)>,
) {
    let class_path = registry.class_path().clone();
    let abstract_type = union.clone();
    let resolver: TypeResolver = Arc::new(move |value| {
        members
            .iter()
            .find(|(class, _)| class_path.is_instance(value, class))
            .map(|(_, object)| object.clone())
            .ok_or_else(|| FieldError::UnsupportedType {
                abstract_type: abstract_type.to_string(),
                runtime: value.class_name().unwrap_or("null").to_string(),
            })
    });
    registry
        .code_registry_mut()
        .register_type_resolver(union, resolver);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::configuration::Configuration;
    use crate::meta::ClassMeta;
    use crate::meta::MethodMeta;
    use crate::meta::Object;

    fn pages() -> ClassPath {
        ClassPath::new()
            .with(
                ClassMeta::builder("Page")
                    .entity()
                    .type_param("T")
                    .method(MethodMeta::getter("items", TypeRef::list(TypeRef::var("T"))))
                    .build(),
            )
            .with(
                ClassMeta::builder("NamePage")
                    .entity()
                    .extends(TypeRef::generic("Page", [TypeRef::class("String")]))
                    .build(),
            )
    }

    fn page_of(registry: &mut EntityRegistry, item: &str) -> Arc<EntityHolder> {
        let page = registry.class_path().require("Page").unwrap().clone();
        let bindings: GenericBindings = [("T".into(), TypeRef::class(item))].into_iter().collect();
        registry.build_entity(&page, &bindings).unwrap()
    }

    #[test]
    fn generic_entities_resolve_their_own_instances() {
        let mut registry = EntityRegistry::new(Arc::new(pages()), Arc::new(Configuration::default()));
        let of_int = page_of(&mut registry, "Int");
        assert_eq!(of_int.output_name().unwrap().as_str(), "Page_Int");
        assert_eq!(of_int.object_name().unwrap().as_str(), "Page_Int_DIRECT");
        page_of(&mut registry, "String");

        let page = Value::Object(Object::new("Page"));
        let names = Value::Object(Object::new("NamePage"));
        let resolve = registry.code_registry().type_resolver("Page_Int").unwrap();
        assert_eq!(resolve(&page).unwrap().as_str(), "Page_Int_DIRECT");

        let resolve = registry.code_registry().type_resolver("Page_String").unwrap();
        assert_eq!(resolve(&page).unwrap().as_str(), "Page_String_DIRECT");
        assert_eq!(resolve(&names).unwrap().as_str(), "NamePage");

        let err = resolve(&Value::from("page")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported type: 'Page_String' cannot represent 'String'"
        );
    }
}
