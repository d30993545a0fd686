use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;

use super::ClassKind;
use super::ClassMeta;
use super::ClassName;
use super::ENVIRONMENT_CLASS;
use super::GenericBindings;
use super::OBJECT_CLASS;
use super::TypeRef;
use super::Value;
use crate::error::SchemaError;
use crate::type_shape::Modifier;

const BUILT_IN_PACKAGE: &str = "std";

const SCALAR_CLASSES: &[&str] = &[
    "String", "Boolean", "Int", "Float", "ID", "Long", "DateTime", "Date", "Duration", "Timezone",
];

/// One declared ancestor of a class, with its type parameters bound from the descendant.
#[derive(Clone, Debug)]
pub struct Supertype {
    pub class: Arc<ClassMeta>,
    pub bindings: GenericBindings,
}

/// The set of classes the schema can be derived from.
#[derive(Clone, Debug)]
pub struct ClassPath {
    classes: IndexMap<ClassName, Arc<ClassMeta>>,
}

impl Default for ClassPath {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassPath {
    /// A class path holding only the built-in classes.
    pub fn new() -> Self {
        let mut class_path = ClassPath {
            classes: IndexMap::new(),
        };
        let builtin = |name: &str| ClassMeta::builder(name).package(BUILT_IN_PACKAGE);

        class_path.register(builtin(OBJECT_CLASS).build());
        class_path.register(builtin("void").build());
        class_path.register(builtin(ENVIRONMENT_CLASS).build());
        for scalar in SCALAR_CLASSES {
            class_path.register(builtin(scalar).build());
        }
        for (name, modifier) in [
            ("Vec", Modifier::Array),
            ("Set", Modifier::Array),
            ("Option", Modifier::Optional),
            ("Future", Modifier::Async),
            ("Stream", Modifier::Stream),
        ] {
            class_path.register(
                builtin(name)
                    .kind(ClassKind::Interface)
                    .type_param("T")
                    .wrapper(modifier)
                    .build(),
            );
        }
        class_path
    }

    pub fn register(&mut self, class: ClassMeta) -> Arc<ClassMeta> {
        let class = Arc::new(class);
        self.classes.insert(class.name.clone(), class.clone());
        class
    }

    pub fn with(mut self, class: ClassMeta) -> Self {
        self.register(class);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ClassMeta>> {
        self.classes.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Arc<ClassMeta>, SchemaError> {
        self.get(name).ok_or_else(|| SchemaError::UnknownClass {
            class: name.to_string(),
        })
    }

    /// Classes whose package lies under one of `packages`. An empty list selects every
    /// non-built-in class.
    pub fn scan<'a>(&'a self, packages: &'a [String]) -> impl Iterator<Item = &'a Arc<ClassMeta>> {
        self.classes.values().filter(move |class| {
            if &*class.package == BUILT_IN_PACKAGE {
                return false;
            }
            packages.is_empty()
                || packages.iter().any(|root| {
                    &*class.package == root.as_str()
                        || class
                            .package
                            .strip_prefix(root.as_str())
                            .is_some_and(|rest| rest.starts_with('.'))
                })
        })
    }

    /// The declared supertype chain of `class`, nearest first, excluding the universal base.
    ///
    /// Type parameters of every ancestor are bound transitively from `bindings`, which binds the
    /// type parameters of `class` itself.
    pub fn supertypes(
        &self,
        class: &ClassMeta,
        bindings: &GenericBindings,
    ) -> Result<Vec<Supertype>, SchemaError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((class.name.clone(), declared_supertypes(class), bindings.clone()));

        while let Some((owner, declared, bindings)) = queue.pop_front() {
            for declared in declared {
                let resolved =
                    declared
                        .substitute(&bindings)
                        .map_err(|var| SchemaError::UnboundTypeVariable {
                            variable: var.to_string(),
                            context: owner.to_string(),
                        })?;
                let TypeRef::Class { name, args } = resolved else {
                    continue;
                };
                if &*name == OBJECT_CLASS || !seen.insert(name.clone()) {
                    continue;
                }
                let ancestor = self.require(&name)?.clone();
                let ancestor_bindings = bind(&ancestor, &args)?;
                queue.push_back((
                    ancestor.name.clone(),
                    declared_supertypes(&ancestor),
                    ancestor_bindings.clone(),
                ));
                chain.push(Supertype {
                    class: ancestor,
                    bindings: ancestor_bindings,
                });
            }
        }
        Ok(chain)
    }

    /// Classes directly extending or implementing `name`.
    pub fn subclasses<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Arc<ClassMeta>> {
        self.classes.values().filter(move |class| {
            declared_supertypes(class).iter().any(|ty| match ty {
                TypeRef::Class { name: n, .. } => &**n == name,
                _ => false,
            })
        })
    }

    /// Whether `class` is `ancestor` or inherits from it, ignoring generic arguments.
    pub fn is_subclass(&self, class: &str, ancestor: &str) -> bool {
        if class == ancestor || ancestor == OBJECT_CLASS {
            return true;
        }
        let mut queue = VecDeque::from([class.to_string()]);
        let mut seen = HashSet::new();
        while let Some(current) = queue.pop_front() {
            let Some(meta) = self.get(&current) else {
                continue;
            };
            for ty in declared_supertypes(meta) {
                if let TypeRef::Class { name, .. } = ty {
                    if &*name == ancestor {
                        return true;
                    }
                    if seen.insert(name.clone()) {
                        queue.push_back(name.to_string());
                    }
                }
            }
        }
        false
    }

    /// Runtime type test of `value` against `class`.
    pub fn is_instance(&self, value: &Value, class: &str) -> bool {
        match value {
            Value::Null => false,
            Value::Int(_) => matches!(class, "Int" | "Long" | OBJECT_CLASS),
            Value::String(_) => matches!(class, "String" | "ID" | OBJECT_CLASS),
            other => other
                .class_name()
                .is_some_and(|runtime| self.is_subclass(runtime, class)),
        }
    }
}

fn declared_supertypes(class: &ClassMeta) -> Vec<TypeRef> {
    class
        .superclass
        .iter()
        .chain(class.interfaces.iter())
        .cloned()
        .collect()
}

/// Binds the type parameters of `class` positionally to `args`.
pub(crate) fn bind(class: &ClassMeta, args: &[TypeRef]) -> Result<GenericBindings, SchemaError> {
    if class.type_params.len() != args.len() {
        return Err(SchemaError::UnmappedGeneric {
            class: class.name.to_string(),
            expected: class.type_params.len(),
            found: args.len(),
        });
    }
    Ok(class
        .type_params
        .iter()
        .cloned()
        .zip(args.iter().cloned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MethodMeta;

    fn class_path() -> ClassPath {
        ClassPath::new()
            .with(
                ClassMeta::builder("Box")
                    .package("app.model")
                    .kind(ClassKind::Abstract)
                    .type_param("T")
                    .method(MethodMeta::getter("value", TypeRef::var("T")))
                    .build(),
            )
            .with(
                ClassMeta::builder("Labelled")
                    .package("app.model")
                    .kind(ClassKind::Abstract)
                    .type_param("L")
                    .extends(TypeRef::generic("Box", [TypeRef::var("L")]))
                    .build(),
            )
            .with(
                ClassMeta::builder("Name")
                    .package("app.model.people")
                    .extends(TypeRef::generic("Labelled", [TypeRef::class("String")]))
                    .build(),
            )
            .with(ClassMeta::builder("Other").package("application").build())
    }

    #[test]
    fn supertypes_bind_generics_transitively() {
        let class_path = class_path();
        let name = class_path.get("Name").unwrap().clone();
        let chain = class_path.supertypes(&name, &GenericBindings::new()).unwrap();

        let names: Vec<_> = chain.iter().map(|s| s.class.name.to_string()).collect();
        assert_eq!(names, vec!["Labelled", "Box"]);
        assert_eq!(chain[0].bindings["L"], TypeRef::class("String"));
        assert_eq!(chain[1].bindings["T"], TypeRef::class("String"));
    }

    #[test]
    fn raw_generic_supertype_is_rejected() {
        let class_path = class_path().with(
            ClassMeta::builder("Raw")
                .extends(TypeRef::class("Box"))
                .build(),
        );
        let raw = class_path.get("Raw").unwrap().clone();
        let err = class_path
            .supertypes(&raw, &GenericBindings::new())
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnmappedGeneric { .. }));
    }

    #[test]
    fn scan_matches_package_roots() {
        let class_path = class_path();
        let roots = vec!["app.model".to_string()];
        let found: Vec<_> = class_path.scan(&roots).map(|c| c.name.to_string()).collect();
        assert_eq!(found, vec!["Box", "Labelled", "Name"]);

        let all: Vec<_> = class_path.scan(&[]).map(|c| c.name.to_string()).collect();
        assert_eq!(all, vec!["Box", "Labelled", "Name", "Other"]);
    }

    #[test]
    fn instance_checks_walk_the_hierarchy() {
        let class_path = class_path();
        let name = Value::Object(crate::meta::Object::new("Name"));
        assert!(class_path.is_instance(&name, "Box"));
        assert!(class_path.is_instance(&name, "Name"));
        assert!(!class_path.is_instance(&name, "Other"));
        assert!(!class_path.is_instance(&Value::Null, "Name"));
    }
}
