//! Decomposition of declared types into a base class plus wrapper modifiers.

use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::meta::ClassKind;
use crate::meta::ClassMeta;
use crate::meta::ClassPath;
use crate::meta::GenericBindings;
use crate::meta::TypeRef;
use crate::meta::class_path::bind;

/// A wrapper applied around a base type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Modifier {
    Array,
    Optional,
    Async,
    Stream,
}

impl Modifier {
    fn is_deferred(self) -> bool {
        matches!(self, Modifier::Async | Modifier::Stream)
    }
}

/// One declared type occurrence, decomposed.
///
/// `modifiers` runs outermost first and keeps the order in which wrappers were discovered.
#[derive(Clone)]
pub struct TypeShape {
    pub base: Arc<ClassMeta>,
    pub modifiers: Vec<Modifier>,
    pub bindings: GenericBindings,
    declared: TypeRef,
}

impl TypeShape {
    /// Resolves `declared` with the type variables of the enclosing class bound by `context`.
    pub fn resolve(
        class_path: &ClassPath,
        declared: &TypeRef,
        context: &GenericBindings,
    ) -> Result<Self, SchemaError> {
        let declared =
            declared
                .substitute(context)
                .map_err(|variable| SchemaError::UnboundTypeVariable {
                    variable: variable.to_string(),
                    context: declared.to_string(),
                })?;

        let mut modifiers = Vec::new();
        let mut current = &declared;
        let (base, args) = loop {
            match current {
                TypeRef::Array(inner) => {
                    modifiers.push(Modifier::Array);
                    current = inner;
                }
                TypeRef::Var(variable) => {
                    return Err(SchemaError::UnboundTypeVariable {
                        variable: variable.to_string(),
                        context: declared.to_string(),
                    });
                }
                TypeRef::Class { name, args } => {
                    let class = class_path.require(name)?;
                    match class.wrapper {
                        Some(modifier) => {
                            let [inner] = args.as_slice() else {
                                return Err(SchemaError::UnsupportedShape {
                                    ty: declared.to_string(),
                                    reason: format!("{name} takes exactly one type argument"),
                                });
                            };
                            modifiers.push(modifier);
                            current = inner;
                        }
                        None => break (class.clone(), args),
                    }
                }
            }
        };

        if modifiers.iter().filter(|m| m.is_deferred()).count() > 1 {
            return Err(SchemaError::UnsupportedShape {
                ty: declared.to_string(),
                reason: "asynchronous and streaming wrappers cannot nest".to_string(),
            });
        }

        let bindings = if base.kind == ClassKind::Enum {
            GenericBindings::new()
        } else {
            bind(&base, args)?
        };

        Ok(TypeShape {
            base,
            modifiers,
            bindings,
            declared,
        })
    }

    /// The declared type this shape was resolved from, with type variables substituted.
    pub fn declared(&self) -> &TypeRef {
        &self.declared
    }

    pub fn is_stream(&self) -> bool {
        self.modifiers.contains(&Modifier::Stream)
    }

    pub fn is_async(&self) -> bool {
        self.modifiers.contains(&Modifier::Async)
    }

    /// Array and Optional modifiers only, outermost first.
    pub fn value_modifiers(&self) -> Vec<Modifier> {
        self.modifiers
            .iter()
            .copied()
            .filter(|m| !m.is_deferred())
            .collect()
    }

    /// Modifiers applying to each element produced by a stream, outermost first.
    pub fn element_modifiers(&self) -> Vec<Modifier> {
        self.modifiers
            .iter()
            .skip_while(|m| **m != Modifier::Stream)
            .skip(1)
            .copied()
            .filter(|m| !m.is_deferred())
            .collect()
    }

    pub fn is_class(&self, name: &str) -> bool {
        &*self.base.name == name
    }
}

impl fmt::Debug for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeShape")
            .field("base", &self.base.name)
            .field("modifiers", &self.modifiers)
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl PartialEq for TypeShape {
    fn eq(&self, other: &Self) -> bool {
        self.base.name == other.base.name
            && self.modifiers == other.modifiers
            && self.bindings == other.bindings
    }
}
