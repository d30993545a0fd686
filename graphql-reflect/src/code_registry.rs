//! Runtime wiring of a derived schema: data fetchers, type resolvers and scalar coercions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::collections::IndexMap;

use crate::entity::TypeResolver;
use crate::fetcher::DataFetcher;
use crate::scalars::Coercion;

/// A field of an object type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldCoordinate {
    pub type_name: Name,
    pub field_name: Name,
}

impl FieldCoordinate {
    pub fn new(type_name: Name, field_name: Name) -> Self {
        Self {
            type_name,
            field_name,
        }
    }
}

impl fmt::Display for FieldCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

#[derive(Clone, Default)]
pub struct CodeRegistry {
    fetchers: HashMap<Name, HashMap<Name, DataFetcher>>,
    type_resolvers: HashMap<Name, TypeResolver>,
    scalars: IndexMap<Name, Arc<dyn Coercion>>,
}

impl CodeRegistry {
    pub fn register_fetcher(&mut self, coordinate: FieldCoordinate, fetcher: DataFetcher) {
        tracing::trace!(field = %coordinate, "registered data fetcher");
        self.fetchers
            .entry(coordinate.type_name)
            .or_default()
            .insert(coordinate.field_name, fetcher);
    }

    pub fn fetcher(&self, type_name: &str, field_name: &str) -> Option<&DataFetcher> {
        self.fetchers.get(type_name)?.get(field_name)
    }

    /// Every field with a registered fetcher.
    pub fn coordinates(&self) -> impl Iterator<Item = FieldCoordinate> + '_ {
        self.fetchers.iter().flat_map(|(type_name, fields)| {
            fields
                .keys()
                .map(|field_name| FieldCoordinate::new(type_name.clone(), field_name.clone()))
        })
    }

    pub fn register_type_resolver(&mut self, abstract_type: Name, resolver: TypeResolver) {
        self.type_resolvers.insert(abstract_type, resolver);
    }

    pub fn type_resolver(&self, abstract_type: &str) -> Option<&TypeResolver> {
        self.type_resolvers.get(abstract_type)
    }

    pub fn register_scalar(&mut self, name: Name, coercion: Arc<dyn Coercion>) {
        self.scalars.insert(name, coercion);
    }

    pub fn scalar(&self, name: &str) -> Option<&Arc<dyn Coercion>> {
        self.scalars.get(name)
    }
}

impl fmt::Debug for CodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fetchers: Vec<_> = self.coordinates().map(|c| c.to_string()).collect();
        fetchers.sort();
        f.debug_struct("CodeRegistry")
            .field("fetchers", &fetchers)
            .field("type_resolvers", &self.type_resolvers.keys().collect::<Vec<_>>())
            .field("scalars", &self.scalars.keys().collect::<Vec<_>>())
            .finish()
    }
}
