//! Derives an executable GraphQL schema from annotated class metadata.
//!
//! Classes, their members and their annotations are described with [`meta`] and collected on a
//! [`ClassPath`]. A [`SchemaBuilder`] scans it: annotated classes become object, interface,
//! input, enum, union and one-of types, static methods annotated `Query`, `Mutation` or
//! `Subscription` become root fields, and every field gets a [`DataFetcher`] in the resulting
//! [`ExecutableSchema`].

#![warn(unreachable_pub)]

pub mod code_registry;
pub mod configuration;
pub mod directives;
pub mod entity;
pub mod error;
pub mod fetcher;
pub mod graphql;
pub mod json_ext;
pub mod meta;
pub mod scalars;
mod schema;
pub mod type_shape;

pub use code_registry::CodeRegistry;
pub use code_registry::FieldCoordinate;
pub use configuration::Configuration;
pub use directives::DirectiveHandler;
pub use directives::restriction::RestrictionFactory;
pub use directives::restriction::RestrictionPolicy;
pub use error::ConversionError;
pub use error::FieldError;
pub use error::SchemaError;
pub use fetcher::DataFetcher;
pub use fetcher::Environment;
pub use fetcher::RequestContext;
pub use fetcher::Resolved;
pub use meta::ClassPath;
pub use scalars::Coercion;
pub use schema::ExecutableSchema;
pub use schema::SchemaBuilder;
