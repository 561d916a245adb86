//! GraphQL schema compiler
//!
//! Models are compiled into an intermediate representation ([`types`]) by the
//! [`compiler`], memoized in the [`cache`], and assembled into an
//! `async_graphql::dynamic::Schema` whose resolvers read from a
//! [`ResourceStore`](crate::store::ResourceStore).

pub mod cache;
pub mod compiler;
pub mod filters;
mod mapper;
pub mod naming;
pub mod pagination;
mod references;
pub mod resolvers;
pub mod scalars;
mod schema;
pub mod types;

pub use cache::TypeCache;
pub use compiler::TypeCompiler;
pub use pagination::{Connection, ConnectionArgs, Edge, PageInfo, decode_cursor, encode_cursor};
pub use resolvers::Lookup;
pub use schema::SchemaBuilder;
pub use types::{InputKind, TypeKey, TypeNode, Variant};
