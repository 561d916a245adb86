//! modelql - compiles declarative model registries into a GraphQL schema
//!
//! Register models with a [`SchemaBuilder`], then build an executable schema
//! against any [`ResourceStore`]:
//!
//! ```rust,ignore
//! let schema = SchemaBuilder::new()
//!     .add_models(parse_models(json)?)?
//!     .build(Arc::new(MemoryStore::new()))?;
//! ```

pub mod error;
pub mod graphql;
pub mod models;
pub mod store;

pub use error::{Error, ErrorKind, Result};
pub use graphql::{SchemaBuilder, Variant};
pub use models::{Model, Property, Registry, load_models, parse_models};
pub use store::{MemoryStore, ResourceStore, SharedStore, StoreError};
