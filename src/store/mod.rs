//! Resource store contract
//!
//! The compiled schema never touches storage directly. Root fields, backlink
//! connections and node lookups all go through [`ResourceStore`], which a host
//! application implements over its own backend. [`MemoryStore`] is an
//! in-process implementation for tests and the demo binary.

mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// A single parsed comparison, evaluated against the value at a property path
///
/// Operands on date properties arrive as integer milliseconds and operands on
/// byte properties as `base64:<data>` literals. Stores are expected to hold
/// those values in the same form.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Neq(Value),
    /// `true` matches missing or null values
    Null(bool),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Between { low: Value, high: Value },
    StartsWith(String),
    Contains(String),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    /// Model ids the discriminator must belong to, already expanded to subclasses
    SubclassOf(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Dotted property path, e.g. `owner._permalink`
    pub property: String,
    pub condition: Condition,
}

/// Conjunction of predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, property: impl Into<String>, condition: Condition) {
        self.predicates.push(Predicate {
            property: property.into(),
            condition,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// First predicate on `property`, if any
    pub fn find(&self, property: &str) -> Option<&Condition> {
        self.predicates
            .iter()
            .find(|p| p.property == property)
            .map(|p| &p.condition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub property: String,
    pub desc: bool,
}

/// Arguments of a list scan
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub model: String,
    /// Registered subclasses of `model` whose resources also belong to the scan
    pub subclasses: Vec<String>,
    pub filter: Filter,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    /// Opaque position to resume after, as decoded from a cursor
    pub checkpoint: Option<Value>,
    /// Properties the caller will read; empty means everything
    pub select: Vec<String>,
}

impl ListRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            subclasses: Vec::new(),
            filter: Filter::default(),
            order_by: None,
            limit: None,
            checkpoint: None,
            select: Vec::new(),
        }
    }

    /// Whether a resource with discriminator `t` belongs to the scan
    pub fn covers(&self, t: &str) -> bool {
        t == self.model || self.subclasses.iter().any(|id| id == t)
    }

    pub fn is_descending(&self) -> bool {
        self.order_by.as_ref().is_some_and(|o| o.desc)
    }
}

/// Maps a returned item to its position marker
pub type PositionFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub struct ListResult {
    pub items: Vec<Value>,
    pub start_position: Option<Value>,
    pub end_position: Option<Value>,
    pub item_to_position: Option<PositionFn>,
}

impl ListResult {
    pub fn from_items(items: Vec<Value>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn position_of(&self, item: &Value) -> Option<Value> {
        self.item_to_position.as_ref().map(|f| f(item))
    }
}

impl fmt::Debug for ListResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListResult")
            .field("items", &self.items)
            .field("start_position", &self.start_position)
            .field("end_position", &self.end_position)
            .field("item_to_position", &self.item_to_position.is_some())
            .finish()
    }
}

/// Fetch and scan operations the resolvers depend on
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch by primary key. `key` always carries `_t` plus the key properties.
    async fn get(&self, model: &str, key: &Map<String, Value>) -> Result<Option<Value>, StoreError>;

    async fn get_by_link(&self, link: &str) -> Result<Value, StoreError>;

    async fn list(&self, request: ListRequest) -> Result<ListResult, StoreError>;
}

pub type SharedStore = Arc<dyn ResourceStore>;

/// Value at a dotted path, descending through objects only
pub fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}
