//! Memoized type nodes
//!
//! One canonical [`TypeNode`] per [`TypeKey`]. The shared stub, enum value and
//! page-info types are built once when the cache is created.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::types::{FieldDef, FieldType, InputFieldDef, Resolve, Scalar, SharedType, TypeKey, TypeNode, ValueShape};
use crate::models::base::{DISPLAY_NAME_PROPERTY, LINK_PROPERTY, PERMALINK_PROPERTY, TYPE_PROPERTY};

#[derive(Debug)]
pub struct TypeCache {
    entries: RwLock<HashMap<TypeKey, Arc<TypeNode>>>,
    shared: HashMap<SharedType, Arc<TypeNode>>,
}

impl TypeCache {
    pub fn new() -> Self {
        let shared = SharedType::ALL
            .into_iter()
            .map(|ty| (ty, Arc::new(shared_node(ty))))
            .collect();
        Self {
            entries: RwLock::new(HashMap::new()),
            shared,
        }
    }

    pub fn get(&self, key: &TypeKey) -> Option<Arc<TypeNode>> {
        self.entries.read().get(key).cloned()
    }

    /// Store a freshly built node. If another caller got there first, its
    /// node is kept and returned instead.
    pub fn insert(&self, key: TypeKey, node: TypeNode) -> Arc<TypeNode> {
        let mut entries = self.entries.write();
        entries.entry(key).or_insert_with(|| Arc::new(node)).clone()
    }

    /// Store an already shared node under another key
    pub fn alias(&self, key: TypeKey, node: Arc<TypeNode>) -> Arc<TypeNode> {
        let mut entries = self.entries.write();
        entries.entry(key).or_insert(node).clone()
    }

    pub fn shared(&self, ty: SharedType) -> Arc<TypeNode> {
        // Every SharedType is inserted in `new`
        self.shared[&ty].clone()
    }

    /// Drop every memoized model type
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for TypeCache {
    fn default() -> Self {
        Self::new()
    }
}

fn property_field(name: &str, ty: FieldType) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        ty,
        description: None,
        resolve: Resolve::Property {
            path: name.to_string(),
            shape: ValueShape::Value,
        },
        args: Vec::new(),
    }
}

fn input_field(name: &str, ty: FieldType) -> InputFieldDef {
    InputFieldDef {
        name: name.to_string(),
        ty,
        description: None,
    }
}

fn shared_node(ty: SharedType) -> TypeNode {
    let string = || FieldType::scalar(Scalar::String);
    let boolean = || FieldType::scalar(Scalar::Boolean).non_null();
    match ty {
        SharedType::Stub => TypeNode::object(
            ty.name(),
            vec![
                property_field(TYPE_PROPERTY, string().non_null()),
                property_field(PERMALINK_PROPERTY, string().non_null()),
                property_field(LINK_PROPERTY, string()),
                property_field(DISPLAY_NAME_PROPERTY, string()),
            ],
        )
        .with_description(Some("Reference to another resource".into())),
        SharedType::StubInput => TypeNode::input(
            ty.name(),
            vec![
                input_field(TYPE_PROPERTY, string()),
                input_field(PERMALINK_PROPERTY, string()),
                input_field(LINK_PROPERTY, string()),
            ],
        ),
        SharedType::EnumValue => TypeNode::object(
            ty.name(),
            vec![
                property_field("id", string().non_null()),
                property_field("title", string()),
            ],
        )
        .with_description(Some("Value of an open enumeration model".into())),
        SharedType::EnumValueInput => TypeNode::input(
            ty.name(),
            vec![input_field("id", string()), input_field("title", string())],
        ),
        SharedType::PageInfo => TypeNode::object(
            ty.name(),
            vec![
                property_field("hasNextPage", boolean()),
                property_field("hasPreviousPage", boolean()),
                property_field("startCursor", string()),
                property_field("endCursor", string()),
            ],
        ),
    }
}
