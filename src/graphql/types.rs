//! Intermediate representation of derived GraphQL types
//!
//! Types are built from models into [`TypeNode`]s and only converted into
//! `async_graphql::dynamic` types at schema assembly. Field types refer to other
//! model-derived types by [`TypeKey`] rather than by value, so mutually
//! referencing models never need to be built recursively.

use std::fmt;

use crate::error::Result;
use crate::graphql::naming;

/// Operator families, each with its own per-model input type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// EQ / NEQ
    Compare,
    /// LT / LTE / GT / GTE
    ScalarCompare,
    /// STARTS_WITH / CONTAINS
    StringCompare,
    /// IN / NOT_IN / BETWEEN
    Selector,
    Null,
    SubclassOf,
}

impl InputKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            InputKind::Compare => "compare",
            InputKind::ScalarCompare => "scalar_compare",
            InputKind::StringCompare => "string_compare",
            InputKind::Selector => "selector",
            InputKind::Null => "NULL",
            InputKind::SubclassOf => "SUBCLASS_OF",
        }
    }
}

/// Which type derived from a model is wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Output,
    /// Output type of a model embedded by value
    Inlined,
    Input(InputKind),
    /// Input type of a model embedded by value
    InlinedInput(InputKind),
    /// Paginated backlink connection
    Connection,
    Edge,
    Filter,
    OrderBy,
    /// Enum of sortable property names
    PropertyNames,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Output => write!(f, "output"),
            Variant::Inlined => write!(f, "inlined output"),
            Variant::Input(kind) => write!(f, "{} input", kind.prefix()),
            Variant::InlinedInput(kind) => write!(f, "inlined {} input", kind.prefix()),
            Variant::Connection => write!(f, "connection"),
            Variant::Edge => write!(f, "edge"),
            Variant::Filter => write!(f, "filter"),
            Variant::OrderBy => write!(f, "orderBy"),
            Variant::PropertyNames => write!(f, "property name"),
        }
    }
}

/// Cache key: one canonical type per (model, variant)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub model: String,
    pub variant: Variant,
}

impl TypeKey {
    pub fn new(model: impl Into<String>, variant: Variant) -> Self {
        Self {
            model: model.into(),
            variant,
        }
    }

    /// GraphQL type name for this key
    pub fn type_name(&self) -> Result<String> {
        let base = naming::sanitize(&self.model);
        let name = match self.variant {
            Variant::Output => base,
            Variant::Inlined => format!("{base}_i"),
            Variant::Input(kind) => format!("{}_{base}", kind.prefix()),
            Variant::InlinedInput(kind) => format!("{}_{base}_i", kind.prefix()),
            Variant::Connection => format!("{base}Connection"),
            Variant::Edge => format!("{base}Edge"),
            Variant::Filter => format!("filter_{base}"),
            Variant::OrderBy => format!("orderby_{base}"),
            Variant::PropertyNames => format!("properties_{base}"),
        };
        naming::checked(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    String,
    Boolean,
    Float,
    Int,
    Id,
    Bytes,
    Timestamp,
    Json,
}

impl Scalar {
    pub fn name(&self) -> &'static str {
        match self {
            Scalar::String => "String",
            Scalar::Boolean => "Boolean",
            Scalar::Float => "Float",
            Scalar::Int => "Int",
            Scalar::Id => "ID",
            Scalar::Bytes => super::scalars::BYTES,
            Scalar::Timestamp => super::scalars::TIMESTAMP,
            Scalar::Json => super::scalars::JSON,
        }
    }
}

/// Types shared by every model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedType {
    Stub,
    StubInput,
    EnumValue,
    EnumValueInput,
    PageInfo,
}

impl SharedType {
    pub const ALL: [SharedType; 5] = [
        SharedType::Stub,
        SharedType::StubInput,
        SharedType::EnumValue,
        SharedType::EnumValueInput,
        SharedType::PageInfo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SharedType::Stub => "Stub",
            SharedType::StubInput => "StubInput",
            SharedType::EnumValue => "EnumValue",
            SharedType::EnumValueInput => "EnumValueInput",
            SharedType::PageInfo => "PageInfo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedType {
    Scalar(Scalar),
    Shared(SharedType),
    /// Forward reference to another model-derived type
    Node(TypeKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Named(NamedType),
    List(Box<FieldType>),
    NonNull(Box<FieldType>),
}

impl FieldType {
    pub fn scalar(scalar: Scalar) -> Self {
        FieldType::Named(NamedType::Scalar(scalar))
    }

    pub fn shared(shared: SharedType) -> Self {
        FieldType::Named(NamedType::Shared(shared))
    }

    pub fn node(key: TypeKey) -> Self {
        FieldType::Named(NamedType::Node(key))
    }

    pub fn list(self) -> Self {
        FieldType::List(Box::new(self))
    }

    /// Wrap as non-null; already non-null types are returned unchanged
    pub fn non_null(self) -> Self {
        match self {
            FieldType::NonNull(_) => self,
            other => FieldType::NonNull(Box::new(other)),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, FieldType::NonNull(_))
    }

    /// The innermost named type
    pub fn named(&self) -> &NamedType {
        match self {
            FieldType::Named(named) => named,
            FieldType::List(inner) | FieldType::NonNull(inner) => inner.named(),
        }
    }
}

/// How a resolved JSON value is handed to GraphQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueShape {
    /// Leaf scalar, converted as is
    Value,
    /// Date normalized to integer milliseconds
    Timestamp,
    /// Nested object resolved field by field
    Object,
    List(Box<ValueShape>),
}

impl ValueShape {
    pub fn list(self) -> Self {
        ValueShape::List(Box::new(self))
    }
}

/// Where an output field's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolve {
    /// Read a (possibly dotted) property of the parent value
    Property { path: String, shape: ValueShape },
    /// Encode the parent's primary keys as a global id
    GlobalId { model: String, keys: Vec<String> },
    /// Page through `source` resources whose `link` points back at the parent
    Backlink { source: String, link: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgDef {
    pub name: String,
    pub ty: FieldType,
    pub description: Option<String>,
}

impl ArgDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub description: Option<String>,
    pub resolve: Resolve,
    pub args: Vec<ArgDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputFieldDef {
    pub name: String,
    pub ty: FieldType,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Object {
        fields: Vec<FieldDef>,
        /// Implements the `Node` interface
        is_node: bool,
    },
    Input {
        fields: Vec<InputFieldDef>,
    },
    Enum {
        values: Vec<String>,
    },
}

/// A fully derived type, ready to be registered
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    pub name: String,
    pub description: Option<String>,
    pub kind: NodeKind,
}

impl TypeNode {
    pub fn object(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind: NodeKind::Object {
                fields,
                is_node: false,
            },
        }
    }

    pub fn input(name: impl Into<String>, fields: Vec<InputFieldDef>) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind: NodeKind::Input { fields },
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        match &self.kind {
            NodeKind::Object { fields, .. } => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }

    pub fn input_field(&self, name: &str) -> Option<&InputFieldDef> {
        match &self.kind {
            NodeKind::Input { fields } => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }

    /// Every model-derived type this node refers to
    pub fn references(&self) -> Vec<TypeKey> {
        let mut keys = Vec::new();
        let mut push = |ty: &FieldType| {
            if let NamedType::Node(key) = ty.named() {
                keys.push(key.clone());
            }
        };
        match &self.kind {
            NodeKind::Object { fields, .. } => {
                for field in fields {
                    push(&field.ty);
                    for arg in &field.args {
                        push(&arg.ty);
                    }
                }
            }
            NodeKind::Input { fields } => fields.iter().for_each(|f| push(&f.ty)),
            NodeKind::Enum { .. } => {}
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        let name = |variant| TypeKey::new("ex.Person", variant).type_name().unwrap();
        assert_eq!(name(Variant::Output), "ex_Person");
        assert_eq!(name(Variant::Inlined), "ex_Person_i");
        assert_eq!(name(Variant::Input(InputKind::Compare)), "compare_ex_Person");
        assert_eq!(
            name(Variant::InlinedInput(InputKind::ScalarCompare)),
            "scalar_compare_ex_Person_i"
        );
        assert_eq!(name(Variant::Input(InputKind::Null)), "NULL_ex_Person");
        assert_eq!(name(Variant::Input(InputKind::SubclassOf)), "SUBCLASS_OF_ex_Person");
        assert_eq!(name(Variant::Connection), "ex_PersonConnection");
        assert_eq!(name(Variant::Filter), "filter_ex_Person");
        assert_eq!(name(Variant::OrderBy), "orderby_ex_Person");
        assert_eq!(name(Variant::PropertyNames), "properties_ex_Person");
    }

    #[test]
    fn test_field_type_wrapping() {
        let ty = FieldType::scalar(Scalar::String).non_null().non_null();
        assert_eq!(
            ty,
            FieldType::NonNull(Box::new(FieldType::scalar(Scalar::String)))
        );
        let list = FieldType::node(TypeKey::new("a.B", Variant::Output)).list();
        assert_eq!(
            list.named(),
            &NamedType::Node(TypeKey::new("a.B", Variant::Output))
        );
    }

    #[test]
    fn test_references_collects_args() {
        let node = TypeNode::object(
            "X",
            vec![FieldDef {
                name: "pets".into(),
                ty: FieldType::node(TypeKey::new("ex.Pet", Variant::Connection)),
                description: None,
                resolve: Resolve::Backlink {
                    source: "ex.Pet".into(),
                    link: "owner".into(),
                },
                args: vec![ArgDef::new(
                    "filter",
                    FieldType::node(TypeKey::new("ex.Pet", Variant::Filter)),
                )],
            }],
        );
        assert_eq!(
            node.references(),
            vec![
                TypeKey::new("ex.Pet", Variant::Connection),
                TypeKey::new("ex.Pet", Variant::Filter)
            ]
        );
    }
}
