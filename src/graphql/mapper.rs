//! Property to field type mapping

use super::references;
use super::types::{FieldType, InputKind, Scalar, TypeKey, ValueShape, Variant};
use crate::models::{Model, Property, PropertyType, Registry, embedded_model_id};

/// Whether a type is wanted for reading resources or for filtering them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Output,
    Input(InputKind),
}

impl Context {
    pub fn is_input(&self) -> bool {
        matches!(self, Context::Input(_))
    }
}

/// A backlink connection to page through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backlink {
    /// Model holding the forward link
    pub source: String,
    /// Forward-link property on `source`
    pub link: String,
}

/// Result of mapping a property. Nullability is left to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapped {
    pub ty: FieldType,
    pub shape: ValueShape,
    pub backlink: Option<Backlink>,
}

impl Mapped {
    pub fn new(ty: FieldType, shape: ValueShape) -> Self {
        Self {
            ty,
            shape,
            backlink: None,
        }
    }

    pub fn scalar(scalar: Scalar) -> Self {
        let shape = match scalar {
            Scalar::Timestamp => ValueShape::Timestamp,
            _ => ValueShape::Value,
        };
        Self::new(FieldType::scalar(scalar), shape)
    }

    pub fn json() -> Self {
        Self::scalar(Scalar::Json)
    }

    /// Wrap as a list when `is_list`
    pub fn list_if(self, is_list: bool) -> Self {
        if !is_list {
            return self;
        }
        Self {
            ty: self.ty.list(),
            shape: self.shape.list(),
            backlink: self.backlink,
        }
    }
}

/// Scalar type for a primitive property type; `None` for structural types
pub fn scalar_for(kind: PropertyType) -> Option<Scalar> {
    match kind {
        PropertyType::String | PropertyType::Enum => Some(Scalar::String),
        PropertyType::Boolean => Some(Scalar::Boolean),
        PropertyType::Number => Some(Scalar::Float),
        PropertyType::Bytes => Some(Scalar::Bytes),
        PropertyType::Date => Some(Scalar::Timestamp),
        PropertyType::Object | PropertyType::Array => None,
    }
}

/// Map the property `name` of `model` to a field type
pub fn map_property(
    registry: &Registry,
    model: &Model,
    name: &str,
    property: &Property,
    context: Context,
) -> Mapped {
    if property.is_json() {
        return Mapped::json();
    }
    if let Some(target) = property.reference() {
        return references::resolve(registry, property, target, context);
    }
    if let Some(scalar) = scalar_for(property.kind) {
        return Mapped::scalar(scalar);
    }
    if property.embedded_shape().is_some() {
        return map_embedded(registry, model, name, property, context);
    }

    // Arrays of primitives map element-wise; anything left is opaque
    match property.items.as_ref().and_then(|items| items.kind) {
        Some(kind) if property.is_array() => match scalar_for(kind) {
            Some(scalar) => Mapped::scalar(scalar).list_if(true),
            None => Mapped::json().list_if(true),
        },
        _ => Mapped::json(),
    }
}

/// Anonymous shapes resolve to the synthetic `<model>_<property>` model
fn map_embedded(
    registry: &Registry,
    model: &Model,
    name: &str,
    property: &Property,
    context: Context,
) -> Mapped {
    let id = embedded_model_id(&model.id, name);
    match registry.get(&id) {
        Some(embedded) if !context.is_input() && !embedded.properties.is_empty() => Mapped::new(
            FieldType::node(TypeKey::new(id, Variant::Output)),
            ValueShape::Object,
        )
        .list_if(property.is_array()),
        _ => Mapped::json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::types::{NamedType, SharedType};
    use crate::models::parse_models;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                parse_models(
                    r#"[{"id":"ex.Person","properties":{
                        "name":{"type":"string"},
                        "age":{"type":"number"},
                        "alive":{"type":"boolean"},
                        "photo":{"type":"bytes"},
                        "born":{"type":"date"},
                        "mood":{"type":"enum"},
                        "extra":{"type":"object","range":"json"},
                        "tags":{"type":"array","items":{"type":"string"}},
                        "blob":{"type":"object"},
                        "size":{"type":"object","properties":{"height":{"type":"number"}}},
                        "empty":{"type":"object","properties":{}},
                        "friend":{"type":"object","ref":"ex.Person"}
                    }}]"#,
                )
                .unwrap(),
            )
            .unwrap();
        registry
    }

    fn map(name: &str, context: Context) -> Mapped {
        let registry = registry();
        let model = registry.get("ex.Person").unwrap();
        map_property(&registry, model, name, &model.properties[name], context)
    }

    #[test]
    fn test_scalars() {
        let cases = [
            ("name", Scalar::String),
            ("age", Scalar::Float),
            ("alive", Scalar::Boolean),
            ("photo", Scalar::Bytes),
            ("born", Scalar::Timestamp),
            ("mood", Scalar::String),
            ("extra", Scalar::Json),
            ("blob", Scalar::Json),
        ];
        for (name, scalar) in cases {
            assert_eq!(map(name, Context::Output).ty, FieldType::scalar(scalar), "{name}");
        }
        assert_eq!(map("born", Context::Output).shape, ValueShape::Timestamp);
    }

    #[test]
    fn test_primitive_array() {
        let mapped = map("tags", Context::Output);
        assert_eq!(mapped.ty, FieldType::scalar(Scalar::String).list());
        assert_eq!(mapped.shape, ValueShape::Value.list());
    }

    #[test]
    fn test_embedded_shape() {
        assert_eq!(
            map("size", Context::Output).ty,
            FieldType::node(TypeKey::new("ex.Person_size", Variant::Output))
        );
        assert_eq!(
            map("size", Context::Input(InputKind::Compare)).ty,
            FieldType::scalar(Scalar::Json)
        );
        assert_eq!(map("empty", Context::Output).ty, FieldType::scalar(Scalar::Json));
    }

    #[test]
    fn test_reference_delegates() {
        assert_eq!(
            map("friend", Context::Output).ty.named(),
            &NamedType::Shared(SharedType::Stub)
        );
    }
}
