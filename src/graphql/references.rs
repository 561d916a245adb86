//! Representation of reference properties
//!
//! A property pointing at another model becomes one of: an opaque JSON value,
//! an enum value stub, the target embedded by value, a reference stub, a list
//! of stubs, or a paginated backlink connection. The checks below run in a
//! fixed order and the first match wins.

use super::mapper::{Backlink, Context, Mapped};
use super::types::{FieldType, SharedType, TypeKey, ValueShape, Variant};
use crate::models::{Property, Registry};

pub fn resolve(registry: &Registry, property: &Property, target_id: &str, context: Context) -> Mapped {
    let is_list = property.is_array();

    let Some(target) = registry.get(target_id) else {
        return Mapped::json();
    };

    if target.is_enum() {
        let shared = match context {
            Context::Output => SharedType::EnumValue,
            Context::Input(_) => SharedType::EnumValueInput,
        };
        return Mapped::new(FieldType::shared(shared), ValueShape::Object).list_if(is_list);
    }

    if registry.is_inlined_reference(property) {
        if !target.is_instantiable() {
            return Mapped::json();
        }
        let variant = match context {
            Context::Output => Variant::Inlined,
            Context::Input(kind) => Variant::InlinedInput(kind),
        };
        return Mapped::new(
            FieldType::node(TypeKey::new(target_id, variant)),
            ValueShape::Object,
        )
        .list_if(is_list);
    }

    if context.is_input() {
        // Identity only; on arrays this matches any element
        return Mapped::new(FieldType::shared(SharedType::StubInput), ValueShape::Object);
    }

    let backlink = property.backlink();
    if !target.is_instantiable() && backlink.is_none() {
        return stubs(is_list);
    }

    if let Some(link) = backlink {
        return Mapped {
            ty: FieldType::node(TypeKey::new(target_id, Variant::Connection)),
            shape: ValueShape::Object,
            backlink: Some(Backlink {
                source: target_id.to_string(),
                link: link.to_string(),
            }),
        };
    }

    stubs(is_list)
}

fn stubs(is_list: bool) -> Mapped {
    Mapped::new(FieldType::shared(SharedType::Stub), ValueShape::Object).list_if(is_list)
}
