//! Base protocol shared by every stored model

use std::collections::BTreeMap;

use super::{Property, PropertyType};

/// Type discriminator carried by every resource
pub const TYPE_PROPERTY: &str = "_t";
pub const LINK_PROPERTY: &str = "_link";
pub const PERMALINK_PROPERTY: &str = "_permalink";
pub const TIME_PROPERTY: &str = "_time";
pub const AUTHOR_PROPERTY: &str = "_author";
pub const DISPLAY_NAME_PROPERTY: &str = "_displayName";
pub const AUTHOR_TITLE_PROPERTY: &str = "_authorTitle";

/// Reserved for the global id field of `Node` types
pub const RESERVED_PROPERTY: &str = "id";

/// Models subclassing this id are enums
pub const ENUM_MODEL_ID: &str = "tradle.Enum";

/// Separator used in field names for dotted nested properties (`a__b` for `a.b`)
pub const NESTED_SEPARATOR: &str = "__";

pub const REQUIRED: &[&str] = &[TYPE_PROPERTY, LINK_PROPERTY, PERMALINK_PROPERTY];
pub const REQUIRED_INLINED: &[&str] = &[TYPE_PROPERTY];

/// Identity fields of a reference stub
pub const STUB_PROPERTIES: &[&str] = &[
    TYPE_PROPERTY,
    LINK_PROPERTY,
    PERMALINK_PROPERTY,
    DISPLAY_NAME_PROPERTY,
];

/// Identity fields of an enum value stub
pub const ENUM_VALUE_PROPERTIES: &[&str] = &["id", "title"];

fn type_discriminator() -> Property {
    Property::new(PropertyType::String).with_range("model")
}

/// Properties merged into every non-inlined model
pub fn object_properties() -> BTreeMap<String, Property> {
    BTreeMap::from([
        (TYPE_PROPERTY.to_string(), type_discriminator()),
        (LINK_PROPERTY.to_string(), Property::new(PropertyType::String)),
        (
            PERMALINK_PROPERTY.to_string(),
            Property::new(PropertyType::String),
        ),
        (TIME_PROPERTY.to_string(), Property::new(PropertyType::Date)),
        (AUTHOR_PROPERTY.to_string(), Property::new(PropertyType::String)),
        (
            DISPLAY_NAME_PROPERTY.to_string(),
            Property::new(PropertyType::String),
        ),
    ])
}

/// Properties merged into inlined models
pub fn inlined_properties() -> BTreeMap<String, Property> {
    BTreeMap::from([(TYPE_PROPERTY.to_string(), type_discriminator())])
}

/// Display-only properties added after the protocol merge
pub fn custom_properties() -> BTreeMap<String, Property> {
    BTreeMap::from([(
        AUTHOR_TITLE_PROPERTY.to_string(),
        Property::new(PropertyType::String),
    )])
}

/// Shape of a reference stub, keyed by stub property
pub fn stub_properties() -> BTreeMap<String, Property> {
    STUB_PROPERTIES
        .iter()
        .map(|name| {
            let prop = if *name == TYPE_PROPERTY {
                type_discriminator()
            } else {
                Property::new(PropertyType::String)
            };
            (name.to_string(), prop)
        })
        .collect()
}

pub fn enum_value_properties() -> BTreeMap<String, Property> {
    ENUM_VALUE_PROPERTIES
        .iter()
        .map(|name| (name.to_string(), Property::new(PropertyType::String)))
        .collect()
}
