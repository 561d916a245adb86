//! Model definitions
//!
//! A model is a declarative description of a business object type: its
//! properties, required set, and inheritance/enum/interface flags. Raw models
//! are parsed from JSON, then closed over by the [normalizer](normalize) and
//! held in a [`Registry`].

pub mod base;
mod normalize;
mod registry;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use base::{ENUM_MODEL_ID, NESTED_SEPARATOR, TYPE_PROPERTY};
pub use normalize::normalize;
pub(crate) use normalize::embedded_model_id;
pub use registry::{Registration, Registry};

/// Property type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Bytes,
    Date,
    Object,
    Array,
    Enum,
}

/// Element descriptor of an array property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Items {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PropertyType>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Name of the forward-link property on the referenced model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inlined: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Property>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,
    /// Member properties, when this property names a group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inlined: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Embedded shape of an anonymous object literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Property>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Property {
    pub fn new(kind: PropertyType) -> Self {
        Self {
            kind,
            range: None,
            reference: None,
            items: None,
            group: None,
            inlined: false,
            title: None,
            description: None,
            properties: None,
            required: Vec::new(),
        }
    }

    pub fn with_range(mut self, range: &str) -> Self {
        self.range = Some(range.to_string());
        self
    }

    pub fn is_json(&self) -> bool {
        self.range.as_deref() == Some("json")
    }

    pub fn is_model_range(&self) -> bool {
        self.range.as_deref() == Some("model")
    }

    pub fn is_array(&self) -> bool {
        self.kind == PropertyType::Array
    }

    /// Objects, arrays, enums and JSON blobs; everything else is a scalar
    pub fn is_complex(&self) -> bool {
        matches!(
            self.kind,
            PropertyType::Object | PropertyType::Array | PropertyType::Enum
        ) || self.is_json()
    }

    pub fn is_scalar(&self) -> bool {
        !self.is_complex()
    }

    pub fn is_string(&self) -> bool {
        self.kind == PropertyType::String && !self.is_json()
    }

    /// Target model id, either direct or through `items`
    pub fn reference(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .or_else(|| self.items.as_ref().and_then(|i| i.reference.as_deref()))
    }

    pub fn backlink(&self) -> Option<&str> {
        if !self.is_array() {
            return None;
        }
        self.items.as_ref().and_then(|i| i.backlink.as_deref())
    }

    pub fn is_backlink(&self) -> bool {
        self.backlink().is_some()
    }

    /// Inline shape of an anonymous object or array element
    pub fn embedded_shape(&self) -> Option<&BTreeMap<String, Property>> {
        match self.kind {
            PropertyType::Object => self.properties.as_ref(),
            PropertyType::Array => self.items.as_ref().and_then(|i| i.properties.as_ref()),
            _ => None,
        }
    }

    fn embedded_required(&self) -> &[String] {
        match (self.kind, &self.items) {
            (PropertyType::Array, Some(items)) => &items.required,
            _ => &self.required,
        }
    }

    fn declares_inlined(&self) -> bool {
        self.inlined || self.items.as_ref().is_some_and(|i| i.inlined)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKeys {
    pub hash_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_key: Option<String>,
}

impl Default for PrimaryKeys {
    fn default() -> Self {
        Self {
            hash_key: base::PERMALINK_PROPERTY.to_string(),
            range_key: None,
        }
    }
}

impl PrimaryKeys {
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![self.hash_key.as_str()];
        if let Some(range) = &self.range_key {
            names.push(range.as_str());
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_class_of: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Open set of known enum values; business data, not a closed enumeration
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inlined: bool,
    #[serde(rename = "abstract", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_interface: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_keys: Option<PrimaryKeys>,

    /// Dotted `parent.child` shapes, used by filter and sort inputs only
    #[serde(skip)]
    pub nested: BTreeMap<String, Property>,
    /// Synthetic model lifted from an anonymous embedded shape
    #[serde(skip)]
    pub embedded: bool,
}

impl Model {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            sub_class_of: None,
            properties: BTreeMap::new(),
            required: Vec::new(),
            enum_values: None,
            inlined: false,
            is_abstract: false,
            is_interface: false,
            interfaces: Vec::new(),
            primary_keys: None,
            nested: BTreeMap::new(),
            embedded: false,
        }
    }

    pub fn is_enum(&self) -> bool {
        self.enum_values.is_some() || self.sub_class_of.as_deref() == Some(ENUM_MODEL_ID)
    }

    /// Concrete: neither abstract, interface-only nor an enum
    pub fn is_instantiable(&self) -> bool {
        !self.is_abstract && !self.is_interface && !self.is_enum()
    }

    /// Instantiable models that live in the store on their own and get root fields
    pub fn is_fetchable(&self) -> bool {
        self.is_instantiable() && !self.inlined && !self.embedded
    }

    /// Models that implement the `Node` interface and carry a global id
    pub fn is_node(&self) -> bool {
        !self.inlined && !self.embedded
    }

    pub fn primary_keys(&self) -> PrimaryKeys {
        self.primary_keys.clone().unwrap_or_default()
    }

    /// Effective required set for the model used as itself or inlined elsewhere
    pub fn required_for(&self, inlined: bool) -> Vec<String> {
        let base: &[&str] = if self.embedded {
            &[]
        } else if inlined || self.inlined {
            base::REQUIRED_INLINED
        } else {
            base::REQUIRED
        };
        let mut required = self.required.clone();
        for name in base {
            if !required.iter().any(|r| r == name) {
                required.push(name.to_string());
            }
        }
        required
    }

    /// Property lookup covering both declared and dotted nested properties
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name).or_else(|| self.nested.get(name))
    }

    /// Declared properties followed by dotted nested ones
    pub fn filterable_properties(&self) -> impl Iterator<Item = (&String, &Property)> {
        self.properties.iter().chain(self.nested.iter())
    }

    pub fn backlink_properties(&self) -> Vec<String> {
        self.properties
            .iter()
            .filter(|(_, p)| p.is_backlink())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Parse models from JSON: either an array of models or an id-to-model map
pub fn parse_models(json: &str) -> Result<Vec<Model>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    match value {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(id, mut raw)| {
                if let Some(obj) = raw.as_object_mut() {
                    obj.entry("id").or_insert_with(|| id.clone().into());
                }
                Ok(serde_json::from_value(raw)?)
            })
            .collect(),
        other => Err(Error::InvalidModel(format!(
            "expected an array or object of models, found {}",
            json_kind(&other)
        ))),
    }
}

/// Read and parse a model file
pub fn load_models(path: &Path) -> anyhow::Result<Vec<Model>> {
    use anyhow::Context;

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file {}", path.display()))?;
    let models = parse_models(&json)
        .with_context(|| format!("Failed to parse model file {}", path.display()))?;
    Ok(models)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
