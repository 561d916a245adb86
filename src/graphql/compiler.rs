//! Type derivation
//!
//! [`TypeCompiler::get_type`] builds the type for a (model, variant) pair on
//! first request and memoizes it. Building never recurses into referenced
//! models: fields carry [`TypeKey`]s which schema assembly resolves later.

use std::sync::Arc;

use super::cache::TypeCache;
use super::filters::{self, Operator};
use super::mapper::{self, Context};
use super::types::{
    ArgDef, FieldDef, FieldType, InputFieldDef, InputKind, NodeKind, Resolve, Scalar, SharedType, TypeKey, TypeNode,
    ValueShape, Variant,
};
use crate::error::{Error, Result};
use crate::models::{Model, Registry};

/// Names of the pagination arguments shared by connection fields
pub const CONNECTION_ARGS: [(&str, Scalar); 6] = [
    ("first", Scalar::Int),
    ("last", Scalar::Int),
    ("limit", Scalar::Int),
    ("after", Scalar::String),
    ("before", Scalar::String),
    ("checkpoint", Scalar::String),
];

enum Built {
    Node(TypeNode),
    Shared(SharedType),
}

pub struct TypeCompiler<'a> {
    registry: &'a Registry,
    cache: &'a TypeCache,
}

impl<'a> TypeCompiler<'a> {
    pub fn new(registry: &'a Registry, cache: &'a TypeCache) -> Self {
        Self { registry, cache }
    }

    pub fn get_type(&self, model_id: &str, variant: Variant) -> Result<Arc<TypeNode>> {
        self.get(&TypeKey::new(model_id, variant))
    }

    /// Memoized lookup; builds and caches on a miss
    pub fn get(&self, key: &TypeKey) -> Result<Arc<TypeNode>> {
        if let Some(node) = self.cache.get(key) {
            return Ok(node);
        }
        let model = self
            .registry
            .get(&key.model)
            .ok_or_else(|| Error::UnknownModel(key.model.clone()))?;

        tracing::trace!(model = %key.model, variant = %key.variant, "Building type");
        match self.build(model, key)? {
            Built::Node(node) => Ok(self.cache.insert(key.clone(), node)),
            Built::Shared(shared) => Ok(self.cache.alias(key.clone(), self.cache.shared(shared))),
        }
    }

    fn build(&self, model: &Model, key: &TypeKey) -> Result<Built> {
        let built = match key.variant {
            Variant::Output | Variant::Inlined if model.is_enum() => Built::Shared(SharedType::EnumValue),
            Variant::Output | Variant::Inlined if !model.is_instantiable() => Built::Shared(SharedType::Stub),
            Variant::Output => Built::Node(self.object_type(model, key, false)?),
            Variant::Inlined => Built::Node(self.object_type(model, key, true)?),

            Variant::Input(_) | Variant::InlinedInput(_) if model.is_enum() => {
                Built::Shared(SharedType::EnumValueInput)
            }
            Variant::Input(_) | Variant::InlinedInput(_) if !model.is_instantiable() => {
                Built::Shared(SharedType::StubInput)
            }
            Variant::Input(kind) => Built::Node(self.input_type(model, key, kind, false)?),
            Variant::InlinedInput(kind) => Built::Node(self.input_type(model, key, kind, true)?),

            Variant::Connection => Built::Node(self.connection_type(model, key)?),
            Variant::Edge => Built::Node(self.edge_type(model, key)?),
            Variant::Filter => Built::Node(self.filter_type(model, key)?),
            Variant::OrderBy => Built::Node(self.order_by_type(model, key)?),
            Variant::PropertyNames => Built::Node(self.property_names_type(model, key)?),
        };
        Ok(built)
    }

    fn object_type(&self, model: &Model, key: &TypeKey, inlined: bool) -> Result<TypeNode> {
        let required = model.required_for(inlined);
        let is_node = !inlined && model.is_node();
        let mut fields = Vec::with_capacity(model.properties.len() + 1);

        if is_node {
            fields.push(FieldDef {
                name: "id".into(),
                ty: FieldType::scalar(Scalar::Id).non_null(),
                description: Some("Global id".into()),
                resolve: Resolve::GlobalId {
                    model: model.id.clone(),
                    keys: model.primary_keys().names().into_iter().map(String::from).collect(),
                },
                args: Vec::new(),
            });
        }

        for (name, property) in &model.properties {
            if property.group.is_some() {
                continue;
            }
            let mapped = mapper::map_property(self.registry, model, name, property, Context::Output);
            let field = match mapped.backlink {
                Some(backlink) => FieldDef {
                    name: name.clone(),
                    ty: mapped.ty,
                    description: property.description.clone(),
                    args: self.connection_args(&backlink.source)?,
                    resolve: Resolve::Backlink {
                        source: backlink.source,
                        link: backlink.link,
                    },
                },
                None => FieldDef {
                    name: name.clone(),
                    ty: if required.contains(name) {
                        mapped.ty.non_null()
                    } else {
                        mapped.ty
                    },
                    description: property.description.clone(),
                    resolve: Resolve::Property {
                        path: name.clone(),
                        shape: mapped.shape,
                    },
                    args: Vec::new(),
                },
            };
            fields.push(field);
        }

        Ok(TypeNode {
            name: key.type_name()?,
            description: model.description.clone().or_else(|| model.title.clone()),
            kind: NodeKind::Object { fields, is_node },
        })
    }

    fn input_type(&self, model: &Model, key: &TypeKey, kind: InputKind, inlined: bool) -> Result<TypeNode> {
        let fields = filters::input_fields(self.registry, model, kind, inlined);
        if fields.is_empty() {
            return Err(Error::UnsupportedVariant {
                model: model.id.clone(),
                variant: key.variant.to_string(),
            });
        }
        Ok(TypeNode::input(key.type_name()?, fields).with_description(model.title.clone()))
    }

    fn connection_type(&self, model: &Model, key: &TypeKey) -> Result<TypeNode> {
        let edge = FieldType::node(TypeKey::new(&model.id, Variant::Edge));
        Ok(TypeNode::object(
            key.type_name()?,
            vec![
                property_field("edges", edge.non_null().list().non_null(), ValueShape::Object.list()),
                property_field(
                    "pageInfo",
                    FieldType::shared(SharedType::PageInfo).non_null(),
                    ValueShape::Object,
                ),
            ],
        ))
    }

    fn edge_type(&self, model: &Model, key: &TypeKey) -> Result<TypeNode> {
        Ok(TypeNode::object(
            key.type_name()?,
            vec![
                property_field("cursor", FieldType::scalar(Scalar::String), ValueShape::Value),
                property_field(
                    "node",
                    FieldType::node(TypeKey::new(&model.id, Variant::Output)).non_null(),
                    ValueShape::Object,
                ),
            ],
        ))
    }

    fn filter_type(&self, model: &Model, key: &TypeKey) -> Result<TypeNode> {
        let fields: Vec<InputFieldDef> = Operator::ALL
            .into_iter()
            .filter(|op| filters::has_input_fields(self.registry, model, op.input_kind(), false))
            .map(|op| InputFieldDef {
                name: op.name().to_string(),
                ty: FieldType::node(TypeKey::new(&model.id, Variant::Input(op.input_kind()))),
                description: Some(op.description().to_string()),
            })
            .collect();
        if fields.is_empty() {
            return Err(Error::UnsupportedVariant {
                model: model.id.clone(),
                variant: key.variant.to_string(),
            });
        }
        Ok(TypeNode::input(key.type_name()?, fields))
    }

    fn order_by_type(&self, model: &Model, key: &TypeKey) -> Result<TypeNode> {
        Ok(TypeNode::input(
            key.type_name()?,
            vec![
                InputFieldDef {
                    name: "property".into(),
                    ty: FieldType::node(TypeKey::new(&model.id, Variant::PropertyNames)),
                    description: None,
                },
                InputFieldDef {
                    name: "desc".into(),
                    ty: FieldType::scalar(Scalar::Boolean),
                    description: Some("Sort descending".into()),
                },
            ],
        ))
    }

    fn property_names_type(&self, model: &Model, key: &TypeKey) -> Result<TypeNode> {
        let values = filters::sortable_fields(model);
        if values.is_empty() {
            return Err(Error::UnsupportedVariant {
                model: model.id.clone(),
                variant: key.variant.to_string(),
            });
        }
        Ok(TypeNode {
            name: key.type_name()?,
            description: None,
            kind: NodeKind::Enum { values },
        })
    }

    /// Arguments of a connection over `model`: filter, orderBy and pagination
    pub fn connection_args(&self, model_id: &str) -> Result<Vec<ArgDef>> {
        let model = self
            .registry
            .get(model_id)
            .ok_or_else(|| Error::UnknownModel(model_id.to_string()))?;

        let mut args = Vec::new();
        if Operator::ALL
            .iter()
            .any(|op| filters::has_input_fields(self.registry, model, op.input_kind(), false))
        {
            args.push(ArgDef::new("filter", FieldType::node(TypeKey::new(model_id, Variant::Filter))));
        }
        if !filters::sortable_fields(model).is_empty() {
            args.push(ArgDef::new("orderBy", FieldType::node(TypeKey::new(model_id, Variant::OrderBy))));
        }
        args.extend(
            CONNECTION_ARGS
                .into_iter()
                .map(|(name, scalar)| ArgDef::new(name, FieldType::scalar(scalar))),
        );
        Ok(args)
    }
}

fn property_field(name: &str, ty: FieldType, shape: ValueShape) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        ty,
        description: None,
        resolve: Resolve::Property {
            path: name.to_string(),
            shape,
        },
        args: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::types::NamedType;
    use crate::models::parse_models;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                parse_models(
                    r#"[
                        {"id":"ex.Person","properties":{
                            "name":{"type":"string"},
                            "age":{"type":"number"},
                            "pets":{"type":"array","items":{"ref":"ex.Pet","backlink":"owner"}},
                            "names":{"type":"object","group":["name"]}
                        },"required":["names"]},
                        {"id":"ex.Pet","properties":{"owner":{"type":"object","ref":"ex.Person"}}},
                        {"id":"ex.Color","subClassOf":"tradle.Enum","enum":[]},
                        {"id":"ex.Shape","isInterface":true,"properties":{}},
                        {"id":"ex.Address","inlined":true,"properties":{"city":{"type":"string"}}}
                    ]"#,
                )
                .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_get_type_is_memoized() {
        let registry = registry();
        let cache = TypeCache::new();
        let compiler = TypeCompiler::new(&registry, &cache);
        let a = compiler.get_type("ex.Person", Variant::Output).unwrap();
        let b = compiler.get_type("ex.Person", Variant::Output).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let f1 = compiler.get_type("ex.Person", Variant::Filter).unwrap();
        let f2 = compiler.get_type("ex.Person", Variant::Filter).unwrap();
        assert!(Arc::ptr_eq(&f1, &f2));
    }

    #[test]
    fn test_person_output_fields() {
        let registry = registry();
        let cache = TypeCache::new();
        let person = TypeCompiler::new(&registry, &cache)
            .get_type("ex.Person", Variant::Output)
            .unwrap();

        assert_eq!(person.name, "ex_Person");
        assert_eq!(
            person.field("name").unwrap().ty,
            FieldType::scalar(Scalar::String).non_null()
        );
        assert_eq!(person.field("age").unwrap().ty, FieldType::scalar(Scalar::Float));
        assert_eq!(
            person.field("id").unwrap().ty,
            FieldType::scalar(Scalar::Id).non_null()
        );
        assert!(person.field("_permalink").unwrap().ty.is_non_null());
        assert!(person.field("names").is_none());
        assert_matches!(person.kind, NodeKind::Object { is_node: true, .. });

        let pets = person.field("pets").unwrap();
        assert_eq!(
            pets.resolve,
            Resolve::Backlink {
                source: "ex.Pet".into(),
                link: "owner".into()
            }
        );
        assert!(pets.args.iter().any(|a| a.name == "filter"));
        assert!(pets.args.iter().any(|a| a.name == "first"));
    }

    #[test]
    fn test_shared_canonical_types() {
        let registry = registry();
        let cache = TypeCache::new();
        let compiler = TypeCompiler::new(&registry, &cache);
        let color = compiler.get_type("ex.Color", Variant::Output).unwrap();
        assert!(Arc::ptr_eq(&color, &cache.shared(SharedType::EnumValue)));
        let shape = compiler.get_type("ex.Shape", Variant::Output).unwrap();
        assert!(Arc::ptr_eq(&shape, &cache.shared(SharedType::Stub)));
    }

    #[test]
    fn test_inlined_output_has_no_id() {
        let registry = registry();
        let cache = TypeCache::new();
        let address = TypeCompiler::new(&registry, &cache)
            .get_type("ex.Address", Variant::Inlined)
            .unwrap();
        assert_eq!(address.name, "ex_Address_i");
        assert!(address.field("id").is_none());
        assert!(address.field("_t").unwrap().ty.is_non_null());
        assert!(address.field("_link").is_none());
    }

    #[test]
    fn test_filter_type_operators() {
        let registry = registry();
        let cache = TypeCache::new();
        let compiler = TypeCompiler::new(&registry, &cache);
        let filter = compiler.get_type("ex.Person", Variant::Filter).unwrap();
        assert_eq!(filter.name, "filter_ex_Person");
        for op in ["EQ", "NEQ", "NULL", "IN", "STARTS_WITH", "GTE"] {
            assert!(filter.input_field(op).is_some(), "{op}");
        }
        assert!(filter.input_field("SUBCLASS_OF").is_none());

        let null = compiler.get_type("ex.Person", Variant::Input(InputKind::Null)).unwrap();
        assert!(null.input_field("age").is_some());
        assert!(null.input_field("name").is_none());

        let strings = compiler
            .get_type("ex.Person", Variant::Input(InputKind::StringCompare))
            .unwrap();
        assert!(strings.input_field("name").is_some());
        assert!(strings.input_field("age").is_none());
    }

    #[test]
    fn test_empty_input_is_unsupported() {
        let registry = registry();
        let cache = TypeCache::new();
        assert_matches!(
            TypeCompiler::new(&registry, &cache).get_type("ex.Person", Variant::Input(InputKind::SubclassOf)),
            Err(Error::UnsupportedVariant { .. })
        );
    }

    #[test]
    fn test_connection_and_edge() {
        let registry = registry();
        let cache = TypeCache::new();
        let compiler = TypeCompiler::new(&registry, &cache);
        let connection = compiler.get_type("ex.Pet", Variant::Connection).unwrap();
        assert_eq!(connection.name, "ex_PetConnection");
        assert_eq!(
            connection.field("edges").unwrap().ty.named(),
            &NamedType::Node(TypeKey::new("ex.Pet", Variant::Edge))
        );
        let edge = compiler.get_type("ex.Pet", Variant::Edge).unwrap();
        assert_eq!(edge.name, "ex_PetEdge");
        assert!(edge.field("cursor").is_some());
    }

    #[test]
    fn test_order_by_enum() {
        let registry = registry();
        let cache = TypeCache::new();
        let compiler = TypeCompiler::new(&registry, &cache);
        let names = compiler.get_type("ex.Person", Variant::PropertyNames).unwrap();
        let NodeKind::Enum { values } = &names.kind else {
            panic!("expected enum");
        };
        assert!(values.contains(&"age".to_string()));
        assert!(!values.contains(&"pets".to_string()));
    }

    #[test]
    fn test_unknown_model() {
        let registry = registry();
        let cache = TypeCache::new();
        assert_matches!(
            TypeCompiler::new(&registry, &cache).get_type("ex.Nope", Variant::Output),
            Err(Error::UnknownModel(_))
        );
    }
}
