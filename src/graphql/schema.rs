//! Schema assembly
//!
//! [`SchemaBuilder`] owns the model registry and the type cache. `build`
//! walks every type reachable from the root fields, converts the derived
//! [`TypeNode`]s into `async_graphql::dynamic` types and wires resolvers.

use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, InputObject, InputValue, Interface, InterfaceField, Object, Schema, Type, TypeRef,
};

use super::cache::TypeCache;
use super::compiler::TypeCompiler;
use super::naming;
use super::resolvers;
use super::scalars;
use super::types::{
    ArgDef, FieldDef, FieldType, InputFieldDef, NamedType, NodeKind, Resolve, Scalar, SharedType, TypeKey, TypeNode,
    ValueShape, Variant,
};
use crate::error::{Error, Result};
use crate::models::base::{LINK_PROPERTY, PERMALINK_PROPERTY};
use crate::models::{Model, Registry};
use crate::store::SharedStore;

const QUERY: &str = "Query";
const NODE_INTERFACE: &str = "Node";
const OBJECTS_FIELD: &str = "rl_objects";
const MODELS_VERSION_ID: &str = "modelsVersionId";

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    registry: Registry,
    cache: TypeCache,
    models_version_id: Option<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value echoed by the `modelsVersionId` root field
    pub fn models_version_id(mut self, id: impl Into<String>) -> Self {
        self.models_version_id = Some(id.into());
        self
    }

    /// Register a batch of models. Any change invalidates every cached type;
    /// a batch of already registered, identical models keeps the cache.
    pub fn add_models(mut self, models: Vec<Model>) -> Result<Self> {
        let registration = self.registry.register(models)?;
        if !registration.is_noop() {
            self.cache.clear();
        }
        Ok(self)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn get_type(&self, model_id: &str, variant: Variant) -> Result<Arc<TypeNode>> {
        TypeCompiler::new(&self.registry, &self.cache).get_type(model_id, variant)
    }

    /// Assemble the executable schema, resolving against `store`
    pub fn build(&self, store: SharedStore) -> Result<Schema> {
        let registry = Arc::new(self.registry.clone());
        let mut assembly = Assembly::new(&self.registry, &self.cache, registry.clone());

        let mut query = Object::new(QUERY);
        let fetchable: Vec<&Model> = self.registry.fetchable().collect();
        for model in &fetchable {
            query = query.field(assembly.get_field(model)?);
            query = query.field(assembly.list_field(model)?);
        }
        if !fetchable.is_empty() {
            assembly.types.push(
                Interface::new(NODE_INTERFACE)
                    .field(InterfaceField::new("id", TypeRef::named_nn(TypeRef::ID)))
                    .into(),
            );
            query = query.field(
                Field::new("node", TypeRef::named(NODE_INTERFACE), resolvers::node(registry.clone()))
                    .argument(InputValue::new("id", TypeRef::named_nn(TypeRef::ID))),
            );
        }

        let objects = assembly.objects_type()?;
        query = query
            .field(
                Field::new(OBJECTS_FIELD, TypeRef::named(objects), resolvers::objects())
                    .argument(InputValue::new("links", TypeRef::named_nn_list_nn(TypeRef::STRING))),
            )
            .field(Field::new(
                MODELS_VERSION_ID,
                TypeRef::named(TypeRef::STRING),
                resolvers::models_version_id(self.models_version_id.clone()),
            ));

        let types = assembly.finish()?;
        tracing::debug!(
            models = self.registry.len(),
            root_models = fetchable.len(),
            types = types.len(),
            "Assembled schema"
        );

        let mut builder = Schema::build(QUERY, None, None).register(query);
        for ty in types {
            builder = builder.register(ty);
        }
        for scalar in scalars::scalar_types() {
            builder = builder.register(scalar);
        }
        builder.data(store).finish().map_err(|e| Error::Schema(e.to_string()))
    }
}

/// Worklist conversion of derived types into dynamic ones
struct Assembly<'a> {
    compiler: TypeCompiler<'a>,
    registry: Arc<Registry>,
    registered: HashSet<String>,
    pending: Vec<Arc<TypeNode>>,
    types: Vec<Type>,
}

impl<'a> Assembly<'a> {
    fn new(models: &'a Registry, cache: &'a TypeCache, registry: Arc<Registry>) -> Self {
        let mut assembly = Self {
            compiler: TypeCompiler::new(models, cache),
            registry,
            registered: HashSet::new(),
            pending: Vec::new(),
            types: Vec::new(),
        };
        for shared in SharedType::ALL {
            assembly.enqueue(cache.shared(shared));
        }
        assembly
    }

    fn enqueue(&mut self, node: Arc<TypeNode>) -> String {
        let name = node.name.clone();
        if self.registered.insert(name.clone()) {
            self.pending.push(node);
        }
        name
    }

    /// Name of the type behind `key`, scheduling it for registration
    fn key_name(&mut self, key: &TypeKey) -> Result<String> {
        let node = self.compiler.get(key)?;
        Ok(self.enqueue(node))
    }

    fn named(&mut self, named: &NamedType) -> Result<String> {
        match named {
            NamedType::Scalar(scalar) => Ok(scalar.name().to_string()),
            NamedType::Shared(shared) => Ok(shared.name().to_string()),
            NamedType::Node(key) => self.key_name(key),
        }
    }

    fn type_ref(&mut self, ty: &FieldType) -> Result<TypeRef> {
        Ok(match ty {
            FieldType::Named(named) => TypeRef::named(self.named(named)?),
            FieldType::List(inner) => TypeRef::List(Box::new(self.type_ref(inner)?)),
            FieldType::NonNull(inner) => TypeRef::NonNull(Box::new(self.type_ref(inner)?)),
        })
    }

    fn argument(&mut self, arg: &ArgDef) -> Result<InputValue> {
        let mut value = InputValue::new(&arg.name, self.type_ref(&arg.ty)?);
        if let Some(description) = &arg.description {
            value = value.description(description);
        }
        Ok(value)
    }

    fn input_field(&mut self, def: &InputFieldDef) -> Result<InputValue> {
        let mut value = InputValue::new(&def.name, self.type_ref(&def.ty)?);
        if let Some(description) = &def.description {
            value = value.description(description);
        }
        Ok(value)
    }

    fn field(&mut self, def: &FieldDef) -> Result<Field> {
        let ty = self.type_ref(&def.ty)?;
        let mut field = match &def.resolve {
            Resolve::Property { path, shape } => {
                Field::new(&def.name, ty, resolvers::property(path.clone(), shape.clone()))
            }
            Resolve::GlobalId { model, keys } => {
                Field::new(&def.name, ty, resolvers::global_id(model.clone(), keys.clone()))
            }
            Resolve::Backlink { source, link } => Field::new(
                &def.name,
                ty,
                resolvers::backlink(self.registry.clone(), source.clone(), link.clone()),
            ),
        };
        if let Some(description) = &def.description {
            field = field.description(description);
        }
        for arg in &def.args {
            field = field.argument(self.argument(arg)?);
        }
        Ok(field)
    }

    fn convert(&mut self, node: &TypeNode) -> Result<Type> {
        let ty: Type = match &node.kind {
            NodeKind::Object { fields, is_node } => {
                let mut object = Object::new(&node.name);
                if *is_node {
                    object = object.implement(NODE_INTERFACE);
                }
                for def in fields {
                    object = object.field(self.field(def)?);
                }
                match &node.description {
                    Some(description) => object.description(description).into(),
                    None => object.into(),
                }
            }
            NodeKind::Input { fields } => {
                let mut input = InputObject::new(&node.name);
                for def in fields {
                    input = input.field(self.input_field(def)?);
                }
                match &node.description {
                    Some(description) => input.description(description).into(),
                    None => input.into(),
                }
            }
            NodeKind::Enum { values } => {
                let mut enumeration = Enum::new(&node.name);
                for value in values {
                    enumeration = enumeration.item(EnumItem::new(value));
                }
                enumeration.into()
            }
        };
        Ok(ty)
    }

    /// `r_<M>(_link, _permalink): M`
    fn get_field(&mut self, model: &Model) -> Result<Field> {
        let output = self.key_name(&TypeKey::new(&model.id, Variant::Output))?;
        let name = naming::checked(naming::get_field_name(&model.id))?;
        Ok(Field::new(
            name,
            TypeRef::named(output),
            resolvers::get(self.registry.clone(), model.id.clone()),
        )
        .argument(InputValue::new(LINK_PROPERTY, TypeRef::named(TypeRef::STRING)))
        .argument(InputValue::new(PERMALINK_PROPERTY, TypeRef::named(TypeRef::STRING))))
    }

    /// `rl_<M>(filter, orderBy, ...): MConnection!`
    fn list_field(&mut self, model: &Model) -> Result<Field> {
        let connection = self.key_name(&TypeKey::new(&model.id, Variant::Connection))?;
        let name = naming::checked(naming::list_field_name(&model.id))?;
        let mut field = Field::new(
            name,
            TypeRef::named_nn(connection),
            resolvers::list(self.registry.clone(), model.id.clone()),
        );
        for arg in self.compiler.connection_args(&model.id)? {
            field = field.argument(self.argument(&arg)?);
        }
        Ok(field.argument(InputValue::new(MODELS_VERSION_ID, TypeRef::named(TypeRef::STRING))))
    }

    /// Result type of the batch link lookup
    fn objects_type(&mut self) -> Result<String> {
        let node = TypeNode::object(
            OBJECTS_FIELD,
            vec![
                FieldDef {
                    name: "objects".into(),
                    ty: FieldType::scalar(Scalar::Json),
                    description: Some("Resolved objects, null where a link failed".into()),
                    resolve: Resolve::Property {
                        path: "objects".into(),
                        shape: ValueShape::Value,
                    },
                    args: Vec::new(),
                },
                FieldDef {
                    name: "errors".into(),
                    ty: FieldType::scalar(Scalar::String).list(),
                    description: Some("Per-link error messages, null where a link resolved".into()),
                    resolve: Resolve::Property {
                        path: "errors".into(),
                        shape: ValueShape::Value.list(),
                    },
                    args: Vec::new(),
                },
            ],
        );
        Ok(self.enqueue(Arc::new(node)))
    }

    /// Convert everything scheduled so far, including types discovered while converting
    fn finish(mut self) -> Result<Vec<Type>> {
        while let Some(node) = self.pending.pop() {
            let ty = self.convert(&node)?;
            self.types.push(ty);
        }
        Ok(self.types)
    }
}
