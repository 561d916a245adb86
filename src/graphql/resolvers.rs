//! Field resolvers
//!
//! Every object value flowing through the schema is a `serde_json::Value`
//! wrapped with `FieldValue::owned_any`. Field resolvers downcast their parent
//! back to a `Value` and read from it; root and backlink resolvers go through
//! the [`ResourceStore`] found in the schema data.

use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};
use async_graphql::{ErrorExtensions, Value as GqlValue};
use futures::future::join_all;
use serde_json::{Map, Value, json};

use super::filters;
use super::naming;
use super::pagination::{self, Connection, ConnectionArgs};
use super::scalars;
use super::types::{TypeKey, ValueShape, Variant};
use crate::error::{Error, Result};
use crate::models::base::{LINK_PROPERTY, PERMALINK_PROPERTY, TYPE_PROPERTY};
use crate::models::{Model, Registry};
use crate::store::{Filter, ListRequest, ResourceStore, SharedStore, StoreError, value_at_path};

fn extend(err: impl Into<Error>) -> async_graphql::Error {
    err.into().extend()
}

/// Field arguments as JSON
fn json_args(ctx: &ResolverContext<'_>) -> Map<String, Value> {
    ctx.args
        .as_index_map()
        .iter()
        .filter_map(|(name, value)| {
            value
                .clone()
                .into_json()
                .ok()
                .map(|json| (name.to_string(), json))
        })
        .collect()
}

/// Names of the fields selected directly under the current field
fn selected_fields(ctx: &ResolverContext<'_>) -> Vec<String> {
    ctx.ctx
        .field()
        .selection_set()
        .map(|field| field.name().to_string())
        .collect()
}

/// Names of the fields selected under `edges { node { ... } }`
fn selected_node_fields(ctx: &ResolverContext<'_>) -> Vec<String> {
    let mut names = Vec::new();
    for edges in ctx.ctx.field().selection_set().filter(|f| f.name() == "edges") {
        for node in edges.selection_set().filter(|f| f.name() == "node") {
            names.extend(node.selection_set().map(|f| f.name().to_string()));
        }
    }
    names
}

/// Convert a JSON value into what GraphQL expects for `shape`
pub fn to_field_value<'a>(value: Option<&Value>, shape: &ValueShape) -> async_graphql::Result<Option<FieldValue<'a>>> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    match shape {
        ValueShape::Value => Ok(Some(FieldValue::value(GqlValue::from_json(value.clone())?))),
        ValueShape::Timestamp => Ok(scalars::timestamp_output(value).map(FieldValue::value)),
        ValueShape::Object => Ok(Some(FieldValue::owned_any(value.clone()))),
        ValueShape::List(inner) => {
            let items = match value {
                Value::Array(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                let item = to_field_value(Some(item), inner)?.unwrap_or_else(|| FieldValue::value(GqlValue::Null));
                list.push(item);
            }
            Ok(Some(FieldValue::list(list)))
        }
    }
}

/// Store columns needed to answer a node selection
pub fn list_select(model: &Model, selected: &[String]) -> Vec<String> {
    let backlinks = model.backlink_properties();
    let mut select: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !select.iter().any(|s| s == name) {
            select.push(name.to_string());
        }
    };
    for name in selected {
        match name.as_str() {
            "__typename" => {}
            "id" => model.primary_keys().names().into_iter().for_each(&mut push),
            name if backlinks.iter().any(|b| b == name) => push(PERMALINK_PROPERTY),
            name => push(name),
        }
    }
    select
}

/// How a "get" field obtains its resource
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The arguments already hold every selected field
    Complete(Value),
    /// Resolve the link through the store's link index
    Stub { link: String },
    /// Fetch by primary key
    Key(Map<String, Value>),
}

impl Lookup {
    pub fn decide(model: &Model, args: &Map<String, Value>, selected: &[String]) -> Result<Self> {
        let supplied: Map<String, Value> = args
            .iter()
            .filter(|(name, value)| !value.is_null() && name.starts_with('_'))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let keys = model.primary_keys();
        let key_names = keys.names();
        let has_keys = key_names.iter().all(|k| supplied.contains_key(*k));

        let covered = |field: &String| match field.as_str() {
            "__typename" | TYPE_PROPERTY => true,
            "id" => has_keys,
            other => supplied.contains_key(other),
        };
        if !selected.is_empty() && selected.iter().all(covered) {
            let mut complete = supplied;
            complete.insert(TYPE_PROPERTY.to_string(), Value::from(model.id.as_str()));
            return Ok(Lookup::Complete(Value::Object(complete)));
        }

        if has_keys {
            let mut key: Map<String, Value> = key_names
                .iter()
                .filter_map(|k| supplied.get(*k).map(|v| (k.to_string(), v.clone())))
                .collect();
            key.insert(TYPE_PROPERTY.to_string(), Value::from(model.id.as_str()));
            return Ok(Lookup::Key(key));
        }

        match supplied.get(LINK_PROPERTY).and_then(Value::as_str) {
            Some(link) => Ok(Lookup::Stub { link: link.to_string() }),
            None => Err(Error::Argument(format!(
                "{} needs {LINK_PROPERTY} or {}",
                naming::get_field_name(&model.id),
                key_names.join(", ")
            ))),
        }
    }

    /// Run the lookup. A missing resource is `None`, not an error.
    pub async fn fetch(self, store: &dyn ResourceStore, model: &str) -> Result<Option<Value>> {
        match self {
            Lookup::Complete(value) => Ok(Some(value)),
            Lookup::Key(key) => Ok(store.get(model, &key).await?),
            Lookup::Stub { link } => match store.get_by_link(&link).await {
                Ok(resource) => Ok(Some(resource)),
                Err(StoreError::NotFound(_)) => Ok(None),
                Err(err) => Err(err.into()),
            },
        }
    }
}

/// One page of `model` resources matching `filter`
pub async fn list_connection(
    store: &dyn ResourceStore,
    registry: &Registry,
    model: &Model,
    filter: Filter,
    args: &Map<String, Value>,
    selected: &[String],
) -> Result<Connection> {
    let page = ConnectionArgs::from_args(args)?;
    let user_filter = filters::parse_filter(registry, model, args.get("filter").unwrap_or(&Value::Null))?;

    let mut request = ListRequest::new(&model.id);
    request.subclasses = registry
        .descendants(&model.id)
        .into_iter()
        .filter(|id| *id != model.id)
        .collect();
    request.filter = filters::merge(user_filter, filter);
    request.order_by = filters::parse_order_by(args.get("orderBy"))?;
    request.limit = page.limit();
    request.checkpoint = page.checkpoint()?;
    request.select = list_select(model, selected);

    let descending = request.is_descending();
    let result = store.list(request).await?;
    tracing::debug!(model = %model.id, count = result.items.len(), "Fetched page");
    pagination::build_connection(result, &page, descending)
}

/// Resolve every link independently; failures do not affect other links
pub async fn fetch_links(store: &dyn ResourceStore, links: &[String]) -> Value {
    let results = join_all(links.iter().map(|link| store.get_by_link(link))).await;

    let mut objects = Vec::with_capacity(links.len());
    let mut errors = Vec::with_capacity(links.len());
    for (link, result) in links.iter().zip(results) {
        match result {
            Ok(object) => {
                objects.push(object);
                errors.push(Value::Null);
            }
            Err(err) => {
                tracing::debug!(link = %link, error = %err, "Link lookup failed");
                objects.push(Value::Null);
                errors.push(Value::from(err.to_string()));
            }
        }
    }
    json!({ "objects": objects, "errors": errors })
}

/// Read a property of the parent value
pub fn property(
    path: String,
    shape: ValueShape,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx: ResolverContext| {
        let path = path.clone();
        let shape = shape.clone();
        FieldFuture::new(async move {
            let parent = ctx.parent_value.try_downcast_ref::<Value>()?;
            to_field_value(value_at_path(parent, &path), &shape)
        })
    }
}

pub fn global_id(
    model: String,
    keys: Vec<String>,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx: ResolverContext| {
        let model = model.clone();
        let keys = keys.clone();
        FieldFuture::new(async move {
            let parent = ctx.parent_value.try_downcast_ref::<Value>()?;
            let id = pagination::encode_global_id(&model, &keys, parent).map_err(extend)?;
            Ok(Some(FieldValue::value(id)))
        })
    }
}

fn empty_connection<'a>() -> async_graphql::Result<Option<FieldValue<'a>>> {
    Ok(Some(FieldValue::owned_any(Connection::empty().into_value())))
}

/// Page through `source` resources whose `link` points at the parent
pub fn backlink(
    registry: Arc<Registry>,
    source: String,
    link: String,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx: ResolverContext| {
        let registry = registry.clone();
        let source = source.clone();
        let link = link.clone();
        FieldFuture::new(async move {
            let Some(model) = registry.get(&source).filter(|m| m.properties.contains_key(&link)) else {
                tracing::warn!(source = %source, link = %link, "Dangling backlink, returning an empty connection");
                return empty_connection();
            };
            let parent = ctx.parent_value.try_downcast_ref::<Value>()?;
            let Some(permalink) = parent.get(PERMALINK_PROPERTY).and_then(Value::as_str) else {
                tracing::debug!(source = %source, link = %link, "Backlink parent has no permalink");
                return empty_connection();
            };

            let store = ctx.data::<SharedStore>()?;
            let connection = list_connection(
                store.as_ref(),
                &registry,
                model,
                filters::backlink_filter(&link, permalink),
                &json_args(&ctx),
                &selected_node_fields(&ctx),
            )
            .await
            .map_err(extend)?;
            Ok(Some(FieldValue::owned_any(connection.into_value())))
        })
    }
}

/// `r_<M>`
pub fn get(
    registry: Arc<Registry>,
    model_id: String,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx: ResolverContext| {
        let registry = registry.clone();
        let model_id = model_id.clone();
        FieldFuture::new(async move {
            let model = registry
                .get(&model_id)
                .ok_or_else(|| extend(Error::UnknownModel(model_id.clone())))?;
            let lookup = Lookup::decide(model, &json_args(&ctx), &selected_fields(&ctx)).map_err(extend)?;
            let store = ctx.data::<SharedStore>()?;

            let Some(resource) = lookup.fetch(store.as_ref(), &model.id).await.map_err(extend)? else {
                return Ok(None);
            };
            let matches_model = resource
                .get(TYPE_PROPERTY)
                .and_then(Value::as_str)
                .is_some_and(|t| registry.is_subclass_of(t, &model.id));
            if !matches_model {
                tracing::debug!(model = %model.id, "Resolved resource belongs to another model");
                return Ok(None);
            }
            Ok(Some(FieldValue::owned_any(resource)))
        })
    }
}

/// `rl_<M>`
pub fn list(
    registry: Arc<Registry>,
    model_id: String,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx: ResolverContext| {
        let registry = registry.clone();
        let model_id = model_id.clone();
        FieldFuture::new(async move {
            let model = registry
                .get(&model_id)
                .ok_or_else(|| extend(Error::UnknownModel(model_id.clone())))?;
            let store = ctx.data::<SharedStore>()?;
            let connection = list_connection(
                store.as_ref(),
                &registry,
                model,
                Filter::new(),
                &json_args(&ctx),
                &selected_node_fields(&ctx),
            )
            .await
            .map_err(extend)?;
            Ok(Some(FieldValue::owned_any(connection.into_value())))
        })
    }
}

/// `node(id)`: dispatch on the id's type discriminator
pub fn node(registry: Arc<Registry>) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx: ResolverContext| {
        let registry = registry.clone();
        FieldFuture::new(async move {
            let args = json_args(&ctx);
            let id = args
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| extend(Error::Argument("id must be a string".into())))?;
            let key = pagination::decode_global_id(id).map_err(extend)?;
            let model_id = key.get(TYPE_PROPERTY).and_then(Value::as_str).unwrap_or_default();
            let model = registry
                .get(model_id)
                .filter(|m| m.is_fetchable())
                .ok_or_else(|| extend(Error::UnknownModel(model_id.to_string())))?;
            let type_name = TypeKey::new(&model.id, Variant::Output).type_name().map_err(extend)?;

            let store = ctx.data::<SharedStore>()?;
            match store.get(&model.id, &key).await.map_err(extend)? {
                Some(resource) => Ok(Some(FieldValue::owned_any(resource).with_type(type_name))),
                None => Ok(None),
            }
        })
    }
}

/// `rl_objects(links)`
pub fn objects() -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx: ResolverContext| {
        FieldFuture::new(async move {
            let args = json_args(&ctx);
            let links: Vec<String> = args
                .get("links")
                .and_then(Value::as_array)
                .map(|links| links.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            let store = ctx.data::<SharedStore>()?;
            let result = fetch_links(store.as_ref(), &links).await;
            Ok(Some(FieldValue::owned_any(result)))
        })
    }
}

pub fn models_version_id(
    id: Option<String>,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |_ctx: ResolverContext| {
        let id = id.clone();
        FieldFuture::new(async move { Ok(id.map(FieldValue::value)) })
    }
}
