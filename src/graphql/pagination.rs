//! Cursor-based pagination and global ids
//!
//! Cursors and ids are base64-encoded JSON. A cursor wraps whatever position
//! marker the store hands out; a global id wraps the primary-key tuple of a
//! resource together with its `_t` discriminator.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::base::TYPE_PROPERTY;
use crate::store::ListResult;

/// Information about pagination in a connection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    /// Only present when the store can position individual items
    pub cursor: Option<String>,
    pub node: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
}

impl Connection {
    pub fn empty() -> Self {
        Self::default()
    }

    /// JSON form read by the connection, edge and page-info field resolvers
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Pagination arguments of a connection field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionArgs {
    pub first: Option<usize>,
    pub last: Option<usize>,
    pub limit: Option<usize>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub checkpoint: Option<String>,
}

impl ConnectionArgs {
    pub fn from_args(args: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            first: count_arg(args, "first")?,
            last: count_arg(args, "last")?,
            limit: count_arg(args, "limit")?,
            after: string_arg(args, "after"),
            before: string_arg(args, "before"),
            checkpoint: string_arg(args, "checkpoint"),
        })
    }

    /// Explicit `limit`, then `first`, then `last`
    pub fn limit(&self) -> Option<usize> {
        self.limit.or(self.first).or(self.last)
    }

    /// Decoded store position to resume after: `checkpoint`, then `after`, then `before`
    pub fn checkpoint(&self) -> Result<Option<Value>> {
        self.checkpoint
            .as_deref()
            .or(self.after.as_deref())
            .or(self.before.as_deref())
            .map(decode_cursor)
            .transpose()
    }
}

fn count_arg(args: &Map<String, Value>, name: &str) -> Result<Option<usize>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| Error::Argument(format!("{name} must be a non-negative integer"))),
    }
}

fn string_arg(args: &Map<String, Value>, name: &str) -> Option<String> {
    args.get(name).and_then(Value::as_str).map(str::to_string)
}

pub fn encode_cursor(position: &Value) -> String {
    BASE64.encode(position.to_string())
}

pub fn decode_cursor(cursor: &str) -> Result<Value> {
    let bytes = BASE64
        .decode(cursor)
        .map_err(|_| Error::Cursor(format!("{cursor:?} is not base64")))?;
    serde_json::from_slice(&bytes).map_err(|_| Error::Cursor(format!("{cursor:?} does not hold JSON")))
}

/// Shape a store page into a connection
pub fn build_connection(result: ListResult, args: &ConnectionArgs, descending: bool) -> Result<Connection> {
    let edges: Vec<Edge> = result
        .items
        .iter()
        .map(|item| Edge {
            cursor: result.position_of(item).map(|p| encode_cursor(&p)),
            node: item.clone(),
        })
        .collect();

    let full_page = args.limit().is_some_and(|limit| limit == edges.len());
    let (start_cursor, end_cursor) = if edges.is_empty() {
        (None, None)
    } else {
        let start = result
            .start_position
            .as_ref()
            .map(encode_cursor)
            .or_else(|| edges.first().and_then(|e| e.cursor.clone()));
        let end = result
            .end_position
            .as_ref()
            .map(encode_cursor)
            .or_else(|| edges.last().and_then(|e| e.cursor.clone()));
        (start, end)
    };

    Ok(Connection {
        page_info: PageInfo {
            has_next_page: !descending && full_page,
            has_previous_page: descending && full_page,
            start_cursor,
            end_cursor,
        },
        edges,
    })
}

/// Encode a resource's primary keys, plus its type, as an opaque id
pub fn encode_global_id(model: &str, keys: &[String], resource: &Value) -> Result<String> {
    let mut tuple = BTreeMap::new();
    tuple.insert(TYPE_PROPERTY.to_string(), Value::from(model));
    for key in keys {
        let value = resource
            .get(key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::MissingPrimaryKey {
                model: model.to_string(),
                key: key.clone(),
            })?;
        tuple.insert(key.clone(), value.clone());
    }
    let json = serde_json::to_string(&tuple).map_err(|e| Error::Cursor(e.to_string()))?;
    Ok(BASE64.encode(json))
}

/// Decode a global id into its key object. The `_t` discriminator is always present.
pub fn decode_global_id(id: &str) -> Result<Map<String, Value>> {
    match decode_cursor(id)? {
        Value::Object(key) if key.get(TYPE_PROPERTY).is_some_and(Value::is_string) => Ok(key),
        _ => Err(Error::Cursor(format!("{id:?} is not a global id"))),
    }
}
