//! In-process resource store
//!
//! Holds resources as JSON documents in insertion order. Positions are offsets
//! into the filtered and sorted scan, so a checkpoint resumes right after the
//! item it was taken from. A scan covers the requested model and the
//! subclasses listed on the request.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{Condition, ListRequest, ListResult, Predicate, ResourceStore, StoreError, value_at_path};
use crate::models::base::{LINK_PROPERTY, PERMALINK_PROPERTY, TYPE_PROPERTY};

#[derive(Debug, Default)]
pub struct MemoryStore {
    resources: RwLock<Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resources(resources: impl IntoIterator<Item = Value>) -> Self {
        Self {
            resources: RwLock::new(resources.into_iter().collect()),
        }
    }

    pub fn insert(&self, resource: Value) {
        self.resources.write().push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, model: &str, key: &Map<String, Value>) -> Result<Option<Value>, StoreError> {
        let resources = self.resources.read();
        let found = resources.iter().find(|resource| {
            resource.get(TYPE_PROPERTY).and_then(Value::as_str) == Some(model)
                && key.iter().all(|(k, v)| resource.get(k) == Some(v))
        });
        Ok(found.cloned())
    }

    async fn get_by_link(&self, link: &str) -> Result<Value, StoreError> {
        let resources = self.resources.read();
        resources
            .iter()
            .find(|r| r.get(LINK_PROPERTY).and_then(Value::as_str) == Some(link))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(link.to_string()))
    }

    async fn list(&self, request: ListRequest) -> Result<ListResult, StoreError> {
        let resources = self.resources.read();
        let mut matching: Vec<&Value> = resources
            .iter()
            .filter(|r| {
                r.get(TYPE_PROPERTY)
                    .and_then(Value::as_str)
                    .is_some_and(|t| request.covers(t))
            })
            .filter(|r| request.filter.predicates.iter().all(|p| matches(r, p)))
            .collect();

        if let Some(order) = &request.order_by {
            matching.sort_by(|a, b| {
                compare_for_order(
                    value_at_path(a, &order.property),
                    value_at_path(b, &order.property),
                    order.desc,
                )
            });
        }

        let start = match &request.checkpoint {
            None => 0,
            Some(checkpoint) => checkpoint
                .as_u64()
                .and_then(|offset| usize::try_from(offset).ok())
                .and_then(|offset| offset.checked_add(1))
                .ok_or_else(|| StoreError::InvalidCheckpoint(checkpoint.to_string()))?,
        };
        let end = request
            .limit
            .map_or(matching.len(), |limit| start.saturating_add(limit).min(matching.len()));
        let page = matching.get(start..end).unwrap_or_default();

        let mut offsets = HashMap::new();
        let items: Vec<Value> = page
            .iter()
            .enumerate()
            .map(|(i, resource)| {
                if let Some(permalink) = resource.get(PERMALINK_PROPERTY).and_then(Value::as_str) {
                    offsets.insert(permalink.to_string(), start + i);
                }
                project(resource, &request.select)
            })
            .collect();

        tracing::debug!(
            model = %request.model,
            matched = matching.len(),
            returned = items.len(),
            "Listed resources"
        );

        let (start_position, end_position) = if items.is_empty() {
            (None, None)
        } else {
            (Some(Value::from(start)), Some(Value::from(start + items.len() - 1)))
        };
        let offsets = Arc::new(offsets);
        Ok(ListResult {
            items,
            start_position,
            end_position,
            item_to_position: Some(Arc::new(move |item: &Value| {
                item.get(PERMALINK_PROPERTY)
                    .and_then(Value::as_str)
                    .and_then(|permalink| offsets.get(permalink))
                    .map_or(Value::Null, |offset| Value::from(*offset))
            })),
        })
    }
}

/// Keep selected top-level properties plus the discriminator and permalink
fn project(resource: &Value, select: &[String]) -> Value {
    let Some(object) = resource.as_object() else {
        return resource.clone();
    };
    if select.is_empty() {
        return resource.clone();
    }
    let projected: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| {
            key.as_str() == TYPE_PROPERTY
                || key.as_str() == PERMALINK_PROPERTY
                || select.iter().any(|s| s == *key)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(projected)
}

fn matches(resource: &Value, predicate: &Predicate) -> bool {
    let actual = value_at_path(resource, &predicate.property).filter(|v| !v.is_null());
    match &predicate.condition {
        Condition::Null(expected) => actual.is_none() == *expected,
        Condition::Eq(expected) => actual.is_some_and(|a| equals(a, expected)),
        Condition::Neq(expected) => !actual.is_some_and(|a| equals(a, expected)),
        Condition::In(values) => actual.is_some_and(|a| values.iter().any(|v| equals(a, v))),
        Condition::NotIn(values) => !actual.is_some_and(|a| values.iter().any(|v| equals(a, v))),
        Condition::Between { low, high } => actual.is_some_and(|a| {
            matches!(compare(a, low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare(a, high), Some(Ordering::Less | Ordering::Equal))
        }),
        Condition::StartsWith(prefix) => actual
            .and_then(Value::as_str)
            .is_some_and(|s| s.starts_with(prefix.as_str())),
        Condition::Contains(needle) => actual
            .and_then(Value::as_str)
            .is_some_and(|s| s.contains(needle.as_str())),
        Condition::Lt(bound) => actual.is_some_and(|a| compare(a, bound) == Some(Ordering::Less)),
        Condition::Lte(bound) => actual.is_some_and(|a| {
            matches!(compare(a, bound), Some(Ordering::Less | Ordering::Equal))
        }),
        Condition::Gt(bound) => actual.is_some_and(|a| compare(a, bound) == Some(Ordering::Greater)),
        Condition::Gte(bound) => actual.is_some_and(|a| {
            matches!(compare(a, bound), Some(Ordering::Greater | Ordering::Equal))
        }),
        Condition::SubclassOf(ids) => actual
            .and_then(Value::as_str)
            .is_some_and(|t| ids.iter().any(|id| id == t)),
    }
}

/// Structural equality. Arrays match when any element matches, and an
/// expected object matches any superset of its keys.
fn equals(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Array(items), expected) if !expected.is_array() => {
            items.iter().any(|item| equals(item, expected))
        }
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(k, v)| actual.get(k).is_some_and(|a| equals(a, v))),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Missing values sort last in either direction
fn compare_for_order(a: Option<&Value>, b: Option<&Value>, desc: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ordering = compare(a, b).unwrap_or(Ordering::Equal);
            if desc { ordering.reverse() } else { ordering }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Filter, OrderBy};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pets() -> MemoryStore {
        MemoryStore::with_resources([
            json!({"_t": "ex.Pet", "_link": "l1", "_permalink": "p1", "name": "Rex", "age": 3, "owner": {"_t": "ex.Person", "_permalink": "alice"}}),
            json!({"_t": "ex.Pet", "_link": "l2", "_permalink": "p2", "name": "Fido", "age": 7, "owner": {"_t": "ex.Person", "_permalink": "bob"}}),
            json!({"_t": "ex.Pet", "_link": "l3", "_permalink": "p3", "name": "Rover", "owner": {"_t": "ex.Person", "_permalink": "alice"}}),
            json!({"_t": "ex.Person", "_link": "l4", "_permalink": "alice", "name": "Alice"}),
        ])
    }

    fn names(result: &ListResult) -> Vec<&str> {
        result
            .items
            .iter()
            .map(|item| item["name"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_get_by_key_and_link() {
        let store = pets();
        let key: Map<String, Value> = serde_json::from_value(json!({"_permalink": "p2"})).unwrap();
        let pet = store.get("ex.Pet", &key).await.unwrap().unwrap();
        assert_eq!(pet["name"], "Fido");
        assert!(store.get("ex.Person", &key).await.unwrap().is_none());

        assert_eq!(store.get_by_link("l4").await.unwrap()["name"], "Alice");
        assert!(matches!(
            store.get_by_link("nope").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_by_nested_path() {
        let mut request = ListRequest::new("ex.Pet");
        request.filter.push("owner._permalink", Condition::Eq(json!("alice")));
        let result = pets().list(request).await.unwrap();
        assert_eq!(names(&result), vec!["Rex", "Rover"]);
    }

    #[tokio::test]
    async fn test_list_conditions() {
        let store = pets();
        let cases = vec![
            (Condition::Null(true), "age", vec!["Rover"]),
            (Condition::Null(false), "age", vec!["Rex", "Fido"]),
            (Condition::StartsWith("R".into()), "name", vec!["Rex", "Rover"]),
            (Condition::Contains("id".into()), "name", vec!["Fido"]),
            (Condition::Gt(json!(3)), "age", vec!["Fido"]),
            (Condition::Lte(json!(3.0)), "age", vec!["Rex"]),
            (
                Condition::Between { low: json!(1), high: json!(5) },
                "age",
                vec!["Rex"],
            ),
            (Condition::In(vec![json!("Rex"), json!("Fido")]), "name", vec!["Rex", "Fido"]),
            (Condition::NotIn(vec![json!("Rex")]), "name", vec!["Fido", "Rover"]),
            (Condition::Neq(json!("Rex")), "name", vec!["Fido", "Rover"]),
            (
                Condition::SubclassOf(vec!["ex.Person".into()]),
                "owner._t",
                vec!["Rex", "Fido", "Rover"],
            ),
        ];
        for (condition, property, expected) in cases {
            let mut request = ListRequest::new("ex.Pet");
            request.filter = Filter::new();
            request.filter.push(property, condition.clone());
            let result = store.list(request).await.unwrap();
            assert_eq!(names(&result), expected, "{condition:?} on {property}");
        }
    }

    #[tokio::test]
    async fn test_list_pages_with_checkpoint() {
        let store = pets();
        let mut request = ListRequest::new("ex.Pet");
        request.order_by = Some(OrderBy {
            property: "name".into(),
            desc: false,
        });
        request.limit = Some(2);
        let first = store.list(request.clone()).await.unwrap();
        assert_eq!(names(&first), vec!["Fido", "Rex"]);
        assert_eq!(first.end_position, Some(json!(1)));
        assert_eq!(first.position_of(&first.items[1]), Some(json!(1)));

        request.checkpoint = first.end_position.clone();
        let second = store.list(request).await.unwrap();
        assert_eq!(names(&second), vec!["Rover"]);
        assert_eq!(second.start_position, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_list_descending_and_projection() {
        let mut request = ListRequest::new("ex.Pet");
        request.order_by = Some(OrderBy {
            property: "age".into(),
            desc: true,
        });
        request.select = vec!["name".into()];
        let result = pets().list(request).await.unwrap();
        assert_eq!(names(&result), vec!["Fido", "Rex", "Rover"]);
        assert!(result.items[0].get("age").is_none());
        assert!(result.items[0].get("_permalink").is_some());
    }

    #[tokio::test]
    async fn test_invalid_checkpoint() {
        let mut request = ListRequest::new("ex.Pet");
        request.checkpoint = Some(json!("abc"));
        assert!(matches!(
            pets().list(request).await,
            Err(StoreError::InvalidCheckpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_checkpoint_at_max_offset_is_rejected() {
        let mut request = ListRequest::new("ex.Pet");
        request.checkpoint = Some(json!(u64::MAX));
        assert!(matches!(
            pets().list(request).await,
            Err(StoreError::InvalidCheckpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_list_includes_requested_subclasses() {
        let store = pets();
        store.insert(json!({"_t": "ex.Dog", "_permalink": "d1", "name": "Spot"}));

        let result = store.list(ListRequest::new("ex.Pet")).await.unwrap();
        assert_eq!(names(&result), vec!["Rex", "Fido", "Rover"]);

        let mut request = ListRequest::new("ex.Pet");
        request.subclasses = vec!["ex.Dog".into()];
        let result = store.list(request).await.unwrap();
        assert_eq!(names(&result), vec!["Rex", "Fido", "Rover", "Spot"]);
    }
}
