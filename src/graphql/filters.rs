//! Filter and sort inputs
//!
//! Every listable model gets a `filter_<M>` input with one field per operator.
//! Each operator field holds a per-model input type listing the properties the
//! operator applies to:
//! - EQ, NEQ (any value, including reference stubs)
//! - NULL (non-required properties only)
//! - IN, NOT_IN, BETWEEN (lists of scalars)
//! - STARTS_WITH, CONTAINS (strings)
//! - LT, LTE, GT, GTE (scalars)
//! - SUBCLASS_OF (type discriminators of abstract references)
//!
//! Dotted nested properties appear as `a__b` fields and are rewritten back
//! to `a.b` paths when a filter is parsed.

use serde_json::Value;

use super::mapper::{self, Context};
use super::naming;
use super::scalars;
use super::types::{FieldType, InputFieldDef, InputKind, Scalar};
use crate::error::{Error, Result};
use crate::models::{Model, Property, PropertyType, Registry};
use crate::store::{Condition, Filter, OrderBy};

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Null,
    In,
    NotIn,
    Between,
    StartsWith,
    Contains,
    Lt,
    Lte,
    Gt,
    Gte,
    SubclassOf,
}

/// Shape an operator's operand must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Any,
    Array,
    Scalar,
}

impl Operator {
    pub const ALL: [Operator; 13] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Null,
        Operator::In,
        Operator::NotIn,
        Operator::Between,
        Operator::StartsWith,
        Operator::Contains,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::SubclassOf,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Neq => "NEQ",
            Operator::Null => "NULL",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Between => "BETWEEN",
            Operator::StartsWith => "STARTS_WITH",
            Operator::Contains => "CONTAINS",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::SubclassOf => "SUBCLASS_OF",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn input_kind(&self) -> InputKind {
        match self {
            Operator::Eq | Operator::Neq => InputKind::Compare,
            Operator::Null => InputKind::Null,
            Operator::In | Operator::NotIn | Operator::Between => InputKind::Selector,
            Operator::StartsWith | Operator::Contains => InputKind::StringCompare,
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => InputKind::ScalarCompare,
            Operator::SubclassOf => InputKind::SubclassOf,
        }
    }

    pub fn operand(&self) -> Operand {
        match self {
            Operator::Eq | Operator::Neq => Operand::Any,
            Operator::In | Operator::NotIn | Operator::Between | Operator::SubclassOf => Operand::Array,
            _ => Operand::Scalar,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Operator::Eq => "Equal to",
            Operator::Neq => "Not equal to",
            Operator::Null => "true: missing or null, false: present",
            Operator::In => "Equal to one of",
            Operator::NotIn => "Equal to none of",
            Operator::Between => "Within [low, high], inclusive",
            Operator::StartsWith => "String prefix",
            Operator::Contains => "Substring",
            Operator::Lt => "Less than",
            Operator::Lte => "Less than or equal to",
            Operator::Gt => "Greater than",
            Operator::Gte => "Greater than or equal to",
            Operator::SubclassOf => "Type discriminator is one of these models or their subclasses",
        }
    }
}

/// Properties an operator family applies to, keyed by property path.
/// Inlined models expose their own properties only.
pub fn applicable_properties<'m>(
    registry: &Registry,
    model: &'m Model,
    kind: InputKind,
    inlined: bool,
) -> Vec<(&'m String, &'m Property)> {
    let required = model.required_for(inlined);
    let candidates: Box<dyn Iterator<Item = (&'m String, &'m Property)> + 'm> = if inlined {
        Box::new(model.properties.iter())
    } else {
        Box::new(model.filterable_properties())
    };
    candidates
        .filter(|(_, property)| property.group.is_none())
        .filter(|(path, property)| match kind {
            InputKind::Compare => !property.is_backlink(),
            InputKind::ScalarCompare => property.is_scalar(),
            InputKind::StringCompare => property.is_string(),
            InputKind::Selector => property.is_scalar() && !property.is_array(),
            InputKind::Null => !property.is_backlink() && !required.contains(*path),
            InputKind::SubclassOf => is_abstract_discriminator(registry, model, path, property),
        })
        .collect()
}

/// `x._t` where `x` references an abstract or interface model
fn is_abstract_discriminator(registry: &Registry, model: &Model, path: &str, property: &Property) -> bool {
    let Some((parent, _)) = path.split_once('.') else {
        return false;
    };
    property.is_model_range()
        && model
            .properties
            .get(parent)
            .and_then(Property::reference)
            .and_then(|target| registry.get(target))
            .is_some_and(|target| target.is_abstract || target.is_interface)
}

pub fn has_input_fields(registry: &Registry, model: &Model, kind: InputKind, inlined: bool) -> bool {
    !applicable_properties(registry, model, kind, inlined).is_empty()
}

/// Fields of the `<kind>_<M>` input type
pub fn input_fields(registry: &Registry, model: &Model, kind: InputKind, inlined: bool) -> Vec<InputFieldDef> {
    applicable_properties(registry, model, kind, inlined)
        .into_iter()
        .map(|(path, property)| {
            let ty = match kind {
                InputKind::Null => FieldType::scalar(Scalar::Boolean),
                InputKind::SubclassOf => FieldType::scalar(Scalar::String).list(),
                InputKind::Selector => {
                    mapper::map_property(registry, model, path, property, Context::Input(kind))
                        .ty
                        .list()
                }
                _ => mapper::map_property(registry, model, path, property, Context::Input(kind)).ty,
            };
            InputFieldDef {
                name: naming::to_field_name(path),
                ty,
                description: property.description.clone(),
            }
        })
        .collect()
}

/// Scalar properties usable as sort keys, as field names
pub fn sortable_fields(model: &Model) -> Vec<String> {
    model
        .filterable_properties()
        .filter(|(_, property)| property.is_scalar() && property.group.is_none())
        .map(|(path, _)| naming::to_field_name(path))
        .collect()
}

/// Parse a `filter_<M>` argument into predicates
pub fn parse_filter(registry: &Registry, model: &Model, input: &Value) -> Result<Filter> {
    let mut filter = Filter::new();
    let Value::Object(buckets) = input else {
        return match input {
            Value::Null => Ok(filter),
            _ => Err(Error::Argument("filter must be an object".into())),
        };
    };

    for (operator_name, bucket) in buckets {
        let operator = Operator::from_name(operator_name)
            .ok_or_else(|| Error::Argument(format!("unknown filter operator {operator_name}")))?;
        let bucket = match bucket {
            Value::Null => continue,
            Value::Object(bucket) => bucket,
            _ => {
                return Err(Error::Argument(format!("{operator_name} must be an object")));
            }
        };
        for (field, operand) in bucket {
            if operand.is_null() {
                continue;
            }
            let path = naming::to_property_path(field);
            let property = model.property(&path);
            let condition = parse_condition(registry, operator, property, operand)
                .map_err(|e| Error::Argument(format!("{operator_name}.{field}: {e}")))?;
            filter.push(path, condition);
        }
    }
    Ok(filter)
}

fn parse_condition(
    registry: &Registry,
    operator: Operator,
    property: Option<&Property>,
    operand: &Value,
) -> std::result::Result<Condition, String> {
    let kind = property.map(|p| p.kind);
    // Dates become milliseconds and byte literals their base64 form
    let normalize = |value: &Value| -> std::result::Result<Value, String> {
        match (kind, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Some(PropertyType::Date), _) => scalars::parse_timestamp(value).map(Value::from),
            (Some(PropertyType::Bytes), Value::String(literal)) => {
                scalars::canonical_bytes(literal).map(Value::from)
            }
            (Some(PropertyType::Bytes), _) => Err("expected a byte literal".into()),
            _ => Ok(value.clone()),
        }
    };
    let list = || -> std::result::Result<Vec<Value>, String> {
        match operand {
            Value::Array(values) => values.iter().map(normalize).collect(),
            _ => Err("expected a list".into()),
        }
    };
    let text = || -> std::result::Result<String, String> {
        operand
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "expected a string".to_string())
    };

    let condition = match operator {
        Operator::Eq => Condition::Eq(normalize(operand)?),
        Operator::Neq => Condition::Neq(normalize(operand)?),
        Operator::Null => Condition::Null(operand.as_bool().ok_or("expected a boolean")?),
        Operator::In => Condition::In(list()?),
        Operator::NotIn => Condition::NotIn(list()?),
        Operator::Between => match <[Value; 2]>::try_from(list()?) {
            Ok([low, high]) => Condition::Between { low, high },
            Err(values) => return Err(format!("expected 2 values, got {}", values.len())),
        },
        Operator::StartsWith => Condition::StartsWith(text()?),
        Operator::Contains => Condition::Contains(text()?),
        Operator::Lt => Condition::Lt(normalize(operand)?),
        Operator::Lte => Condition::Lte(normalize(operand)?),
        Operator::Gt => Condition::Gt(normalize(operand)?),
        Operator::Gte => Condition::Gte(normalize(operand)?),
        Operator::SubclassOf => {
            let mut ids = Vec::new();
            for value in list()? {
                let id = value.as_str().ok_or("expected model ids")?;
                for descendant in registry.descendants(id) {
                    if !ids.contains(&descendant) {
                        ids.push(descendant);
                    }
                }
            }
            Condition::SubclassOf(ids)
        }
    };
    Ok(condition)
}

/// Parse an `orderby_<M>` argument
pub fn parse_order_by(input: Option<&Value>) -> Result<Option<OrderBy>> {
    let Some(Value::Object(order)) = input else {
        return Ok(None);
    };
    let Some(property) = order.get("property").and_then(Value::as_str) else {
        return Ok(None);
    };
    let desc = match order.get("desc") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(desc)) => *desc,
        Some(_) => return Err(Error::Argument("orderBy.desc must be a boolean".into())),
    };
    Ok(Some(OrderBy {
        property: naming::to_property_path(property),
        desc,
    }))
}

/// `{ "EQ": { "<link>___permalink": permalink } }`-equivalent predicate for backlinks
pub fn backlink_filter(link: &str, permalink: &str) -> Filter {
    let mut filter = Filter::new();
    filter.push(
        format!("{link}.{}", crate::models::base::PERMALINK_PROPERTY),
        Condition::Eq(Value::from(permalink)),
    );
    filter
}

/// Merge `extra` predicates after those of `filter`
pub fn merge(mut filter: Filter, extra: Filter) -> Filter {
    filter.predicates.extend(extra.predicates);
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::types::{NamedType, SharedType};
    use crate::models::parse_models;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                parse_models(
                    r#"[
                        {"id":"ex.Animal","abstract":true,"properties":{}},
                        {"id":"ex.Dog","subClassOf":"ex.Animal","properties":{}},
                        {"id":"ex.Person","properties":{
                            "name":{"type":"string"},
                            "age":{"type":"number"},
                            "born":{"type":"date"},
                            "photo":{"type":"bytes"},
                            "tags":{"type":"array","items":{"type":"string"}},
                            "pet":{"type":"object","ref":"ex.Animal"},
                            "friend":{"type":"object","ref":"ex.Person"},
                            "pets":{"type":"array","items":{"ref":"ex.Dog","backlink":"owner"}}
                        },"required":["name"]}
                    ]"#,
                )
                .unwrap(),
            )
            .unwrap();
        registry
    }

    fn field_names(kind: InputKind) -> Vec<String> {
        let registry = registry();
        let person = registry.get("ex.Person").unwrap();
        input_fields(&registry, person, kind, false)
            .into_iter()
            .map(|f| f.name)
            .collect()
    }

    #[test]
    fn test_operator_names_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_name(op.name()), Some(op));
        }
        assert_eq!(Operator::from_name("LIKE"), None);
        assert_eq!(Operator::Between.operand(), Operand::Array);
        assert_eq!(Operator::Gt.input_kind(), InputKind::ScalarCompare);
    }

    #[test]
    fn test_null_applies_to_optional_only() {
        let names = field_names(InputKind::Null);
        assert!(names.contains(&"age".to_string()));
        assert!(!names.contains(&"name".to_string()));
        assert!(!names.contains(&"_permalink".to_string()));
        assert!(!names.contains(&"pets".to_string()));
    }

    #[test]
    fn test_string_compare_applies_to_strings_only() {
        let names = field_names(InputKind::StringCompare);
        assert!(names.contains(&"name".to_string()));
        assert!(names.contains(&"friend___permalink".to_string()));
        assert!(!names.contains(&"age".to_string()));
        assert!(!names.contains(&"tags".to_string()));
    }

    #[test]
    fn test_compare_excludes_backlinks() {
        let names = field_names(InputKind::Compare);
        assert!(names.contains(&"friend".to_string()));
        assert!(names.contains(&"tags".to_string()));
        assert!(!names.contains(&"pets".to_string()));
    }

    #[test]
    fn test_selector_is_list_of_scalar() {
        let registry = registry();
        let person = registry.get("ex.Person").unwrap();
        let fields = input_fields(&registry, person, InputKind::Selector, false);
        let age = fields.iter().find(|f| f.name == "age").unwrap();
        assert_eq!(age.ty, FieldType::scalar(Scalar::Float).list());
        assert!(!fields.iter().any(|f| f.name == "tags"));
    }

    #[test]
    fn test_subclass_of_only_for_abstract_targets() {
        assert_eq!(field_names(InputKind::SubclassOf), vec!["pet___t"]);
    }

    #[test]
    fn test_reference_compare_uses_stub_input() {
        let registry = registry();
        let person = registry.get("ex.Person").unwrap();
        let fields = input_fields(&registry, person, InputKind::Compare, false);
        let friend = fields.iter().find(|f| f.name == "friend").unwrap();
        assert_eq!(friend.ty.named(), &NamedType::Shared(SharedType::StubInput));
        assert!(!friend.ty.is_non_null());
    }

    #[test]
    fn test_parse_filter() {
        let registry = registry();
        let person = registry.get("ex.Person").unwrap();
        let filter = parse_filter(
            &registry,
            person,
            &json!({
                "EQ": {"friend___permalink": "p1", "name": null},
                "BETWEEN": {"born": ["1970-01-01T00:00:01Z", 5000]},
                "NULL": {"age": true},
                "SUBCLASS_OF": {"pet___t": ["ex.Animal"]}
            }),
        )
        .unwrap();

        assert_eq!(filter.find("friend._permalink"), Some(&Condition::Eq(json!("p1"))));
        assert!(filter.find("name").is_none());
        assert_eq!(
            filter.find("born"),
            Some(&Condition::Between {
                low: json!(1000),
                high: json!(5000)
            })
        );
        assert_eq!(filter.find("age"), Some(&Condition::Null(true)));
        let Some(Condition::SubclassOf(ids)) = filter.find("pet._t") else {
            panic!("expected SUBCLASS_OF");
        };
        assert!(ids.contains(&"ex.Dog".to_string()));
        assert!(ids.contains(&"ex.Animal".to_string()));
    }

    #[test]
    fn test_byte_operands_are_canonical() {
        let registry = registry();
        let person = registry.get("ex.Person").unwrap();
        let filter = parse_filter(
            &registry,
            person,
            &json!({"EQ": {"photo": "hex:6869"}, "IN": {"photo": ["utf8:hi", "base64:aGk="]}}),
        )
        .unwrap();
        assert_eq!(filter.predicates[0].condition, Condition::Eq(json!("base64:aGk=")));
        assert_eq!(
            filter.predicates[1].condition,
            Condition::In(vec![json!("base64:aGk="), json!("base64:aGk=")])
        );
        assert_matches!(
            parse_filter(&registry, person, &json!({"EQ": {"photo": "hex:zz"}})),
            Err(Error::Argument(_))
        );
    }

    #[test]
    fn test_parse_filter_rejects_bad_operands() {
        let registry = registry();
        let person = registry.get("ex.Person").unwrap();
        assert_matches!(
            parse_filter(&registry, person, &json!({"BETWEEN": {"age": [1]}})),
            Err(Error::Argument(_))
        );
        assert_matches!(
            parse_filter(&registry, person, &json!({"LIKE": {"age": 1}})),
            Err(Error::Argument(_))
        );
        assert_matches!(
            parse_filter(&registry, person, &json!({"GT": {"born": "someday"}})),
            Err(Error::Argument(_))
        );
    }

    #[test]
    fn test_parse_order_by() {
        let order = parse_order_by(Some(&json!({"property": "friend___permalink", "desc": true})))
            .unwrap()
            .unwrap();
        assert_eq!(order.property, "friend._permalink");
        assert!(order.desc);
        assert_eq!(parse_order_by(None).unwrap(), None);
    }

    #[test]
    fn test_backlink_filter() {
        let filter = backlink_filter("owner", "alice");
        assert_eq!(filter.find("owner._permalink"), Some(&Condition::Eq(json!("alice"))));
    }

    #[test]
    fn test_sortable_fields() {
        let registry = registry();
        let fields = sortable_fields(registry.get("ex.Person").unwrap());
        assert!(fields.contains(&"age".to_string()));
        assert!(fields.contains(&"friend___permalink".to_string()));
        assert!(!fields.contains(&"friend".to_string()));
        assert!(!fields.contains(&"tags".to_string()));
    }
}
