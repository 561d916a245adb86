//! Closes a set of raw models into a registry-ready form
//!
//! Normalization merges the base protocol into every model, expands required
//! groups to their leaves, lifts anonymous embedded shapes into synthetic models
//! and derives the dotted nested properties used by filter and sort inputs.

use std::collections::BTreeMap;

use super::base;
use super::{Model, Property};
use crate::error::{Error, Result};
use crate::graphql::naming;

/// Normalize a complete set of raw models, keyed by id
pub fn normalize(raw: &BTreeMap<String, Model>) -> Result<BTreeMap<String, Model>> {
    let mut models = BTreeMap::new();
    for model in raw.values() {
        check_property_names(model)?;
        let mut model = model.clone();
        add_protocol_properties(&mut model);
        model.required = expand_required(&model)?;
        for lifted in lift_embedded(&model, raw)? {
            models.insert(lifted.id.clone(), lifted);
        }
        models.insert(model.id.clone(), model);
    }

    let nested: Vec<(String, BTreeMap<String, Property>)> = models
        .values()
        .map(|model| (model.id.clone(), nested_properties(model, &models)))
        .collect();
    for (id, nested) in nested {
        if let Some(model) = models.get_mut(&id) {
            model.nested = nested;
        }
    }

    Ok(models)
}

fn check_property_names(model: &Model) -> Result<()> {
    if model.properties.contains_key(base::RESERVED_PROPERTY) {
        return Err(Error::ReservedProperty {
            model: model.id.clone(),
        });
    }
    for name in model.properties.keys() {
        // A trailing `_` would run into the separator of a nested field name
        if !naming::is_valid_name(name)
            || name.contains(base::NESTED_SEPARATOR)
            || name.ends_with('_')
        {
            return Err(Error::InvalidTypeName(format!("{}.{}", model.id, name)));
        }
    }
    Ok(())
}

fn add_protocol_properties(model: &mut Model) {
    if model.embedded {
        return;
    }
    if model.inlined {
        model.properties.extend(base::inlined_properties());
    } else {
        model.properties.extend(base::object_properties());
        model.properties.extend(base::custom_properties());
    }
}

/// Replace group names in the required list with their member leaves
fn expand_required(model: &Model) -> Result<Vec<String>> {
    let mut leaves = Vec::new();
    let mut path = Vec::new();
    for name in &model.required {
        expand_group(model, name, &mut path, &mut leaves)?;
    }
    Ok(leaves)
}

fn expand_group(
    model: &Model,
    name: &str,
    path: &mut Vec<String>,
    leaves: &mut Vec<String>,
) -> Result<()> {
    if path.iter().any(|p| p == name) {
        return Err(Error::CyclicGroup {
            model: model.id.clone(),
            property: name.to_string(),
        });
    }
    let property = model
        .properties
        .get(name)
        .ok_or_else(|| Error::UnresolvedRequired {
            model: model.id.clone(),
            property: name.to_string(),
        })?;

    match &property.group {
        Some(members) => {
            path.push(name.to_string());
            for member in members {
                expand_group(model, member, path, leaves)?;
            }
            path.pop();
        }
        None => {
            if !leaves.iter().any(|l| l == name) {
                leaves.push(name.to_string());
            }
        }
    }
    Ok(())
}

/// Synthetic models for anonymous shapes, keyed `<model>_<property>`
fn lift_embedded(model: &Model, raw: &BTreeMap<String, Model>) -> Result<Vec<Model>> {
    let mut lifted = Vec::new();
    let mut pending = vec![model.clone()];
    while let Some(owner) = pending.pop() {
        for (name, property) in &owner.properties {
            if property.reference().is_some() {
                continue;
            }
            let Some(shape) = property.embedded_shape() else {
                continue;
            };
            let id = embedded_model_id(&owner.id, name);
            if raw.contains_key(&id) {
                tracing::warn!(model = %owner.id, property = %name, "Embedded shape id collides with a declared model, keeping the declared one");
                continue;
            }
            let mut embedded = Model::new(id);
            embedded.embedded = true;
            embedded.description = property.description.clone();
            embedded.properties = shape.clone();
            embedded.required = property.embedded_required().to_vec();
            check_property_names(&embedded)?;
            embedded.required = expand_required(&embedded)?;
            pending.push(embedded.clone());
            lifted.push(embedded);
        }
    }
    Ok(lifted)
}

pub(crate) fn embedded_model_id(model: &str, property: &str) -> String {
    format!("{model}_{property}")
}

/// One level of dotted `property.child` shapes for filtering and sorting
fn nested_properties(model: &Model, models: &BTreeMap<String, Model>) -> BTreeMap<String, Property> {
    let mut nested = BTreeMap::new();
    for (name, property) in &model.properties {
        if !property.is_complex() || property.is_json() || property.is_backlink() {
            continue;
        }

        let children = match property.reference() {
            None => match property.embedded_shape() {
                Some(shape) => shape.clone(),
                None => continue,
            },
            Some(target_id) => match models.get(target_id) {
                None => continue,
                Some(target) if target.is_enum() => base::enum_value_properties(),
                Some(target) if property.declares_inlined() || target.inlined => {
                    target.properties.clone()
                }
                Some(_) => base::stub_properties(),
            },
        };

        for (child, shape) in children {
            nested.insert(format!("{name}.{child}"), shape);
        }
    }
    nested
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PropertyType, parse_models};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn raw(json: &str) -> BTreeMap<String, Model> {
        parse_models(json)
            .unwrap()
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect()
    }

    #[test]
    fn test_protocol_properties_merged() {
        let models = normalize(&raw(
            r#"[
                {"id":"ex.Person","properties":{"name":{"type":"string"}}},
                {"id":"ex.Address","inlined":true,"properties":{"city":{"type":"string"}}}
            ]"#,
        ))
        .unwrap();

        let person = &models["ex.Person"];
        for name in ["_t", "_link", "_permalink", "_time", "_author", "_displayName", "_authorTitle"] {
            assert!(person.properties.contains_key(name), "missing {name}");
        }
        assert_eq!(person.properties["_time"].kind, PropertyType::Date);

        let address = &models["ex.Address"];
        assert!(address.properties.contains_key("_t"));
        assert!(!address.properties.contains_key("_link"));
        assert!(!address.properties.contains_key("_authorTitle"));
    }

    #[test]
    fn test_reserved_id_rejected() {
        let err = normalize(&raw(r#"[{"id":"ex.Bad","properties":{"id":{"type":"string"}}}]"#))
            .unwrap_err();
        assert_matches!(err, Error::ReservedProperty { model } if model == "ex.Bad");
    }

    #[test]
    fn test_invalid_property_name_rejected() {
        let err = normalize(&raw(
            r#"[{"id":"ex.Bad","properties":{"first-name":{"type":"string"}}}]"#,
        ))
        .unwrap_err();
        assert_matches!(err, Error::InvalidTypeName(_));

        for name in ["home__city", "x_"] {
            let err = normalize(&raw(&format!(
                r#"[{{"id":"ex.Bad","properties":{{"{name}":{{"type":"string"}}}}}}]"#
            )))
            .unwrap_err();
            assert_matches!(err, Error::InvalidTypeName(_), "{name}");
        }
    }

    #[test]
    fn test_required_groups_expand_to_leaves() {
        let models = normalize(&raw(
            r#"[{"id":"ex.Form","properties":{
                "first":{"type":"string"},
                "last":{"type":"string"},
                "dob":{"type":"date"},
                "name":{"type":"object","group":["first","last"]},
                "identity":{"type":"object","group":["name","dob"]}
            },"required":["identity","first"]}]"#,
        ))
        .unwrap();
        assert_eq!(models["ex.Form"].required, vec!["first", "last", "dob"]);
    }

    #[test]
    fn test_cyclic_group_fails() {
        let err = normalize(&raw(
            r#"[{"id":"ex.Loop","properties":{
                "a":{"type":"object","group":["b"]},
                "b":{"type":"object","group":["a"]}
            },"required":["a"]}]"#,
        ))
        .unwrap_err();
        assert_matches!(err, Error::CyclicGroup { .. });
    }

    #[test]
    fn test_unresolvable_group_member_fails() {
        let err = normalize(&raw(
            r#"[{"id":"ex.Form","properties":{
                "name":{"type":"object","group":["first","missing"]},
                "first":{"type":"string"}
            },"required":["name"]}]"#,
        ))
        .unwrap_err();
        assert_matches!(err, Error::UnresolvedRequired { property, .. } if property == "missing");
    }

    #[test]
    fn test_nested_properties_by_reference_kind() {
        let models = normalize(&raw(
            r#"[
                {"id":"ex.Address","inlined":true,"properties":{"city":{"type":"string"}}},
                {"id":"ex.Color","subClassOf":"tradle.Enum","enum":[{"id":"red"}]},
                {"id":"ex.Pet","properties":{"owner":{"type":"object","ref":"ex.Person"}}},
                {"id":"ex.Person","properties":{
                    "home":{"type":"object","ref":"ex.Address"},
                    "friend":{"type":"object","ref":"ex.Person"},
                    "favorite":{"type":"object","ref":"ex.Color"},
                    "pets":{"type":"array","items":{"ref":"ex.Pet","backlink":"owner"}},
                    "tags":{"type":"array","items":{"type":"string"}},
                    "ghost":{"type":"object","ref":"ex.Unknown"},
                    "size":{"type":"object","properties":{"height":{"type":"number"}}}
                }}
            ]"#,
        ))
        .unwrap();

        let nested = &models["ex.Person"].nested;
        assert!(nested.contains_key("home.city"));
        assert!(nested.contains_key("home._t"));
        assert!(nested.contains_key("friend._permalink"));
        assert!(nested["friend._t"].is_model_range());
        assert!(nested.contains_key("favorite.id"));
        assert!(nested.contains_key("size.height"));
        assert!(!nested.keys().any(|k| k.starts_with("pets.")));
        assert!(!nested.keys().any(|k| k.starts_with("tags.")));
        assert!(!nested.keys().any(|k| k.starts_with("ghost.")));
        assert!(!models["ex.Person"].properties.contains_key("home.city"));
    }

    #[test]
    fn test_embedded_shapes_lifted() {
        let models = normalize(&raw(
            r#"[{"id":"ex.Person","properties":{
                "size":{"type":"object","properties":{"height":{"type":"number"}},"required":["height"]},
                "phones":{"type":"array","items":{"properties":{"number":{"type":"string"}}}}
            }}]"#,
        ))
        .unwrap();

        let size = &models["ex.Person_size"];
        assert!(size.embedded);
        assert_eq!(size.required, vec!["height"]);
        assert!(!size.properties.contains_key("_t"));
        assert!(models["ex.Person_phones"].properties.contains_key("number"));
    }
}
