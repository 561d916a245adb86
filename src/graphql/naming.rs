//! GraphQL names derived from model ids and property paths

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::NESTED_SEPARATOR;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[_a-zA-Z][_a-zA-Z0-9]*$").expect("valid name regex"));

static ILLEGAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^_a-zA-Z0-9]").expect("valid sanitize regex"));

/// Prefix of the per-model "get" root field
pub const GET_PREFIX: &str = "r_";
/// Prefix of the per-model connection root field
pub const LIST_PREFIX: &str = "rl_";

pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// Replace every character GraphQL does not allow in names with `_`
pub fn sanitize(id: &str) -> String {
    ILLEGAL_CHARS.replace_all(id, "_").into_owned()
}

/// Sanitized name that must also pass the GraphQL name rule
pub fn checked(name: String) -> Result<String> {
    if is_valid_name(&name) {
        Ok(name)
    } else {
        Err(Error::InvalidTypeName(name))
    }
}

/// `owner._permalink` becomes `owner___permalink`
pub fn to_field_name(path: &str) -> String {
    path.replace('.', NESTED_SEPARATOR)
}

/// Reverse of [`to_field_name`]. Nesting is one level deep, so only the
/// first separator splits.
pub fn to_property_path(field: &str) -> String {
    match field.split_once(NESTED_SEPARATOR) {
        Some((parent, child)) => format!("{parent}.{child}"),
        None => field.to_string(),
    }
}

pub fn get_field_name(model_id: &str) -> String {
    format!("{GET_PREFIX}{}", sanitize(model_id))
}

pub fn list_field_name(model_id: &str) -> String {
    format!("{LIST_PREFIX}{}", sanitize(model_id))
}
