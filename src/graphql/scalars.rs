//! Custom scalars: `Bytes`, `Timestamp` and `JSON`

use async_graphql::Value as GqlValue;
use async_graphql::dynamic::Scalar;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

pub const BYTES: &str = "Bytes";
pub const TIMESTAMP: &str = "Timestamp";
pub const JSON: &str = "JSON";

/// Decode a `<encoding>:<data>` byte literal
pub fn parse_bytes(literal: &str) -> Result<Vec<u8>, String> {
    let (encoding, data) = literal
        .split_once(':')
        .ok_or_else(|| format!("expected <encoding>:<data>, got {literal:?}"))?;
    match encoding {
        "base64" => BASE64.decode(data).map_err(|e| e.to_string()),
        "hex" => hex::decode(data).map_err(|e| e.to_string()),
        "utf8" | "utf-8" => Ok(data.as_bytes().to_vec()),
        "ascii" => {
            if data.is_ascii() {
                Ok(data.as_bytes().to_vec())
            } else {
                Err("non-ascii data in ascii literal".into())
            }
        }
        "latin1" | "binary" => data
            .chars()
            .map(|c| u8::try_from(u32::from(c)).map_err(|_| format!("{c:?} is outside latin1")))
            .collect(),
        other => Err(format!("unknown byte encoding {other:?}")),
    }
}

/// Re-encode a byte literal in the canonical `base64:<data>` form
pub fn canonical_bytes(literal: &str) -> Result<String, String> {
    parse_bytes(literal).map(|bytes| format!("base64:{}", BASE64.encode(bytes)))
}

/// Normalize a date value to integer milliseconds since the epoch
///
/// Accepts integer numbers, whole floats, numeric strings, RFC 3339 date-times,
/// naive `YYYY-MM-DDTHH:MM:SS` date-times (taken as UTC) and `YYYY-MM-DD` dates.
pub fn parse_timestamp(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => {
            if let Some(ms) = n.as_i64() {
                return Ok(ms);
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                _ => Err(format!("{n} is not a whole number of milliseconds")),
            }
        }
        Value::String(s) => parse_timestamp_str(s.trim()),
        other => Err(format!("expected a date, got {other}")),
    }
}

fn parse_timestamp_str(s: &str) -> Result<i64, String> {
    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.and_utc().timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        && let Some(dt) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(dt.and_utc().timestamp_millis());
    }
    Err(format!("unable to parse {s:?} as a date"))
}

/// Output form of a stored date; values that cannot be read as a date yield `None`
pub fn timestamp_output(value: &Value) -> Option<i64> {
    parse_timestamp(value).ok()
}

fn to_json(value: &GqlValue) -> Option<Value> {
    value.clone().into_json().ok()
}

/// The custom scalar definitions, ready to register
pub fn scalar_types() -> Vec<Scalar> {
    vec![
        Scalar::new(BYTES)
            .description("Binary data. Input literal form is `<encoding>:<data>` with encoding one of base64, hex, utf8, ascii or latin1")
            .validator(|value| match value {
                GqlValue::String(s) => parse_bytes(s).is_ok(),
                _ => false,
            }),
        Scalar::new(TIMESTAMP)
            .description("Milliseconds since the Unix epoch")
            .validator(|value| {
                to_json(value).is_some_and(|v| parse_timestamp(&v).is_ok())
            }),
        Scalar::new(JSON).description("Arbitrary JSON value"),
    ]
}
