//! Payload types and property validation.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Properties or tags as supplied by the caller.
///
/// Values may hold any JSON shape; only strings, integers, doubles and
/// booleans pass [`validate`].
pub type Properties = HashMap<String, Value>;

/// A single property or tag value that can be sent to the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
}

impl PropertyValue {
    /// Convert a JSON value, returning `None` for null, arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(PropertyValue::String(s.clone())),
            Value::Bool(b) => Some(PropertyValue::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(PropertyValue::Integer(i)),
                None => n.as_f64().map(PropertyValue::Double),
            },
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Returns true if every value is a string, integer, double or boolean.
///
/// An empty map is valid.
pub fn validate(properties: &Properties) -> bool {
    first_invalid(properties).is_none()
}

/// The key of the first value that fails validation.
pub(crate) fn first_invalid(properties: &Properties) -> Option<&str> {
    properties
        .iter()
        .find(|(_, value)| PropertyValue::from_json(value).is_none())
        .map(|(key, _)| key.as_str())
}

/// Validate and convert caller properties into sendable values.
pub(crate) fn convert(
    properties: Properties,
) -> Result<HashMap<String, PropertyValue>, crate::Error> {
    properties
        .into_iter()
        .map(|(key, value)| match PropertyValue::from_json(&value) {
            Some(converted) => Ok((key, converted)),
            None => Err(crate::Error::InvalidProperties { key }),
        })
        .collect()
}

/// API endpoints, relative to the API host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Identify,
    Track,
}

impl Endpoint {
    /// Path appended to the API host.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Identify => "/user/identify",
            Endpoint::Track => "/log",
        }
    }
}

/// Body of `POST /user/identify`.
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyPayload {
    pub user_id: String,
    pub project: String,
    pub properties: HashMap<String, PropertyValue>,
}

/// Body of `POST /log`.
#[derive(Debug, Clone, Serialize)]
pub struct TrackPayload {
    pub name: String,
    pub channel: String,
    pub project: String,
    pub user_id: String,
    pub icon: String,
    pub description: String,
    pub tags: HashMap<String, PropertyValue>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// A validated payload for either endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Identify(IdentifyPayload),
    Track(TrackPayload),
}

impl Payload {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Payload::Identify(_) => Endpoint::Identify,
            Payload::Track(_) => Endpoint::Track,
        }
    }
}
