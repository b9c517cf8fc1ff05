//! Request bodies and response envelopes.

use crate::error::ApiError;
use axum::Json;
use cmdb::{Ci, PropertyMap, DEFAULT_WEIGHT};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

/// `POST /level` body.
#[derive(Debug, Deserialize)]
pub struct NewLevel {
    /// Level name.
    pub name: String,
}

/// `PATCH /level` body.
#[derive(Debug, Deserialize)]
pub struct LevelRename {
    /// Level index.
    pub id: usize,
    /// New name.
    pub name: String,
}

/// One CI in a `POST /ci` body.
#[derive(Debug, Deserialize)]
pub struct NewCi {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form type tag.
    #[serde(rename = "type")]
    pub ci_type: String,
    /// Level index.
    pub level: usize,
    /// String properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl From<NewCi> for Ci {
    fn from(payload: NewCi) -> Self {
        let properties: PropertyMap = payload.properties.into_iter().collect();
        Ci::new(payload.id, payload.name, payload.ci_type)
            .with_level(payload.level)
            .with_properties(properties)
    }
}

/// One relationship in a `POST /relationship` body.
#[derive(Debug, Deserialize)]
pub struct NewRelationship {
    /// Source CI id.
    pub source: String,
    /// Destination CI id.
    pub destination: String,
    /// Relationship type.
    #[serde(rename = "type")]
    pub rel_type: String,
    /// Edge weight.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    DEFAULT_WEIGHT
}

impl NewRelationship {
    /// `source->destination` label used in bulk reports.
    pub fn label(&self) -> String {
        format!("{}->{}", self.source, self.destination)
    }
}

/// Parse a request body as JSON.
pub fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("Request body is empty".to_string()));
    }
    Ok(serde_json::from_slice(body)?)
}

/// Deserialize one item, reporting field errors as bad requests.
pub fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|err| ApiError::BadRequest(format!("Invalid payload: {err}")))
}

/// Required query parameter.
pub fn required_param<'a>(
    params: &'a HashMap<String, String>,
    key: &str,
) -> Result<&'a str, ApiError> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ApiError::BadRequest(format!("Missing query parameter '{key}'")))
}

/// Required non-negative integer query parameter.
pub fn index_param(params: &HashMap<String, String>, key: &str) -> Result<usize, ApiError> {
    let raw = required_param(params, key)?;
    raw.trim().parse().map_err(|_| {
        ApiError::BadRequest(format!(
            "Query parameter '{key}' must be a non-negative integer, got '{raw}'"
        ))
    })
}

/// Success envelope with extra fields merged in.
pub fn success(message: impl Into<String>, extra: Value) -> Json<Value> {
    let mut body = json!({
        "status": "success",
        "message": message.into(),
    });
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    Json(body)
}

/// Outcome of one item in a bulk request.
#[derive(Debug)]
pub struct ItemOutcome {
    label: String,
    result: Result<String, ApiError>,
}

impl ItemOutcome {
    /// Record an item result under `label`.
    pub fn new(label: impl Into<String>, result: Result<String, ApiError>) -> Self {
        Self {
            label: label.into(),
            result,
        }
    }
}

/// Bulk report: `{status, message, total, <counter>, results}`.
///
/// `status` is `"success"` only when every item succeeded.
pub fn bulk_report(counter: &str, outcomes: Vec<ItemOutcome>) -> Json<Value> {
    let total = outcomes.len();
    let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();

    let results: Vec<Value> = outcomes
        .into_iter()
        .map(|outcome| {
            let (status, message) = match outcome.result {
                Ok(message) => ("success", message),
                Err(err) => ("failure", err.to_string()),
            };
            json!({ "id": outcome.label, "status": status, "message": message })
        })
        .collect();

    let mut body = serde_json::Map::new();
    body.insert(
        "status".into(),
        json!(if succeeded == total { "success" } else { "failure" }),
    );
    body.insert(
        "message".into(),
        json!(format!("{succeeded} of {total} item(s) {counter}")),
    );
    body.insert("total".into(), json!(total));
    body.insert(counter.into(), json!(succeeded));
    body.insert("results".into(), Value::Array(results));
    Json(Value::Object(body))
}

/// Body that carries either a single object or an array of them.
#[derive(Debug)]
pub enum OneOrMany {
    /// A single item.
    One(Value),
    /// A bulk request.
    Many(Vec<Value>),
}

impl From<Value> for OneOrMany {
    fn from(payload: Value) -> Self {
        match payload {
            Value::Array(items) => OneOrMany::Many(items),
            item => OneOrMany::One(item),
        }
    }
}

/// Value of the `id` field, or empty when absent.
pub fn item_id(value: &Value) -> String {
    value
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
