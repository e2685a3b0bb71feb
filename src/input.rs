use crate::literal;
use crate::plan::LinkPlan;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Fatal problems with the upstream payload. Any of these aborts the run
/// before per-item processing.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("step 4 input is missing or empty")]
    InputMissing,
    #[error("could not parse step 4 data (json: {json}; literal: {literal})")]
    Parse { json: String, literal: String },
    #[error("step 4 data has an invalid shape: {0}")]
    InvalidShape(String),
    #[error("step 4 reported failure: {0}")]
    UpstreamFailed(String),
}

/// The shapes an upstream step result can arrive in, resolved once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamValue {
    Absent,
    /// Raw JSON or Python-literal text.
    Text(String),
    /// A wrapped value object exposing its payload through `v`.
    Wrapped { v: Value },
    /// A dictionary carrying its payload under the `"v"` key.
    Keyed(Map<String, Value>),
}

impl UpstreamValue {
    /// Classifies text handed over by the host. A JSON object whose only key
    /// is `"v"` is a keyed wrapper; everything else is payload text.
    pub fn from_raw(raw: Option<String>) -> Self {
        let Some(raw) = raw else {
            return Self::Absent;
        };
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&raw) {
            if map.len() == 1 && map.contains_key("v") {
                return Self::Keyed(map);
            }
        }
        Self::Text(raw)
    }

    pub fn payload_text(&self) -> Result<String, StepError> {
        let text = match self {
            Self::Absent => return Err(StepError::InputMissing),
            Self::Text(s) => s.clone(),
            Self::Wrapped { v } => value_text(v)?,
            Self::Keyed(map) => value_text(map.get("v").ok_or(StepError::InputMissing)?)?,
        };
        if text.trim().is_empty() {
            return Err(StepError::InputMissing);
        }
        Ok(text)
    }
}

fn value_text(v: &Value) -> Result<String, StepError> {
    match v {
        Value::Null => Err(StepError::InputMissing),
        Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string(other).map_err(|e| StepError::InvalidShape(e.to_string())),
    }
}

/// Strict JSON first, then the permissive literal form.
pub fn parse_payload(text: &str) -> Result<Value, StepError> {
    let json_err = match serde_json::from_str::<Value>(text) {
        Ok(v) => {
            debug!("parsed step 4 data as JSON");
            return Ok(v);
        }
        Err(e) => e,
    };
    debug!("step 4 data is not JSON ({json_err}); trying literal form");
    literal::parse(text).map_err(|lit_err| StepError::Parse {
        json: json_err.to_string(),
        literal: lit_err.to_string(),
    })
}

/// Canonical record derived once per invocation from the upstream payload.
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    pub ok: Option<bool>,
    pub message: Option<String>,
    pub ready_to_link: Vec<String>,
    pub planned_links: Vec<LinkPlan>,
}

impl RunInput {
    pub fn from_document(doc: &Value) -> Result<Self, StepError> {
        let obj = doc
            .as_object()
            .ok_or_else(|| StepError::InvalidShape(format!("expected an object, got {}", kind(doc))))?;

        let ok = match obj.get("ok") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(other) => {
                return Err(StepError::InvalidShape(format!(
                    "'ok' must be a bool, got {}",
                    kind(other)
                )))
            }
        };
        let message = obj.get("message").and_then(Value::as_str).map(str::to_string);

        let ready_to_link = match obj.get("ready_to_link") {
            None | Some(Value::Null) => Vec::new(),
            // Entries that are not ids keep their JSON text so they still count
            // as attempted and fail plan lookup on their own.
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    id_text(item).unwrap_or_else(|| {
                        warn!("ready_to_link[{i}] is a {}, not an id", kind(item));
                        item.to_string()
                    })
                })
                .collect(),
            Some(other) => {
                return Err(StepError::InvalidShape(format!(
                    "'ready_to_link' must be a list, got {}",
                    kind(other)
                )))
            }
        };

        let planned_links = match obj.get("planned_links") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let mut plans = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    if item.get("commission_id").and_then(id_text).is_none() {
                        warn!("planned_links[{i}] has no usable commission_id; skipping");
                        continue;
                    }
                    match serde_json::from_value::<LinkPlan>(item.clone()) {
                        Ok(plan) => plans.push(plan),
                        Err(e) => warn!("planned_links[{i}] is unreadable ({e}); skipping"),
                    }
                }
                plans
            }
            Some(other) => {
                return Err(StepError::InvalidShape(format!(
                    "'planned_links' must be a list, got {}",
                    kind(other)
                )))
            }
        };

        Ok(Self {
            ok,
            message,
            ready_to_link,
            planned_links,
        })
    }

    /// Full normalization: value → text → document → record.
    pub fn from_upstream(upstream: &UpstreamValue) -> Result<Self, StepError> {
        let text = upstream.payload_text()?;
        debug!("raw step 4 input: {}", crate::util::truncate_head(&text, 200));
        let doc = parse_payload(&text)?;
        Self::from_document(&doc)
    }
}

fn id_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
