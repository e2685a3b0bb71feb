use crate::input::RunInput;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Fields a plan must carry, non-empty, before a link can be attempted.
pub const REQUIRED_FIELDS: [&str; 3] = [
    "commission_object_id",
    "policy_object_id",
    "link_field_id_on_commission",
];

/// Prepared instructions for linking one commission record to one policy record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkPlan {
    #[serde(deserialize_with = "id_string")]
    pub commission_id: String,
    #[serde(default, deserialize_with = "opt_text")]
    pub commission_object_id: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub policy_object_id: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub link_field_id_on_commission: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub policy_number_raw: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub commission_name: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub member_name: Option<String>,
    #[serde(default, deserialize_with = "opt_text", skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, deserialize_with = "opt_bool", skip_serializing_if = "Option::is_none")]
    pub can_link: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LinkPlan {
    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "commission_object_id" => self.commission_object_id.as_deref(),
            "policy_object_id" => self.policy_object_id.as_deref(),
            "link_field_id_on_commission" => self.link_field_id_on_commission.as_deref(),
            _ => None,
        }
    }

    /// Required fields that are absent or blank, in canonical order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .into_iter()
            .filter(|name| self.field(name).is_none_or(|v| v.trim().is_empty()))
            .collect()
    }
}

/// A plan whose required fields are all present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPlan<'a> {
    pub commission_id: &'a str,
    pub commission_object_id: &'a str,
    pub policy_object_id: &'a str,
    pub link_field_id_on_commission: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("plan not found")]
    NotFound,
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// commission_id → plan; a later plan for the same id replaces an earlier one.
#[derive(Debug, Default)]
pub struct PlanIndex<'a> {
    plans: HashMap<&'a str, &'a LinkPlan>,
}

impl<'a> PlanIndex<'a> {
    pub fn build(input: &'a RunInput) -> Self {
        let mut plans = HashMap::with_capacity(input.planned_links.len());
        for plan in &input.planned_links {
            plans.insert(plan.commission_id.as_str(), plan);
        }
        Self { plans }
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn get(&self, commission_id: &str) -> Option<&'a LinkPlan> {
        self.plans.get(commission_id).copied()
    }

    pub fn resolve(&self, commission_id: &str) -> Result<ResolvedPlan<'a>, PlanError> {
        let plan = self.get(commission_id).ok_or(PlanError::NotFound)?;
        let missing = plan.missing_fields();
        if !missing.is_empty() {
            return Err(PlanError::MissingFields(missing));
        }
        match (
            plan.commission_object_id.as_deref(),
            plan.policy_object_id.as_deref(),
            plan.link_field_id_on_commission.as_deref(),
        ) {
            (Some(commission_object_id), Some(policy_object_id), Some(link_field)) => {
                Ok(ResolvedPlan {
                    commission_id: plan.commission_id.as_str(),
                    commission_object_id,
                    policy_object_id,
                    link_field_id_on_commission: link_field,
                })
            }
            _ => Err(PlanError::MissingFields(plan.missing_fields())),
        }
    }
}

/// Scalars become text; `null` and structured values carry no usable text.
fn scalar_text(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_text(Value::deserialize(d)?))
}

fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(Value::deserialize(d)?.as_bool())
}

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "commission_id must be a string or number, got {other}"
        ))),
    }
}
