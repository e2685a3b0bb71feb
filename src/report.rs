use crate::util::now_rfc3339;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkOutcome {
    Success {
        commission_id: String,
        policy_id: String,
        simulated: bool,
    },
    ValidationError {
        commission_id: String,
        error: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        missing_fields: Vec<String>,
    },
    HttpError {
        commission_id: String,
        status: u16,
        error: String,
        response_text: String,
    },
    Exception {
        commission_id: String,
        error: String,
        trace: String,
    },
}

impl LinkOutcome {
    pub fn commission_id(&self) -> &str {
        match self {
            Self::Success { commission_id, .. }
            | Self::ValidationError { commission_id, .. }
            | Self::HttpError { commission_id, .. }
            | Self::Exception { commission_id, .. } => commission_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedPair {
    pub commission_id: String,
    pub policy_id: String,
    pub simulated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub ok: bool,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub attempted: usize,
    pub linked: usize,
    pub linked_commission_ids: Vec<String>,
    pub linked_pairs: Vec<LinkedPair>,
    pub errors: Vec<LinkOutcome>,
    pub input_ready_ids: Vec<String>,
    pub simulation_mode: bool,
}

impl RunReport {
    /// Folds per-id outcomes, in processing order, into the aggregate report.
    pub fn from_outcomes(
        outcomes: Vec<LinkOutcome>,
        input_ready_ids: Vec<String>,
        simulation_mode: bool,
        user: Option<String>,
    ) -> Self {
        let attempted = outcomes.len();
        let mut linked_commission_ids = Vec::new();
        let mut linked_pairs = Vec::new();
        let mut errors = Vec::new();

        for outcome in outcomes {
            match outcome {
                LinkOutcome::Success {
                    commission_id,
                    policy_id,
                    simulated,
                } => {
                    linked_commission_ids.push(commission_id.clone());
                    linked_pairs.push(LinkedPair {
                        commission_id,
                        policy_id,
                        simulated,
                    });
                }
                err => errors.push(err),
            }
        }

        let linked = linked_commission_ids.len();
        let mut message = format!(
            "Step 5 attempted {attempted} links. Success: {linked}, Errors: {}",
            errors.len()
        );
        if simulation_mode {
            message.push_str(" (simulation mode)");
        }

        Self {
            ok: errors.is_empty(),
            message,
            timestamp: now_rfc3339(),
            user,
            attempted,
            linked,
            linked_commission_ids,
            linked_pairs,
            errors,
            input_ready_ids,
            simulation_mode,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub ok: bool,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub error: String,
    pub trace: String,
}

impl FailureReport {
    pub fn new(error: &str, trace: &str, user: Option<String>) -> Self {
        Self {
            ok: false,
            message: "Step 5 failed.".to_string(),
            timestamp: now_rfc3339(),
            user,
            error: crate::util::truncate_head(error, 500),
            trace: crate::util::truncate_tail(trace, 2000),
        }
    }
}

/// What one invocation hands to the downstream consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepResult {
    Completed(RunReport),
    Failed(FailureReport),
}

impl StepResult {
    pub fn ok(&self) -> bool {
        match self {
            Self::Completed(r) => r.ok,
            Self::Failed(_) => false,
        }
    }
}
