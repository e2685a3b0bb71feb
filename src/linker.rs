use crate::{
    api::{LinkRequest, RecordApi},
    config::Config,
    credentials::{Credentials, CredentialsProvider},
    input::RunInput,
    plan::{PlanError, PlanIndex, ResolvedPlan},
    report::{LinkOutcome, RunReport},
    util::{error_trace, truncate_head, truncate_tail},
};
use tracing::{info, warn};

/// Runs the ready ids of one `RunInput` against a `RecordApi`, strictly in order.
pub struct Linker<A: RecordApi> {
    cfg: Config,
    api: A,
}

impl<A: RecordApi> Linker<A> {
    pub fn new(cfg: &Config, api: A) -> Self {
        Self {
            cfg: cfg.clone(),
            api,
        }
    }

    pub fn run(&self, input: &RunInput, creds: &dyn CredentialsProvider) -> RunReport {
        let index = PlanIndex::build(input);
        info!(
            "ready_to_link={} planned_links={} distinct_plans={}",
            input.ready_to_link.len(),
            input.planned_links.len(),
            index.len()
        );

        let creds = if self.cfg.linker.force_simulation {
            None
        } else {
            creds.resolve()
        };
        let simulation_mode = creds.is_none();
        if simulation_mode {
            warn!("credentials unavailable; running in simulation mode");
        }

        let mut outcomes = Vec::with_capacity(input.ready_to_link.len());
        for commission_id in &input.ready_to_link {
            let outcome = self.link_one(&index, commission_id, creds.as_ref());
            if !outcome.is_success() {
                warn!(commission_id = %commission_id, ?outcome, "link failed");
            }
            outcomes.push(outcome);
        }

        let report = RunReport::from_outcomes(
            outcomes,
            input.ready_to_link.clone(),
            simulation_mode,
            self.cfg.report.user.clone(),
        );
        info!("{}", report.message);
        report
    }

    fn link_one(
        &self,
        index: &PlanIndex<'_>,
        commission_id: &str,
        creds: Option<&Credentials>,
    ) -> LinkOutcome {
        let plan = match index.resolve(commission_id) {
            Ok(plan) => plan,
            Err(err) => return validation_outcome(commission_id, err),
        };

        let Some(creds) = creds else {
            info!(
                "simulated link commission={} policy={}",
                commission_id, plan.policy_object_id
            );
            return LinkOutcome::Success {
                commission_id: commission_id.to_string(),
                policy_id: plan.policy_object_id.to_string(),
                simulated: true,
            };
        };

        self.link_remote(plan, creds)
    }

    fn link_remote(&self, plan: ResolvedPlan<'_>, creds: &Credentials) -> LinkOutcome {
        let req = LinkRequest {
            commission_object_id: plan.commission_object_id.to_string(),
            commission_id: plan.commission_id.to_string(),
            link_field_id: plan.link_field_id_on_commission.to_string(),
            policy_object_id: plan.policy_object_id.to_string(),
        };
        info!(
            "linking commission={} policy={} object={}",
            req.commission_id, req.policy_object_id, req.commission_object_id
        );

        match self.api.update_record(creds, &req) {
            Ok(resp) if resp.status == 200 => LinkOutcome::Success {
                commission_id: req.commission_id,
                policy_id: req.policy_object_id,
                simulated: false,
            },
            Ok(resp) => LinkOutcome::HttpError {
                commission_id: req.commission_id,
                status: resp.status,
                error: format!("HTTP_{}", resp.status),
                response_text: truncate_head(&resp.body, self.cfg.api.max_response_chars),
            },
            Err(err) => LinkOutcome::Exception {
                commission_id: req.commission_id,
                error: err.to_string(),
                trace: truncate_tail(&error_trace(&err), self.cfg.linker.max_trace_chars),
            },
        }
    }
}

fn validation_outcome(commission_id: &str, err: PlanError) -> LinkOutcome {
    let missing_fields = match &err {
        PlanError::NotFound => Vec::new(),
        PlanError::MissingFields(fields) => fields.iter().map(|f| f.to_string()).collect(),
    };
    LinkOutcome::ValidationError {
        commission_id: commission_id.to_string(),
        error: err.to_string(),
        missing_fields,
    }
}
