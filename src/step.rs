use crate::{
    api::RecordApi,
    config::Config,
    credentials::CredentialsProvider,
    input::{RunInput, StepError, UpstreamValue},
    linker::Linker,
    report::{FailureReport, StepResult},
    util::error_trace,
};
use anyhow::Result;
use tracing::{error, info};

/// One full invocation: normalize the upstream value, link every ready id,
/// and fold fatal input problems into a failure report.
pub fn run_step<A: RecordApi>(
    cfg: &Config,
    upstream: &UpstreamValue,
    creds: &dyn CredentialsProvider,
    api: A,
) -> StepResult {
    let input = match load_input(cfg, upstream) {
        Ok(input) => input,
        Err(err) => {
            error!("step 5 aborted: {err}");
            return StepResult::Failed(FailureReport::new(
                &err.to_string(),
                &error_trace(&err),
                cfg.report.user.clone(),
            ));
        }
    };

    let linker = Linker::new(cfg, api);
    StepResult::Completed(linker.run(&input, creds))
}

pub fn load_input(cfg: &Config, upstream: &UpstreamValue) -> Result<RunInput, StepError> {
    let input = RunInput::from_upstream(upstream)?;
    info!(
        "step 4 data loaded: ready_to_link={} planned_links={}",
        input.ready_to_link.len(),
        input.planned_links.len()
    );
    if cfg.input.require_upstream_ok && input.ok == Some(false) {
        return Err(StepError::UpstreamFailed(
            input
                .message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    Ok(input)
}

/// Serializes a result the way the output boundary expects it, optionally
/// wrapped under a single field as an embedded JSON string.
pub fn render(cfg: &Config, result: &StepResult) -> Result<String> {
    let value = if cfg.output.wrap_field.is_empty() {
        serde_json::to_value(result)?
    } else {
        let mut wrapped = serde_json::Map::new();
        wrapped.insert(
            cfg.output.wrap_field.clone(),
            serde_json::Value::String(serde_json::to_string(result)?),
        );
        serde_json::Value::Object(wrapped)
    };
    let out = if cfg.output.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(out)
}
