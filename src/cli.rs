use crate::{
    api::{HttpRecordApi, OfflineApi},
    config::Config,
    credentials::{
        CredentialsProvider, EnvCredentials, NoCredentials, ProviderChain, SecretsFile,
        StaticCredentials,
    },
    input::UpstreamValue,
    plan::PlanIndex,
    report::{FailureReport, StepResult},
    step::{load_input, render, run_step},
    util::ensure_dir,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "commission-link")]
#[command(about = "Links ready commission records to policy records via the record API")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./commission-link.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show effective API settings and which credentials resolve.
    Doctor {},
    /// Normalize step 4 data and validate every ready id's plan without calling the API.
    Check {
        /// Step 4 result file, or `-` for stdin.
        #[arg(long)]
        input: PathBuf,
    },
    /// Perform the links and emit the step 5 result JSON.
    Run {
        /// Step 4 result file, or `-` for stdin. Falls back to the input env var.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Environment variable holding the step 4 result when --input is absent.
        #[arg(long)]
        input_env: Option<String>,
        /// Write the result here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Never contact the API; every valid plan is reported as a simulated link.
        #[arg(long)]
        simulate: bool,
        #[arg(long)]
        api_base: Option<String>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let mut cfg = Config::load_or_default(args.config.as_deref())?;
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Check { input } => check(&cfg, input),
        Command::Run {
            input,
            input_env,
            out,
            simulate,
            api_base,
        } => {
            if *simulate {
                cfg.linker.force_simulation = true;
            }
            if let Some(base) = api_base {
                cfg.api.base_url = base.clone();
            }
            if let Some(var) = input_env {
                cfg.input.env_var = var.clone();
            }
            if let Some(out) = out {
                cfg.output.file_path = out.display().to_string();
            }
            run(&cfg, input.as_deref())
        }
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the result JSON, so logs go to stderr.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file && !cfg.logging.file_path.is_empty() {
        let path = Path::new(&cfg.logging.file_path);
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn read_upstream(cfg: &Config, input: Option<&Path>) -> Result<UpstreamValue> {
    let raw = match input {
        Some(p) if p == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .with_context(|| "reading stdin")?;
            Some(buf)
        }
        Some(p) => Some(
            std::fs::read_to_string(p)
                .with_context(|| format!("reading input: {}", p.display()))?,
        ),
        None => std::env::var(&cfg.input.env_var).ok(),
    };
    Ok(UpstreamValue::from_raw(raw))
}

fn doctor(cfg: &Config) -> Result<()> {
    let env = EnvCredentials::from_config(cfg);
    let var_set = |name: &str| std::env::var(name).is_ok_and(|v| !v.trim().is_empty());
    let secrets_file = (!cfg.credentials.secrets_file.is_empty()).then(|| {
        let provider = SecretsFile {
            path: PathBuf::from(&cfg.credentials.secrets_file),
        };
        serde_json::json!({
            "path": cfg.credentials.secrets_file,
            "resolves": provider.resolve().is_some(),
        })
    });
    let env_vars: serde_json::Map<String, serde_json::Value> =
        [&env.api_key_var, &env.business_id_var, &env.user_id_var]
            .into_iter()
            .map(|name| (name.clone(), var_set(name.as_str()).into()))
            .collect();
    let resolved = ProviderChain::from_config(cfg).resolve();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "api_base": cfg.api.base_url,
            "timeout_seconds": cfg.api.timeout_seconds,
            "force_simulation": cfg.linker.force_simulation,
            "credentials": {
                "secrets_file": secrets_file,
                "env": env_vars,
                "resolved": resolved.is_some(),
            },
            "simulation_mode": cfg.linker.force_simulation || resolved.is_none(),
        }))?
    );
    Ok(())
}

fn check(cfg: &Config, input: &Path) -> Result<()> {
    let upstream = read_upstream(cfg, Some(input))?;
    let run_input = load_input(cfg, &upstream)?;
    let index = PlanIndex::build(&run_input);

    let items: Vec<_> = run_input
        .ready_to_link
        .iter()
        .map(|id| match index.resolve(id) {
            Ok(plan) => serde_json::json!({
                "commission_id": id,
                "ok": true,
                "policy_object_id": plan.policy_object_id,
            }),
            Err(err) => serde_json::json!({
                "commission_id": id,
                "ok": false,
                "error": err.to_string(),
            }),
        })
        .collect();
    let valid = items.iter().filter(|i| i["ok"] == true).count();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "ready_to_link": run_input.ready_to_link.len(),
            "planned_links": run_input.planned_links.len(),
            "valid": valid,
            "invalid": items.len() - valid,
            "items": items,
        }))?
    );
    Ok(())
}

fn run(cfg: &Config, input: Option<&Path>) -> Result<()> {
    let upstream = read_upstream(cfg, input)?;

    let creds = if cfg.linker.force_simulation {
        None
    } else {
        ProviderChain::from_config(cfg).resolve()
    };

    // The HTTP client is only built when links will actually be sent.
    let result = match creds.map(|c| (c, HttpRecordApi::from_config(cfg))) {
        None => run_step(cfg, &upstream, &NoCredentials, OfflineApi),
        Some((creds, Ok(api))) => run_step(cfg, &upstream, &StaticCredentials(Some(creds)), api),
        Some((_, Err(err))) => {
            warn!("cannot build API client: {err:#}");
            StepResult::Failed(FailureReport::new(
                &err.to_string(),
                &format!("{err:?}"),
                cfg.report.user.clone(),
            ))
        }
    };

    let rendered = render(cfg, &result)?;
    if cfg.output.file_path.is_empty() {
        println!("{rendered}");
    } else {
        let path = Path::new(&cfg.output.file_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        std::fs::write(path, &rendered)
            .with_context(|| format!("writing result: {}", path.display()))?;
        info!("result written to {}", path.display());
    }

    info!("step 5 finished ok={}", result.ok());
    Ok(())
}
