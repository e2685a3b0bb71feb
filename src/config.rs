use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub input: Input,
    #[serde(default)]
    pub linker: Linker,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub report: Report,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Loads `path` when given, else `./commission-link.toml` when present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }
        let default = Path::new("commission-link.toml");
        if default.exists() {
            Self::load(default)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Api {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_response_chars: usize,
}
impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: "https://app.go.kizen.com/api".into(),
            timeout_seconds: 15,
            max_response_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// TOML secret store with `kizen_api_key`, `x_business_id`, `x_user_id`. Empty disables it.
    pub secrets_file: String,
    pub api_key_env: String,
    pub business_id_env: String,
    pub user_id_env: String,
}
impl Default for Credentials {
    fn default() -> Self {
        Self {
            secrets_file: "".into(),
            api_key_env: "KIZEN_API_KEY".into(),
            business_id_env: "X_BUSINESS_ID".into(),
            user_id_env: "X_USER_ID".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Input {
    pub env_var: String,
    pub require_upstream_ok: bool,
}
impl Default for Input {
    fn default() -> Self {
        Self {
            env_var: "STEP4_RESULT_JSON".into(),
            require_upstream_ok: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Linker {
    pub force_simulation: bool,
    pub max_trace_chars: usize,
}
impl Default for Linker {
    fn default() -> Self {
        Self {
            force_simulation: false,
            max_trace_chars: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub pretty: bool,
    /// When set, the result is emitted as `{"<wrap_field>": "<serialized result>"}`.
    pub wrap_field: String,
    pub file_path: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            pretty: true,
            wrap_field: "".into(),
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "commission-link.log".into(),
        }
    }
}
