use crate::config::Config;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// The three secrets the record API requires.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub business_id: String,
    pub user_id: String,
}

impl Credentials {
    /// All three values must be present and non-blank.
    pub fn from_parts(
        api_key: Option<String>,
        business_id: Option<String>,
        user_id: Option<String>,
    ) -> Option<Self> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(Self {
            api_key: present(api_key)?,
            business_id: present(business_id)?,
            user_id: present(user_id)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("business_id", &self.business_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Source of API credentials. `None` means unavailable, which puts the run
/// into simulation mode rather than failing it.
pub trait CredentialsProvider {
    fn resolve(&self) -> Option<Credentials>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Option<Credentials>);

impl CredentialsProvider for StaticCredentials {
    fn resolve(&self) -> Option<Credentials> {
        self.0.clone()
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialsProvider for NoCredentials {
    fn resolve(&self) -> Option<Credentials> {
        None
    }

    fn name(&self) -> &str {
        "none"
    }
}

#[derive(Debug, Clone)]
pub struct EnvCredentials {
    pub api_key_var: String,
    pub business_id_var: String,
    pub user_id_var: String,
}

impl EnvCredentials {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            api_key_var: cfg.credentials.api_key_env.clone(),
            business_id_var: cfg.credentials.business_id_env.clone(),
            user_id_var: cfg.credentials.user_id_env.clone(),
        }
    }
}

impl CredentialsProvider for EnvCredentials {
    fn resolve(&self) -> Option<Credentials> {
        Credentials::from_parts(
            std::env::var(&self.api_key_var).ok(),
            std::env::var(&self.business_id_var).ok(),
            std::env::var(&self.user_id_var).ok(),
        )
    }

    fn name(&self) -> &str {
        "env"
    }
}

#[derive(Debug, Default, Deserialize)]
struct SecretsDoc {
    kizen_api_key: Option<String>,
    x_business_id: Option<String>,
    x_user_id: Option<String>,
}

/// TOML secret store holding `kizen_api_key`, `x_business_id`, `x_user_id`.
#[derive(Debug, Clone)]
pub struct SecretsFile {
    pub path: PathBuf,
}

impl CredentialsProvider for SecretsFile {
    fn resolve(&self) -> Option<Credentials> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!("secrets file {} unreadable: {err}", self.path.display());
                return None;
            }
        };
        let doc: SecretsDoc = match toml::from_str(&raw) {
            Ok(doc) => doc,
            Err(err) => {
                warn!("secrets file {} is not valid TOML: {err}", self.path.display());
                return None;
            }
        };
        Credentials::from_parts(doc.kizen_api_key, doc.x_business_id, doc.x_user_id)
    }

    fn name(&self) -> &str {
        "secrets_file"
    }
}

/// Tries each provider in order; the first that resolves wins.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn CredentialsProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl CredentialsProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Secret store (when configured), then environment variables.
    pub fn from_config(cfg: &Config) -> Self {
        let mut chain = Self::new();
        if !cfg.credentials.secrets_file.is_empty() {
            chain = chain.with(SecretsFile {
                path: PathBuf::from(&cfg.credentials.secrets_file),
            });
        }
        chain.with(EnvCredentials::from_config(cfg))
    }
}

impl CredentialsProvider for ProviderChain {
    fn resolve(&self) -> Option<Credentials> {
        self.providers.iter().find_map(|p| {
            let creds = p.resolve();
            if creds.is_some() {
                debug!("credentials resolved from {}", p.name());
            }
            creds
        })
    }

    fn name(&self) -> &str {
        "chain"
    }
}
