use crate::{config::Config, credentials::Credentials};
use reqwest::Url;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// One field update: point `link_field_id` on the commission record at the policy.
#[derive(Debug, Clone, Serialize)]
pub struct LinkRequest {
    pub commission_object_id: String,
    pub commission_id: String,
    pub link_field_id: String,
    pub policy_object_id: String,
}

impl LinkRequest {
    pub fn body(&self) -> serde_json::Value {
        json!({
            "fields": [{
                "id": self.link_field_id,
                "value": {"id": self.policy_object_id},
            }]
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request url: {0}")]
    Url(String),
    #[error("no record API is available in simulation mode")]
    Offline,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Remote record store. Non-2xx statuses come back as responses, not errors.
pub trait RecordApi {
    fn update_record(&self, creds: &Credentials, req: &LinkRequest) -> Result<ApiResponse, ApiError>;
}

impl<T: RecordApi + ?Sized> RecordApi for &T {
    fn update_record(&self, creds: &Credentials, req: &LinkRequest) -> Result<ApiResponse, ApiError> {
        (**self).update_record(creds, req)
    }
}

/// Stands in for the record API when no link will be sent.
pub struct OfflineApi;

impl RecordApi for OfflineApi {
    fn update_record(&self, _creds: &Credentials, _req: &LinkRequest) -> Result<ApiResponse, ApiError> {
        Err(ApiError::Offline)
    }
}

pub struct HttpRecordApi {
    base: Url,
    client: reqwest::blocking::Client,
}

impl HttpRecordApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("invalid api base url {base_url:?}: {e}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("api base url cannot carry a path: {base_url}");
        }
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Self::new(&cfg.api.base_url, Duration::from_secs(cfg.api.timeout_seconds))
    }

    /// `{base}/records/{commission_object_id}/{commission_id}`, segments percent-encoded.
    pub fn record_url(&self, req: &LinkRequest) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(self.base.to_string()))?
            .pop_if_empty()
            .extend([
                "records",
                req.commission_object_id.as_str(),
                req.commission_id.as_str(),
            ]);
        Ok(url)
    }
}

impl RecordApi for HttpRecordApi {
    fn update_record(&self, creds: &Credentials, req: &LinkRequest) -> Result<ApiResponse, ApiError> {
        let url = self.record_url(req)?;
        let body = req.body();
        debug!("PUT {url} payload={body}");

        let resp = self
            .client
            .put(url)
            .header("X-API-KEY", &creds.api_key)
            .header("X-BUSINESS-ID", &creds.business_id)
            .header("X-USER-ID", &creds.user_id)
            .header("Accept", "application/json")
            .json(&body)
            .send()?;

        let status = resp.status().as_u16();
        let body = resp.text().unwrap_or_else(|e| {
            warn!("reading response body failed (status {status}): {e}");
            String::new()
        });
        debug!("response status={status}");
        Ok(ApiResponse { status, body })
    }
}
