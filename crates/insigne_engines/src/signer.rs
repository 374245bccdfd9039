#![forbid(unsafe_code)]

use serde_json::Value;

use crate::provider::{build_http_agent, post_json, ProviderCallError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerConfig {
    /// Storage service base URL, e.g. `https://xyz.supabase.co`.
    pub storage_url: String,
    pub bucket: String,
    pub timeout_ms: u32,
    pub user_agent: String,
}

impl SignerConfig {
    pub fn mvp_v1() -> Self {
        Self {
            storage_url: "http://127.0.0.1:54321".to_string(),
            bucket: "assets".to_string(),
            timeout_ms: 30_000,
            user_agent: "insigne_signer/0.1".to_string(),
        }
    }
}

/// Issues one time-bounded retrieval URL per call. No URL is ever cached;
/// re-issuing after expiry always asks the backend again.
#[derive(Debug, Clone)]
pub struct SignerRuntime {
    config: SignerConfig,
}

impl SignerRuntime {
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }

    /// `fixture_json`, when set, stands in for the backend response body.
    pub fn run(
        &self,
        service_key: &str,
        storage_path: &str,
        ttl_seconds: u32,
        fixture_json: Option<&str>,
    ) -> Result<String, ProviderCallError> {
        let path = storage_path.trim().trim_start_matches('/');
        if path.is_empty() {
            return Err(ProviderCallError::new(
                "storage",
                "missing_storage_path",
                None,
            ));
        }

        let body: Value = if let Some(fixture) = fixture_json {
            serde_json::from_str(fixture)
                .map_err(|_| ProviderCallError::new("storage", "json_parse", None))?
        } else {
            let agent = build_http_agent(self.config.timeout_ms, &self.config.user_agent)
                .map_err(|_| ProviderCallError::new("storage", "config_invalid", None))?;
            let endpoint = format!(
                "{}/storage/v1/object/sign/{}/{}",
                self.config.storage_url.trim_end_matches('/'),
                self.config.bucket,
                path
            );
            let payload = serde_json::json!({ "expiresIn": ttl_seconds });
            post_json(&agent, "storage", &endpoint, service_key, &payload)?
        };

        let signed = body
            .get("signedURL")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderCallError::new("storage", "missing_signed_url", None))?;

        Ok(self.absolute_url(signed))
    }

    /// The backend answers with a path relative to its storage API root.
    fn absolute_url(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            return signed.to_string();
        }
        format!(
            "{}/storage/v1/{}",
            self.config.storage_url.trim_end_matches('/'),
            signed.trim_start_matches('/')
        )
    }
}
