#![forbid(unsafe_code)]

use std::time::Duration;

use serde_json::Value;

/// Provider error bodies are truncated to this many bytes in diagnostics.
const MAX_PROVIDER_DETAIL_BYTES: usize = 600;

/// One failed outbound provider call. `safe_detail` is what operators see;
/// it carries the provider's own error text but never credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCallError {
    pub provider: &'static str,
    pub error_kind: &'static str,
    pub http_status: Option<u16>,
    pub provider_detail: Option<String>,
}

impl ProviderCallError {
    pub fn new(provider: &'static str, error_kind: &'static str, http_status: Option<u16>) -> Self {
        Self {
            provider,
            error_kind,
            http_status,
            provider_detail: None,
        }
    }

    pub fn with_detail(
        provider: &'static str,
        error_kind: &'static str,
        http_status: Option<u16>,
        detail: String,
    ) -> Self {
        Self {
            provider,
            error_kind,
            http_status,
            provider_detail: Some(truncate_detail(detail)),
        }
    }

    pub fn safe_detail(&self) -> String {
        let mut out = match self.http_status {
            Some(status) => format!(
                "provider={} error={} status={}",
                self.provider, self.error_kind, status
            ),
            None => format!("provider={} error={}", self.provider, self.error_kind),
        };
        if let Some(detail) = self.provider_detail.as_deref() {
            out.push_str(" detail=");
            out.push_str(detail);
        }
        out
    }
}

fn truncate_detail(detail: String) -> String {
    if detail.len() <= MAX_PROVIDER_DETAIL_BYTES {
        return detail;
    }
    let mut cut = MAX_PROVIDER_DETAIL_BYTES;
    while cut > 0 && !detail.is_char_boundary(cut) {
        cut -= 1;
    }
    detail[..cut].to_string()
}

/// Bounded-timeout agent for all outbound provider calls. A call that does
/// not finish in time surfaces as a retryable transport failure.
pub fn build_http_agent(timeout_ms: u32, user_agent: &str) -> Result<ureq::Agent, String> {
    if timeout_ms == 0 {
        return Err("timeout must be > 0".to_string());
    }
    let timeout = Duration::from_millis(u64::from(timeout_ms).max(100));
    Ok(ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(user_agent)
        .build())
}

/// JSON POST with a bearer credential. The response body is parsed as JSON;
/// a non-2xx status carries the provider's error text into the diagnostic.
pub fn post_json(
    agent: &ureq::Agent,
    provider: &'static str,
    endpoint: &str,
    bearer: &str,
    payload: &Value,
) -> Result<Value, ProviderCallError> {
    let response = agent
        .post(endpoint)
        .set("Content-Type", "application/json")
        .set("Authorization", &format!("Bearer {bearer}"))
        .set("Accept", "application/json")
        .send_json(payload.clone())
        .map_err(|e| provider_error_from_ureq(provider, e))?;
    serde_json::from_reader(response.into_reader())
        .map_err(|_| ProviderCallError::new(provider, "json_parse", None))
}

pub fn provider_error_from_ureq(provider: &'static str, err: ureq::Error) -> ProviderCallError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            if body.trim().is_empty() {
                ProviderCallError::new(provider, "http_non_2xx", Some(status))
            } else {
                ProviderCallError::with_detail(provider, "http_non_2xx", Some(status), body)
            }
        }
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            ProviderCallError::new(provider, classify_transport_error_kind(&combined), None)
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}
