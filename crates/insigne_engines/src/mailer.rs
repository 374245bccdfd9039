#![forbid(unsafe_code)]

use serde_json::Value;

use crate::provider::{build_http_agent, post_json, ProviderCallError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailerConfig {
    pub endpoint: String,
    pub from_email: String,
    pub timeout_ms: u32,
    pub user_agent: String,
}

impl MailerConfig {
    pub fn mvp_v1() -> Self {
        Self {
            endpoint: "https://api.resend.com/emails".to_string(),
            from_email: "Insigne <no-reply@insigne.example>".to_string(),
            timeout_ms: 30_000,
            user_agent: "insigne_mailer/0.1".to_string(),
        }
    }
}

/// Notification dispatch. A failed send is reported with the provider's own
/// error text; the caller decides what state (if any) to advance.
#[derive(Debug, Clone)]
pub struct MailerRuntime {
    config: MailerConfig,
}

impl MailerRuntime {
    pub fn new(config: MailerConfig) -> Self {
        Self { config }
    }

    /// `fixture_json`, when set, stands in for the provider response body.
    pub fn run(
        &self,
        api_key: &str,
        to: &str,
        subject: &str,
        html_body: &str,
        fixture_json: Option<&str>,
    ) -> Result<(), ProviderCallError> {
        let payload = self.build_email_payload(to, subject, html_body);

        let body: Value = if let Some(fixture) = fixture_json {
            serde_json::from_str(fixture)
                .map_err(|_| ProviderCallError::new("resend", "json_parse", None))?
        } else {
            let agent = build_http_agent(self.config.timeout_ms, &self.config.user_agent)
                .map_err(|_| ProviderCallError::new("resend", "config_invalid", None))?;
            post_json(&agent, "resend", &self.config.endpoint, api_key, &payload)?
        };

        // The provider answers 2xx with an id; an error object means the
        // send was not accepted even though the call got through.
        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            return Err(ProviderCallError::with_detail(
                "resend",
                "send_rejected",
                None,
                error.to_string(),
            ));
        }
        Ok(())
    }

    pub fn build_email_payload(&self, to: &str, subject: &str, html_body: &str) -> Value {
        serde_json::json!({
            "from": self.config.from_email,
            "to": to,
            "subject": subject,
            "html": html_body,
        })
    }
}
