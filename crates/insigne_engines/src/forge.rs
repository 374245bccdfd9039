#![forbid(unsafe_code)]

use insigne_contracts::forge::{ForgeDecode, ForgeOutput};
use serde_json::Value;

use crate::provider::{build_http_agent, post_json, ProviderCallError};

/// Serialized answers payloads are clamped to this many characters before
/// prompt assembly; anything beyond is dead weight on the request bill.
pub const MAX_PROMPT_PAYLOAD_CHARS: usize = 12_000;

const PROMPT_PREAMBLE: &str = r#"You are "Insigne", a luxury heraldic house. Write:
1) A premium, intimate 1-2 page report in story form describing the person based on their questionnaire answers. Make it feel like a private dossier: confident, discreet, accurate.
2) A motto in English (short, powerful).
3) The motto translated into Latin (classical style).

Return STRICT JSON:
{
  "report_text": "...",
  "motto_english": "...",
  "motto_latin": "..."
}

Here is the questionnaire payload JSON:
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u32,
    pub user_agent: String,
    pub max_prompt_payload_chars: usize,
}

impl ForgeConfig {
    pub fn mvp_v1() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/responses".to_string(),
            model: "gpt-4.1-mini".to_string(),
            timeout_ms: 30_000,
            user_agent: "insigne_forge/0.1".to_string(),
            max_prompt_payload_chars: MAX_PROMPT_PAYLOAD_CHARS,
        }
    }
}

/// Text-generation provider call plus the decode policy. The decode never
/// fails the operation: provider output that is not the requested JSON is
/// kept verbatim as the report with empty mottoes.
#[derive(Debug, Clone)]
pub struct ForgeRuntime {
    config: ForgeConfig,
}

impl ForgeRuntime {
    pub fn new(config: ForgeConfig) -> Self {
        Self { config }
    }

    /// `fixture_json`, when set, stands in for the provider response body;
    /// no network call is made.
    pub fn run(
        &self,
        api_key: &str,
        answers_payload_json: &str,
        fixture_json: Option<&str>,
    ) -> Result<ForgeOutput, ProviderCallError> {
        let prompt = self.build_prompt(answers_payload_json);

        let body: Value = if let Some(fixture) = fixture_json {
            serde_json::from_str(fixture)
                .map_err(|_| ProviderCallError::new("openai", "json_parse", None))?
        } else {
            let agent = build_http_agent(self.config.timeout_ms, &self.config.user_agent)
                .map_err(|_| ProviderCallError::new("openai", "config_invalid", None))?;
            let payload = serde_json::json!({
                "model": self.config.model,
                "input": prompt,
            });
            post_json(&agent, "openai", &self.config.endpoint, api_key, &payload)?
        };

        let raw = extract_output_text(&body);
        Ok(decode_output(&raw))
    }

    pub fn build_prompt(&self, answers_payload_json: &str) -> String {
        let mut prompt = String::with_capacity(
            PROMPT_PREAMBLE.len() + answers_payload_json.len().min(self.config.max_prompt_payload_chars),
        );
        prompt.push_str(PROMPT_PREAMBLE);
        prompt.extend(
            answers_payload_json
                .chars()
                .take(self.config.max_prompt_payload_chars),
        );
        prompt
    }
}

/// The provider returns output text in a couple of shapes; probe the nested
/// content block first, then the flattened convenience field.
fn extract_output_text(body: &Value) -> String {
    if let Some(text) = body
        .pointer("/output/0/content/0/text")
        .and_then(Value::as_str)
    {
        return text.to_string();
    }
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }
    String::new()
}

/// Strict decode requires a JSON object with a non-empty `report_text`;
/// everything else falls back to storing the raw text as the report.
fn decode_output(raw: &str) -> ForgeOutput {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
        let report_text = map
            .get("report_text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        if !report_text.is_empty() {
            let field = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim()
                    .to_string()
            };
            return ForgeOutput {
                report_text,
                motto_english: field("motto_english"),
                motto_latin: field("motto_latin"),
                decode: ForgeDecode::Structured,
            };
        }
    }
    ForgeOutput {
        report_text: raw.trim().to_string(),
        motto_english: String::new(),
        motto_latin: String::new(),
        decode: ForgeDecode::RawFallback,
    }
}
