#![forbid(unsafe_code)]

use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

use insigne_contracts::delivery::{ApproveRequest, DeliverRequest, LifecycleResponse};
use insigne_contracts::forge::{GenerationRequest, GenerationResponse};
use insigne_contracts::insigne::InsigneId;
use insigne_contracts::provider_secrets::ProviderSecretId;
use insigne_contracts::webhook::{IngressRequest, IngressResponse};
use insigne_contracts::{ReasonCodeId, UnixTimeMs};
use insigne_engines::forge::{ForgeConfig, ForgeRuntime};
use insigne_engines::mailer::{MailerConfig, MailerRuntime};
use insigne_engines::normalize::{NormalizerConfig, NormalizerRuntime};
use insigne_engines::signer::{SignerConfig, SignerRuntime};
use insigne_pipeline::access::{AccessConfig, AccessRuntime};
use insigne_pipeline::generation::{reason_codes as gen_codes, GenerationRuntime};
use insigne_pipeline::ingress::{reason_codes as ingress_codes, IngressRuntime};
use insigne_pipeline::lifecycle::{reason_codes as life_codes, LifecycleConfig, LifecycleRuntime};
use insigne_storage::store::{InsigneStore, StorageError};
use serde_json::{json, Value};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub records: u64,
    pub awaiting_approval: u64,
}

/// Outcome of one ingestion call, plus the generation target the binary
/// should trigger in the background (set only when a new record was made).
#[derive(Debug, Clone)]
pub struct IngestDispatch {
    pub http_status: u16,
    pub body: Value,
    pub generation_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub bind: String,
    pub admin_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub resend_api_key: Option<String>,
    pub storage_service_key: Option<String>,
    pub storage_url: String,
    pub storage_bucket: String,
    pub results_base_url: String,
    pub from_email: String,
    pub generation_model: String,
    pub outbound_timeout_ms: u32,
}

impl AdapterConfig {
    /// All configuration is read here, once, at process start; nothing
    /// below the adapter consults the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default_local();
        Self {
            bind: env_or("INSIGNE_HTTP_BIND", &defaults.bind),
            admin_key: non_empty_env("INSIGNE_ADMIN_KEY"),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            resend_api_key: non_empty_env("RESEND_API_KEY"),
            storage_service_key: non_empty_env("INSIGNE_STORAGE_SERVICE_KEY"),
            storage_url: env_or("INSIGNE_STORAGE_URL", &defaults.storage_url),
            storage_bucket: env_or("INSIGNE_STORAGE_BUCKET", &defaults.storage_bucket),
            results_base_url: env_or("INSIGNE_RESULTS_BASE_URL", &defaults.results_base_url),
            from_email: env_or("INSIGNE_FROM_EMAIL", &defaults.from_email),
            generation_model: env_or("INSIGNE_GENERATION_MODEL", &defaults.generation_model),
            outbound_timeout_ms: env::var("INSIGNE_OUTBOUND_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| (1_000..=120_000).contains(v))
                .unwrap_or(defaults.outbound_timeout_ms),
        }
    }

    /// Secrets that are not configured; surfaced through the health report
    /// so an operator sees a misconfigured deployment before traffic does.
    pub fn missing_secrets(&self) -> Vec<ProviderSecretId> {
        let mut missing = Vec::new();
        if self.openai_api_key.is_none() {
            missing.push(ProviderSecretId::OpenAiApiKey);
        }
        if self.resend_api_key.is_none() {
            missing.push(ProviderSecretId::ResendApiKey);
        }
        if self.storage_service_key.is_none() {
            missing.push(ProviderSecretId::StorageServiceKey);
        }
        if self.admin_key.is_none() {
            missing.push(ProviderSecretId::AdminKey);
        }
        missing
    }

    pub fn default_local() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            admin_key: None,
            openai_api_key: None,
            resend_api_key: None,
            storage_service_key: None,
            storage_url: "http://127.0.0.1:54321".to_string(),
            storage_bucket: "assets".to_string(),
            results_base_url: "https://insigne.example/results".to_string(),
            from_email: "Insigne <no-reply@insigne.example>".to_string(),
            generation_model: "gpt-4.1-mini".to_string(),
            outbound_timeout_ms: 30_000,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Request-facing runtime state: the store plus one runtime per pipeline.
/// The binary shares it behind `Arc<Mutex<..>>`; every method here is one
/// request-scoped operation.
#[derive(Debug)]
pub struct AdapterRuntime {
    config: AdapterConfig,
    store: InsigneStore,
    ingress: IngressRuntime,
    generation: GenerationRuntime,
    access: AccessRuntime,
    lifecycle: LifecycleRuntime,
}

impl AdapterRuntime {
    pub fn new(config: AdapterConfig) -> Self {
        let forge = ForgeRuntime::new(ForgeConfig {
            model: config.generation_model.clone(),
            timeout_ms: config.outbound_timeout_ms,
            ..ForgeConfig::mvp_v1()
        });
        let signer = SignerRuntime::new(SignerConfig {
            storage_url: config.storage_url.clone(),
            bucket: config.storage_bucket.clone(),
            timeout_ms: config.outbound_timeout_ms,
            ..SignerConfig::mvp_v1()
        });
        let mailer = MailerRuntime::new(MailerConfig {
            from_email: config.from_email.clone(),
            timeout_ms: config.outbound_timeout_ms,
            ..MailerConfig::mvp_v1()
        });
        Self {
            ingress: IngressRuntime::new(NormalizerRuntime::new(NormalizerConfig::mvp_v1())),
            generation: GenerationRuntime::new(forge),
            access: AccessRuntime::new(AccessConfig::mvp_v1(), signer),
            lifecycle: LifecycleRuntime::new(
                LifecycleConfig {
                    results_base_url: config.results_base_url.clone(),
                },
                mailer,
            ),
            store: InsigneStore::new_in_memory(),
            config,
        }
    }

    pub fn default_from_env() -> Self {
        Self::new(AdapterConfig::from_env())
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.bind
    }

    /// Operator authorization. Refuses closed when no key is configured.
    pub fn check_admin_key(&self, presented: Option<&str>) -> bool {
        match (&self.config.admin_key, presented) {
            (Some(expected), Some(got)) => constant_time_eq(expected.as_bytes(), got.as_bytes()),
            _ => false,
        }
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        let missing = self.config.missing_secrets();
        let (outcome, reason) = if missing.is_empty() {
            ("HEALTHY".to_string(), None)
        } else {
            let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
            (
                "DEGRADED".to_string(),
                Some(format!("missing secrets: {}", names.join(", "))),
            )
        };
        AdapterHealthResponse {
            status: "ok".to_string(),
            outcome,
            reason,
            records: self.store.insigne_rows().len() as u64,
            awaiting_approval: self.store.awaiting_approval_rows().len() as u64,
        }
    }

    pub fn ingest(&mut self, raw_body: &str) -> IngestDispatch {
        let req = match IngressRequest::v1(now(), raw_body.to_string()) {
            Ok(r) => r,
            Err(_) => {
                return IngestDispatch {
                    http_status: 400,
                    body: error_body("payload too large", None),
                    generation_target: None,
                }
            }
        };
        match self.ingress.run(&mut self.store, &req) {
            Ok(IngressResponse::Ok(ok)) => {
                let mut body = json!({
                    "ok": true,
                    "insigne_id": ok.insigne_id.as_str(),
                    "submission_id": ok.submission_id,
                });
                if ok.deduped {
                    body["deduped"] = json!(true);
                }
                IngestDispatch {
                    http_status: 200,
                    body,
                    generation_target: (!ok.deduped)
                        .then(|| ok.insigne_id.as_str().to_string()),
                }
            }
            Ok(IngressResponse::Refuse(refuse)) => IngestDispatch {
                http_status: refuse_status(refuse.reason_code),
                body: error_body("Missing submission id", refuse.detail),
                generation_target: None,
            },
            Err(storage_err) => IngestDispatch {
                http_status: 500,
                body: storage_error_body(&storage_err),
                generation_target: None,
            },
        }
    }

    /// The generation trigger. Called from a background task after a 200
    /// already went back to the webhook sender; also reachable directly for
    /// operator-driven retries.
    pub fn trigger_generation(&mut self, raw_insigne_id: &str) -> (u16, Value) {
        let Some(api_key) = self.config.openai_api_key.clone() else {
            return (
                500,
                error_body(
                    &format!("missing {}", ProviderSecretId::OpenAiApiKey.as_str()),
                    None,
                ),
            );
        };
        let insigne_id = match InsigneId::new(raw_insigne_id) {
            Ok(id) => id,
            Err(_) => return (400, error_body("Missing id", None)),
        };
        let req = match GenerationRequest::v1(now(), insigne_id) {
            Ok(r) => r,
            Err(_) => return (400, error_body("Missing id", None)),
        };
        match self.generation.run(&mut self.store, &req, &api_key, None) {
            Ok(GenerationResponse::Ok(ok)) => (
                200,
                json!({
                    "ok": true,
                    "status": ok.status.as_str(),
                }),
            ),
            Ok(GenerationResponse::Refuse(refuse)) => (
                refuse_status(refuse.reason_code),
                error_body("generation refused", refuse.detail),
            ),
            Err(storage_err) => (500, storage_error_body(&storage_err)),
        }
    }

    pub fn read_by_token(&self, token: &str) -> (u16, Value) {
        if token.trim().is_empty() {
            return (400, error_body("Missing token", None));
        }
        let service_key = self.config.storage_service_key.clone().unwrap_or_default();
        match self
            .access
            .read_by_token(&self.store, token, &service_key, None)
        {
            Ok(ok) => (
                200,
                json!({
                    "ok": true,
                    "insigne": {
                        "id": ok.insigne.insigne_id,
                        "status": ok.insigne.status,
                        "motto_latin": ok.insigne.motto_latin,
                        "report_text": ok.insigne.report_text,
                    },
                    "assets": ok.assets,
                }),
            ),
            Err(refuse) => (
                refuse_status(refuse.reason_code),
                error_body("Not found", refuse.detail),
            ),
        }
    }

    pub fn read_latest(&self) -> (u16, Value) {
        match self.access.read_latest(&self.store) {
            Ok(ok) => (
                200,
                json!({
                    "ok": true,
                    "insigne_id": ok.insigne.insigne_id,
                    "status": ok.insigne.status,
                    "motto_latin": ok.insigne.motto_latin,
                    "report_text": ok.insigne.report_text,
                }),
            ),
            Err(refuse) => (
                refuse_status(refuse.reason_code),
                error_body("Not found", refuse.detail),
            ),
        }
    }

    pub fn lookup(&self, submission_id: &str) -> (u16, Value) {
        if submission_id.trim().is_empty() {
            return (400, error_body("Missing submission_id", None));
        }
        match self.access.lookup_submission(&self.store, submission_id) {
            Ok(ok) => (200, json!({ "ok": true, "insigne_id": ok.insigne_id })),
            Err(refuse) => (
                refuse_status(refuse.reason_code),
                error_body("Not found", refuse.detail),
            ),
        }
    }

    pub fn admin_queue(&self) -> (u16, Value) {
        let items = self.access.approval_queue(&self.store);
        (200, json!({ "ok": true, "items": items }))
    }

    pub fn insigne_assets(&self, raw_insigne_id: &str) -> (u16, Value) {
        let insigne_id = match InsigneId::new(raw_insigne_id) {
            Ok(id) => id,
            Err(_) => return (400, error_body("Missing query param: id", None)),
        };
        let service_key = self.config.storage_service_key.clone().unwrap_or_default();
        match self
            .access
            .read_insigne_assets(&self.store, &insigne_id, &service_key, None)
        {
            Ok(ok) => (
                200,
                json!({
                    "ok": true,
                    "insigne_id": ok.insigne.insigne_id,
                    "status": ok.insigne.status,
                    "motto_latin": ok.insigne.motto_latin,
                    "assets": ok.assets,
                }),
            ),
            Err(refuse) => (
                refuse_status(refuse.reason_code),
                error_body("Insigne not found", refuse.detail),
            ),
        }
    }

    pub fn approve(&mut self, raw_insigne_id: &str) -> (u16, Value) {
        let insigne_id = match InsigneId::new(raw_insigne_id) {
            Ok(id) => id,
            Err(_) => return (400, error_body("Missing id", None)),
        };
        let req = match ApproveRequest::v1(now(), insigne_id) {
            Ok(r) => r,
            Err(_) => return (400, error_body("Missing id", None)),
        };
        match self.lifecycle.approve(&mut self.store, &req) {
            Ok(LifecycleResponse::Ok(_)) => (200, json!({ "ok": true })),
            Ok(LifecycleResponse::Refuse(refuse)) => (
                refuse_status(refuse.reason_code),
                error_body("approve refused", refuse.detail),
            ),
            Err(storage_err) => (500, storage_error_body(&storage_err)),
        }
    }

    pub fn deliver(&mut self, raw_insigne_id: &str) -> (u16, Value) {
        let Some(api_key) = self.config.resend_api_key.clone() else {
            return (
                500,
                error_body(
                    &format!("missing {}", ProviderSecretId::ResendApiKey.as_str()),
                    None,
                ),
            );
        };
        let insigne_id = match InsigneId::new(raw_insigne_id) {
            Ok(id) => id,
            Err(_) => return (400, error_body("Missing id", None)),
        };
        let req = match DeliverRequest::v1(now(), insigne_id) {
            Ok(r) => r,
            Err(_) => return (400, error_body("Missing id", None)),
        };
        match self.lifecycle.deliver(&mut self.store, &req, &api_key, None) {
            Ok(LifecycleResponse::Ok(_)) => (200, json!({ "ok": true })),
            Ok(LifecycleResponse::Refuse(refuse)) => (
                refuse_status(refuse.reason_code),
                error_body("deliver refused", refuse.detail),
            ),
            Err(storage_err) => (500, storage_error_body(&storage_err)),
        }
    }
}

fn now() -> UnixTimeMs {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    UnixTimeMs(ms)
}

fn error_body(error: &str, detail: Option<String>) -> Value {
    match detail {
        Some(detail) => json!({ "ok": false, "error": error, "detail": detail }),
        None => json!({ "ok": false, "error": error }),
    }
}

fn storage_error_body(err: &StorageError) -> Value {
    error_body("storage failure", Some(format!("{err:?}")))
}

/// Refusal reason codes map onto the HTTP taxonomy: validation 400, not
/// found 404, precondition 412, upstream provider failure 502.
fn refuse_status(reason_code: ReasonCodeId) -> u16 {
    match reason_code {
        ingress_codes::INGRESS_REFUSE_MISSING_SUBMISSION_ID
        | ingress_codes::INGRESS_REFUSE_INVALID_SUBMISSION_ID => 400,
        gen_codes::GEN_REFUSE_NOT_FOUND | gen_codes::GEN_REFUSE_NO_ANSWERS => 404,
        gen_codes::GEN_REFUSE_PROVIDER => 502,
        life_codes::LIFE_REFUSE_NOT_FOUND => 404,
        life_codes::LIFE_REFUSE_PRECONDITION => 412,
        life_codes::LIFE_REFUSE_DISPATCH_FAILED => 502,
        insigne_pipeline::access::reason_codes::ACCESS_REFUSE_NOT_FOUND => 404,
        _ => 500,
    }
}
