#![forbid(unsafe_code)]

use crate::insigne::{InsigneId, InsigneStatus};
use crate::{ContractViolation, ReasonCodeId, SchemaVersion, UnixTimeMs, Validate};

pub const FORGE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// How the provider output was decoded into content fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeDecode {
    /// Strict JSON object with all three content fields.
    Structured,
    /// Output did not decode; the raw text was stored verbatim as the
    /// report and the mottoes were left empty.
    RawFallback,
}

/// Content produced by one forge call. Never constructed empty-handed: even
/// a malformed provider reply yields a `RawFallback` carrying the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeOutput {
    pub report_text: String,
    pub motto_english: String,
    pub motto_latin: String,
    pub decode: ForgeDecode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub schema_version: SchemaVersion,
    pub now: UnixTimeMs,
    pub insigne_id: InsigneId,
}

impl GenerationRequest {
    pub fn v1(now: UnixTimeMs, insigne_id: InsigneId) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: FORGE_CONTRACT_VERSION,
            now,
            insigne_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for GenerationRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.insigne_id.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOk {
    pub reason_code: ReasonCodeId,
    pub insigne_id: InsigneId,
    pub status: InsigneStatus,
    /// `None` when this call was an idempotent no-op (generation already
    /// claimed or completed by another caller).
    pub decode: Option<ForgeDecode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRefuse {
    pub reason_code: ReasonCodeId,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResponse {
    Ok(GenerationOk),
    Refuse(GenerationRefuse),
}
