#![forbid(unsafe_code)]

use crate::insigne::InsigneId;
use crate::{ContractViolation, ReasonCodeId, SchemaVersion, UnixTimeMs, Validate};

pub const WEBHOOK_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Inbound webhook bodies above this size are refused before normalization.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 1_048_576;

/// Output of the payload normalizer. Both fields degrade to `None` rather
/// than erroring; the ingress decides which absences are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedSubmission {
    pub submission_id: Option<String>,
    pub client_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRequest {
    pub schema_version: SchemaVersion,
    pub now: UnixTimeMs,
    /// Raw request body, stored verbatim as the answers payload on create.
    pub raw_body: String,
}

impl IngressRequest {
    pub fn v1(now: UnixTimeMs, raw_body: String) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: WEBHOOK_CONTRACT_VERSION,
            now,
            raw_body,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for IngressRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.raw_body.len() > MAX_WEBHOOK_BODY_BYTES {
            return Err(ContractViolation::InvalidRange {
                field: "raw_body",
                min: 0,
                max: MAX_WEBHOOK_BODY_BYTES as u64,
                got: self.raw_body.len() as u64,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressOk {
    pub reason_code: ReasonCodeId,
    pub insigne_id: InsigneId,
    pub submission_id: String,
    /// True when the submission id already had a mapping and no new record
    /// was created; the webhook sender sees the same shape either way.
    pub deduped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRefuse {
    pub reason_code: ReasonCodeId,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressResponse {
    Ok(IngressOk),
    Refuse(IngressRefuse),
}
