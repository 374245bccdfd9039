#![forbid(unsafe_code)]

use crate::insigne::{InsigneId, InsigneStatus};
use crate::{ContractViolation, ReasonCodeId, SchemaVersion, UnixTimeMs, Validate};

pub const DELIVERY_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveRequest {
    pub schema_version: SchemaVersion,
    pub now: UnixTimeMs,
    pub insigne_id: InsigneId,
}

impl ApproveRequest {
    pub fn v1(now: UnixTimeMs, insigne_id: InsigneId) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: DELIVERY_CONTRACT_VERSION,
            now,
            insigne_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for ApproveRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.insigne_id.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverRequest {
    pub schema_version: SchemaVersion,
    pub now: UnixTimeMs,
    pub insigne_id: InsigneId,
}

impl DeliverRequest {
    pub fn v1(now: UnixTimeMs, insigne_id: InsigneId) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: DELIVERY_CONTRACT_VERSION,
            now,
            insigne_id,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for DeliverRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.insigne_id.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOk {
    pub reason_code: ReasonCodeId,
    pub insigne_id: InsigneId,
    pub status: InsigneStatus,
    /// True when the record was already at or past the requested state and
    /// nothing was re-applied (and, for delivery, no second email was sent).
    pub noop: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleRefuse {
    pub reason_code: ReasonCodeId,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleResponse {
    Ok(LifecycleOk),
    Refuse(LifecycleRefuse),
}
