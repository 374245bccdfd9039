#![forbid(unsafe_code)]

use crate::asset::SignedAssetLink;
use crate::insigne::InsigneSnapshot;
use crate::{ReasonCodeId, SchemaVersion};

pub const ACCESS_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenReadOk {
    pub reason_code: ReasonCodeId,
    pub insigne: InsigneSnapshot,
    pub assets: Vec<SignedAssetLink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestReadOk {
    pub reason_code: ReasonCodeId,
    pub insigne: InsigneSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueueEntry {
    pub insigne_id: String,
    pub client_email: Option<String>,
    pub status: String,
    pub motto_latin: Option<String>,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReadOk {
    pub reason_code: ReasonCodeId,
    pub insigne: InsigneSnapshot,
    pub assets: Vec<SignedAssetLink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOk {
    pub reason_code: ReasonCodeId,
    pub insigne_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRefuse {
    pub reason_code: ReasonCodeId,
    pub detail: Option<String>,
}
