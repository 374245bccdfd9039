#![forbid(unsafe_code)]

use crate::{ContractViolation, SchemaVersion, Validate};

pub const ASSET_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Signed retrieval URLs expire after this many seconds unless the caller
/// asks otherwise.
pub const DEFAULT_SIGNED_URL_TTL_SECONDS: u32 = 900;

/// Bounds accepted for a caller-supplied TTL.
pub const MIN_SIGNED_URL_TTL_SECONDS: u32 = 30;
pub const MAX_SIGNED_URL_TTL_SECONDS: u32 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetType(String);

impl AssetType {
    pub fn new(t: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(t.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for AssetType {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "asset_type",
                reason: "must not be empty",
            });
        }
        if self.0.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "asset_type",
                reason: "must be <= 64 chars",
            });
        }
        Ok(())
    }
}

/// Path of a stored object inside the configured bucket. An empty path is
/// representable at the store layer (external ingestion writes these rows)
/// and surfaces as a per-asset signing error.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn new(p: impl Into<String>) -> Self {
        Self(p.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// One asset's signing result. Exactly one of `signed_url` /
/// `signed_url_error` is set; a failed sibling never suppresses this entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignedAssetLink {
    pub asset_type: Option<String>,
    pub storage_path: Option<String>,
    pub signed_url: Option<String>,
    pub signed_url_error: Option<String>,
}
