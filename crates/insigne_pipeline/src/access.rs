#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use insigne_contracts::access::{
    AccessRefuse, AssetReadOk, LatestReadOk, LookupOk, QueueEntry, TokenReadOk,
};
use insigne_contracts::asset::SignedAssetLink;
use insigne_contracts::insigne::{InsigneId, InsigneSnapshot, SubmissionId};
use insigne_engines::signer::SignerRuntime;
use insigne_storage::store::{InsigneRecord, InsigneStore};

pub mod reason_codes {
    use insigne_contracts::ReasonCodeId;

    // Access reason-code namespace.
    pub const ACCESS_OK_TOKEN_READ: ReasonCodeId = ReasonCodeId(0x4143_0001);
    pub const ACCESS_OK_LATEST_READ: ReasonCodeId = ReasonCodeId(0x4143_0002);
    pub const ACCESS_OK_LOOKUP: ReasonCodeId = ReasonCodeId(0x4143_0003);
    pub const ACCESS_OK_ASSET_READ: ReasonCodeId = ReasonCodeId(0x4143_0004);

    pub const ACCESS_REFUSE_NOT_FOUND: ReasonCodeId = ReasonCodeId(0x4143_00F1);
}

/// Per-path signing fixtures for tests: storage_path -> provider body.
pub type SignerFixtures = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessConfig {
    pub signed_url_ttl_seconds: u32,
}

impl AccessConfig {
    pub fn mvp_v1() -> Self {
        Self {
            signed_url_ttl_seconds: insigne_contracts::asset::DEFAULT_SIGNED_URL_TTL_SECONDS,
        }
    }
}

/// Read paths. The adapter authorizes the caller (bearer token or operator
/// secret) before any method here runs; this runtime only resolves records
/// and issues signed links.
#[derive(Debug, Clone)]
pub struct AccessRuntime {
    config: AccessConfig,
    signer: SignerRuntime,
}

impl AccessRuntime {
    pub fn new(config: AccessConfig, signer: SignerRuntime) -> Self {
        Self { config, signer }
    }

    pub fn read_by_token(
        &self,
        store: &InsigneStore,
        token: &str,
        service_key: &str,
        fixtures: Option<&SignerFixtures>,
    ) -> Result<TokenReadOk, AccessRefuse> {
        let Some(record) = store.find_insigne_by_token(token) else {
            return Err(AccessRefuse {
                reason_code: reason_codes::ACCESS_REFUSE_NOT_FOUND,
                detail: None,
            });
        };
        let insigne_id = record.insigne_id.clone();
        let insigne = snapshot(record);
        let assets = self.issue_signed_links(store, &insigne_id, service_key, fixtures);
        Ok(TokenReadOk {
            reason_code: reason_codes::ACCESS_OK_TOKEN_READ,
            insigne,
            assets,
        })
    }

    pub fn read_latest(&self, store: &InsigneStore) -> Result<LatestReadOk, AccessRefuse> {
        match store.latest_insigne() {
            Some(record) => Ok(LatestReadOk {
                reason_code: reason_codes::ACCESS_OK_LATEST_READ,
                insigne: snapshot(record),
            }),
            None => Err(AccessRefuse {
                reason_code: reason_codes::ACCESS_REFUSE_NOT_FOUND,
                detail: None,
            }),
        }
    }

    /// Records waiting on the operator, oldest first.
    pub fn approval_queue(&self, store: &InsigneStore) -> Vec<QueueEntry> {
        store
            .awaiting_approval_rows()
            .into_iter()
            .map(|r| QueueEntry {
                insigne_id: r.insigne_id.as_str().to_string(),
                client_email: r.client_email.as_ref().map(|e| e.as_str().to_string()),
                status: r.status.as_str().to_string(),
                motto_latin: r.motto_latin.clone(),
                created_at_ms: r.created_at.0,
            })
            .collect()
    }

    pub fn lookup_submission(
        &self,
        store: &InsigneStore,
        raw_submission_id: &str,
    ) -> Result<LookupOk, AccessRefuse> {
        let not_found = || AccessRefuse {
            reason_code: reason_codes::ACCESS_REFUSE_NOT_FOUND,
            detail: None,
        };
        let submission_id = SubmissionId::new(raw_submission_id).map_err(|_| not_found())?;
        match store.find_insigne_by_submission(&submission_id) {
            Some(insigne_id) => Ok(LookupOk {
                reason_code: reason_codes::ACCESS_OK_LOOKUP,
                insigne_id: insigne_id.as_str().to_string(),
            }),
            None => Err(not_found()),
        }
    }

    /// Operator read of one record's assets by id.
    pub fn read_insigne_assets(
        &self,
        store: &InsigneStore,
        insigne_id: &InsigneId,
        service_key: &str,
        fixtures: Option<&SignerFixtures>,
    ) -> Result<AssetReadOk, AccessRefuse> {
        let Some(record) = store.insigne_row(insigne_id) else {
            return Err(AccessRefuse {
                reason_code: reason_codes::ACCESS_REFUSE_NOT_FOUND,
                detail: None,
            });
        };
        let insigne = snapshot(record);
        let assets = self.issue_signed_links(store, insigne_id, service_key, fixtures);
        Ok(AssetReadOk {
            reason_code: reason_codes::ACCESS_OK_ASSET_READ,
            insigne,
            assets,
        })
    }

    /// One signing request per asset, issued concurrently (fan-out equals
    /// the asset count) and joined before returning. Failures stay inside
    /// their own entry; results are paired to assets in insertion order and
    /// never dropped.
    fn issue_signed_links(
        &self,
        store: &InsigneStore,
        insigne_id: &InsigneId,
        service_key: &str,
        fixtures: Option<&SignerFixtures>,
    ) -> Vec<SignedAssetLink> {
        let assets = store.assets_for_insigne(insigne_id);
        std::thread::scope(|scope| {
            let handles: Vec<_> = assets
                .iter()
                .map(|asset| {
                    let asset_type = asset.asset_type.as_ref().map(|t| t.as_str().to_string());
                    let storage_path = asset.storage_path.as_str().to_string();
                    let missing_path = asset.storage_path.is_empty();
                    let handle = scope.spawn({
                        let asset_type = asset_type.clone();
                        let storage_path = storage_path.clone();
                        move || {
                            self.sign_one(asset_type, storage_path, missing_path, service_key, fixtures)
                        }
                    });
                    (asset_type, storage_path, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(asset_type, storage_path, handle)| {
                    handle.join().unwrap_or_else(|_| SignedAssetLink {
                        asset_type,
                        storage_path: Some(storage_path),
                        signed_url: None,
                        signed_url_error: Some("signing task panicked".to_string()),
                    })
                })
                .collect()
        })
    }

    fn sign_one(
        &self,
        asset_type: Option<String>,
        storage_path: String,
        missing_path: bool,
        service_key: &str,
        fixtures: Option<&SignerFixtures>,
    ) -> SignedAssetLink {
        if missing_path {
            return SignedAssetLink {
                asset_type,
                storage_path: None,
                signed_url: None,
                signed_url_error: Some("missing storage_path".to_string()),
            };
        }
        let fixture = fixtures
            .and_then(|m| m.get(&storage_path))
            .map(String::as_str);
        match self.signer.run(
            service_key,
            &storage_path,
            self.config.signed_url_ttl_seconds,
            fixture,
        ) {
            Ok(url) => SignedAssetLink {
                asset_type,
                storage_path: Some(storage_path),
                signed_url: Some(url),
                signed_url_error: None,
            },
            Err(err) => SignedAssetLink {
                asset_type,
                storage_path: Some(storage_path),
                signed_url: None,
                signed_url_error: Some(err.safe_detail()),
            },
        }
    }
}

fn snapshot(record: &InsigneRecord) -> InsigneSnapshot {
    InsigneSnapshot {
        insigne_id: record.insigne_id.as_str().to_string(),
        status: record.status.as_str().to_string(),
        motto_latin: record.motto_latin.clone(),
        report_text: record.report_text.clone(),
    }
}
