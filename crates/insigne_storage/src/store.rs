#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use insigne_contracts::asset::{AssetType, StoragePath};
use insigne_contracts::insigne::{
    AccessToken, EmailAddress, InsigneId, InsigneStatus, SubmissionId,
};
use insigne_contracts::{ContractViolation, ReasonCodeId, UnixTimeMs, Validate};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ForeignKeyViolation { table: &'static str, key: String },
    DuplicateKey { table: &'static str, key: String },
    AppendOnlyViolation { table: &'static str },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    let digest = h.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Current-state row for one report record. `access_token` and
/// `client_email` are write-once at creation; content fields are written
/// only by the generation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsigneRecord {
    pub insigne_id: InsigneId,
    pub seq: u64,
    pub status: InsigneStatus,
    pub access_token: Option<AccessToken>,
    pub client_email: Option<EmailAddress>,
    pub report_text: Option<String>,
    pub motto_english: Option<String>,
    pub motto_latin: Option<String>,
    pub created_at: UnixTimeMs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionLookupRecord {
    pub submission_id: SubmissionId,
    pub insigne_id: InsigneId,
    pub created_at: UnixTimeMs,
}

/// Append-only raw questionnaire payload row. Multiple rows may exist per
/// record; readers take the most recently created one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswersRecord {
    pub seq: u64,
    pub insigne_id: InsigneId,
    pub payload_json: String,
    pub payload_sha256: String,
    pub created_at: UnixTimeMs,
}

/// Stored-object reference row. Written by an external ingestion step; this
/// core only reads them to issue signed URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub seq: u64,
    pub insigne_id: InsigneId,
    pub asset_type: Option<AssetType>,
    pub storage_path: StoragePath,
    pub created_at: UnixTimeMs,
}

/// Append-only status transition proof row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLedgerRow {
    pub seq: u64,
    pub insigne_id: InsigneId,
    pub from: Option<InsigneStatus>,
    pub to: InsigneStatus,
    pub reason_code: ReasonCodeId,
    pub at: UnixTimeMs,
}

/// Outcome of the generation claim compare-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationClaim {
    /// This caller moved the record `Draft -> Generating`.
    Claimed,
    /// Another caller holds (or finished) the claim; no state was touched.
    AlreadyClaimed(InsigneStatus),
}

/// Outcome of a monotonic status application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusApply {
    Advanced,
    /// The record was already at or past the target state.
    Noop,
}

/// In-memory reference implementation of the durable-store contract:
/// BTreeMap current-state tables plus append-only ledgers. Correctness
/// under duplicate requests comes from the unique-key semantics here, not
/// from in-process locks.
#[derive(Debug, Clone, Default)]
pub struct InsigneStore {
    insignes: BTreeMap<InsigneId, InsigneRecord>,
    next_insigne_seq: u64,

    // Dedup table: at most one row per submission_id, ever.
    submission_lookup: BTreeMap<SubmissionId, SubmissionLookupRecord>,

    answers: Vec<AnswersRecord>,
    next_answers_seq: u64,

    assets: Vec<AssetRecord>,
    next_asset_seq: u64,

    status_ledger: Vec<StatusLedgerRow>,
}

impl InsigneStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    /// Creates one record in `Draft` with its write-once credential and
    /// contact. The id is minted here and never reused.
    pub fn create_insigne(
        &mut self,
        now: UnixTimeMs,
        access_token: AccessToken,
        client_email: Option<EmailAddress>,
        reason_code: ReasonCodeId,
    ) -> Result<InsigneId, StorageError> {
        access_token.validate()?;
        if let Some(email) = &client_email {
            email.validate()?;
        }
        let seq = self.next_insigne_seq;
        self.next_insigne_seq += 1;
        let insigne_id = InsigneId::new(format!("ins_{seq:08x}"))?;
        let record = InsigneRecord {
            insigne_id: insigne_id.clone(),
            seq,
            status: InsigneStatus::Draft,
            access_token: Some(access_token),
            client_email,
            report_text: None,
            motto_english: None,
            motto_latin: None,
            created_at: now,
        };
        if self.insignes.insert(insigne_id.clone(), record).is_some() {
            return Err(StorageError::DuplicateKey {
                table: "insignes",
                key: insigne_id.as_str().to_string(),
            });
        }
        self.append_status_ledger_row(&insigne_id, None, InsigneStatus::Draft, reason_code, now);
        Ok(insigne_id)
    }

    pub fn insigne_row(&self, insigne_id: &InsigneId) -> Option<&InsigneRecord> {
        self.insignes.get(insigne_id)
    }

    pub fn insigne_rows(&self) -> &BTreeMap<InsigneId, InsigneRecord> {
        &self.insignes
    }

    /// Create-or-return keyed by `submission_id`. Concurrent writers with
    /// the same key converge on the first winner; the winner's insigne id
    /// is returned either way and no error is raised on replay.
    pub fn upsert_submission_lookup(
        &mut self,
        submission_id: SubmissionId,
        insigne_id: InsigneId,
        now: UnixTimeMs,
    ) -> Result<InsigneId, StorageError> {
        submission_id.validate()?;
        if !self.insignes.contains_key(&insigne_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "submission_lookup",
                key: insigne_id.as_str().to_string(),
            });
        }
        if let Some(existing) = self.submission_lookup.get(&submission_id) {
            return Ok(existing.insigne_id.clone());
        }
        self.submission_lookup.insert(
            submission_id.clone(),
            SubmissionLookupRecord {
                submission_id,
                insigne_id: insigne_id.clone(),
                created_at: now,
            },
        );
        Ok(insigne_id)
    }

    pub fn find_insigne_by_submission(&self, submission_id: &SubmissionId) -> Option<&InsigneId> {
        self.submission_lookup
            .get(submission_id)
            .map(|r| &r.insigne_id)
    }

    pub fn submission_lookup_rows(&self) -> &BTreeMap<SubmissionId, SubmissionLookupRecord> {
        &self.submission_lookup
    }

    pub fn append_answers_row(
        &mut self,
        insigne_id: &InsigneId,
        payload_json: String,
        now: UnixTimeMs,
    ) -> Result<u64, StorageError> {
        if !self.insignes.contains_key(insigne_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "answers",
                key: insigne_id.as_str().to_string(),
            });
        }
        let seq = self.next_answers_seq;
        self.next_answers_seq += 1;
        let payload_sha256 = sha256_hex(payload_json.as_bytes());
        self.answers.push(AnswersRecord {
            seq,
            insigne_id: insigne_id.clone(),
            payload_json,
            payload_sha256,
            created_at: now,
        });
        Ok(seq)
    }

    /// Most recently created answers row for the record; `created_at` wins,
    /// insertion sequence breaks ties.
    pub fn latest_answers_row(&self, insigne_id: &InsigneId) -> Option<&AnswersRecord> {
        self.answers
            .iter()
            .filter(|a| &a.insigne_id == insigne_id)
            .max_by_key(|a| (a.created_at, a.seq))
    }

    pub fn answers_rows(&self) -> &[AnswersRecord] {
        &self.answers
    }

    pub fn insert_asset_row(
        &mut self,
        insigne_id: &InsigneId,
        asset_type: Option<AssetType>,
        storage_path: StoragePath,
        now: UnixTimeMs,
    ) -> Result<u64, StorageError> {
        if !self.insignes.contains_key(insigne_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "assets",
                key: insigne_id.as_str().to_string(),
            });
        }
        let seq = self.next_asset_seq;
        self.next_asset_seq += 1;
        self.assets.push(AssetRecord {
            seq,
            insigne_id: insigne_id.clone(),
            asset_type,
            storage_path,
            created_at: now,
        });
        Ok(seq)
    }

    /// Assets owned by the record, in insertion order. Signing results are
    /// re-paired against this order.
    pub fn assets_for_insigne(&self, insigne_id: &InsigneId) -> Vec<&AssetRecord> {
        self.assets
            .iter()
            .filter(|a| &a.insigne_id == insigne_id)
            .collect()
    }

    /// Compare-and-set claim of the generation step. Only a `Draft` record
    /// can be claimed; any other status means some caller already owns or
    /// finished generation, which is reported without touching state.
    pub fn claim_generation(
        &mut self,
        insigne_id: &InsigneId,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<GenerationClaim, StorageError> {
        let current = match self.insignes.get(insigne_id) {
            Some(r) => r.status,
            None => {
                return Err(StorageError::ForeignKeyViolation {
                    table: "insignes",
                    key: insigne_id.as_str().to_string(),
                })
            }
        };
        if current != InsigneStatus::Draft {
            return Ok(GenerationClaim::AlreadyClaimed(current));
        }
        if let Some(r) = self.insignes.get_mut(insigne_id) {
            r.status = InsigneStatus::Generating;
        }
        self.append_status_ledger_row(
            insigne_id,
            Some(current),
            InsigneStatus::Generating,
            reason_code,
            now,
        );
        Ok(GenerationClaim::Claimed)
    }

    /// Releases a held generation claim after a failed provider call so a
    /// later trigger can re-claim. Only `Generating -> Draft` is accepted;
    /// any other current status is left untouched.
    pub fn release_generation_claim(
        &mut self,
        insigne_id: &InsigneId,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<StatusApply, StorageError> {
        let current = match self.insignes.get(insigne_id) {
            Some(r) => r.status,
            None => {
                return Err(StorageError::ForeignKeyViolation {
                    table: "insignes",
                    key: insigne_id.as_str().to_string(),
                })
            }
        };
        if current != InsigneStatus::Generating {
            return Ok(StatusApply::Noop);
        }
        if let Some(r) = self.insignes.get_mut(insigne_id) {
            r.status = InsigneStatus::Draft;
        }
        self.append_status_ledger_row(
            insigne_id,
            Some(current),
            InsigneStatus::Draft,
            reason_code,
            now,
        );
        Ok(StatusApply::Advanced)
    }

    /// Persists the three generated content fields and advances the record
    /// to `AwaitingApproval` (monotonically; a record already past that
    /// state keeps its status).
    pub fn store_generation_output(
        &mut self,
        insigne_id: &InsigneId,
        report_text: String,
        motto_english: String,
        motto_latin: String,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<StatusApply, StorageError> {
        match self.insignes.get_mut(insigne_id) {
            Some(r) => {
                r.report_text = Some(report_text);
                r.motto_english = Some(motto_english);
                r.motto_latin = Some(motto_latin);
            }
            None => {
                return Err(StorageError::ForeignKeyViolation {
                    table: "insignes",
                    key: insigne_id.as_str().to_string(),
                })
            }
        }
        self.apply_status(insigne_id, InsigneStatus::AwaitingApproval, now, reason_code)
    }

    /// Monotonic-idempotent status application: a target at or below the
    /// current rank is a no-op success, never an error.
    pub fn apply_status(
        &mut self,
        insigne_id: &InsigneId,
        target: InsigneStatus,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<StatusApply, StorageError> {
        let current = match self.insignes.get(insigne_id) {
            Some(r) => r.status,
            None => {
                return Err(StorageError::ForeignKeyViolation {
                    table: "insignes",
                    key: insigne_id.as_str().to_string(),
                })
            }
        };
        if current.rank() >= target.rank() {
            return Ok(StatusApply::Noop);
        }
        if let Some(r) = self.insignes.get_mut(insigne_id) {
            r.status = target;
        }
        self.append_status_ledger_row(insigne_id, Some(current), target, reason_code, now);
        Ok(StatusApply::Advanced)
    }

    pub fn find_insigne_by_token(&self, token: &str) -> Option<&InsigneRecord> {
        if token.trim().is_empty() {
            return None;
        }
        self.insignes.values().find(|r| {
            r.access_token
                .as_ref()
                .is_some_and(|t| t.as_str() == token)
        })
    }

    /// Newest record by `created_at`, insertion sequence breaking ties.
    pub fn latest_insigne(&self) -> Option<&InsigneRecord> {
        self.insignes.values().max_by_key(|r| (r.created_at, r.seq))
    }

    /// Records awaiting the operator, oldest first.
    pub fn awaiting_approval_rows(&self) -> Vec<&InsigneRecord> {
        let mut rows: Vec<&InsigneRecord> = self
            .insignes
            .values()
            .filter(|r| r.status == InsigneStatus::AwaitingApproval)
            .collect();
        rows.sort_by_key(|r| (r.created_at, r.seq));
        rows
    }

    pub fn status_ledger_rows(&self) -> &[StatusLedgerRow] {
        &self.status_ledger
    }

    fn append_status_ledger_row(
        &mut self,
        insigne_id: &InsigneId,
        from: Option<InsigneStatus>,
        to: InsigneStatus,
        reason_code: ReasonCodeId,
        at: UnixTimeMs,
    ) {
        let seq = self.status_ledger.len() as u64;
        self.status_ledger.push(StatusLedgerRow {
            seq,
            insigne_id: insigne_id.clone(),
            from,
            to,
            reason_code,
            at,
        });
    }
}
