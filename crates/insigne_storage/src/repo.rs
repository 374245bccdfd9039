#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use insigne_contracts::asset::{AssetType, StoragePath};
use insigne_contracts::insigne::{
    AccessToken, EmailAddress, InsigneId, InsigneStatus, SubmissionId,
};
use insigne_contracts::{ReasonCodeId, UnixTimeMs};

use crate::store::{
    AnswersRecord, AssetRecord, GenerationClaim, InsigneRecord, InsigneStore, StatusApply,
    StatusLedgerRow, StorageError, SubmissionLookupRecord,
};

/// Typed repository interface for the report-record lifecycle tables.
pub trait InsigneLifecycleRepo {
    fn create_insigne(
        &mut self,
        now: UnixTimeMs,
        access_token: AccessToken,
        client_email: Option<EmailAddress>,
        reason_code: ReasonCodeId,
    ) -> Result<InsigneId, StorageError>;
    fn insigne_row(&self, insigne_id: &InsigneId) -> Option<&InsigneRecord>;
    fn claim_generation(
        &mut self,
        insigne_id: &InsigneId,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<GenerationClaim, StorageError>;
    fn release_generation_claim(
        &mut self,
        insigne_id: &InsigneId,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<StatusApply, StorageError>;
    fn store_generation_output(
        &mut self,
        insigne_id: &InsigneId,
        report_text: String,
        motto_english: String,
        motto_latin: String,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<StatusApply, StorageError>;
    fn apply_status(
        &mut self,
        insigne_id: &InsigneId,
        target: InsigneStatus,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<StatusApply, StorageError>;
    fn find_insigne_by_token(&self, token: &str) -> Option<&InsigneRecord>;
    fn latest_insigne(&self) -> Option<&InsigneRecord>;
    fn awaiting_approval_rows(&self) -> Vec<&InsigneRecord>;
    fn status_ledger_rows(&self) -> &[StatusLedgerRow];
}

/// Typed repository interface for the submission dedup table.
pub trait SubmissionDedupRepo {
    fn upsert_submission_lookup(
        &mut self,
        submission_id: SubmissionId,
        insigne_id: InsigneId,
        now: UnixTimeMs,
    ) -> Result<InsigneId, StorageError>;
    fn find_insigne_by_submission(&self, submission_id: &SubmissionId) -> Option<&InsigneId>;
    fn submission_lookup_rows(&self) -> &BTreeMap<SubmissionId, SubmissionLookupRecord>;
}

/// Typed repository interface for the append-only answers table.
pub trait AnswersRepo {
    fn append_answers_row(
        &mut self,
        insigne_id: &InsigneId,
        payload_json: String,
        now: UnixTimeMs,
    ) -> Result<u64, StorageError>;
    fn latest_answers_row(&self, insigne_id: &InsigneId) -> Option<&AnswersRecord>;
    fn answers_rows(&self) -> &[AnswersRecord];
}

/// Typed repository interface for the externally-ingested asset table.
pub trait AssetRepo {
    fn insert_asset_row(
        &mut self,
        insigne_id: &InsigneId,
        asset_type: Option<AssetType>,
        storage_path: StoragePath,
        now: UnixTimeMs,
    ) -> Result<u64, StorageError>;
    fn assets_for_insigne(&self, insigne_id: &InsigneId) -> Vec<&AssetRecord>;
}

impl InsigneLifecycleRepo for InsigneStore {
    fn create_insigne(
        &mut self,
        now: UnixTimeMs,
        access_token: AccessToken,
        client_email: Option<EmailAddress>,
        reason_code: ReasonCodeId,
    ) -> Result<InsigneId, StorageError> {
        InsigneStore::create_insigne(self, now, access_token, client_email, reason_code)
    }

    fn insigne_row(&self, insigne_id: &InsigneId) -> Option<&InsigneRecord> {
        InsigneStore::insigne_row(self, insigne_id)
    }

    fn claim_generation(
        &mut self,
        insigne_id: &InsigneId,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<GenerationClaim, StorageError> {
        InsigneStore::claim_generation(self, insigne_id, now, reason_code)
    }

    fn release_generation_claim(
        &mut self,
        insigne_id: &InsigneId,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<StatusApply, StorageError> {
        InsigneStore::release_generation_claim(self, insigne_id, now, reason_code)
    }

    fn store_generation_output(
        &mut self,
        insigne_id: &InsigneId,
        report_text: String,
        motto_english: String,
        motto_latin: String,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<StatusApply, StorageError> {
        InsigneStore::store_generation_output(
            self,
            insigne_id,
            report_text,
            motto_english,
            motto_latin,
            now,
            reason_code,
        )
    }

    fn apply_status(
        &mut self,
        insigne_id: &InsigneId,
        target: InsigneStatus,
        now: UnixTimeMs,
        reason_code: ReasonCodeId,
    ) -> Result<StatusApply, StorageError> {
        InsigneStore::apply_status(self, insigne_id, target, now, reason_code)
    }

    fn find_insigne_by_token(&self, token: &str) -> Option<&InsigneRecord> {
        InsigneStore::find_insigne_by_token(self, token)
    }

    fn latest_insigne(&self) -> Option<&InsigneRecord> {
        InsigneStore::latest_insigne(self)
    }

    fn awaiting_approval_rows(&self) -> Vec<&InsigneRecord> {
        InsigneStore::awaiting_approval_rows(self)
    }

    fn status_ledger_rows(&self) -> &[StatusLedgerRow] {
        InsigneStore::status_ledger_rows(self)
    }
}

impl SubmissionDedupRepo for InsigneStore {
    fn upsert_submission_lookup(
        &mut self,
        submission_id: SubmissionId,
        insigne_id: InsigneId,
        now: UnixTimeMs,
    ) -> Result<InsigneId, StorageError> {
        InsigneStore::upsert_submission_lookup(self, submission_id, insigne_id, now)
    }

    fn find_insigne_by_submission(&self, submission_id: &SubmissionId) -> Option<&InsigneId> {
        InsigneStore::find_insigne_by_submission(self, submission_id)
    }

    fn submission_lookup_rows(&self) -> &BTreeMap<SubmissionId, SubmissionLookupRecord> {
        InsigneStore::submission_lookup_rows(self)
    }
}

impl AnswersRepo for InsigneStore {
    fn append_answers_row(
        &mut self,
        insigne_id: &InsigneId,
        payload_json: String,
        now: UnixTimeMs,
    ) -> Result<u64, StorageError> {
        InsigneStore::append_answers_row(self, insigne_id, payload_json, now)
    }

    fn latest_answers_row(&self, insigne_id: &InsigneId) -> Option<&AnswersRecord> {
        InsigneStore::latest_answers_row(self, insigne_id)
    }

    fn answers_rows(&self) -> &[AnswersRecord] {
        InsigneStore::answers_rows(self)
    }
}

impl AssetRepo for InsigneStore {
    fn insert_asset_row(
        &mut self,
        insigne_id: &InsigneId,
        asset_type: Option<AssetType>,
        storage_path: StoragePath,
        now: UnixTimeMs,
    ) -> Result<u64, StorageError> {
        InsigneStore::insert_asset_row(self, insigne_id, asset_type, storage_path, now)
    }

    fn assets_for_insigne(&self, insigne_id: &InsigneId) -> Vec<&AssetRecord> {
        InsigneStore::assets_for_insigne(self, insigne_id)
    }
}
