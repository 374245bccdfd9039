#![forbid(unsafe_code)]

use insigne_contracts::forge::{
    GenerationOk, GenerationRefuse, GenerationRequest, GenerationResponse,
};
use insigne_contracts::insigne::InsigneStatus;
use insigne_contracts::Validate;
use insigne_engines::forge::ForgeRuntime;
use insigne_storage::store::{GenerationClaim, InsigneStore, StorageError};

pub mod reason_codes {
    use insigne_contracts::ReasonCodeId;

    // Generation reason-code namespace.
    pub const GEN_OK_FORGED: ReasonCodeId = ReasonCodeId(0x4745_0001);
    pub const GEN_OK_ALREADY_CLAIMED: ReasonCodeId = ReasonCodeId(0x4745_0002);
    pub const GEN_CLAIM_GRANTED: ReasonCodeId = ReasonCodeId(0x4745_0003);
    pub const GEN_CLAIM_RELEASED: ReasonCodeId = ReasonCodeId(0x4745_0004);

    pub const GEN_REFUSE_NOT_FOUND: ReasonCodeId = ReasonCodeId(0x4745_00F1);
    pub const GEN_REFUSE_NO_ANSWERS: ReasonCodeId = ReasonCodeId(0x4745_00F2);
    pub const GEN_REFUSE_PROVIDER: ReasonCodeId = ReasonCodeId(0x4745_00F3);
}

/// Drives one record through the generation step. The status field is the
/// mutex: the store's compare-and-set claim decides a single winner among
/// concurrent triggers, and a provider failure releases the claim so a
/// later trigger can retry.
#[derive(Debug, Clone)]
pub struct GenerationRuntime {
    forge: ForgeRuntime,
}

impl GenerationRuntime {
    pub fn new(forge: ForgeRuntime) -> Self {
        Self { forge }
    }

    /// `fixture_json` stands in for the provider response body in tests.
    pub fn run(
        &self,
        store: &mut InsigneStore,
        req: &GenerationRequest,
        api_key: &str,
        fixture_json: Option<&str>,
    ) -> Result<GenerationResponse, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        if store.insigne_row(&req.insigne_id).is_none() {
            return Ok(GenerationResponse::Refuse(GenerationRefuse {
                reason_code: reason_codes::GEN_REFUSE_NOT_FOUND,
                detail: Some("unknown insigne id".to_string()),
            }));
        }
        let Some(answers_payload) = store
            .latest_answers_row(&req.insigne_id)
            .map(|a| a.payload_json.clone())
        else {
            return Ok(GenerationResponse::Refuse(GenerationRefuse {
                reason_code: reason_codes::GEN_REFUSE_NO_ANSWERS,
                detail: Some("no answers payload recorded".to_string()),
            }));
        };

        match store.claim_generation(&req.insigne_id, req.now, reason_codes::GEN_CLAIM_GRANTED)? {
            GenerationClaim::AlreadyClaimed(status) => {
                // A concurrent or earlier trigger owns this record; replay
                // is an idempotent success with nothing regenerated.
                Ok(GenerationResponse::Ok(GenerationOk {
                    reason_code: reason_codes::GEN_OK_ALREADY_CLAIMED,
                    insigne_id: req.insigne_id.clone(),
                    status,
                    decode: None,
                }))
            }
            GenerationClaim::Claimed => match self.forge.run(api_key, &answers_payload, fixture_json)
            {
                Err(provider_err) => {
                    store.release_generation_claim(
                        &req.insigne_id,
                        req.now,
                        reason_codes::GEN_CLAIM_RELEASED,
                    )?;
                    Ok(GenerationResponse::Refuse(GenerationRefuse {
                        reason_code: reason_codes::GEN_REFUSE_PROVIDER,
                        detail: Some(provider_err.safe_detail()),
                    }))
                }
                Ok(output) => {
                    store.store_generation_output(
                        &req.insigne_id,
                        output.report_text,
                        output.motto_english,
                        output.motto_latin,
                        req.now,
                        reason_codes::GEN_OK_FORGED,
                    )?;
                    let status = store
                        .insigne_row(&req.insigne_id)
                        .map(|r| r.status)
                        .unwrap_or(InsigneStatus::AwaitingApproval);
                    Ok(GenerationResponse::Ok(GenerationOk {
                        reason_code: reason_codes::GEN_OK_FORGED,
                        insigne_id: req.insigne_id.clone(),
                        status,
                        decode: Some(output.decode),
                    }))
                }
            },
        }
    }
}
