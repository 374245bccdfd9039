#![forbid(unsafe_code)]

use insigne_contracts::insigne::{EmailAddress, SubmissionId};
use insigne_contracts::webhook::{IngressOk, IngressRefuse, IngressRequest, IngressResponse};
use insigne_contracts::Validate;
use insigne_engines::normalize::NormalizerRuntime;
use insigne_engines::token::mint_access_token;
use insigne_storage::store::{InsigneStore, StorageError};

pub mod reason_codes {
    use insigne_contracts::ReasonCodeId;

    // Ingress reason-code namespace.
    pub const INGRESS_OK_CREATED: ReasonCodeId = ReasonCodeId(0x4947_0001);
    pub const INGRESS_OK_DEDUPED: ReasonCodeId = ReasonCodeId(0x4947_0002);

    pub const INGRESS_REFUSE_MISSING_SUBMISSION_ID: ReasonCodeId = ReasonCodeId(0x4947_00F1);
    pub const INGRESS_REFUSE_INVALID_SUBMISSION_ID: ReasonCodeId = ReasonCodeId(0x4947_00F2);
}

/// Webhook ingestion: normalize the payload, converge on at most one record
/// per submission id, and leave a `Draft` record ready for generation.
/// Delivery is at-least-once upstream, so every step here must tolerate
/// replays.
#[derive(Debug, Clone, Default)]
pub struct IngressRuntime {
    normalizer: NormalizerRuntime,
}

impl IngressRuntime {
    pub fn new(normalizer: NormalizerRuntime) -> Self {
        Self { normalizer }
    }

    pub fn run(
        &self,
        store: &mut InsigneStore,
        req: &IngressRequest,
    ) -> Result<IngressResponse, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        let normalized = self.normalizer.run(&req.raw_body);
        let Some(raw_submission_id) = normalized.submission_id else {
            return Ok(IngressResponse::Refuse(IngressRefuse {
                reason_code: reason_codes::INGRESS_REFUSE_MISSING_SUBMISSION_ID,
                detail: Some("no submission id found in payload".to_string()),
            }));
        };

        let submission_id = match SubmissionId::new(raw_submission_id) {
            Ok(id) => id,
            Err(_) => {
                return Ok(IngressResponse::Refuse(IngressRefuse {
                    reason_code: reason_codes::INGRESS_REFUSE_INVALID_SUBMISSION_ID,
                    detail: Some("submission id failed validation".to_string()),
                }))
            }
        };

        // Replayed deliveries short-circuit before any write.
        if let Some(existing) = store.find_insigne_by_submission(&submission_id) {
            let existing = existing.clone();
            return Ok(IngressResponse::Ok(IngressOk {
                reason_code: reason_codes::INGRESS_OK_DEDUPED,
                insigne_id: existing,
                submission_id: submission_id.as_str().to_string(),
                deduped: true,
            }));
        }

        // An email that fails its own contract is treated as absent rather
        // than failing the webhook.
        let client_email = normalized
            .client_email
            .and_then(|e| EmailAddress::new(e).ok());

        let insigne_id = store.create_insigne(
            req.now,
            mint_access_token(),
            client_email,
            reason_codes::INGRESS_OK_CREATED,
        )?;
        store.append_answers_row(&insigne_id, req.raw_body.clone(), req.now)?;

        // The unique-key upsert is the dedup authority: if a racing caller
        // got here first, both responses converge on its record.
        let winner = store.upsert_submission_lookup(submission_id.clone(), insigne_id.clone(), req.now)?;
        let deduped = winner != insigne_id;
        Ok(IngressResponse::Ok(IngressOk {
            reason_code: if deduped {
                reason_codes::INGRESS_OK_DEDUPED
            } else {
                reason_codes::INGRESS_OK_CREATED
            },
            insigne_id: winner,
            submission_id: submission_id.as_str().to_string(),
            deduped,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insigne_contracts::insigne::InsigneStatus;
    use insigne_contracts::UnixTimeMs;

    fn ingest(store: &mut InsigneStore, body: &str, at: u64) -> IngressResponse {
        let req = IngressRequest::v1(UnixTimeMs(at), body.to_string()).unwrap();
        IngressRuntime::default().run(store, &req).unwrap()
    }

    fn expect_ok(resp: IngressResponse) -> IngressOk {
        match resp {
            IngressResponse::Ok(ok) => ok,
            IngressResponse::Refuse(r) => panic!("unexpected refuse: {r:?}"),
        }
    }

    #[test]
    fn first_delivery_creates_a_draft_record_with_token() {
        let mut store = InsigneStore::new_in_memory();
        let ok = expect_ok(ingest(
            &mut store,
            r#"{"data":{"submissionId":"sub_1"}}"#,
            10,
        ));
        assert!(!ok.deduped);
        assert_eq!(ok.submission_id, "sub_1");

        let row = store.insigne_row(&ok.insigne_id).unwrap();
        assert_eq!(row.status, InsigneStatus::Draft);
        assert_eq!(row.access_token.as_ref().unwrap().as_str().len(), 48);
        assert!(store.latest_answers_row(&ok.insigne_id).is_some());
    }

    #[test]
    fn second_delivery_of_same_submission_dedups_to_one_record() {
        let mut store = InsigneStore::new_in_memory();
        let body = r#"{"data":{"submissionId":"sub_1"}}"#;
        let first = expect_ok(ingest(&mut store, body, 10));
        let second = expect_ok(ingest(&mut store, body, 20));

        assert!(!first.deduped);
        assert!(second.deduped);
        assert_eq!(first.insigne_id, second.insigne_id);
        assert_eq!(store.insigne_rows().len(), 1);
        assert_eq!(store.answers_rows().len(), 1);
        // The credential was minted exactly once.
        assert_eq!(
            store
                .insigne_row(&first.insigne_id)
                .unwrap()
                .access_token
                .as_ref()
                .unwrap(),
            store
                .insigne_row(&second.insigne_id)
                .unwrap()
                .access_token
                .as_ref()
                .unwrap()
        );
    }

    #[test]
    fn payload_without_submission_id_is_refused() {
        let mut store = InsigneStore::new_in_memory();
        let resp = ingest(&mut store, r#"{"event":"FORM_RESPONSE"}"#, 10);
        match resp {
            IngressResponse::Refuse(r) => assert_eq!(
                r.reason_code,
                reason_codes::INGRESS_REFUSE_MISSING_SUBMISSION_ID
            ),
            IngressResponse::Ok(_) => panic!("expected refuse"),
        }
        assert!(store.insigne_rows().is_empty());
        assert!(store.submission_lookup_rows().is_empty());
    }

    #[test]
    fn contact_email_is_captured_when_present_and_plausible() {
        let mut store = InsigneStore::new_in_memory();
        let body = r#"{
            "submission": {"id": "sub_mail"},
            "fields": [{"type": "email", "value": "client@example.com"}]
        }"#;
        let ok = expect_ok(ingest(&mut store, body, 10));
        assert_eq!(
            store
                .insigne_row(&ok.insigne_id)
                .unwrap()
                .client_email
                .as_ref()
                .unwrap()
                .as_str(),
            "client@example.com"
        );
    }

    #[test]
    fn raw_body_is_stored_verbatim_as_answers_payload() {
        let mut store = InsigneStore::new_in_memory();
        let body = r#"{"id":"sub_raw","answers":{"q1":"blue"}}"#;
        let ok = expect_ok(ingest(&mut store, body, 10));
        assert_eq!(
            store.latest_answers_row(&ok.insigne_id).unwrap().payload_json,
            body
        );
    }

    #[test]
    fn distinct_submissions_create_distinct_records() {
        let mut store = InsigneStore::new_in_memory();
        let a = expect_ok(ingest(&mut store, r#"{"id":"sub_a"}"#, 10));
        let b = expect_ok(ingest(&mut store, r#"{"id":"sub_b"}"#, 11));
        assert_ne!(a.insigne_id, b.insigne_id);
        assert_eq!(store.insigne_rows().len(), 2);
    }
}
