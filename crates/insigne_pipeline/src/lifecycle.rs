#![forbid(unsafe_code)]

use insigne_contracts::delivery::{
    ApproveRequest, DeliverRequest, LifecycleOk, LifecycleRefuse, LifecycleResponse,
};
use insigne_contracts::insigne::InsigneStatus;
use insigne_contracts::Validate;
use insigne_engines::mailer::MailerRuntime;
use insigne_storage::store::{InsigneStore, StatusApply, StorageError};

pub mod reason_codes {
    use insigne_contracts::ReasonCodeId;

    // Lifecycle-gate reason-code namespace.
    pub const LIFE_OK_APPROVED: ReasonCodeId = ReasonCodeId(0x4C46_0001);
    pub const LIFE_OK_APPROVE_NOOP: ReasonCodeId = ReasonCodeId(0x4C46_0002);
    pub const LIFE_OK_DELIVERED: ReasonCodeId = ReasonCodeId(0x4C46_0003);
    pub const LIFE_OK_DELIVER_NOOP: ReasonCodeId = ReasonCodeId(0x4C46_0004);

    pub const LIFE_REFUSE_NOT_FOUND: ReasonCodeId = ReasonCodeId(0x4C46_00F1);
    pub const LIFE_REFUSE_PRECONDITION: ReasonCodeId = ReasonCodeId(0x4C46_00F2);
    pub const LIFE_REFUSE_DISPATCH_FAILED: ReasonCodeId = ReasonCodeId(0x4C46_00F3);
}

pub const DELIVERY_EMAIL_SUBJECT: &str = "Your Insigne has been forged";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Owner-facing results page; the delivery link appends the token.
    pub results_base_url: String,
}

impl LifecycleConfig {
    pub fn mvp_v1() -> Self {
        Self {
            results_base_url: "https://insigne.example/results".to_string(),
        }
    }
}

/// Operator transitions: approval and delivery. Both are idempotent;
/// `Delivered` is only ever stamped after the notification went out.
#[derive(Debug, Clone)]
pub struct LifecycleRuntime {
    config: LifecycleConfig,
    mailer: MailerRuntime,
}

impl LifecycleRuntime {
    pub fn new(config: LifecycleConfig, mailer: MailerRuntime) -> Self {
        Self { config, mailer }
    }

    pub fn approve(
        &self,
        store: &mut InsigneStore,
        req: &ApproveRequest,
    ) -> Result<LifecycleResponse, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        if store.insigne_row(&req.insigne_id).is_none() {
            return Ok(LifecycleResponse::Refuse(LifecycleRefuse {
                reason_code: reason_codes::LIFE_REFUSE_NOT_FOUND,
                detail: Some("unknown insigne id".to_string()),
            }));
        }
        let applied = store.apply_status(
            &req.insigne_id,
            InsigneStatus::Approved,
            req.now,
            reason_codes::LIFE_OK_APPROVED,
        )?;
        let status = store
            .insigne_row(&req.insigne_id)
            .map(|r| r.status)
            .unwrap_or(InsigneStatus::Approved);
        let noop = applied == StatusApply::Noop;
        Ok(LifecycleResponse::Ok(LifecycleOk {
            reason_code: if noop {
                reason_codes::LIFE_OK_APPROVE_NOOP
            } else {
                reason_codes::LIFE_OK_APPROVED
            },
            insigne_id: req.insigne_id.clone(),
            status,
            noop,
        }))
    }

    /// `fixture_json` stands in for the mail provider response in tests.
    pub fn deliver(
        &self,
        store: &mut InsigneStore,
        req: &DeliverRequest,
        api_key: &str,
        fixture_json: Option<&str>,
    ) -> Result<LifecycleResponse, StorageError> {
        req.validate().map_err(StorageError::ContractViolation)?;

        let (status, token, email) = match store.insigne_row(&req.insigne_id) {
            Some(r) => (
                r.status,
                r.access_token.as_ref().map(|t| t.as_str().to_string()),
                r.client_email.as_ref().map(|e| e.as_str().to_string()),
            ),
            None => {
                return Ok(LifecycleResponse::Refuse(LifecycleRefuse {
                    reason_code: reason_codes::LIFE_REFUSE_NOT_FOUND,
                    detail: Some("unknown insigne id".to_string()),
                }))
            }
        };

        // A record already delivered stays delivered; no second email.
        if status == InsigneStatus::Delivered {
            return Ok(LifecycleResponse::Ok(LifecycleOk {
                reason_code: reason_codes::LIFE_OK_DELIVER_NOOP,
                insigne_id: req.insigne_id.clone(),
                status,
                noop: true,
            }));
        }

        let (Some(token), Some(email)) = (token, email) else {
            return Ok(LifecycleResponse::Refuse(LifecycleRefuse {
                reason_code: reason_codes::LIFE_REFUSE_PRECONDITION,
                detail: Some("access token and client email are both required".to_string()),
            }));
        };

        let link = self.retrieval_link(&token);
        let html = delivery_email_html(&link);
        if let Err(send_err) =
            self.mailer
                .run(api_key, &email, DELIVERY_EMAIL_SUBJECT, &html, fixture_json)
        {
            // Dispatch failed: the record keeps its current status.
            return Ok(LifecycleResponse::Refuse(LifecycleRefuse {
                reason_code: reason_codes::LIFE_REFUSE_DISPATCH_FAILED,
                detail: Some(send_err.safe_detail()),
            }));
        }

        store.apply_status(
            &req.insigne_id,
            InsigneStatus::Delivered,
            req.now,
            reason_codes::LIFE_OK_DELIVERED,
        )?;
        Ok(LifecycleResponse::Ok(LifecycleOk {
            reason_code: reason_codes::LIFE_OK_DELIVERED,
            insigne_id: req.insigne_id.clone(),
            status: InsigneStatus::Delivered,
            noop: false,
        }))
    }

    pub fn retrieval_link(&self, access_token: &str) -> String {
        format!(
            "{}?token={}",
            self.config.results_base_url.trim_end_matches('?'),
            access_token
        )
    }
}

fn delivery_email_html(link: &str) -> String {
    format!(
        r#"<div style="font-family:Arial,sans-serif;max-width:560px;margin:0 auto;line-height:1.5">
  <h2>Your Insigne has been forged</h2>
  <p>Your private dossier and Insigne are ready to view.</p>
  <p><a href="{link}" style="display:inline-block;padding:12px 16px;background:#111;color:#fff;text-decoration:none;border-radius:10px">View your Insigne</a></p>
  <p style="color:#666;font-size:12px">This link is private. Keep it secure.</p>
</div>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use insigne_contracts::insigne::{AccessToken, EmailAddress, InsigneId};
    use insigne_contracts::{ReasonCodeId, UnixTimeMs};
    use insigne_engines::mailer::MailerConfig;

    fn runtime() -> LifecycleRuntime {
        LifecycleRuntime::new(
            LifecycleConfig::mvp_v1(),
            MailerRuntime::new(MailerConfig::mvp_v1()),
        )
    }

    fn seeded(store: &mut InsigneStore, with_email: bool) -> InsigneId {
        store
            .create_insigne(
                UnixTimeMs(10),
                AccessToken::new("a".repeat(48)).unwrap(),
                with_email.then(|| EmailAddress::new("client@example.com").unwrap()),
                ReasonCodeId(1),
            )
            .unwrap()
    }

    fn approve_req(id: &InsigneId, at: u64) -> ApproveRequest {
        ApproveRequest::v1(UnixTimeMs(at), id.clone()).unwrap()
    }

    fn deliver_req(id: &InsigneId, at: u64) -> DeliverRequest {
        DeliverRequest::v1(UnixTimeMs(at), id.clone()).unwrap()
    }

    #[test]
    fn approve_advances_then_noops() {
        let mut store = InsigneStore::new_in_memory();
        let id = seeded(&mut store, true);
        let rt = runtime();

        match rt.approve(&mut store, &approve_req(&id, 20)).unwrap() {
            LifecycleResponse::Ok(ok) => {
                assert!(!ok.noop);
                assert_eq!(ok.status, InsigneStatus::Approved);
            }
            LifecycleResponse::Refuse(r) => panic!("unexpected refuse: {r:?}"),
        }
        // Approval requested twice: second application reports success.
        match rt.approve(&mut store, &approve_req(&id, 21)).unwrap() {
            LifecycleResponse::Ok(ok) => {
                assert!(ok.noop);
                assert_eq!(ok.reason_code, reason_codes::LIFE_OK_APPROVE_NOOP);
            }
            LifecycleResponse::Refuse(r) => panic!("unexpected refuse: {r:?}"),
        }
    }

    #[test]
    fn approve_unknown_record_refuses() {
        let mut store = InsigneStore::new_in_memory();
        let ghost = InsigneId::new("ins_ghost").unwrap();
        match runtime().approve(&mut store, &approve_req(&ghost, 20)).unwrap() {
            LifecycleResponse::Refuse(r) => {
                assert_eq!(r.reason_code, reason_codes::LIFE_REFUSE_NOT_FOUND)
            }
            LifecycleResponse::Ok(_) => panic!("expected refuse"),
        }
    }

    #[test]
    fn deliver_sends_and_stamps_delivered() {
        let mut store = InsigneStore::new_in_memory();
        let id = seeded(&mut store, true);
        let resp = runtime()
            .deliver(&mut store, &deliver_req(&id, 20), "re_key", Some(r#"{"id":"email_1"}"#))
            .unwrap();
        match resp {
            LifecycleResponse::Ok(ok) => {
                assert_eq!(ok.status, InsigneStatus::Delivered);
                assert!(!ok.noop);
            }
            LifecycleResponse::Refuse(r) => panic!("unexpected refuse: {r:?}"),
        }
        assert_eq!(
            store.insigne_row(&id).unwrap().status,
            InsigneStatus::Delivered
        );
    }

    #[test]
    fn deliver_without_email_is_a_precondition_refuse() {
        let mut store = InsigneStore::new_in_memory();
        let id = seeded(&mut store, false);
        let before = store.insigne_row(&id).unwrap().status;
        let resp = runtime()
            .deliver(&mut store, &deliver_req(&id, 20), "re_key", Some(r#"{"id":"x"}"#))
            .unwrap();
        match resp {
            LifecycleResponse::Refuse(r) => {
                assert_eq!(r.reason_code, reason_codes::LIFE_REFUSE_PRECONDITION)
            }
            LifecycleResponse::Ok(_) => panic!("expected refuse"),
        }
        assert_eq!(store.insigne_row(&id).unwrap().status, before);
    }

    #[test]
    fn failed_dispatch_leaves_status_unchanged() {
        let mut store = InsigneStore::new_in_memory();
        let id = seeded(&mut store, true);
        store
            .apply_status(&id, InsigneStatus::Approved, UnixTimeMs(15), ReasonCodeId(9))
            .unwrap();

        let resp = runtime()
            .deliver(
                &mut store,
                &deliver_req(&id, 20),
                "re_key",
                Some(r#"{"error":{"message":"domain not verified"}}"#),
            )
            .unwrap();
        match resp {
            LifecycleResponse::Refuse(r) => {
                assert_eq!(r.reason_code, reason_codes::LIFE_REFUSE_DISPATCH_FAILED);
                assert!(r.detail.unwrap().contains("domain not verified"));
            }
            LifecycleResponse::Ok(_) => panic!("expected refuse"),
        }
        assert_eq!(
            store.insigne_row(&id).unwrap().status,
            InsigneStatus::Approved
        );
    }

    #[test]
    fn redelivery_is_a_noop_without_a_second_email() {
        let mut store = InsigneStore::new_in_memory();
        let id = seeded(&mut store, true);
        let rt = runtime();
        rt.deliver(&mut store, &deliver_req(&id, 20), "re_key", Some(r#"{"id":"email_1"}"#))
            .unwrap();
        // Replay with a fixture that would fail the send: it must not even
        // be consulted.
        let resp = rt
            .deliver(
                &mut store,
                &deliver_req(&id, 30),
                "re_key",
                Some(r#"{"error":{"message":"would fail"}}"#),
            )
            .unwrap();
        match resp {
            LifecycleResponse::Ok(ok) => {
                assert!(ok.noop);
                assert_eq!(ok.reason_code, reason_codes::LIFE_OK_DELIVER_NOOP);
            }
            LifecycleResponse::Refuse(r) => panic!("unexpected refuse: {r:?}"),
        }
    }

    #[test]
    fn retrieval_link_embeds_the_token() {
        let rt = runtime();
        assert_eq!(
            rt.retrieval_link("abc123"),
            "https://insigne.example/results?token=abc123"
        );
    }
}
