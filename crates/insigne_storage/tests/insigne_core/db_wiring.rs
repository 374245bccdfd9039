#![forbid(unsafe_code)]

use insigne_contracts::asset::{AssetType, StoragePath};
use insigne_contracts::insigne::{AccessToken, EmailAddress, InsigneStatus};
use insigne_contracts::{ReasonCodeId, UnixTimeMs};
use insigne_storage::store::{InsigneStore, StatusApply};

fn token(fill: char) -> AccessToken {
    AccessToken::new(fill.to_string().repeat(48)).unwrap()
}

fn email(addr: &str) -> EmailAddress {
    EmailAddress::new(addr).unwrap()
}

#[test]
fn at_insigne_core_db_01_create_starts_in_draft_with_token() {
    let mut s = InsigneStore::new_in_memory();
    let id = s
        .create_insigne(
            UnixTimeMs(10),
            token('a'),
            Some(email("client@example.com")),
            ReasonCodeId(0x4947_0001),
        )
        .unwrap();

    let row = s.insigne_row(&id).unwrap();
    assert_eq!(row.status, InsigneStatus::Draft);
    assert_eq!(row.access_token.as_ref().unwrap().as_str(), "a".repeat(48));
    assert_eq!(
        row.client_email.as_ref().unwrap().as_str(),
        "client@example.com"
    );
    assert!(row.report_text.is_none());
    assert!(row.motto_english.is_none());
    assert!(row.motto_latin.is_none());
}

#[test]
fn at_insigne_core_db_02_ids_are_unique_across_creates() {
    let mut s = InsigneStore::new_in_memory();
    let a = s
        .create_insigne(UnixTimeMs(10), token('a'), None, ReasonCodeId(1))
        .unwrap();
    let b = s
        .create_insigne(UnixTimeMs(10), token('b'), None, ReasonCodeId(1))
        .unwrap();
    assert_ne!(a, b);
    assert_eq!(s.insigne_rows().len(), 2);
}

#[test]
fn at_insigne_core_db_03_latest_orders_by_created_at_then_seq() {
    let mut s = InsigneStore::new_in_memory();
    let first = s
        .create_insigne(UnixTimeMs(100), token('a'), None, ReasonCodeId(1))
        .unwrap();
    let second = s
        .create_insigne(UnixTimeMs(50), token('b'), None, ReasonCodeId(1))
        .unwrap();
    // Older created_at loses even though it was inserted later.
    assert_eq!(s.latest_insigne().unwrap().insigne_id, first);

    let third = s
        .create_insigne(UnixTimeMs(100), token('c'), None, ReasonCodeId(1))
        .unwrap();
    // Equal created_at: insertion sequence breaks the tie.
    assert_eq!(s.latest_insigne().unwrap().insigne_id, third);
    let _ = second;
}

#[test]
fn at_insigne_core_db_04_answers_latest_row_wins_by_created_at() {
    let mut s = InsigneStore::new_in_memory();
    let id = s
        .create_insigne(UnixTimeMs(10), token('a'), None, ReasonCodeId(1))
        .unwrap();
    s.append_answers_row(&id, r#"{"q":"first"}"#.to_string(), UnixTimeMs(20))
        .unwrap();
    s.append_answers_row(&id, r#"{"q":"second"}"#.to_string(), UnixTimeMs(30))
        .unwrap();
    s.append_answers_row(&id, r#"{"q":"same-instant"}"#.to_string(), UnixTimeMs(30))
        .unwrap();

    let latest = s.latest_answers_row(&id).unwrap();
    assert_eq!(latest.payload_json, r#"{"q":"same-instant"}"#);
    assert_eq!(s.answers_rows().len(), 3);
    assert_eq!(latest.payload_sha256.len(), 64);
}

#[test]
fn at_insigne_core_db_05_answers_require_existing_insigne() {
    let mut s = InsigneStore::new_in_memory();
    let id = s
        .create_insigne(UnixTimeMs(10), token('a'), None, ReasonCodeId(1))
        .unwrap();
    let missing = insigne_contracts::insigne::InsigneId::new("ins_missing").unwrap();
    assert!(s
        .append_answers_row(&missing, "{}".to_string(), UnixTimeMs(11))
        .is_err());
    assert!(s
        .append_answers_row(&id, "{}".to_string(), UnixTimeMs(11))
        .is_ok());
}

#[test]
fn at_insigne_core_db_06_assets_keep_insertion_order() {
    let mut s = InsigneStore::new_in_memory();
    let id = s
        .create_insigne(UnixTimeMs(10), token('a'), None, ReasonCodeId(1))
        .unwrap();
    s.insert_asset_row(
        &id,
        Some(AssetType::new("crest_png").unwrap()),
        StoragePath::new("insignes/x/crest.png"),
        UnixTimeMs(11),
    )
    .unwrap();
    s.insert_asset_row(
        &id,
        Some(AssetType::new("dossier_pdf").unwrap()),
        StoragePath::new("insignes/x/dossier.pdf"),
        UnixTimeMs(12),
    )
    .unwrap();

    let rows = s.assets_for_insigne(&id);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].storage_path.as_str(), "insignes/x/crest.png");
    assert_eq!(rows[1].storage_path.as_str(), "insignes/x/dossier.pdf");
}

#[test]
fn at_insigne_core_db_07_status_ledger_is_append_only_proof() {
    let mut s = InsigneStore::new_in_memory();
    let id = s
        .create_insigne(UnixTimeMs(10), token('a'), None, ReasonCodeId(0x11))
        .unwrap();
    s.claim_generation(&id, UnixTimeMs(20), ReasonCodeId(0x12))
        .unwrap();
    s.store_generation_output(
        &id,
        "report".to_string(),
        "Ever onward".to_string(),
        "Semper porro".to_string(),
        UnixTimeMs(30),
        ReasonCodeId(0x13),
    )
    .unwrap();

    let ledger = s.status_ledger_rows();
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger[0].from, None);
    assert_eq!(ledger[0].to, InsigneStatus::Draft);
    assert_eq!(ledger[1].from, Some(InsigneStatus::Draft));
    assert_eq!(ledger[1].to, InsigneStatus::Generating);
    assert_eq!(ledger[2].from, Some(InsigneStatus::Generating));
    assert_eq!(ledger[2].to, InsigneStatus::AwaitingApproval);
    // No-op applications leave no ledger rows behind.
    let before = s.status_ledger_rows().len();
    s.apply_status(
        &id,
        InsigneStatus::AwaitingApproval,
        UnixTimeMs(40),
        ReasonCodeId(0x14),
    )
    .map(|a| assert_eq!(a, StatusApply::Noop))
    .unwrap();
    assert_eq!(s.status_ledger_rows().len(), before);
}

#[test]
fn at_insigne_core_db_08_find_by_token_ignores_empty_probe() {
    let mut s = InsigneStore::new_in_memory();
    let id = s
        .create_insigne(UnixTimeMs(10), token('a'), None, ReasonCodeId(1))
        .unwrap();
    assert!(s.find_insigne_by_token("").is_none());
    assert!(s.find_insigne_by_token("   ").is_none());
    let stored = s
        .insigne_row(&id)
        .and_then(|r| r.access_token.clone())
        .unwrap();
    assert_eq!(
        s.find_insigne_by_token(stored.as_str()).unwrap().insigne_id,
        id
    );
}

#[test]
fn at_insigne_core_db_09_awaiting_approval_queue_is_oldest_first() {
    let mut s = InsigneStore::new_in_memory();
    let newer = s
        .create_insigne(UnixTimeMs(200), token('a'), None, ReasonCodeId(1))
        .unwrap();
    let older = s
        .create_insigne(UnixTimeMs(100), token('b'), None, ReasonCodeId(1))
        .unwrap();
    for id in [&newer, &older] {
        s.claim_generation(id, UnixTimeMs(300), ReasonCodeId(2))
            .unwrap();
        s.store_generation_output(
            id,
            "r".to_string(),
            String::new(),
            String::new(),
            UnixTimeMs(301),
            ReasonCodeId(3),
        )
        .unwrap();
    }
    let queue = s.awaiting_approval_rows();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].insigne_id, older);
    assert_eq!(queue[1].insigne_id, newer);
}
