#![forbid(unsafe_code)]

use insigne_contracts::insigne::{AccessToken, InsigneId, InsigneStatus};
use insigne_contracts::{ReasonCodeId, UnixTimeMs};
use insigne_storage::store::{GenerationClaim, InsigneStore, StatusApply, StorageError};

fn token(fill: char) -> AccessToken {
    AccessToken::new(fill.to_string().repeat(48)).unwrap()
}

fn seeded(s: &mut InsigneStore) -> InsigneId {
    s.create_insigne(UnixTimeMs(10), token('a'), None, ReasonCodeId(1))
        .unwrap()
}

#[test]
fn at_generation_claim_db_01_first_caller_wins_second_noops() {
    let mut s = InsigneStore::new_in_memory();
    let id = seeded(&mut s);

    let first = s
        .claim_generation(&id, UnixTimeMs(20), ReasonCodeId(2))
        .unwrap();
    let second = s
        .claim_generation(&id, UnixTimeMs(21), ReasonCodeId(2))
        .unwrap();

    assert_eq!(first, GenerationClaim::Claimed);
    assert_eq!(
        second,
        GenerationClaim::AlreadyClaimed(InsigneStatus::Generating)
    );
    assert_eq!(s.insigne_row(&id).unwrap().status, InsigneStatus::Generating);
}

#[test]
fn at_generation_claim_db_02_claim_refused_past_generating() {
    let mut s = InsigneStore::new_in_memory();
    let id = seeded(&mut s);
    s.claim_generation(&id, UnixTimeMs(20), ReasonCodeId(2))
        .unwrap();
    s.store_generation_output(
        &id,
        "report".to_string(),
        String::new(),
        String::new(),
        UnixTimeMs(30),
        ReasonCodeId(3),
    )
    .unwrap();

    let replay = s
        .claim_generation(&id, UnixTimeMs(40), ReasonCodeId(2))
        .unwrap();
    assert_eq!(
        replay,
        GenerationClaim::AlreadyClaimed(InsigneStatus::AwaitingApproval)
    );
}

#[test]
fn at_generation_claim_db_03_claim_unknown_record_is_fk_error() {
    let mut s = InsigneStore::new_in_memory();
    let ghost = InsigneId::new("ins_ghost").unwrap();
    let err = s
        .claim_generation(&ghost, UnixTimeMs(20), ReasonCodeId(2))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation { table: "insignes", .. }
    ));
}

#[test]
fn at_generation_claim_db_06_release_reopens_the_claim_for_retry() {
    let mut s = InsigneStore::new_in_memory();
    let id = seeded(&mut s);
    s.claim_generation(&id, UnixTimeMs(20), ReasonCodeId(2))
        .unwrap();
    assert_eq!(
        s.release_generation_claim(&id, UnixTimeMs(21), ReasonCodeId(5))
            .unwrap(),
        StatusApply::Advanced
    );
    assert_eq!(s.insigne_row(&id).unwrap().status, InsigneStatus::Draft);
    // A later trigger can claim again.
    assert_eq!(
        s.claim_generation(&id, UnixTimeMs(22), ReasonCodeId(2))
            .unwrap(),
        GenerationClaim::Claimed
    );
    // Releasing a record that is not mid-generation is a no-op.
    s.store_generation_output(
        &id,
        "r".to_string(),
        String::new(),
        String::new(),
        UnixTimeMs(23),
        ReasonCodeId(3),
    )
    .unwrap();
    assert_eq!(
        s.release_generation_claim(&id, UnixTimeMs(24), ReasonCodeId(5))
            .unwrap(),
        StatusApply::Noop
    );
}

#[test]
fn at_generation_claim_db_04_status_apply_is_monotonic_idempotent() {
    let mut s = InsigneStore::new_in_memory();
    let id = seeded(&mut s);

    assert_eq!(
        s.apply_status(&id, InsigneStatus::Approved, UnixTimeMs(20), ReasonCodeId(4))
            .unwrap(),
        StatusApply::Advanced
    );
    // Re-applying the same transition succeeds without effect.
    assert_eq!(
        s.apply_status(&id, InsigneStatus::Approved, UnixTimeMs(21), ReasonCodeId(4))
            .unwrap(),
        StatusApply::Noop
    );
    // Moving backwards is also a no-op, never an error.
    assert_eq!(
        s.apply_status(&id, InsigneStatus::Draft, UnixTimeMs(22), ReasonCodeId(4))
            .unwrap(),
        StatusApply::Noop
    );
    assert_eq!(s.insigne_row(&id).unwrap().status, InsigneStatus::Approved);
}

#[test]
fn at_generation_claim_db_05_output_persists_all_three_fields() {
    let mut s = InsigneStore::new_in_memory();
    let id = seeded(&mut s);
    s.claim_generation(&id, UnixTimeMs(20), ReasonCodeId(2))
        .unwrap();
    s.store_generation_output(
        &id,
        "A private dossier.".to_string(),
        "Ever onward".to_string(),
        "Semper porro".to_string(),
        UnixTimeMs(30),
        ReasonCodeId(3),
    )
    .unwrap();

    let row = s.insigne_row(&id).unwrap();
    assert_eq!(row.report_text.as_deref(), Some("A private dossier."));
    assert_eq!(row.motto_english.as_deref(), Some("Ever onward"));
    assert_eq!(row.motto_latin.as_deref(), Some("Semper porro"));
    assert_eq!(row.status, InsigneStatus::AwaitingApproval);
}
