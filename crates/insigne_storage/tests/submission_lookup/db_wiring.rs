#![forbid(unsafe_code)]

use insigne_contracts::insigne::{AccessToken, InsigneId, SubmissionId};
use insigne_contracts::{ReasonCodeId, UnixTimeMs};
use insigne_storage::store::{InsigneStore, StorageError};

fn token(fill: char) -> AccessToken {
    AccessToken::new(fill.to_string().repeat(48)).unwrap()
}

fn sub(id: &str) -> SubmissionId {
    SubmissionId::new(id).unwrap()
}

#[test]
fn at_submission_lookup_db_01_upsert_is_first_writer_wins() {
    let mut s = InsigneStore::new_in_memory();
    let a = s
        .create_insigne(UnixTimeMs(10), token('a'), None, ReasonCodeId(1))
        .unwrap();
    let b = s
        .create_insigne(UnixTimeMs(11), token('b'), None, ReasonCodeId(1))
        .unwrap();

    let w1 = s
        .upsert_submission_lookup(sub("sub_1"), a.clone(), UnixTimeMs(20))
        .unwrap();
    // A replayed or racing write with the same key converges on the first
    // winner and is not an error.
    let w2 = s
        .upsert_submission_lookup(sub("sub_1"), b, UnixTimeMs(21))
        .unwrap();

    assert_eq!(w1, a);
    assert_eq!(w2, a);
    assert_eq!(s.submission_lookup_rows().len(), 1);
    assert_eq!(s.find_insigne_by_submission(&sub("sub_1")), Some(&a));
}

#[test]
fn at_submission_lookup_db_02_distinct_keys_map_independently() {
    let mut s = InsigneStore::new_in_memory();
    let a = s
        .create_insigne(UnixTimeMs(10), token('a'), None, ReasonCodeId(1))
        .unwrap();
    let b = s
        .create_insigne(UnixTimeMs(11), token('b'), None, ReasonCodeId(1))
        .unwrap();

    s.upsert_submission_lookup(sub("sub_1"), a.clone(), UnixTimeMs(20))
        .unwrap();
    s.upsert_submission_lookup(sub("sub_2"), b.clone(), UnixTimeMs(21))
        .unwrap();

    assert_eq!(s.find_insigne_by_submission(&sub("sub_1")), Some(&a));
    assert_eq!(s.find_insigne_by_submission(&sub("sub_2")), Some(&b));
    assert_eq!(s.find_insigne_by_submission(&sub("sub_3")), None);
}

#[test]
fn at_submission_lookup_db_03_mapping_requires_existing_insigne() {
    let mut s = InsigneStore::new_in_memory();
    let ghost = InsigneId::new("ins_ghost").unwrap();
    let err = s
        .upsert_submission_lookup(sub("sub_1"), ghost, UnixTimeMs(20))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation {
            table: "submission_lookup",
            ..
        }
    ));
    assert!(s.submission_lookup_rows().is_empty());
}
