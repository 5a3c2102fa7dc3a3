//! Serde round-trip tests for `PatriciaTreeSet`.
//!
//! Requires the `serde` feature.

use patricia_set::PatriciaTreeSet;
use rstest::rstest;

#[rstest]
fn test_serialize_empty_set() {
    let set: PatriciaTreeSet<u32> = PatriciaTreeSet::new();
    let json = serde_json::to_string(&set).unwrap();
    assert_eq!(json, "[]");
}

#[rstest]
fn test_serialize_produces_a_sequence() {
    let set = PatriciaTreeSet::singleton(42u32);
    let json = serde_json::to_string(&set).unwrap();
    assert_eq!(json, "[42]");
}

#[rstest]
fn test_round_trip_preserves_content() {
    let set: PatriciaTreeSet<u32> = [0, 1, 2, 3, 4, 1023, u32::MAX].into_iter().collect();

    let json = serde_json::to_string(&set).unwrap();
    let decoded: PatriciaTreeSet<u32> = serde_json::from_str(&json).unwrap();

    assert_eq!(decoded, set);
    assert_eq!(decoded.len(), 7);
}

#[rstest]
fn test_deserialize_deduplicates() {
    let decoded: PatriciaTreeSet<u32> = serde_json::from_str("[1, 2, 2, 3, 1]").unwrap();
    assert_eq!(decoded.len(), 3);
}
