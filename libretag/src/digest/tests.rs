use super::*;
use std::str::FromStr;

const DIGEST_A: &str = "sha256:7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc";
const DIGEST_B: &str = "sha256:c5b1261d6d3e43071626931fc004f70149baeba2c8ec672bd4f27761f8e1ad6b";

#[test]
fn test_digest_from_valid_string_succeeds() {
    let digest = Digest::from_str(DIGEST_A);
    assert!(digest.is_ok());
}

#[test]
fn test_digest_from_invalid_string_fails() {
    let digest = Digest::from_str("sha256:invalid-digest");
    assert!(matches!(digest.unwrap_err(), RetagError::Validation { .. }));
}

#[test]
fn test_digest_display_trait() {
    let digest = Digest::from_str(DIGEST_A).unwrap();
    assert_eq!(digest.to_string(), DIGEST_A);
}

#[test]
fn test_digest_equality_is_by_canonical_string() {
    let a1 = Digest::from_str(DIGEST_A).unwrap();
    let a2 = Digest::from_str(&format!(" {} ", DIGEST_A)).unwrap();
    let b = Digest::from_str(DIGEST_B).unwrap();

    assert_eq!(a1, a2);
    assert_ne!(a1, b);
}

#[test]
fn test_digest_parts() {
    let digest = Digest::from_str(DIGEST_A).unwrap();
    assert_eq!(digest.algorithm(), "sha256");
    assert_eq!(
        digest.hex(),
        "7173b809ca12ec5dee4506cd86be934c4596dd234ee82c0662eac04a8c2c71dc"
    );
}

#[test]
fn test_short_truncates_hash_only() {
    let digest = Digest::from_str(DIGEST_B).unwrap();
    assert_eq!(digest.short(DEFAULT_SHORT_LEN), "sha256:c5b1261d6d3e");
    assert_eq!(digest.short(4), "sha256:c5b1");
}

#[test]
fn test_short_longer_than_hash_keeps_full_digest() {
    let digest = Digest::from_str(DIGEST_B).unwrap();
    assert_eq!(digest.short(500), DIGEST_B);
}

#[test]
fn test_sha256_of_known_content() {
    let digest = Digest::sha256_of(b"hello").unwrap();
    assert_eq!(
        digest.to_string(),
        "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
}

#[test]
fn test_digest_serializes_as_string() {
    let digest = Digest::from_str(DIGEST_A).unwrap();
    let json = serde_json::to_string(&digest).unwrap();
    assert_eq!(json, format!("\"{}\"", DIGEST_A));
}
