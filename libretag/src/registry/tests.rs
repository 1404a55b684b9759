use super::*;
use crate::testing::{DIGEST_A, FakeTransport, metadata};
use std::str::FromStr;

fn reference(s: &str) -> Reference {
    Reference::from_str(s).unwrap()
}

#[test]
fn test_outcome_from_ok_is_found() {
    let outcome = FetchOutcome::from_result(Ok(metadata(DIGEST_A, Some(9))));
    assert!(matches!(outcome, FetchOutcome::Found(m) if m.digest.to_string() == DIGEST_A));
}

#[test]
fn test_outcome_classification() {
    assert!(matches!(
        FetchOutcome::from_result(Err(RetagError::not_found("manifest", "app:prod"))),
        FetchOutcome::NotFound
    ));
    assert!(matches!(
        FetchOutcome::from_result(Err(RetagError::server("unavailable", 503))),
        FetchOutcome::TransientFailure(_)
    ));
    assert!(matches!(
        FetchOutcome::from_result(Err(RetagError::network("timeout"))),
        FetchOutcome::TransientFailure(_)
    ));
    assert!(matches!(
        FetchOutcome::from_result(Err(RetagError::authentication("denied", Some(401)))),
        FetchOutcome::PermanentFailure(_)
    ));
    assert!(matches!(
        FetchOutcome::from_result(Err(RetagError::validation("garbage manifest"))),
        FetchOutcome::PermanentFailure(_)
    ));
}

#[test]
fn test_outcome_retryable_only_when_transient() {
    assert!(FetchOutcome::TransientFailure(RetagError::network("x")).is_transient());
    assert!(!FetchOutcome::NotFound.is_transient());
    assert!(!FetchOutcome::Found(metadata(DIGEST_A, None)).is_transient());
    assert!(!FetchOutcome::PermanentFailure(RetagError::validation("x")).is_transient());
}

#[test]
fn test_outcome_cancelled_is_permanent() {
    assert!(matches!(
        <FetchOutcome as Retryable>::cancelled(),
        FetchOutcome::PermanentFailure(RetagError::Cancelled)
    ));
}
