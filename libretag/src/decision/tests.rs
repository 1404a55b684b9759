use super::*;
use crate::testing::{DIGEST_A, DIGEST_B, metadata};

#[test]
fn test_same_digest_is_noop() {
    let source = metadata(DIGEST_A, Some(10));
    let destination = DestinationState::Existing(metadata(DIGEST_A, Some(10)));

    assert_eq!(
        decide(&source, &destination, false),
        RetagDecision::NoOpAlreadyCorrect
    );
}

#[test]
fn test_same_digest_is_noop_in_dry_run() {
    let source = metadata(DIGEST_A, None);
    let destination = DestinationState::Existing(metadata(DIGEST_A, None));

    assert_eq!(
        decide(&source, &destination, true),
        RetagDecision::NoOpAlreadyCorrect
    );
}

#[test]
fn test_timestamps_do_not_affect_decision() {
    let source = metadata(DIGEST_A, Some(10));
    let destination = DestinationState::Existing(metadata(DIGEST_A, Some(3)));
    assert_eq!(
        decide(&source, &destination, false),
        RetagDecision::NoOpAlreadyCorrect
    );

    let source = metadata(DIGEST_A, Some(10));
    let destination = DestinationState::Existing(metadata(DIGEST_B, Some(10)));
    assert!(matches!(
        decide(&source, &destination, false),
        RetagDecision::Overwrite { .. }
    ));
}

#[test]
fn test_absent_destination_creates() {
    let source = metadata(DIGEST_A, None);

    assert_eq!(
        decide(&source, &DestinationState::Absent, false),
        RetagDecision::Create
    );
    assert_eq!(
        decide(&source, &DestinationState::Absent, true),
        RetagDecision::WouldCreate
    );
}

#[test]
fn test_different_digest_overwrites_with_previous() {
    let source = metadata(DIGEST_A, Some(10));
    let previous = metadata(DIGEST_B, Some(2));
    let destination = DestinationState::Existing(previous.clone());

    assert_eq!(
        decide(&source, &destination, false),
        RetagDecision::Overwrite {
            previous: previous.clone()
        }
    );
    assert_eq!(
        decide(&source, &destination, true),
        RetagDecision::WouldOverwrite { previous }
    );
}

#[test]
fn test_requires_write_only_for_live_changes() {
    let previous = metadata(DIGEST_B, None);
    let cases = [
        (RetagDecision::NoOpAlreadyCorrect, false),
        (RetagDecision::WouldCreate, false),
        (
            RetagDecision::WouldOverwrite {
                previous: previous.clone(),
            },
            false,
        ),
        (RetagDecision::Create, true),
        (RetagDecision::Overwrite { previous }, true),
    ];

    for (decision, expected) in cases {
        assert_eq!(decision.requires_write(), expected, "{:?}", decision);
    }
}

#[test]
fn test_dry_run_never_requires_write() {
    let source = metadata(DIGEST_A, None);
    let destinations = [
        DestinationState::Absent,
        DestinationState::Existing(metadata(DIGEST_A, None)),
        DestinationState::Existing(metadata(DIGEST_B, None)),
    ];

    for destination in &destinations {
        assert!(!decide(&source, destination, true).requires_write());
    }
}

#[test]
fn test_previous_accessor() {
    let previous = metadata(DIGEST_B, Some(1));
    assert_eq!(
        RetagDecision::Overwrite {
            previous: previous.clone()
        }
        .previous(),
        Some(&previous)
    );
    assert_eq!(RetagDecision::Create.previous(), None);
    assert_eq!(RetagDecision::NoOpAlreadyCorrect.previous(), None);
}

#[test]
fn test_decision_serializes_with_action_tag() {
    let json = serde_json::to_value(RetagDecision::Create).unwrap();
    assert_eq!(json["action"], "create");

    let json = serde_json::to_value(RetagDecision::Overwrite {
        previous: metadata(DIGEST_B, None),
    })
    .unwrap();
    assert_eq!(json["action"], "overwrite");
    assert_eq!(json["previous"]["digest"], DIGEST_B);
}
