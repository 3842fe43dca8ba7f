//! Task state machine tests: placements, transfers, damage reports

use shared::{DamageStatus, PlacementStatus, TransferStatus, TransferUrgency};

#[test]
fn transfer_lifecycle_is_linear() {
    use TransferStatus::*;

    assert!(Pending.can_transition_to(InProgress));
    assert!(InProgress.can_transition_to(Completed));

    // no skipping, no going back, no reopening
    assert!(!Pending.can_transition_to(Completed));
    assert!(!InProgress.can_transition_to(Pending));
    assert!(!Completed.can_transition_to(InProgress));
    assert!(!Completed.can_transition_to(Pending));
}

#[test]
fn transfer_status_round_trips_through_storage() {
    for status in [
        TransferStatus::Pending,
        TransferStatus::InProgress,
        TransferStatus::Completed,
    ] {
        assert_eq!(TransferStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(TransferStatus::parse("cancelled"), None);
}

#[test]
fn transfer_urgency_defaults_to_normal() {
    assert_eq!(TransferUrgency::default(), TransferUrgency::Normal);
    for urgency in [
        TransferUrgency::Low,
        TransferUrgency::Normal,
        TransferUrgency::High,
    ] {
        assert_eq!(TransferUrgency::parse(urgency.as_str()), Some(urgency));
    }
}

#[test]
fn placement_is_placed_exactly_once() {
    assert_eq!(PlacementStatus::parse("pending"), Some(PlacementStatus::Pending));
    assert_eq!(PlacementStatus::parse("placed"), Some(PlacementStatus::Placed));
    assert_eq!(PlacementStatus::parse("in_progress"), None);
}

#[test]
fn only_pending_damage_reports_are_reviewable() {
    assert!(DamageStatus::Pending.is_reviewable());
    // approved and rejected are terminal; a second review must be refused,
    // which is what keeps approval from deducting stock twice
    assert!(!DamageStatus::Approved.is_reviewable());
    assert!(!DamageStatus::Rejected.is_reviewable());
}

#[test]
fn damage_status_round_trips_through_storage() {
    for status in [
        DamageStatus::Pending,
        DamageStatus::Approved,
        DamageStatus::Rejected,
    ] {
        assert_eq!(DamageStatus::parse(status.as_str()), Some(status));
    }
}
