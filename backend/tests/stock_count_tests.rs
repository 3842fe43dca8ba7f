//! Stock count reconciliation tests

use proptest::prelude::*;
use rust_decimal::Decimal;

use shared::{
    count_line_status, count_variance, recompute_aggregates, validate_serial_line_count,
    CountItemStatus, StockCountStatus,
};

#[test]
fn full_count_round_trip() {
    // Expected [5, 5, 5], counted [5, 4, 5]: one mismatch, accuracy 66.67%
    let lines = vec![(5, Some(5)), (5, Some(4)), (5, Some(5))];
    let agg = recompute_aggregates(&lines);

    assert_eq!(agg.counted_items, 3);
    assert_eq!(agg.matched_items, 2);
    assert_eq!(agg.mismatched_items, 1);
    assert_eq!(agg.accuracy_percentage, Decimal::new(6667, 2));

    assert_eq!(count_variance(5, 4), -1);
    assert_eq!(count_line_status(5, Some(4)), CountItemStatus::Mismatch);
}

#[test]
fn zero_count_is_a_mismatch_not_missing_data() {
    assert_eq!(count_line_status(5, Some(0)), CountItemStatus::Mismatch);
    assert_eq!(count_variance(5, 0), -5);
    assert_eq!(count_line_status(5, None), CountItemStatus::Pending);
}

#[test]
fn overage_has_positive_variance() {
    assert_eq!(count_variance(3, 7), 4);
    assert_eq!(count_line_status(3, Some(7)), CountItemStatus::Mismatch);
}

#[test]
fn serial_lines_count_zero_or_one() {
    // A per-serial line tracks one physical unit. Counting it at 2 would
    // post a positive variance whose surplus unit carries no serial, so the
    // recording step rejects anything above 1; present or absent only.
    assert!(validate_serial_line_count(0).is_ok());
    assert!(validate_serial_line_count(1).is_ok());
    assert!(validate_serial_line_count(2).is_err());
    assert!(validate_serial_line_count(7).is_err());

    // The accepted counts against expected 1 leave variance in {-1, 0}.
    assert_eq!(count_variance(1, 1), 0);
    assert_eq!(count_variance(1, 0), -1);
    assert_eq!(count_line_status(1, Some(0)), CountItemStatus::Mismatch);
}

#[test]
fn recording_a_line_updates_aggregates_incrementally() {
    let mut lines: Vec<(i64, Option<i64>)> = vec![(2, None), (8, None)];
    assert_eq!(recompute_aggregates(&lines).counted_items, 0);
    assert_eq!(recompute_aggregates(&lines).accuracy_percentage, Decimal::ZERO);

    lines[0].1 = Some(2);
    let agg = recompute_aggregates(&lines);
    assert_eq!(agg.counted_items, 1);
    assert_eq!(agg.matched_items, 1);
    assert_eq!(agg.accuracy_percentage, Decimal::from(100));

    lines[1].1 = Some(6);
    let agg = recompute_aggregates(&lines);
    assert_eq!(agg.counted_items, 2);
    assert_eq!(agg.mismatched_items, 1);
    assert_eq!(agg.accuracy_percentage, Decimal::from(50));
}

#[test]
fn review_outcomes_from_submitted() {
    use StockCountStatus::*;

    assert!(Submitted.can_transition_to(Approved));
    assert!(Submitted.can_transition_to(Rejected));
    assert!(Submitted.can_transition_to(Recount));
    assert!(!Submitted.can_transition_to(Completed));

    // a recount goes back to the counter, then through submission again
    assert!(Recount.can_transition_to(InProgress));
    assert!(InProgress.can_transition_to(Submitted));

    assert!(Approved.can_transition_to(Completed));
}

#[test]
fn terminal_counts_never_move_again() {
    use StockCountStatus::*;

    for terminal in [Rejected, Completed] {
        assert!(terminal.is_terminal());
        for next in [Pending, InProgress, Submitted, Approved, Rejected, Recount, Completed] {
            assert!(!terminal.can_transition_to(next));
        }
    }
    assert!(!Approved.is_terminal());
}

#[test]
fn counts_accepted_only_in_progress() {
    use StockCountStatus::*;
    assert!(InProgress.accepts_counts());
    for status in [Pending, Submitted, Approved, Rejected, Recount, Completed] {
        assert!(!status.accepts_counts());
    }
}

proptest! {
    /// Aggregates are a pure function of the lines: matched plus mismatched
    /// equals counted, and accuracy stays within 0..=100.
    #[test]
    fn aggregates_are_derivable_from_lines(
        lines in prop::collection::vec(
            (0i64..50, prop::option::of(0i64..50)),
            0..20,
        )
    ) {
        let agg = recompute_aggregates(&lines);

        let counted = lines.iter().filter(|(_, c)| c.is_some()).count() as i64;
        prop_assert_eq!(agg.counted_items, counted);
        prop_assert_eq!(agg.matched_items + agg.mismatched_items, agg.counted_items);
        prop_assert!(agg.accuracy_percentage >= Decimal::ZERO);
        prop_assert!(agg.accuracy_percentage <= Decimal::from(100));

        // recomputation is idempotent
        prop_assert_eq!(recompute_aggregates(&lines), agg);
    }

    /// A line's status and variance always agree.
    #[test]
    fn line_status_matches_variance(expected in 0i64..100, counted in 0i64..100) {
        let status = count_line_status(expected, Some(counted));
        let variance = count_variance(expected, counted);
        if variance == 0 {
            prop_assert_eq!(status, CountItemStatus::Counted);
        } else {
            prop_assert_eq!(status, CountItemStatus::Mismatch);
        }
    }
}
