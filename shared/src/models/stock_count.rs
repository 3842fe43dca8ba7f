//! Stock count reconciliation models
//!
//! A stock count compares expected (book) quantity against physically counted
//! quantity for one bin, with an approval gate before book stock is adjusted.
//! The parent count's aggregate fields are always recomputed from its lines,
//! never incremented independently.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One reconciliation exercise over a bin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockCount {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub bin: String,
    pub source_receipt_id: Option<Uuid>,
    pub status: StockCountStatus,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    /// Aggregates: pure functions of the child lines, recomputed on write
    pub counted_items: i64,
    pub matched_items: i64,
    pub mismatched_items: i64,
    pub accuracy_percentage: Decimal,
    pub started_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One expected line in a count
///
/// For serial-tracked items there is one line per serial number with
/// `expected_quantity = 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockCountItem {
    pub id: Uuid,
    pub stock_count_id: Uuid,
    pub item_id: Uuid,
    pub serial_number: Option<String>,
    /// Snapshot of book quantity at count creation
    pub expected_quantity: i64,
    pub counted_quantity: Option<i64>,
    /// `counted - expected`, derived when the line is counted
    pub variance: Option<i64>,
    pub status: CountItemStatus,
    pub adjustment_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockCountStatus {
    Pending,
    InProgress,
    Submitted,
    Approved,
    Rejected,
    Recount,
    Completed,
}

impl StockCountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockCountStatus::Pending => "pending",
            StockCountStatus::InProgress => "in_progress",
            StockCountStatus::Submitted => "submitted",
            StockCountStatus::Approved => "approved",
            StockCountStatus::Rejected => "rejected",
            StockCountStatus::Recount => "recount",
            StockCountStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(StockCountStatus::Pending),
            "in_progress" => Some(StockCountStatus::InProgress),
            "submitted" => Some(StockCountStatus::Submitted),
            "approved" => Some(StockCountStatus::Approved),
            "rejected" => Some(StockCountStatus::Rejected),
            "recount" => Some(StockCountStatus::Recount),
            "completed" => Some(StockCountStatus::Completed),
            _ => None,
        }
    }

    /// Legal transitions:
    /// `pending -> in_progress -> submitted -> {approved, rejected, recount}`,
    /// `recount -> in_progress`, `approved -> completed`.
    pub fn can_transition_to(&self, next: StockCountStatus) -> bool {
        use StockCountStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Submitted)
                | (Submitted, Approved)
                | (Submitted, Rejected)
                | (Submitted, Recount)
                | (Recount, InProgress)
                | (Approved, Completed)
        )
    }

    /// Counts accept `record_count` only while in progress
    pub fn accepts_counts(&self) -> bool {
        matches!(self, StockCountStatus::InProgress)
    }

    /// Rejected and completed counts can never move again; approved counts
    /// only to completed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StockCountStatus::Rejected | StockCountStatus::Completed)
    }
}

impl std::fmt::Display for StockCountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CountItemStatus {
    Pending,
    Counted,
    Mismatch,
}

impl CountItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountItemStatus::Pending => "pending",
            CountItemStatus::Counted => "counted",
            CountItemStatus::Mismatch => "mismatch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CountItemStatus::Pending),
            "counted" => Some(CountItemStatus::Counted),
            "mismatch" => Some(CountItemStatus::Mismatch),
            _ => None,
        }
    }
}

/// Line status derived from its quantities
pub fn count_line_status(expected: i64, counted: Option<i64>) -> CountItemStatus {
    match counted {
        None => CountItemStatus::Pending,
        Some(c) if c == expected => CountItemStatus::Counted,
        Some(_) => CountItemStatus::Mismatch,
    }
}

/// Variance of a counted line
pub fn count_variance(expected: i64, counted: i64) -> i64 {
    counted - expected
}

/// Aggregate fields of a stock count, derived from its lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountAggregates {
    pub counted_items: i64,
    pub matched_items: i64,
    pub mismatched_items: i64,
    pub accuracy_percentage: Decimal,
}

/// Recompute a count's aggregates from `(expected, counted)` line pairs.
///
/// `counted_items` is the number of lines with a recorded count,
/// `matched_items`/`mismatched_items` split those by variance, and
/// `accuracy_percentage` is `matched / counted * 100` rounded to two decimal
/// places, zero when nothing has been counted yet. Always holds:
/// `matched_items + mismatched_items == counted_items`.
pub fn recompute_aggregates(lines: &[(i64, Option<i64>)]) -> CountAggregates {
    let mut counted = 0i64;
    let mut matched = 0i64;

    for &(expected, counted_quantity) in lines {
        if let Some(c) = counted_quantity {
            counted += 1;
            if c == expected {
                matched += 1;
            }
        }
    }

    let accuracy = if counted == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(matched) / Decimal::from(counted) * Decimal::from(100)).round_dp(2)
    };

    CountAggregates {
        counted_items: counted,
        matched_items: matched,
        mismatched_items: counted - matched,
        accuracy_percentage: accuracy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_empty_count() {
        let agg = recompute_aggregates(&[]);
        assert_eq!(agg.counted_items, 0);
        assert_eq!(agg.accuracy_percentage, Decimal::ZERO);
    }

    #[test]
    fn aggregates_two_of_three_matched() {
        let lines = vec![(5, Some(5)), (4, Some(5)), (5, Some(5))];
        let agg = recompute_aggregates(&lines);
        assert_eq!(agg.counted_items, 3);
        assert_eq!(agg.matched_items, 2);
        assert_eq!(agg.mismatched_items, 1);
        assert_eq!(agg.accuracy_percentage, Decimal::new(6667, 2));
    }

    #[test]
    fn aggregates_ignore_uncounted_lines() {
        let lines = vec![(5, Some(5)), (4, None)];
        let agg = recompute_aggregates(&lines);
        assert_eq!(agg.counted_items, 1);
        assert_eq!(agg.matched_items, 1);
        assert_eq!(agg.accuracy_percentage, Decimal::from(100));
    }

    #[test]
    fn line_status_follows_variance() {
        assert_eq!(count_line_status(5, None), CountItemStatus::Pending);
        assert_eq!(count_line_status(5, Some(5)), CountItemStatus::Counted);
        assert_eq!(count_line_status(5, Some(3)), CountItemStatus::Mismatch);
    }

    #[test]
    fn transition_table() {
        use StockCountStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Approved));
        assert!(Submitted.can_transition_to(Rejected));
        assert!(Submitted.can_transition_to(Recount));
        assert!(Recount.can_transition_to(InProgress));
        assert!(Approved.can_transition_to(Completed));

        assert!(!Approved.can_transition_to(InProgress));
        assert!(!Rejected.can_transition_to(InProgress));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Submitted));
    }

    #[test]
    fn terminal_counts_refuse_records() {
        use StockCountStatus::*;
        assert!(InProgress.accepts_counts());
        for status in [Pending, Submitted, Approved, Rejected, Recount, Completed] {
            assert!(!status.accepts_counts());
        }
    }
}
