//! Batch ledger models
//!
//! A batch is one receipt lot of an item. Stock is consumed from batches in
//! strict arrival order (FIFO), and every consumption leaves an append-only
//! `BatchDeduction` audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One receipt lot of an item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    /// Fixed at creation, always > 0
    pub initial_quantity: i64,
    /// Monotonically non-increasing, >= 0
    pub remaining_quantity: i64,
    pub status: BatchStatus,
    /// Set once the received goods are placed in a bin
    pub bin: Option<String>,
    pub source_receipt_id: Option<Uuid>,
    /// FIFO order key
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Batch lifecycle: created active, flips to depleted exactly when
/// `remaining_quantity` reaches zero. Batches are never deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    Depleted,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Depleted => "depleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(BatchStatus::Active),
            "depleted" => Some(BatchStatus::Depleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why stock left a batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeductionType {
    Sale,
    Transfer,
    Adjustment,
}

impl DeductionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeductionType::Sale => "sale",
            DeductionType::Transfer => "transfer",
            DeductionType::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sale" => Some(DeductionType::Sale),
            "transfer" => Some(DeductionType::Transfer),
            "adjustment" => Some(DeductionType::Adjustment),
            _ => None,
        }
    }
}

/// Immutable audit record of one deduction against one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDeduction {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub quantity: i64,
    pub deduction_type: DeductionType,
    /// Originating document reference (sale number, transfer number, count id)
    pub origin_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// How far a deduction request was satisfied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeductionOutcome {
    /// The requested quantity was fully covered by active batches
    Full,
    /// Some stock was available but not enough
    Partial { short_by: i64 },
    /// No active batches held any stock for the item
    NoStock,
}

impl DeductionOutcome {
    pub fn is_full(&self) -> bool {
        matches!(self, DeductionOutcome::Full)
    }

    /// Quantity left unfulfilled
    pub fn shortfall(&self, requested: i64) -> i64 {
        match self {
            DeductionOutcome::Full => 0,
            DeductionOutcome::Partial { short_by } => *short_by,
            DeductionOutcome::NoStock => requested,
        }
    }
}

/// One slice the FIFO planner takes out of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoTake {
    pub batch_id: Uuid,
    pub quantity: i64,
    /// True when this take drains the batch to zero
    pub depletes: bool,
}

/// Result of planning a FIFO deduction over a set of batches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoPlan {
    pub takes: Vec<FifoTake>,
    pub outcome: DeductionOutcome,
}

impl FifoPlan {
    pub fn total_taken(&self) -> i64 {
        self.takes.iter().map(|t| t.quantity).sum()
    }
}

/// Plan a FIFO deduction of `requested` units over `batches`.
///
/// `batches` must be `(batch_id, remaining_quantity)` pairs already ordered
/// oldest-first; entries with zero remaining quantity are skipped. The plan
/// walks the list taking `min(still_needed, remaining)` from each batch until
/// the request is satisfied or the batches run out. Applying the plan and
/// writing its audit records is the caller's job and must happen in one
/// transaction.
pub fn plan_fifo_deduction(batches: &[(Uuid, i64)], requested: i64) -> FifoPlan {
    debug_assert!(requested > 0, "deduction quantity must be positive");

    let mut takes = Vec::new();
    let mut still_needed = requested;

    for &(batch_id, remaining) in batches {
        if still_needed == 0 {
            break;
        }
        if remaining <= 0 {
            continue;
        }
        let take = still_needed.min(remaining);
        takes.push(FifoTake {
            batch_id,
            quantity: take,
            depletes: take == remaining,
        });
        still_needed -= take;
    }

    let outcome = if still_needed == 0 {
        DeductionOutcome::Full
    } else if takes.is_empty() {
        DeductionOutcome::NoStock
    } else {
        DeductionOutcome::Partial {
            short_by: still_needed,
        }
    };

    FifoPlan { takes, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn fifo_depletes_oldest_first() {
        let batches = vec![(id(1), 5), (id(2), 10)];
        let plan = plan_fifo_deduction(&batches, 8);

        assert_eq!(plan.outcome, DeductionOutcome::Full);
        assert_eq!(plan.takes.len(), 2);
        assert_eq!(plan.takes[0].batch_id, id(1));
        assert_eq!(plan.takes[0].quantity, 5);
        assert!(plan.takes[0].depletes);
        assert_eq!(plan.takes[1].batch_id, id(2));
        assert_eq!(plan.takes[1].quantity, 3);
        assert!(!plan.takes[1].depletes);
        assert_eq!(plan.total_taken(), 8);
    }

    #[test]
    fn fifo_reports_shortfall() {
        let batches = vec![(id(1), 3)];
        let plan = plan_fifo_deduction(&batches, 10);

        assert_eq!(plan.outcome, DeductionOutcome::Partial { short_by: 7 });
        assert_eq!(plan.total_taken(), 3);
    }

    #[test]
    fn fifo_with_no_batches() {
        let plan = plan_fifo_deduction(&[], 4);
        assert_eq!(plan.outcome, DeductionOutcome::NoStock);
        assert!(plan.takes.is_empty());
    }

    #[test]
    fn fifo_skips_drained_batches() {
        let batches = vec![(id(1), 0), (id(2), 6)];
        let plan = plan_fifo_deduction(&batches, 6);

        assert_eq!(plan.outcome, DeductionOutcome::Full);
        assert_eq!(plan.takes.len(), 1);
        assert_eq!(plan.takes[0].batch_id, id(2));
        assert!(plan.takes[0].depletes);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn batches_strategy() -> impl Strategy<Value = Vec<(Uuid, i64)>> {
            prop::collection::vec((1u128..1000, 0i64..500), 0..12)
                .prop_map(|v| v.into_iter().map(|(n, q)| (Uuid::from_u128(n), q)).collect())
        }

        proptest! {
            /// The plan never takes more than requested, never takes more
            /// than any batch holds, and consumes strictly oldest-first.
            #[test]
            fn plan_never_overdraws(batches in batches_strategy(), requested in 1i64..2000) {
                let plan = plan_fifo_deduction(&batches, requested);

                let available: i64 = batches.iter().map(|&(_, q)| q.max(0)).sum();
                prop_assert_eq!(plan.total_taken(), requested.min(available));

                let mut cursor = 0usize;
                for take in &plan.takes {
                    prop_assert!(take.quantity > 0);
                    // Each take must come from the next non-empty batch in order
                    while batches[cursor].1 <= 0 || batches[cursor].0 != take.batch_id {
                        cursor += 1;
                    }
                    let (_, remaining) = batches[cursor];
                    prop_assert!(take.quantity <= remaining);
                    prop_assert_eq!(take.depletes, take.quantity == remaining);
                    cursor += 1;
                }
            }

            /// Outcome classification matches the shortfall arithmetic.
            #[test]
            fn outcome_matches_shortfall(batches in batches_strategy(), requested in 1i64..2000) {
                let plan = plan_fifo_deduction(&batches, requested);
                let taken = plan.total_taken();

                match plan.outcome {
                    DeductionOutcome::Full => prop_assert_eq!(taken, requested),
                    DeductionOutcome::Partial { short_by } => {
                        prop_assert!(taken > 0 && taken < requested);
                        prop_assert_eq!(short_by, requested - taken);
                    }
                    DeductionOutcome::NoStock => prop_assert_eq!(taken, 0),
                }
                prop_assert_eq!(plan.outcome.shortfall(requested), requested - taken);
            }
        }
    }
}
