//! Batch ledger behavior across successive deductions
//!
//! Applies FIFO plans to an in-memory ledger the way the service applies
//! them to batch rows, and checks the bookkeeping that spans multiple calls.

use proptest::prelude::*;
use uuid::Uuid;

use shared::{plan_fifo_deduction, DeductionOutcome};

/// Minimal ledger: (batch_id, remaining) in arrival order
struct Ledger {
    batches: Vec<(Uuid, i64)>,
}

impl Ledger {
    fn new(remainings: &[i64]) -> Self {
        Self {
            batches: remainings.iter().map(|&r| (Uuid::new_v4(), r)).collect(),
        }
    }

    fn active(&self) -> Vec<(Uuid, i64)> {
        self.batches.iter().filter(|&&(_, r)| r > 0).copied().collect()
    }

    fn total(&self) -> i64 {
        self.batches.iter().map(|&(_, r)| r).sum()
    }

    /// Apply a plan the way the service updates batch rows
    fn deduct(&mut self, requested: i64) -> (i64, DeductionOutcome) {
        let plan = plan_fifo_deduction(&self.active(), requested);
        for take in &plan.takes {
            let entry = self
                .batches
                .iter_mut()
                .find(|(id, _)| *id == take.batch_id)
                .unwrap();
            entry.1 -= take.quantity;
            assert!(entry.1 >= 0, "batch overdrawn");
            assert_eq!(take.depletes, entry.1 == 0);
        }
        (plan.total_taken(), plan.outcome)
    }
}

#[test]
fn two_sales_drain_in_arrival_order() {
    // 5 + 10 on hand; selling 8 then 7 empties the ledger exactly.
    let mut ledger = Ledger::new(&[5, 10]);

    let (taken, outcome) = ledger.deduct(8);
    assert_eq!(taken, 8);
    assert_eq!(outcome, DeductionOutcome::Full);
    assert_eq!(ledger.batches[0].1, 0);
    assert_eq!(ledger.batches[1].1, 7);

    let (taken, outcome) = ledger.deduct(7);
    assert_eq!(taken, 7);
    assert_eq!(outcome, DeductionOutcome::Full);
    assert_eq!(ledger.total(), 0);
}

#[test]
fn sale_after_depletion_reports_no_stock() {
    let mut ledger = Ledger::new(&[4]);
    ledger.deduct(4);

    let (taken, outcome) = ledger.deduct(1);
    assert_eq!(taken, 0);
    assert_eq!(outcome, DeductionOutcome::NoStock);
}

#[test]
fn partial_then_restock_then_full() {
    let mut ledger = Ledger::new(&[3]);

    let (taken, outcome) = ledger.deduct(5);
    assert_eq!(taken, 3);
    assert_eq!(outcome, DeductionOutcome::Partial { short_by: 2 });

    // New receipt arrives behind the drained batch
    ledger.batches.push((Uuid::new_v4(), 10));
    let (taken, outcome) = ledger.deduct(5);
    assert_eq!(taken, 5);
    assert_eq!(outcome, DeductionOutcome::Full);
    assert_eq!(ledger.total(), 5);
}

#[test]
fn exact_deduction_depletes_batch() {
    let mut ledger = Ledger::new(&[5]);
    let (taken, outcome) = ledger.deduct(5);
    assert_eq!(taken, 5);
    assert_eq!(outcome, DeductionOutcome::Full);
}

#[test]
fn shortfall_accessor_matches_outcome() {
    assert_eq!(DeductionOutcome::Full.shortfall(4), 0);
    assert_eq!(DeductionOutcome::Partial { short_by: 3 }.shortfall(4), 3);
    assert_eq!(DeductionOutcome::NoStock.shortfall(4), 4);
}

proptest! {
    /// Stock is conserved across any sequence of deductions: what was taken
    /// plus what remains always equals what was received.
    #[test]
    fn conservation_across_deductions(
        remainings in prop::collection::vec(1i64..100, 1..8),
        requests in prop::collection::vec(1i64..150, 1..10),
    ) {
        let mut ledger = Ledger::new(&remainings);
        let received: i64 = ledger.total();

        let mut total_taken = 0;
        for requested in requests {
            let (taken, _) = ledger.deduct(requested);
            total_taken += taken;
        }

        prop_assert_eq!(total_taken + ledger.total(), received);
        prop_assert!(ledger.total() >= 0);
    }
}
