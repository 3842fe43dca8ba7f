//! Bin allocation models
//!
//! A bin allocation records how much of an item physically sits in one
//! storage bin, with serial numbers attached for serial-tracked items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Quantity of an item present in one bin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinAllocation {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    pub bin: String,
    /// Invariant: >= 0 at all times; rows at zero are removed
    pub quantity: i64,
    /// Serial numbers on hand, in insertion order
    pub serial_numbers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Check that incoming stock can merge into an existing allocation.
///
/// An allocation row either carries one serial per unit or none at all;
/// letting a serial-less quantity merge into a serialized row (or the
/// reverse) would leave the row with fewer serials than units and make it
/// impossible to drain. Duplicate serials are rejected for the same reason.
pub fn check_serial_merge(on_hand: &[String], incoming: &[String]) -> Result<(), &'static str> {
    if on_hand.is_empty() != incoming.is_empty() {
        return Err("Cannot mix serial-tracked and untracked stock in one allocation");
    }
    for serial in incoming {
        if on_hand.contains(serial) {
            return Err("Serial number already present at bin");
        }
    }
    Ok(())
}

/// Pick the serial numbers to remove from an allocation.
///
/// Transfers and damage moves name the exact serials; sales do not, in which
/// case the oldest serials by insertion order are taken. Returns the serials
/// that remain on the allocation.
pub fn take_serials(
    on_hand: &[String],
    quantity: usize,
    requested: Option<&[String]>,
) -> Result<Vec<String>, &'static str> {
    match requested {
        Some(serials) => {
            if serials.len() != quantity {
                return Err("Serial count does not match quantity");
            }
            let mut remaining = on_hand.to_vec();
            for serial in serials {
                let pos = remaining
                    .iter()
                    .position(|s| s == serial)
                    .ok_or("Serial number not present at bin")?;
                remaining.remove(pos);
            }
            Ok(remaining)
        }
        None => {
            if quantity > on_hand.len() {
                return Err("Not enough serial numbers at bin");
            }
            Ok(on_hand[quantity..].to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serials(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn takes_oldest_serials_when_unspecified() {
        let on_hand = serials(&["a", "b", "c"]);
        let remaining = take_serials(&on_hand, 2, None).unwrap();
        assert_eq!(remaining, serials(&["c"]));
    }

    #[test]
    fn takes_named_serials() {
        let on_hand = serials(&["a", "b", "c"]);
        let wanted = serials(&["c", "a"]);
        let remaining = take_serials(&on_hand, 2, Some(&wanted)).unwrap();
        assert_eq!(remaining, serials(&["b"]));
    }

    #[test]
    fn rejects_missing_serial() {
        let on_hand = serials(&["a"]);
        let wanted = serials(&["x"]);
        assert!(take_serials(&on_hand, 1, Some(&wanted)).is_err());
    }

    #[test]
    fn rejects_serial_quantity_mismatch() {
        let on_hand = serials(&["a", "b"]);
        let wanted = serials(&["a"]);
        assert!(take_serials(&on_hand, 2, Some(&wanted)).is_err());
    }

    #[test]
    fn merge_requires_matching_serial_tracking() {
        let tracked = serials(&["a", "b"]);
        assert!(check_serial_merge(&tracked, &serials(&["c"])).is_ok());
        assert!(check_serial_merge(&[], &[]).is_ok());
        assert!(check_serial_merge(&tracked, &[]).is_err());
        assert!(check_serial_merge(&[], &tracked).is_err());
    }

    #[test]
    fn merge_rejects_duplicate_serial() {
        let tracked = serials(&["a", "b"]);
        assert!(check_serial_merge(&tracked, &serials(&["b"])).is_err());
    }
}
