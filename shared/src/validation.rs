//! Validation utilities for the Warehouse Operations Platform
//!
//! Engine calls validate their inputs with these helpers before opening a
//! transaction; nothing is mutated on a validation failure.

// ============================================================================
// Quantity Validations
// ============================================================================

/// Validate that a movement quantity is strictly positive
pub fn validate_positive_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a recorded count (zero is a legitimate physical count)
pub fn validate_counted_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity < 0 {
        return Err("Counted quantity cannot be negative");
    }
    Ok(())
}

/// Validate a count recorded against a per-serial line: one serial is
/// either seen or not
pub fn validate_serial_line_count(quantity: i64) -> Result<(), &'static str> {
    if quantity > 1 {
        return Err("A serial-tracked line is counted as 0 or 1");
    }
    Ok(())
}

/// Validate serial numbers against a movement quantity: when serials are
/// given there must be exactly one per unit, all distinct.
pub fn validate_serial_numbers(quantity: i64, serials: &[String]) -> Result<(), &'static str> {
    if serials.is_empty() {
        return Ok(());
    }
    if serials.len() as i64 != quantity {
        return Err("Serial numbers must match quantity one-to-one");
    }
    for (i, serial) in serials.iter().enumerate() {
        if serial.trim().is_empty() {
            return Err("Serial numbers cannot be blank");
        }
        if serials[..i].contains(serial) {
            return Err("Serial numbers must be distinct");
        }
    }
    Ok(())
}

// ============================================================================
// Bin Validations
// ============================================================================

/// Validate a bin code: non-empty, printable, bounded length
pub fn validate_bin_code(bin: &str) -> Result<(), &'static str> {
    let trimmed = bin.trim();
    if trimmed.is_empty() {
        return Err("Bin code is required");
    }
    if trimmed.len() > 64 {
        return Err("Bin code cannot exceed 64 characters");
    }
    Ok(())
}

/// Validate that source and destination of a move differ
pub fn validate_distinct_bins(source: &str, destination: &str) -> Result<(), &'static str> {
    if source.trim() == destination.trim() {
        return Err("Source and destination bins must differ");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_quantity() {
        assert!(validate_positive_quantity(1).is_ok());
        assert!(validate_positive_quantity(0).is_err());
        assert!(validate_positive_quantity(-3).is_err());
    }

    #[test]
    fn counted_quantity_allows_zero() {
        assert!(validate_counted_quantity(0).is_ok());
        assert!(validate_counted_quantity(-1).is_err());
    }

    #[test]
    fn serial_line_counts_are_binary() {
        assert!(validate_serial_line_count(0).is_ok());
        assert!(validate_serial_line_count(1).is_ok());
        assert!(validate_serial_line_count(2).is_err());
    }

    #[test]
    fn serials_must_match_quantity() {
        let serials = vec!["SN1".to_string(), "SN2".to_string()];
        assert!(validate_serial_numbers(2, &serials).is_ok());
        assert!(validate_serial_numbers(3, &serials).is_err());
        assert!(validate_serial_numbers(5, &[]).is_ok());
    }

    #[test]
    fn serials_must_be_distinct() {
        let serials = vec!["SN1".to_string(), "SN1".to_string()];
        assert!(validate_serial_numbers(2, &serials).is_err());
    }

    #[test]
    fn bin_codes() {
        assert!(validate_bin_code("A-01-03").is_ok());
        assert!(validate_bin_code("   ").is_err());
        assert!(validate_bin_code(&"x".repeat(65)).is_err());
    }

    #[test]
    fn distinct_bins() {
        assert!(validate_distinct_bins("A-01", "A-02").is_ok());
        assert!(validate_distinct_bins("A-01", "A-01").is_err());
    }
}
