//! Common type definitions and small formatting helpers.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`UserId`]: User account identifier
//! - [`InvoiceId`]: Invoice identifier
//! - [`LineItemId`]: Line item identifier
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging
//! - [`format_money`]: Render a decimal amount with two places and thousands separators

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type InvoiceId = Uuid;
pub type LineItemId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Format an amount as `1,234.50`.
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let formatted = format!("{:.2}", rounded.abs());
    let (int_part, dec_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}{grouped}.{dec_part}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_format_money() {
        let cases = [
            ("0", "0.00"),
            ("5", "5.00"),
            ("999.999", "1,000.00"),
            ("1234.5", "1,234.50"),
            ("1234567.891", "1,234,567.89"),
            ("-42.125", "-42.13"),
            ("100000", "100,000.00"),
        ];

        for (input, expected) in cases {
            let amount = Decimal::from_str(input).unwrap();
            assert_eq!(format_money(amount), expected, "Failed for {input}");
        }
    }
}
