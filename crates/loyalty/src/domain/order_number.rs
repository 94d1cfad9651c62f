//! Order Number Value Object
//!
//! Customer-facing order identifiers are decimal integers whose low digit is
//! a Luhn mod-10 checksum. Construction enforces the checksum; parsing from
//! request text distinguishes "not a number" from "checksum failed" because
//! the two map to different HTTP statuses.

use std::fmt;

use crate::error::{LoyaltyError, LoyaltyResult};

/// A Luhn-valid order number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderNumber(i64);

impl OrderNumber {
    /// Validate a raw integer as an order number
    pub fn new(number: i64) -> LoyaltyResult<Self> {
        if !luhn_valid(number) {
            return Err(LoyaltyError::LuhnInvalid);
        }
        Ok(Self(number))
    }

    /// Parse request text into an order number
    pub fn parse(text: &str) -> LoyaltyResult<Self> {
        let number: i64 = text
            .trim()
            .parse()
            .map_err(|_| LoyaltyError::OrderNotNumeric)?;
        Self::new(number)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Luhn mod-10 check over the decimal digits of `number`
fn luhn_valid(number: i64) -> bool {
    if number < 0 {
        return false;
    }

    let mut sum = 0;
    let mut rest = number;
    let mut double = false;

    while rest > 0 {
        let mut digit = rest % 10;
        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        double = !double;
        rest /= 10;
    }

    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luhn_boundary_values() {
        assert!(luhn_valid(12345678903));
        assert!(!luhn_valid(12345678900));
        assert!(!luhn_valid(12345678901));
    }

    #[test]
    fn test_luhn_small_numbers() {
        assert!(luhn_valid(0));
        assert!(luhn_valid(18));
        assert!(!luhn_valid(19));
        assert!(!luhn_valid(-12345678903));
    }

    #[test]
    fn test_new_enforces_checksum() {
        assert!(OrderNumber::new(12345678903).is_ok());
        assert!(matches!(
            OrderNumber::new(12345678901),
            Err(LoyaltyError::LuhnInvalid)
        ));
    }

    #[test]
    fn test_parse() {
        let number = OrderNumber::parse("12345678903").unwrap();
        assert_eq!(number.get(), 12345678903);
        assert_eq!(number.to_string(), "12345678903");

        assert!(matches!(
            OrderNumber::parse("not-a-number"),
            Err(LoyaltyError::OrderNotNumeric)
        ));
        assert!(matches!(
            OrderNumber::parse(""),
            Err(LoyaltyError::OrderNotNumeric)
        ));
        assert!(matches!(
            OrderNumber::parse("12345678900"),
            Err(LoyaltyError::LuhnInvalid)
        ));
    }
}
