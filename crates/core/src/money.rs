//! Fixed-point monetary amounts.
//!
//! The till tracks a single currency with two fractional digits. Amounts are
//! stored as whole cents in an `i64`; arithmetic is checked so a long run of
//! movements can never silently wrap or drift. Floating point is banned from
//! every money path, including serialization (amounts travel as decimal
//! strings like `"1500.00"`).

use core::fmt;
use core::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A monetary amount in whole cents (scale 2 fixed-point).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked subtraction; `None` on overflow.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    /// Parse a decimal string with at most two fractional digits.
    ///
    /// Accepted: `"1500"`, `"1500.5"`, `"1500.00"`, `"-50.25"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || DomainError::validation(format!("invalid monetary amount: {s:?}"));

        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, frac) = match rest.split_once('.') {
            Some((w, f)) => (w, f),
            None => (rest, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let mut frac_cents: i64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| invalid())?
        };
        if frac.len() == 1 {
            frac_cents *= 10;
        }

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or_else(invalid)?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_two_digit_decimals() {
        let m: Money = "1500.00".parse().unwrap();
        assert_eq!(m.cents(), 150_000);
        assert_eq!(m.to_string(), "1500.00");

        let m: Money = "0.5".parse().unwrap();
        assert_eq!(m.cents(), 50);
        assert_eq!(m.to_string(), "0.50");

        let m: Money = "200".parse().unwrap();
        assert_eq!(m.cents(), 20_000);
    }

    #[test]
    fn negative_amounts_round_trip() {
        let m: Money = "-50.25".parse().unwrap();
        assert_eq!(m.cents(), -5025);
        assert_eq!(m.to_string(), "-50.25");
        assert!(m.is_negative());
    }

    #[test]
    fn rejects_malformed_amounts() {
        for bad in ["", "-", "1.234", "1,50", "abc", "1.5x", "--2"] {
            assert!(bad.parse::<Money>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn checked_arithmetic_surfaces_overflow() {
        let max = Money::from_cents(i64::MAX);
        assert!(max.checked_add(Money::from_cents(1)).is_none());
        assert_eq!(
            Money::from_cents(1300).checked_sub(Money::from_cents(50)),
            Some(Money::from_cents(1250))
        );
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let m: Money = "1300.00".parse().unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"1300.00\"");
        let back: Money = serde_json::from_str("\"1300.00\"").unwrap();
        assert_eq!(back, m);
    }
}
