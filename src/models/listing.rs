//! Represents a listing — a product or service offered for sale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// The two flavors of listing the catalog carries. The kind never changes
/// after creation and scopes every query, so `/products` routes can never
/// see or mutate a service row and vice versa.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Product,
    Service,
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingKind::Product => f.write_str("product"),
            ListingKind::Service => f.write_str("service"),
        }
    }
}

/// An item for sale, owned by exactly one user.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Opaque unique id, assigned at creation, immutable.
    pub id: Uuid,

    /// Whether this row is a product or a service.
    pub kind: ListingKind,

    /// Id of the user who created the listing. Fixed at creation.
    pub owner_id: Uuid,

    /// Name of the category this listing belongs to. Must exist at write
    /// time; categories are referenced by name, not versioned.
    pub category_name: String,

    pub name: String,

    pub description: String,

    /// Asking price, fixed-point with two fractional digits.
    #[sqlx(rename = "price_cents")]
    pub price: Price,

    pub created_at: DateTime<Utc>,

    /// Bumped on every successful mutation, including empty patches.
    pub updated_at: DateTime<Utc>,
}

const PRICE_MAX_INTEGER_DIGITS: usize = 8;

/// A non-negative monetary amount with exactly two fractional digits,
/// held as integer cents (the decimal(10,2) shape of the listing table).
///
/// Parsing accepts `"199"`, `"199.9"`, and `"199.90"`; everything else —
/// signs, more than two fraction digits, more than eight integer digits,
/// non-digits — is rejected. Display and JSON always render the canonical
/// two-digit form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, sqlx::Type)]
#[sqlx(transparent)]
pub struct Price(i64);

#[derive(Debug, Error)]
#[error("invalid price `{0}`: expected a non-negative decimal with at most two fractional digits")]
pub struct PriceError(String);

impl Price {
    /// Parse a decimal string into cents, normalizing short fractions.
    pub fn parse(input: &str) -> Result<Self, PriceError> {
        let malformed = || PriceError(input.to_string());

        let (whole, fraction) = match input.split_once('.') {
            // a trailing dot ("1.") is malformed, not a zero fraction
            Some((_, "")) => return Err(malformed()),
            Some((whole, fraction)) => (whole, fraction),
            None => (input, ""),
        };

        if whole.is_empty()
            || whole.len() > PRICE_MAX_INTEGER_DIGITS
            || !whole.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }
        if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        let whole: i64 = whole.parse().map_err(|_| malformed())?;
        let cents = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| malformed())? * 10,
            _ => fraction.parse::<i64>().map_err(|_| malformed())?,
        };

        Ok(Price(whole * 100 + cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Price::parse(s)
    }
}

impl Serialize for Price {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Price::parse(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::Price;

    #[test]
    fn parse_normalizes_short_fractions() {
        assert_eq!(Price::parse("199.90").unwrap().cents(), 19990);
        assert_eq!(Price::parse("199.9").unwrap().cents(), 19990);
        assert_eq!(Price::parse("199").unwrap().cents(), 19900);
        assert_eq!(Price::parse("0.05").unwrap().to_string(), "0.05");
    }

    #[test]
    fn parse_rejects_malformed_amounts() {
        for bad in ["", "-1", "+1", "1.234", "abc", "1,50", ".50", "1.", "123456789"] {
            assert!(Price::parse(bad).is_err(), "expected `{}` to be rejected", bad);
        }
        // exactly eight integer digits is still fine
        assert!(Price::parse("99999999.99").is_ok());
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(Price::parse("7.5").unwrap().to_string(), "7.50");
        assert_eq!(Price::parse("7").unwrap().to_string(), "7.00");
    }
}
