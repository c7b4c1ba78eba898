//! Stock level type.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Stock`] level.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    /// The input is empty or whitespace.
    #[error("stock is required")]
    Empty,
    /// The input is not a whole number.
    #[error("stock must be a whole number")]
    NotAnInteger,
    /// The count is below zero.
    #[error("stock cannot be negative")]
    Negative,
}

/// Units on hand for a product.
///
/// A non-negative whole number. Transmitted as a JSON integer; a negative
/// value from the wire fails deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stock(u32);

impl Stock {
    /// Create a stock level.
    #[must_use]
    pub const fn new(units: u32) -> Self {
        Self(units)
    }

    /// Parse a stock level from user-entered text.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, not an integer, or negative.
    pub fn parse(s: &str) -> Result<Self, StockError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StockError::Empty);
        }
        let units: i64 = s.parse().map_err(|_| StockError::NotAnInteger)?;
        if units < 0 {
            return Err(StockError::Negative);
        }
        u32::try_from(units)
            .map(Self)
            .map_err(|_| StockError::NotAnInteger)
    }

    /// Returns the number of units.
    #[must_use]
    pub const fn units(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Stock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Stock {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
