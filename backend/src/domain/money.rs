//! Monetary amounts, purchase quantities and paging windows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation errors for the numeric value types in this module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountValidationError {
    /// Money must never be negative.
    #[error("amount must not be negative, got {0}")]
    NegativeAmount(i64),
    /// Purchases must request at least one unit.
    #[error("quantity must be a positive integer, got {0}")]
    NonPositiveQuantity(i64),
    /// Quantities are bounded by the storage column width.
    #[error("quantity {0} exceeds the supported maximum")]
    QuantityTooLarge(i64),
}

/// Non-negative amount of money in minor currency units (e.g. cents).
///
/// # Examples
/// ```
/// use storefront::domain::Money;
///
/// let price = Money::new(100).expect("non-negative");
/// assert_eq!(price.checked_times(5), Money::new(500).ok());
/// assert_eq!(Money::MAX.checked_times(2), None);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct Money(i64);

impl Money {
    /// Zero minor units.
    pub const ZERO: Self = Self(0);
    /// Largest representable amount.
    pub const MAX: Self = Self(i64::MAX);

    /// Construct a validated amount.
    ///
    /// # Errors
    ///
    /// Returns [`AmountValidationError::NegativeAmount`] for negative input.
    pub const fn new(minor_units: i64) -> Result<Self, AmountValidationError> {
        if minor_units < 0 {
            return Err(AmountValidationError::NegativeAmount(minor_units));
        }
        Ok(Self(minor_units))
    }

    /// Raw value in minor units.
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Multiply by a unit count, returning `None` on overflow.
    #[must_use]
    pub fn checked_times(self, units: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(units)).map(Self)
    }

    /// Subtract `other`, returning `None` when the result would be negative.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0
            .checked_sub(other.0)
            .and_then(|value| Self::new(value).ok())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Money {
    type Error = AmountValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

/// Number of units requested by a single purchase.
///
/// Always at least one and never larger than `i32::MAX` so it fits the
/// `quantity` and `in_stock` storage columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Validate a caller-supplied quantity.
    ///
    /// # Errors
    ///
    /// Returns [`AmountValidationError::NonPositiveQuantity`] for zero or
    /// negative input and [`AmountValidationError::QuantityTooLarge`] when
    /// the value does not fit the storage column.
    pub fn new(units: i64) -> Result<Self, AmountValidationError> {
        if units <= 0 {
            return Err(AmountValidationError::NonPositiveQuantity(units));
        }
        i32::try_from(units)
            .ok()
            .and_then(|value| u32::try_from(value).ok())
            .map(Self)
            .ok_or(AmountValidationError::QuantityTooLarge(units))
    }

    /// Unit count.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = AmountValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

/// Limit/offset window for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    limit: u32,
    offset: u32,
}

impl PageRequest {
    /// Largest page a caller may request.
    pub const MAX_LIMIT: u32 = 100;

    /// Build a page window, clamping `limit` into `1..=MAX_LIMIT`.
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset,
        }
    }

    /// Maximum number of rows to return.
    pub const fn limit(self) -> u32 {
        self.limit
    }

    /// Number of rows to skip.
    pub const fn offset(self) -> u32 {
        self.offset
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(20, 0)
    }
}
