//! Bulk discount tiers and price computation.
//!
//! A price is a pure function of the unit price, the ticket count and the
//! raffle's discount table. All arithmetic is in centavos and discounts round
//! down, so `discount + total == subtotal` always holds.

use crate::types::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One volume discount tier: `discount_percentage` off for counts in `[min, max]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDiscount {
    /// Smallest count the tier applies to
    pub min_quantity: u32,
    /// Largest count the tier applies to, `None` for an open-ended tier
    #[serde(default)]
    pub max_quantity: Option<u32>,
    /// Percentage off the subtotal, `0..=100`
    pub discount_percentage: u32,
}

impl BulkDiscount {
    /// Bounded tier
    #[must_use]
    pub const fn range(min_quantity: u32, max_quantity: u32, discount_percentage: u32) -> Self {
        Self { min_quantity, max_quantity: Some(max_quantity), discount_percentage }
    }

    /// Open-ended tier
    #[must_use]
    pub const fn open_ended(min_quantity: u32, discount_percentage: u32) -> Self {
        Self { min_quantity, max_quantity: None, discount_percentage }
    }

    /// Whether `quantity` falls inside the tier
    #[must_use]
    pub fn contains(&self, quantity: u32) -> bool {
        quantity >= self.min_quantity && self.max_quantity.is_none_or(|max| quantity <= max)
    }
}

/// Rejected discount table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountError {
    /// A tier starts at zero tickets
    #[error("discount tier cannot start at zero tickets")]
    ZeroMinimum,
    /// `min > max`
    #[error("discount tier {min}..{max} is empty")]
    EmptyRange {
        /// Tier minimum
        min: u32,
        /// Tier maximum
        max: u32,
    },
    /// More than 100% off
    #[error("discount of {0}% exceeds 100%")]
    PercentageTooHigh(u32),
    /// Two tiers share a count
    #[error("discount tiers starting at {first} and {second} overlap")]
    Overlap {
        /// Start of the earlier tier
        first: u32,
        /// Start of the later tier
        second: u32,
    },
}

/// Validated, non-overlapping discount tiers sorted by `min_quantity`
///
/// Deserialization runs the same validation as [`DiscountTable::new`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BulkDiscount>", into = "Vec<BulkDiscount>")]
pub struct DiscountTable(Vec<BulkDiscount>);

impl DiscountTable {
    /// Validate and sort tiers
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError`] for a zero minimum, an empty range, a
    /// percentage over 100 or overlapping tiers. Only the last tier may be
    /// open-ended.
    pub fn new(mut tiers: Vec<BulkDiscount>) -> Result<Self, DiscountError> {
        tiers.sort_by_key(|t| t.min_quantity);

        for tier in &tiers {
            if tier.min_quantity == 0 {
                return Err(DiscountError::ZeroMinimum);
            }
            if let Some(max) = tier.max_quantity {
                if max < tier.min_quantity {
                    return Err(DiscountError::EmptyRange { min: tier.min_quantity, max });
                }
            }
            if tier.discount_percentage > 100 {
                return Err(DiscountError::PercentageTooHigh(tier.discount_percentage));
            }
        }

        for pair in tiers.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            let disjoint = first.max_quantity.is_some_and(|max| max < second.min_quantity);
            if !disjoint {
                return Err(DiscountError::Overlap {
                    first: first.min_quantity,
                    second: second.min_quantity,
                });
            }
        }

        Ok(Self(tiers))
    }

    /// The tiers, sorted
    #[must_use]
    pub fn tiers(&self) -> &[BulkDiscount] {
        &self.0
    }

    /// Tier applying to `quantity`
    ///
    /// The highest percentage among the tiers containing `quantity` wins, so an
    /// open-ended tier covers every count above the bounded maxima.
    #[must_use]
    pub fn tier_for(&self, quantity: u32) -> Option<&BulkDiscount> {
        self.0
            .iter()
            .filter(|tier| tier.contains(quantity))
            .max_by_key(|tier| tier.discount_percentage)
    }

    /// Discount percentage for `quantity`, zero when no tier applies
    #[must_use]
    pub fn percentage_for(&self, quantity: u32) -> u32 {
        self.tier_for(quantity).map_or(0, |tier| tier.discount_percentage)
    }

    /// The next tier above `quantity`, for "add N more to save X%" hints
    #[must_use]
    pub fn next_tier(&self, quantity: u32) -> Option<&BulkDiscount> {
        let current = self.percentage_for(quantity);
        self.0
            .iter()
            .find(|tier| tier.min_quantity > quantity && tier.discount_percentage > current)
    }
}

impl TryFrom<Vec<BulkDiscount>> for DiscountTable {
    type Error = DiscountError;

    fn try_from(tiers: Vec<BulkDiscount>) -> Result<Self, Self::Error> {
        Self::new(tiers)
    }
}

impl From<DiscountTable> for Vec<BulkDiscount> {
    fn from(table: DiscountTable) -> Self {
        table.0
    }
}

/// Price overflowed `u64` centavos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("price of {quantity} tickets overflows")]
pub struct PriceOverflow {
    /// Ticket count that overflowed
    pub quantity: u32,
}

/// Computed price of a selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    /// Number of tickets
    pub quantity: u32,
    /// Price per ticket
    pub unit_price: Money,
    /// `quantity * unit_price`
    pub subtotal: Money,
    /// Applied tier percentage
    pub discount_percentage: u32,
    /// Amount taken off the subtotal
    pub discount: Money,
    /// Amount to pay
    pub total: Money,
}

impl PriceBreakdown {
    /// Price of an empty selection
    #[must_use]
    pub const fn empty(unit_price: Money) -> Self {
        Self {
            quantity: 0,
            unit_price,
            subtotal: Money::ZERO,
            discount_percentage: 0,
            discount: Money::ZERO,
            total: Money::ZERO,
        }
    }

    /// Compute the price of `quantity` tickets
    ///
    /// # Errors
    ///
    /// Returns [`PriceOverflow`] if the subtotal does not fit in `u64` centavos.
    pub fn compute(
        unit_price: Money,
        quantity: u32,
        discounts: &DiscountTable,
    ) -> Result<Self, PriceOverflow> {
        let overflow = PriceOverflow { quantity };

        let subtotal = unit_price.checked_multiply(quantity).ok_or(overflow)?;
        let discount_percentage = discounts.percentage_for(quantity);
        let discount = subtotal.checked_percentage(discount_percentage).ok_or(overflow)?;
        let total = subtotal.checked_sub(discount).ok_or(overflow)?;

        Ok(Self {
            quantity,
            unit_price,
            subtotal,
            discount_percentage,
            discount,
            total,
        })
    }

    /// Whether a tier discount applies
    #[must_use]
    pub const fn has_discount(&self) -> bool {
        self.discount_percentage > 0
    }
}
