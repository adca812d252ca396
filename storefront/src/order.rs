//! Purchase orders and their status machine.
//!
//! ```text
//! draft → pending_payment → pending_verification → completed
//!   └──────────┴───────────────────┴──→ cancelled | expired
//! ```

use crate::pricing::PriceBreakdown;
use crate::types::{Customer, OrderId, PaymentDetails, RaffleId, ReservationId, TicketNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Status of a purchase order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Being assembled, not submitted
    Draft,
    /// Submitted, waiting for the customer to pay
    PendingPayment,
    /// Customer reported payment, operator is checking it
    PendingVerification,
    /// Payment confirmed, tickets sold
    Completed,
    /// Cancelled by customer or operator
    Cancelled,
    /// Payment deadline passed
    Expired,
}

impl OrderStatus {
    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }

    /// Whether `self → next` is a legal transition
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Draft, Self::PendingPayment)
            | (Self::PendingPayment, Self::PendingVerification)
            | (Self::PendingVerification, Self::Completed) => true,
            (from, Self::Cancelled | Self::Expired) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "draft",
            Self::PendingPayment => "pending_payment",
            Self::PendingVerification => "pending_verification",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        };
        f.write_str(label)
    }
}

/// Illegal status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("order cannot move from {from} to {to}")]
pub struct InvalidTransition {
    /// Current status
    pub from: OrderStatus,
    /// Requested status
    pub to: OrderStatus,
}

/// A submitted purchase
///
/// Everything except `status` and `updated_at` is fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    /// Order ID
    pub id: OrderId,
    /// Raffle the tickets belong to
    pub raffle_id: RaffleId,
    /// Hold the order was created from
    pub reservation_id: ReservationId,
    /// Ticket numbers, in selection order
    pub tickets: Vec<TicketNumber>,
    /// Buyer
    pub customer: Customer,
    /// Chosen payment method
    pub payment: PaymentDetails,
    /// Price at submission
    pub pricing: PriceBreakdown,
    /// Current status
    pub status: OrderStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the last status change
    pub updated_at: DateTime<Utc>,
    /// Payment deadline
    pub expires_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// Move to `next`, stamping `updated_at`
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if the status machine forbids the move.
    pub fn transition(&mut self, next: OrderStatus, at: DateTime<Utc>) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    /// Whether the payment deadline passed while still unpaid
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, OrderStatus::Draft | OrderStatus::PendingPayment) && now >= self.expires_at
    }
}
