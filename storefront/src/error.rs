//! Storefront errors.
//!
//! `Display` is the message shown to the customer.

use crate::service::ServiceError;
use crate::types::{RaffleStatus, TicketNumber};
use rifa_runtime::StoreError;
use thiserror::Error;

fn join(numbers: &[TicketNumber]) -> String {
    numbers.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Why a storefront operation was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorefrontError {
    /// No raffle loaded yet
    #[error("no raffle is loaded")]
    NoRaffle,

    /// The raffle is not selling tickets
    #[error("this raffle is {status} and not accepting tickets")]
    RaffleClosed {
        /// Current status
        status: RaffleStatus,
    },

    /// Number outside `1..=total_tickets`
    #[error("ticket {number} does not exist (1 to {total})")]
    OutOfRange {
        /// Requested number
        number: TicketNumber,
        /// Tickets in the raffle
        total: u32,
    },

    /// Number reserved or sold already
    #[error("ticket {number} is not available")]
    NotAvailable {
        /// Requested number
        number: TicketNumber,
    },

    /// Nothing selected
    #[error("select at least one ticket")]
    EmptySelection,

    /// Under the per-purchase minimum
    #[error("select at least {min} tickets")]
    BelowMinimum {
        /// Minimum per purchase
        min: u32,
    },

    /// Over the per-person limit
    #[error("you can select at most {max} tickets")]
    AboveMaximum {
        /// Limit per person
        max: u32,
    },

    /// Quick pick asked for more numbers than remain
    #[error("only {available} tickets are left, cannot pick {requested}")]
    NotEnoughAvailable {
        /// Numbers requested
        requested: u32,
        /// Numbers left in the pool
        available: u32,
    },

    /// Availability check found taken numbers (already removed from the selection)
    #[error("tickets {} are no longer available", join(.numbers))]
    TicketsUnavailable {
        /// Numbers that were taken
        numbers: Vec<TicketNumber>,
    },

    /// Hold refused because someone else got there first
    #[error("tickets {} were just taken by someone else", join(.numbers))]
    AlreadyTaken {
        /// Numbers that were taken
        numbers: Vec<TicketNumber>,
    },

    /// Another request for this selection is pending
    #[error("please wait for the current request to finish")]
    RequestInFlight,

    /// Order submitted without a live hold
    #[error("your tickets are not reserved, reserve them first")]
    NoReservation,

    /// The hold lapsed
    #[error("your reservation expired, please select your tickets again")]
    ReservationExpired,

    /// Order submitted without a payment method
    #[error("choose a payment method")]
    NoPaymentMethod,

    /// Customer details rejected
    #[error("check your details: {0}")]
    InvalidCustomer(String),

    /// Payment details rejected
    #[error("check your payment details: {0}")]
    InvalidPayment(String),

    /// Cart change refused
    #[error("{0}")]
    Cart(String),

    /// Any other backend failure
    #[error("something went wrong: {0}")]
    Service(ServiceError),

    /// The store did not accept or finish the request
    #[error("the storefront is busy, try again: {0}")]
    Runtime(#[from] StoreError),
}

impl From<ServiceError> for StorefrontError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::AlreadyTaken { numbers } => Self::AlreadyTaken { numbers },
            ServiceError::ReservationExpired => Self::ReservationExpired,
            ServiceError::ReservationNotFound => Self::NoReservation,
            other => Self::Service(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_customer_facing() {
        let error = StorefrontError::TicketsUnavailable {
            numbers: vec![TicketNumber::new(7), TicketNumber::new(42)],
        };
        assert_eq!(error.to_string(), "tickets 7, 42 are no longer available");
        assert_eq!(StorefrontError::BelowMinimum { min: 2 }.to_string(), "select at least 2 tickets");
    }

    #[test]
    fn test_service_errors_map_to_checkout_errors() {
        let taken = vec![TicketNumber::new(3)];
        assert_eq!(
            StorefrontError::from(ServiceError::AlreadyTaken { numbers: taken.clone() }),
            StorefrontError::AlreadyTaken { numbers: taken }
        );
        assert_eq!(StorefrontError::from(ServiceError::ReservationNotFound), StorefrontError::NoReservation);
        assert!(matches!(
            StorefrontError::from(ServiceError::Transport("reset".to_string())),
            StorefrontError::Service(_)
        ));
    }
}
