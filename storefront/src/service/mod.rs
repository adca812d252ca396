//! Raffle backend interface.
//!
//! [`RaffleService`] is the seam between the storefront reducers and whoever
//! owns ticket inventory. Two implementations ship:
//!
//! - [`HttpRaffleService`]: talks to the raffle API over HTTP
//! - [`InMemoryRaffleService`]: authoritative in-process backend (dev server,
//!   demo, tests)

use crate::api::{ApiError, ApiErrorCode};
use crate::order::PurchaseOrder;
use crate::types::{
    Customer, OrderId, PaymentDetails, Raffle, RaffleId, Reservation, ReservationId, TicketNumber,
};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod http;
pub mod memory;

pub use http::HttpRaffleService;
pub use memory::InMemoryRaffleService;

/// Result type of every service call
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Boxed future returned by [`RaffleService`] methods
pub type ServiceFuture<T> = BoxFuture<'static, ServiceResult<T>>;

/// Backend failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Some numbers were reserved or sold by someone else
    #[error("tickets already taken: {numbers:?}")]
    AlreadyTaken {
        /// The taken numbers
        numbers: Vec<TicketNumber>,
    },
    /// The hold lapsed before it was used
    #[error("reservation expired")]
    ReservationExpired,
    /// Unknown or already released hold
    #[error("reservation not found")]
    ReservationNotFound,
    /// Unknown raffle or order
    #[error("{0} not found")]
    NotFound(String),
    /// Request rejected as malformed
    #[error("invalid request: {0}")]
    Validation(String),
    /// Any other API error
    #[error("{code}: {message}")]
    Api {
        /// API error code
        code: ApiErrorCode,
        /// API message
        message: String,
    },
    /// Network or decoding failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    /// The API code this error is reported as
    #[must_use]
    pub const fn code(&self) -> ApiErrorCode {
        match self {
            Self::AlreadyTaken { .. } => ApiErrorCode::TicketsNotAvailable,
            Self::ReservationExpired => ApiErrorCode::ReservationExpired,
            Self::ReservationNotFound => ApiErrorCode::ReservationNotFound,
            Self::NotFound(_) => ApiErrorCode::NotFound,
            Self::Validation(_) => ApiErrorCode::ValidationError,
            Self::Api { code, .. } => *code,
            Self::Transport(_) => ApiErrorCode::InternalError,
        }
    }

    /// Whether repeating the same call may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Api { code: ApiErrorCode::RateLimited | ApiErrorCode::InternalError, .. }
        )
    }

    /// Shorthand for [`ServiceError::Api`]
    #[must_use]
    pub fn api(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self::Api { code, message: message.into() }
    }
}

/// Details block of a `TICKETS_NOT_AVAILABLE` error
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TakenDetails {
    numbers: Vec<TicketNumber>,
}

impl From<&ServiceError> for ApiError {
    fn from(error: &ServiceError) -> Self {
        let api_error = Self::new(error.code(), error.to_string());
        match error {
            ServiceError::AlreadyTaken { numbers } => match serde_json::to_value(TakenDetails {
                numbers: numbers.clone(),
            }) {
                Ok(details) => api_error.with_details(details),
                Err(_) => api_error,
            },
            _ => api_error,
        }
    }
}

impl From<ApiError> for ServiceError {
    fn from(error: ApiError) -> Self {
        match error.code {
            ApiErrorCode::TicketsNotAvailable => {
                let numbers = error
                    .details
                    .and_then(|details| serde_json::from_value::<TakenDetails>(details).ok())
                    .map(|d| d.numbers)
                    .unwrap_or_default();
                Self::AlreadyTaken { numbers }
            },
            ApiErrorCode::ReservationExpired => Self::ReservationExpired,
            ApiErrorCode::ReservationNotFound => Self::ReservationNotFound,
            ApiErrorCode::NotFound => Self::NotFound(error.message),
            ApiErrorCode::ValidationError => Self::Validation(error.message),
            code => Self::Api { code, message: error.message },
        }
    }
}

/// Everything needed to turn a hold into an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Raffle the tickets belong to
    pub raffle_id: RaffleId,
    /// Hold covering `tickets`
    pub reservation_id: ReservationId,
    /// Numbers to buy, must equal the held numbers
    pub tickets: Vec<TicketNumber>,
    /// Buyer
    pub customer: Customer,
    /// Chosen payment method
    pub payment: PaymentDetails,
}

/// Body of a hold request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    /// Raffle to hold numbers in
    pub raffle_id: RaffleId,
    /// Numbers to hold
    pub numbers: Vec<TicketNumber>,
    /// Requested hold length in seconds
    pub ttl_secs: u64,
}

/// Body of an availability check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    /// Numbers to check
    pub numbers: Vec<TicketNumber>,
}

/// Result of an availability check
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    /// Requested numbers that are no longer available
    pub unavailable: Vec<TicketNumber>,
}

/// Raffle backend
///
/// Methods return `'static` boxed futures so reducers can hand them to
/// effects after cloning the `Arc<dyn RaffleService>` out of their
/// environment.
pub trait RaffleService: Send + Sync {
    /// Fetch a raffle with current inventory counters
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown raffle.
    fn get_raffle(&self, raffle_id: RaffleId) -> ServiceFuture<Raffle>;

    /// Numbers nobody holds or bought, ascending
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown raffle.
    fn available_numbers(&self, raffle_id: RaffleId) -> ServiceFuture<Vec<TicketNumber>>;

    /// The subset of `numbers` that is no longer available
    ///
    /// Advisory only; [`RaffleService::reserve`] is the authoritative check.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown raffle.
    fn check_availability(
        &self,
        raffle_id: RaffleId,
        numbers: Vec<TicketNumber>,
    ) -> ServiceFuture<Vec<TicketNumber>>;

    /// Hold `numbers` for `ttl`, all or nothing
    ///
    /// # Errors
    ///
    /// [`ServiceError::AlreadyTaken`] listing every number someone else holds
    /// or bought; validation and raffle-state errors otherwise.
    fn reserve(
        &self,
        raffle_id: RaffleId,
        numbers: Vec<TicketNumber>,
        ttl: Duration,
    ) -> ServiceFuture<Reservation>;

    /// Give a hold back
    ///
    /// # Errors
    ///
    /// [`ServiceError::ReservationNotFound`] if the hold is unknown or gone.
    fn release(&self, reservation_id: ReservationId) -> ServiceFuture<()>;

    /// Turn a hold into an order in `pending_payment`
    ///
    /// # Errors
    ///
    /// [`ServiceError::ReservationExpired`] / [`ServiceError::ReservationNotFound`]
    /// when the hold is gone, [`ServiceError::Validation`] for mismatched tickets.
    fn submit_order(&self, request: OrderRequest) -> ServiceFuture<PurchaseOrder>;

    /// Fetch an order
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown order.
    fn get_order(&self, order_id: OrderId) -> ServiceFuture<PurchaseOrder>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_error() -> Vec<ServiceError> {
        vec![
            ServiceError::AlreadyTaken { numbers: vec![TicketNumber::new(3), TicketNumber::new(9)] },
            ServiceError::ReservationExpired,
            ServiceError::ReservationNotFound,
            ServiceError::NotFound("raffle".to_string()),
            ServiceError::Validation("empty".to_string()),
            ServiceError::api(ApiErrorCode::RaffleNotActive, "raffle ended"),
            ServiceError::api(ApiErrorCode::MaxTicketsExceeded, "limit 100"),
        ]
    }

    #[test]
    fn test_api_error_round_trip_keeps_variant() {
        for error in every_error() {
            let api = ApiError::from(&error);
            assert_eq!(api.code, error.code());

            let back = ServiceError::from(api);
            assert_eq!(back.code(), error.code());
            if let ServiceError::AlreadyTaken { numbers } = &error {
                assert_eq!(back, ServiceError::AlreadyTaken { numbers: numbers.clone() });
            }
        }
    }

    #[test]
    fn test_transport_maps_to_internal_error() {
        let error = ServiceError::Transport("connection reset".to_string());
        assert_eq!(error.code(), ApiErrorCode::InternalError);
        assert!(error.is_retryable());
        assert!(!ServiceError::ReservationExpired.is_retryable());
    }

    #[test]
    fn test_every_code_maps_to_a_service_error() {
        use ApiErrorCode::*;
        for code in [
            Unauthorized, Forbidden, NotFound, ValidationError, RaffleNotActive, TicketsNotAvailable,
            ReservationExpired, ReservationNotFound, MaxTicketsExceeded, MinTicketsRequired,
            PaymentFailed, InvalidOrderStatus, RateLimited, InternalError,
        ] {
            let error = ServiceError::from(ApiError::new(code, "x"));
            assert_eq!(error.code(), code);
        }
    }
}
