//! JSON envelopes shared by the raffle API client and the dev server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes reported by the raffle API
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    /// Missing or invalid credentials
    Unauthorized,
    /// Authenticated but not allowed
    Forbidden,
    /// Resource does not exist
    NotFound,
    /// Malformed or inconsistent request
    ValidationError,
    /// Raffle is not on sale
    RaffleNotActive,
    /// Some requested numbers are reserved or sold
    TicketsNotAvailable,
    /// The hold lapsed
    ReservationExpired,
    /// Unknown hold
    ReservationNotFound,
    /// Above the per-person limit
    MaxTicketsExceeded,
    /// Below the per-purchase minimum
    MinTicketsRequired,
    /// Payment could not be recorded
    PaymentFailed,
    /// Order status change not allowed
    InvalidOrderStatus,
    /// Too many requests
    RateLimited,
    /// Unexpected server failure
    InternalError,
}

impl ApiErrorCode {
    /// HTTP status the dev server answers with
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound | Self::ReservationNotFound => 404,
            Self::TicketsNotAvailable | Self::InvalidOrderStatus => 409,
            Self::ReservationExpired => 410,
            Self::ValidationError
            | Self::RaffleNotActive
            | Self::MaxTicketsExceeded
            | Self::MinTicketsRequired => 422,
            Self::PaymentFailed => 402,
            Self::RateLimited => 429,
            Self::InternalError => 500,
        }
    }

    /// Code used when a response carries an HTTP error status without an envelope
    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::TicketsNotAvailable,
            410 => Self::ReservationExpired,
            400 | 422 => Self::ValidationError,
            429 => Self::RateLimited,
            _ => Self::InternalError,
        }
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same spelling as on the wire
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(code)) => f.write_str(&code),
            _ => write!(f, "{self:?}"),
        }
    }
}

/// Error body of a failed call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine readable code
    pub code: ApiErrorCode,
    /// Human readable message
    pub message: String,
    /// Extra structured data (e.g. the taken ticket numbers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Error without details
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    /// Attach structured details
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Envelope wrapping every API response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded
    pub success: bool,
    /// Payload on success
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    /// Optional informational message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, message: None }
    }

    /// Failed response carrying `error`
    #[must_use]
    pub const fn failure(error: ApiError) -> Self {
        Self { success: false, data: None, error: Some(error), message: None }
    }

    /// Attach an informational message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Collapse the envelope into a `Result`
    ///
    /// # Errors
    ///
    /// Returns the carried [`ApiError`], or an `INTERNAL_ERROR` when a
    /// response claims success without data (or failure without an error).
    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (false, _, Some(error)) => Err(error),
            (true, None, _) => Err(ApiError::new(ApiErrorCode::InternalError, "response has no data")),
            (false, _, None) => Err(ApiError::new(
                ApiErrorCode::InternalError,
                self.message.unwrap_or_else(|| "request failed".to_string()),
            )),
        }
    }
}

/// One page of a listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub per_page: u32,
    /// Items across all pages
    pub total: u64,
    /// Number of pages
    pub total_pages: u32,
}

impl<T: Clone> PaginatedResponse<T> {
    /// Cut page `page` (1-based) of `per_page` items out of `all`
    ///
    /// Page numbers below 1 are treated as 1 and a zero page size as 1.
    #[must_use]
    pub fn paginate(all: &[T], page: u32, per_page: u32) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = all.len() as u64;
        let total_pages = u32::try_from(total.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX);

        let start = usize::try_from(u64::from(page - 1) * u64::from(per_page)).unwrap_or(usize::MAX);
        let items = all.iter().skip(start).take(per_page as usize).cloned().collect();

        Self { items, page, per_page, total, total_pages }
    }
}
