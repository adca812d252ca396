//! Raffle API surface: endpoint catalogue and JSON envelopes.

pub mod envelope;
pub mod urls;

pub use envelope::{ApiError, ApiErrorCode, ApiResponse, PaginatedResponse};
pub use urls::{paths, ApiUrls};
