//! Application state for the dev HTTP server.

use crate::service::InMemoryRaffleService;
use chrono::{DateTime, Utc};

/// State shared by every handler
///
/// Cloned per request; the backend shares one ledger across clones.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative ticket ledger
    pub service: InMemoryRaffleService,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// State over `service`
    #[must_use]
    pub const fn new(service: InMemoryRaffleService, started_at: DateTime<Utc>) -> Self {
        Self { service, started_at }
    }
}
