//! Dev HTTP server over the in-memory backend.
//!
//! Serves the raffle API under `/api` using the same paths and envelopes the
//! HTTP client expects, so the storefront can run end to end on one machine.
//! - Application state
//! - Health check endpoint
//! - Raffle, reservation, order and admin handlers

pub mod handlers;
pub mod health;
pub mod routes;
pub mod state;

pub use health::health_check;
pub use routes::build_router;
pub use state::AppState;
