//! Router configuration for the dev server.

use super::handlers;
use super::health::health_check;
use super::state::AppState;
use crate::api::paths;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

/// Build the complete Axum router.
///
/// - `/health`
/// - raffle reads, availability check
/// - reservations (hold / release)
/// - orders (submit / fetch)
/// - admin order listing and status changes
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Raffles
        .route(paths::RAFFLE, get(handlers::get_raffle))
        .route(paths::RAFFLE_NUMBERS, get(handlers::available_numbers))
        .route(paths::RAFFLE_AVAILABILITY, post(handlers::check_availability))
        // Holds
        .route(paths::RESERVATIONS, post(handlers::reserve))
        .route(paths::RESERVATION, delete(handlers::release))
        // Orders
        .route(paths::ORDERS, post(handlers::submit_order))
        .route(paths::ORDER, get(handlers::get_order))
        // Admin
        .route(paths::ADMIN_ORDERS, get(handlers::list_orders))
        .route(paths::ADMIN_ORDER_STATUS, put(handlers::set_order_status));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .with_state(state)
}
