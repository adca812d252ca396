//! Raffle API handlers.
//!
//! Every response body is an [`ApiResponse`] envelope. Failures carry the
//! [`ApiErrorCode`](crate::api::ApiErrorCode) of the [`ServiceError`] and its
//! HTTP status.

use super::state::AppState;
use crate::api::{ApiError, ApiResponse, PaginatedResponse};
use crate::order::{OrderStatus, PurchaseOrder};
use crate::service::{
    AvailabilityRequest, AvailabilityResponse, OrderRequest, RaffleService, ReserveRequest, ServiceError,
};
use crate::types::{OrderId, Raffle, RaffleId, Reservation, ReservationId, TicketNumber};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default admin page size
const DEFAULT_PER_PAGE: u32 = 20;

/// Largest admin page size
const MAX_PER_PAGE: u32 = 100;

/// A [`ServiceError`] rendered as an error envelope
#[derive(Debug)]
pub struct ApiFailure(pub ServiceError);

impl From<ServiceError> for ApiFailure {
    fn from(error: ServiceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.code().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "Request refused");
        }
        (status, Json(ApiResponse::<()>::failure(ApiError::from(&self.0)))).into_response()
    }
}

/// Handler result
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiFailure>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}

// ============================================================================
// Raffles
// ============================================================================

/// `GET /api/raffles/:raffle_id`
pub async fn get_raffle(State(state): State<AppState>, Path(raffle_id): Path<RaffleId>) -> ApiResult<Raffle> {
    ok(state.service.get_raffle(raffle_id).await?)
}

/// `GET /api/raffles/:raffle_id/numbers`
pub async fn available_numbers(
    State(state): State<AppState>,
    Path(raffle_id): Path<RaffleId>,
) -> ApiResult<Vec<TicketNumber>> {
    ok(state.service.available_numbers(raffle_id).await?)
}

/// `POST /api/raffles/:raffle_id/availability`
pub async fn check_availability(
    State(state): State<AppState>,
    Path(raffle_id): Path<RaffleId>,
    Json(request): Json<AvailabilityRequest>,
) -> ApiResult<AvailabilityResponse> {
    let unavailable = state.service.check_availability(raffle_id, request.numbers).await?;
    ok(AvailabilityResponse { unavailable })
}

// ============================================================================
// Holds
// ============================================================================

/// `POST /api/reservations`
///
/// ```bash
/// curl -X POST http://localhost:8080/api/reservations \
///   -H "Content-Type: application/json" \
///   -d '{"raffleId":"7d4f3a2e-9b1c-4e8a-b5d6-0f1e2a3b4c5d","numbers":[7,42],"ttlSecs":900}'
/// ```
pub async fn reserve(State(state): State<AppState>, Json(request): Json<ReserveRequest>) -> ApiResult<Reservation> {
    if request.ttl_secs == 0 {
        return Err(ServiceError::Validation("ttlSecs must be positive".to_string()).into());
    }
    let ttl = Duration::from_secs(request.ttl_secs);
    created(state.service.reserve(request.raffle_id, request.numbers, ttl).await?)
}

/// `DELETE /api/reservations/:reservation_id`
///
/// Answers with the released reservation ID.
pub async fn release(
    State(state): State<AppState>,
    Path(reservation_id): Path<ReservationId>,
) -> ApiResult<ReservationId> {
    state.service.release(reservation_id).await?;
    ok(reservation_id)
}

// ============================================================================
// Orders
// ============================================================================

/// `POST /api/orders`
pub async fn submit_order(
    State(state): State<AppState>,
    Json(request): Json<OrderRequest>,
) -> ApiResult<PurchaseOrder> {
    created(state.service.submit_order(request).await?)
}

/// `GET /api/orders/:order_id`
pub async fn get_order(State(state): State<AppState>, Path(order_id): Path<OrderId>) -> ApiResult<PurchaseOrder> {
    ok(state.service.get_order(order_id).await?)
}

// ============================================================================
// Admin
// ============================================================================

/// Query of the admin order listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersQuery {
    /// 1-based page
    pub page: Option<u32>,
    /// Page size (capped at 100)
    pub per_page: Option<u32>,
    /// Only orders in this status
    pub status: Option<OrderStatus>,
}

/// Body of an admin status change
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Target status
    pub status: OrderStatus,
}

/// `GET /api/admin/orders?page=1&perPage=20&status=pending_payment`
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> ApiResult<PaginatedResponse<PurchaseOrder>> {
    let mut orders = state.service.orders().await;
    if let Some(status) = query.status {
        orders.retain(|o| o.status == status);
    }
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).min(MAX_PER_PAGE);
    ok(PaginatedResponse::paginate(&orders, query.page.unwrap_or(1), per_page))
}

/// `PUT /api/admin/orders/:order_id/status`
pub async fn set_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<PurchaseOrder> {
    ok(state.service.set_order_status(order_id, update.status).await?)
}
