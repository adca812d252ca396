//! Raffle API client over HTTP.
//!
//! Every response is an [`ApiResponse`] envelope. Reads are retried with
//! backoff on transport and server errors; writes only on `RATE_LIMITED`,
//! which guarantees the server did not act on the request.

use super::{
    AvailabilityRequest, AvailabilityResponse, OrderRequest, RaffleService, ReserveRequest,
    ServiceError, ServiceFuture, ServiceResult,
};
use crate::api::{ApiError, ApiErrorCode, ApiResponse, ApiUrls};
use crate::order::PurchaseOrder;
use crate::types::{OrderId, Raffle, RaffleId, Reservation, ReservationId, TicketNumber};
use reqwest::{Client, Method, RequestBuilder, Response};
use rifa_runtime::retry::{retry_with_predicate, RetryPolicy};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

fn transport(error: impl std::fmt::Display) -> ServiceError {
    ServiceError::Transport(error.to_string())
}

const fn is_rate_limited(error: &ServiceError) -> bool {
    matches!(error, ServiceError::Api { code: ApiErrorCode::RateLimited, .. })
}

/// Outcome of one release attempt
///
/// A retry that finds no hold means an earlier attempt was applied and only
/// its response got lost.
fn settle_release(result: ServiceResult<ReservationId>, retried: bool) -> ServiceResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(ServiceError::ReservationNotFound) if retried => {
            tracing::debug!("Hold already released by an earlier attempt");
            Ok(())
        },
        Err(error) => Err(error),
    }
}

/// Unwrap an envelope, falling back to the HTTP status when the body is not one
async fn decode<T: DeserializeOwned>(response: Response) -> ServiceResult<T> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport)?;

    match serde_json::from_slice::<ApiResponse<T>>(&body) {
        Ok(envelope) => envelope.into_result().map_err(ServiceError::from),
        Err(e) if status.is_success() => Err(transport(format!("invalid response body: {e}"))),
        Err(_) => {
            let message = String::from_utf8_lossy(&body).trim().to_string();
            let message = if message.is_empty() { status.to_string() } else { message };
            Err(ApiError::new(ApiErrorCode::from_http_status(status.as_u16()), message).into())
        },
    }
}

/// HTTP implementation of [`RaffleService`]
#[derive(Clone, Debug)]
pub struct HttpRaffleService {
    client: Client,
    urls: ApiUrls,
    retry: RetryPolicy,
    token: Option<String>,
}

impl HttpRaffleService {
    /// Client for the API at `urls` with a per-request `timeout`
    ///
    /// # Errors
    ///
    /// [`ServiceError::Transport`] if the HTTP client cannot be built.
    pub fn new(urls: ApiUrls, timeout: Duration) -> ServiceResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(transport)?;
        Ok(Self { client, urls, retry: RetryPolicy::default(), token: None })
    }

    /// Replace the retry policy for reads
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send `Authorization: Bearer <token>` with every request
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// The endpoint catalogue in use
    #[must_use]
    pub const fn urls(&self) -> &ApiUrls {
        &self.urls
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, url: &str) -> ServiceResult<T> {
        let response = self.request(method, url).send().await.map_err(transport)?;
        decode(response).await
    }

    async fn call_with<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> ServiceResult<T> {
        let response = self.request(method, url).json(body).send().await.map_err(transport)?;
        decode(response).await
    }
}

impl RaffleService for HttpRaffleService {
    fn get_raffle(&self, raffle_id: RaffleId) -> ServiceFuture<Raffle> {
        let this = self.clone();
        Box::pin(async move {
            let url = this.urls.raffle(raffle_id);
            retry_with_predicate(&this.retry, "get_raffle", || this.call(Method::GET, &url), ServiceError::is_retryable)
                .await
        })
    }

    fn available_numbers(&self, raffle_id: RaffleId) -> ServiceFuture<Vec<TicketNumber>> {
        let this = self.clone();
        Box::pin(async move {
            let url = this.urls.raffle_numbers(raffle_id);
            retry_with_predicate(
                &this.retry,
                "available_numbers",
                || this.call(Method::GET, &url),
                ServiceError::is_retryable,
            )
            .await
        })
    }

    fn check_availability(
        &self,
        raffle_id: RaffleId,
        numbers: Vec<TicketNumber>,
    ) -> ServiceFuture<Vec<TicketNumber>> {
        let this = self.clone();
        Box::pin(async move {
            let url = this.urls.raffle_availability(raffle_id);
            let body = AvailabilityRequest { numbers };
            let response: AvailabilityResponse = retry_with_predicate(
                &this.retry,
                "check_availability",
                || this.call_with(Method::POST, &url, &body),
                ServiceError::is_retryable,
            )
            .await?;
            Ok(response.unavailable)
        })
    }

    fn reserve(
        &self,
        raffle_id: RaffleId,
        numbers: Vec<TicketNumber>,
        ttl: Duration,
    ) -> ServiceFuture<Reservation> {
        let this = self.clone();
        Box::pin(async move {
            let url = this.urls.reservations();
            let body = ReserveRequest { raffle_id, numbers, ttl_secs: ttl.as_secs() };
            retry_with_predicate(
                &this.retry,
                "reserve",
                || this.call_with(Method::POST, &url, &body),
                is_rate_limited,
            )
            .await
        })
    }

    fn release(&self, reservation_id: ReservationId) -> ServiceFuture<()> {
        let this = self.clone();
        Box::pin(async move {
            let url = this.urls.reservation(reservation_id);
            let mut attempts = 0u32;
            retry_with_predicate(
                &this.retry,
                "release",
                || {
                    attempts += 1;
                    let retried = attempts > 1;
                    let attempt = this.call(Method::DELETE, &url);
                    async move { settle_release(attempt.await, retried) }
                },
                ServiceError::is_retryable,
            )
            .await
        })
    }

    fn submit_order(&self, request: OrderRequest) -> ServiceFuture<PurchaseOrder> {
        let this = self.clone();
        Box::pin(async move {
            let url = this.urls.orders();
            retry_with_predicate(
                &this.retry,
                "submit_order",
                || this.call_with(Method::POST, &url, &request),
                is_rate_limited,
            )
            .await
        })
    }

    fn get_order(&self, order_id: OrderId) -> ServiceFuture<PurchaseOrder> {
        let this = self.clone();
        Box::pin(async move {
            let url = this.urls.order(order_id);
            retry_with_predicate(&this.retry, "get_order", || this.call(Method::GET, &url), ServiceError::is_retryable)
                .await
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let service = HttpRaffleService::new(ApiUrls::new("http://localhost:3000/api/"), Duration::from_secs(5))
            .unwrap()
            .with_bearer_token("token")
            .with_retry_policy(RetryPolicy::none());

        assert_eq!(service.urls().base(), "http://localhost:3000/api");
        assert_eq!(service.token.as_deref(), Some("token"));
        assert_eq!(service.retry.max_retries, 0);
    }

    #[test]
    fn test_retried_release_of_missing_hold_succeeds() {
        let id = ReservationId::new();
        assert_eq!(settle_release(Ok(id), false), Ok(()));
        assert_eq!(settle_release(Err(ServiceError::ReservationNotFound), true), Ok(()));
        assert_eq!(
            settle_release(Err(ServiceError::ReservationNotFound), false),
            Err(ServiceError::ReservationNotFound)
        );
        assert_eq!(
            settle_release(Err(ServiceError::ReservationExpired), true),
            Err(ServiceError::ReservationExpired)
        );
    }

    #[test]
    fn test_only_rate_limiting_retries_writes() {
        assert!(is_rate_limited(&ServiceError::api(ApiErrorCode::RateLimited, "slow down")));
        assert!(!is_rate_limited(&ServiceError::Transport("reset".to_string())));
        assert!(!is_rate_limited(&ServiceError::api(ApiErrorCode::InternalError, "boom")));
    }
}
