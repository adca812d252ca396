//! HTTP client against the dev server.
//!
//! Starts the axum router on an ephemeral port and drives it through
//! [`HttpRaffleService`], checking that envelopes and error codes survive the
//! round trip.
//!
//! Run with: `cargo test --test http_client_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use rifa_core::environment::{Clock, SystemClock};
use rifa_runtime::retry::RetryPolicy;
use rifa_storefront::api::{ApiErrorCode, ApiUrls};
use rifa_storefront::fixtures::{demo_raffle, DEMO_RAFFLE_ID};
use rifa_storefront::server::{build_router, AppState};
use rifa_storefront::service::OrderRequest;
use rifa_storefront::{
    Customer, HttpRaffleService, InMemoryRaffleService, OrderId, OrderStatus, PaymentDetails, PaymentMethod,
    RaffleId, RaffleService, ServiceError, Storefront, TicketNumber,
};
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(15 * 60);

fn numbers(raw: &[u32]) -> Vec<TicketNumber> {
    raw.iter().copied().map(TicketNumber::new).collect()
}

fn customer() -> Customer {
    Customer {
        name: "Jorge Ramírez".to_string(),
        email: "jorge@example.mx".to_string(),
        phone: "6641234567".to_string(),
        state: Some("Baja California".to_string()),
    }
}

struct TestServer {
    urls: ApiUrls,
    backend: InMemoryRaffleService,
}

impl TestServer {
    async fn start() -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let backend = InMemoryRaffleService::new(Arc::clone(&clock));
        backend.add_raffle(demo_raffle(clock.now())).await.expect("publish raffle");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local address");
        let router = build_router(AppState::new(backend.clone(), clock.now()));
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server");
        });

        Self { urls: ApiUrls::new(format!("http://{address}/api")), backend }
    }

    fn client(&self) -> HttpRaffleService {
        HttpRaffleService::new(self.urls.clone(), Duration::from_secs(5))
            .expect("client")
            .with_retry_policy(RetryPolicy::none())
    }
}

#[tokio::test]
async fn test_reads_over_http() {
    let server = TestServer::start().await;
    let client = server.client();

    let raffle = client.get_raffle(DEMO_RAFFLE_ID).await.unwrap();
    assert_eq!(raffle.total_tickets, 1000);
    assert_eq!(raffle.bulk_discounts.tiers().len(), 4);

    let available = client.available_numbers(DEMO_RAFFLE_ID).await.unwrap();
    assert_eq!(available.len(), 1000);

    let missing = client.get_raffle(RaffleId::new()).await.unwrap_err();
    assert!(matches!(missing, ServiceError::NotFound(_)));
    let missing = client.get_order(OrderId::new()).await.unwrap_err();
    assert_eq!(missing.code(), ApiErrorCode::NotFound);

    let health: serde_json::Value = reqwest::get(server.urls.base().replace("/api", "/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["raffles"], 1);
}

#[tokio::test]
async fn test_hold_release_and_conflict() {
    let server = TestServer::start().await;
    let client = server.client();

    let hold = client.reserve(DEMO_RAFFLE_ID, numbers(&[7, 8]), TTL).await.unwrap();
    assert_eq!(hold.numbers, numbers(&[7, 8]));

    let conflict = client.reserve(DEMO_RAFFLE_ID, numbers(&[8, 9]), TTL).await.unwrap_err();
    assert_eq!(conflict, ServiceError::AlreadyTaken { numbers: numbers(&[8]) });

    let taken = client.check_availability(DEMO_RAFFLE_ID, numbers(&[6, 7, 8])).await.unwrap();
    assert_eq!(taken, numbers(&[7, 8]));

    client.release(hold.id).await.unwrap();
    assert_eq!(client.release(hold.id).await, Err(ServiceError::ReservationNotFound));
    assert!(client.check_availability(DEMO_RAFFLE_ID, numbers(&[7, 8])).await.unwrap().is_empty());

    let invalid = client.reserve(DEMO_RAFFLE_ID, Vec::new(), TTL).await.unwrap_err();
    assert_eq!(invalid.code(), ApiErrorCode::ValidationError);

    // The server shortens holds to its own maximum
    let ten_years = Duration::from_secs(10 * 365 * 24 * 60 * 60);
    let capped = client.reserve(DEMO_RAFFLE_ID, numbers(&[900]), ten_years).await.unwrap();
    assert!(capped.expires_at <= chrono::Utc::now() + chrono::Duration::minutes(15));
}

#[tokio::test]
async fn test_order_submission_and_admin_status() {
    let server = TestServer::start().await;
    let client = server.client();

    let hold = client.reserve(DEMO_RAFFLE_ID, numbers(&[1, 2, 3, 4, 5]), TTL).await.unwrap();
    let order = client
        .submit_order(OrderRequest {
            raffle_id: DEMO_RAFFLE_ID,
            reservation_id: hold.id,
            tickets: hold.numbers.clone(),
            customer: customer(),
            payment: PaymentDetails::new(PaymentMethod::Oxxo),
        })
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.pricing.discount_percentage, 5);
    assert_eq!(client.get_order(order.id).await.unwrap(), order);

    let http = reqwest::Client::new();
    let response = http
        .put(server.urls.admin_order_status(order.id))
        .json(&serde_json::json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();
    // pending_payment cannot jump straight to completed
    assert_eq!(response.status().as_u16(), ApiErrorCode::InvalidOrderStatus.http_status());

    server.backend.mark_payment_submitted(order.id).await.unwrap();
    let response = http
        .put(server.urls.admin_order_status(order.id))
        .json(&serde_json::json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let page: serde_json::Value = http
        .get(format!("{}?status=completed&perPage=10", server.urls.admin_orders()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["success"], true);
    assert_eq!(page["data"]["items"].as_array().map(Vec::len), Some(1));

    let raffle = client.get_raffle(DEMO_RAFFLE_ID).await.unwrap();
    assert_eq!(raffle.sold_tickets, 5);
}

#[tokio::test]
async fn test_storefront_checkout_over_http() {
    let server = TestServer::start().await;
    let storefront = Storefront::builder(Arc::new(server.client())).build().await;

    storefront.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
    storefront.quick_pick(10).await.unwrap();
    storefront.set_customer(customer()).await.unwrap();
    storefront
        .set_payment(PaymentDetails::new(PaymentMethod::Spei))
        .await
        .unwrap();
    let order = storefront.checkout().await.unwrap();

    let stored = server.backend.orders().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, order.id);
    assert_eq!(stored[0].pricing, order.pricing);

    storefront.shutdown(Duration::from_secs(1)).await.unwrap();
}
