//! Checkout flow tests.
//!
//! Drives the [`Storefront`] facade against the in-memory backend: selection,
//! availability check, hold, order, and cart persistence across sessions.
//!
//! Run with: `cargo test --test checkout_flow_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use rifa_core::environment::Clock;
use rifa_storefront::aggregates::cart::CART_STORAGE_KEY;
use rifa_storefront::fixtures::{demo_raffle, DEMO_RAFFLE_ID};
use rifa_storefront::service::{OrderRequest, ServiceFuture};
use rifa_storefront::{
    Customer, FileStorage, InMemoryRaffleService, Money, OrderId, OrderStatus, PaymentDetails, PaymentMethod,
    PurchaseOrder, Raffle, RaffleId, RaffleService, Reservation, ReservationId, SeededPicker, Storage, Storefront,
    StorefrontError, TicketNumber,
};
use rifa_testing::{mocks::ManualClock, test_time};
use std::sync::Arc;
use std::time::Duration;

fn n(raw: u32) -> TicketNumber {
    TicketNumber::new(raw)
}

fn customer() -> Customer {
    Customer {
        name: "María Fernanda Ruiz".to_string(),
        email: "mafer@example.mx".to_string(),
        phone: "3398765432".to_string(),
        state: Some("Jalisco".to_string()),
    }
}

async fn backend(clock: &ManualClock) -> InMemoryRaffleService {
    let service = InMemoryRaffleService::new(Arc::new(clock.clone()));
    service.add_raffle(demo_raffle(test_time())).await.expect("publish raffle");
    service
}

async fn storefront_with_picker(service: &InMemoryRaffleService, clock: &ManualClock, seed: u64) -> Storefront {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    Storefront::builder(Arc::new(service.clone()))
        .clock(clock)
        .picker(Arc::new(SeededPicker::new(seed)))
        .build()
        .await
}

async fn storefront(service: &InMemoryRaffleService, clock: &ManualClock) -> Storefront {
    storefront_with_picker(service, clock, 11).await
}

/// Hand-picked selection → hold → order, then the operator completes it.
#[tokio::test]
async fn test_full_checkout_and_completion() {
    let clock = ManualClock::new(test_time());
    let service = backend(&clock).await;
    let storefront = storefront(&service, &clock).await;

    storefront.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
    for number in [3, 14, 15, 92, 65, 35, 89, 79, 32, 38] {
        storefront.select(n(number)).await.unwrap();
    }
    assert_eq!(storefront.total().await, Money::from_pesos(900));

    storefront.set_customer(customer()).await.unwrap();
    storefront.set_payment(PaymentDetails::new(PaymentMethod::Spei)).await.unwrap();
    let order = storefront.checkout().await.unwrap();

    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.tickets.len(), 10);
    assert_eq!(order.pricing.discount_percentage, 10);
    assert_eq!(order.customer, customer());

    let raffle = storefront.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
    assert_eq!(raffle.available_tickets, 990);
    assert!(!storefront.selection().await.available.contains(&n(92)));

    service.mark_payment_submitted(order.id).await.unwrap();
    service.complete_order(order.id).await.unwrap();
    let refreshed = storefront.refresh_order(order.id).await.unwrap();
    assert_eq!(refreshed.status, OrderStatus::Completed);
    assert_eq!(
        storefront.cart().await.order(order.id).map(|o| o.status),
        Some(OrderStatus::Completed)
    );

    let raffle = storefront.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
    assert_eq!(raffle.sold_tickets, 10);
}

/// A number bought by someone else stops the checkout before any hold is taken.
#[tokio::test]
async fn test_checkout_reports_numbers_taken_since_loading() {
    let clock = ManualClock::new(test_time());
    let service = backend(&clock).await;
    let storefront = storefront(&service, &clock).await;

    storefront.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
    storefront.select(n(1)).await.unwrap();
    storefront.select(n(2)).await.unwrap();
    storefront.set_customer(customer()).await.unwrap();
    storefront.set_payment(PaymentDetails::new(PaymentMethod::Oxxo)).await.unwrap();

    service.mark_sold(DEMO_RAFFLE_ID, &[n(2)]).await.unwrap();

    let error = storefront.checkout().await.unwrap_err();
    assert_eq!(error, StorefrontError::TicketsUnavailable { numbers: vec![n(2)] });

    let selection = storefront.selection().await;
    assert_eq!(selection.selected, vec![n(1)]);
    assert!(selection.reservation.is_none());
    assert!(service.orders().await.is_empty());
}

/// A lapsed hold cannot be turned into an order and its numbers are free again.
#[tokio::test]
async fn test_lapsed_hold_blocks_submission() {
    let clock = ManualClock::new(test_time());
    let service = backend(&clock).await;
    let storefront = storefront(&service, &clock).await;

    storefront.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
    let hold = storefront.reserve(vec![n(500), n(501)]).await.unwrap();
    assert_eq!(hold.expires_at, test_time() + chrono::Duration::minutes(15));

    clock.advance(chrono::Duration::minutes(16));

    let error = storefront
        .submit_order(customer(), Some(PaymentDetails::new(PaymentMethod::Oxxo)))
        .await
        .unwrap_err();
    assert_eq!(error, StorefrontError::NoReservation);

    let rival = storefront_with_picker(&service, &clock, 3).await;
    rival.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
    let taken_over = rival.reserve(vec![n(500), n(501)]).await.unwrap();
    assert_ne!(taken_over.id, hold.id);
}

/// Backend whose releases take a while to land
#[derive(Clone)]
struct SlowRelease {
    inner: InMemoryRaffleService,
    delay: Duration,
}

impl RaffleService for SlowRelease {
    fn get_raffle(&self, raffle_id: RaffleId) -> ServiceFuture<Raffle> {
        self.inner.get_raffle(raffle_id)
    }

    fn available_numbers(&self, raffle_id: RaffleId) -> ServiceFuture<Vec<TicketNumber>> {
        self.inner.available_numbers(raffle_id)
    }

    fn check_availability(&self, raffle_id: RaffleId, numbers: Vec<TicketNumber>) -> ServiceFuture<Vec<TicketNumber>> {
        self.inner.check_availability(raffle_id, numbers)
    }

    fn reserve(&self, raffle_id: RaffleId, numbers: Vec<TicketNumber>, ttl: Duration) -> ServiceFuture<Reservation> {
        self.inner.reserve(raffle_id, numbers, ttl)
    }

    fn release(&self, reservation_id: ReservationId) -> ServiceFuture<()> {
        let inner = self.inner.clone();
        let delay = self.delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            inner.release(reservation_id).await
        })
    }

    fn submit_order(&self, request: OrderRequest) -> ServiceFuture<PurchaseOrder> {
        self.inner.submit_order(request)
    }

    fn get_order(&self, order_id: OrderId) -> ServiceFuture<PurchaseOrder> {
        self.inner.get_order(order_id)
    }
}

/// Growing a held selection re-holds the old numbers instead of reporting them taken.
#[tokio::test]
async fn test_growing_held_selection_keeps_own_numbers() {
    let clock = ManualClock::new(test_time());
    let service = backend(&clock).await;
    let slow = SlowRelease { inner: service.clone(), delay: Duration::from_millis(50) };
    let storefront = Storefront::builder(Arc::new(slow))
        .clock(Arc::new(clock.clone()))
        .build()
        .await;

    storefront.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
    let first = storefront.reserve(vec![n(3), n(4)]).await.unwrap();
    let second = storefront.reserve(vec![n(3), n(4), n(5)]).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(second.numbers, vec![n(3), n(4), n(5)]);

    let selection = storefront.selection().await;
    assert_eq!(selection.selected, vec![n(3), n(4), n(5)]);
    assert!(selection.available.contains(&n(3)));
    assert!(selection.last_unavailable.is_empty());

    let raffle = service.get_raffle(DEMO_RAFFLE_ID).await.unwrap();
    assert_eq!(raffle.available_tickets, 997);
}

/// Changing the selection gives the hold back to the pool.
#[tokio::test]
async fn test_selection_change_releases_hold() {
    let clock = ManualClock::new(test_time());
    let service = backend(&clock).await;
    let storefront = storefront(&service, &clock).await;

    storefront.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
    storefront.reserve(vec![n(40), n(41)]).await.unwrap();
    let taken = service.check_availability(DEMO_RAFFLE_ID, vec![n(40), n(41)]).await.unwrap();
    assert_eq!(taken, vec![n(40), n(41)]);

    storefront.deselect(n(41)).await.unwrap();
    assert!(storefront.selection().await.reservation.is_none());

    let taken = service.check_availability(DEMO_RAFFLE_ID, vec![n(40), n(41)]).await.unwrap();
    assert!(taken.is_empty());
}

/// Customer and order history survive a restart with file storage.
#[tokio::test]
async fn test_cart_survives_restart() {
    let dir = std::env::temp_dir().join(format!("rifa-cart-{}", uuid::Uuid::new_v4()));
    let clock = ManualClock::new(test_time());
    let service = backend(&clock).await;

    let order_id = {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.clone()));
        let transfer = PaymentDetails {
            bank_name: Some("BBVA México".to_string()),
            account_holder: Some("María Fernanda Ruiz".to_string()),
            account_number: Some("4410987654321".to_string()),
            clabe: Some("012180001234567891".to_string()),
            ..PaymentDetails::new(PaymentMethod::BankTransfer)
        };
        let storefront = Storefront::builder(Arc::new(service.clone()))
            .clock(Arc::new(clock.clone()))
            .storage(storage)
            .build()
            .await;

        storefront.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
        storefront.quick_pick(3).await.unwrap();
        storefront.set_customer(customer()).await.unwrap();
        storefront.set_payment(transfer).await.unwrap();
        let order = storefront.checkout().await.unwrap();
        assert_eq!(order.payment.clabe.as_deref(), Some("012180001234567891"));
        storefront.shutdown(Duration::from_secs(1)).await.unwrap();
        order.id
    };

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.clone()));
    let raw = storage.load(CART_STORAGE_KEY).await.unwrap().unwrap();
    assert!(!raw.contains("012180001234567891"));
    assert!(!raw.contains("4410987654321"));
    assert!(!raw.contains("BBVA"));

    let restored = Storefront::builder(Arc::new(service.clone()))
        .clock(Arc::new(clock.clone()))
        .storage(storage)
        .build()
        .await;

    let cart = restored.cart().await;
    assert_eq!(cart.customer, Some(customer()));
    assert_eq!(cart.order(order_id).map(|o| o.status), Some(OrderStatus::PendingPayment));
    assert_eq!(
        cart.order(order_id).map(|o| o.payment.clone()),
        Some(PaymentDetails::new(PaymentMethod::BankTransfer))
    );
    // Payment choice is per checkout and not persisted
    assert!(cart.payment.is_none());

    restored.clear_cart().await.unwrap();
    assert!(restored.cart().await.orders.is_empty());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}
