//! Authoritative in-process raffle backend.
//!
//! All ticket state lives in one ledger behind a single `tokio::sync::Mutex`,
//! so a hold is a compare-and-set over every requested number: either all of
//! them move from available to held, or none do. Expired holds and overdue
//! orders are swept lazily against the injected clock at the start of every
//! call, so no background task is needed for correctness.
//!
//! ```text
//! available ──reserve──▶ held(reservation) ──submit──▶ held(order) ──complete──▶ sold
//!     ▲                        │                            │
//!     └────── release/expiry ──┘───────── cancel/expiry ────┘
//! ```

use super::{OrderRequest, RaffleService, ServiceError, ServiceFuture, ServiceResult};
use crate::api::ApiErrorCode;
use crate::order::{OrderStatus, PurchaseOrder};
use crate::pricing::PriceBreakdown;
use crate::types::{OrderId, Raffle, RaffleId, Reservation, ReservationId, TicketNumber};
use chrono::{DateTime, Utc};
use rifa_core::environment::Clock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default time a customer has to pay after submitting an order
pub const DEFAULT_PAYMENT_WINDOW_HOURS: i64 = 48;

/// Default upper bound on the length of a hold
pub const DEFAULT_MAX_HOLD: Duration = Duration::from_secs(15 * 60);

/// How long a lapsed hold is still recognised as expired rather than unknown
const LAPSED_RETENTION_HOURS: i64 = 24;

// ============================================================================
// Ledger
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Holder {
    Reservation(ReservationId),
    Order(OrderId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TicketState {
    Available,
    Held(Holder),
    Sold,
}

/// One raffle and the state of each of its numbers (index `n - 1`)
#[derive(Debug)]
struct RaffleBook {
    raffle: Raffle,
    tickets: Vec<TicketState>,
}

impl RaffleBook {
    fn new(raffle: Raffle) -> Self {
        let tickets = vec![TicketState::Available; raffle.total_tickets as usize];
        Self { raffle, tickets }
    }

    fn state(&self, number: TicketNumber) -> Option<TicketState> {
        number
            .value()
            .checked_sub(1)
            .and_then(|i| self.tickets.get(i as usize))
            .copied()
    }

    fn set(&mut self, numbers: &[TicketNumber], state: TicketState) {
        for number in numbers {
            if let Some(slot) = number
                .value()
                .checked_sub(1)
                .and_then(|i| self.tickets.get_mut(i as usize))
            {
                *slot = state;
            }
        }
    }

    fn available(&self) -> Vec<TicketNumber> {
        self.raffle
            .numbers()
            .filter(|n| self.state(*n) == Some(TicketState::Available))
            .collect()
    }

    /// The raffle with counters recomputed from ticket state
    #[allow(clippy::cast_possible_truncation)] // ticket count fits u32 by construction
    fn snapshot(&self) -> Raffle {
        let count = |wanted: TicketState| self.tickets.iter().filter(|t| **t == wanted).count() as u32;
        Raffle {
            available_tickets: count(TicketState::Available),
            sold_tickets: count(TicketState::Sold),
            ..self.raffle.clone()
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    books: HashMap<RaffleId, RaffleBook>,
    reservations: HashMap<ReservationId, Reservation>,
    /// Lapsed hold IDs and when they lapsed
    lapsed: HashMap<ReservationId, DateTime<Utc>>,
    orders: HashMap<OrderId, PurchaseOrder>,
}

impl Ledger {
    /// Release lapsed holds and expire overdue orders, returning how many
    fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let lapsed: Vec<Reservation> = self
            .reservations
            .values()
            .filter(|r| r.is_expired(now))
            .cloned()
            .collect();

        for reservation in &lapsed {
            self.reservations.remove(&reservation.id);
            self.lapsed.insert(reservation.id, reservation.expires_at);
            if let Some(book) = self.books.get_mut(&reservation.raffle_id) {
                book.set(&reservation.numbers, TicketState::Available);
            }
            tracing::debug!(reservation_id = %reservation.id, "Hold lapsed");
        }

        let retention = chrono::Duration::hours(LAPSED_RETENTION_HOURS);
        self.lapsed.retain(|_, lapsed_at| *lapsed_at + retention > now);

        let mut overdue = 0;
        for order in self.orders.values_mut().filter(|o| o.is_overdue(now)) {
            if order.transition(OrderStatus::Expired, now).is_ok() {
                overdue += 1;
                if let Some(book) = self.books.get_mut(&order.raffle_id) {
                    book.set(&order.tickets, TicketState::Available);
                }
                tracing::info!(order_id = %order.id, "Order expired unpaid");
            }
        }

        lapsed.len() + overdue
    }

    fn book(&self, raffle_id: RaffleId) -> ServiceResult<&RaffleBook> {
        self.books
            .get(&raffle_id)
            .ok_or_else(|| ServiceError::NotFound(format!("raffle {raffle_id}")))
    }

    fn book_mut(&mut self, raffle_id: RaffleId) -> ServiceResult<&mut RaffleBook> {
        self.books
            .get_mut(&raffle_id)
            .ok_or_else(|| ServiceError::NotFound(format!("raffle {raffle_id}")))
    }

    fn reserve(
        &mut self,
        raffle_id: RaffleId,
        numbers: Vec<TicketNumber>,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> ServiceResult<Reservation> {
        let book = self.book_mut(raffle_id)?;
        let raffle = &book.raffle;

        let status = raffle.effective_status(now);
        if !status.accepts_selections() {
            return Err(ServiceError::api(
                ApiErrorCode::RaffleNotActive,
                format!("raffle is {status}"),
            ));
        }
        if numbers.is_empty() {
            return Err(ServiceError::Validation("no numbers requested".to_string()));
        }
        let unique: BTreeSet<TicketNumber> = numbers.iter().copied().collect();
        if unique.len() != numbers.len() {
            return Err(ServiceError::Validation("duplicate numbers requested".to_string()));
        }
        if let Some(outside) = numbers.iter().find(|n| !raffle.contains(**n)) {
            return Err(ServiceError::Validation(format!(
                "number {outside} is outside 1..={}",
                raffle.total_tickets
            )));
        }
        let count = numbers.len();
        if count > raffle.max_per_person as usize {
            return Err(ServiceError::api(
                ApiErrorCode::MaxTicketsExceeded,
                format!("at most {} tickets per person", raffle.max_per_person),
            ));
        }
        if count < raffle.min_per_purchase as usize {
            return Err(ServiceError::api(
                ApiErrorCode::MinTicketsRequired,
                format!("at least {} tickets per purchase", raffle.min_per_purchase),
            ));
        }

        // Compare: every number must still be available
        let taken: Vec<TicketNumber> = numbers
            .iter()
            .copied()
            .filter(|n| book.state(*n) != Some(TicketState::Available))
            .collect();
        if !taken.is_empty() {
            return Err(ServiceError::AlreadyTaken { numbers: taken });
        }

        // Set: all of them, under the same lock
        let reservation = Reservation {
            id: ReservationId::new(),
            raffle_id,
            numbers,
            expires_at: now + ttl,
        };
        book.set(&reservation.numbers, TicketState::Held(Holder::Reservation(reservation.id)));
        self.reservations.insert(reservation.id, reservation.clone());

        Ok(reservation)
    }

    fn submit_order(
        &mut self,
        request: OrderRequest,
        payment_window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> ServiceResult<PurchaseOrder> {
        let Some(reservation) = self.reservations.get(&request.reservation_id) else {
            return Err(if self.lapsed.contains_key(&request.reservation_id) {
                ServiceError::ReservationExpired
            } else {
                ServiceError::ReservationNotFound
            });
        };

        let held: BTreeSet<TicketNumber> = reservation.numbers.iter().copied().collect();
        let requested: BTreeSet<TicketNumber> = request.tickets.iter().copied().collect();
        if reservation.raffle_id != request.raffle_id
            || held != requested
            || requested.len() != request.tickets.len()
        {
            return Err(ServiceError::Validation(
                "tickets do not match the reservation".to_string(),
            ));
        }
        request.customer.validate().map_err(ServiceError::Validation)?;
        request.payment.validate().map_err(ServiceError::Validation)?;

        let book = self.book_mut(request.raffle_id)?;
        #[allow(clippy::cast_possible_truncation)] // bounded by total_tickets
        let quantity = request.tickets.len() as u32;
        let pricing = PriceBreakdown::compute(
            book.raffle.ticket_price,
            quantity,
            &book.raffle.bulk_discounts,
        )
        .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let order = PurchaseOrder {
            id: OrderId::new(),
            raffle_id: request.raffle_id,
            reservation_id: request.reservation_id,
            tickets: request.tickets,
            customer: request.customer,
            payment: request.payment,
            pricing,
            status: OrderStatus::PendingPayment,
            created_at: now,
            updated_at: now,
            expires_at: now + payment_window,
        };

        book.set(&order.tickets, TicketState::Held(Holder::Order(order.id)));
        self.reservations.remove(&request.reservation_id);
        self.orders.insert(order.id, order.clone());

        Ok(order)
    }

    fn set_order_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> ServiceResult<PurchaseOrder> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id}")))?;

        order
            .transition(status, now)
            .map_err(|e| ServiceError::api(ApiErrorCode::InvalidOrderStatus, e.to_string()))?;

        let tickets = match status {
            OrderStatus::Completed => Some(TicketState::Sold),
            OrderStatus::Cancelled | OrderStatus::Expired => Some(TicketState::Available),
            _ => None,
        };
        let order = order.clone();
        if let (Some(state), Some(book)) = (tickets, self.books.get_mut(&order.raffle_id)) {
            book.set(&order.tickets, state);
        }

        Ok(order)
    }
}

// ============================================================================
// Service
// ============================================================================

/// In-memory raffle backend
///
/// Cloning is cheap and every clone shares the same ledger.
#[derive(Clone)]
pub struct InMemoryRaffleService {
    ledger: Arc<Mutex<Ledger>>,
    clock: Arc<dyn Clock>,
    payment_window: chrono::Duration,
    max_hold: Duration,
}

impl InMemoryRaffleService {
    /// Empty backend using `clock` for holds and deadlines
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::default())),
            clock,
            payment_window: chrono::Duration::hours(DEFAULT_PAYMENT_WINDOW_HOURS),
            max_hold: DEFAULT_MAX_HOLD,
        }
    }

    /// Cap the length of a hold; longer requests are shortened to `max_hold`
    #[must_use]
    pub const fn with_max_hold(mut self, max_hold: Duration) -> Self {
        self.max_hold = max_hold;
        self
    }

    /// Set how long customers have to pay for a submitted order
    #[must_use]
    pub const fn with_payment_window(mut self, window: chrono::Duration) -> Self {
        self.payment_window = window;
        self
    }

    /// Publish a raffle with every number available
    ///
    /// Inventory counters on `raffle` are ignored; they are derived from
    /// ticket state.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] if the raffle violates its invariants.
    pub async fn add_raffle(&self, raffle: Raffle) -> ServiceResult<()> {
        let total = raffle.total_tickets;
        let raffle = Raffle { available_tickets: total, sold_tickets: 0, ..raffle };
        raffle.validate().map_err(ServiceError::Validation)?;

        tracing::info!(raffle_id = %raffle.id, total_tickets = total, "Raffle published");
        self.ledger.lock().await.books.insert(raffle.id, RaffleBook::new(raffle));
        Ok(())
    }

    /// Mark numbers sold outside the checkout flow (imports, seeding)
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown raffle, [`ServiceError::AlreadyTaken`]
    /// if any number is held or sold.
    pub async fn mark_sold(&self, raffle_id: RaffleId, numbers: &[TicketNumber]) -> ServiceResult<()> {
        let now = self.clock.now();
        let mut ledger = self.ledger.lock().await;
        ledger.expire(now);

        let book = ledger.book_mut(raffle_id)?;
        let taken: Vec<TicketNumber> = numbers
            .iter()
            .copied()
            .filter(|n| book.state(*n) != Some(TicketState::Available))
            .collect();
        if !taken.is_empty() {
            return Err(ServiceError::AlreadyTaken { numbers: taken });
        }
        book.set(numbers, TicketState::Sold);
        Ok(())
    }

    /// Customer reports having paid
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] or `INVALID_ORDER_STATUS`.
    pub async fn mark_payment_submitted(&self, order_id: OrderId) -> ServiceResult<PurchaseOrder> {
        self.set_order_status(order_id, OrderStatus::PendingVerification).await
    }

    /// Operator confirms payment; tickets become sold
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] or `INVALID_ORDER_STATUS`.
    pub async fn complete_order(&self, order_id: OrderId) -> ServiceResult<PurchaseOrder> {
        self.set_order_status(order_id, OrderStatus::Completed).await
    }

    /// Cancel an unpaid order; tickets return to the pool
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] or `INVALID_ORDER_STATUS`.
    pub async fn cancel_order(&self, order_id: OrderId) -> ServiceResult<PurchaseOrder> {
        self.set_order_status(order_id, OrderStatus::Cancelled).await
    }

    /// Apply any legal status change (admin route)
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] or `INVALID_ORDER_STATUS`.
    pub async fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> ServiceResult<PurchaseOrder> {
        let now = self.clock.now();
        let mut ledger = self.ledger.lock().await;
        ledger.expire(now);

        let order = ledger.set_order_status(order_id, status, now)?;
        tracing::info!(order_id = %order_id, status = %status, "Order status changed");
        Ok(order)
    }

    /// Orders, newest first
    pub async fn orders(&self) -> Vec<PurchaseOrder> {
        let now = self.clock.now();
        let mut ledger = self.ledger.lock().await;
        ledger.expire(now);

        let mut orders: Vec<PurchaseOrder> = ledger.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// Number of published raffles
    pub async fn raffle_count(&self) -> usize {
        self.ledger.lock().await.books.len()
    }

    /// Expire lapsed holds and overdue orders now, returning how many
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let expired = self.ledger.lock().await.expire(now);
        if expired > 0 {
            tracing::debug!(expired, "Expiry sweep");
        }
        expired
    }
}

impl RaffleService for InMemoryRaffleService {
    fn get_raffle(&self, raffle_id: RaffleId) -> ServiceFuture<Raffle> {
        let this = self.clone();
        Box::pin(async move {
            let now = this.clock.now();
            let mut ledger = this.ledger.lock().await;
            ledger.expire(now);
            Ok(ledger.book(raffle_id)?.snapshot())
        })
    }

    fn available_numbers(&self, raffle_id: RaffleId) -> ServiceFuture<Vec<TicketNumber>> {
        let this = self.clone();
        Box::pin(async move {
            let now = this.clock.now();
            let mut ledger = this.ledger.lock().await;
            ledger.expire(now);
            Ok(ledger.book(raffle_id)?.available())
        })
    }

    fn check_availability(
        &self,
        raffle_id: RaffleId,
        numbers: Vec<TicketNumber>,
    ) -> ServiceFuture<Vec<TicketNumber>> {
        let this = self.clone();
        Box::pin(async move {
            let now = this.clock.now();
            let mut ledger = this.ledger.lock().await;
            ledger.expire(now);
            let book = ledger.book(raffle_id)?;
            Ok(numbers
                .into_iter()
                .filter(|n| book.state(*n) != Some(TicketState::Available))
                .collect())
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
            if ttl > this.max_hold {
                tracing::debug!(
                    requested_secs = ttl.as_secs(),
                    max_secs = this.max_hold.as_secs(),
                    "Hold length capped"
                );
            }
            let ttl = chrono::Duration::from_std(ttl.min(this.max_hold))
                .map_err(|_| ServiceError::Validation("hold duration too long".to_string()))?;
            let now = this.clock.now();
            let mut ledger = this.ledger.lock().await;
            ledger.expire(now);

            let result = ledger.reserve(raffle_id, numbers, ttl, now);
            match &result {
                Ok(reservation) => tracing::info!(
                    raffle_id = %raffle_id,
                    reservation_id = %reservation.id,
                    tickets = reservation.numbers.len(),
                    expires_at = %reservation.expires_at,
                    "Tickets held"
                ),
                Err(error) => tracing::debug!(raffle_id = %raffle_id, %error, "Hold rejected"),
            }
            result
        })
    }

    fn release(&self, reservation_id: ReservationId) -> ServiceFuture<()> {
        let this = self.clone();
        Box::pin(async move {
            let now = this.clock.now();
            let mut ledger = this.ledger.lock().await;
            ledger.expire(now);

            if let Some(reservation) = ledger.reservations.remove(&reservation_id) {
                if let Some(book) = ledger.books.get_mut(&reservation.raffle_id) {
                    book.set(&reservation.numbers, TicketState::Available);
                }
                tracing::info!(reservation_id = %reservation_id, "Hold released");
                Ok(())
            } else if ledger.lapsed.contains_key(&reservation_id) {
                // Already back in the pool
                Ok(())
            } else {
                Err(ServiceError::ReservationNotFound)
            }
        })
    }

    fn submit_order(&self, request: OrderRequest) -> ServiceFuture<PurchaseOrder> {
        let this = self.clone();
        Box::pin(async move {
            let now = this.clock.now();
            let mut ledger = this.ledger.lock().await;
            ledger.expire(now);

            let order = ledger.submit_order(request, this.payment_window, now)?;
            tracing::info!(
                order_id = %order.id,
                raffle_id = %order.raffle_id,
                tickets = order.tickets.len(),
                total_cents = order.pricing.total.cents(),
                "Order created"
            );
            Ok(order)
        })
    }

    fn get_order(&self, order_id: OrderId) -> ServiceFuture<PurchaseOrder> {
        let this = self.clone();
        Box::pin(async move {
            let now = this.clock.now();
            let mut ledger = this.ledger.lock().await;
            ledger.expire(now);
            ledger
                .orders
                .get(&order_id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(format!("order {order_id}")))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::{demo_raffle, DEMO_RAFFLE_ID};
    use crate::types::{Customer, PaymentDetails, PaymentMethod};
    use rifa_testing::{test_time, ManualClock};

    const TTL: Duration = Duration::from_secs(15 * 60);

    fn numbers(raw: &[u32]) -> Vec<TicketNumber> {
        raw.iter().copied().map(TicketNumber::new).collect()
    }

    fn customer() -> Customer {
        Customer {
            name: "Luis Hernández".to_string(),
            email: "luis@example.mx".to_string(),
            phone: "3312345678".to_string(),
            state: None,
        }
    }

    async fn backend() -> (InMemoryRaffleService, ManualClock) {
        let clock = ManualClock::new(test_time());
        let service = InMemoryRaffleService::new(Arc::new(clock.clone()));
        service.add_raffle(demo_raffle(test_time())).await.unwrap();
        (service, clock)
    }

    fn order_for(reservation: &Reservation) -> OrderRequest {
        OrderRequest {
            raffle_id: reservation.raffle_id,
            reservation_id: reservation.id,
            tickets: reservation.numbers.clone(),
            customer: customer(),
            payment: PaymentDetails::new(PaymentMethod::Oxxo),
        }
    }

    #[tokio::test]
    async fn test_reserve_is_all_or_nothing() {
        let (service, _clock) = backend().await;

        service.reserve(DEMO_RAFFLE_ID, numbers(&[5]), TTL).await.unwrap();
        let err = service.reserve(DEMO_RAFFLE_ID, numbers(&[4, 5, 6]), TTL).await.unwrap_err();
        assert_eq!(err, ServiceError::AlreadyTaken { numbers: numbers(&[5]) });

        // 4 and 6 were not touched by the failed attempt
        let unavailable = service.check_availability(DEMO_RAFFLE_ID, numbers(&[4, 5, 6])).await.unwrap();
        assert_eq!(unavailable, numbers(&[5]));
    }

    #[tokio::test]
    async fn test_lapsed_hold_returns_numbers_to_pool() {
        let (service, clock) = backend().await;
        let hold = service.reserve(DEMO_RAFFLE_ID, numbers(&[10, 11]), TTL).await.unwrap();
        assert_eq!(service.get_raffle(DEMO_RAFFLE_ID).await.unwrap().available_tickets, 998);

        clock.advance(chrono::Duration::minutes(15));

        let raffle = service.get_raffle(DEMO_RAFFLE_ID).await.unwrap();
        assert_eq!(raffle.available_tickets, 1000);
        assert_eq!(
            service.submit_order(order_for(&hold)).await.unwrap_err(),
            ServiceError::ReservationExpired
        );
    }

    #[tokio::test]
    async fn test_order_keeps_tickets_until_completed() {
        let (service, _clock) = backend().await;
        let hold = service.reserve(DEMO_RAFFLE_ID, numbers(&[1, 2, 3, 4, 5]), TTL).await.unwrap();

        let order = service.submit_order(order_for(&hold)).await.unwrap();
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.pricing.total, crate::types::Money::from_pesos(475));
        assert_eq!(service.release(hold.id).await, Err(ServiceError::ReservationNotFound));

        let taken = service.check_availability(DEMO_RAFFLE_ID, numbers(&[1, 2])).await.unwrap();
        assert_eq!(taken, numbers(&[1, 2]));

        service.mark_payment_submitted(order.id).await.unwrap();
        service.complete_order(order.id).await.unwrap();

        let raffle = service.get_raffle(DEMO_RAFFLE_ID).await.unwrap();
        assert_eq!((raffle.sold_tickets, raffle.available_tickets), (5, 995));
    }

    #[tokio::test]
    async fn test_overdue_order_expires_and_frees_tickets() {
        let (service, clock) = backend().await;
        let hold = service.reserve(DEMO_RAFFLE_ID, numbers(&[7]), TTL).await.unwrap();
        let order = service.submit_order(order_for(&hold)).await.unwrap();

        clock.advance(chrono::Duration::hours(DEFAULT_PAYMENT_WINDOW_HOURS));
        assert_eq!(service.sweep_expired().await, 1);

        assert_eq!(service.get_order(order.id).await.unwrap().status, OrderStatus::Expired);
        assert!(service.check_availability(DEMO_RAFFLE_ID, numbers(&[7])).await.unwrap().is_empty());

        let err = service.complete_order(order.id).await.unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::InvalidOrderStatus);
    }

    #[tokio::test]
    async fn test_cancel_returns_tickets() {
        let (service, _clock) = backend().await;
        let hold = service.reserve(DEMO_RAFFLE_ID, numbers(&[9]), TTL).await.unwrap();
        let order = service.submit_order(order_for(&hold)).await.unwrap();

        service.cancel_order(order.id).await.unwrap();
        assert!(service.reserve(DEMO_RAFFLE_ID, numbers(&[9]), TTL).await.is_ok());
    }

    #[tokio::test]
    async fn test_reserve_validation() {
        let (service, clock) = backend().await;

        assert!(matches!(
            service.reserve(DEMO_RAFFLE_ID, vec![], TTL).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.reserve(DEMO_RAFFLE_ID, numbers(&[0]), TTL).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.reserve(DEMO_RAFFLE_ID, numbers(&[3, 3]), TTL).await,
            Err(ServiceError::Validation(_))
        ));

        let too_many: Vec<u32> = (1..=101).collect();
        let err = service.reserve(DEMO_RAFFLE_ID, numbers(&too_many), TTL).await.unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::MaxTicketsExceeded);

        assert!(matches!(
            service.reserve(RaffleId::new(), numbers(&[1]), TTL).await,
            Err(ServiceError::NotFound(_))
        ));

        clock.advance(chrono::Duration::days(31));
        let err = service.reserve(DEMO_RAFFLE_ID, numbers(&[1]), TTL).await.unwrap_err();
        assert_eq!(err.code(), ApiErrorCode::RaffleNotActive);
    }

    #[tokio::test]
    async fn test_submit_rejects_mismatched_tickets() {
        let (service, _clock) = backend().await;
        let hold = service.reserve(DEMO_RAFFLE_ID, numbers(&[20, 21]), TTL).await.unwrap();

        let mut request = order_for(&hold);
        request.tickets = numbers(&[20, 22]);
        assert!(matches!(service.submit_order(request).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_hold_length_is_capped() {
        let (service, _clock) = backend().await;
        let ten_years = Duration::from_secs(10 * 365 * 24 * 60 * 60);

        let hold = service.reserve(DEMO_RAFFLE_ID, numbers(&[1, 2]), ten_years).await.unwrap();
        assert_eq!(hold.expires_at, test_time() + chrono::Duration::minutes(15));

        let short = service.reserve(DEMO_RAFFLE_ID, numbers(&[3]), Duration::from_secs(60)).await.unwrap();
        assert_eq!(short.expires_at, test_time() + chrono::Duration::minutes(1));

        let clock = ManualClock::new(test_time());
        let roomy = InMemoryRaffleService::new(Arc::new(clock)).with_max_hold(Duration::from_secs(30 * 60));
        roomy.add_raffle(demo_raffle(test_time())).await.unwrap();
        let hold = roomy.reserve(DEMO_RAFFLE_ID, numbers(&[1]), ten_years).await.unwrap();
        assert_eq!(hold.expires_at, test_time() + chrono::Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_lapsed_holds_are_forgotten_after_retention() {
        let (service, clock) = backend().await;
        let hold = service.reserve(DEMO_RAFFLE_ID, numbers(&[8]), TTL).await.unwrap();

        clock.advance(chrono::Duration::minutes(16));
        assert_eq!(service.sweep_expired().await, 1);
        assert_eq!(service.release(hold.id).await, Ok(()));
        assert_eq!(service.ledger.lock().await.lapsed.len(), 1);

        clock.advance(chrono::Duration::hours(LAPSED_RETENTION_HOURS));
        service.sweep_expired().await;
        assert!(service.ledger.lock().await.lapsed.is_empty());
        assert_eq!(service.release(hold.id).await, Err(ServiceError::ReservationNotFound));
    }

    #[tokio::test]
    async fn test_mark_sold_reduces_availability() {
        let (service, _clock) = backend().await;
        service.mark_sold(DEMO_RAFFLE_ID, &numbers(&[100, 200])).await.unwrap();

        let available = service.available_numbers(DEMO_RAFFLE_ID).await.unwrap();
        assert_eq!(available.len(), 998);
        assert!(!available.contains(&TicketNumber::new(100)));
        assert_eq!(
            service.mark_sold(DEMO_RAFFLE_ID, &numbers(&[200])).await,
            Err(ServiceError::AlreadyTaken { numbers: numbers(&[200]) })
        );
    }
}
