//! Storefront facade.
//!
//! [`Storefront`] wires the selection and cart stores to a raffle backend and
//! exposes the checkout as plain async methods. Each method sends one action,
//! waits for the effects it started and reports the resulting `last_error`.

use crate::aggregates::{
    load_cart, CartAction, CartEnvironment, CartReducer, CartState, SelectionAction,
    SelectionEnvironment, SelectionReducer, SelectionState, DEFAULT_RESERVATION_TTL,
};
use crate::countdown::{self, CountdownTicker, TimeRemaining, DEFAULT_TICK};
use crate::error::StorefrontError;
use crate::order::{OrderStatus, PurchaseOrder};
use crate::picker::{NumberPicker, RandomPicker};
use crate::service::RaffleService;
use crate::storage::{MemoryStorage, Storage};
use crate::types::{Customer, Money, OrderId, PaymentDetails, Raffle, RaffleId, Reservation, TicketNumber};
use crate::webhook::{NoopWebhookSender, WebhookMetadata, WebhookPayload, WebhookSender};
use rifa_core::environment::{Clock, SystemClock};
use rifa_runtime::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// Store driving [`SelectionReducer`]
pub type SelectionStore = Store<SelectionState, SelectionAction, SelectionEnvironment, SelectionReducer>;

/// Store driving [`CartReducer`]
pub type CartStore = Store<CartState, CartAction, CartEnvironment, CartReducer>;

/// Default time a facade call waits for its backend request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Raffle storefront for one customer
pub struct Storefront {
    selection: SelectionStore,
    cart: CartStore,
    webhook: Arc<dyn WebhookSender>,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    countdown_period: Duration,
    user_agent: Option<String>,
}

/// Builder for [`Storefront`]
///
/// Only the backend is required. Defaults: system clock, random quick pick,
/// in-memory storage, no webhook, 15 minute holds.
pub struct StorefrontBuilder {
    service: Arc<dyn RaffleService>,
    clock: Arc<dyn Clock>,
    picker: Arc<dyn NumberPicker>,
    storage: Arc<dyn Storage>,
    webhook: Arc<dyn WebhookSender>,
    reservation_ttl: Duration,
    request_timeout: Duration,
    countdown_period: Duration,
    user_agent: Option<String>,
}

impl StorefrontBuilder {
    /// Time source
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Quick pick random source
    #[must_use]
    pub fn picker(mut self, picker: Arc<dyn NumberPicker>) -> Self {
        self.picker = picker;
        self
    }

    /// Where the cart is persisted
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    /// Purchase notification sender
    #[must_use]
    pub fn webhook(mut self, webhook: Arc<dyn WebhookSender>) -> Self {
        self.webhook = webhook;
        self
    }

    /// Length of ticket holds
    #[must_use]
    pub const fn reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// How long a call waits for its backend request
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Countdown recompute period
    #[must_use]
    pub const fn countdown_period(mut self, period: Duration) -> Self {
        self.countdown_period = period;
        self
    }

    /// User agent reported in webhook metadata
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Hydrate the cart from storage and start the stores
    pub async fn build(self) -> Storefront {
        let cart_state = load_cart(self.storage.as_ref()).await;
        tracing::info!(
            orders = cart_state.orders.len(),
            has_customer = cart_state.customer.is_some(),
            "Cart hydrated"
        );

        let selection_env = SelectionEnvironment::new(Arc::clone(&self.clock), self.service, self.picker)
            .with_reservation_ttl(self.reservation_ttl);
        let cart_env = CartEnvironment::new(Arc::clone(&self.clock), self.storage);

        Storefront {
            selection: Store::new(SelectionState::new(), SelectionReducer::new(), selection_env),
            cart: Store::new(cart_state, CartReducer::new(), cart_env),
            webhook: self.webhook,
            clock: self.clock,
            request_timeout: self.request_timeout,
            countdown_period: self.countdown_period,
            user_agent: self.user_agent,
        }
    }
}

impl Storefront {
    /// Start building a storefront over `service`
    #[must_use]
    pub fn builder(service: Arc<dyn RaffleService>) -> StorefrontBuilder {
        StorefrontBuilder {
            service,
            clock: Arc::new(SystemClock),
            picker: Arc::new(RandomPicker),
            storage: Arc::new(MemoryStorage::new()),
            webhook: Arc::new(NoopWebhookSender),
            reservation_ttl: DEFAULT_RESERVATION_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            countdown_period: DEFAULT_TICK,
            user_agent: None,
        }
    }

    /// The selection store, for observers
    #[must_use]
    pub const fn selection_store(&self) -> &SelectionStore {
        &self.selection
    }

    /// The cart store, for observers
    #[must_use]
    pub const fn cart_store(&self) -> &CartStore {
        &self.cart
    }

    async fn run(&self, action: SelectionAction) -> Result<(), StorefrontError> {
        let mut handle = self.selection.send(action).await?;
        handle.wait_with_timeout(self.request_timeout).await?;
        match self.selection.state(|s| s.last_error.clone()).await {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn run_cart(&self, action: CartAction) -> Result<(), StorefrontError> {
        let mut handle = self.cart.send(action).await?;
        handle.wait_with_timeout(self.request_timeout).await?;
        match self.cart.state(|c| c.last_error.clone()).await {
            Some(error) => Err(StorefrontError::Cart(error)),
            None => Ok(()),
        }
    }

    // ========== Selection ==========

    /// Load (or refresh) a raffle and its available numbers
    ///
    /// # Errors
    ///
    /// The backend failure, or [`StorefrontError::RequestInFlight`].
    #[tracing::instrument(skip(self), fields(%raffle_id))]
    pub async fn load_raffle(&self, raffle_id: RaffleId) -> Result<Raffle, StorefrontError> {
        self.run(SelectionAction::LoadRaffle { raffle_id }).await?;
        self.selection
            .state(|s| s.raffle.clone())
            .await
            .ok_or(StorefrontError::NoRaffle)
    }

    /// Add a number to the selection
    ///
    /// # Errors
    ///
    /// Why the number cannot be selected; the selection is unchanged.
    pub async fn select(&self, number: TicketNumber) -> Result<(), StorefrontError> {
        self.run(SelectionAction::Select { number }).await
    }

    /// Remove a number from the selection
    ///
    /// # Errors
    ///
    /// [`StorefrontError::RequestInFlight`] while a request is pending.
    pub async fn deselect(&self, number: TicketNumber) -> Result<(), StorefrontError> {
        self.run(SelectionAction::Deselect { number }).await
    }

    /// Replace the selection with `count` random available numbers
    ///
    /// # Errors
    ///
    /// Limit or pool-size violations; the selection is unchanged.
    pub async fn quick_pick(&self, count: u32) -> Result<Vec<TicketNumber>, StorefrontError> {
        self.run(SelectionAction::QuickPick { count }).await?;
        Ok(self.selection.state(|s| s.selected.clone()).await)
    }

    /// Empty the selection
    ///
    /// # Errors
    ///
    /// [`StorefrontError::RequestInFlight`] while a request is pending.
    pub async fn clear(&self) -> Result<(), StorefrontError> {
        self.run(SelectionAction::Clear).await
    }

    /// Check the selection against the purchase limits
    ///
    /// # Errors
    ///
    /// The first violated limit.
    pub async fn validate(&self) -> Result<(), StorefrontError> {
        self.run(SelectionAction::Validate).await
    }

    // ========== Checkout ==========

    /// Numbers among `numbers` taken since the raffle was loaded
    ///
    /// Taken numbers are dropped from the selection and the pool.
    ///
    /// # Errors
    ///
    /// Backend failures only; taken numbers are reported in `Ok`.
    pub async fn check_availability(
        &self,
        numbers: Vec<TicketNumber>,
    ) -> Result<Vec<TicketNumber>, StorefrontError> {
        match self.run(SelectionAction::CheckAvailability { numbers }).await {
            Ok(()) => Ok(Vec::new()),
            Err(StorefrontError::TicketsUnavailable { numbers }) => Ok(numbers),
            Err(error) => Err(error),
        }
    }

    /// Hold `numbers`, making them the selection
    ///
    /// # Errors
    ///
    /// [`StorefrontError::AlreadyTaken`] if someone else got any of them,
    /// limit violations, or the backend failure.
    pub async fn reserve(&self, numbers: Vec<TicketNumber>) -> Result<Reservation, StorefrontError> {
        self.run(SelectionAction::Reserve { numbers }).await?;
        self.selection
            .state(|s| s.reservation.clone())
            .await
            .ok_or(StorefrontError::NoReservation)
    }

    /// Give the current hold back (no-op without one)
    ///
    /// # Errors
    ///
    /// [`StorefrontError::RequestInFlight`] while a request is pending.
    pub async fn release(&self) -> Result<(), StorefrontError> {
        self.run(SelectionAction::Release).await
    }

    /// Turn the current hold into an order
    ///
    /// On success the order is recorded in the cart and `purchase.created` is
    /// sent to the webhook. Neither of those can fail the call.
    ///
    /// # Errors
    ///
    /// Missing hold, payment method or invalid details, or the backend failure.
    #[tracing::instrument(skip_all)]
    pub async fn submit_order(
        &self,
        customer: Customer,
        payment: Option<PaymentDetails>,
    ) -> Result<PurchaseOrder, StorefrontError> {
        self.run(SelectionAction::SubmitOrder { customer, payment }).await?;
        let (order, raffle) = self
            .selection
            .state(|s| (s.last_order.clone(), s.raffle.clone()))
            .await;
        let order = order.ok_or(StorefrontError::NoReservation)?;

        if let Err(error) = self.run_cart(CartAction::RecordOrder { order: order.clone() }).await {
            tracing::warn!(order_id = %order.id, %error, "Order not saved in cart");
        }
        if let Some(raffle) = raffle {
            self.notify_purchase(&raffle, &order).await;
        }
        Ok(order)
    }

    async fn notify_purchase(&self, raffle: &Raffle, order: &PurchaseOrder) {
        let mut metadata = WebhookMetadata::at(self.clock.now());
        metadata.user_agent.clone_from(&self.user_agent);
        let payload = WebhookPayload::purchase_created(raffle, order, metadata);
        if let Err(error) = self.webhook.send(payload).await {
            tracing::warn!(order_id = %order.id, %error, "Purchase webhook not delivered");
        }
    }

    /// Buy the current selection with the cart's customer and payment
    ///
    /// Runs availability check, hold and submission in that order, stopping
    /// at the first failure.
    ///
    /// # Errors
    ///
    /// [`StorefrontError::TicketsUnavailable`] when the check finds taken
    /// numbers, otherwise the error of the failing step.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self) -> Result<PurchaseOrder, StorefrontError> {
        let (customer, payment) = self.cart.state(|c| (c.customer.clone(), c.payment.clone())).await;
        let customer = customer
            .ok_or_else(|| StorefrontError::InvalidCustomer("name, email and phone are required".to_string()))?;
        let payment = payment.ok_or(StorefrontError::NoPaymentMethod)?;

        self.validate().await?;
        let numbers = self.selection.state(|s| s.selected.clone()).await;

        let unavailable = self.check_availability(numbers.clone()).await?;
        if !unavailable.is_empty() {
            return Err(StorefrontError::TicketsUnavailable { numbers: unavailable });
        }
        self.reserve(numbers).await?;
        self.submit_order(customer, Some(payment)).await
    }

    // ========== Cart ==========

    /// Confirm buyer details
    ///
    /// # Errors
    ///
    /// [`StorefrontError::InvalidCustomer`] for incomplete details.
    pub async fn set_customer(&self, customer: Customer) -> Result<(), StorefrontError> {
        customer.validate().map_err(StorefrontError::InvalidCustomer)?;
        self.run_cart(CartAction::SetCustomer { customer }).await
    }

    /// Keep unfinished form contents across restarts
    ///
    /// # Errors
    ///
    /// [`StorefrontError::Cart`] if persisting failed.
    pub async fn save_customer_draft(&self, customer: Customer) -> Result<(), StorefrontError> {
        self.run_cart(CartAction::SaveCustomerDraft { customer }).await
    }

    /// Choose a payment method
    ///
    /// # Errors
    ///
    /// [`StorefrontError::InvalidPayment`] when method-specific fields are missing.
    pub async fn set_payment(&self, payment: PaymentDetails) -> Result<(), StorefrontError> {
        payment.validate().map_err(StorefrontError::InvalidPayment)?;
        self.run_cart(CartAction::SetPayment { payment }).await
    }

    /// Forget the payment method
    ///
    /// # Errors
    ///
    /// Only if the cart store is shutting down.
    pub async fn clear_payment(&self) -> Result<(), StorefrontError> {
        self.run_cart(CartAction::ClearPayment).await
    }

    /// Move a cart order to `status`
    ///
    /// # Errors
    ///
    /// [`StorefrontError::Cart`] for unknown orders or illegal transitions.
    pub async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(), StorefrontError> {
        self.run_cart(CartAction::UpdateOrderStatus { order_id, status }).await
    }

    /// Fetch an order from the backend and store the fresh copy in the cart
    ///
    /// # Errors
    ///
    /// The backend failure.
    pub async fn refresh_order(&self, order_id: OrderId) -> Result<PurchaseOrder, StorefrontError> {
        let order = self.selection.environment().service.get_order(order_id).await?;
        self.run_cart(CartAction::RecordOrder { order: order.clone() }).await?;
        Ok(order)
    }

    /// Forget customer, payment and order history
    ///
    /// # Errors
    ///
    /// [`StorefrontError::Cart`] if storage could not be cleared.
    pub async fn clear_cart(&self) -> Result<(), StorefrontError> {
        self.run_cart(CartAction::Clear).await
    }

    // ========== Countdown ==========

    /// Time left until the loaded raffle is drawn
    pub async fn time_remaining(&self) -> Option<TimeRemaining> {
        let drawing_date = self.selection.state(|s| s.raffle.as_ref().map(|r| r.drawing_date)).await?;
        countdown::time_remaining(self.clock.now(), drawing_date)
    }

    /// Ticker counting down to the loaded raffle's drawing date
    ///
    /// # Errors
    ///
    /// [`StorefrontError::NoRaffle`] before a raffle is loaded.
    pub async fn countdown(&self) -> Result<CountdownTicker, StorefrontError> {
        let drawing_date = self
            .selection
            .state(|s| s.raffle.as_ref().map(|r| r.drawing_date))
            .await
            .ok_or(StorefrontError::NoRaffle)?;
        Ok(CountdownTicker::spawn(Arc::clone(&self.clock), drawing_date, self.countdown_period))
    }

    // ========== Snapshots ==========

    /// Copy of the selection state
    pub async fn selection(&self) -> SelectionState {
        self.selection.state(Clone::clone).await
    }

    /// Copy of the cart state
    pub async fn cart(&self) -> CartState {
        self.cart.state(Clone::clone).await
    }

    /// Total of the current selection
    pub async fn total(&self) -> Money {
        self.selection.state(|s| s.pricing.total).await
    }

    /// Customer-facing message of the last selection error
    pub async fn error_message(&self) -> Option<String> {
        self.selection.state(SelectionState::error_message).await
    }

    /// Release any hold and stop both stores
    ///
    /// Pending hold expiry timers are abandoned.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownTimeout`] if cart writes did not finish in time.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        if let Err(error) = self.release().await {
            tracing::debug!(%error, "Hold not released on shutdown");
        }
        match self.selection.shutdown(timeout).await {
            Ok(()) => {},
            Err(StoreError::ShutdownTimeout(pending)) => {
                tracing::debug!(pending, "Abandoned pending hold timers");
            },
            Err(error) => return Err(error),
        }
        self.cart.shutdown(timeout).await
    }
}
