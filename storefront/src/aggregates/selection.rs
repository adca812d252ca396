//! Ticket selection, pricing and checkout reducer.
//!
//! Owns what one customer is doing on a raffle page:
//!
//! 1. Load a raffle and its pool of available numbers
//! 2. Pick numbers by hand or by quick pick, repricing after every change
//! 3. Check availability and reserve the selection (timed hold)
//! 4. Submit the order against the hold
//!
//! Backend calls run as effects and come back as events. Only one call per
//! selection may be pending; commands issued meanwhile fail with
//! [`StorefrontError::RequestInFlight`] and leave the state untouched.
//!
//! A hold always matches the selection exactly: any change to the selection
//! releases it.

use crate::error::StorefrontError;
use crate::metrics;
use crate::order::PurchaseOrder;
use crate::picker::NumberPicker;
use crate::pricing::PriceBreakdown;
use crate::service::{OrderRequest, RaffleService, ServiceError};
use crate::types::{
    Customer, Money, PaymentDetails, Raffle, RaffleId, Reservation, ReservationId, TicketNumber,
    TicketSelection,
};
use chrono::{DateTime, Utc};
use rifa_core::{async_effect, delay, effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Default length of a ticket hold
pub const DEFAULT_RESERVATION_TTL: Duration = Duration::from_secs(15 * 60);

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the selection reducer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionAction {
    // Commands
    /// Fetch a raffle and its available numbers
    LoadRaffle {
        /// Raffle to load
        raffle_id: RaffleId,
    },

    /// Add one number to the selection
    Select {
        /// Number to add
        number: TicketNumber,
    },

    /// Remove one number from the selection
    Deselect {
        /// Number to remove
        number: TicketNumber,
    },

    /// Replace the selection with `count` random available numbers
    QuickPick {
        /// How many numbers to draw
        count: u32,
    },

    /// Empty the selection
    Clear,

    /// Check the selection against the purchase limits
    Validate,

    /// Ask the backend which of `numbers` were taken meanwhile
    CheckAvailability {
        /// Numbers to check
        numbers: Vec<TicketNumber>,
    },

    /// Hold `numbers`, making them the selection
    Reserve {
        /// Numbers to hold
        numbers: Vec<TicketNumber>,
    },

    /// Give the current hold back
    Release,

    /// Turn the current hold into an order
    SubmitOrder {
        /// Buyer
        customer: Customer,
        /// Chosen payment method
        payment: Option<PaymentDetails>,
    },

    /// The hold timer fired
    ExpireReservation {
        /// Hold the timer belongs to
        reservation_id: ReservationId,
    },

    // Events
    /// Raffle fetched
    RaffleLoaded {
        /// Raffle with current counters
        raffle: Raffle,
        /// Numbers that can be selected
        available: Vec<TicketNumber>,
    },

    /// Raffle could not be fetched
    LoadFailed {
        /// Backend error
        error: ServiceError,
    },

    /// Availability check answered
    AvailabilityChecked {
        /// Checked numbers that are taken
        unavailable: Vec<TicketNumber>,
    },

    /// Availability check failed
    AvailabilityFailed {
        /// Backend error
        error: ServiceError,
    },

    /// Hold granted
    Reserved {
        /// The hold
        reservation: Reservation,
    },

    /// Hold refused
    ReserveFailed {
        /// Backend error
        error: ServiceError,
    },

    /// Hold given back
    Released {
        /// Released hold
        reservation_id: ReservationId,
    },

    /// Hold could not be given back (it expires on its own)
    ReleaseFailed {
        /// Hold that stays until expiry
        reservation_id: ReservationId,
        /// Backend error
        error: ServiceError,
    },

    /// Order created
    OrderSubmitted {
        /// The order, in `pending_payment`
        order: PurchaseOrder,
    },

    /// Order refused
    OrderFailed {
        /// Backend error
        error: ServiceError,
    },
}

// ============================================================================
// State
// ============================================================================

/// Backend call currently pending
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Raffle fetch
    Load,
    /// Availability check
    Availability,
    /// Hold request
    Reserve,
    /// Order submission
    Submit,
}

/// Selection state of one customer
#[derive(Clone, Debug, Default)]
pub struct SelectionState {
    /// Loaded raffle
    pub raffle: Option<Raffle>,
    /// Numbers that can still be selected
    pub available: BTreeSet<TicketNumber>,
    /// Selected numbers, in selection order
    pub selected: Vec<TicketNumber>,
    /// Price of the current selection
    pub pricing: PriceBreakdown,
    /// Hold covering exactly `selected`
    pub reservation: Option<Reservation>,
    /// Pending backend call
    pub in_flight: Option<RequestKind>,
    /// Most recent order
    pub last_order: Option<PurchaseOrder>,
    /// Numbers found taken by the last availability check or hold attempt
    pub last_unavailable: Vec<TicketNumber>,
    /// Error from the last command
    pub last_error: Option<StorefrontError>,
}

impl SelectionState {
    /// Empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of selected tickets
    #[must_use]
    pub fn count(&self) -> u32 {
        u32::try_from(self.selected.len()).unwrap_or(u32::MAX)
    }

    /// Whether `number` is selected
    #[must_use]
    pub fn is_selected(&self, number: TicketNumber) -> bool {
        self.selected.contains(&number)
    }

    /// Customer-facing message of the last error
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.last_error.as_ref().map(ToString::to_string)
    }

    /// Whether a hold exists and has not lapsed at `now`
    #[must_use]
    pub fn has_live_reservation(&self, now: DateTime<Utc>) -> bool {
        self.reservation.as_ref().is_some_and(|r| !r.is_expired(now))
    }

    /// Snapshot of the selection, `None` without a raffle
    #[must_use]
    pub fn ticket_selection(&self) -> Option<TicketSelection> {
        self.raffle.as_ref().map(|raffle| TicketSelection {
            raffle_id: raffle.id,
            tickets: self.selected.clone(),
            pricing: self.pricing,
        })
    }

    /// Check the selection against the purchase limits
    ///
    /// # Errors
    ///
    /// The first of `NoRaffle`, `EmptySelection`, `BelowMinimum`,
    /// `AboveMaximum` that applies.
    pub fn validate(&self) -> Result<(), StorefrontError> {
        let raffle = self.raffle.as_ref().ok_or(StorefrontError::NoRaffle)?;
        let count = self.count();
        if count == 0 {
            Err(StorefrontError::EmptySelection)
        } else if count < raffle.min_per_purchase {
            Err(StorefrontError::BelowMinimum { min: raffle.min_per_purchase })
        } else if count > raffle.max_per_person {
            Err(StorefrontError::AboveMaximum { max: raffle.max_per_person })
        } else {
            Ok(())
        }
    }

    fn held_numbers(&self) -> BTreeSet<TicketNumber> {
        self.reservation
            .as_ref()
            .map(|r| r.numbers.iter().copied().collect())
            .unwrap_or_default()
    }

    fn reprice(&mut self) {
        let Some(raffle) = &self.raffle else {
            self.pricing = PriceBreakdown::default();
            return;
        };
        self.pricing = PriceBreakdown::compute(raffle.ticket_price, self.count(), &raffle.bulk_discounts)
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "Selection price overflowed");
                PriceBreakdown::empty(raffle.ticket_price)
            });
    }

    /// Drop `numbers` from both the selection and the pool
    fn remove_taken(&mut self, numbers: &[TicketNumber]) {
        self.selected.retain(|n| !numbers.contains(n));
        for number in numbers {
            self.available.remove(number);
        }
        self.reprice();
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the selection reducer
#[derive(Clone)]
pub struct SelectionEnvironment {
    /// Time source for raffle status and hold expiry
    pub clock: Arc<dyn Clock>,
    /// Raffle backend
    pub service: Arc<dyn RaffleService>,
    /// Random source for quick pick
    pub picker: Arc<dyn NumberPicker>,
    /// Length of a hold
    pub reservation_ttl: Duration,
}

impl SelectionEnvironment {
    /// Environment with the default hold length
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        service: Arc<dyn RaffleService>,
        picker: Arc<dyn NumberPicker>,
    ) -> Self {
        Self { clock, service, picker, reservation_ttl: DEFAULT_RESERVATION_TTL }
    }

    /// Override the hold length
    #[must_use]
    pub const fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }
}

// ============================================================================
// Reducer
// ============================================================================

type Effects = SmallVec<[Effect<SelectionAction>; 4]>;

/// Reducer for [`SelectionState`]
#[derive(Clone, Debug, Default)]
pub struct SelectionReducer;

impl SelectionReducer {
    /// Create a new selection reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fail(state: &mut SelectionState, error: StorefrontError) -> Effects {
        tracing::debug!(%error, "Selection command refused");
        state.last_error = Some(error);
        SmallVec::new()
    }

    /// The loaded raffle, if it is selling at `now`
    fn open_raffle(state: &SelectionState, now: DateTime<Utc>) -> Result<&Raffle, StorefrontError> {
        let raffle = state.raffle.as_ref().ok_or(StorefrontError::NoRaffle)?;
        let status = raffle.effective_status(now);
        if status.accepts_selections() {
            Ok(raffle)
        } else {
            Err(StorefrontError::RaffleClosed { status })
        }
    }

    /// Take the hold out of the state and return the effect giving it back
    fn release_hold(state: &mut SelectionState, env: &SelectionEnvironment) -> Option<Effect<SelectionAction>> {
        let reservation = state.reservation.take()?;
        let reservation_id = reservation.id;
        let service = Arc::clone(&env.service);
        metrics::record_reservation("released");

        Some(async_effect! {
            Some(match service.release(reservation_id).await {
                Ok(()) => SelectionAction::Released { reservation_id },
                Err(error) => SelectionAction::ReleaseFailed { reservation_id, error },
            })
        })
    }

    /// Reprice after a selection change and release a hold that no longer matches
    fn selection_changed(state: &mut SelectionState, env: &SelectionEnvironment) -> Effects {
        state.reprice();
        Self::release_hold(state, env).into_iter().collect()
    }

    fn select(state: &mut SelectionState, number: TicketNumber, env: &SelectionEnvironment) -> Effects {
        let raffle = match Self::open_raffle(state, env.clock.now()) {
            Ok(raffle) => raffle,
            Err(error) => return Self::fail(state, error),
        };
        if !raffle.contains(number) {
            let total = raffle.total_tickets;
            return Self::fail(state, StorefrontError::OutOfRange { number, total });
        }
        if state.is_selected(number) {
            return SmallVec::new();
        }
        if !state.available.contains(&number) {
            return Self::fail(state, StorefrontError::NotAvailable { number });
        }
        if state.count() >= raffle.max_per_person {
            let max = raffle.max_per_person;
            return Self::fail(state, StorefrontError::AboveMaximum { max });
        }

        state.selected.push(number);
        metrics::record_selection("manual", 1);
        Self::selection_changed(state, env)
    }

    fn quick_pick(state: &mut SelectionState, count: u32, env: &SelectionEnvironment) -> Effects {
        let raffle = match Self::open_raffle(state, env.clock.now()) {
            Ok(raffle) => raffle,
            Err(error) => return Self::fail(state, error),
        };
        if count > raffle.max_per_person {
            let max = raffle.max_per_person;
            return Self::fail(state, StorefrontError::AboveMaximum { max });
        }
        let available = u32::try_from(state.available.len()).unwrap_or(u32::MAX);
        if available < count {
            return Self::fail(state, StorefrontError::NotEnoughAvailable { requested: count, available });
        }

        let pool: Vec<TicketNumber> = state.available.iter().copied().collect();
        state.selected = env.picker.pick(&pool, count as usize);
        metrics::record_selection("quick_pick", state.selected.len());
        tracing::debug!(count, "Quick pick");
        Self::selection_changed(state, env)
    }

    fn reserve(state: &mut SelectionState, numbers: Vec<TicketNumber>, env: &SelectionEnvironment) -> Effects {
        let now = env.clock.now();
        let raffle = match Self::open_raffle(state, now) {
            Ok(raffle) => raffle,
            Err(error) => return Self::fail(state, error),
        };

        let mut seen = BTreeSet::new();
        let numbers: Vec<TicketNumber> = numbers.into_iter().filter(|n| seen.insert(*n)).collect();

        if let Some(&number) = numbers.iter().find(|n| !raffle.contains(**n)) {
            let total = raffle.total_tickets;
            return Self::fail(state, StorefrontError::OutOfRange { number, total });
        }
        let held = state.held_numbers();
        if let Some(&number) = numbers
            .iter()
            .find(|n| !state.available.contains(*n) && !held.contains(*n))
        {
            return Self::fail(state, StorefrontError::NotAvailable { number });
        }

        let raffle_id = raffle.id;
        let mut release = None;
        if numbers != state.selected {
            state.selected = numbers;
            state.reprice();
            release = Self::release_hold(state, env);
        }
        if let Err(error) = state.validate() {
            state.last_error = Some(error);
            return release.into_iter().collect();
        }
        // Selection unchanged and still held: nothing to do
        if state.has_live_reservation(now) {
            return SmallVec::new();
        }
        // A lapsed hold is gone on the backend already
        state.reservation = None;

        state.in_flight = Some(RequestKind::Reserve);
        let service = Arc::clone(&env.service);
        let numbers = state.selected.clone();
        let ttl = env.reservation_ttl;
        let reserve = async_effect! {
            Some(match service.reserve(raffle_id, numbers, ttl).await {
                Ok(reservation) => SelectionAction::Reserved { reservation },
                Err(error) => SelectionAction::ReserveFailed { error },
            })
        };
        // The old hold may cover some of the new numbers, so it must be gone first
        match release {
            Some(release) => smallvec![Effect::chain(vec![release, reserve])],
            None => smallvec![reserve],
        }
    }

    fn submit_order(
        state: &mut SelectionState,
        customer: Customer,
        payment: Option<PaymentDetails>,
        env: &SelectionEnvironment,
    ) -> Effects {
        let Some(raffle_id) = state.raffle.as_ref().map(|r| r.id) else {
            return Self::fail(state, StorefrontError::NoRaffle);
        };
        if !state.has_live_reservation(env.clock.now()) {
            state.reservation = None;
            return Self::fail(state, StorefrontError::NoReservation);
        }
        let Some(payment) = payment else {
            return Self::fail(state, StorefrontError::NoPaymentMethod);
        };
        if let Err(reason) = customer.validate() {
            return Self::fail(state, StorefrontError::InvalidCustomer(reason));
        }
        if let Err(reason) = payment.validate() {
            return Self::fail(state, StorefrontError::InvalidPayment(reason));
        }
        let Some(reservation_id) = state.reservation.as_ref().map(|r| r.id) else {
            return Self::fail(state, StorefrontError::NoReservation);
        };

        state.in_flight = Some(RequestKind::Submit);
        let request = OrderRequest {
            raffle_id,
            reservation_id,
            tickets: state.selected.clone(),
            customer,
            payment,
        };
        let service = Arc::clone(&env.service);
        smallvec![async_effect! {
            Some(match service.submit_order(request).await {
                Ok(order) => SelectionAction::OrderSubmitted { order },
                Err(error) => SelectionAction::OrderFailed { error },
            })
        }]
    }

    fn raffle_loaded(
        state: &mut SelectionState,
        raffle: Raffle,
        available: Vec<TicketNumber>,
        env: &SelectionEnvironment,
    ) -> Effects {
        let same_raffle = state.raffle.as_ref().is_some_and(|r| r.id == raffle.id);
        tracing::info!(
            raffle_id = %raffle.id,
            available = available.len(),
            refresh = same_raffle,
            "Raffle loaded"
        );

        let mut effects: Effects = SmallVec::new();
        state.available = available.into_iter().collect();
        if same_raffle {
            // Our own hold shows as taken on the backend
            let held = state.held_numbers();
            state.available.extend(held.iter().copied());
            let before = state.selected.len();
            state.selected.retain(|n| state.available.contains(n));
            if state.selected.len() != before {
                effects.extend(Self::release_hold(state, env));
            }
        } else {
            state.selected.clear();
            state.last_unavailable.clear();
            effects.extend(Self::release_hold(state, env));
        }
        state.raffle = Some(raffle);
        state.reprice();
        effects
    }

    fn order_submitted(state: &mut SelectionState, order: PurchaseOrder) {
        tracing::info!(
            order_id = %order.id,
            tickets = order.tickets.len(),
            total = %order.pricing.total,
            "Order submitted"
        );
        metrics::record_order(order.tickets.len(), order.pricing.total.cents());

        for number in &order.tickets {
            state.available.remove(number);
        }
        state.reservation = None;
        state.selected.clear();
        state.reprice();
        state.last_order = Some(order);
    }
}

impl Reducer for SelectionReducer {
    type State = SelectionState;
    type Action = SelectionAction;
    type Environment = SelectionEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let is_command = matches!(
            action,
            SelectionAction::LoadRaffle { .. }
                | SelectionAction::Select { .. }
                | SelectionAction::Deselect { .. }
                | SelectionAction::QuickPick { .. }
                | SelectionAction::Clear
                | SelectionAction::Validate
                | SelectionAction::CheckAvailability { .. }
                | SelectionAction::Reserve { .. }
                | SelectionAction::Release
                | SelectionAction::SubmitOrder { .. }
        );
        if is_command {
            state.last_error = None;
            if state.in_flight.is_some() && !matches!(action, SelectionAction::Validate) {
                return Self::fail(state, StorefrontError::RequestInFlight);
            }
        }

        match action {
            // ========== Loading ==========
            SelectionAction::LoadRaffle { raffle_id } => {
                state.in_flight = Some(RequestKind::Load);
                let service = Arc::clone(&env.service);
                smallvec![async_effect! {
                    let loaded = async {
                        let raffle = service.get_raffle(raffle_id).await?;
                        let available = service.available_numbers(raffle_id).await?;
                        Ok::<_, ServiceError>((raffle, available))
                    }
                    .await;
                    Some(match loaded {
                        Ok((raffle, available)) => SelectionAction::RaffleLoaded { raffle, available },
                        Err(error) => SelectionAction::LoadFailed { error },
                    })
                }]
            },

            SelectionAction::RaffleLoaded { raffle, available } => {
                state.in_flight = None;
                Self::raffle_loaded(state, raffle, available, env)
            },

            SelectionAction::LoadFailed { error } => {
                state.in_flight = None;
                tracing::warn!(%error, "Raffle load failed");
                Self::fail(state, error.into())
            },

            // ========== Selection ==========
            SelectionAction::Select { number } => Self::select(state, number, env),

            SelectionAction::Deselect { number } => {
                if !state.is_selected(number) {
                    return SmallVec::new();
                }
                state.selected.retain(|n| *n != number);
                Self::selection_changed(state, env)
            },

            SelectionAction::QuickPick { count } => Self::quick_pick(state, count, env),

            SelectionAction::Clear => {
                state.selected.clear();
                state.last_unavailable.clear();
                Self::selection_changed(state, env)
            },

            SelectionAction::Validate => {
                state.last_error = state.validate().err();
                SmallVec::new()
            },

            // ========== Availability ==========
            SelectionAction::CheckAvailability { numbers } => {
                let Some(raffle_id) = state.raffle.as_ref().map(|r| r.id) else {
                    return Self::fail(state, StorefrontError::NoRaffle);
                };
                if numbers.is_empty() {
                    return Self::fail(state, StorefrontError::EmptySelection);
                }
                state.in_flight = Some(RequestKind::Availability);
                let service = Arc::clone(&env.service);
                smallvec![async_effect! {
                    Some(match service.check_availability(raffle_id, numbers).await {
                        Ok(unavailable) => SelectionAction::AvailabilityChecked { unavailable },
                        Err(error) => SelectionAction::AvailabilityFailed { error },
                    })
                }]
            },

            SelectionAction::AvailabilityChecked { mut unavailable } => {
                state.in_flight = None;
                let held = state.held_numbers();
                unavailable.retain(|n| !held.contains(n));
                state.last_unavailable.clone_from(&unavailable);
                if unavailable.is_empty() {
                    return SmallVec::new();
                }
                state.remove_taken(&unavailable);
                Self::fail(state, StorefrontError::TicketsUnavailable { numbers: unavailable })
            },

            SelectionAction::AvailabilityFailed { error } => {
                state.in_flight = None;
                Self::fail(state, error.into())
            },

            // ========== Holds ==========
            SelectionAction::Reserve { numbers } => Self::reserve(state, numbers, env),

            SelectionAction::Reserved { reservation } => {
                state.in_flight = None;
                let now = env.clock.now();
                let expires_in = (reservation.expires_at - now).to_std().unwrap_or(Duration::ZERO);
                let reservation_id = reservation.id;
                tracing::info!(
                    reservation_id = %reservation_id,
                    tickets = reservation.numbers.len(),
                    expires_at = %reservation.expires_at,
                    "Tickets reserved"
                );
                metrics::record_reservation("held");
                state.last_unavailable.clear();
                state.reservation = Some(reservation);

                smallvec![delay! {
                    duration: expires_in,
                    action: SelectionAction::ExpireReservation { reservation_id }
                }]
            },

            SelectionAction::ReserveFailed { error } => {
                state.in_flight = None;
                metrics::record_reservation("rejected");
                if let ServiceError::AlreadyTaken { numbers } = &error {
                    state.last_unavailable.clone_from(numbers);
                    state.remove_taken(numbers);
                }
                Self::fail(state, error.into())
            },

            SelectionAction::Release => Self::release_hold(state, env).into_iter().collect(),

            SelectionAction::Released { reservation_id } => {
                tracing::debug!(reservation_id = %reservation_id, "Hold released");
                SmallVec::new()
            },

            SelectionAction::ReleaseFailed { reservation_id, error } => {
                tracing::warn!(reservation_id = %reservation_id, %error, "Hold release failed, it will lapse on its own");
                SmallVec::new()
            },

            SelectionAction::ExpireReservation { reservation_id } => {
                if state.reservation.as_ref().is_some_and(|r| r.id == reservation_id) {
                    tracing::info!(reservation_id = %reservation_id, "Hold expired");
                    metrics::record_reservation("expired");
                    state.reservation = None;
                    state.last_error = Some(StorefrontError::ReservationExpired);
                }
                SmallVec::new()
            },

            // ========== Checkout ==========
            SelectionAction::SubmitOrder { customer, payment } => {
                Self::submit_order(state, customer, payment, env)
            },

            SelectionAction::OrderSubmitted { order } => {
                state.in_flight = None;
                Self::order_submitted(state, order);
                SmallVec::new()
            },

            SelectionAction::OrderFailed { error } => {
                state.in_flight = None;
                if matches!(error, ServiceError::ReservationExpired | ServiceError::ReservationNotFound) {
                    state.reservation = None;
                }
                tracing::warn!(%error, "Order submission failed");
                Self::fail(state, error.into())
            },
        }
    }
}

/// Total of the selection, zero without a raffle
#[must_use]
pub const fn selection_total(state: &SelectionState) -> Money {
    state.pricing.total
}
