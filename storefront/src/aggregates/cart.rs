//! Cart reducer: buyer details, payment choice and order history.
//!
//! The customer and the orders survive restarts through [`Storage`]; payment
//! details never leave memory, persisted orders keep only the method. A half-filled customer form is kept separately
//! as a draft until an order is recorded.

use crate::order::{OrderStatus, PurchaseOrder};
use crate::storage::Storage;
use crate::types::{Customer, OrderId, PaymentDetails};
use rifa_core::{async_effect, effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage key of the persisted cart
pub const CART_STORAGE_KEY: &str = "rifa-cart-storage";

/// Storage key of the customer draft
pub const TEMP_CUSTOMER_KEY: &str = "rifa-temp-customer";

/// Current [`PersistedCart`] layout
pub const CART_VERSION: u32 = 1;

// ============================================================================
// State
// ============================================================================

/// The persisted subset of [`CartState`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCart {
    /// Layout version
    pub version: u32,
    /// Last confirmed buyer
    pub customer: Option<Customer>,
    /// Order history, oldest first, payment reduced to the method
    pub orders: Vec<PurchaseOrder>,
}

/// Cart state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartState {
    /// Confirmed buyer details
    pub customer: Option<Customer>,
    /// Unconfirmed form contents
    pub draft: Option<Customer>,
    /// Chosen payment method (memory only)
    pub payment: Option<PaymentDetails>,
    /// Order history, oldest first
    pub orders: Vec<PurchaseOrder>,
    /// Error from the last action
    pub last_error: Option<String>,
}

impl CartState {
    /// Empty cart
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the persisted subset
    #[must_use]
    pub fn from_persisted(persisted: PersistedCart) -> Self {
        Self { customer: persisted.customer, orders: persisted.orders, ..Self::default() }
    }

    /// What gets written to storage
    ///
    /// Orders keep their payment method only; account numbers, CLABEs and
    /// wallets stay in memory.
    #[must_use]
    pub fn persisted(&self) -> PersistedCart {
        let orders = self
            .orders
            .iter()
            .map(|order| PurchaseOrder { payment: PaymentDetails::new(order.payment.method), ..order.clone() })
            .collect();
        PersistedCart { version: CART_VERSION, customer: self.customer.clone(), orders }
    }

    /// Order by ID
    #[must_use]
    pub fn order(&self, order_id: OrderId) -> Option<&PurchaseOrder> {
        self.orders.iter().find(|o| o.id == order_id)
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Actions for the cart reducer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartAction {
    /// Confirm buyer details
    SetCustomer {
        /// Buyer
        customer: Customer,
    },
    /// Keep unconfirmed form contents
    SaveCustomerDraft {
        /// Form contents
        customer: Customer,
    },
    /// Choose a payment method
    SetPayment {
        /// Payment details
        payment: PaymentDetails,
    },
    /// Forget the payment method
    ClearPayment,
    /// Add (or refresh) an order in the history
    RecordOrder {
        /// The order
        order: PurchaseOrder,
    },
    /// Move a recorded order to a new status
    UpdateOrderStatus {
        /// Order to update
        order_id: OrderId,
        /// Target status
        status: OrderStatus,
    },
    /// Forget everything
    Clear,
    /// A storage write failed
    PersistFailed {
        /// What went wrong
        error: String,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the cart reducer
#[derive(Clone)]
pub struct CartEnvironment {
    /// Time source for status changes
    pub clock: Arc<dyn Clock>,
    /// Where the cart is persisted
    pub storage: Arc<dyn Storage>,
}

impl CartEnvironment {
    /// Create a new cart environment
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, storage: Arc<dyn Storage>) -> Self {
        Self { clock, storage }
    }
}

// ============================================================================
// Reducer
// ============================================================================

type Effects = SmallVec<[Effect<CartAction>; 4]>;

/// Reducer for [`CartState`]
#[derive(Clone, Debug, Default)]
pub struct CartReducer;

impl CartReducer {
    /// Create a new cart reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn save(storage: &Arc<dyn Storage>, key: &'static str, value: &impl Serialize) -> Effect<CartAction> {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(key, error = %e, "Cart serialization failed");
                return Effect::None;
            },
        };
        let storage = Arc::clone(storage);
        async_effect! {
            storage
                .save(key, json)
                .await
                .err()
                .map(|e| CartAction::PersistFailed { error: e.to_string() })
        }
    }

    fn remove(storage: &Arc<dyn Storage>, key: &'static str) -> Effect<CartAction> {
        let storage = Arc::clone(storage);
        async_effect! {
            storage
                .remove(key)
                .await
                .err()
                .map(|e| CartAction::PersistFailed { error: e.to_string() })
        }
    }

    fn persist(state: &CartState, env: &CartEnvironment) -> Effect<CartAction> {
        Self::save(&env.storage, CART_STORAGE_KEY, &state.persisted())
    }
}

impl Reducer for CartReducer {
    type State = CartState;
    type Action = CartAction;
    type Environment = CartEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if !matches!(action, CartAction::PersistFailed { .. }) {
            state.last_error = None;
        }

        match action {
            CartAction::SetCustomer { customer } => {
                if let Err(reason) = customer.validate() {
                    state.last_error = Some(reason);
                    return SmallVec::new();
                }
                state.customer = Some(customer);
                smallvec![Self::persist(state, env)]
            },

            CartAction::SaveCustomerDraft { customer } => {
                let effect = Self::save(&env.storage, TEMP_CUSTOMER_KEY, &customer);
                state.draft = Some(customer);
                smallvec![effect]
            },

            CartAction::SetPayment { payment } => {
                state.payment = Some(payment);
                SmallVec::new()
            },

            CartAction::ClearPayment => {
                state.payment = None;
                SmallVec::new()
            },

            CartAction::RecordOrder { order } => {
                tracing::debug!(order_id = %order.id, status = %order.status, "Order recorded in cart");
                state.customer = Some(order.customer.clone());
                match state.orders.iter_mut().find(|o| o.id == order.id) {
                    Some(existing) => *existing = order,
                    None => state.orders.push(order),
                }
                let had_draft = state.draft.take().is_some();

                let mut effects: Effects = smallvec![Self::persist(state, env)];
                if had_draft {
                    effects.push(Self::remove(&env.storage, TEMP_CUSTOMER_KEY));
                }
                effects
            },

            CartAction::UpdateOrderStatus { order_id, status } => {
                let now = env.clock.now();
                let Some(order) = state.orders.iter_mut().find(|o| o.id == order_id) else {
                    state.last_error = Some(format!("order {order_id} is not in the cart"));
                    return SmallVec::new();
                };
                if let Err(e) = order.transition(status, now) {
                    state.last_error = Some(e.to_string());
                    return SmallVec::new();
                }
                smallvec![Self::persist(state, env)]
            },

            CartAction::Clear => {
                *state = CartState::default();
                smallvec![
                    Self::remove(&env.storage, CART_STORAGE_KEY),
                    Self::remove(&env.storage, TEMP_CUSTOMER_KEY)
                ]
            },

            CartAction::PersistFailed { error } => {
                tracing::warn!(%error, "Cart persistence failed");
                state.last_error = Some(error);
                SmallVec::new()
            },
        }
    }
}

// ============================================================================
// Hydration
// ============================================================================

/// Load the cart left by a previous session
///
/// Unreadable or unparsable entries are logged and treated as absent.
pub async fn load_cart(storage: &dyn Storage) -> CartState {
    let mut state = match storage.load(CART_STORAGE_KEY).await {
        Ok(Some(json)) => match serde_json::from_str::<PersistedCart>(&json) {
            Ok(persisted) if persisted.version == CART_VERSION => CartState::from_persisted(persisted),
            Ok(persisted) => {
                tracing::warn!(version = persisted.version, "Discarding cart with unknown layout");
                CartState::default()
            },
            Err(e) => {
                tracing::warn!(error = %e, "Discarding corrupt cart");
                CartState::default()
            },
        },
        Ok(None) => CartState::default(),
        Err(e) => {
            tracing::warn!(error = %e, "Cart could not be read");
            CartState::default()
        },
    };

    state.draft = match storage.load(TEMP_CUSTOMER_KEY).await {
        Ok(Some(json)) => serde_json::from_str(&json)
            .inspect_err(|e| tracing::warn!(error = %e, "Discarding corrupt customer draft"))
            .ok(),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Customer draft could not be read");
            None
        },
    };

    tracing::debug!(orders = state.orders.len(), has_draft = state.draft.is_some(), "Cart loaded");
    state
}
