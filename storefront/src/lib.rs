//! Rifa storefront - ticket selection and checkout for raffles
//!
//! A raffle sells numbered tickets (`1..=total`) at one price, with bulk
//! discounts. This crate implements the buying side:
//!
//! - **Selection**: pick numbers by hand or quick pick, priced after every change
//! - **Holds**: all-or-nothing, time-boxed reservations so two customers never
//!   buy the same number
//! - **Orders**: a hold becomes a purchase order awaiting a regional payment
//!   (OXXO, SPEI, bank transfer, crypto)
//! - **Cart**: customer details and order history, persisted between sessions
//!
//! # Architecture
//!
//! ```text
//!   Storefront (facade)
//!     │ send(action)
//!     ▼
//! ┌───────────────────┐     effects      ┌────────────────────────┐
//! │ Selection reducer │ ───────────────▶ │ RaffleService          │
//! │ Cart reducer      │ ◀─────────────── │  HttpRaffleService     │
//! └───────────────────┘  result actions  │  InMemoryRaffleService │
//!     │                                  └────────────────────────┘
//!     ▼
//!   Storage (cart JSON)        WebhookSender (purchase.created)
//! ```
//!
//! Reducers are pure: they mutate state and return effects (service calls,
//! hold expiry delays, storage writes). The [`rifa_runtime::Store`] runs the
//! effects and feeds their results back as actions.
//!
//! # Example
//!
//! ```ignore
//! let storefront = Storefront::builder(Arc::new(service)).build().await;
//! storefront.load_raffle(raffle_id).await?;
//! storefront.quick_pick(10).await?;
//! storefront.set_customer(customer).await?;
//! storefront.set_payment(PaymentDetails::new(PaymentMethod::Oxxo)).await?;
//! let order = storefront.checkout().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod api;
pub mod app;
pub mod config;
pub mod countdown;
pub mod error;
pub mod fixtures;
pub mod live;
pub mod metrics;
pub mod order;
pub mod picker;
pub mod pricing;
pub mod server;
pub mod service;
pub mod storage;
pub mod types;
pub mod webhook;

pub use aggregates::{CartAction, CartReducer, CartState, SelectionAction, SelectionReducer, SelectionState};
pub use app::{Storefront, StorefrontBuilder};
pub use config::Config;
pub use countdown::{time_remaining, CountdownTicker, TimeRemaining};
pub use error::StorefrontError;
pub use order::{OrderStatus, PurchaseOrder};
pub use picker::{NumberPicker, RandomPicker, SeededPicker};
pub use pricing::{BulkDiscount, DiscountTable, PriceBreakdown};
pub use service::{HttpRaffleService, InMemoryRaffleService, RaffleService, ServiceError};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use types::*;
pub use webhook::{HttpWebhookSender, NoopWebhookSender, WebhookPayload, WebhookSender};
