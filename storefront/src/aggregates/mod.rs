//! Reducers of the raffle storefront.
//!
//! - Selection: ticket picking, pricing, holds and order submission
//! - Cart: buyer details, payment choice and persisted order history

pub mod cart;
pub mod selection;

pub use cart::{load_cart, CartAction, CartEnvironment, CartReducer, CartState, PersistedCart};
pub use selection::{
    RequestKind, SelectionAction, SelectionEnvironment, SelectionReducer, SelectionState,
    DEFAULT_RESERVATION_TTL,
};
