//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when a reducer hands work to an injected
//! service and wants the outcome fed back as an action.

/// Create an `Effect::Future` that awaits a fallible call and maps the outcome
///
/// Everything captured by `call` must be owned (clone `Arc`s before invoking).
///
/// # Example
///
/// ```rust,ignore
/// use rifa_core::service_call;
///
/// let service = Arc::clone(&env.service);
/// service_call! {
///     call: service.reserve(raffle_id, numbers),
///     on_success: |reservation| Some(SelectionAction::Reserved { reservation }),
///     on_error: |error| Some(SelectionAction::ReserveFailed { error })
/// }
/// ```
#[macro_export]
macro_rules! service_call {
    (
        call: $call:expr,
        on_success: |$success_param:ident| $success_body:expr,
        on_error: |$error_param:ident| $error_body:expr
    ) => {
        $crate::effect::Effect::Future(::std::boxed::Box::pin(async move {
            match $call.await {
                ::std::result::Result::Ok($success_param) => $success_body,
                ::std::result::Result::Err($error_param) => $error_body,
            }
        }))
    };
}

/// Create an `Effect::Future` from an async block body
///
/// # Example
///
/// ```rust,ignore
/// use rifa_core::async_effect;
///
/// async_effect! {
///     storage.save(CART_STORAGE_KEY, json).await.err().map(|e| CartAction::PersistFailed {
///         error: e.to_string(),
///     })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use rifa_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(15 * 60),
///     action: SelectionAction::ExpireReservation { reservation_id }
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}
