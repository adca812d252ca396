//! Integration tests for Store request/response patterns
//!
//! Covers the two ways callers learn about effect outcomes: waiting on the
//! effect handle and then reading state, or observing the action broadcast.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use rifa_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use rifa_runtime::{Store, StoreError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum HoldAction {
    /// Ask the backend to hold numbers
    Hold { numbers: Vec<u32> },
    /// Backend accepted the hold
    Held { numbers: Vec<u32> },
    /// Backend rejected the hold
    Rejected { taken: Vec<u32> },
    /// Hold timer fired
    Expire,
}

#[derive(Debug, Clone, Default)]
struct HoldState {
    held: Vec<u32>,
    in_flight: bool,
    last_error: Option<String>,
}

#[derive(Clone)]
struct HoldEnvironment {
    taken: Arc<Mutex<BTreeSet<u32>>>,
}

#[derive(Clone)]
struct HoldReducer;

impl Reducer for HoldReducer {
    type State = HoldState;
    type Action = HoldAction;
    type Environment = HoldEnvironment;

    fn reduce(
        &self,
        state: &mut HoldState,
        action: HoldAction,
        env: &HoldEnvironment,
    ) -> SmallVec<[Effect<HoldAction>; 4]> {
        match action {
            HoldAction::Hold { numbers } => {
                if state.in_flight {
                    state.last_error = Some("request in flight".to_string());
                    return SmallVec::new();
                }
                state.in_flight = true;
                state.last_error = None;

                let taken = Arc::clone(&env.taken);
                smallvec![Effect::Future(Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    let mut taken = taken.lock().await;
                    let clash: Vec<u32> =
                        numbers.iter().copied().filter(|n| taken.contains(n)).collect();
                    if clash.is_empty() {
                        taken.extend(numbers.iter().copied());
                        Some(HoldAction::Held { numbers })
                    } else {
                        Some(HoldAction::Rejected { taken: clash })
                    }
                }))]
            },
            HoldAction::Held { numbers } => {
                state.in_flight = false;
                state.held = numbers;
                smallvec![Effect::Delay {
                    duration: Duration::from_secs(900),
                    action: Box::new(HoldAction::Expire),
                }]
            },
            HoldAction::Rejected { taken } => {
                state.in_flight = false;
                state.last_error = Some(format!("taken: {taken:?}"));
                SmallVec::new()
            },
            HoldAction::Expire => {
                state.held.clear();
                SmallVec::new()
            },
        }
    }
}

fn environment() -> HoldEnvironment {
    HoldEnvironment {
        taken: Arc::new(Mutex::new(BTreeSet::new())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_wait_then_read_state() {
    let store = Store::new(HoldState::default(), HoldReducer, environment());

    let mut handle = store.send(HoldAction::Hold { numbers: vec![1, 2, 3] }).await.unwrap();
    handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

    let (held, in_flight) = store.state(|s| (s.held.clone(), s.in_flight)).await;
    assert_eq!(held, vec![1, 2, 3]);
    assert!(!in_flight);
}

#[tokio::test]
async fn test_second_request_rejected_while_in_flight() {
    let store = Store::new(HoldState::default(), HoldReducer, environment());

    let mut first = store.send(HoldAction::Hold { numbers: vec![1] }).await.unwrap();
    let _ = store.send(HoldAction::Hold { numbers: vec![2] }).await.unwrap();

    assert_eq!(
        store.state(|s| s.last_error.clone()).await,
        Some("request in flight".to_string())
    );

    first.wait().await;
    assert_eq!(store.state(|s| s.held.clone()).await, vec![1]);
}

#[tokio::test]
async fn test_clones_share_state_and_backend() {
    let env = environment();
    let first = Store::new(HoldState::default(), HoldReducer, env.clone());
    let second = Store::new(HoldState::default(), HoldReducer, env);

    let mut a = first.send(HoldAction::Hold { numbers: vec![7, 8] }).await.unwrap();
    a.wait().await;

    let outcome = second
        .send_and_wait_for(
            HoldAction::Hold { numbers: vec![8, 9] },
            |action| matches!(action, HoldAction::Held { .. } | HoldAction::Rejected { .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(outcome, HoldAction::Rejected { taken: vec![8] });

    let cloned = second.clone();
    assert_eq!(
        cloned.state(|s| s.last_error.clone()).await,
        Some("taken: [8]".to_string())
    );
}

#[tokio::test]
async fn test_subscribers_observe_feedback_actions() {
    let store = Store::new(HoldState::default(), HoldReducer, environment());
    let mut rx = store.subscribe_actions();

    let mut handle = store.send(HoldAction::Hold { numbers: vec![4] }).await.unwrap();
    handle.wait().await;

    let observed = rx.recv().await.unwrap();
    assert_eq!(observed, HoldAction::Held { numbers: vec![4] });
}

#[tokio::test(start_paused = true)]
async fn test_hold_expires_after_delay() {
    let store = Store::new(HoldState::default(), HoldReducer, environment());

    let mut handle = store.send(HoldAction::Hold { numbers: vec![5] }).await.unwrap();
    handle.wait().await;
    assert_eq!(store.state(|s| s.held.clone()).await, vec![5]);

    tokio::time::sleep(Duration::from_secs(901)).await;
    tokio::task::yield_now().await;

    assert!(store.state(|s| s.held.is_empty()).await);
}

#[tokio::test]
async fn test_send_and_wait_for_times_out() {
    let store = Store::new(HoldState::default(), HoldReducer, environment());

    let result = store
        .send_and_wait_for(
            HoldAction::Hold { numbers: vec![1] },
            |action| matches!(action, HoldAction::Expire),
            Duration::from_millis(50),
        )
        .await;

    assert_eq!(result, Err(StoreError::Timeout));
}
