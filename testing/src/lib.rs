//! # Rifa Testing
//!
//! Testing utilities for the rifa storefront reducers and services.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `ManualClock`)
//! - A Given-When-Then harness for reducers (`ReducerTest`)
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use rifa_testing::{ReducerTest, test_clock};
//!
//! ReducerTest::new(SelectionReducer::new())
//!     .with_env(test_environment())
//!     .given_state(state_with_raffle())
//!     .when_action(SelectionAction::Select { number: TicketNumber::new(7) })
//!     .then_state(|s| assert_eq!(s.selected.len(), 1))
//!     .run();
//! ```

use chrono::{DateTime, Duration, Utc};
use rifa_core::environment::Clock;
use std::sync::{Arc, Mutex, PoisonError};


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, PoisonError, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use rifa_testing::mocks::FixedClock;
    /// use rifa_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the code under test.
    ///
    /// ```
    /// use rifa_testing::mocks::ManualClock;
    /// use rifa_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = ManualClock::new(rifa_testing::test_time());
    /// let before = clock.now();
    /// clock.advance(Duration::minutes(16));
    /// assert_eq!(clock.now() - before, Duration::minutes(16));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward (or backward for a negative duration)
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}

/// The reference instant used across tests (2025-01-01 00:00:00 UTC)
#[must_use]
pub fn test_time() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_735_689_600)
}

/// Create a default fixed clock for tests, pinned at [`test_time`]
#[must_use]
pub fn test_clock() -> mocks::FixedClock {
    mocks::FixedClock::new(test_time())
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock};
pub use reducer_test::{assertions, ReducerTest};
