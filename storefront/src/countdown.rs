//! Countdown to a raffle's drawing date.

use chrono::{DateTime, Utc};
use rifa_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default recompute period of a [`CountdownTicker`]
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Time left, split for display
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRemaining {
    /// Whole days
    pub days: u64,
    /// Hours past the days (0-23)
    pub hours: u8,
    /// Minutes past the hours (0-59)
    pub minutes: u8,
    /// Seconds past the minutes (0-59)
    pub seconds: u8,
}

impl TimeRemaining {
    /// Split a positive number of seconds
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // each component is below 60
    pub const fn from_seconds(total: u64) -> Self {
        Self {
            days: total / 86_400,
            hours: (total % 86_400 / 3_600) as u8,
            minutes: (total % 3_600 / 60) as u8,
            seconds: (total % 60) as u8,
        }
    }

    /// Back to seconds
    #[must_use]
    pub const fn total_seconds(&self) -> u64 {
        self.days * 86_400 + self.hours as u64 * 3_600 + self.minutes as u64 * 60 + self.seconds as u64
    }
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d {:02}h {:02}m {:02}s", self.days, self.hours, self.minutes, self.seconds)
    }
}

/// Time from `now` until `target`, or `None` once `target` is reached
///
/// Sub-second remainders are dropped.
#[must_use]
pub fn time_remaining(now: DateTime<Utc>, target: DateTime<Utc>) -> Option<TimeRemaining> {
    if target <= now {
        return None;
    }
    let seconds = u64::try_from((target - now).num_seconds()).ok()?;
    Some(TimeRemaining::from_seconds(seconds))
}

/// Background task publishing the time left every period
///
/// Stops on its own after publishing `None`; dropping the handle aborts it.
#[derive(Debug)]
pub struct CountdownTicker {
    receiver: watch::Receiver<Option<TimeRemaining>>,
    task: JoinHandle<()>,
}

impl CountdownTicker {
    /// Start counting down to `target`
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(clock: Arc<dyn Clock>, target: DateTime<Utc>, period: Duration) -> Self {
        let initial = time_remaining(clock.now(), target);
        let (sender, receiver) = watch::channel(initial);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let remaining = time_remaining(clock.now(), target);
                let finished = remaining.is_none();
                sender.send_replace(remaining);
                if finished {
                    tracing::debug!(%target, "Countdown finished");
                    break;
                }
            }
        });

        Self { receiver, task }
    }

    /// Latest published value
    #[must_use]
    pub fn current(&self) -> Option<TimeRemaining> {
        *self.receiver.borrow()
    }

    /// Receiver notified on every tick
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<TimeRemaining>> {
        self.receiver.clone()
    }

    /// Whether the countdown reached zero
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration as TimeDelta;
    use rifa_testing::{test_time, ManualClock};

    #[test]
    fn test_time_remaining_splits_components() {
        let now = test_time();
        let target = now + TimeDelta::days(3) + TimeDelta::hours(4) + TimeDelta::minutes(5) + TimeDelta::seconds(6);

        let remaining = time_remaining(now, target).unwrap();
        assert_eq!(remaining, TimeRemaining { days: 3, hours: 4, minutes: 5, seconds: 6 });
        assert_eq!(remaining.to_string(), "3d 04h 05m 06s");
        assert_eq!(remaining.total_seconds(), 3 * 86_400 + 4 * 3_600 + 5 * 60 + 6);
    }

    #[test]
    fn test_past_target_has_no_countdown() {
        let now = test_time();
        assert_eq!(time_remaining(now, now - TimeDelta::days(1)), None);
        assert_eq!(time_remaining(now, now), None);
        assert_eq!(
            time_remaining(now, now + TimeDelta::milliseconds(1500)),
            Some(TimeRemaining::from_seconds(1))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_publishes_until_zero() {
        let clock = ManualClock::new(test_time());
        let target = test_time() + TimeDelta::seconds(3);
        let ticker = CountdownTicker::spawn(Arc::new(clock.clone()), target, DEFAULT_TICK);
        assert_eq!(ticker.current().map(|r| r.seconds), Some(3));

        clock.advance(TimeDelta::seconds(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(ticker.current().map(|r| r.seconds), Some(2));

        clock.set(target);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticker.current(), None);
        assert!(ticker.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticker() {
        let clock = ManualClock::new(test_time());
        let ticker = CountdownTicker::spawn(Arc::new(clock), test_time() + TimeDelta::days(1), DEFAULT_TICK);
        let mut updates = ticker.subscribe();

        drop(ticker);
        // The sender goes away with the aborted task
        while updates.changed().await.is_ok() {}
    }
}
