//! Simulated live activity shown on the raffle page.
//!
//! Social proof only: the events are generated locally at random intervals
//! and never touch inventory.

use crate::metrics;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rifa_core::environment::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

const FIRST_NAMES: &[&str] = &[
    "Alejandro", "María", "José", "Guadalupe", "Juan", "Fernanda", "Carlos", "Sofía", "Luis",
    "Valeria", "Miguel", "Daniela", "Jorge", "Ximena", "Ricardo", "Camila",
];

const CITIES: &[&str] = &[
    "CDMX", "Guadalajara", "Monterrey", "Puebla", "Tijuana", "León", "Querétaro", "Mérida",
    "Culiacán", "Hermosillo", "Morelia", "Chihuahua", "Toluca", "Oaxaca",
];

/// One simulated purchase
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Buyer first name
    pub buyer: String,
    /// Buyer city
    pub city: String,
    /// Tickets bought
    pub tickets: u32,
    /// When it "happened"
    pub at: DateTime<Utc>,
}

/// Feed parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveConfig {
    /// Shortest gap between events
    pub min_interval: Duration,
    /// Longest gap between events
    pub max_interval: Duration,
    /// Viewer counter floor
    pub min_viewers: u32,
    /// Viewer counter ceiling
    pub max_viewers: u32,
    /// Fixed RNG seed (random when `None`)
    pub seed: Option<u64>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(8),
            max_interval: Duration::from_secs(25),
            min_viewers: 12,
            max_viewers: 80,
            seed: None,
        }
    }
}

/// Handle of a running feed; dropping it stops the feed
#[derive(Debug)]
pub struct LiveActivityFeed {
    events: broadcast::Sender<ActivityEvent>,
    viewers: watch::Receiver<u32>,
    task: JoinHandle<()>,
}

impl LiveActivityFeed {
    /// Start the feed (inside a tokio runtime)
    pub fn spawn(config: LiveConfig, clock: Arc<dyn Clock>) -> Self {
        let mut rng = config.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        let (floor, ceiling) = ordered(config.min_viewers, config.max_viewers);
        let (shortest, longest) = ordered(millis(config.min_interval), millis(config.max_interval));

        let initial = rng.gen_range(floor..=ceiling);
        let (viewer_tx, viewers) = watch::channel(initial);
        let (events, _) = broadcast::channel(32);
        let sender = events.clone();

        let task = tokio::spawn(async move {
            let mut current = initial;
            loop {
                let wait = rng.gen_range(shortest..=longest);
                tokio::time::sleep(Duration::from_millis(wait)).await;

                let event = ActivityEvent {
                    buyer: pick(&mut rng, FIRST_NAMES),
                    city: pick(&mut rng, CITIES),
                    tickets: *[1, 1, 2, 3, 5, 5, 10, 20].choose(&mut rng).unwrap_or(&1),
                    at: clock.now(),
                };
                // No subscribers is fine
                let _ = sender.send(event);

                let step: i64 = rng.gen_range(-4..=5);
                let next = (i64::from(current) + step).clamp(i64::from(floor), i64::from(ceiling));
                current = u32::try_from(next).unwrap_or(floor);
                viewer_tx.send_replace(current);
                metrics::update_live_viewers(current);
            }
        });

        Self { events, viewers, task }
    }

    /// Receive future activity events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.events.subscribe()
    }

    /// Current viewer count
    #[must_use]
    pub fn viewers(&self) -> u32 {
        *self.viewers.borrow()
    }

    /// Receiver notified on every viewer change
    #[must_use]
    pub fn watch_viewers(&self) -> watch::Receiver<u32> {
        self.viewers.clone()
    }
}

impl Drop for LiveActivityFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b { (a, b) } else { (b, a) }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn pick(rng: &mut StdRng, options: &[&str]) -> String {
    options.choose(rng).copied().unwrap_or_default().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rifa_testing::test_clock;

    fn config() -> LiveConfig {
        LiveConfig {
            min_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(2),
            min_viewers: 10,
            max_viewers: 20,
            seed: Some(3),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_emits_events_within_bounds() {
        let feed = LiveActivityFeed::spawn(config(), Arc::new(test_clock()));
        let mut events = feed.subscribe();

        for _ in 0..5 {
            let event = tokio::time::timeout(Duration::from_secs(3), events.recv()).await.unwrap().unwrap();
            assert!(FIRST_NAMES.contains(&event.buyer.as_str()));
            assert!(CITIES.contains(&event.city.as_str()));
            assert!(event.tickets >= 1);
            assert!((10..=20).contains(&feed.viewers()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_closes_feed() {
        let feed = LiveActivityFeed::spawn(config(), Arc::new(test_clock()));
        let mut viewers = feed.watch_viewers();
        drop(feed);

        while viewers.changed().await.is_ok() {}
    }

    #[test]
    fn test_swapped_bounds_are_ordered() {
        assert_eq!(ordered(20, 10), (10, 20));
        assert_eq!(ordered(1, 1), (1, 1));
    }
}
