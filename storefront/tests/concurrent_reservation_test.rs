//! Concurrency tests for ticket holds.
//!
//! Many customers racing for the same numbers: exactly one hold wins each
//! number, losers learn which numbers were taken, and lapsed holds go back to
//! the pool.
//!
//! Run with: `cargo test --test concurrent_reservation_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use rifa_core::environment::Clock;
use rifa_storefront::fixtures::{demo_raffle, DEMO_RAFFLE_ID};
use rifa_storefront::{
    InMemoryRaffleService, RaffleService, SeededPicker, ServiceError, Storefront, StorefrontError, TicketNumber,
};
use rifa_testing::{mocks::ManualClock, test_time};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(15 * 60);

fn numbers(raw: &[u32]) -> Vec<TicketNumber> {
    raw.iter().copied().map(TicketNumber::new).collect()
}

async fn backend(clock: &ManualClock) -> InMemoryRaffleService {
    let service = InMemoryRaffleService::new(Arc::new(clock.clone()));
    service.add_raffle(demo_raffle(test_time())).await.expect("publish raffle");
    service
}

/// Fifty tasks race for one number; exactly one gets it.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_number_has_one_winner() {
    let clock = ManualClock::new(test_time());
    let service = backend(&clock).await;

    let mut tasks = Vec::new();
    for _ in 0..50 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move { service.reserve(DEMO_RAFFLE_ID, numbers(&[7]), TTL).await }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(reservation) => {
                winners += 1;
                assert_eq!(reservation.numbers, numbers(&[7]));
            },
            Err(error) => assert_eq!(error, ServiceError::AlreadyTaken { numbers: numbers(&[7]) }),
        }
    }
    assert_eq!(winners, 1);

    let raffle = service.get_raffle(DEMO_RAFFLE_ID).await.unwrap();
    assert_eq!(raffle.available_tickets, 999);
}

/// Overlapping requests never share a number and the losers hold nothing.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_holds_are_disjoint() {
    let clock = ManualClock::new(test_time());
    let service = backend(&clock).await;

    // Request i wants [i, i+1, i+2]
    let mut tasks = Vec::new();
    for start in 1..=30u32 {
        let service = service.clone();
        let wanted = numbers(&[start, start + 1, start + 2]);
        tasks.push(tokio::spawn(async move { service.reserve(DEMO_RAFFLE_ID, wanted, TTL).await }));
    }

    let mut held = BTreeSet::new();
    let mut holds = 0usize;
    for task in tasks {
        if let Ok(reservation) = task.await.expect("task panicked") {
            holds += 1;
            for number in reservation.numbers {
                assert!(held.insert(number), "{number} held twice");
            }
        }
    }
    assert!(holds >= 1);
    assert_eq!(held.len(), holds * 3);

    let raffle = service.get_raffle(DEMO_RAFFLE_ID).await.unwrap();
    assert_eq!(raffle.available_tickets as usize, 1000 - held.len());
}

/// Two storefronts reserving the same selection: one checks out, the other is told what was taken.
#[tokio::test]
async fn test_two_storefronts_race_for_the_same_numbers() {
    let clock = ManualClock::new(test_time());
    let service = backend(&clock).await;
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());

    let first = Storefront::builder(Arc::new(service.clone()))
        .clock(Arc::clone(&shared))
        .picker(Arc::new(SeededPicker::new(1)))
        .build()
        .await;
    let second = Storefront::builder(Arc::new(service.clone()))
        .clock(Arc::clone(&shared))
        .picker(Arc::new(SeededPicker::new(2)))
        .build()
        .await;
    first.load_raffle(DEMO_RAFFLE_ID).await.unwrap();
    second.load_raffle(DEMO_RAFFLE_ID).await.unwrap();

    let (a, b) = tokio::join!(first.reserve(numbers(&[10, 20, 30])), second.reserve(numbers(&[30, 40])));

    match (a, b) {
        (Ok(_), Err(error)) => {
            assert_eq!(error, StorefrontError::AlreadyTaken { numbers: numbers(&[30]) });
            // The loser forgets the taken number
            let selection = second.selection().await;
            assert!(!selection.available.contains(&TicketNumber::new(30)));
            assert!(selection.reservation.is_none());
        },
        (Err(error), Ok(_)) => {
            assert_eq!(error, StorefrontError::AlreadyTaken { numbers: numbers(&[30]) });
            assert!(first.selection().await.reservation.is_none());
        },
        other => panic!("expected exactly one winner, got {other:?}"),
    }
}

/// Holds lapse at their deadline and the sweep reports them.
#[tokio::test]
async fn test_expired_holds_return_to_pool() {
    let clock = ManualClock::new(test_time());
    let service = backend(&clock).await;

    service.reserve(DEMO_RAFFLE_ID, numbers(&[1, 2, 3]), TTL).await.unwrap();
    service.reserve(DEMO_RAFFLE_ID, numbers(&[4]), Duration::from_secs(60)).await.unwrap();

    clock.advance(chrono::Duration::minutes(2));
    assert_eq!(service.sweep_expired().await, 1);
    assert!(service.check_availability(DEMO_RAFFLE_ID, numbers(&[4])).await.unwrap().is_empty());
    assert_eq!(
        service.check_availability(DEMO_RAFFLE_ID, numbers(&[1, 2, 3])).await.unwrap(),
        numbers(&[1, 2, 3])
    );

    clock.advance(chrono::Duration::minutes(14));
    let available = service.available_numbers(DEMO_RAFFLE_ID).await.unwrap();
    assert_eq!(available.len(), 1000);

    // Anyone can take the numbers now
    service.reserve(DEMO_RAFFLE_ID, numbers(&[1, 4]), TTL).await.unwrap();
}
