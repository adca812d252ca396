//! Sample raffle used by the demo binary, the dev server and tests.

use crate::pricing::{BulkDiscount, DiscountTable};
use crate::types::{Money, Raffle, RaffleId, RaffleStatus};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Stable ID of the sample raffle
pub const DEMO_RAFFLE_ID: RaffleId =
    RaffleId::from_uuid(Uuid::from_u128(0x7d4f_3a2e_9b1c_4e8a_b5d6_0f1e_2a3b_4c5d));

/// 5% from 5 tickets, 10% from 10, 15% from 20, 20% from 50
#[must_use]
pub fn standard_discounts() -> DiscountTable {
    DiscountTable::new(vec![
        BulkDiscount::range(5, 9, 5),
        BulkDiscount::range(10, 19, 10),
        BulkDiscount::range(20, 49, 15),
        BulkDiscount::open_ended(50, 20),
    ])
    .unwrap_or_default()
}

/// A 1000-ticket raffle at $100 MXN, on sale from a day before `now` for 30 days
#[must_use]
pub fn demo_raffle(now: DateTime<Utc>) -> Raffle {
    let start_date = now - Duration::days(1);
    let end_date = now + Duration::days(30);

    Raffle {
        id: DEMO_RAFFLE_ID,
        title: "Gran Rifa Camioneta 2025".to_string(),
        description: "Participa por una camioneta último modelo. Sorteo transmitido en vivo."
            .to_string(),
        prize: "Camioneta Chevrolet Tahoe 2025".to_string(),
        total_tickets: 1000,
        available_tickets: 1000,
        sold_tickets: 0,
        ticket_price: Money::from_pesos(100),
        min_per_purchase: 1,
        max_per_person: 100,
        start_date,
        end_date,
        drawing_date: end_date + Duration::hours(2),
        status: RaffleStatus::Active,
        bulk_discounts: standard_discounts(),
    }
}
