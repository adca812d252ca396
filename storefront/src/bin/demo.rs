//! Rifa storefront demo
//!
//! Walks one customer through a purchase:
//! - Load the raffle and show the countdown to the draw
//! - Quick pick and hand-pick numbers, watching bulk discounts apply
//! - Check out (availability check → hold → order)
//! - A second customer losing a race for a held number
//! - Operator confirming the payment
//!
//! Runs against the in-memory backend unless `RIFA_API_BASE_URL` points at a
//! running server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin demo
//!
//! # Against the dev server
//! cargo run --bin server &
//! RIFA_API_BASE_URL=http://localhost:8080/api cargo run --bin demo
//! ```

use rifa_core::environment::{Clock, SystemClock};
use rifa_runtime::retry::RetryPolicy;
use rifa_storefront::{
    api::ApiUrls,
    fixtures::{demo_raffle, DEMO_RAFFLE_ID},
    live::LiveActivityFeed,
    metrics, Config, Customer, FileStorage, HttpRaffleService, HttpWebhookSender, InMemoryRaffleService,
    MemoryStorage, NoopWebhookSender, PaymentDetails, PaymentMethod, RaffleService, Storage, Storefront,
    TicketNumber, WebhookSender,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
#[allow(clippy::too_many_lines)] // linear walkthrough
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,rifa_storefront=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    metrics::register_business_metrics();

    println!("\n🎟️  ============================================");
    println!("   Rifa Storefront - Live Demo");
    println!("============================================\n");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // ========== Backend ==========

    let local = if std::env::var_os("RIFA_API_BASE_URL").is_some() {
        None
    } else {
        let service = InMemoryRaffleService::new(Arc::clone(&clock))
            .with_payment_window(config.storefront.payment_window())
            .with_max_hold(config.storefront.reservation_ttl());
        service.add_raffle(demo_raffle(clock.now())).await?;
        Some(service)
    };

    let service: Arc<dyn RaffleService> = match &local {
        Some(service) => {
            println!("⚙️  Backend: in-memory ledger");
            Arc::new(service.clone())
        },
        None => {
            println!("⚙️  Backend: {}", config.api.base_url);
            let retry = RetryPolicy::builder().max_retries(config.api.max_retries).build();
            Arc::new(
                HttpRaffleService::new(ApiUrls::new(config.api.base_url.clone()), config.api.timeout())?
                    .with_retry_policy(retry),
            )
        },
    };

    let storage: Arc<dyn Storage> = match &config.storefront.storage_dir {
        Some(dir) => {
            println!("⚙️  Cart storage: {}", dir.display());
            Arc::new(FileStorage::new(dir.clone()))
        },
        None => Arc::new(MemoryStorage::new()),
    };

    let webhook: Arc<dyn WebhookSender> = match &config.storefront.webhook_url {
        Some(url) => Arc::new(HttpWebhookSender::new(url.clone(), config.api.timeout())?),
        None => Arc::new(NoopWebhookSender),
    };

    let storefront = Storefront::builder(Arc::clone(&service))
        .clock(Arc::clone(&clock))
        .storage(storage)
        .webhook(webhook)
        .reservation_ttl(config.storefront.reservation_ttl())
        .request_timeout(config.api.timeout())
        .countdown_period(config.storefront.countdown_interval())
        .user_agent(concat!("rifa-demo/", env!("CARGO_PKG_VERSION")))
        .build()
        .await;

    let previous_orders = storefront.cart().await.orders.len();
    if previous_orders > 0 {
        println!("   ✓ Restored {previous_orders} orders from a previous session");
    }

    // ========== Step 1: Raffle ==========

    println!("\n1️⃣  Loading raffle...");
    let raffle = storefront.load_raffle(DEMO_RAFFLE_ID).await?;
    println!("   {} - {}", raffle.title, raffle.prize);
    println!("   Price: {} per ticket", raffle.ticket_price);
    println!("   Available: {} of {}", raffle.available_tickets, raffle.total_tickets);
    if let Some(remaining) = storefront.time_remaining().await {
        println!("   Draw in: {remaining}");
    }
    for tier in raffle.bulk_discounts.tiers() {
        match tier.max_quantity {
            Some(max) => println!("   {}-{} tickets: {}% off", tier.min_quantity, max, tier.discount_percentage),
            None => println!("   {}+ tickets: {}% off", tier.min_quantity, tier.discount_percentage),
        }
    }

    let feed = LiveActivityFeed::spawn(config.live.to_live_config(), Arc::clone(&clock));
    println!("   👀 {} people viewing now", feed.viewers());

    // ========== Step 2: Selection ==========

    println!("\n2️⃣  Picking numbers...");
    let picked = storefront.quick_pick(10).await?;
    let pricing = storefront.selection().await.pricing;
    println!("   Quick pick: {}", join(&picked, raffle.total_tickets));
    println!(
        "   {} tickets: {} - {} ({}%) = {}",
        pricing.quantity, pricing.subtotal, pricing.discount, pricing.discount_percentage, pricing.total
    );

    if let Err(error) = storefront.quick_pick(raffle.max_per_person + 1).await {
        println!("   ✗ Quick pick {}: {error}", raffle.max_per_person + 1);
    }

    storefront.clear().await?;
    for number in [7, 13, 77, 100, 777] {
        storefront.select(TicketNumber::new(number)).await?;
    }
    let selection = storefront.selection().await;
    println!("   Hand-picked: {}", join(&selection.selected, raffle.total_tickets));
    println!("   Total: {} ({}% off)", selection.pricing.total, selection.pricing.discount_percentage);
    storefront.validate().await?;
    println!("   ✓ Selection is valid");

    // ========== Step 3: Checkout ==========

    println!("\n3️⃣  Checking out...");
    storefront
        .set_customer(Customer {
            name: "Ana López".to_string(),
            email: "ana.lopez@example.mx".to_string(),
            phone: "55 1234 5678".to_string(),
            state: Some("Jalisco".to_string()),
        })
        .await?;
    storefront.set_payment(PaymentDetails::new(PaymentMethod::Oxxo)).await?;

    let order = storefront.checkout().await?;
    println!("   ✓ Order {} created ({})", order.id, order.status);
    println!("   Tickets: {}", join(&order.tickets, raffle.total_tickets));
    println!("   Total: {} via {}", order.pricing.total, order.payment.method);
    println!("   Pay before: {}", order.expires_at.format("%Y-%m-%d %H:%M UTC"));

    // ========== Step 4: Competing buyer ==========

    println!("\n4️⃣  A second customer tries ticket 7...");
    let rival = Storefront::builder(Arc::clone(&service)).clock(Arc::clone(&clock)).build().await;
    rival.load_raffle(DEMO_RAFFLE_ID).await?;
    match rival.select(TicketNumber::new(7)).await {
        Ok(()) => println!("   Unexpected: ticket 7 was still selectable"),
        Err(error) => println!("   ✗ {error}"),
    }
    match rival.reserve(vec![TicketNumber::new(7), TicketNumber::new(8)]).await {
        Ok(reservation) => println!("   Unexpected: held {:?}", reservation.numbers),
        Err(error) => println!("   ✗ {error}"),
    }
    let held = rival.reserve(vec![TicketNumber::new(8)]).await?;
    println!("   ✓ Holds ticket 8 until {}", held.expires_at.format("%H:%M:%S"));
    rival.release().await?;
    println!("   ✓ Released it again");

    // ========== Step 5: Payment ==========

    if let Some(backend) = &local {
        println!("\n5️⃣  Operator confirms payment...");
        backend.mark_payment_submitted(order.id).await?;
        backend.complete_order(order.id).await?;
        let refreshed = storefront.refresh_order(order.id).await?;
        println!("   ✓ Order {}", refreshed.status);

        let raffle = service.get_raffle(DEMO_RAFFLE_ID).await?;
        println!("   Sold: {}  Available: {}", raffle.sold_tickets, raffle.available_tickets);
    }

    // ========== Summary ==========

    let cart = storefront.cart().await;
    println!("\n🛒 Cart history ({} orders):", cart.orders.len());
    for order in &cart.orders {
        println!("   - {} {} tickets {} [{}]", order.id, order.tickets.len(), order.pricing.total, order.status);
    }

    drop(feed);
    rival.shutdown(Duration::from_secs(1)).await?;
    storefront.shutdown(Duration::from_secs(2)).await?;

    println!("\n✨ Demo completed!");
    Ok(())
}

fn join(numbers: &[TicketNumber], total: u32) -> String {
    numbers.iter().map(|n| n.padded(total)).collect::<Vec<_>>().join(" ")
}
