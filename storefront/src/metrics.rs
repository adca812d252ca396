//! Business metrics for the raffle storefront.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `rifa_selections_total{source}` - Numbers added to a selection (manual, quick_pick)
//! - `rifa_reservations_total{status}` - Holds by outcome (held, rejected, released, expired)
//! - `rifa_orders_total` - Orders submitted
//! - `rifa_order_revenue_cents_total` - Order totals in centavos
//! - `rifa_webhook_deliveries_total{status}` - Webhook calls (delivered, failed)
//!
//! ## Gauges
//! - `rifa_live_viewers` - Simulated viewer count shown on the raffle page
//!
//! ## Histograms
//! - `rifa_order_tickets` - Tickets per order

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all business metric descriptions.
///
/// Call once at startup, before anything is recorded.
pub fn register_business_metrics() {
    describe_counter!("rifa_selections_total", "Ticket numbers added to a selection by source");
    describe_counter!(
        "rifa_reservations_total",
        "Ticket holds by outcome (held, rejected, released, expired)"
    );
    describe_counter!("rifa_orders_total", "Purchase orders submitted");
    describe_counter!("rifa_order_revenue_cents_total", "Order totals after discount in centavos");
    describe_counter!("rifa_webhook_deliveries_total", "Webhook deliveries by outcome");
    describe_gauge!("rifa_live_viewers", "Simulated number of people viewing the raffle");
    describe_histogram!("rifa_order_tickets", "Tickets per submitted order");

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record `count` numbers added to a selection.
///
/// # Arguments
///
/// * `source` - `"manual"` or `"quick_pick"`
pub fn record_selection(source: &'static str, count: usize) {
    metrics::counter!("rifa_selections_total", "source" => source).increment(count as u64);
}

/// Record a hold outcome (`"held"`, `"rejected"`, `"released"`, `"expired"`).
pub fn record_reservation(status: &'static str) {
    metrics::counter!("rifa_reservations_total", "status" => status).increment(1);
    tracing::debug!(status, "Recorded reservation metric");
}

/// Record a submitted order.
///
/// # Arguments
///
/// * `tickets` - Tickets in the order
/// * `total_cents` - Amount due after discount
#[allow(clippy::cast_precision_loss)] // histogram precision is sufficient
pub fn record_order(tickets: usize, total_cents: u64) {
    metrics::counter!("rifa_orders_total").increment(1);
    metrics::counter!("rifa_order_revenue_cents_total").increment(total_cents);
    metrics::histogram!("rifa_order_tickets").record(tickets as f64);
    tracing::debug!(tickets, total_cents, "Recorded order metric");
}

/// Record a webhook delivery outcome (`"delivered"`, `"failed"`).
pub fn record_webhook(status: &'static str) {
    metrics::counter!("rifa_webhook_deliveries_total", "status" => status).increment(1);
}

/// Update the simulated viewer gauge.
pub fn update_live_viewers(viewers: u32) {
    metrics::gauge!("rifa_live_viewers").set(f64::from(viewers));
}
