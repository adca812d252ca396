//! Purchase notifications posted to an external endpoint.

use crate::metrics;
use crate::order::{OrderStatus, PurchaseOrder};
use crate::pricing::PriceBreakdown;
use crate::types::{Customer, Money, OrderId, PaymentMethod, Raffle, RaffleId, TicketNumber};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Event name sent after an order is created
pub const PURCHASE_CREATED: &str = "purchase.created";

/// Webhook delivery failure
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Request could not be sent
    #[error("webhook request failed: {0}")]
    Request(String),
    /// Endpoint answered with a non-success status
    #[error("webhook endpoint returned {status}")]
    Rejected {
        /// HTTP status
        status: u16,
    },
}

/// Raffle block of a payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRaffle {
    /// Raffle ID
    pub id: RaffleId,
    /// Title
    pub title: String,
    /// Ticket price
    pub ticket_price: Money,
    /// Drawing date
    pub drawing_date: DateTime<Utc>,
}

/// Purchase block of a payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPurchase {
    /// Order ID
    pub order_id: OrderId,
    /// Ticket numbers
    pub tickets: Vec<TicketNumber>,
    /// Price breakdown
    pub pricing: PriceBreakdown,
    /// Order status
    pub status: OrderStatus,
    /// Payment deadline
    pub expires_at: DateTime<Utc>,
}

/// Payment block of a payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayment {
    /// Chosen method
    pub method: PaymentMethod,
    /// Payment reference, if issued
    pub reference: Option<String>,
}

/// Request context
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMetadata {
    /// When the payload was built
    pub timestamp: DateTime<Utc>,
    /// Client user agent
    pub user_agent: Option<String>,
    /// Client address
    pub ip: Option<String>,
    /// Page the purchase was made from
    pub url: Option<String>,
}

impl WebhookMetadata {
    /// Metadata with only a timestamp
    #[must_use]
    pub const fn at(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, user_agent: None, ip: None, url: None }
    }
}

/// Body posted to the webhook endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Event name
    pub event: String,
    /// Raffle bought into
    pub raffle: WebhookRaffle,
    /// Buyer
    pub customer: Customer,
    /// The purchase
    pub purchase: WebhookPurchase,
    /// Payment choice
    pub payment: WebhookPayment,
    /// Request context
    pub metadata: WebhookMetadata,
}

impl WebhookPayload {
    /// `purchase.created` payload for a fresh order
    #[must_use]
    pub fn purchase_created(raffle: &Raffle, order: &PurchaseOrder, metadata: WebhookMetadata) -> Self {
        Self {
            event: PURCHASE_CREATED.to_string(),
            raffle: WebhookRaffle {
                id: raffle.id,
                title: raffle.title.clone(),
                ticket_price: raffle.ticket_price,
                drawing_date: raffle.drawing_date,
            },
            customer: order.customer.clone(),
            purchase: WebhookPurchase {
                order_id: order.id,
                tickets: order.tickets.clone(),
                pricing: order.pricing,
                status: order.status,
                expires_at: order.expires_at,
            },
            payment: WebhookPayment {
                method: order.payment.method,
                reference: order.payment.reference.clone(),
            },
            metadata,
        }
    }
}

/// Delivers webhook payloads
pub trait WebhookSender: Send + Sync {
    /// Deliver one payload
    ///
    /// # Errors
    ///
    /// [`WebhookError`] if the endpoint could not be reached or refused it.
    fn send(&self, payload: WebhookPayload) -> BoxFuture<'static, Result<(), WebhookError>>;
}

/// Posts payloads as JSON to a fixed URL
#[derive(Clone, Debug)]
pub struct HttpWebhookSender {
    client: Client,
    url: String,
}

impl HttpWebhookSender {
    /// Sender posting to `url`
    ///
    /// # Errors
    ///
    /// [`WebhookError::Request`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WebhookError::Request(e.to_string()))?;
        Ok(Self { client, url: url.into() })
    }
}

impl WebhookSender for HttpWebhookSender {
    fn send(&self, payload: WebhookPayload) -> BoxFuture<'static, Result<(), WebhookError>> {
        let client = self.client.clone();
        let url = self.url.clone();
        Box::pin(async move {
            let result = async {
                let response = client
                    .post(&url)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| WebhookError::Request(e.to_string()))?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(WebhookError::Rejected { status: status.as_u16() })
                }
            }
            .await;

            match &result {
                Ok(()) => {
                    metrics::record_webhook("delivered");
                    tracing::debug!(event = %payload.event, order_id = %payload.purchase.order_id, "Webhook delivered");
                },
                Err(error) => {
                    metrics::record_webhook("failed");
                    tracing::warn!(event = %payload.event, %error, "Webhook delivery failed");
                },
            }
            result
        })
    }
}

/// Sender used when no endpoint is configured
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopWebhookSender;

impl WebhookSender for NoopWebhookSender {
    fn send(&self, payload: WebhookPayload) -> BoxFuture<'static, Result<(), WebhookError>> {
        tracing::trace!(event = %payload.event, "No webhook configured");
        Box::pin(async { Ok(()) })
    }
}
