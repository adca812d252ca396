//! Domain types for the raffle storefront.
//!
//! Value objects and entities shared by the selection and cart reducers, the
//! raffle services and the HTTP layer. Wire representations are camelCase JSON.

use crate::pricing::{DiscountTable, PriceBreakdown};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a raffle
    RaffleId
}

uuid_id! {
    /// Unique identifier for a ticket hold
    ReservationId
}

uuid_id! {
    /// Unique identifier for a purchase order
    OrderId
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Amount in centavos (MXN)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero pesos
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from centavos
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole pesos, `None` on overflow
    #[must_use]
    pub const fn checked_from_pesos(pesos: u64) -> Option<Self> {
        match pesos.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Creates a `Money` value from whole pesos, saturating at `u64::MAX` centavos
    #[must_use]
    pub const fn from_pesos(pesos: u64) -> Self {
        Self(pesos.saturating_mul(100))
    }

    /// Returns the amount in centavos
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the whole pesos (rounded down)
    #[must_use]
    pub const fn pesos(&self) -> u64 {
        self.0 / 100
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts two amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Multiplies by a ticket quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// `percent`% of this amount, rounded down to the centavo
    #[must_use]
    pub const fn checked_percentage(self, percent: u32) -> Option<Self> {
        match self.0.checked_mul(percent as u64) {
            Some(product) => Some(Self(product / 100)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pesos = self.pesos().to_string();
        let mut grouped = String::with_capacity(pesos.len() + pesos.len() / 3);
        for (i, digit) in pesos.chars().enumerate() {
            if i > 0 && (pesos.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(digit);
        }
        write!(f, "${grouped}.{:02} MXN", self.0 % 100)
    }
}

// ============================================================================
// Ticket numbers
// ============================================================================

/// A ticket number within a raffle, `1..=total_tickets`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketNumber(u32);

impl TicketNumber {
    /// Wrap a raw number (range is checked against a raffle, not here)
    #[must_use]
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    /// The raw number
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Zero-padded to the digit width of `total` (`0042` in a 1000-ticket raffle)
    #[must_use]
    pub fn padded(self, total: u32) -> String {
        let width = total.max(1).to_string().len();
        format!("{:0width$}", self.0)
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TicketNumber {
    fn from(number: u32) -> Self {
        Self(number)
    }
}

// ============================================================================
// Raffle
// ============================================================================

/// Raffle lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaffleStatus {
    /// Sales have not opened yet
    Upcoming,
    /// Tickets on sale
    Active,
    /// On sale, less than a day before sales close
    EndingSoon,
    /// Sales closed, winner not drawn yet
    Ended,
    /// Winner drawn
    Drawn,
}

impl RaffleStatus {
    /// Whether customers may pick and buy numbers
    #[must_use]
    pub const fn accepts_selections(self) -> bool {
        matches!(self, Self::Active | Self::EndingSoon)
    }
}

impl fmt::Display for RaffleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::EndingSoon => "ending_soon",
            Self::Ended => "ended",
            Self::Drawn => "drawn",
        };
        f.write_str(label)
    }
}

/// How long before `end_date` a raffle counts as ending soon
pub const ENDING_SOON_WINDOW_HOURS: i64 = 24;

/// A raffle and its ticket inventory counters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Raffle {
    /// Raffle ID
    pub id: RaffleId,
    /// Display title
    pub title: String,
    /// Long description
    pub description: String,
    /// What the winner gets
    pub prize: String,
    /// Ticket numbers run `1..=total_tickets`
    pub total_tickets: u32,
    /// Tickets that can still be picked
    pub available_tickets: u32,
    /// Tickets paid for
    pub sold_tickets: u32,
    /// Price of a single ticket
    pub ticket_price: Money,
    /// Smallest purchase allowed
    pub min_per_purchase: u32,
    /// Most tickets one customer may hold
    pub max_per_person: u32,
    /// Sales open
    pub start_date: DateTime<Utc>,
    /// Sales close
    pub end_date: DateTime<Utc>,
    /// Winner is drawn
    pub drawing_date: DateTime<Utc>,
    /// Status as published by the backend
    pub status: RaffleStatus,
    /// Volume discount tiers
    #[serde(default)]
    pub bulk_discounts: DiscountTable,
}

impl Raffle {
    /// Status derived from the sales window at `now`
    ///
    /// `Drawn` and `Ended` are sticky, so a raffle the backend closed early
    /// (sold out, cancelled) stays closed. Everything else follows the dates: before
    /// `start_date` upcoming, after `end_date` ended, within the last
    /// [`ENDING_SOON_WINDOW_HOURS`] ending soon.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> RaffleStatus {
        if matches!(self.status, RaffleStatus::Drawn | RaffleStatus::Ended) {
            return self.status;
        }
        if now < self.start_date {
            RaffleStatus::Upcoming
        } else if now >= self.end_date {
            RaffleStatus::Ended
        } else if self.end_date - now < Duration::hours(ENDING_SOON_WINDOW_HOURS) {
            RaffleStatus::EndingSoon
        } else {
            RaffleStatus::Active
        }
    }

    /// Whether `number` lies in `1..=total_tickets`
    #[must_use]
    pub const fn contains(&self, number: TicketNumber) -> bool {
        number.0 >= 1 && number.0 <= self.total_tickets
    }

    /// Check the inventory and limit invariants
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.total_tickets == 0 {
            return Err("raffle has no tickets".to_string());
        }
        let accounted = u64::from(self.sold_tickets) + u64::from(self.available_tickets);
        if accounted > u64::from(self.total_tickets) {
            return Err(format!(
                "sold ({}) + available ({}) exceeds total ({})",
                self.sold_tickets, self.available_tickets, self.total_tickets
            ));
        }
        if self.min_per_purchase == 0 || self.min_per_purchase > self.max_per_person {
            return Err(format!(
                "invalid purchase limits: min {} max {}",
                self.min_per_purchase, self.max_per_person
            ));
        }
        if !(self.start_date <= self.end_date && self.end_date <= self.drawing_date) {
            return Err("dates must satisfy start <= end <= drawing".to_string());
        }
        Ok(())
    }

    /// All ticket numbers of the raffle
    pub fn numbers(&self) -> impl Iterator<Item = TicketNumber> {
        (1..=self.total_tickets).map(TicketNumber)
    }
}

// ============================================================================
// Customer & payment
// ============================================================================

/// Contact details of the buyer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Full name
    pub name: String,
    /// Email address
    pub email: String,
    /// Phone number (10 digits for Mexican numbers, a country prefix is allowed)
    pub phone: String,
    /// Mexican state of residence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Customer {
    /// Basic shape checks on the contact fields
    ///
    /// # Errors
    ///
    /// Returns a customer-facing description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }

        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'));
        if !valid_email {
            return Err(format!("'{email}' is not a valid email address"));
        }

        let digits = self.phone.chars().filter(char::is_ascii_digit).count();
        if !(10..=13).contains(&digits) {
            return Err("phone number must have 10 digits".to_string());
        }

        Ok(())
    }
}

/// Regional payment methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at an OXXO store with a barcode reference
    Oxxo,
    /// SPEI interbank transfer to a CLABE
    Spei,
    /// Deposit or transfer to a bank account
    BankTransfer,
    /// Cryptocurrency transfer
    Crypto,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Oxxo => "OXXO",
            Self::Spei => "SPEI",
            Self::BankTransfer => "bank transfer",
            Self::Crypto => "crypto",
        };
        f.write_str(label)
    }
}

/// Length of a CLABE interbank account number
pub const CLABE_LENGTH: usize = 18;

/// Chosen payment method plus the method-specific fields
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Payment method
    pub method: PaymentMethod,
    /// OXXO barcode reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// SPEI CLABE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clabe: Option<String>,
    /// Bank that sends the transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    /// Holder of the sending account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_holder: Option<String>,
    /// Sending account number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    /// Network used for a crypto payment (e.g. `USDT-TRC20`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto_network: Option<String>,
    /// Paying wallet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

impl PaymentDetails {
    /// Details with only the method set
    #[must_use]
    pub const fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            reference: None,
            clabe: None,
            bank_name: None,
            account_holder: None,
            account_number: None,
            crypto_network: None,
            wallet_address: None,
        }
    }

    /// Check the fields the chosen method needs
    ///
    /// OXXO and SPEI references are issued by the backend, so only their
    /// shape is checked when present. Bank transfers need the sending bank and
    /// crypto payments need the network.
    ///
    /// # Errors
    ///
    /// Returns a customer-facing description of the missing or malformed field.
    pub fn validate(&self) -> Result<(), String> {
        fn present(field: Option<&String>) -> bool {
            field.is_some_and(|v| !v.trim().is_empty())
        }

        if let Some(clabe) = &self.clabe {
            if clabe.len() != CLABE_LENGTH || !clabe.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("CLABE must be {CLABE_LENGTH} digits"));
            }
        }

        match self.method {
            PaymentMethod::Oxxo | PaymentMethod::Spei => Ok(()),
            PaymentMethod::BankTransfer if !present(self.bank_name.as_ref()) => {
                Err("bank name is required for bank transfers".to_string())
            },
            PaymentMethod::Crypto if !present(self.crypto_network.as_ref()) => {
                Err("crypto network is required for crypto payments".to_string())
            },
            PaymentMethod::BankTransfer | PaymentMethod::Crypto => Ok(()),
        }
    }
}

// ============================================================================
// Reservation
// ============================================================================

/// A time-boxed hold on ticket numbers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Reservation ID
    pub id: ReservationId,
    /// Raffle the numbers belong to
    pub raffle_id: RaffleId,
    /// Held numbers, in selection order
    pub numbers: Vec<TicketNumber>,
    /// When the hold lapses
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    /// Whether the hold has lapsed at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ============================================================================
// Selection snapshot
// ============================================================================

/// What a customer picked in one raffle, with its price
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSelection {
    /// Raffle the numbers belong to
    pub raffle_id: RaffleId,
    /// Unique numbers in selection order
    pub tickets: Vec<TicketNumber>,
    /// Price of `tickets`; `pricing.quantity == tickets.len()`
    pub pricing: PriceBreakdown,
}

impl TicketSelection {
    /// Number of tickets
    #[must_use]
    pub fn quantity(&self) -> u32 {
        u32::try_from(self.tickets.len()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::demo_raffle;
    use rifa_testing::test_time;

    #[test]
    fn test_money_display_groups_thousands() {
        assert_eq!(Money::from_cents(123_456_789).to_string(), "$1,234,567.89 MXN");
        assert_eq!(Money::from_pesos(100).to_string(), "$100.00 MXN");
        assert_eq!(Money::ZERO.to_string(), "$0.00 MXN");
    }

    #[test]
    fn test_money_percentage_floors() {
        assert_eq!(Money::from_cents(999).checked_percentage(5), Some(Money::from_cents(49)));
        assert_eq!(Money::from_cents(u64::MAX).checked_percentage(2), None);
    }

    #[test]
    fn test_ticket_number_padding() {
        assert_eq!(TicketNumber::new(42).padded(1000), "0042");
        assert_eq!(TicketNumber::new(7).padded(99), "07");
        assert_eq!(TicketNumber::new(12345).padded(99), "12345");
    }

    #[test]
    fn test_effective_status_follows_dates() {
        let now = test_time();
        let raffle = demo_raffle(now);

        assert_eq!(raffle.effective_status(now), RaffleStatus::Active);
        assert_eq!(raffle.effective_status(raffle.start_date - Duration::seconds(1)), RaffleStatus::Upcoming);
        assert_eq!(raffle.effective_status(raffle.end_date - Duration::hours(3)), RaffleStatus::EndingSoon);
        assert_eq!(raffle.effective_status(raffle.end_date), RaffleStatus::Ended);

        let closed_early = Raffle { status: RaffleStatus::Ended, ..raffle.clone() };
        assert_eq!(closed_early.effective_status(now), RaffleStatus::Ended);
        assert!(!RaffleStatus::Ended.accepts_selections());

        let drawn = Raffle { status: RaffleStatus::Drawn, ..raffle };
        assert_eq!(drawn.effective_status(now), RaffleStatus::Drawn);
        assert!(!RaffleStatus::Drawn.accepts_selections());
    }

    #[test]
    fn test_raffle_validate_catches_overcounted_inventory() {
        let mut raffle = demo_raffle(test_time());
        assert!(raffle.validate().is_ok());

        raffle.sold_tickets = raffle.total_tickets;
        assert!(raffle.validate().is_err());
    }

    #[test]
    fn test_customer_validation() {
        let mut customer = Customer {
            name: "Ana López".to_string(),
            email: "ana@example.mx".to_string(),
            phone: "55 1234 5678".to_string(),
            state: Some("Jalisco".to_string()),
        };
        assert!(customer.validate().is_ok());

        customer.email = "ana@localhost".to_string();
        assert!(customer.validate().is_err());

        customer.email = "ana@example.mx".to_string();
        customer.phone = "12345".to_string();
        assert!(customer.validate().is_err());
    }

    #[test]
    fn test_payment_details_required_fields() {
        assert!(PaymentDetails::new(PaymentMethod::Oxxo).validate().is_ok());
        assert!(PaymentDetails::new(PaymentMethod::BankTransfer).validate().is_err());
        assert!(PaymentDetails::new(PaymentMethod::Crypto).validate().is_err());

        let spei = PaymentDetails {
            clabe: Some("0021800123456789".to_string()),
            ..PaymentDetails::new(PaymentMethod::Spei)
        };
        assert!(spei.validate().is_err());

        let crypto = PaymentDetails {
            crypto_network: Some("USDT-TRC20".to_string()),
            ..PaymentDetails::new(PaymentMethod::Crypto)
        };
        assert!(crypto.validate().is_ok());
    }

    #[test]
    fn test_raffle_json_is_camel_case() {
        let raffle = demo_raffle(test_time());
        let json = serde_json::to_value(&raffle).unwrap();

        assert!(json.get("ticketPrice").is_some());
        assert!(json.get("bulkDiscounts").is_some());
        assert_eq!(json["status"], "active");
    }
}
