//! Endpoint catalogue of the raffle API.
//!
//! [`ApiUrls`] builds absolute URLs for the client; [`paths`] holds the same
//! endpoints as axum route templates for the dev server.

use crate::types::{OrderId, RaffleId, ReservationId};
use std::fmt::Display;

/// Route templates relative to the API root
pub mod paths {
    /// Login with email and password
    pub const AUTH_LOGIN: &str = "/auth/login";
    /// Create an account
    pub const AUTH_REGISTER: &str = "/auth/register";
    /// End the session
    pub const AUTH_LOGOUT: &str = "/auth/logout";
    /// Refresh the session token
    pub const AUTH_REFRESH: &str = "/auth/refresh";
    /// Current user
    pub const AUTH_ME: &str = "/auth/me";

    /// A user profile
    pub const USER: &str = "/users/:user_id";
    /// Tickets owned by a user
    pub const USER_TICKETS: &str = "/users/:user_id/tickets";
    /// Orders placed by a user
    pub const USER_ORDERS: &str = "/users/:user_id/orders";

    /// Raffle listing
    pub const RAFFLES: &str = "/raffles";
    /// One raffle
    pub const RAFFLE: &str = "/raffles/:raffle_id";
    /// Prizes of a raffle
    pub const RAFFLE_PRIZES: &str = "/raffles/:raffle_id/prizes";
    /// Numbers still available in a raffle
    pub const RAFFLE_NUMBERS: &str = "/raffles/:raffle_id/numbers";
    /// Availability check of specific numbers
    pub const RAFFLE_AVAILABILITY: &str = "/raffles/:raffle_id/availability";
    /// Entries (sold tickets) of a raffle
    pub const RAFFLE_ENTRIES: &str = "/raffles/:raffle_id/entries";
    /// Draw result of a raffle
    pub const RAFFLE_DRAW: &str = "/raffles/:raffle_id/draw";
    /// Statistics of a raffle
    pub const RAFFLE_STATS: &str = "/raffles/:raffle_id/stats";

    /// Ticket holds
    pub const RESERVATIONS: &str = "/reservations";
    /// One ticket hold
    pub const RESERVATION: &str = "/reservations/:reservation_id";

    /// Draws across raffles
    pub const DRAWS: &str = "/draws";

    /// Orders
    pub const ORDERS: &str = "/orders";
    /// One order
    pub const ORDER: &str = "/orders/:order_id";

    /// Payments
    pub const PAYMENTS: &str = "/payments";
    /// Payment proof upload for an order
    pub const PAYMENT_PROOF: &str = "/payments/:order_id/proof";

    /// Notifications of the current user
    pub const NOTIFICATIONS: &str = "/notifications";
    /// Mark a notification read
    pub const NOTIFICATION_READ: &str = "/notifications/:notification_id/read";

    /// Platform statistics
    pub const STATS: &str = "/stats";

    /// Support tickets
    pub const SUPPORT_TICKETS: &str = "/support/tickets";
    /// Frequently asked questions
    pub const SUPPORT_FAQ: &str = "/support/faq";

    /// Admin raffle management
    pub const ADMIN_RAFFLES: &str = "/admin/raffles";
    /// Admin order listing
    pub const ADMIN_ORDERS: &str = "/admin/orders";
    /// Admin order status change
    pub const ADMIN_ORDER_STATUS: &str = "/admin/orders/:order_id/status";
    /// Admin draw execution
    pub const ADMIN_DRAW: &str = "/admin/raffles/:raffle_id/draw";
}

/// Absolute URL builder over an API root such as `https://rifa.example/api`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiUrls {
    base: String,
}

impl ApiUrls {
    /// Catalogue rooted at `base` (a trailing slash is ignored)
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    /// The API root
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, template: &str) -> String {
        format!("{}{template}", self.base)
    }

    fn with_param(&self, template: &str, name: &str, value: impl Display) -> String {
        self.url(&template.replace(name, &value.to_string()))
    }

    // Auth

    /// `POST` login
    #[must_use]
    pub fn login(&self) -> String {
        self.url(paths::AUTH_LOGIN)
    }

    /// `POST` register
    #[must_use]
    pub fn register(&self) -> String {
        self.url(paths::AUTH_REGISTER)
    }

    /// `POST` logout
    #[must_use]
    pub fn logout(&self) -> String {
        self.url(paths::AUTH_LOGOUT)
    }

    /// `POST` token refresh
    #[must_use]
    pub fn refresh(&self) -> String {
        self.url(paths::AUTH_REFRESH)
    }

    /// `GET` current user
    #[must_use]
    pub fn me(&self) -> String {
        self.url(paths::AUTH_ME)
    }

    // Users

    /// `GET` a user
    #[must_use]
    pub fn user(&self, user_id: impl Display) -> String {
        self.with_param(paths::USER, ":user_id", user_id)
    }

    /// `GET` tickets of a user
    #[must_use]
    pub fn user_tickets(&self, user_id: impl Display) -> String {
        self.with_param(paths::USER_TICKETS, ":user_id", user_id)
    }

    /// `GET` orders of a user
    #[must_use]
    pub fn user_orders(&self, user_id: impl Display) -> String {
        self.with_param(paths::USER_ORDERS, ":user_id", user_id)
    }

    // Raffles

    /// `GET` raffle listing
    #[must_use]
    pub fn raffles(&self) -> String {
        self.url(paths::RAFFLES)
    }

    /// `GET` one raffle
    #[must_use]
    pub fn raffle(&self, raffle_id: RaffleId) -> String {
        self.with_param(paths::RAFFLE, ":raffle_id", raffle_id)
    }

    /// `GET` prizes of a raffle
    #[must_use]
    pub fn raffle_prizes(&self, raffle_id: RaffleId) -> String {
        self.with_param(paths::RAFFLE_PRIZES, ":raffle_id", raffle_id)
    }

    /// `GET` available numbers
    #[must_use]
    pub fn raffle_numbers(&self, raffle_id: RaffleId) -> String {
        self.with_param(paths::RAFFLE_NUMBERS, ":raffle_id", raffle_id)
    }

    /// `POST` availability check
    #[must_use]
    pub fn raffle_availability(&self, raffle_id: RaffleId) -> String {
        self.with_param(paths::RAFFLE_AVAILABILITY, ":raffle_id", raffle_id)
    }

    /// `GET` entries of a raffle
    #[must_use]
    pub fn raffle_entries(&self, raffle_id: RaffleId) -> String {
        self.with_param(paths::RAFFLE_ENTRIES, ":raffle_id", raffle_id)
    }

    /// `GET` draw result
    #[must_use]
    pub fn raffle_draw(&self, raffle_id: RaffleId) -> String {
        self.with_param(paths::RAFFLE_DRAW, ":raffle_id", raffle_id)
    }

    /// `GET` raffle statistics
    #[must_use]
    pub fn raffle_stats(&self, raffle_id: RaffleId) -> String {
        self.with_param(paths::RAFFLE_STATS, ":raffle_id", raffle_id)
    }

    // Tickets

    /// `POST` create a hold
    #[must_use]
    pub fn reservations(&self) -> String {
        self.url(paths::RESERVATIONS)
    }

    /// `DELETE` release a hold
    #[must_use]
    pub fn reservation(&self, reservation_id: ReservationId) -> String {
        self.with_param(paths::RESERVATION, ":reservation_id", reservation_id)
    }

    // Draws

    /// `GET` draws
    #[must_use]
    pub fn draws(&self) -> String {
        self.url(paths::DRAWS)
    }

    // Orders

    /// `POST` submit an order
    #[must_use]
    pub fn orders(&self) -> String {
        self.url(paths::ORDERS)
    }

    /// `GET` one order
    #[must_use]
    pub fn order(&self, order_id: OrderId) -> String {
        self.with_param(paths::ORDER, ":order_id", order_id)
    }

    // Payments

    /// `GET` payments
    #[must_use]
    pub fn payments(&self) -> String {
        self.url(paths::PAYMENTS)
    }

    /// `POST` payment proof
    #[must_use]
    pub fn payment_proof(&self, order_id: OrderId) -> String {
        self.with_param(paths::PAYMENT_PROOF, ":order_id", order_id)
    }

    // Notifications

    /// `GET` notifications
    #[must_use]
    pub fn notifications(&self) -> String {
        self.url(paths::NOTIFICATIONS)
    }

    /// `POST` mark read
    #[must_use]
    pub fn notification_read(&self, notification_id: impl Display) -> String {
        self.with_param(paths::NOTIFICATION_READ, ":notification_id", notification_id)
    }

    // Stats & support

    /// `GET` platform statistics
    #[must_use]
    pub fn stats(&self) -> String {
        self.url(paths::STATS)
    }

    /// `POST` open a support ticket
    #[must_use]
    pub fn support_tickets(&self) -> String {
        self.url(paths::SUPPORT_TICKETS)
    }

    /// `GET` FAQ entries
    #[must_use]
    pub fn support_faq(&self) -> String {
        self.url(paths::SUPPORT_FAQ)
    }

    // Admin

    /// `GET`/`POST` raffles (admin)
    #[must_use]
    pub fn admin_raffles(&self) -> String {
        self.url(paths::ADMIN_RAFFLES)
    }

    /// `GET` orders (admin)
    #[must_use]
    pub fn admin_orders(&self) -> String {
        self.url(paths::ADMIN_ORDERS)
    }

    /// `PUT` order status (admin)
    #[must_use]
    pub fn admin_order_status(&self, order_id: OrderId) -> String {
        self.with_param(paths::ADMIN_ORDER_STATUS, ":order_id", order_id)
    }

    /// `POST` run the draw (admin)
    #[must_use]
    pub fn admin_draw(&self, raffle_id: RaffleId) -> String {
        self.with_param(paths::ADMIN_DRAW, ":raffle_id", raffle_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let urls = ApiUrls::new("http://localhost:8080/api//");
        assert_eq!(urls.base(), "http://localhost:8080/api");
        assert_eq!(urls.raffles(), "http://localhost:8080/api/raffles");
    }

    #[test]
    fn test_parameters_are_substituted() {
        let urls = ApiUrls::new("https://rifa.example/api");
        let raffle_id = RaffleId::new();
        let order_id = OrderId::new();

        assert_eq!(urls.raffle_numbers(raffle_id), format!("https://rifa.example/api/raffles/{raffle_id}/numbers"));
        assert_eq!(urls.admin_order_status(order_id), format!("https://rifa.example/api/admin/orders/{order_id}/status"));
        assert_eq!(urls.user_tickets(42), "https://rifa.example/api/users/42/tickets");
        assert!(!urls.reservation(ReservationId::new()).contains(':'));
    }
}
