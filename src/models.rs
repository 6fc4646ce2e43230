//! Record types shared between the conversation engine and the store.
//!
//! Field sets and the status vocabulary mirror the persisted layout
//! (products: 7 fields, orders: 13 fields) and must stay stable for
//! compatibility with existing data.

use serde::{Deserialize, Serialize};

/// A catalog product. Created and mutated only by the staff catalog
/// editor; never deleted (hidden via `available`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    /// Minor-unit-free KRW.
    pub price: i64,
    pub available: bool,
    pub category: String,
    pub photo_file_id: Option<String>,
    pub description: Option<String>,
}

/// Order status state machine: `waiting_payment -> pending`
/// (payment proof attached), then `pending -> approved | rejected`
/// (terminal, staff decision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    WaitingPayment,
    Pending,
    Approved,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::WaitingPayment => "waiting_payment",
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting_payment" => Some(OrderStatus::WaitingPayment),
            "pending" => Some(OrderStatus::Pending),
            "approved" => Some(OrderStatus::Approved),
            "rejected" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fulfillment method picked during checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fulfillment {
    Pickup,
    Delivery,
}

impl Fulfillment {
    pub fn as_str(self) -> &'static str {
        match self {
            Fulfillment::Pickup => "pickup",
            Fulfillment::Delivery => "delivery",
        }
    }

    /// Human-facing label used in previews and order records.
    pub fn label(self) -> &'static str {
        match self {
            Fulfillment::Pickup => "Pickup",
            Fulfillment::Delivery => "Delivery",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pickup" => Some(Fulfillment::Pickup),
            "delivery" => Some(Fulfillment::Delivery),
            _ => None,
        }
    }
}

/// A stored order. Created once per completed checkout; mutated only
/// by the order lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    /// ISO-8601 UTC timestamp.
    pub created_at: String,
    pub buyer_chat_id: i64,
    pub buyer_username: String,
    /// Line-item summary snapshotted at creation, e.g. "Rose x2; Tulip x1".
    pub items: String,
    pub total: i64,
    /// Fulfillment label as shown to staff ("Pickup"/"Delivery").
    pub fulfillment: String,
    pub comment: String,
    /// Payment-proof photo reference; empty until the proof is attached.
    pub payment_proof: String,
    pub status: OrderStatus,
    pub handled_at: String,
    pub handled_by: String,
    pub reaction_seconds: Option<i64>,
}

/// Identity captured from the chat transport for registration and
/// order attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyerProfile {
    pub chat_id: i64,
    pub username: String,
    pub full_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_round_trip() {
        for status in [
            OrderStatus::WaitingPayment,
            OrderStatus::Pending,
            OrderStatus::Approved,
            OrderStatus::Rejected,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn test_status_vocabulary_is_stable() {
        // The persisted vocabulary is a compatibility contract.
        assert_eq!(OrderStatus::WaitingPayment.as_str(), "waiting_payment");
        assert_eq!(OrderStatus::Pending.as_str(), "pending");
        assert_eq!(OrderStatus::Approved.as_str(), "approved");
        assert_eq!(OrderStatus::Rejected.as_str(), "rejected");
    }

    #[test]
    fn test_fulfillment_parse_and_label() {
        assert_eq!(Fulfillment::parse("pickup"), Some(Fulfillment::Pickup));
        assert_eq!(Fulfillment::parse("delivery"), Some(Fulfillment::Delivery));
        assert_eq!(Fulfillment::parse("courier"), None);
        assert_eq!(Fulfillment::Delivery.label(), "Delivery");
    }
}
