//! Storefront domain payloads shared by the realtime channel and the REST client.
//!
//! The backend is loose about identifier types (numeric database ids on some
//! routes, UUID strings on others), so every id field accepts either and is
//! normalized to a `String`.

use bon::Builder;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::serde_helpers::StringFromAny;

/// Lifecycle status of an order.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
    /// Unknown status from the API (captures the raw value for debugging).
    #[serde(untagged)]
    Unknown(String),
}

/// Payload of the `order:*` events.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct OrderEvent {
    #[serde(alias = "id")]
    #[serde_as(as = "StringFromAny")]
    pub order_id: String,
    pub order_number: Option<String>,
    pub status: Option<OrderStatus>,
    pub total: Option<Decimal>,
    #[serde_as(as = "Option<StringFromAny>")]
    pub buyer_id: Option<String>,
    #[serde_as(as = "Option<StringFromAny>")]
    pub seller_id: Option<String>,
    /// Carrier tracking number, present on `order:shipped`
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Settlement status of a payment.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
    /// Unknown status from the API (captures the raw value for debugging).
    #[serde(untagged)]
    Unknown(String),
}

/// Payload of the `payment:*` events.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct PaymentEvent {
    #[serde(alias = "id")]
    #[serde_as(as = "StringFromAny")]
    pub payment_id: String,
    #[serde_as(as = "Option<StringFromAny>")]
    pub order_id: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub status: Option<PaymentStatus>,
    /// Payment provider (e.g. `stripe`, `paypal`)
    pub provider: Option<String>,
    /// Failure reason reported by the provider, present on `payment:failed`
    pub reason: Option<String>,
}

/// An in-app notification, delivered live via `notification:new` and listed
/// through the REST API.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct Notification {
    #[serde_as(as = "StringFromAny")]
    pub id: String,
    pub title: String,
    pub message: String,
    /// Free-form category set by the backend (e.g. `order`, `promotion`)
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// In-app route the notification links to
    pub link: Option<String>,
    #[serde(default)]
    #[builder(default)]
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// A chat message between buyer and seller.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct ChatMessage {
    #[serde_as(as = "StringFromAny")]
    pub id: String,
    #[serde_as(as = "StringFromAny")]
    pub conversation_id: String,
    #[serde_as(as = "StringFromAny")]
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Typing indicator for a conversation.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct TypingIndicator {
    #[serde_as(as = "StringFromAny")]
    pub conversation_id: String,
    #[serde_as(as = "StringFromAny")]
    pub user_id: String,
    pub is_typing: bool,
}

/// Payload of `product:sold`, sent to the seller.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct ProductSold {
    #[serde_as(as = "StringFromAny")]
    pub product_id: String,
    pub product_name: Option<String>,
    #[serde_as(as = "Option<StringFromAny>")]
    pub order_id: Option<String>,
    pub quantity: Option<u32>,
    pub price: Option<Decimal>,
}

/// Payload of `review:added`.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct Review {
    #[serde(alias = "reviewId")]
    #[serde_as(as = "StringFromAny")]
    pub id: String,
    #[serde_as(as = "StringFromAny")]
    pub product_id: String,
    #[serde_as(as = "Option<StringFromAny>")]
    pub user_id: Option<String>,
    /// Star rating, 1 to 5
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload of `payout:processed`, sent to the seller.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct Payout {
    #[serde(alias = "id")]
    #[serde_as(as = "StringFromAny")]
    pub payout_id: String,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn order_event_accepts_numeric_ids_and_unknown_status() {
        let order: OrderEvent = serde_json::from_value(json!({
            "id": 1042,
            "status": "awaiting_pickup",
            "total": "129.90",
            "buyerId": 7,
            "trackingNumber": "1Z999AA10123456784"
        }))
        .expect("order event");

        assert_eq!(order.order_id, "1042");
        assert_eq!(
            order.status,
            Some(OrderStatus::Unknown("awaiting_pickup".to_owned()))
        );
        assert_eq!(order.total, Some(dec!(129.90)));
        assert_eq!(order.buyer_id.as_deref(), Some("7"));
        assert_eq!(order.seller_id, None);
        assert_eq!(
            order.tracking_number.as_deref(),
            Some("1Z999AA10123456784")
        );
    }

    #[test]
    fn notification_defaults_read_to_false() {
        let notification: Notification = serde_json::from_value(json!({
            "id": "n-1",
            "title": "Order shipped",
            "message": "Your order #1042 is on its way",
            "type": "order",
            "createdAt": "2024-05-01T10:15:00.000Z"
        }))
        .expect("notification");

        assert!(!notification.read);
        assert_eq!(notification.kind.as_deref(), Some("order"));
        assert!(notification.created_at.is_some());
    }

    #[test]
    fn payment_amount_accepts_json_numbers() {
        let payment: PaymentEvent = serde_json::from_value(json!({
            "paymentId": "pay_1",
            "orderId": 1042,
            "amount": 59.5,
            "status": "success"
        }))
        .expect("payment event");

        assert_eq!(payment.amount, Some(dec!(59.5)));
        assert_eq!(payment.status, Some(PaymentStatus::Success));
        assert_eq!(payment.order_id.as_deref(), Some("1042"));
    }
}
