use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::error::Error;
use crate::models::{
    ChatMessage, Notification, OrderEvent, PaymentEvent, Payout, ProductSold, Review,
    TypingIndicator,
};
use crate::ws::Envelope;
use crate::ws::error::WsError;

/// Event types pushed by the storefront server.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
pub enum EventType {
    #[serde(rename = "order:created")]
    #[strum(serialize = "order:created")]
    OrderCreated,
    #[serde(rename = "order:updated")]
    #[strum(serialize = "order:updated")]
    OrderUpdated,
    #[serde(rename = "order:shipped")]
    #[strum(serialize = "order:shipped")]
    OrderShipped,
    #[serde(rename = "order:delivered")]
    #[strum(serialize = "order:delivered")]
    OrderDelivered,
    #[serde(rename = "payment:success")]
    #[strum(serialize = "payment:success")]
    PaymentSuccess,
    #[serde(rename = "payment:failed")]
    #[strum(serialize = "payment:failed")]
    PaymentFailed,
    #[serde(rename = "payment:pending")]
    #[strum(serialize = "payment:pending")]
    PaymentPending,
    #[serde(rename = "notification:new")]
    #[strum(serialize = "notification:new")]
    NotificationNew,
    #[serde(rename = "chat:message")]
    #[strum(serialize = "chat:message")]
    ChatMessage,
    #[serde(rename = "chat:typing")]
    #[strum(serialize = "chat:typing")]
    ChatTyping,
    #[serde(rename = "product:sold")]
    #[strum(serialize = "product:sold")]
    ProductSold,
    #[serde(rename = "review:added")]
    #[strum(serialize = "review:added")]
    ReviewAdded,
    #[serde(rename = "payout:processed")]
    #[strum(serialize = "payout:processed")]
    PayoutProcessed,
}

impl EventType {
    pub const ALL: [Self; 13] = [
        Self::OrderCreated,
        Self::OrderUpdated,
        Self::OrderShipped,
        Self::OrderDelivered,
        Self::PaymentSuccess,
        Self::PaymentFailed,
        Self::PaymentPending,
        Self::NotificationNew,
        Self::ChatMessage,
        Self::ChatTyping,
        Self::ProductSold,
        Self::ReviewAdded,
        Self::PayoutProcessed,
    ];

    /// Wire name of the event type, used as the subscription key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderCreated => "order:created",
            Self::OrderUpdated => "order:updated",
            Self::OrderShipped => "order:shipped",
            Self::OrderDelivered => "order:delivered",
            Self::PaymentSuccess => "payment:success",
            Self::PaymentFailed => "payment:failed",
            Self::PaymentPending => "payment:pending",
            Self::NotificationNew => "notification:new",
            Self::ChatMessage => "chat:message",
            Self::ChatTyping => "chat:typing",
            Self::ProductSold => "product:sold",
            Self::ReviewAdded => "review:added",
            Self::PayoutProcessed => "payout:processed",
        }
    }

    #[must_use]
    pub const fn is_order(self) -> bool {
        matches!(
            self,
            Self::OrderCreated | Self::OrderUpdated | Self::OrderShipped | Self::OrderDelivered
        )
    }

    #[must_use]
    pub const fn is_payment(self) -> bool {
        matches!(
            self,
            Self::PaymentSuccess | Self::PaymentFailed | Self::PaymentPending
        )
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| Error::validation(format!("unknown event type: {s}")))
    }
}

/// A decoded realtime event.
///
/// Event types this SDK does not know are preserved as [`Event::Unknown`]
/// so newer servers do not break older clients.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    OrderCreated(OrderEvent),
    OrderUpdated(OrderEvent),
    OrderShipped(OrderEvent),
    OrderDelivered(OrderEvent),
    PaymentSuccess(PaymentEvent),
    PaymentFailed(PaymentEvent),
    PaymentPending(PaymentEvent),
    NotificationNew(Notification),
    ChatMessage(ChatMessage),
    ChatTyping(TypingIndicator),
    ProductSold(ProductSold),
    ReviewAdded(Review),
    PayoutProcessed(Payout),
    /// An event type without a typed model
    Unknown {
        event_type: String,
        payload: Value,
    },
}

impl Event {
    /// Decode the payload of `envelope` according to its type.
    ///
    /// # Errors
    ///
    /// Returns a [`Kind::WebSocket`](crate::error::Kind::WebSocket) error when
    /// the type is known but the payload does not match its model.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        match envelope.event_type.parse::<EventType>() {
            Ok(event_type) => Self::from_payload(event_type, &envelope.payload),
            Err(_) => Ok(Self::Unknown {
                event_type: envelope.event_type.clone(),
                payload: envelope.payload.clone(),
            }),
        }
    }

    /// Decode `payload` as the model for `event_type`.
    pub fn from_payload(event_type: EventType, payload: &Value) -> Result<Self> {
        Ok(match event_type {
            EventType::OrderCreated => Self::OrderCreated(decode(payload)?),
            EventType::OrderUpdated => Self::OrderUpdated(decode(payload)?),
            EventType::OrderShipped => Self::OrderShipped(decode(payload)?),
            EventType::OrderDelivered => Self::OrderDelivered(decode(payload)?),
            EventType::PaymentSuccess => Self::PaymentSuccess(decode(payload)?),
            EventType::PaymentFailed => Self::PaymentFailed(decode(payload)?),
            EventType::PaymentPending => Self::PaymentPending(decode(payload)?),
            EventType::NotificationNew => Self::NotificationNew(decode(payload)?),
            EventType::ChatMessage => Self::ChatMessage(decode(payload)?),
            EventType::ChatTyping => Self::ChatTyping(decode(payload)?),
            EventType::ProductSold => Self::ProductSold(decode(payload)?),
            EventType::ReviewAdded => Self::ReviewAdded(decode(payload)?),
            EventType::PayoutProcessed => Self::PayoutProcessed(decode(payload)?),
        })
    }

    /// The known event type, or `None` for [`Event::Unknown`].
    #[must_use]
    pub const fn kind(&self) -> Option<EventType> {
        Some(match self {
            Self::OrderCreated(_) => EventType::OrderCreated,
            Self::OrderUpdated(_) => EventType::OrderUpdated,
            Self::OrderShipped(_) => EventType::OrderShipped,
            Self::OrderDelivered(_) => EventType::OrderDelivered,
            Self::PaymentSuccess(_) => EventType::PaymentSuccess,
            Self::PaymentFailed(_) => EventType::PaymentFailed,
            Self::PaymentPending(_) => EventType::PaymentPending,
            Self::NotificationNew(_) => EventType::NotificationNew,
            Self::ChatMessage(_) => EventType::ChatMessage,
            Self::ChatTyping(_) => EventType::ChatTyping,
            Self::ProductSold(_) => EventType::ProductSold,
            Self::ReviewAdded(_) => EventType::ReviewAdded,
            Self::PayoutProcessed(_) => EventType::PayoutProcessed,
            Self::Unknown { .. } => return None,
        })
    }

    /// Wire name of this event's type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::Unknown { event_type, .. } => event_type,
            known => known.kind().map_or("", EventType::as_str),
        }
    }

    #[must_use]
    pub const fn as_order(&self) -> Option<&OrderEvent> {
        match self {
            Self::OrderCreated(order)
            | Self::OrderUpdated(order)
            | Self::OrderShipped(order)
            | Self::OrderDelivered(order) => Some(order),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_payment(&self) -> Option<&PaymentEvent> {
        match self {
            Self::PaymentSuccess(payment)
            | Self::PaymentFailed(payment)
            | Self::PaymentPending(payment) => Some(payment),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_notification(&self) -> Option<&Notification> {
        match self {
            Self::NotificationNew(notification) => Some(notification),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_chat_message(&self) -> Option<&ChatMessage> {
        match self {
            Self::ChatMessage(message) => Some(message),
            _ => None,
        }
    }
}

fn decode<T: DeserializeOwned>(payload: &Value) -> Result<T> {
    T::deserialize(payload).map_err(|e| WsError::MessageParse(e).into())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::error::Kind;
    use crate::models::{OrderStatus, PaymentStatus};

    fn envelope(event_type: &str, payload: Value) -> Envelope {
        Envelope::builder()
            .event_type(event_type)
            .payload(payload)
            .build()
    }

    #[test]
    fn event_type_names_match_wire() {
        for event_type in EventType::ALL {
            assert_eq!(event_type.to_string(), event_type.as_str());
            assert_eq!(event_type.as_str().parse::<EventType>().ok(), Some(event_type));
            assert_eq!(
                serde_json::to_value(event_type).expect("serializable"),
                json!(event_type.as_str())
            );
        }
        assert!("order:refunded".parse::<EventType>().is_err());
    }

    #[test]
    fn decodes_order_shipped() {
        let event = Event::from_envelope(&envelope(
            "order:shipped",
            json!({
                "orderId": 1042,
                "orderNumber": "ORD-1042",
                "status": "shipped",
                "total": "89.50",
                "trackingNumber": "1Z999",
                "carrier": "UPS"
            }),
        ))
        .expect("valid order payload");

        assert_eq!(event.kind(), Some(EventType::OrderShipped));
        assert_eq!(event.event_type(), "order:shipped");
        let order = event.as_order().expect("order event");
        assert_eq!(order.order_id, "1042");
        assert_eq!(order.status, Some(OrderStatus::Shipped));
        assert_eq!(order.total, Some(dec!(89.50)));
        assert_eq!(order.tracking_number.as_deref(), Some("1Z999"));
        assert!(event.as_payment().is_none());
    }

    #[test]
    fn decodes_payment_failed() {
        let event = Event::from_envelope(&envelope(
            "payment:failed",
            json!({ "paymentId": "pay_1", "orderId": "o-7", "amount": 12.5, "status": "failed", "reason": "card_declined" }),
        ))
        .expect("valid payment payload");

        let Event::PaymentFailed(payment) = event else {
            panic!("expected payment:failed, got {event:?}");
        };
        assert_eq!(payment.status, Some(PaymentStatus::Failed));
        assert_eq!(payment.amount, Some(dec!(12.5)));
        assert_eq!(payment.reason.as_deref(), Some("card_declined"));
    }

    #[test]
    fn unknown_type_is_preserved() {
        let payload = json!({ "couponCode": "SPRING" });
        let event = Event::from_envelope(&envelope("coupon:issued", payload.clone()))
            .expect("unknown types are not errors");

        assert_eq!(event.kind(), None);
        assert_eq!(event.event_type(), "coupon:issued");
        assert_eq!(
            event,
            Event::Unknown {
                event_type: "coupon:issued".to_owned(),
                payload
            }
        );
    }

    #[test]
    fn mismatched_payload_is_an_error() {
        let err = Event::from_envelope(&envelope("chat:message", json!({ "content": 5 })))
            .expect_err("content must be a string");

        assert_eq!(err.kind(), Kind::WebSocket);
        assert!(matches!(
            err.downcast_ref::<WsError>(),
            Some(WsError::MessageParse(_))
        ));
    }
}
