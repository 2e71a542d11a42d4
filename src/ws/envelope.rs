use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DefaultOnError, serde_as};

use super::error::WsError;

/// Reserved event key whose subscribers receive every envelope.
pub const WILDCARD: &str = "*";

/// The `{type, payload, timestamp}` wrapper around every realtime message.
///
/// `payload` is opaque to the transport: subscribers of a specific event type
/// receive it as-is. A `timestamp` that is not RFC 3339 is read as `None`.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct Envelope {
    /// Event type used for routing (e.g. `order:shipped`)
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event-specific data
    #[serde(default)]
    #[builder(default)]
    pub payload: Value,
    /// When the sender produced the message
    #[serde_as(as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Envelope {
    /// Parse an inbound text frame.
    ///
    /// Returns the envelope along with the raw JSON document, which is what
    /// wildcard subscribers receive. Text that is not JSON is a
    /// [`WsError::MessageParse`]; JSON without a string `type` is a
    /// [`WsError::InvalidMessage`].
    pub(crate) fn parse(text: &str) -> Result<(Self, Value), WsError> {
        let raw: Value = serde_json::from_str(text).map_err(WsError::MessageParse)?;
        if !raw.is_object() {
            return Err(WsError::InvalidMessage("expected a JSON object".to_owned()));
        }
        let envelope =
            Self::deserialize(&raw).map_err(|e| WsError::InvalidMessage(e.to_string()))?;
        Ok((envelope, raw))
    }
}

/// Outbound form of [`Envelope`] that borrows its payload.
#[derive(Serialize)]
pub(crate) struct OutboundEnvelope<'msg, P: Serialize + ?Sized> {
    #[serde(rename = "type")]
    pub event_type: &'msg str,
    pub payload: &'msg P,
    pub timestamp: DateTime<Utc>,
}

impl<'msg, P: Serialize + ?Sized> OutboundEnvelope<'msg, P> {
    pub(crate) fn now(event_type: &'msg str, payload: &'msg P) -> Self {
        Self {
            event_type,
            payload,
            timestamp: Utc::now(),
        }
    }
}
