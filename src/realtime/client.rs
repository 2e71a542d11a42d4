use async_stream::stream;
use futures::Stream;
use serde::{Deserialize as _, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use super::types::request::{ChatMessageRequest, TypingRequest};
use super::types::response::{Event, EventType};
use crate::Result;
use crate::error::Error;
use crate::models::{ChatMessage, Notification, OrderEvent, PaymentEvent};
use crate::ws::config::Config;
use crate::ws::connection::ConnectionState;
use crate::ws::error::WsError;
use crate::ws::{ConnectionManager, Envelope, Subscription};

/// Endpoint of a locally running storefront server.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:5000/ws";

/// Realtime client speaking the storefront event vocabulary.
///
/// Handlers registered with [`on`](Self::on) and [`on_any`](Self::on_any) run
/// on the socket task as frames arrive. The stream methods hand out
/// independent receivers instead, for consumers that prefer to `.await`.
///
/// # Examples
///
/// ```rust, no_run
/// use storefront_client_sdk::realtime::{Client, EventType};
/// use futures::StreamExt as _;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::default();
///
///     let _shipped = client.on(EventType::OrderShipped, |event| {
///         if let Some(order) = event.as_order() {
///             println!("order {} is on its way", order.order_id);
///         }
///     });
///
///     client.connect("session-token");
///
///     let mut notifications = Box::pin(client.notifications());
///     while let Some(notification) = notifications.next().await {
///         println!("{}", notification?.title);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    connection: ConnectionManager,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, Config::default())
            .expect("Realtime client with default endpoint should succeed")
    }
}

impl Client {
    /// Create a realtime client for `endpoint` with the given configuration.
    pub fn new(endpoint: &str, config: Config) -> Result<Self> {
        Ok(Self {
            connection: ConnectionManager::new(endpoint, config)?,
        })
    }

    /// Wrap an existing connection manager, sharing its socket and subscribers.
    #[must_use]
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// The underlying untyped connection manager.
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Open the socket with the given session token. See [`ConnectionManager::connect`].
    pub fn connect(&self, token: &str) {
        self.connection.connect(token);
    }

    /// Close the socket and stop reconnecting. See [`ConnectionManager::disconnect`].
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state_receiver()
    }

    /// Replace the token used by automatic reconnects.
    pub fn set_token(&self, token: &str) {
        self.connection.set_token(token);
    }

    /// Get the number of registered event handlers.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.connection.subscription_count()
    }

    pub fn on_connect<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.connection.on_connect(handler)
    }

    pub fn on_disconnect<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.connection.on_disconnect(handler)
    }

    /// Register a typed handler for one event type.
    ///
    /// Payloads that do not match the event's model are logged and skipped.
    pub fn on<F>(&self, event_type: EventType, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.connection
            .subscribe(event_type.as_str(), move |payload| {
                match Event::from_payload(event_type, payload) {
                    Ok(event) => handler(&event),
                    Err(e) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(%event_type, error = %e, "Skipping realtime event with unexpected payload");
                        #[cfg(not(feature = "tracing"))]
                        let _: &Error = &e;
                    }
                }
            })
    }

    /// Register a typed handler for every event, including unknown types.
    pub fn on_any<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.connection.subscribe_all(move |raw| {
            let event = Envelope::deserialize(raw)
                .map_err(|e| Error::from(WsError::MessageParse(e)))
                .and_then(|envelope| Event::from_envelope(&envelope));
            match event {
                Ok(event) => handler(&event),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %e, "Skipping realtime event with unexpected payload");
                    #[cfg(not(feature = "tracing"))]
                    let _: &Error = &e;
                }
            }
        })
    }

    /// Register an untyped handler receiving the raw payload of `event_type`.
    ///
    /// Use [`WILDCARD`](crate::ws::WILDCARD) to receive every raw envelope.
    pub fn subscribe_raw<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.connection.subscribe(event_type, handler)
    }

    /// Stream every realtime event.
    ///
    /// Decode failures and lag are yielded as errors; neither ends the stream.
    /// The stream ends once the client and all of its clones are dropped.
    pub fn events(&self) -> impl Stream<Item = Result<Event>> {
        let mut rx = self.connection.envelopes();

        stream! {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        yield Event::from_envelope(&envelope);
                    }
                    Err(RecvError::Lagged(count)) => {
                        yield Err(lagged(count));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Stream `order:*` events along with their type.
    pub fn orders(&self) -> impl Stream<Item = Result<(EventType, OrderEvent)>> {
        self.typed_stream(EventType::is_order, |event| {
            let event_type = event.kind()?;
            match event {
                Event::OrderCreated(order)
                | Event::OrderUpdated(order)
                | Event::OrderShipped(order)
                | Event::OrderDelivered(order) => Some((event_type, order)),
                _ => None,
            }
        })
    }

    /// Stream `payment:*` events along with their type.
    pub fn payments(&self) -> impl Stream<Item = Result<(EventType, PaymentEvent)>> {
        self.typed_stream(EventType::is_payment, |event| {
            let event_type = event.kind()?;
            match event {
                Event::PaymentSuccess(payment)
                | Event::PaymentFailed(payment)
                | Event::PaymentPending(payment) => Some((event_type, payment)),
                _ => None,
            }
        })
    }

    /// Stream `notification:new` payloads.
    pub fn notifications(&self) -> impl Stream<Item = Result<Notification>> {
        self.typed_stream(
            |event_type| event_type == EventType::NotificationNew,
            |event| match event {
                Event::NotificationNew(notification) => Some(notification),
                _ => None,
            },
        )
    }

    /// Stream `chat:message` payloads.
    pub fn chat(&self) -> impl Stream<Item = Result<ChatMessage>> {
        self.typed_stream(
            |event_type| event_type == EventType::ChatMessage,
            |event| match event {
                Event::ChatMessage(message) => Some(message),
                _ => None,
            },
        )
    }

    fn typed_stream<T, F>(
        &self,
        accept: fn(EventType) -> bool,
        extract: F,
    ) -> impl Stream<Item = Result<T>>
    where
        F: Fn(Event) -> Option<T>,
    {
        let mut rx = self.connection.envelopes();

        stream! {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        let Ok(event_type) = envelope.event_type.parse::<EventType>() else {
                            continue;
                        };
                        if !accept(event_type) {
                            continue;
                        }
                        match Event::from_payload(event_type, &envelope.payload) {
                            Ok(event) => {
                                if let Some(item) = extract(event) {
                                    yield Ok(item);
                                }
                            }
                            Err(e) => {
                                yield Err(e);
                            }
                        }
                    }
                    Err(RecvError::Lagged(count)) => {
                        yield Err(lagged(count));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Send a typed event. Dropped with a warning when the socket is not open.
    #[expect(
        clippy::must_use_candidate,
        reason = "Fire-and-forget sends are the common case"
    )]
    pub fn send<P: Serialize + ?Sized>(&self, event_type: EventType, payload: &P) -> bool {
        self.connection.send(event_type.as_str(), payload)
    }

    /// Send a chat message to a conversation.
    #[expect(
        clippy::must_use_candidate,
        reason = "Fire-and-forget sends are the common case"
    )]
    pub fn send_chat_message(&self, conversation_id: &str, content: &str) -> bool {
        let request = ChatMessageRequest::builder()
            .conversation_id(conversation_id)
            .content(content)
            .build();
        self.send(EventType::ChatMessage, &request)
    }

    /// Tell the other participants whether this user is typing.
    #[expect(
        clippy::must_use_candidate,
        reason = "Fire-and-forget sends are the common case"
    )]
    pub fn send_typing(&self, conversation_id: &str, is_typing: bool) -> bool {
        let request = TypingRequest::builder()
            .conversation_id(conversation_id)
            .is_typing(is_typing)
            .build();
        self.send(EventType::ChatTyping, &request)
    }
}

fn lagged(count: u64) -> Error {
    #[cfg(feature = "tracing")]
    tracing::warn!("Realtime event stream lagged, missed {count} messages");
    WsError::Lagged { count }.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_targets_local_server() {
        let client = Client::default();

        assert_eq!(client.connection().endpoint().as_str(), DEFAULT_ENDPOINT);
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
    }

    #[test]
    fn typed_handlers_register_under_wire_names() {
        let client = Client::default();

        let shipped = client.on(EventType::OrderShipped, |_| {});
        let _any = client.on_any(|_| {});
        let _raw = client.subscribe_raw("coupon:issued", |_| {});

        assert_eq!(client.connection().subscriber_count("order:shipped"), 1);
        assert_eq!(client.connection().subscriber_count("*"), 1);
        assert_eq!(client.subscription_count(), 3);

        assert!(shipped.unsubscribe());
        assert_eq!(client.connection().subscriber_count("order:shipped"), 0);
    }

    #[test]
    fn sends_are_dropped_while_disconnected() {
        let client = Client::default();
        let _handler = client.on(EventType::ChatMessage, |_| {});

        assert!(!client.send_chat_message("c-1", "hello"));
        assert!(!client.send_typing("c-1", true));
        assert_eq!(client.subscription_count(), 1, "subscribers untouched");
    }

    #[test]
    fn rejects_non_websocket_endpoints() {
        let err = Client::new("https://api.example.com", Config::default())
            .expect_err("http endpoints are rejected");

        assert_eq!(err.kind(), crate::error::Kind::Validation);
    }
}
