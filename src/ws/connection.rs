#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use backoff::backoff::Backoff as _;
use futures::{SinkExt as _, StreamExt as _};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::{Config, ReconnectPolicy};
use super::envelope::{Envelope, OutboundEnvelope, WILDCARD};
use super::error::WsError;
use super::registry::{LifecycleRegistry, Subscription, SubscriptionRegistry};
use crate::Result;
use crate::error::{Error, Kind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for dispatched envelopes.
const BROADCAST_CAPACITY: usize = 1024;

/// Close reason sent with a client-initiated disconnect.
pub const CLIENT_DISCONNECT_REASON: &str = "Client disconnect";

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, or the socket is closing
    Disconnected,
    /// Opening handshake in progress
    Connecting,
    /// Socket is open
    Open {
        /// When the connection was established
        since: Instant,
    },
}

impl ConnectionState {
    /// Check if the connection is currently open.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Open { .. })
    }

    #[must_use]
    pub const fn is_connecting(self) -> bool {
        matches!(self, Self::Connecting)
    }
}

/// How the most recent socket ended.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code from the close frame, if one was exchanged
    pub code: Option<u16>,
    /// Close reason, or a description of the transport failure
    pub reason: String,
    /// Whether the close was requested through [`ConnectionManager::disconnect`]
    pub client_initiated: bool,
}

impl CloseInfo {
    fn client() -> Self {
        Self {
            code: Some(CloseCode::Normal.into()),
            reason: CLIENT_DISCONNECT_REASON.to_owned(),
            client_initiated: true,
        }
    }

    fn abnormal<S: Into<String>>(reason: S) -> Self {
        Self {
            code: None,
            reason: reason.into(),
            client_initiated: false,
        }
    }

    fn from_frame(frame: Option<&CloseFrame>) -> Self {
        Self {
            code: frame.map(|frame| frame.code.into()),
            reason: frame
                .map(|frame| frame.reason.as_str().to_owned())
                .unwrap_or_default(),
            client_initiated: false,
        }
    }

    /// Whether the socket closed with code 1000.
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.code == Some(u16::from(CloseCode::Normal))
    }
}

/// Owns the single realtime socket: connection lifecycle, automatic
/// reconnection, inbound dispatch and outbound sends.
///
/// Cloning is cheap; clones share the same socket and registries. When the
/// last clone is dropped the socket is closed, any pending reconnect is
/// cancelled and all subscribers are released.
///
/// # Example
///
/// ```no_run
/// use storefront_client_sdk::ws::ConnectionManager;
/// use storefront_client_sdk::ws::config::Config;
///
/// # async fn example() -> storefront_client_sdk::Result<()> {
/// let connection = ConnectionManager::new("wss://api.example.com/ws", Config::default())?;
///
/// let shipped = connection.subscribe("order:shipped", |payload| {
///     println!("shipped: {payload}");
/// });
/// connection.connect("session-token");
///
/// // Later...
/// shipped.unsubscribe();
/// connection.disconnect();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    /// Base endpoint, without the token parameter
    endpoint: Url,
    config: Config,
    /// Watch channel sender for state changes
    state_tx: watch::Sender<ConnectionState>,
    control: Mutex<Control>,
    subscriptions: Arc<SubscriptionRegistry>,
    connect_handlers: Arc<LifecycleRegistry>,
    disconnect_handlers: Arc<LifecycleRegistry>,
    /// Broadcast sender for dispatched envelopes
    broadcast_tx: broadcast::Sender<Envelope>,
    next_session: AtomicU64,
}

/// Mutable connection bookkeeping, guarded by a single lock.
struct Control {
    token: Option<SecretString>,
    policy: ReconnectPolicy,
    session: Option<Session>,
    retry: Option<JoinHandle<()>>,
    last_close: Option<CloseInfo>,
}

/// Handle to the task owning one socket.
struct Session {
    id: u64,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Create a connection manager for `endpoint` (a `ws://` or `wss://` URL).
    ///
    /// Nothing is connected until [`connect`](Self::connect) is called.
    pub fn new(endpoint: &str, config: Config) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "realtime endpoint must use ws:// or wss://, got {}://",
                endpoint.scheme()
            )));
        }

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let policy = ReconnectPolicy::from(config.reconnect.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                endpoint,
                config,
                state_tx,
                control: Mutex::new(Control {
                    token: None,
                    policy,
                    session: None,
                    retry: None,
                    last_close: None,
                }),
                subscriptions: Arc::default(),
                connect_handlers: Arc::default(),
                disconnect_handlers: Arc::default(),
                broadcast_tx,
                next_session: AtomicU64::new(0),
            }),
        })
    }

    /// Open the socket, authenticating with `token`.
    ///
    /// A no-op while the socket is open or connecting. Failures are logged and
    /// handed to the reconnection policy; nothing is returned to the caller.
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, token: &str) {
        self.inner
            .connect(Some(SecretString::from(token.to_owned())));
    }

    /// Close the socket with a normal closure and suppress automatic reconnects.
    ///
    /// The cached token is kept; a later [`connect`](Self::connect) starts afresh.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Whether the socket is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Automatic reconnect attempts made since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.control().policy.attempts()
    }

    /// How the most recent socket closed, if one has.
    #[must_use]
    pub fn last_close(&self) -> Option<CloseInfo> {
        self.inner.control().last_close.clone()
    }

    /// Replace the cached token used by automatic reconnects.
    ///
    /// Does not affect an open socket.
    pub fn set_token(&self, token: &str) {
        self.inner.control().token = Some(SecretString::from(token.to_owned()));
    }

    /// Send `{type, payload, timestamp}` over the open socket.
    ///
    /// When the socket is not open the message is logged and dropped; there
    /// is no outbound queue. Returns whether the message was handed to the socket.
    #[expect(
        clippy::must_use_candidate,
        reason = "Fire-and-forget sends are the common case"
    )]
    pub fn send<P: Serialize + ?Sized>(&self, event_type: &str, payload: &P) -> bool {
        self.inner.send(event_type, payload)
    }

    /// Register `handler` for payloads of `event_type`.
    ///
    /// Subscribing to [`WILDCARD`] registers a handler that receives every
    /// envelope as raw JSON instead of just the payload.
    pub fn subscribe<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner
            .subscriptions
            .subscribe(event_type, Arc::new(handler))
    }

    /// Register `handler` for every envelope, regardless of type.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(WILDCARD, handler)
    }

    /// Register `handler` to run each time the socket opens.
    pub fn on_connect<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.connect_handlers.subscribe(Arc::new(handler))
    }

    /// Register `handler` to run each time an open socket closes.
    pub fn on_disconnect<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.disconnect_handlers.subscribe(Arc::new(handler))
    }

    /// Number of handlers registered under `event_type`.
    #[must_use]
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.inner.subscriptions.count(event_type)
    }

    /// Total number of event handlers, wildcard included.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.total()
    }

    /// Receive every dispatched envelope.
    ///
    /// Each call returns a new independent receiver. Receivers that fall more
    /// than the channel capacity behind observe a lag instead of blocking the socket.
    #[must_use]
    pub fn envelopes(&self) -> broadcast::Receiver<Envelope> {
        self.inner.broadcast_tx.subscribe()
    }

    /// The configured endpoint, without credentials.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn control(&self) -> MutexGuard<'_, Control> {
        // Every Control update is a single field assignment, so a poisoned lock is still consistent.
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect(self: &Arc<Self>, token: Option<SecretString>) {
        let Ok(runtime) = Handle::try_current() else {
            #[cfg(feature = "tracing")]
            tracing::warn!("Realtime connect called outside of a Tokio runtime, ignoring");
            return;
        };

        let mut control = self.control();

        let state = *self.state_tx.borrow();
        if state.is_connected() || state.is_connecting() {
            #[cfg(feature = "tracing")]
            tracing::debug!(?state, "Realtime channel already open or connecting");
            return;
        }

        if token.is_some() {
            control.token = token;
        }
        let Some(token) = control.token.clone() else {
            #[cfg(feature = "tracing")]
            tracing::warn!("No realtime token cached, not connecting");
            return;
        };

        // An explicit connect supersedes any pending automatic attempt.
        if let Some(retry) = control.retry.take() {
            retry.abort();
        }

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        control.session = Some(Session {
            id,
            outbound: outbound_tx,
            shutdown: shutdown.clone(),
        });
        self.state_tx.send_replace(ConnectionState::Connecting);

        #[cfg(feature = "tracing")]
        tracing::info!(
            endpoint = %self.endpoint,
            session = id,
            attempt = control.policy.attempts(),
            "Connecting to realtime channel"
        );
        drop(control);

        let url = self.url_with_token(&token);
        runtime.spawn(run_session(
            Arc::downgrade(self),
            id,
            url,
            outbound_rx,
            shutdown,
            self.config.close_timeout,
        ));
    }

    /// Entry point of the reconnect timer.
    fn reconnect(self: &Arc<Self>) {
        self.control().retry = None;
        self.connect(None);
    }

    fn disconnect(&self) {
        let mut control = self.control();
        control.policy.exhaust();
        if let Some(retry) = control.retry.take() {
            retry.abort();
        }
        let session = control.session.take();
        self.state_tx.send_replace(ConnectionState::Disconnected);
        drop(control);

        match session {
            Some(session) => {
                #[cfg(feature = "tracing")]
                tracing::info!(session = session.id, "Disconnecting realtime channel");
                session.shutdown.cancel();
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Realtime disconnect with no active socket");
            }
        }
    }

    fn send<P: Serialize + ?Sized>(&self, event_type: &str, payload: &P) -> bool {
        let control = self.control();
        let open = self.state_tx.borrow().is_connected();
        let Some(session) = control.session.as_ref().filter(|_| open) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(event_type, "Realtime channel not open, dropping outbound message");
            return false;
        };

        let text = match serde_json::to_string(&OutboundEnvelope::now(event_type, payload)) {
            Ok(text) => text,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(event_type, error = %e, "Unable to serialize outbound message");
                #[cfg(not(feature = "tracing"))]
                let _: &serde_json::Error = &e;
                return false;
            }
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(%text, "Sending realtime message");
        session.outbound.send(text).is_ok()
    }

    fn url_with_token(&self, token: &SecretString) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(&self.config.token_param, token.expose_secret());
        url
    }

    /// Promote session `id` to open. Returns `false` if it was superseded or
    /// cancelled while the handshake was in flight.
    fn on_open(&self, id: u64) -> bool {
        let mut control = self.control();
        let current = control
            .session
            .as_ref()
            .is_some_and(|session| session.id == id && !session.shutdown.is_cancelled());
        if !current {
            return false;
        }

        control.policy.reset();
        self.state_tx.send_replace(ConnectionState::Open {
            since: Instant::now(),
        });
        drop(control);

        #[cfg(feature = "tracing")]
        tracing::info!(session = id, "Realtime channel open");
        self.connect_handlers.notify("connect");
        true
    }

    fn dispatch(&self, text: &str) {
        match Envelope::parse(text) {
            Ok((envelope, raw)) => {
                let invoked = self.subscriptions.dispatch(&envelope, &raw);
                #[cfg(feature = "tracing")]
                tracing::trace!(event_type = %envelope.event_type, invoked, "Dispatched realtime message");
                #[cfg(not(feature = "tracing"))]
                let _: usize = invoked;
                // No stream receivers is not an error.
                _ = self.broadcast_tx.send(envelope);
            }
            Err(e) => {
                let error = Error::from(e);
                #[cfg(feature = "tracing")]
                tracing::warn!(%text, %error, "Dropping malformed realtime frame");
                #[cfg(not(feature = "tracing"))]
                let _: (&str, &Error) = (text, &error);
            }
        }
    }

    /// Socket lifecycle end: update state, apply the reconnection policy and
    /// notify disconnect subscribers.
    fn on_closed(self: &Arc<Self>, id: u64, close: CloseInfo, was_open: bool) {
        let mut control = self.control();

        if control.session.as_ref().is_some_and(|session| session.id == id) {
            control.session = None;
        } else if control.session.is_some() {
            // A newer session owns the state; only report the close itself.
            drop(control);

            #[cfg(feature = "tracing")]
            tracing::debug!(session = id, "Superseded realtime socket closed");
            #[cfg(not(feature = "tracing"))]
            let _: &CloseInfo = &close;

            if was_open {
                self.disconnect_handlers.notify("disconnect");
            }
            return;
        }

        self.state_tx.send_replace(ConnectionState::Disconnected);

        #[cfg(feature = "tracing")]
        tracing::info!(
            session = id,
            code = ?close.code,
            reason = %close.reason,
            client_initiated = close.client_initiated,
            "Realtime channel closed"
        );

        let client_initiated = close.client_initiated;
        control.last_close = Some(close);
        self.schedule_reconnect(&mut control, client_initiated);
        drop(control);

        if was_open {
            self.disconnect_handlers.notify("disconnect");
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, control: &mut Control, client_initiated: bool) {
        if control.token.is_none() {
            return;
        }

        let Some(delay) = control.policy.next_backoff() else {
            #[cfg(feature = "tracing")]
            if client_initiated {
                tracing::debug!("Not reconnecting after client disconnect");
            } else {
                tracing::warn!(
                    attempts = control.policy.attempts(),
                    "Realtime reconnection attempts exhausted, call connect to resume"
                );
            }
            #[cfg(not(feature = "tracing"))]
            let _: bool = client_initiated;
            return;
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            attempt = control.policy.attempts(),
            max_attempts = control.policy.max_attempts(),
            delay = ?delay,
            "Scheduling realtime reconnect"
        );

        let inner = Arc::downgrade(self);
        control.retry = Some(tokio::spawn(async move {
            sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                inner.reconnect();
            }
        }));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let control = self
            .control
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(retry) = control.retry.take() {
            retry.abort();
        }
        if let Some(session) = control.session.take() {
            session.shutdown.cancel();
        }
    }
}

fn client_close_frame() -> CloseFrame {
    CloseFrame {
        code: CloseCode::Normal,
        reason: CLIENT_DISCONNECT_REASON.into(),
    }
}

/// Task owning one socket from handshake to close.
async fn run_session(
    inner: Weak<Inner>,
    id: u64,
    url: Url,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    shutdown: CancellationToken,
    close_timeout: Duration,
) {
    let connected = tokio::select! {
        () = shutdown.cancelled() => return,
        result = connect_async(url.as_str()) => result,
    };

    let mut ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            let error = Error::with_source(Kind::WebSocket, WsError::Connection(e));
            #[cfg(feature = "tracing")]
            tracing::warn!(session = id, %error, "Unable to connect to realtime channel");
            if let Some(inner) = inner.upgrade() {
                inner.on_closed(id, CloseInfo::abnormal(error.to_string()), false);
            }
            return;
        }
    };

    if !inner.upgrade().is_some_and(|inner| inner.on_open(id)) {
        _ = ws_stream.close(Some(client_close_frame())).await;
        return;
    }

    let close = pump(&inner, ws_stream, outbound_rx, &shutdown, close_timeout).await;

    if let Some(inner) = inner.upgrade() {
        inner.on_closed(id, close, true);
    }
}

/// Move frames between the socket, the dispatcher and the outbound queue
/// until the socket closes or shutdown is requested.
async fn pump(
    inner: &Weak<Inner>,
    ws_stream: WsStream,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    shutdown: &CancellationToken,
    close_timeout: Duration,
) -> CloseInfo {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                _ = write.send(Message::Close(Some(client_close_frame()))).await;
                // Wait for the server's close reply so the closing handshake completes.
                _ = timeout(close_timeout, async {
                    while let Some(Ok(_)) = read.next().await {}
                })
                .await;
                return CloseInfo::client();
            }

            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Some(inner) = inner.upgrade() else {
                        return CloseInfo::client();
                    };
                    #[cfg(feature = "tracing")]
                    tracing::trace!(text = %text.as_str(), "Received realtime frame");
                    inner.dispatch(text.as_str());
                }
                Some(Ok(Message::Close(frame))) => {
                    let close = CloseInfo::from_frame(frame.as_ref());
                    // Polling once more flushes tungstenite's queued close reply.
                    _ = timeout(close_timeout, read.next()).await;
                    return close;
                }
                Some(Ok(Message::Binary(bytes))) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(len = bytes.len(), "Ignoring binary realtime frame");
                    #[cfg(not(feature = "tracing"))]
                    let _: &[u8] = &bytes;
                }
                Some(Ok(_)) => {
                    // Ping/pong replies are handled by tungstenite.
                }
                Some(Err(e)) => {
                    let error = Error::with_source(Kind::WebSocket, WsError::Connection(e));
                    return CloseInfo::abnormal(error.to_string());
                }
                None => return CloseInfo::abnormal("connection dropped without a close frame"),
            },

            Some(text) = outbound_rx.recv() => {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    let error = Error::with_source(Kind::WebSocket, WsError::Connection(e));
                    return CloseInfo::abnormal(error.to_string());
                }
            }
        }
    }
}
