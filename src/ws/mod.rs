//! Core realtime transport.
//!
//! This module owns the single WebSocket connection to the storefront server
//! and routes every inbound `{type, payload, timestamp}` envelope to the
//! subscribers registered for its type.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: connection lifecycle, reconnection, dispatch and sends
//! - [`ReconnectPolicy`](config::ReconnectPolicy): exact doubling backoff with an attempt ceiling
//! - [`Subscription`]: disposer handle for a handler registered by event type
//! - [`Envelope`]: the wire wrapper around every message
//!
//! Typed events and convenience streams live in [`crate::realtime`].

pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod registry;

pub use connection::{CloseInfo, ConnectionManager, ConnectionState};
pub use envelope::{Envelope, WILDCARD};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use registry::{SubscriberId, Subscription};
