#![expect(
    clippy::module_name_repetitions,
    reason = "Re-exported names intentionally match their modules for API clarity"
)]

//! Typed client for the storefront realtime notification channel.
//!
//! **Feature flag:** `realtime` (required to use this module)
//!
//! The server pushes `{type, payload, timestamp}` envelopes over a single
//! WebSocket. This module maps the known event types onto typed payloads and
//! exposes them as callbacks or streams.
//!
//! # Event types
//!
//! - **Orders**: `order:created`, `order:updated`, `order:shipped`, `order:delivered`
//! - **Payments**: `payment:success`, `payment:failed`, `payment:pending`
//! - **Notifications**: `notification:new`
//! - **Chat**: `chat:message`, `chat:typing`
//! - **Sellers**: `product:sold`, `review:added`, `payout:processed`
//!
//! # Example
//!
//! ```rust, no_run
//! use storefront_client_sdk::realtime::Client;
//! use futures::StreamExt as _;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::default();
//!     client.connect("session-token");
//!
//!     let mut orders = Box::pin(client.orders());
//!     while let Some(update) = orders.next().await {
//!         let (event_type, order) = update?;
//!         println!("{event_type}: {}", order.order_id);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod types;

pub use client::Client;
pub use types::request::{ChatMessageRequest, TypingRequest};
pub use types::response::{Event, EventType};
