//! Storefront REST API client and types.
//!
//! **Feature flag:** `api` (required to use this module)
//!
//! The realtime channel pushes `notification:new` events as they happen; this
//! module covers the rest of the notification inbox: listing, counting,
//! marking read and deleting.
//!
//! ## Available Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/notifications` | GET | Page through notifications |
//! | `/notifications/unread-count` | GET | Count unread notifications |
//! | `/notifications/{id}/read` | PATCH | Mark one notification read |
//! | `/notifications/read-all` | PATCH | Mark every notification read |
//! | `/notifications/{id}` | DELETE | Delete a notification |
//!
//! # Example
//!
//! ```no_run
//! use storefront_client_sdk::api::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("https://shop.example.com/api")?.with_token("session-token");
//!
//! let unread = client.unread_notification_count().await?;
//! if unread.count > 0 {
//!     client.mark_all_notifications_read().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod types;

pub use client::Client;
