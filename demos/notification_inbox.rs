//! Notification inbox walkthrough against the REST API.
//!
//! Lists unread notifications, marks the first one read and prints the
//! remaining unread count.
//!
//! ```sh
//! STOREFRONT_API=http://localhost:5000/api STOREFRONT_TOKEN=... \
//!     RUST_LOG=debug cargo run --example notification_inbox --features tracing
//! ```

use std::env;

use storefront_client_sdk::api::Client;
use storefront_client_sdk::api::client::DEFAULT_HOST;
use storefront_client_sdk::api::types::NotificationsRequest;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let host = env::var("STOREFRONT_API").unwrap_or_else(|_| DEFAULT_HOST.to_owned());
    let token = env::var("STOREFRONT_TOKEN")?;
    let client = Client::new(&host)?.with_token(&token);

    let request = NotificationsRequest::builder()
        .unread_only(true)
        .limit(20)
        .build();
    match client.notifications(&request).await {
        Ok(page) => {
            for notification in &page.notifications {
                info!(id = %notification.id, title = %notification.title, kind = ?notification.kind);
            }

            if let Some(first) = page.notifications.first() {
                let updated = client.mark_notification_read(&first.id).await?;
                info!(id = %updated.id, read = updated.read, "marked read");
            }
        }
        Err(e) => warn!(endpoint = "notifications", error = %e),
    }

    let unread = client.unread_notification_count().await?;
    info!(unread = unread.count);

    Ok(())
}
