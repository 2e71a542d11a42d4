//! Live storefront notification listener.
//!
//! Connects to the realtime channel, logs order, payment and chat events as
//! they arrive and prints every new notification from the stream.
//!
//! Run with tracing enabled:
//! ```sh
//! STOREFRONT_WS=ws://localhost:5000/ws STOREFRONT_TOKEN=... \
//!     RUST_LOG=info cargo run --example notifications --features tracing
//! ```

use std::env;
use std::time::Duration;

use futures::StreamExt as _;
use storefront_client_sdk::realtime::{Client, EventType, client::DEFAULT_ENDPOINT};
use storefront_client_sdk::ws::config::Config;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let endpoint = env::var("STOREFRONT_WS").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_owned());
    let token = env::var("STOREFRONT_TOKEN")?;

    let client = Client::new(&endpoint, Config::default())?;

    let _connected = client.on_connect(|| info!("realtime channel open"));
    let _disconnected = client.on_disconnect(|| warn!("realtime channel closed"));

    let _shipped = client.on(EventType::OrderShipped, |event| {
        if let Some(order) = event.as_order() {
            info!(
                order = %order.order_id,
                carrier = ?order.carrier,
                tracking = ?order.tracking_number,
                "order shipped"
            );
        }
    });
    let _payments = client.on(EventType::PaymentFailed, |event| {
        if let Some(payment) = event.as_payment() {
            warn!(payment = %payment.payment_id, reason = ?payment.reason, "payment failed");
        }
    });
    let _everything = client.on_any(|event| debug!(event_type = event.event_type(), "event"));

    client.connect(&token);

    let mut notifications = Box::pin(client.notifications());
    let mut count = 0;
    while let Ok(Some(result)) = timeout(Duration::from_secs(60), notifications.next()).await {
        match result {
            Ok(notification) => {
                info!(
                    id = %notification.id,
                    title = %notification.title,
                    message = %notification.message,
                    "new notification"
                );
                count += 1;
                if count >= 10 {
                    break;
                }
            }
            Err(e) => debug!(error = %e, "skipping notification"),
        }
    }
    info!(received = count, state = ?client.connection_state());

    client.disconnect();
    Ok(())
}
