//! Re-exported types from external crates for convenience.
//!
//! These types are commonly used in this SDK and are re-exported here
//! so users don't need to add these dependencies to their `Cargo.toml`.

/// Date and time types for event timestamps.
pub use chrono::{DateTime, Utc};
/// Arbitrary precision decimal type for prices, totals and payout amounts.
pub use rust_decimal::Decimal;
/// Macro for creating [`Decimal`] literals at compile time.
///
/// # Example
/// ```
/// use storefront_client_sdk::types::dec;
/// let total = dec!(49.99);
/// ```
pub use rust_decimal_macros::dec;
/// Wrapper keeping session tokens out of `Debug` output and logs.
pub use secrecy::SecretString;
/// JSON value type used for opaque event payloads.
pub use serde_json::Value;
