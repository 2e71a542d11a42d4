#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Backoff;
use bon::Builder;

const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_CLOSE_TIMEOUT_DURATION: Duration = Duration::from_secs(5);
const DEFAULT_TOKEN_PARAM: &str = "token";

/// Configuration for the realtime connection manager.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// How long a client-initiated close waits for the server's close reply
    #[builder(default = DEFAULT_CLOSE_TIMEOUT_DURATION)]
    pub close_timeout: Duration,
    /// Query parameter carrying the session token on the connection URL
    #[builder(into, default = DEFAULT_TOKEN_PARAM.to_owned())]
    pub token_param: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectConfig {
    /// Maximum number of automatic reconnection attempts before giving up.
    #[builder(default = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    pub max_attempts: u32,
    /// Delay before the first reconnection attempt; doubles on each further attempt.
    #[builder(default = DEFAULT_BASE_DELAY_DURATION)]
    pub base_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<ReconnectConfig> for ReconnectPolicy {
    fn from(config: ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            attempts: 0,
        }
    }
}

/// Attempt counter and delay schedule for automatic reconnects.
///
/// The Nth attempt (1-indexed) waits exactly `base_delay * 2^(N-1)`; there is
/// no jitter. Once `max_attempts` have been handed out, [`Backoff::next_backoff`]
/// returns `None` until the policy is [reset](Backoff::reset).
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    base_delay: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Number of automatic attempts scheduled since the last successful open.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Pin the counter at the ceiling so no further attempts are handed out.
    pub fn exhaust(&mut self) {
        self.attempts = self.max_attempts;
    }

    /// Delay for the given 1-indexed attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(exponent))
    }
}

impl Backoff for ReconnectPolicy {
    fn reset(&mut self) {
        self.attempts = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        self.attempts += 1;
        Some(self.delay_for(self.attempts))
    }
}
