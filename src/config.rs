//! Service configuration.
//!
//! Values are read from environment variables, with defaults suitable for
//! development and tests.

use std::time::Duration;

/// Default number of attempts for code allocation.
pub const DEFAULT_CODE_ATTEMPTS: u32 = 5;

/// Default number of join attempts allowed per user and window.
pub const DEFAULT_JOIN_ATTEMPT_LIMIT: u32 = 10;

/// Default length of the join attempt window.
pub const DEFAULT_JOIN_ATTEMPT_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Attempts for both the join code pre-check loop and the space insert loop.
    ///
    /// Never lower than 1.
    pub code_attempts: u32,

    /// Join attempts allowed per user within `join_attempt_window`.
    pub join_attempt_limit: u32,

    pub join_attempt_window: Duration,

    /// Filter directive used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            code_attempts: DEFAULT_CODE_ATTEMPTS,
            join_attempt_limit: DEFAULT_JOIN_ATTEMPT_LIMIT,
            join_attempt_window: DEFAULT_JOIN_ATTEMPT_WINDOW,
            log_filter: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Create a `ServiceConfig` from environment variables.
    ///
    /// Environment variables:
    /// - `GIFTSPACE_CODE_ATTEMPTS`: code allocation attempts (default: 5)
    /// - `GIFTSPACE_JOIN_ATTEMPT_LIMIT`: join attempts per window (default: 10)
    /// - `GIFTSPACE_JOIN_ATTEMPT_WINDOW_SECS`: join window length (default: 900)
    /// - `GIFTSPACE_LOG_FILTER`: fallback log filter (default: "info")
    ///
    /// Unparseable values are ignored in favour of the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let code_attempts = lookup("GIFTSPACE_CODE_ATTEMPTS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(defaults.code_attempts)
            .max(1);

        let join_attempt_limit = lookup("GIFTSPACE_JOIN_ATTEMPT_LIMIT")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(defaults.join_attempt_limit);

        let join_attempt_window = lookup("GIFTSPACE_JOIN_ATTEMPT_WINDOW_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.join_attempt_window);

        let log_filter = lookup("GIFTSPACE_LOG_FILTER")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.log_filter);

        Self {
            code_attempts,
            join_attempt_limit,
            join_attempt_window,
            log_filter,
        }
    }
}
