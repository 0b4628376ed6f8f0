//! Framework configuration loaded from environment variables.

/// Orchestrator settings with sensible defaults.
///
/// Reads from environment variables:
/// - `EZ_CQRS_MAX_TRANSACTIONS`: default transaction bound per command (default: `0`)
/// - `EZ_CQRS_PUBLISH_ERROR_CAPACITY`: size of the publish-failure channel,
///   `0` disables it (default: `64`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkConfig {
    pub max_transactions: usize,
    pub publish_error_capacity: usize,
}

const MAX_TRANSACTIONS_VAR: &str = "EZ_CQRS_MAX_TRANSACTIONS";
const PUBLISH_ERROR_CAPACITY_VAR: &str = "EZ_CQRS_PUBLISH_ERROR_CAPACITY";

impl FrameworkConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_transactions: lookup(MAX_TRANSACTIONS_VAR)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_transactions),
            publish_error_capacity: lookup(PUBLISH_ERROR_CAPACITY_VAR)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.publish_error_capacity),
        }
    }

    /// Returns true when publish failures should be forwarded to a channel.
    pub fn reports_publish_errors(&self) -> bool {
        self.publish_error_capacity > 0
    }
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            max_transactions: 0,
            publish_error_capacity: 64,
        }
    }
}
