//! Runtime configuration for object workers.

use std::time::Duration;

/// Default inbox capacity per worker.
pub const DEFAULT_MAILBOX_SIZE: usize = 1024;

/// Default time a synchronous call waits for its reply.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings shared by every worker spawned from one [`ObjectClass`](crate::ObjectClass).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Bounded inbox capacity. Casts wait for room when the inbox is full.
    pub mailbox_size: usize,

    /// Upper bound on how long a synchronous call waits for its reply.
    pub call_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mailbox_size: DEFAULT_MAILBOX_SIZE,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads `HOLON_MAILBOX_SIZE` and `HOLON_CALL_TIMEOUT_MS`; missing or
    /// unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let mailbox_size = lookup("HOLON_MAILBOX_SIZE")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.mailbox_size);

        let call_timeout = lookup("HOLON_CALL_TIMEOUT_MS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.call_timeout);

        Self {
            mailbox_size,
            call_timeout,
        }
    }

    /// Override the call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Override the inbox capacity.
    #[must_use]
    pub fn with_mailbox_size(mut self, size: usize) -> Self {
        self.mailbox_size = size.max(1);
        self
    }
}
