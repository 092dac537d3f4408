use std::time::Duration;

/// Environment variable overriding [`DispatchConfig::handler_timeout`]
pub const HANDLER_TIMEOUT_ENV: &str = "STRATO_HANDLER_TIMEOUT_MS";

/// Environment variable overriding [`DispatchConfig::slow_handler_threshold`]
pub const SLOW_HANDLER_ENV: &str = "STRATO_SLOW_HANDLER_MS";

/// Configuration for event dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound for each asynchronous handler (default: none).
    ///
    /// Enforced with `tokio::time`, so `publish_async` must then be awaited
    /// inside a tokio runtime; elsewhere every handler fails with
    /// `DomainError::Infrastructure` instead of running.
    pub handler_timeout: Option<Duration>,

    /// Synchronous handlers running longer than this are logged (default: 250ms)
    pub slow_handler_threshold: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout: None,
            slow_handler_threshold: Duration::from_millis(250),
        }
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set the async handler timeout
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    /// Builder pattern: set the slow handler threshold
    pub fn with_slow_handler_threshold(mut self, threshold: Duration) -> Self {
        self.slow_handler_threshold = threshold;
        self
    }

    /// Defaults overridden by `STRATO_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(timeout) = read_millis(&lookup, HANDLER_TIMEOUT_ENV) {
            config.handler_timeout = (!timeout.is_zero()).then_some(timeout);
        }
        if let Some(threshold) = read_millis(&lookup, SLOW_HANDLER_ENV) {
            config.slow_handler_threshold = threshold;
        }

        config
    }
}

fn read_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(millis) => Some(Duration::from_millis(millis)),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}
