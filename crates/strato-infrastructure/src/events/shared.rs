use std::sync::{Arc, OnceLock};

use super::EventAggregator;
use crate::config::DispatchConfig;

static SHARED_AGGREGATOR: OnceLock<Arc<EventAggregator>> = OnceLock::new();

/// Process-wide aggregator, configured from the environment on first use.
///
/// Prefer passing an `Arc<EventAggregator>` explicitly; this exists for
/// composition roots that have nowhere else to keep one.
pub fn shared_event_aggregator() -> Arc<EventAggregator> {
    SHARED_AGGREGATOR
        .get_or_init(|| Arc::new(EventAggregator::with_config(DispatchConfig::from_env())))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_instance_is_reused() {
        let first = shared_event_aggregator();
        let second = shared_event_aggregator();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
