mod registry;

pub mod event_aggregator;
pub mod shared;

pub use event_aggregator::EventAggregator;
pub use shared::shared_event_aggregator;
