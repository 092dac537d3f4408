// Infrastructure layer - runtime implementations of the domain contracts

pub mod config;
pub mod events;
pub mod logging;

pub use config::DispatchConfig;
pub use events::{shared_event_aggregator, EventAggregator};
