pub mod dispatch;

pub use dispatch::DispatchConfig;
