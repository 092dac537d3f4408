mod dependency_graph;
mod property_store;
mod view_model_base;

pub use dependency_graph::DependencyGraph;
pub use property_store::PropertyStore;
pub use view_model_base::{PropertyListener, PropertyNotification, ViewModel, ViewModelBase};

#[cfg(test)]
#[path = "view_model_test.rs"]
mod view_model_test;
