// Domain layer - event and collaborator contracts
// No runtime, no dependencies on infrastructure

pub mod events;
pub mod shared;

// Re-exports for convenience
pub use events::{AsyncEventHandler, Event, EventHandler};
pub use shared::{DomainError, ViewKind, ViewModelId, WindowId, WindowKind};
