//! Commands bind user actions to view-model logic and report whether they
//! can currently run.

mod async_command;
mod relay_command;

pub use async_command::AsyncCommand;
pub use relay_command::RelayCommand;

use std::sync::Arc;

pub use crate::listeners::ListenerId;

/// Callback invoked when a command's `can_execute` result may have changed
pub type CanExecuteChangedListener = dyn Fn() + Send + Sync;

/// Action a view can trigger
pub trait Command: Send + Sync {
    /// Whether the command can run in its current state
    fn can_execute(&self) -> bool;

    /// Run the command; a no-op while `can_execute` is false
    fn execute(&self);

    /// Tell listeners to re-query `can_execute`
    fn raise_can_execute_changed(&self);

    fn on_can_execute_changed(&self, listener: Arc<CanExecuteChangedListener>) -> ListenerId;

    fn remove_listener(&self, id: ListenerId) -> bool;
}
