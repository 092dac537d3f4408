use std::sync::Arc;
use tracing::debug;

use super::{CanExecuteChangedListener, Command, ListenerId};
use crate::listeners::Listeners;

type Action = dyn Fn() + Send + Sync;
type Predicate = dyn Fn() -> bool + Send + Sync;

/// Command relaying to a synchronous closure
pub struct RelayCommand {
    action: Box<Action>,
    predicate: Option<Box<Predicate>>,
    listeners: Listeners<CanExecuteChangedListener>,
}

impl RelayCommand {
    pub fn new(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            action: Box::new(action),
            predicate: None,
            listeners: Listeners::new(),
        }
    }

    /// Builder pattern: only allow execution while `predicate` holds
    pub fn with_can_execute(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }
}

impl Command for RelayCommand {
    fn can_execute(&self) -> bool {
        self.predicate.as_ref().map_or(true, |predicate| predicate())
    }

    fn execute(&self) {
        if self.can_execute() {
            (self.action)();
        } else {
            debug!("RelayCommand cannot execute, skipping");
        }
    }

    fn raise_can_execute_changed(&self) {
        for listener in self.listeners.snapshot() {
            listener();
        }
    }

    fn on_can_execute_changed(&self, listener: Arc<CanExecuteChangedListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}
