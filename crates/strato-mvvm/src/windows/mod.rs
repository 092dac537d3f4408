//! Window bookkeeping driven by [`OpenWindowEvent`] and [`CloseRequested`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use strato_domain::events::{CloseRequested, EventHandler, OpenWindowEvent, SubscriptionSet};
use strato_domain::shared::{DomainError, ViewModelId, WindowId, WindowKind};
use strato_infrastructure::EventAggregator;

/// A top-level window, implemented by the UI toolkit in use
pub trait Window: Send + Sync {
    fn show(&self) -> Result<(), DomainError>;

    /// Show modally
    fn show_dialog(&self) -> Result<(), DomainError>;

    fn close(&self) -> Result<(), DomainError>;

    /// View-model bound to this window, if any
    fn view_model(&self) -> Option<ViewModelId> {
        None
    }
}

type WindowFactory = dyn Fn() -> Result<Arc<dyn Window>, DomainError> + Send + Sync;

/// A window opened through the [`WindowManager`]
#[derive(Clone)]
pub struct ManagedWindow {
    id: WindowId,
    kind: WindowKind,
    window: Arc<dyn Window>,
}

impl ManagedWindow {
    pub fn id(&self) -> &WindowId {
        &self.id
    }

    pub fn kind(&self) -> &WindowKind {
        &self.kind
    }

    pub fn window(&self) -> &Arc<dyn Window> {
        &self.window
    }
}

/// Opens windows by kind and keeps track of the ones that are open.
///
/// When built with an aggregator the manager reacts to [`OpenWindowEvent`]
/// and [`CloseRequested`], subscribed weakly so the aggregator never keeps
/// it alive.
pub struct WindowManager {
    factories: Mutex<HashMap<WindowKind, Arc<WindowFactory>>>,
    windows: Mutex<Vec<ManagedWindow>>,
    event_aggregator: Option<Arc<EventAggregator>>,
    subscriptions: Mutex<SubscriptionSet>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WindowManager {
    pub fn new(event_aggregator: Option<Arc<EventAggregator>>) -> Arc<Self> {
        let manager = Arc::new(Self {
            factories: Mutex::new(HashMap::new()),
            windows: Mutex::new(Vec::new()),
            event_aggregator,
            subscriptions: Mutex::new(SubscriptionSet::new()),
        });

        if let Some(event_aggregator) = &manager.event_aggregator {
            let mut subscriptions = lock(&manager.subscriptions);
            subscriptions.push(event_aggregator.subscribe_weak::<OpenWindowEvent, _>(&manager));
            subscriptions.push(event_aggregator.subscribe_weak::<CloseRequested, _>(&manager));
        }

        manager
    }

    /// Register how to build windows of `kind`; replaces any earlier factory
    pub fn register_window<F>(&self, kind: WindowKind, factory: F)
    where
        F: Fn() -> Result<Arc<dyn Window>, DomainError> + Send + Sync + 'static,
    {
        debug!("Registered window factory for {}", kind);
        lock(&self.factories).insert(kind, Arc::new(factory));
    }

    /// Build, record and show a window of `kind`.
    ///
    /// Factory and show failures come back as [`DomainError::Window`]; a
    /// window that failed to show is forgotten again.
    pub fn open_window(&self, kind: &WindowKind, show_as_dialog: bool) -> Result<WindowId, DomainError> {
        let factory = lock(&self.factories).get(kind).cloned().ok_or_else(|| {
            DomainError::InvalidArgument(format!("No window registered for kind \"{}\"", kind))
        })?;

        let window = factory().map_err(|e| window_error(format!("cannot build {}", kind), e))?;
        let id = WindowId::new();
        lock(&self.windows).push(ManagedWindow {
            id: id.clone(),
            kind: kind.clone(),
            window: window.clone(),
        });

        info!("Opening window {} ({}), dialog: {}", id, kind, show_as_dialog);
        let shown = if show_as_dialog {
            window.show_dialog()
        } else {
            window.show()
        };

        if let Err(e) = shown {
            warn!("Failed to show window {} ({}): {}", id, kind, e);
            lock(&self.windows).retain(|w| w.id != id);
            return Err(window_error(format!("cannot show {}", kind), e));
        }

        Ok(id)
    }

    /// Close and forget a window; `false` if it is not open
    pub fn close_window(&self, id: &WindowId) -> Result<bool, DomainError> {
        let removed = {
            let mut windows = lock(&self.windows);
            windows
                .iter()
                .position(|w| &w.id == id)
                .map(|index| windows.remove(index))
        };

        match removed {
            Some(managed) => {
                info!("Closing window {} ({})", managed.id, managed.kind);
                managed.window.close()?;
                Ok(true)
            }
            None => {
                debug!("Window {} is not open", id);
                Ok(false)
            }
        }
    }

    /// Close every window matching `predicate`, returning how many closed.
    ///
    /// Every matching window is attempted; the first close error is returned.
    fn close_where(&self, predicate: impl Fn(&ManagedWindow) -> bool) -> Result<usize, DomainError> {
        let closing: Vec<ManagedWindow> = {
            let mut windows = lock(&self.windows);
            let (closing, remaining): (Vec<_>, Vec<_>) =
                windows.drain(..).partition(|w| predicate(w));
            *windows = remaining;
            closing
        };

        let mut first_error = None;
        for managed in &closing {
            if let Err(e) = managed.window.close() {
                warn!("Failed to close window {}: {}", managed.id, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(closing.len()),
        }
    }

    pub fn close_all(&self) -> Result<usize, DomainError> {
        self.close_where(|_| true)
    }

    /// Snapshot of the open windows, oldest first
    pub fn windows(&self) -> Vec<ManagedWindow> {
        lock(&self.windows).clone()
    }

    pub fn registered_kinds(&self) -> Vec<WindowKind> {
        lock(&self.factories).keys().cloned().collect()
    }
}

fn window_error(context: String, error: DomainError) -> DomainError {
    match error {
        DomainError::Window(_) => error,
        other => DomainError::Window(format!("{}: {}", context, other)),
    }
}

impl EventHandler<OpenWindowEvent> for WindowManager {
    fn handle(&self, event: &OpenWindowEvent) -> Result<(), DomainError> {
        self.open_window(&event.window_kind, event.show_as_dialog)
            .map(|_| ())
    }
}

impl EventHandler<CloseRequested> for WindowManager {
    fn handle(&self, event: &CloseRequested) -> Result<(), DomainError> {
        let closed = match &event.source {
            None => self.close_all()?,
            Some(view_model) => {
                self.close_where(|w| w.window.view_model().as_ref() == Some(view_model))?
            }
        };
        debug!("Close request handled, {} window(s) closed", closed);
        Ok(())
    }
}

impl Drop for WindowManager {
    fn drop(&mut self) {
        let Some(event_aggregator) = self.event_aggregator.take() else {
            return;
        };
        let subscriptions = std::mem::take(
            self.subscriptions
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        event_aggregator.release(subscriptions);
    }
}

#[cfg(test)]
#[path = "window_manager_test.rs"]
mod window_manager_test;
