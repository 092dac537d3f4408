use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

use strato_domain::events::{EventSubscriber, SubscriptionSet};
use strato_domain::shared::{DomainError, ViewModelId};
use strato_infrastructure::EventAggregator;

use super::dependency_graph::DependencyGraph;
use super::property_store::{ensure_valid_name, PropertyStore};
use crate::commands::Command;
use crate::listeners::{ListenerId, Listeners};
use crate::navigation::NavigationContext;

/// Change notification raised by [`ViewModelBase::set`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyNotification {
    Changing(String),
    Changed(String),
}

pub type PropertyListener = dyn Fn(&PropertyNotification) + Send + Sync;

/// Implemented by every view-model; the base carries the shared plumbing.
pub trait ViewModel: Send + Sync + 'static {
    fn base(&self) -> &ViewModelBase;

    /// Hook for errors raised on behalf of this view-model
    fn handle_error(&self, error: &DomainError) {
        warn!(
            "Unhandled error in view-model {}: {}",
            self.base().id(),
            error.format_with_code()
        );
    }
}

/// State and plumbing shared by all view-models.
///
/// Subscriptions are made by [`ViewModelBase::activate`] and removed by
/// [`ViewModelBase::dispose`]. Dropping a base that was never disposed
/// hands its subscriptions to [`EventAggregator::release`].
pub struct ViewModelBase {
    id: ViewModelId,
    properties: Mutex<PropertyStore>,
    dependencies: DependencyGraph,
    listeners: Listeners<PropertyListener>,
    commands: Mutex<Vec<Arc<dyn Command>>>,
    event_aggregator: Option<Arc<EventAggregator>>,
    navigation: Option<Weak<NavigationContext>>,
    subscriptions: Mutex<SubscriptionSet>,
}

impl ViewModelBase {
    pub fn new() -> Self {
        Self {
            id: ViewModelId::new(),
            properties: Mutex::new(PropertyStore::new()),
            dependencies: DependencyGraph::new(),
            listeners: Listeners::new(),
            commands: Mutex::new(Vec::new()),
            event_aggregator: None,
            navigation: None,
            subscriptions: Mutex::new(SubscriptionSet::new()),
        }
    }

    pub fn with_event_aggregator(mut self, event_aggregator: Arc<EventAggregator>) -> Self {
        self.event_aggregator = Some(event_aggregator);
        self
    }

    /// The context is held weakly; it usually owns the current view-model.
    pub fn with_navigation(mut self, navigation: &Arc<NavigationContext>) -> Self {
        self.navigation = Some(Arc::downgrade(navigation));
        self
    }

    pub fn with_dependencies(mut self, dependencies: DependencyGraph) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn id(&self) -> &ViewModelId {
        &self.id
    }

    pub fn event_aggregator(&self) -> Option<&Arc<EventAggregator>> {
        self.event_aggregator.as_ref()
    }

    pub fn navigation(&self) -> Option<Arc<NavigationContext>> {
        self.navigation.as_ref().and_then(Weak::upgrade)
    }

    fn properties(&self) -> MutexGuard<'_, PropertyStore> {
        self.properties.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscriptions(&self) -> MutexGuard<'_, SubscriptionSet> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================================
    // Properties
    // ============================================================

    pub fn get<T>(&self, name: &str) -> Result<Option<T>, DomainError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.properties().get(name)
    }

    pub fn get_or_default<T>(&self, name: &str) -> Result<T, DomainError>
    where
        T: Clone + Default + Send + Sync + 'static,
    {
        self.properties().get_or_default(name)
    }

    /// Current value; an unset property is first [`set`](Self::set) to
    /// `init()`, with the usual notifications
    pub fn get_or_insert_with<T>(&self, name: &str, init: impl FnOnce() -> T) -> Result<T, DomainError>
    where
        T: Clone + Send + Sync + 'static,
    {
        if let Some(value) = self.get(name)? {
            return Ok(value);
        }

        let value = init();
        self.set(name, value.clone())?;
        Ok(value)
    }

    /// Store a value and notify: `Changing(name)`, `Changed(name)`, then
    /// `Changed` for each dependent property. Registered commands are asked
    /// to re-query `can_execute` afterwards.
    pub fn set<T>(&self, name: &str, value: T) -> Result<(), DomainError>
    where
        T: Send + Sync + 'static,
    {
        ensure_valid_name(name)?;

        self.notify(&PropertyNotification::Changing(name.to_string()));
        self.properties().set(name, value)?;
        self.notify(&PropertyNotification::Changed(name.to_string()));

        for dependent in self.dependencies.dependents_of(name) {
            self.notify(&PropertyNotification::Changed(dependent.to_string()));
        }

        self.raise_can_execute_changed();
        Ok(())
    }

    /// Raise `Changed(name)` for a property whose value lives elsewhere
    pub fn notify_property_changed(&self, name: &str) -> Result<(), DomainError> {
        ensure_valid_name(name)?;
        self.notify(&PropertyNotification::Changed(name.to_string()));
        self.raise_can_execute_changed();
        Ok(())
    }

    fn notify(&self, notification: &PropertyNotification) {
        for listener in self.listeners.snapshot() {
            listener(notification);
        }
    }

    pub fn on_property_notification(
        &self,
        listener: impl Fn(&PropertyNotification) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.add(Arc::new(listener))
    }

    pub fn remove_property_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // ============================================================
    // Commands
    // ============================================================

    /// Keep `command` informed of property changes
    pub fn register_command<C: Command + 'static>(&self, command: Arc<C>) -> Arc<C> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());
        command
    }

    fn raise_can_execute_changed(&self) {
        let commands = self
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for command in commands {
            command.raise_can_execute_changed();
        }
    }

    // ============================================================
    // Lifecycle
    // ============================================================

    /// Subscribe everything `T::event_handlers` lists.
    ///
    /// Returns how many subscriptions were made; zero without an aggregator.
    pub async fn activate<T>(view_model: &Arc<T>) -> usize
    where
        T: ViewModel + EventSubscriber,
    {
        let base = view_model.base();
        let Some(event_aggregator) = base.event_aggregator.clone() else {
            return 0;
        };

        let subscribed = event_aggregator
            .subscribe_all(T::event_handlers(view_model))
            .await;
        let count = subscribed.len();

        let mut subscriptions = base.subscriptions();
        for token in subscribed.tokens() {
            subscriptions.push(*token);
        }

        debug!("View-model {} activated with {} subscription(s)", base.id, count);
        count
    }

    /// Remove every subscription made by [`activate`](Self::activate)
    pub async fn dispose(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions());
        if subscriptions.is_empty() {
            return;
        }

        if let Some(event_aggregator) = &self.event_aggregator {
            let removed = event_aggregator.unsubscribe_all(&subscriptions).await;
            debug!("View-model {} disposed, {} subscription(s) removed", self.id, removed);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        !self.subscriptions().is_empty()
    }

    /// Ask the navigation context, if any, to show `VM`
    pub async fn navigate_to<VM: ViewModel>(&self) -> Result<(), DomainError> {
        match self.navigation() {
            Some(navigation) => navigation.navigate_to::<VM>().await.map(|_| ()),
            None => {
                debug!("View-model {} has no navigation context", self.id);
                Ok(())
            }
        }
    }
}

impl Default for ViewModelBase {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewModelBase {
    fn drop(&mut self) {
        let subscriptions = std::mem::take(
            self.subscriptions
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let Some(event_aggregator) = self.event_aggregator.take() else {
            return;
        };
        if subscriptions.is_empty() {
            return;
        }

        debug!(
            "View-model {} dropped without dispose, releasing {} subscription(s)",
            self.id,
            subscriptions.len()
        );
        event_aggregator.release(subscriptions);
    }
}
