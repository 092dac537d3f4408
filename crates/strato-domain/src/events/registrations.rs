use std::any::TypeId;
use std::sync::Arc;

use super::event_handler::{
    AsyncEventHandler, DynamicAsyncEventHandler, DynamicEventHandler, EventHandler, HandlerKey,
    TypedAsyncEventHandlerWrapper, TypedEventHandlerWrapper, WeakEventHandler,
};
use super::Event;

/// One type-erased entry of a registration list
#[derive(Clone)]
pub enum Registration {
    Sync(Arc<dyn DynamicEventHandler>),
    Async(Arc<dyn DynamicAsyncEventHandler>),
}

impl Registration {
    pub fn event_type(&self) -> TypeId {
        match self {
            Registration::Sync(handler) => handler.event_type(),
            Registration::Async(handler) => handler.event_type(),
        }
    }

    pub fn event_type_name(&self) -> &'static str {
        match self {
            Registration::Sync(handler) => handler.event_type_name(),
            Registration::Async(handler) => handler.event_type_name(),
        }
    }

    pub fn handler_key(&self) -> HandlerKey {
        match self {
            Registration::Sync(handler) => handler.handler_key(),
            Registration::Async(handler) => handler.handler_key(),
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self {
            Registration::Sync(_) => "Sync",
            Registration::Async(_) => "Async",
        };
        f.debug_struct("Registration")
            .field("mode", &mode)
            .field("event_type", &self.event_type_name())
            .field("handler_key", &self.handler_key())
            .finish()
    }
}

/// Explicit list of (event type, handler) pairs a collaborator wants
/// subscribed as a unit, and removed again as a unit.
///
/// ```rust,ignore
/// impl EventSubscriber for MainViewModel {
///     fn event_handlers(this: &Arc<Self>) -> EventHandlerRegistrations {
///         EventHandlerRegistrations::new()
///             .handle::<CloseRequested, _>(this)
///             .handle_async::<DataLoaded, _>(this)
///     }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventHandlerRegistrations {
    entries: Vec<Registration>,
}

impl EventHandlerRegistrations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous handler, held strongly
    pub fn on<E, H>(mut self, handler: Arc<H>) -> Self
    where
        E: Event,
        H: EventHandler<E> + ?Sized + 'static,
    {
        self.entries.push(Registration::Sync(Arc::new(
            TypedEventHandlerWrapper::<E, H>::new(handler),
        )));
        self
    }

    /// Register an asynchronous handler, held strongly
    pub fn on_async<E, H>(mut self, handler: Arc<H>) -> Self
    where
        E: Event,
        H: AsyncEventHandler<E> + ?Sized + 'static,
    {
        self.entries.push(Registration::Async(Arc::new(
            TypedAsyncEventHandlerWrapper::<E, H>::new(handler),
        )));
        self
    }

    /// Register `target` as a synchronous handler without keeping it alive
    pub fn handle<E, T>(mut self, target: &Arc<T>) -> Self
    where
        E: Event,
        T: EventHandler<E> + 'static,
    {
        let weak = WeakEventHandler::<E, T>::new(target);
        let key = weak.key();
        self.entries.push(Registration::Sync(Arc::new(
            TypedEventHandlerWrapper::<E, _>::with_key(Arc::new(weak), key),
        )));
        self
    }

    /// Register `target` as an asynchronous handler without keeping it alive
    pub fn handle_async<E, T>(mut self, target: &Arc<T>) -> Self
    where
        E: Event,
        T: AsyncEventHandler<E> + 'static,
    {
        let weak = WeakEventHandler::<E, T>::new(target);
        let key = weak.key();
        self.entries.push(Registration::Async(Arc::new(
            TypedAsyncEventHandlerWrapper::<E, _>::with_key(Arc::new(weak), key),
        )));
        self
    }

    /// Append every entry of `other`, preserving order
    pub fn extend(mut self, other: EventHandlerRegistrations) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn entries(&self) -> &[Registration] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Registration> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Implemented by collaborators that subscribe their own handlers in bulk
/// when activated and remove them when torn down.
pub trait EventSubscriber: Send + Sync + 'static {
    /// Handlers to subscribe, usually bound weakly to `this`
    fn event_handlers(this: &Arc<Self>) -> EventHandlerRegistrations
    where
        Self: Sized;
}
