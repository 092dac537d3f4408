use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use super::Event;
use crate::shared::DomainError;

/// Event handler trait for handling specific event types synchronously
pub trait EventHandler<E: Event>: Send + Sync {
    /// Handle an event on the publisher's thread
    fn handle(&self, event: &E) -> Result<(), DomainError>;
}

/// Event handler trait for handling specific event types asynchronously
#[async_trait]
pub trait AsyncEventHandler<E: Event>: Send + Sync {
    /// Handle an event
    async fn handle(&self, event: &E) -> Result<(), DomainError>;
}

/// Identity of a subscribed handler: the address of its allocation.
///
/// Two `Arc`s pointing at the same handler share a key; two separately
/// allocated handlers never do, even if they compare equal by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerKey(usize);

impl HandlerKey {
    pub fn of<H: ?Sized>(handler: &Arc<H>) -> Self {
        Self(Arc::as_ptr(handler) as *const () as usize)
    }

    pub fn of_weak<H>(handler: &Weak<H>) -> Self {
        Self(Weak::as_ptr(handler) as *const () as usize)
    }
}

/// Type-erased synchronous event handler for storage in collections
pub trait DynamicEventHandler: Send + Sync {
    /// Handle any event (type-erased)
    fn handle_dynamic(
        &self,
        event: &(dyn Any + Send + Sync),
        event_type_name: &'static str,
    ) -> Result<(), DomainError>;

    /// Get the type this handler handles
    fn event_type(&self) -> TypeId;

    /// Get the type name this handler handles
    fn event_type_name(&self) -> &'static str;

    /// Get the identity of the wrapped handler
    fn handler_key(&self) -> HandlerKey;
}

/// Type-erased asynchronous event handler for storage in collections
#[async_trait]
pub trait DynamicAsyncEventHandler: Send + Sync {
    /// Handle any event (type-erased)
    async fn handle_dynamic(
        &self,
        event: &(dyn Any + Send + Sync),
        event_type_name: &'static str,
    ) -> Result<(), DomainError>;

    /// Get the type this handler handles
    fn event_type(&self) -> TypeId;

    /// Get the type name this handler handles
    fn event_type_name(&self) -> &'static str;

    /// Get the identity of the wrapped handler
    fn handler_key(&self) -> HandlerKey;
}

/// Wrapper to convert typed EventHandler to DynamicEventHandler
pub struct TypedEventHandlerWrapper<E: Event, H: EventHandler<E> + ?Sized> {
    handler: Arc<H>,
    key: HandlerKey,
    _phantom: PhantomData<E>,
}

impl<E: Event, H: EventHandler<E> + ?Sized> TypedEventHandlerWrapper<E, H> {
    pub fn new(handler: Arc<H>) -> Self {
        let key = HandlerKey::of(&handler);
        Self::with_key(handler, key)
    }

    pub fn with_key(handler: Arc<H>, key: HandlerKey) -> Self {
        Self {
            handler,
            key,
            _phantom: PhantomData,
        }
    }
}

impl<E: Event, H: EventHandler<E> + ?Sized> DynamicEventHandler for TypedEventHandlerWrapper<E, H> {
    fn handle_dynamic(
        &self,
        event: &(dyn Any + Send + Sync),
        event_type_name: &'static str,
    ) -> Result<(), DomainError> {
        if let Some(typed_event) = event.downcast_ref::<E>() {
            EventHandler::handle(&*self.handler, typed_event)
        } else {
            Err(DomainError::EventTypeMismatch {
                expected: std::any::type_name::<E>(),
                actual: event_type_name,
            })
        }
    }

    fn event_type(&self) -> TypeId {
        TypeId::of::<E>()
    }

    fn event_type_name(&self) -> &'static str {
        std::any::type_name::<E>()
    }

    fn handler_key(&self) -> HandlerKey {
        self.key
    }
}

/// Wrapper to convert typed AsyncEventHandler to DynamicAsyncEventHandler
pub struct TypedAsyncEventHandlerWrapper<E: Event, H: AsyncEventHandler<E> + ?Sized> {
    handler: Arc<H>,
    key: HandlerKey,
    _phantom: PhantomData<E>,
}

impl<E: Event, H: AsyncEventHandler<E> + ?Sized> TypedAsyncEventHandlerWrapper<E, H> {
    pub fn new(handler: Arc<H>) -> Self {
        let key = HandlerKey::of(&handler);
        Self::with_key(handler, key)
    }

    pub fn with_key(handler: Arc<H>, key: HandlerKey) -> Self {
        Self {
            handler,
            key,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Event, H: AsyncEventHandler<E> + ?Sized + 'static> DynamicAsyncEventHandler
    for TypedAsyncEventHandlerWrapper<E, H>
{
    async fn handle_dynamic(
        &self,
        event: &(dyn Any + Send + Sync),
        event_type_name: &'static str,
    ) -> Result<(), DomainError> {
        if let Some(typed_event) = event.downcast_ref::<E>() {
            AsyncEventHandler::handle(&*self.handler, typed_event).await
        } else {
            Err(DomainError::EventTypeMismatch {
                expected: std::any::type_name::<E>(),
                actual: event_type_name,
            })
        }
    }

    fn event_type(&self) -> TypeId {
        TypeId::of::<E>()
    }

    fn event_type_name(&self) -> &'static str {
        std::any::type_name::<E>()
    }

    fn handler_key(&self) -> HandlerKey {
        self.key
    }
}

/// Handler bound to a target without keeping it alive.
///
/// Once the target is dropped, events are silently ignored.
pub struct WeakEventHandler<E, T> {
    target: Weak<T>,
    _phantom: PhantomData<fn(&E)>,
}

impl<E, T> WeakEventHandler<E, T> {
    pub fn new(target: &Arc<T>) -> Self {
        Self {
            target: Arc::downgrade(target),
            _phantom: PhantomData,
        }
    }

    pub fn key(&self) -> HandlerKey {
        HandlerKey::of_weak(&self.target)
    }
}

impl<E: Event, T: EventHandler<E>> EventHandler<E> for WeakEventHandler<E, T> {
    fn handle(&self, event: &E) -> Result<(), DomainError> {
        match self.target.upgrade() {
            Some(target) => EventHandler::handle(&*target, event),
            None => {
                log::debug!(
                    "Handler target for {} already dropped, skipping",
                    std::any::type_name::<E>()
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<E: Event, T: AsyncEventHandler<E> + 'static> AsyncEventHandler<E> for WeakEventHandler<E, T> {
    async fn handle(&self, event: &E) -> Result<(), DomainError> {
        match self.target.upgrade() {
            Some(target) => AsyncEventHandler::handle(&*target, event).await,
            None => {
                log::debug!(
                    "Async handler target for {} already dropped, skipping",
                    std::any::type_name::<E>()
                );
                Ok(())
            }
        }
    }
}

/// Synchronous handler backed by a closure
pub struct FnEventHandler<E, F> {
    f: F,
    _phantom: PhantomData<fn(&E)>,
}

impl<E, F> EventHandler<E> for FnEventHandler<E, F>
where
    E: Event,
    F: Fn(&E) -> Result<(), DomainError> + Send + Sync,
{
    fn handle(&self, event: &E) -> Result<(), DomainError> {
        (self.f)(event)
    }
}

/// Wrap a closure as a synchronous handler.
///
/// Every call allocates a new handler, so each result has its own identity.
pub fn handler_fn<E, F>(f: F) -> Arc<FnEventHandler<E, F>>
where
    E: Event,
    F: Fn(&E) -> Result<(), DomainError> + Send + Sync,
{
    Arc::new(FnEventHandler {
        f,
        _phantom: PhantomData,
    })
}

/// Asynchronous handler backed by a closure over an owned copy of the event
pub struct AsyncFnEventHandler<E, F> {
    f: F,
    _phantom: PhantomData<fn(E)>,
}

#[async_trait]
impl<E, F, Fut> AsyncEventHandler<E> for AsyncFnEventHandler<E, F>
where
    E: Event + Clone,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
{
    async fn handle(&self, event: &E) -> Result<(), DomainError> {
        (self.f)(event.clone()).await
    }
}

/// Wrap an async closure as an asynchronous handler.
pub fn async_handler_fn<E, F, Fut>(f: F) -> Arc<AsyncFnEventHandler<E, F>>
where
    E: Event + Clone,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
{
    Arc::new(AsyncFnEventHandler {
        f,
        _phantom: PhantomData,
    })
}
