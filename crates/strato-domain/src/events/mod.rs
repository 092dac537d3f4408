use std::any::Any;

pub mod event_handler;
pub mod registrations;
pub mod subscription;
pub mod window_events;

pub use event_handler::{
    async_handler_fn, handler_fn, AsyncEventHandler, AsyncFnEventHandler,
    DynamicAsyncEventHandler, DynamicEventHandler, EventHandler, FnEventHandler, HandlerKey,
    TypedAsyncEventHandlerWrapper, TypedEventHandlerWrapper, WeakEventHandler,
};
pub use registrations::{EventHandlerRegistrations, EventSubscriber, Registration};
pub use subscription::{DispatchMode, SubscriptionId, SubscriptionSet, SubscriptionToken};
pub use window_events::{CloseRequested, OpenWindowEvent};

/// Base trait for all events
///
/// Events are dispatched by their exact Rust type. There is no delivery to
/// "parent" types: a handler registered for `Box<dyn Event>` only sees values
/// published as `Box<dyn Event>`.
pub trait Event: Send + Sync + Any {
    /// Get the type name used in logs and errors
    fn event_type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl Event for Box<dyn Event> {}

/// Implement [`Event`] for one or more concrete event types
#[macro_export]
macro_rules! impl_event {
    ($($type:ty),+ $(,)?) => {
        $(impl $crate::events::Event for $type {})+
    };
}
