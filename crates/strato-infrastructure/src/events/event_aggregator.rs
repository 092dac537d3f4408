use futures::future::join_all;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, trace, warn};

use strato_domain::events::{
    async_handler_fn, handler_fn, AsyncEventHandler, DispatchMode, DynamicAsyncEventHandler,
    DynamicEventHandler, Event, EventHandler, EventHandlerRegistrations, HandlerKey, Registration,
    SubscriptionId, SubscriptionSet, SubscriptionToken, TypedAsyncEventHandlerWrapper,
    TypedEventHandlerWrapper, WeakEventHandler,
};
use strato_domain::shared::DomainError;

use super::registry::{HandlerRegistry, Insertion};
use crate::config::DispatchConfig;

type SyncRegistry = HandlerRegistry<Arc<dyn DynamicEventHandler>>;
type AsyncRegistry = HandlerRegistry<Arc<dyn DynamicAsyncEventHandler>>;

/// In-process publish/subscribe bus for typed events.
///
/// Synchronous and asynchronous handlers live in two independent registries,
/// each behind its own lock, so a long asynchronous publish never blocks
/// synchronous subscribers and vice versa.
///
/// Synchronous [`publish`](Self::publish) holds its registry lock until the
/// last handler returns, so once [`unsubscribe`](Self::unsubscribe) returns
/// the removed handler is never invoked again. The flip side is that a
/// synchronous handler must not touch the synchronous registry of the
/// aggregator dispatching to it: a nested `publish` fails with
/// [`DomainError::InvalidArgument`], and any other synchronous registry call
/// panics instead of deadlocking. Use [`release`](Self::release) to drop
/// subscriptions from such a context.
///
/// [`publish_async`](Self::publish_async) runs its handlers on a snapshot,
/// with the lock released.
///
/// Share one instance per application session, usually as
/// `Arc<EventAggregator>`.
pub struct EventAggregator {
    config: DispatchConfig,
    next_id: AtomicU64,
    handlers: Mutex<SyncRegistry>,
    async_handlers: AsyncMutex<AsyncRegistry>,
}

impl EventAggregator {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(0),
            handlers: Mutex::new(HandlerRegistry::new()),
            async_handlers: AsyncMutex::new(HandlerRegistry::new()),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn next_subscription_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn address(&self) -> usize {
        self as *const Self as usize
    }

    // A handler panicking mid-dispatch poisons the lock; the registry itself
    // is never left half-updated, so keep serving it.
    fn sync_registry(&self) -> MutexGuard<'_, SyncRegistry> {
        if DispatchScope::is_active(self.address()) {
            panic!(
                "synchronous registry re-entered from one of its own handlers; \
                 use EventAggregator::release or publish_async instead"
            );
        }
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================================
    // Synchronous registry
    // ============================================================

    /// Subscribe a synchronous handler to events of exactly type `E`.
    ///
    /// Subscribing the same handler allocation again is ignored and returns
    /// the token of the existing subscription.
    pub fn subscribe<E, H>(&self, handler: Arc<H>) -> SubscriptionToken
    where
        E: Event,
        H: EventHandler<E> + ?Sized + 'static,
    {
        self.subscribe_dynamic(Arc::new(TypedEventHandlerWrapper::<E, H>::new(handler)))
    }

    /// Subscribe a synchronous closure to events of exactly type `E`
    pub fn subscribe_fn<E, F>(&self, f: F) -> SubscriptionToken
    where
        E: Event,
        F: Fn(&E) -> Result<(), DomainError> + Send + Sync + 'static,
    {
        self.subscribe::<E, _>(handler_fn(f))
    }

    /// Subscribe `target` without keeping it alive.
    ///
    /// The subscription shares the identity of `target`, so
    /// [`is_subscribed`](Self::is_subscribed) and
    /// [`unsubscribe_handler`](Self::unsubscribe_handler) work with it. Once
    /// `target` is dropped its handler silently does nothing.
    pub fn subscribe_weak<E, T>(&self, target: &Arc<T>) -> SubscriptionToken
    where
        E: Event,
        T: EventHandler<E> + 'static,
    {
        let weak = WeakEventHandler::<E, T>::new(target);
        let key = weak.key();
        self.subscribe_dynamic(Arc::new(TypedEventHandlerWrapper::<E, _>::with_key(
            Arc::new(weak),
            key,
        )))
    }

    /// Subscribe an already type-erased synchronous handler
    pub fn subscribe_dynamic(&self, handler: Arc<dyn DynamicEventHandler>) -> SubscriptionToken {
        let event_type = handler.event_type();
        let event_type_name = handler.event_type_name();
        let key = handler.handler_key();

        let insertion =
            self.sync_registry()
                .insert(event_type, key, self.next_subscription_id(), handler);
        log_insertion(insertion, event_type_name, DispatchMode::Sync);

        SubscriptionToken::new(insertion.id(), event_type, event_type_name, DispatchMode::Sync)
    }

    /// Remove the synchronous subscription behind `token`.
    ///
    /// Returns `false` if it was already gone or the token belongs to the
    /// asynchronous registry.
    pub fn unsubscribe(&self, token: &SubscriptionToken) -> bool {
        if token.mode() != DispatchMode::Sync {
            warn!(
                "Token {} for {} is asynchronous, use unsubscribe_async",
                token.id(),
                token.event_type_name()
            );
            return false;
        }

        let removed = self
            .sync_registry()
            .remove_by_id(token.event_type(), token.id());
        log_removal(removed, token.event_type_name(), DispatchMode::Sync);
        removed
    }

    /// Remove a synchronous handler by identity
    pub fn unsubscribe_handler<E, H>(&self, handler: &Arc<H>) -> bool
    where
        E: Event,
        H: EventHandler<E> + ?Sized,
    {
        let removed = self
            .sync_registry()
            .remove_by_key(TypeId::of::<E>(), HandlerKey::of(handler));
        log_removal(removed, std::any::type_name::<E>(), DispatchMode::Sync);
        removed
    }

    /// Whether this handler allocation is subscribed to `E`
    pub fn is_subscribed<E, H>(&self, handler: &Arc<H>) -> bool
    where
        E: Event,
        H: EventHandler<E> + ?Sized,
    {
        self.sync_registry()
            .contains_key(TypeId::of::<E>(), HandlerKey::of(handler))
    }

    /// Whether the synchronous subscription behind `token` is still registered
    pub fn is_active(&self, token: &SubscriptionToken) -> bool {
        token.mode() == DispatchMode::Sync
            && self
                .sync_registry()
                .contains_id(token.event_type(), token.id())
    }

    /// Number of synchronous handlers subscribed to `E`
    pub fn handler_count<E: Event>(&self) -> usize {
        self.sync_registry().count(TypeId::of::<E>())
    }

    /// Number of synchronous subscriptions across all event types
    pub fn subscription_count(&self) -> usize {
        self.sync_registry().len()
    }

    /// Invoke every synchronous handler for `E`, in subscription order.
    ///
    /// The registry stays locked until the last handler returns; concurrent
    /// subscribe and unsubscribe calls wait for the dispatch to finish. The
    /// first handler error stops delivery and is returned unchanged.
    /// Publishing with no subscribers is a successful no-op.
    pub fn publish<E: Event>(&self, event: E) -> Result<(), DomainError> {
        let event_type_name = event.event_type_name();

        if DispatchScope::is_active(self.address()) {
            warn!(
                "Refusing to publish {} from a synchronous handler of the same aggregator",
                event_type_name
            );
            return Err(DomainError::InvalidArgument(format!(
                "{} published from inside a synchronous handler of the same aggregator",
                event_type_name
            )));
        }

        let event_type = TypeId::of::<E>();
        let registry = self.sync_registry();
        let count = registry.count(event_type);

        if count == 0 {
            trace!("No handlers registered for event type: {}", event_type_name);
            return Ok(());
        }

        debug!("Publishing {} to {} handler(s)", event_type_name, count);

        let _dispatching = DispatchScope::enter(self.address());
        for handler in registry.handlers(event_type) {
            let started_at = Instant::now();
            let outcome = handler.handle_dynamic(&event, event_type_name);
            let elapsed = started_at.elapsed();

            if elapsed > self.config.slow_handler_threshold {
                warn!(
                    "Slow handler for {}: {}ms",
                    event_type_name,
                    elapsed.as_millis()
                );
            }

            if let Err(e) = outcome {
                error!("Handler failed to process event {}: {}", event_type_name, e);
                return Err(e);
            }
        }

        Ok(())
    }

    // ============================================================
    // Asynchronous registry
    // ============================================================

    /// Subscribe an asynchronous handler to events of exactly type `E`
    pub async fn subscribe_async<E, H>(&self, handler: Arc<H>) -> SubscriptionToken
    where
        E: Event,
        H: AsyncEventHandler<E> + ?Sized + 'static,
    {
        self.subscribe_async_dynamic(Arc::new(TypedAsyncEventHandlerWrapper::<E, H>::new(
            handler,
        )))
        .await
    }

    /// Subscribe an async closure; it receives its own clone of each event
    pub async fn subscribe_async_fn<E, F, Fut>(&self, f: F) -> SubscriptionToken
    where
        E: Event + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        self.subscribe_async::<E, _>(async_handler_fn(f)).await
    }

    /// Subscribe an already type-erased asynchronous handler
    pub async fn subscribe_async_dynamic(
        &self,
        handler: Arc<dyn DynamicAsyncEventHandler>,
    ) -> SubscriptionToken {
        let event_type = handler.event_type();
        let event_type_name = handler.event_type_name();
        let key = handler.handler_key();
        let id = self.next_subscription_id();

        let insertion = self
            .async_handlers
            .lock()
            .await
            .insert(event_type, key, id, handler);
        log_insertion(insertion, event_type_name, DispatchMode::Async);

        SubscriptionToken::new(insertion.id(), event_type, event_type_name, DispatchMode::Async)
    }

    /// Remove the asynchronous subscription behind `token`
    pub async fn unsubscribe_async(&self, token: &SubscriptionToken) -> bool {
        if token.mode() != DispatchMode::Async {
            warn!(
                "Token {} for {} is synchronous, use unsubscribe",
                token.id(),
                token.event_type_name()
            );
            return false;
        }

        let removed = self
            .async_handlers
            .lock()
            .await
            .remove_by_id(token.event_type(), token.id());
        log_removal(removed, token.event_type_name(), DispatchMode::Async);
        removed
    }

    /// Remove an asynchronous handler by identity
    pub async fn unsubscribe_async_handler<E, H>(&self, handler: &Arc<H>) -> bool
    where
        E: Event,
        H: AsyncEventHandler<E> + ?Sized,
    {
        let key = HandlerKey::of(handler);
        let removed = self
            .async_handlers
            .lock()
            .await
            .remove_by_key(TypeId::of::<E>(), key);
        log_removal(removed, std::any::type_name::<E>(), DispatchMode::Async);
        removed
    }

    /// Whether this handler allocation is subscribed to `E` asynchronously
    pub async fn is_subscribed_async<E, H>(&self, handler: &Arc<H>) -> bool
    where
        E: Event,
        H: AsyncEventHandler<E> + ?Sized,
    {
        let key = HandlerKey::of(handler);
        self.async_handlers
            .lock()
            .await
            .contains_key(TypeId::of::<E>(), key)
    }

    /// Whether the asynchronous subscription behind `token` is still registered
    pub async fn is_active_async(&self, token: &SubscriptionToken) -> bool {
        token.mode() == DispatchMode::Async
            && self
                .async_handlers
                .lock()
                .await
                .contains_id(token.event_type(), token.id())
    }

    /// Number of asynchronous handlers subscribed to `E`
    pub async fn async_handler_count<E: Event>(&self) -> usize {
        self.async_handlers.lock().await.count(TypeId::of::<E>())
    }

    /// Run every asynchronous handler for `E` concurrently and wait for all.
    ///
    /// The registry lock is released before any handler starts, so handlers
    /// may use the aggregator freely. A configured
    /// [`handler_timeout`](DispatchConfig::handler_timeout) needs a tokio
    /// runtime; on any other executor each handler fails with
    /// [`DomainError::Infrastructure`] without running. Every
    /// handler runs to completion even if a sibling fails; failures are then
    /// reported together as [`DomainError::HandlersFailed`].
    pub async fn publish_async<E: Event>(&self, event: E) -> Result<(), DomainError> {
        let event_type_name = event.event_type_name();
        let handlers = {
            let registry = self.async_handlers.lock().await;
            registry.snapshot(TypeId::of::<E>())
        };

        if handlers.is_empty() {
            trace!("No async handlers registered for event type: {}", event_type_name);
            return Ok(());
        }

        let total = handlers.len();
        debug!("Publishing {} to {} async handler(s)", event_type_name, total);

        let outcomes = join_all(
            handlers
                .iter()
                .map(|handler| self.run_async_handler(handler.as_ref(), &event, event_type_name)),
        )
        .await;

        let failures: Vec<DomainError> = outcomes.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            return Ok(());
        }

        for failure in &failures {
            error!(
                "Async handler failed to process event {}: {}",
                event_type_name, failure
            );
        }

        Err(DomainError::HandlersFailed {
            event_type: event_type_name,
            total,
            failures,
        })
    }

    async fn run_async_handler(
        &self,
        handler: &dyn DynamicAsyncEventHandler,
        event: &(dyn Any + Send + Sync),
        event_type_name: &'static str,
    ) -> Result<(), DomainError> {
        if self.config.handler_timeout.is_some() && tokio::runtime::Handle::try_current().is_err() {
            return Err(DomainError::Infrastructure(format!(
                "handler timeout for {} needs a tokio runtime",
                event_type_name
            )));
        }

        let dispatch = handler.handle_dynamic(event, event_type_name);

        match self.config.handler_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, dispatch).await {
                Ok(outcome) => outcome,
                Err(_) => Err(DomainError::HandlerTimedOut {
                    event_type: event_type_name,
                    timeout_ms: timeout.as_millis(),
                }),
            },
            None => dispatch.await,
        }
    }

    // ============================================================
    // Bulk registration
    // ============================================================

    /// Subscribe every entry of a registration list, in order
    pub async fn subscribe_all(&self, registrations: EventHandlerRegistrations) -> SubscriptionSet {
        let mut subscriptions = SubscriptionSet::new();

        for registration in registrations.into_entries() {
            let token = match registration {
                Registration::Sync(handler) => self.subscribe_dynamic(handler),
                Registration::Async(handler) => self.subscribe_async_dynamic(handler).await,
            };
            subscriptions.push(token);
        }

        debug!("Subscribed {} handler(s) in bulk", subscriptions.len());
        subscriptions
    }

    /// Remove every subscription in `subscriptions`; returns how many were live
    pub async fn unsubscribe_all(&self, subscriptions: &SubscriptionSet) -> usize {
        let mut removed = self.unsubscribe_all_sync(subscriptions);

        let mut registry = self.async_handlers.lock().await;
        for token in subscriptions.async_tokens() {
            if registry.remove_by_id(token.event_type(), token.id()) {
                removed += 1;
            }
        }

        debug!("Unsubscribed {} handler(s) in bulk", removed);
        removed
    }

    /// Remove only the synchronous half of `subscriptions`.
    ///
    /// Blocks while a synchronous publish is in flight.
    pub fn unsubscribe_all_sync(&self, subscriptions: &SubscriptionSet) -> usize {
        remove_sync(&mut self.sync_registry(), subscriptions)
    }

    /// Drop `subscriptions` from a context that can neither await nor wait
    /// for the synchronous registry, such as `Drop` or a running handler.
    ///
    /// The synchronous half is removed at once, waiting out a publish on
    /// another thread. Inside a synchronous handler of this aggregator it is
    /// deferred with the asynchronous half to a task on the current tokio
    /// runtime; without one it is left registered and a warning is logged.
    pub fn release(self: &Arc<Self>, mut subscriptions: SubscriptionSet) {
        if subscriptions.is_empty() {
            return;
        }

        let removed = match self.handlers.try_lock() {
            Ok(mut registry) => Some(remove_sync(&mut registry, &subscriptions)),
            Err(TryLockError::Poisoned(poisoned)) => {
                Some(remove_sync(&mut poisoned.into_inner(), &subscriptions))
            }
            Err(TryLockError::WouldBlock) if !DispatchScope::is_active(self.address()) => {
                Some(self.unsubscribe_all_sync(&subscriptions))
            }
            Err(TryLockError::WouldBlock) => None,
        };

        match removed {
            Some(removed) => {
                debug!("Released {} synchronous handler(s)", removed);
                subscriptions.retain_async();
                if subscriptions.is_empty() {
                    return;
                }
            }
            None => debug!(
                "Synchronous registry busy, deferring release of {} subscription(s)",
                subscriptions.len()
            ),
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let aggregator = Arc::clone(self);
                runtime.spawn(async move {
                    aggregator.unsubscribe_all(&subscriptions).await;
                });
            }
            Err(_) => warn!(
                "No tokio runtime to release {} subscription(s), leaving them registered",
                subscriptions.len()
            ),
        }
    }
}

impl Default for EventAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_sync(registry: &mut SyncRegistry, subscriptions: &SubscriptionSet) -> usize {
    subscriptions
        .sync_tokens()
        .filter(|token| registry.remove_by_id(token.event_type(), token.id()))
        .count()
}

thread_local! {
    // Aggregators currently dispatching synchronously on this thread
    static DISPATCHING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks an aggregator as dispatching on the current thread until dropped,
/// including on unwind
struct DispatchScope {
    aggregator: usize,
}

impl DispatchScope {
    fn enter(aggregator: usize) -> Self {
        DISPATCHING.with(|active| active.borrow_mut().push(aggregator));
        Self { aggregator }
    }

    fn is_active(aggregator: usize) -> bool {
        DISPATCHING.with(|active| active.borrow().contains(&aggregator))
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(index) = active.iter().rposition(|a| *a == self.aggregator) {
                active.remove(index);
            }
        });
    }
}

fn log_insertion(insertion: Insertion, event_type_name: &str, mode: DispatchMode) {
    match insertion {
        Insertion::Added(id) => {
            debug!(
                "Subscribed {:?} handler {} for event type: {}",
                mode, id, event_type_name
            );
        }
        Insertion::AlreadyPresent(id) => {
            debug!(
                "{:?} handler already subscribed as {} for event type: {}, ignoring",
                mode, id, event_type_name
            );
        }
    }
}

fn log_removal(removed: bool, event_type_name: &str, mode: DispatchMode) {
    if removed {
        debug!("Unsubscribed {:?} handler for event type: {}", mode, event_type_name);
    } else {
        debug!(
            "No {:?} subscription to remove for event type: {}",
            mode, event_type_name
        );
    }
}

#[cfg(test)]
#[path = "event_aggregator_test.rs"]
mod event_aggregator_test;
