use std::any::TypeId;
use std::collections::HashMap;

use strato_domain::events::{HandlerKey, SubscriptionId};

struct Registration<H> {
    id: SubscriptionId,
    key: HandlerKey,
    handler: H,
}

/// Handlers keyed by exact event type, in subscription order.
///
/// At most one registration exists per (event type, handler identity).
pub(crate) struct HandlerRegistry<H> {
    entries: HashMap<TypeId, Vec<Registration<H>>>,
}

/// Outcome of [`HandlerRegistry::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Insertion {
    Added(SubscriptionId),
    AlreadyPresent(SubscriptionId),
}

impl Insertion {
    pub(crate) fn id(&self) -> SubscriptionId {
        match self {
            Insertion::Added(id) | Insertion::AlreadyPresent(id) => *id,
        }
    }
}

impl<H: Clone> HandlerRegistry<H> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Add a handler unless the same identity is already registered for the type
    pub(crate) fn insert(
        &mut self,
        event_type: TypeId,
        key: HandlerKey,
        id: SubscriptionId,
        handler: H,
    ) -> Insertion {
        let handlers = self.entries.entry(event_type).or_default();

        if let Some(existing) = handlers.iter().find(|r| r.key == key) {
            return Insertion::AlreadyPresent(existing.id);
        }

        handlers.push(Registration { id, key, handler });
        Insertion::Added(id)
    }

    pub(crate) fn remove_by_id(&mut self, event_type: TypeId, id: SubscriptionId) -> bool {
        self.remove_where(event_type, |r| r.id == id) > 0
    }

    pub(crate) fn remove_by_key(&mut self, event_type: TypeId, key: HandlerKey) -> bool {
        self.remove_where(event_type, |r| r.key == key) > 0
    }

    fn remove_where(
        &mut self,
        event_type: TypeId,
        predicate: impl Fn(&Registration<H>) -> bool,
    ) -> usize {
        let Some(handlers) = self.entries.get_mut(&event_type) else {
            return 0;
        };

        let before = handlers.len();
        handlers.retain(|r| !predicate(r));
        let removed = before - handlers.len();

        if handlers.is_empty() {
            self.entries.remove(&event_type);
        }

        removed
    }

    pub(crate) fn contains_id(&self, event_type: TypeId, id: SubscriptionId) -> bool {
        self.entries
            .get(&event_type)
            .is_some_and(|handlers| handlers.iter().any(|r| r.id == id))
    }

    pub(crate) fn contains_key(&self, event_type: TypeId, key: HandlerKey) -> bool {
        self.entries
            .get(&event_type)
            .is_some_and(|handlers| handlers.iter().any(|r| r.key == key))
    }

    /// Handlers for one event type, in subscription order
    pub(crate) fn handlers(&self, event_type: TypeId) -> impl Iterator<Item = &H> + '_ {
        self.entries
            .get(&event_type)
            .into_iter()
            .flat_map(|handlers| handlers.iter().map(|r| &r.handler))
    }

    /// Copy of the handlers for one event type, in subscription order
    pub(crate) fn snapshot(&self, event_type: TypeId) -> Vec<H> {
        self.entries
            .get(&event_type)
            .map(|handlers| handlers.iter().map(|r| r.handler.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, event_type: TypeId) -> usize {
        self.entries.get(&event_type).map_or(0, |h| h.len())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.values().map(|h| h.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Ping;
    struct Pong;

    fn key_of(value: &Arc<&'static str>) -> HandlerKey {
        HandlerKey::of(value)
    }

    #[test]
    fn test_insert_keeps_subscription_order() {
        let mut registry = HandlerRegistry::new();
        let first = Arc::new("first");
        let second = Arc::new("second");

        registry.insert(TypeId::of::<Ping>(), key_of(&first), SubscriptionId::new(1), "first");
        registry.insert(TypeId::of::<Ping>(), key_of(&second), SubscriptionId::new(2), "second");

        assert_eq!(registry.snapshot(TypeId::of::<Ping>()), vec!["first", "second"]);
        assert_eq!(
            registry.handlers(TypeId::of::<Ping>()).copied().collect::<Vec<_>>(),
            vec!["first", "second"]
        );
        assert_eq!(registry.count(TypeId::of::<Ping>()), 2);
    }

    #[test]
    fn test_duplicate_identity_is_ignored() {
        let mut registry = HandlerRegistry::new();
        let handler = Arc::new("handler");

        let first = registry.insert(TypeId::of::<Ping>(), key_of(&handler), SubscriptionId::new(1), "a");
        let again = registry.insert(TypeId::of::<Ping>(), key_of(&handler), SubscriptionId::new(2), "b");

        assert_eq!(first, Insertion::Added(SubscriptionId::new(1)));
        assert_eq!(again, Insertion::AlreadyPresent(SubscriptionId::new(1)));
        assert_eq!(registry.snapshot(TypeId::of::<Ping>()), vec!["a"]);
    }

    #[test]
    fn test_same_identity_may_handle_several_types() {
        let mut registry = HandlerRegistry::new();
        let handler = Arc::new("handler");

        registry.insert(TypeId::of::<Ping>(), key_of(&handler), SubscriptionId::new(1), "ping");
        registry.insert(TypeId::of::<Pong>(), key_of(&handler), SubscriptionId::new(2), "pong");

        assert_eq!(registry.len(), 2);
        assert!(registry.contains_key(TypeId::of::<Pong>(), key_of(&handler)));
    }

    #[test]
    fn test_remove_by_id_and_key() {
        let mut registry = HandlerRegistry::new();
        let a = Arc::new("a");
        let b = Arc::new("b");
        registry.insert(TypeId::of::<Ping>(), key_of(&a), SubscriptionId::new(1), "a");
        registry.insert(TypeId::of::<Ping>(), key_of(&b), SubscriptionId::new(2), "b");

        assert!(registry.remove_by_id(TypeId::of::<Ping>(), SubscriptionId::new(1)));
        assert!(!registry.contains_id(TypeId::of::<Ping>(), SubscriptionId::new(1)));
        assert!(registry.remove_by_key(TypeId::of::<Ping>(), key_of(&b)));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_removing_unknown_entries_is_a_no_op() {
        let mut registry: HandlerRegistry<&str> = HandlerRegistry::new();
        let a = Arc::new("a");

        assert!(!registry.remove_by_id(TypeId::of::<Ping>(), SubscriptionId::new(7)));
        assert!(!registry.remove_by_key(TypeId::of::<Ping>(), key_of(&a)));
        assert!(registry.snapshot(TypeId::of::<Ping>()).is_empty());
        assert_eq!(registry.handlers(TypeId::of::<Ping>()).count(), 0);
    }
}
