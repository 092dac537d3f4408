use std::any::TypeId;
use std::fmt;

use super::Event;

/// Unique id of one subscribe call, scoped to the aggregator that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which registry a subscription lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchMode {
    Sync,
    Async,
}

/// Opaque handle returned by every subscribe call.
///
/// Removing a subscription through its token never depends on comparing
/// closures, so it works for handlers the caller no longer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    id: SubscriptionId,
    event_type: TypeId,
    event_type_name: &'static str,
    mode: DispatchMode,
}

impl SubscriptionToken {
    pub fn new(
        id: SubscriptionId,
        event_type: TypeId,
        event_type_name: &'static str,
        mode: DispatchMode,
    ) -> Self {
        Self {
            id,
            event_type,
            event_type_name,
            mode,
        }
    }

    pub fn for_event<E: Event>(id: SubscriptionId, mode: DispatchMode) -> Self {
        Self::new(id, TypeId::of::<E>(), std::any::type_name::<E>(), mode)
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn event_type(&self) -> TypeId {
        self.event_type
    }

    pub fn event_type_name(&self) -> &'static str {
        self.event_type_name
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }
}

/// Tokens produced by subscribing a whole registration list
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSet {
    tokens: Vec<SubscriptionToken>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: SubscriptionToken) {
        if !self.tokens.contains(&token) {
            self.tokens.push(token);
        }
    }

    pub fn tokens(&self) -> &[SubscriptionToken] {
        &self.tokens
    }

    pub fn sync_tokens(&self) -> impl Iterator<Item = &SubscriptionToken> {
        self.tokens
            .iter()
            .filter(|token| token.mode == DispatchMode::Sync)
    }

    pub fn async_tokens(&self) -> impl Iterator<Item = &SubscriptionToken> {
        self.tokens
            .iter()
            .filter(|token| token.mode == DispatchMode::Async)
    }

    /// Drop every synchronous token, keeping the asynchronous ones
    pub fn retain_async(&mut self) {
        self.tokens.retain(|token| token.mode == DispatchMode::Async);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    crate::impl_event!(Ping);

    #[test]
    fn test_set_ignores_duplicate_tokens_and_splits_by_mode() {
        let sync = SubscriptionToken::for_event::<Ping>(SubscriptionId::new(1), DispatchMode::Sync);
        let asynchronous =
            SubscriptionToken::for_event::<Ping>(SubscriptionId::new(2), DispatchMode::Async);

        let mut set = SubscriptionSet::new();
        set.push(sync);
        set.push(sync);
        set.push(asynchronous);

        assert_eq!(set.len(), 2);
        assert_eq!(set.sync_tokens().count(), 1);
        assert_eq!(set.async_tokens().count(), 1);

        set.retain_async();
        assert_eq!(set.tokens(), &[asynchronous]);
    }

    #[test]
    fn test_token_describes_event_type() {
        let token = SubscriptionToken::for_event::<Ping>(SubscriptionId::new(9), DispatchMode::Sync);

        assert_eq!(token.event_type(), TypeId::of::<Ping>());
        assert!(token.event_type_name().ends_with("Ping"));
        assert_eq!(token.id().to_string(), "#9");
    }
}
