use super::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strato_domain::events::{
    AsyncEventHandler, EventHandler, EventHandlerRegistrations, EventSubscriber,
};
use strato_domain::impl_event;
use strato_domain::shared::DomainError;
use strato_infrastructure::EventAggregator;

use crate::commands::{Command, RelayCommand};

#[derive(Debug, Clone)]
struct Saved;

#[derive(Debug, Clone)]
struct Synced;

impl_event!(Saved, Synced);

#[derive(Debug, Clone, Default, PartialEq)]
struct Contact {
    name: String,
}

struct ContactViewModel {
    base: ViewModelBase,
    saves: AtomicUsize,
    syncs: AtomicUsize,
}

impl ContactViewModel {
    fn new(aggregator: Option<Arc<EventAggregator>>) -> Arc<Self> {
        let mut base = ViewModelBase::new().with_dependencies(
            DependencyGraph::new()
                .depends_on("DisplayName", &["FirstName", "LastName"])
                .always("IsDirty"),
        );
        if let Some(aggregator) = aggregator {
            base = base.with_event_aggregator(aggregator);
        }
        Arc::new(Self {
            base,
            saves: AtomicUsize::new(0),
            syncs: AtomicUsize::new(0),
        })
    }
}

impl ViewModel for ContactViewModel {
    fn base(&self) -> &ViewModelBase {
        &self.base
    }
}

impl EventHandler<Saved> for ContactViewModel {
    fn handle(&self, _event: &Saved) -> Result<(), DomainError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl AsyncEventHandler<Synced> for ContactViewModel {
    async fn handle(&self, _event: &Synced) -> Result<(), DomainError> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl EventSubscriber for ContactViewModel {
    fn event_handlers(this: &Arc<Self>) -> EventHandlerRegistrations {
        EventHandlerRegistrations::new()
            .handle::<Saved, _>(this)
            .handle_async::<Synced, _>(this)
    }
}

fn record_notifications(view_model: &ContactViewModel) -> Arc<Mutex<Vec<PropertyNotification>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    view_model.base().on_property_notification(move |notification| {
        sink.lock().unwrap().push(notification.clone());
    });
    log
}

// ============================================================
// Properties
// ============================================================

#[test]
fn test_set_notifies_changing_changed_then_dependents() {
    let view_model = ContactViewModel::new(None);
    let log = record_notifications(&view_model);

    view_model.base().set("FirstName", "Ada".to_string()).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            PropertyNotification::Changing("FirstName".to_string()),
            PropertyNotification::Changed("FirstName".to_string()),
            PropertyNotification::Changed("DisplayName".to_string()),
            PropertyNotification::Changed("IsDirty".to_string()),
        ]
    );
}

#[test]
fn test_typed_properties_round_trip() {
    let view_model = ContactViewModel::new(None);
    let base = view_model.base();
    let id = strato_domain::shared::ViewModelId::new();
    let contact = Contact {
        name: "Grace".to_string(),
    };

    base.set("Id", id.clone()).unwrap();
    base.set("Age", 36_i32).unwrap();
    base.set("Contact", contact.clone()).unwrap();

    assert_eq!(base.get("Id").unwrap(), Some(id));
    assert_eq!(base.get_or_default::<i32>("Age").unwrap(), 36);
    assert_eq!(base.get("Contact").unwrap(), Some(contact));
    assert_eq!(base.get_or_default::<i32>("Missing").unwrap(), 0);
}

#[test]
fn test_get_or_insert_with_sets_once() {
    let view_model = ContactViewModel::new(None);
    let log = record_notifications(&view_model);
    let base = view_model.base();

    let first = base.get_or_insert_with("Tags", || vec!["new".to_string()]).unwrap();
    let second = base
        .get_or_insert_with("Tags", || vec!["ignored".to_string()])
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        log.lock()
            .unwrap()
            .iter()
            .filter(|n| **n == PropertyNotification::Changed("Tags".to_string()))
            .count(),
        1
    );
}

#[test]
fn test_empty_property_name_is_rejected() {
    let view_model = ContactViewModel::new(None);
    let log = record_notifications(&view_model);

    assert!(matches!(
        view_model.base().set("", 1_u8),
        Err(DomainError::InvalidArgument(_))
    ));
    assert!(view_model.base().notify_property_changed("").is_err());
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_removed_listener_is_not_notified() {
    let view_model = ContactViewModel::new(None);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = view_model.base().on_property_notification(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(view_model.base().remove_property_listener(id));
    view_model.base().set("Age", 1_i32).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_property_change_refreshes_registered_commands() {
    let view_model = ContactViewModel::new(None);
    let command = view_model
        .base()
        .register_command(Arc::new(RelayCommand::new(|| {})));
    let refreshed = Arc::new(AtomicUsize::new(0));
    let counter = refreshed.clone();
    command.on_can_execute_changed(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    view_model.base().set("FirstName", "Ada".to_string()).unwrap();
    view_model.base().notify_property_changed("Computed").unwrap();

    assert_eq!(refreshed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_default_error_hook_does_not_panic() {
    let view_model = ContactViewModel::new(None);
    view_model.handle_error(&DomainError::Command("failed".to_string()));
}

// ============================================================
// Lifecycle
// ============================================================

#[tokio::test]
async fn test_activate_subscribes_and_dispose_unsubscribes() {
    let aggregator = Arc::new(EventAggregator::new());
    let view_model = ContactViewModel::new(Some(aggregator.clone()));

    assert_eq!(ViewModelBase::activate(&view_model).await, 2);
    assert!(view_model.base().is_subscribed());

    aggregator.publish(Saved).unwrap();
    aggregator.publish_async(Synced).await.unwrap();
    assert_eq!(view_model.saves.load(Ordering::SeqCst), 1);
    assert_eq!(view_model.syncs.load(Ordering::SeqCst), 1);

    view_model.base().dispose().await;

    assert!(!view_model.base().is_subscribed());
    assert_eq!(aggregator.handler_count::<Saved>(), 0);
    assert_eq!(aggregator.async_handler_count::<Synced>().await, 0);
}

#[tokio::test]
async fn test_activate_without_aggregator_is_a_no_op() {
    let view_model = ContactViewModel::new(None);

    assert_eq!(ViewModelBase::activate(&view_model).await, 0);
    assert!(!view_model.base().is_subscribed());
}

#[tokio::test]
async fn test_dropping_undisposed_view_model_cleans_up() {
    let aggregator = Arc::new(EventAggregator::new());
    let view_model = ContactViewModel::new(Some(aggregator.clone()));
    ViewModelBase::activate(&view_model).await;

    drop(view_model);

    assert_eq!(aggregator.handler_count::<Saved>(), 0);
    for _ in 0..100 {
        if aggregator.async_handler_count::<Synced>().await == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(aggregator.async_handler_count::<Synced>().await, 0);
}

#[tokio::test]
async fn test_view_model_dropped_inside_a_handler_is_released_afterwards() {
    let aggregator = Arc::new(EventAggregator::new());
    let view_model = ContactViewModel::new(Some(aggregator.clone()));
    ViewModelBase::activate(&view_model).await;
    let saves = Arc::new(AtomicUsize::new(0));

    let owner = Arc::new(Mutex::new(Some(view_model)));
    let slot = owner.clone();
    let counter = saves.clone();
    aggregator.subscribe_fn(move |_: &Saved| {
        counter.fetch_add(1, Ordering::SeqCst);
        slot.lock().unwrap().take();
        Ok(())
    });

    aggregator.publish(Saved).unwrap();
    assert!(owner.lock().unwrap().is_none());

    for _ in 0..100 {
        if aggregator.handler_count::<Saved>() == 1
            && aggregator.async_handler_count::<Synced>().await == 0
        {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(aggregator.handler_count::<Saved>(), 1);
    assert_eq!(aggregator.async_handler_count::<Synced>().await, 0);

    aggregator.publish(Saved).unwrap();
    assert_eq!(saves.load(Ordering::SeqCst), 2);
}
