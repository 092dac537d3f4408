use super::*;
use mockall::mock;

mock! {
    pub TestWindow {}

    impl Window for TestWindow {
        fn show(&self) -> Result<(), DomainError>;
        fn show_dialog(&self) -> Result<(), DomainError>;
        fn close(&self) -> Result<(), DomainError>;
        fn view_model(&self) -> Option<ViewModelId>;
    }
}

fn mock_window(dialog: bool, view_model: Option<ViewModelId>, closes: usize) -> MockTestWindow {
    let mut window = MockTestWindow::new();
    if dialog {
        window.expect_show_dialog().times(1).returning(|| Ok(()));
        window.expect_show().never();
    } else {
        window.expect_show().times(1).returning(|| Ok(()));
        window.expect_show_dialog().never();
    }
    window.expect_close().times(closes).returning(|| Ok(()));
    window
        .expect_view_model()
        .returning(move || view_model.clone());
    window
}

fn kind(name: &str) -> WindowKind {
    WindowKind::new(name).unwrap()
}

#[test]
fn test_open_window_shows_and_records_it() {
    let manager = WindowManager::new(None);
    manager.register_window(kind("main"), || {
        Ok(Arc::new(mock_window(false, None, 0)) as Arc<dyn Window>)
    });

    let id = manager.open_window(&kind("main"), false).unwrap();

    let windows = manager.windows();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].id(), &id);
    assert_eq!(windows[0].kind().as_str(), "main");
}

#[test]
fn test_unknown_kind_is_rejected() {
    let manager = WindowManager::new(None);

    let result = manager.open_window(&kind("missing"), false);

    assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    assert!(manager.windows().is_empty());
}

#[test]
fn test_factory_errors_propagate() {
    let manager = WindowManager::new(None);
    manager.register_window(kind("broken"), || {
        Err(DomainError::Window("no display".to_string()))
    });

    let result = manager.open_window(&kind("broken"), true);

    assert!(matches!(result, Err(DomainError::Window(_))));
    assert!(manager.windows().is_empty());
}

#[test]
fn test_open_window_event_opens_dialog() {
    let aggregator = Arc::new(EventAggregator::new());
    let manager = WindowManager::new(Some(aggregator.clone()));
    manager.register_window(kind("settings"), || {
        Ok(Arc::new(mock_window(true, None, 0)) as Arc<dyn Window>)
    });

    aggregator
        .publish(OpenWindowEvent::dialog(kind("settings")))
        .unwrap();

    assert_eq!(manager.windows().len(), 1);
    assert_eq!(Arc::strong_count(&manager), 1);
}

#[test]
fn test_close_window_closes_once() {
    let manager = WindowManager::new(None);
    manager.register_window(kind("main"), || {
        Ok(Arc::new(mock_window(false, None, 1)) as Arc<dyn Window>)
    });
    let id = manager.open_window(&kind("main"), false).unwrap();

    assert!(manager.close_window(&id).unwrap());
    assert!(!manager.close_window(&id).unwrap());
    assert!(manager.windows().is_empty());
}

#[test]
fn test_close_requested_targets_view_model_windows() {
    let aggregator = Arc::new(EventAggregator::new());
    let manager = WindowManager::new(Some(aggregator.clone()));
    let owner = ViewModelId::new();

    let bound = owner.clone();
    manager.register_window(kind("editor"), move || {
        Ok(Arc::new(mock_window(false, Some(bound.clone()), 1)) as Arc<dyn Window>)
    });
    manager.register_window(kind("palette"), || {
        Ok(Arc::new(mock_window(false, None, 1)) as Arc<dyn Window>)
    });
    manager.open_window(&kind("editor"), false).unwrap();
    manager.open_window(&kind("palette"), false).unwrap();

    aggregator
        .publish(CloseRequested::from_view_model(owner))
        .unwrap();
    let remaining = manager.windows();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].kind().as_str(), "palette");

    aggregator.publish(CloseRequested::all()).unwrap();
    assert!(manager.windows().is_empty());
}

#[test]
fn test_dropping_manager_unsubscribes() {
    let aggregator = Arc::new(EventAggregator::new());
    let manager = WindowManager::new(Some(aggregator.clone()));
    assert!(aggregator.is_subscribed::<OpenWindowEvent, _>(&manager));
    assert_eq!(aggregator.subscription_count(), 2);

    drop(manager);

    assert_eq!(aggregator.subscription_count(), 0);
    assert!(aggregator.publish(OpenWindowEvent::new(kind("main"))).is_ok());
}

#[test]
fn test_factory_errors_become_window_errors() {
    let manager = WindowManager::new(None);
    manager.register_window(kind("gpu"), || {
        Err(DomainError::InvalidArgument("no adapter".to_string()))
    });

    let result = manager.open_window(&kind("gpu"), false);

    assert!(matches!(
        result,
        Err(DomainError::Window(ref message)) if message.contains("no adapter")
    ));
}

#[test]
fn test_window_that_fails_to_show_is_forgotten() {
    let manager = WindowManager::new(None);
    manager.register_window(kind("main"), || {
        let mut window = MockTestWindow::new();
        window
            .expect_show()
            .times(1)
            .returning(|| Err(DomainError::InvalidArgument("minimised".to_string())));
        window.expect_close().never();
        Ok(Arc::new(window) as Arc<dyn Window>)
    });

    let result = manager.open_window(&kind("main"), false);

    assert!(matches!(
        result,
        Err(DomainError::Window(ref message)) if message.contains("minimised")
    ));
    assert!(manager.windows().is_empty());
}
