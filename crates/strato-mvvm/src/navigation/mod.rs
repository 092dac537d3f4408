//! Navigation between view-models shown in a single host view.

use futures::future::{BoxFuture, FutureExt};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use strato_domain::events::EventSubscriber;
use strato_domain::shared::{DomainError, ViewKind};

use crate::view_model::{ViewModel, ViewModelBase};

type ViewModelFactory = dyn Fn(Arc<NavigationContext>) -> BoxFuture<'static, Result<Arc<dyn ViewModel>, DomainError>>
    + Send
    + Sync;

pub type NavigationRequestedListener = dyn Fn(NavigationTarget) + Send + Sync;

/// What the host should display after a navigation
#[derive(Clone)]
pub struct NavigationTarget {
    pub view: ViewKind,
    pub view_model: Arc<dyn ViewModel>,
}

struct NavigationRegistration {
    view: ViewKind,
    factory: Arc<ViewModelFactory>,
}

/// Registry of (view, view-model) pairs plus the currently shown view-model
#[derive(Default)]
pub struct NavigationContext {
    registrations: Mutex<HashMap<TypeId, NavigationRegistration>>,
    on_navigation_requested: Mutex<Option<Arc<NavigationRequestedListener>>>,
    current: Mutex<Option<Arc<dyn ViewModel>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl NavigationContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `view` as the view for `VM`, built by `factory`.
    ///
    /// The factory receives this context so the view-model can navigate on
    /// its own. Registering `VM` again replaces the previous registration.
    pub fn register<VM, F, Fut>(&self, view: ViewKind, factory: F)
    where
        VM: ViewModel + EventSubscriber,
        F: Fn(Arc<NavigationContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<VM>, DomainError>> + Send + 'static,
    {
        let factory: Arc<ViewModelFactory> = Arc::new(move |context| {
            let building = factory(context);
            async move {
                let view_model = building.await?;
                ViewModelBase::activate(&view_model).await;
                Ok::<_, DomainError>(view_model as Arc<dyn ViewModel>)
            }
            .boxed()
        });

        let previous = lock(&self.registrations).insert(
            TypeId::of::<VM>(),
            NavigationRegistration {
                view: view.clone(),
                factory,
            },
        );

        if previous.is_some() {
            debug!("Replaced navigation registration for {}", type_name::<VM>());
        }
        info!("Registered view {} for {}", view, type_name::<VM>());
    }

    pub fn is_registered<VM: ViewModel>(&self) -> bool {
        lock(&self.registrations).contains_key(&TypeId::of::<VM>())
    }

    /// Install the callback that displays navigation targets
    pub fn set_on_navigation_requested(&self, listener: impl Fn(NavigationTarget) + Send + Sync + 'static) {
        *lock(&self.on_navigation_requested) = Some(Arc::new(listener));
    }

    pub fn clear_on_navigation_requested(&self) {
        *lock(&self.on_navigation_requested) = None;
    }

    pub fn current_view_model(&self) -> Option<Arc<dyn ViewModel>> {
        lock(&self.current).clone()
    }

    /// Build and activate `VM`, then hand it to the navigation callback.
    ///
    /// Only when a callback is installed does the new view-model become the
    /// current one; the previous one is then disposed. A failing factory is
    /// reported as [`DomainError::Navigation`].
    pub async fn navigate_to<VM: ViewModel>(self: &Arc<Self>) -> Result<NavigationTarget, DomainError> {
        let (view, factory) = {
            let registrations = lock(&self.registrations);
            let registration = registrations.get(&TypeId::of::<VM>()).ok_or_else(|| {
                DomainError::NotRegistered(format!(
                    "{} has not been registered to any view",
                    type_name::<VM>()
                ))
            })?;
            (registration.view.clone(), registration.factory.clone())
        };

        let view_model = factory(self.clone()).await.map_err(|e| {
            warn!("Failed to build {} for {}: {}", type_name::<VM>(), view, e);
            DomainError::Navigation(format!("Cannot show {}: {}", view, e))
        })?;
        let target = NavigationTarget { view, view_model };

        let listener = lock(&self.on_navigation_requested).clone();
        let Some(listener) = listener else {
            debug!("No navigation callback installed, {} not shown", type_name::<VM>());
            return Ok(target);
        };

        listener(target.clone());
        let previous = lock(&self.current).replace(target.view_model.clone());
        info!("Navigated to {} ({})", target.view, type_name::<VM>());

        if let Some(previous) = previous {
            if !Arc::ptr_eq(&previous, &target.view_model) {
                previous.base().dispose().await;
            }
        }

        Ok(target)
    }
}
