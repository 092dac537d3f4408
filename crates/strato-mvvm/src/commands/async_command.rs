use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

use strato_domain::shared::DomainError;

use super::{CanExecuteChangedListener, Command, ListenerId};
use crate::listeners::Listeners;

type AsyncAction = dyn Fn() -> BoxFuture<'static, Result<(), DomainError>> + Send + Sync;
type Predicate = dyn Fn() -> bool + Send + Sync;
type ErrorCallback = dyn Fn(&DomainError) + Send + Sync;

/// Command relaying to an async closure.
///
/// Unless built with [`AsyncCommand::concurrent`], the command refuses to
/// start again while a previous run is still in flight. Cloning shares the
/// same command.
#[derive(Clone)]
pub struct AsyncCommand {
    inner: Arc<Inner>,
}

struct Inner {
    action: Box<AsyncAction>,
    predicate: Option<Box<Predicate>>,
    on_error: Option<Box<ErrorCallback>>,
    can_execute_concurrently: bool,
    running: AtomicUsize,
    listeners: Listeners<CanExecuteChangedListener>,
}

impl AsyncCommand {
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        Self::build(Box::new(move || action().boxed()), false)
    }

    /// A command that may start again while already running
    pub fn concurrent<F, Fut>(action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        Self::build(Box::new(move || action().boxed()), true)
    }

    fn build(action: Box<AsyncAction>, can_execute_concurrently: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                action,
                predicate: None,
                on_error: None,
                can_execute_concurrently,
                running: AtomicUsize::new(0),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Builder pattern: only allow execution while `predicate` holds.
    ///
    /// Must be called before the command is cloned.
    pub fn with_can_execute(self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.map_inner(|inner| inner.predicate = Some(Box::new(predicate)))
    }

    /// Builder pattern: receive failures of fire-and-forget runs.
    ///
    /// Must be called before the command is cloned.
    pub fn with_error_handler(self, on_error: impl Fn(&DomainError) + Send + Sync + 'static) -> Self {
        self.map_inner(|inner| inner.on_error = Some(Box::new(on_error)))
    }

    fn map_inner(mut self, apply: impl FnOnce(&mut Inner)) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => apply(inner),
            None => warn!("AsyncCommand already shared, builder option ignored"),
        }
        self
    }

    pub fn is_executing(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst) > 0
    }

    pub fn can_execute_concurrently(&self) -> bool {
        self.inner.can_execute_concurrently
    }

    /// Run the action to completion.
    ///
    /// Returns `Ok(())` without running anything when the command cannot
    /// execute. The executing flag is cleared however the run ends,
    /// including when this future is dropped early.
    pub async fn execute_async(&self) -> Result<(), DomainError> {
        let Some(_run) = self.inner.try_begin() else {
            debug!("AsyncCommand cannot execute, skipping");
            return Ok(());
        };

        (self.inner.action)().await
    }

    fn report(&self, error: &DomainError) {
        error!("AsyncCommand failed: {}", error);
        if let Some(on_error) = &self.inner.on_error {
            on_error(error);
        }
    }
}

impl Inner {
    fn predicate_allows(&self) -> bool {
        self.predicate.as_ref().map_or(true, |predicate| predicate())
    }

    fn can_execute(&self) -> bool {
        (self.can_execute_concurrently || self.running.load(Ordering::SeqCst) == 0)
            && self.predicate_allows()
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        if !self.predicate_allows() {
            return None;
        }

        if self.can_execute_concurrently {
            self.running.fetch_add(1, Ordering::SeqCst);
        } else if self
            .running
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        self.notify();
        Some(RunGuard { inner: self })
    }

    fn notify(&self) {
        for listener in self.listeners.snapshot() {
            listener();
        }
    }
}

struct RunGuard<'a> {
    inner: &'a Inner,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.inner.running.fetch_sub(1, Ordering::SeqCst);
        self.inner.notify();
    }
}

impl Command for AsyncCommand {
    fn can_execute(&self) -> bool {
        self.inner.can_execute()
    }

    /// Fire and forget on the current tokio runtime.
    ///
    /// Failures go to the error handler, if any, and are logged.
    fn execute(&self) {
        let command = self.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = command.execute_async().await {
                        command.report(&e);
                    }
                });
            }
            Err(_) => warn!("AsyncCommand executed outside a tokio runtime, ignoring"),
        }
    }

    fn raise_can_execute_changed(&self) {
        self.inner.notify();
    }

    fn on_can_execute_changed(&self, listener: Arc<CanExecuteChangedListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_execute_async_runs_action() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let command = AsyncCommand::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        command.execute_async().await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!command.is_executing());
    }

    #[tokio::test]
    async fn test_cannot_execute_while_running() {
        let release = Arc::new(Notify::new());
        let gate = release.clone();
        let command = AsyncCommand::new(move || {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                Ok(())
            }
        });

        let running = command.clone();
        let first = tokio::spawn(async move { running.execute_async().await });
        while !command.is_executing() {
            tokio::task::yield_now().await;
        }

        assert!(!command.can_execute());
        // Second run is refused immediately instead of waiting
        command.execute_async().await.unwrap();

        release.notify_one();
        first.await.unwrap().unwrap();
        assert!(command.can_execute());
    }

    #[tokio::test]
    async fn test_concurrent_command_stays_executable() {
        let release = Arc::new(Notify::new());
        let gate = release.clone();
        let command = AsyncCommand::concurrent(move || {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                Ok(())
            }
        });
        assert!(command.can_execute_concurrently());

        let running = command.clone();
        let first = tokio::spawn(async move { running.execute_async().await });
        while !command.is_executing() {
            tokio::task::yield_now().await;
        }

        assert!(command.can_execute());

        release.notify_one();
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failure_clears_executing_and_notifies_twice() {
        let command = AsyncCommand::new(|| async {
            Err(DomainError::Command("nope".to_string()))
        });
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        command.on_can_execute_changed(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let result = command.execute_async().await;

        assert!(matches!(result, Err(DomainError::Command(_))));
        assert!(!command.is_executing());
        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_predicate_blocks_execution() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let command = AsyncCommand::new(move || {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .with_can_execute(|| false);

        assert!(!command.can_execute());
        command.execute_async().await.unwrap();

        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_fire_and_forget_reports_errors() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let sender = Mutex::new(sender);
        let command = AsyncCommand::new(|| async {
            Err(DomainError::Command("background failure".to_string()))
        })
        .with_error_handler(move |e| {
            let _ = sender.lock().unwrap().send(e.to_string());
        });

        command.execute();

        let message = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("background failure"));
    }
}
