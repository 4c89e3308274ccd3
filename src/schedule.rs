use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Identifies one polling loop registered with a [`PollRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PollHandle(usize);

impl PollHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PollHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a polling loop does when its callback fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and run the next cycle as usual.
    #[default]
    Continue,
    /// Log the failure and end the loop, leaving the handle inactive.
    Stop,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("polling requires a running tokio runtime")]
    NoRuntime,
}

/// Result of one callback invocation, as seen by the polling loop.
pub trait PollOutcome {
    fn into_result(self) -> Result<(), String>;
}

impl PollOutcome for () {
    fn into_result(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: fmt::Display> PollOutcome for Result<(), E> {
    fn into_result(self) -> Result<(), String> {
        self.map_err(|err| err.to_string())
    }
}

/// Owns every polling loop started by one dashboard.
///
/// A loop invokes its callback, waits for it to finish, then sleeps for the
/// interval before the next invocation, so the effective period is the
/// interval plus the callback's own duration. Cancelling is cooperative: an
/// in-flight invocation always completes, and no invocation starts after the
/// handle has been cancelled. Entries are never removed, so handles stay valid
/// for the registry's lifetime. Dropping the registry cancels every loop.
#[derive(Debug, Default)]
pub struct PollRegistry {
    entries: Mutex<Vec<CancellationToken>>,
    policy: FailurePolicy,
}

impl PollRegistry {
    pub fn new() -> PollRegistry {
        PollRegistry::default()
    }

    pub fn with_failure_policy(policy: FailurePolicy) -> PollRegistry {
        PollRegistry {
            entries: Mutex::default(),
            policy,
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Starts a polling loop on the current tokio runtime. The first
    /// invocation is scheduled immediately.
    pub fn register<F, Fut>(
        &self,
        callback: F,
        interval: Duration,
    ) -> Result<PollHandle, ScheduleError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: PollOutcome,
    {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ScheduleError::NoRuntime)?;

        let token = CancellationToken::new();
        let handle = {
            let mut entries = self.entries();
            entries.push(token.clone());
            PollHandle(entries.len() - 1)
        };

        log::debug!("Registered poll {handle} every {interval:?}");
        runtime.spawn(run_loop(handle, callback, interval, self.policy, token));
        Ok(handle)
    }

    /// Deactivates a loop. Returns `false` if the handle was unknown or
    /// already inactive.
    pub fn cancel(&self, handle: PollHandle) -> bool {
        match self.entries().get(handle.0) {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                log::debug!("Cancelled poll {handle}");
                true
            }
            _ => false,
        }
    }

    pub fn cancel_all(&self) {
        for token in self.entries().iter() {
            token.cancel();
        }
    }

    pub fn is_active(&self, handle: PollHandle) -> bool {
        self.entries()
            .get(handle.0)
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Number of loops ever registered, active or not.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, Vec<CancellationToken>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PollRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn run_loop<F, Fut>(
    handle: PollHandle,
    mut callback: F,
    interval: Duration,
    policy: FailurePolicy,
    token: CancellationToken,
) where
    F: FnMut() -> Fut,
    Fut: Future,
    Fut::Output: PollOutcome,
{
    // marks the handle inactive however the loop ends, panics included
    let _deactivate = token.clone().drop_guard();

    loop {
        if let Err(message) = callback().await.into_result() {
            match policy {
                FailurePolicy::Continue => {
                    log::warn!("Poll {handle} failed, retrying in {interval:?}: {message}");
                }
                FailurePolicy::Stop => {
                    log::error!("Poll {handle} failed, stopping: {message}");
                    break;
                }
            }
        }

        if token.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    log::debug!("Poll {handle} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn counting(
        count: &Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[test]
    fn test_register_outside_runtime() {
        let registry = PollRegistry::new();
        let result = registry.register(|| async {}, Duration::from_millis(100));
        assert!(matches!(result, Err(ScheduleError::NoRuntime)));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_first_invocation() {
        let registry = PollRegistry::new();
        let completed = Arc::new(AtomicUsize::new(0));

        let done = completed.clone();
        let handle = registry
            .register(
                move || {
                    let done = done.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        done.fetch_add(1, Ordering::SeqCst);
                    }
                },
                Duration::from_millis(100),
            )
            .unwrap();
        assert!(registry.cancel(handle));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert!(!registry.is_active(handle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handles_are_independent() {
        let registry = PollRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let a = registry
            .register(counting(&first), Duration::from_millis(100))
            .unwrap();
        let b = registry
            .register(counting(&second), Duration::from_millis(100))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        registry.cancel(a);
        tokio::time::sleep(Duration::from_millis(1050)).await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert!(second.load(Ordering::SeqCst) >= 10);
        assert!(!registry.is_active(a));
        assert!(registry.is_active(b));

        registry.cancel_all();
        assert!(!registry.is_active(b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_includes_callback_duration() {
        let registry = PollRegistry::new();
        let starts = Arc::new(Mutex::new(Vec::new()));

        let recorded = starts.clone();
        let handle = registry
            .register(
                move || {
                    let recorded = recorded.clone();
                    async move {
                        recorded.lock().unwrap().push(Instant::now());
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                Duration::from_millis(100),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        registry.cancel(handle);

        let starts = starts.lock().unwrap();
        assert!(starts.len() >= 3);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(150));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_continue_by_default() {
        let registry = PollRegistry::new();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = attempts.clone();
        let handle = registry
            .register(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::future::ready(Err::<(), _>("backend down"))
                },
                Duration::from_millis(100),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(attempts.load(Ordering::SeqCst) >= 3);
        assert!(registry.is_active(handle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_stops_loop_when_configured() {
        let registry = PollRegistry::with_failure_policy(FailurePolicy::Stop);
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = attempts.clone();
        let handle = registry
            .register(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::future::ready(Err::<(), _>("backend down"))
                },
                Duration::from_millis(100),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!registry.is_active(handle));
        assert!(!registry.cancel(handle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_callback_deactivates_handle() {
        let registry = PollRegistry::new();
        let handle = registry
            .register(
                || -> std::future::Ready<()> { panic!("callback exploded") },
                Duration::from_millis(100),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!registry.is_active(handle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_registry_stops_loops() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let registry = PollRegistry::new();
            registry
                .register(counting(&count), Duration::from_millis(100))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        let after_drop = count.load(Ordering::SeqCst);
        assert!(after_drop >= 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_handles_not_reused() {
        let registry = PollRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        let first = registry
            .register(counting(&count), Duration::from_secs(60))
            .unwrap();
        assert!(registry.cancel(first));
        assert!(!registry.cancel(first));
        assert!(!registry.cancel(PollHandle(42)));
        assert!(!registry.is_active(PollHandle(42)));

        let second = registry
            .register(counting(&count), Duration::from_secs(60))
            .unwrap();
        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);
        assert_eq!(second.to_string(), "#1");
        registry.cancel_all();
    }
}
