//! Cancellable tasks and the exclusive barrier.
//!
//! Two primitives serialize every route-mutating operation:
//!
//! - [`TaskManager::cancellable_task`] runs an operation as a cancellable
//!   unit keyed by a logical id. Starting a new task with the same id
//!   cancels the previous one. Used for frequent, interruptible work:
//!   status handling, alternative selection, leg switching, reroute
//!   acceptance.
//! - [`TaskManager::with_barrier`] cancels *every* in-flight cancellable
//!   task, then runs an operation to completion with exclusive access.
//!   While the barrier is set, new cancellable tasks are refused rather
//!   than queued; callers re-trigger after the barrier clears if the work
//!   still matters. Used for rare, critical transitions: route
//!   replacement, idling, starting free drive.
//!
//! Operations receive a [`CancellationToken`] and must check it after each
//! suspension point before publishing results. The spawned future is also
//! raced against the token, so a cancelled task stops at its next await
//! without producing visible state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::trace;

struct TaskEntry {
    generation: u64,
    token: CancellationToken,
}

struct Inner {
    tasks: Mutex<HashMap<&'static str, TaskEntry>>,
    barrier: AtomicBool,
    /// Serializes barrier operations against each other.
    barrier_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

/// Coordinates cancellable tasks and barrier-exclusive operations.
///
/// Cloning is cheap; clones share the same task registry and barrier.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(HashMap::new()),
                barrier: AtomicBool::new(false),
                barrier_lock: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Whether a barrier operation is currently executing.
    pub fn is_barrier_active(&self) -> bool {
        self.inner.barrier.load(Ordering::SeqCst)
    }

    /// Spawn `op` as a cancellable task keyed by `id`.
    ///
    /// Cancels any in-flight task with the same id. Returns `false` when
    /// the task was refused because a barrier is active.
    pub fn cancellable_task<F, Fut>(&self, id: &'static str, op: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst);
        {
            // The barrier flag is read under the tasks lock so a task
            // cannot register between the barrier being set and the sweep
            // that cancels the registry.
            let mut tasks = lock_tasks(&self.inner);
            if self.inner.barrier.load(Ordering::SeqCst) {
                trace!(task = id, "cancellable task refused: barrier active");
                return false;
            }
            if let Some(previous) = tasks.insert(
                id,
                TaskEntry {
                    generation,
                    token: token.clone(),
                },
            ) {
                previous.token.cancel();
            }
        }

        let future = op(token.clone());
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!(task = id, "cancellable task cancelled");
                }
                _ = future => {}
            }
            let mut tasks = lock_tasks(&inner);
            if tasks
                .get(id)
                .is_some_and(|entry| entry.generation == generation)
            {
                tasks.remove(id);
            }
        });
        true
    }

    /// Cancel every in-flight cancellable task.
    pub fn cancel_tasks(&self) {
        let mut tasks = lock_tasks(&self.inner);
        for entry in tasks.values() {
            entry.token.cancel();
        }
        tasks.clear();
    }

    /// Run `op` with the barrier set.
    ///
    /// Cancels all in-flight cancellable tasks first, then runs `op` to
    /// completion. Concurrent barrier operations serialize in call order.
    pub async fn with_barrier<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.inner.barrier_lock.lock().await;
        {
            // Set the flag and sweep the registry under the same lock that
            // guards task registration, so no task slips in uncancelled.
            let mut tasks = lock_tasks(&self.inner);
            self.inner.barrier.store(true, Ordering::SeqCst);
            for entry in tasks.values() {
                entry.token.cancel();
            }
            tasks.clear();
        }
        let result = op().await;
        self.inner.barrier.store(false, Ordering::SeqCst);
        result
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_tasks(inner: &Inner) -> std::sync::MutexGuard<'_, HashMap<&'static str, TaskEntry>> {
    inner
        .tasks
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
