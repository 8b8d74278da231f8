//! Background task supervision.
//!
//! Launches that must not block the native entrypoint are handed to the
//! [`Supervisor`]. The caller gets a `JoinHandle` it is free to drop; the
//! supervisor keeps tracking the task so that a failure or panic is logged
//! and recorded instead of disappearing with the dropped handle.

use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// A background task that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundFailure {
    /// Name the task was spawned under.
    pub task: String,
    /// Rendered error chain or panic payload.
    pub reason: String,
}

/// Process-wide owner of detached background work.
///
/// Clones share the same tracker and failure log.
#[derive(Clone)]
pub struct Supervisor {
    handle: Handle,
    tracker: TaskTracker,
    failures: Arc<Mutex<Vec<BackgroundFailure>>>,
}

impl Supervisor {
    /// Create a supervisor that spawns onto `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            tracker: TaskTracker::new(),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a supervisor for the runtime the caller is running in, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Run a blocking closure on the runtime's blocking pool.
    ///
    /// Returns as soon as the task is scheduled. The outcome is observed by
    /// a monitor task owned by the supervisor: success is logged, an error
    /// or panic is logged and recorded in [`failures`](Self::failures).
    /// Failed tasks are never retried.
    pub fn spawn_blocking<F>(&self, task: impl Into<String>, f: F) -> JoinHandle<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let task = task.into();
        let failures = self.failures.clone();
        let handle = self.handle.clone();

        debug!(task = %task, "Scheduling background task");
        self.tracker.spawn_on(
            async move {
                let reason = match handle.spawn_blocking(f).await {
                    Ok(Ok(())) => {
                        info!(task = %task, "Background task completed");
                        return;
                    }
                    Ok(Err(e)) => format!("{e:#}"),
                    Err(e) if e.is_panic() => {
                        format!("panicked: {}", panic_message(&*e.into_panic()))
                    }
                    Err(e) => e.to_string(),
                };

                error!(task = %task, reason = %reason, "Background task failed");
                failures
                    .lock()
                    .expect("failure log poisoned")
                    .push(BackgroundFailure { task, reason });
            },
            &self.handle,
        )
    }

    /// Snapshot of every failure observed so far.
    pub fn failures(&self) -> Vec<BackgroundFailure> {
        self.failures.lock().expect("failure log poisoned").clone()
    }

    /// Number of tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Close the tracker and wait for every tracked task to finish.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Shut `runtime` down, giving blocking tasks at most `grace` to finish.
///
/// Dropping a runtime waits for its blocking pool, and a hosted app's
/// entrypoint may never return. Tasks still running after `grace` are
/// abandoned to process exit.
pub fn shutdown_runtime(runtime: Runtime, supervisor: &Supervisor, grace: Duration) {
    let active = supervisor.active_tasks();
    if active > 0 {
        info!(active, "Shutting down with background tasks still running");
    }
    runtime.shutdown_timeout(grace);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
