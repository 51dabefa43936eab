//! Background task runner
//!
//! Every stage of a sync run executes as a [`Task`] on the tokio runtime.
//! The stage body receives a [`TaskContext`] to publish progress (percentage,
//! the file in flight, a status message) and to observe cancellation; the
//! caller keeps the [`Task`] handle to poll that progress and finally await a
//! typed [`TaskOutcome`].
//!
//! Progress reads are best-effort snapshots: the reporter may observe a
//! percentage together with the previous file name.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::SyncError;

// ============================================================================
// Progress state
// ============================================================================

#[derive(Debug, Default)]
struct SharedProgress {
    percentage: AtomicU8,
    current_file: Mutex<Option<String>>,
    message: Mutex<String>,
}

/// Point-in-time copy of a task's progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskProgress {
    /// Completion in percent (0..=100)
    pub percentage: u8,
    /// Name of the file currently being transferred
    pub current_file: Option<String>,
    /// Latest status message published by the task
    pub message: String,
}

impl SharedProgress {
    fn snapshot(&self) -> TaskProgress {
        TaskProgress {
            percentage: self.percentage.load(Ordering::Acquire),
            current_file: self
                .current_file
                .lock()
                .map(|f| f.clone())
                .unwrap_or_default(),
            message: self.message.lock().map(|m| m.clone()).unwrap_or_default(),
        }
    }
}

// ============================================================================
// TaskContext
// ============================================================================

/// Writer side of a task's progress, handed to the task body
#[derive(Debug, Clone)]
pub struct TaskContext {
    progress: Arc<SharedProgress>,
    cancel: CancellationToken,
}

impl TaskContext {
    /// Publishes the completion percentage (clamped to 100)
    pub fn set_percentage(&self, percentage: u8) {
        self.progress
            .percentage
            .store(percentage.min(100), Ordering::Release);
    }

    /// Publishes the name of the file in flight
    pub fn set_current_file(&self, name: impl Into<String>) {
        if let Ok(mut current) = self.progress.current_file.lock() {
            *current = Some(name.into());
        }
    }

    /// Publishes a status message
    pub fn set_message(&self, message: impl Into<String>) {
        if let Ok(mut current) = self.progress.message.lock() {
            *current = message.into();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns `Err(SyncError::Cancelled)` once cancellation was requested
    pub fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Context that is not attached to any [`Task`]; used when a stage body
    /// runs inline
    pub fn detached() -> Self {
        Self {
            progress: Arc::new(SharedProgress::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Snapshot of what this context has published so far
    pub fn progress(&self) -> TaskProgress {
        self.progress.snapshot()
    }
}

// ============================================================================
// Task
// ============================================================================

/// Terminal result of a [`Task`]
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Succeeded(T),
    Failed(SyncError),
}

impl<T> TaskOutcome<T> {
    /// Converts into a `Result`
    pub fn into_result(self) -> Result<T, SyncError> {
        match self {
            Self::Succeeded(value) => Ok(value),
            Self::Failed(err) => Err(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Handle to a stage running on the tokio runtime
#[derive(Debug)]
pub struct Task<T> {
    progress: Arc<SharedProgress>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<T, SyncError>>,
}

impl<T: Send + 'static> Task<T> {
    /// Spawns `body` with a fresh cancellation token
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        Self::spawn_with_token(CancellationToken::new(), body)
    }

    /// Spawns `body`, cancelling it when `cancel` (or a parent of it) fires
    pub fn spawn_with_token<F, Fut>(cancel: CancellationToken, body: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let progress = Arc::new(SharedProgress::default());
        let ctx = TaskContext {
            progress: Arc::clone(&progress),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(body(ctx));

        Self {
            progress,
            cancel,
            handle,
        }
    }

    /// True until the task body has returned
    pub fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn percentage(&self) -> u8 {
        self.progress.percentage.load(Ordering::Acquire)
    }

    pub fn current_file_name(&self) -> Option<String> {
        self.progress.snapshot().current_file
    }

    pub fn message(&self) -> String {
        self.progress.snapshot().message
    }

    /// Snapshot of all progress fields
    pub fn progress(&self) -> TaskProgress {
        self.progress.snapshot()
    }

    /// Requests cancellation; the body observes it at its next check
    pub fn cancel(&self) {
        debug!("Cancellation requested");
        self.cancel.cancel();
    }

    /// Waits for the task to finish
    ///
    /// A panic inside the body is reported as `Failed(SyncError::Task)`.
    pub async fn outcome(self) -> TaskOutcome<T> {
        match self.handle.await {
            Ok(Ok(value)) => TaskOutcome::Succeeded(value),
            Ok(Err(err)) => TaskOutcome::Failed(err),
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "task was aborted".to_string()
                };
                error!(reason = %reason, "Task terminated abnormally");
                TaskOutcome::Failed(SyncError::Task(reason))
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}
