//! Progress reporter
//!
//! Polls a running [`Task`] and turns its progress into status lines. The
//! first poll happens [`FIRST_POLL_DELAY`] after start; afterwards every
//! tick asks the animation for a [`Frame`], hands the frame's message to the
//! status sink and sleeps for the frame's delay. Once the task has finished,
//! exactly one of `on_done` / `on_fail` runs.

use std::time::Duration;

use tracing::debug;

use crate::task::{Task, TaskOutcome, TaskProgress};
use crate::transfer::Direction;
use crate::SyncError;

/// Delay before the first poll
pub const FIRST_POLL_DELAY: Duration = Duration::from_millis(100);

/// Delay between frames of the default animation
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(300);

/// One rendered animation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Counter passed to the next call
    pub next: usize,
    /// Status line to display
    pub message: String,
    /// How long to wait before the next poll
    pub delay: Duration,
}

/// Animation callback: `(counter, message, progress) -> Frame`
pub type Animation = Box<dyn FnMut(usize, &str, &TaskProgress) -> Frame + Send>;

/// Default animation: the message followed by one to three dots
pub fn dots(counter: usize, message: &str, _progress: &TaskProgress) -> Frame {
    Frame {
        next: (counter + 1) % 3,
        message: format!("{message}{}", ".".repeat(counter % 3 + 1)),
        delay: DEFAULT_FRAME_DELAY,
    }
}

/// Like [`dots`], but prefers the message the task itself publishes
pub fn task_message_dots(counter: usize, message: &str, progress: &TaskProgress) -> Frame {
    let message = if progress.message.is_empty() {
        message
    } else {
        progress.message.as_str()
    };
    dots(counter, message, progress)
}

/// Width of the transfer bar in characters
pub const BAR_WIDTH: usize = 25;

/// Renders the bar for `percentage`: the head walks right on upload and
/// left on download
pub fn render_bar(percentage: u8, direction: Direction) -> String {
    let filled = BAR_WIDTH * usize::from(percentage.min(100)) / 100;
    let head = match direction {
        Direction::Upload => '>',
        Direction::Download => '<',
    };

    let mut bar = vec![' '; filled.saturating_sub(1)];
    bar.push(head);
    bar.resize(BAR_WIDTH, ' ');
    if direction == Direction::Download {
        bar.reverse();
    }
    bar.into_iter().collect()
}

/// Transfer animation: `Syncing... [bar] pct% file` plus cycling dots
pub fn transfer_bar(direction: Direction) -> impl FnMut(usize, &str, &TaskProgress) -> Frame + Send + 'static {
    move |counter, _message, progress| {
        let file = progress
            .current_file
            .as_deref()
            .map(|f| format!(" {f}"))
            .unwrap_or_default();
        Frame {
            next: (counter + 1) % BAR_WIDTH,
            message: format!(
                "Syncing... [{}] {}%{}{}",
                render_bar(progress.percentage, direction),
                progress.percentage,
                file,
                ".".repeat(counter % 3 + 1)
            ),
            delay: DEFAULT_FRAME_DELAY,
        }
    }
}

/// Drives the status display of one task
pub struct ProgressReporter {
    message: String,
    animation: Animation,
    first_poll: Duration,
}

impl ProgressReporter {
    /// Creates a reporter with the default dots animation
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            animation: Box::new(dots),
            first_poll: FIRST_POLL_DELAY,
        }
    }

    /// Replaces the animation callback
    pub fn with_animation<A>(mut self, animation: A) -> Self
    where
        A: FnMut(usize, &str, &TaskProgress) -> Frame + Send + 'static,
    {
        self.animation = Box::new(animation);
        self
    }

    /// Overrides [`FIRST_POLL_DELAY`]
    pub fn with_first_poll(mut self, delay: Duration) -> Self {
        self.first_poll = delay;
        self
    }

    /// Polls `task` until it finishes, then runs `on_done` or `on_fail`
    ///
    /// `status` receives every frame's message while the task is alive and
    /// an empty line once it has finished.
    pub async fn run<T, R, S, D, F>(mut self, task: Task<T>, mut status: S, on_done: D, on_fail: F) -> R
    where
        T: Send + 'static,
        S: FnMut(&str),
        D: FnOnce(T) -> R,
        F: FnOnce(SyncError) -> R,
    {
        tokio::time::sleep(self.first_poll).await;

        let mut counter = 0usize;
        let mut frames = 0usize;
        while task.is_alive() {
            let frame = (self.animation)(counter, &self.message, &task.progress());
            status(&frame.message);
            counter = frame.next;
            frames += 1;
            tokio::time::sleep(frame.delay).await;
        }

        status("");
        debug!(frames, message = %self.message, "Task finished");
        match task.outcome().await {
            TaskOutcome::Succeeded(value) => on_done(value),
            TaskOutcome::Failed(err) => on_fail(err),
        }
    }
}
