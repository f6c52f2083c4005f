//! Cancellable, progress-reporting handle for long-running operations.
//!
//! A `Task` is shared between the worker running an archive, restore or
//! export operation and the caller watching it. The worker writes progress
//! (messages and percent) and polls the abort flag; the caller sets the abort
//! flag and reads progress. Exactly one operation owns a task at a time.
//!
//! # Examples
//!
//! ```
//! use notebook_archiver::task::{Task, TaskMessage, TaskState};
//!
//! let task = Task::new();
//! task.set_message(TaskMessage::Text("Archiving 3 files...".to_string()));
//! task.set_percent(0.5);
//! assert_eq!(task.text(), "Archiving 3 files...");
//!
//! task.finish();
//! assert_eq!(task.state(), TaskState::Finished);
//! assert_eq!(task.percent(), 1.0);
//! ```

use crate::constants::{DETAIL_ELLIPSIS, MAX_DETAIL_LEN};
use crate::errors::BackupError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// A two-level progress message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskMessage {
    /// Coarse description of the current phase.
    Text(String),
    /// Fine-grained detail, usually the path being processed.
    Detail(String),
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// The operation has not ended yet.
    Running,
    /// The operation completed successfully.
    Finished,
    /// The operation failed; carries the rendered error cause.
    Errored(String),
    /// The operation stopped because the task was aborted.
    Canceled,
}

impl TaskState {
    /// Returns true once the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Running)
    }
}

/// A change observed on a task, delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    Message(TaskMessage),
    Percent(f64),
    State(TaskState),
}

#[derive(Debug)]
struct Progress {
    text: String,
    detail: String,
    percent: f64,
    state: TaskState,
}

/// Progress and cancellation handle for one long-running operation.
#[derive(Debug)]
pub struct Task {
    aborted: AtomicBool,
    progress: Mutex<Progress>,
    subscribers: Mutex<Vec<Sender<TaskUpdate>>>,
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Task {
    /// Creates a running task with empty messages and zero progress.
    pub fn new() -> Self {
        Task {
            aborted: AtomicBool::new(false),
            progress: Mutex::new(Progress {
                text: String::new(),
                detail: String::new(),
                percent: 0.0,
                state: TaskState::Running,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Returns a receiver that gets every subsequent progress update.
    ///
    /// Updates are delivered in the order they are made. Dropping the receiver
    /// unsubscribes it.
    pub fn subscribe(&self) -> Receiver<TaskUpdate> {
        let (sender, receiver) = mpsc::channel();
        lock(&self.subscribers).push(sender);
        receiver
    }

    fn publish(&self, update: TaskUpdate) {
        lock(&self.subscribers).retain(|sender| sender.send(update.clone()).is_ok());
    }

    /// Requests cancellation. The worker observes it at its next check.
    pub fn abort(&self) {
        debug!("Task abort requested");
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Returns true once `abort` has been called.
    pub fn aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Returns `Err(BackupError::Canceled)` if the task has been aborted.
    pub fn check_aborted(&self) -> Result<(), BackupError> {
        if self.aborted() {
            Err(BackupError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Updates the coarse or detail message line.
    pub fn set_message(&self, message: TaskMessage) {
        {
            let mut progress = lock(&self.progress);
            match &message {
                TaskMessage::Text(text) => progress.text = text.clone(),
                TaskMessage::Detail(detail) => progress.detail = detail.clone(),
            }
        }
        self.publish(TaskUpdate::Message(message));
    }

    /// Sets the detail line to `detail`, truncated for display.
    pub fn set_detail(&self, detail: &str) {
        self.set_message(TaskMessage::Detail(truncate_detail(detail)));
    }

    /// Sets the completion fraction, clamped to `[0, 1]`.
    pub fn set_percent(&self, percent: f64) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 1.0)
        };
        lock(&self.progress).percent = percent;
        self.publish(TaskUpdate::Percent(percent));
    }

    /// Marks the task as successfully completed and sets progress to 1.0.
    pub fn finish(&self) {
        self.set_percent(1.0);
        self.set_state(TaskState::Finished);
    }

    fn set_state(&self, state: TaskState) {
        lock(&self.progress).state = state.clone();
        self.publish(TaskUpdate::State(state));
    }

    /// Records the terminal state implied by an operation result.
    ///
    /// Successful results leave an already finished task alone and finish it
    /// otherwise; `Canceled` maps to `TaskState::Canceled`; every other error
    /// marks the task as errored with the rendered cause.
    pub fn record<T>(&self, result: &Result<T, BackupError>) {
        match result {
            Ok(_) => {
                if self.state() != TaskState::Finished {
                    self.finish();
                }
            }
            Err(BackupError::Canceled) => self.set_state(TaskState::Canceled),
            Err(err) => self.set_state(TaskState::Errored(err.to_string())),
        }
    }

    /// Current coarse message.
    pub fn text(&self) -> String {
        lock(&self.progress).text.clone()
    }

    /// Current detail message.
    pub fn detail(&self) -> String {
        lock(&self.progress).detail.clone()
    }

    /// Current completion fraction in `[0, 1]`.
    pub fn percent(&self) -> f64 {
        lock(&self.progress).percent
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        lock(&self.progress).state.clone()
    }
}

/// Runs `operation` on a worker thread against `task`.
///
/// The task's terminal state is recorded from the operation's result before
/// the thread exits, so a caller polling `task.state()` sees it become
/// terminal before `join` returns.
pub fn spawn<T, F>(task: Arc<Task>, operation: F) -> JoinHandle<Result<T, BackupError>>
where
    T: Send + 'static,
    F: FnOnce(&Task) -> Result<T, BackupError> + Send + 'static,
{
    thread::spawn(move || {
        let result = operation(&task);
        task.record(&result);
        result
    })
}

/// Shortens a detail line to at most 100 characters.
///
/// Longer strings keep their last 97 characters behind a leading `...`.
///
/// # Examples
///
/// ```
/// use notebook_archiver::task::truncate_detail;
///
/// assert_eq!(truncate_detail("notes/page.html"), "notes/page.html");
///
/// let long = "x".repeat(150);
/// let shown = truncate_detail(&long);
/// assert_eq!(shown.chars().count(), 100);
/// assert!(shown.starts_with("..."));
/// ```
pub fn truncate_detail(detail: &str) -> String {
    let len = detail.chars().count();
    if len <= MAX_DETAIL_LEN {
        return detail.to_string();
    }
    let keep = MAX_DETAIL_LEN - DETAIL_ELLIPSIS.len();
    let tail: String = detail.chars().skip(len - keep).collect();
    format!("{}{}", DETAIL_ELLIPSIS, tail)
}
