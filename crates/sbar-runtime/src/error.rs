#![forbid(unsafe_code)]

//! Error types for tasks, handlers, and the loop itself.

use std::error::Error;
use std::fmt;
use std::io;

use sbar_core::event::EventKind;

use crate::scheduler::{HandlerId, TaskId};

/// Failure reported by a task, an event handler, or a cross-thread job.
#[derive(Debug)]
pub struct TaskError {
    message: String,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

/// Result type of every task and handler.
pub type TaskResult = Result<(), TaskError>;

impl TaskError {
    /// An error described only by a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, using its `Display` as the message.
    pub fn from_error<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Wrap an underlying error with extra context.
    pub fn context<E: Error + Send + Sync + 'static>(message: impl Into<String>, err: E) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(err)),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) if source.to_string() != self.message => {
                write!(f, "{}: {}", self.message, source)
            }
            _ => f.write_str(&self.message),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

impl From<io::Error> for TaskError {
    fn from(err: io::Error) -> Self {
        Self::from_error(err)
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

/// Error surfaced by [`EventLoop::run`](crate::EventLoop::run) under
/// [`ErrorPolicy::StopAndPropagate`].
#[derive(Debug)]
pub enum LoopError {
    /// A scheduled task returned an error.
    Task { id: TaskId, source: TaskError },
    /// An event handler returned an error.
    Handler {
        id: HandlerId,
        kind: EventKind,
        source: TaskError,
    },
}

impl LoopError {
    /// The underlying task error.
    #[must_use]
    pub fn task_error(&self) -> &TaskError {
        match self {
            Self::Task { source, .. } | Self::Handler { source, .. } => source,
        }
    }
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task { id, source } => write!(f, "task {id} failed: {source}"),
            Self::Handler { id, kind, source } => {
                write!(f, "handler {id} for {kind:?} failed: {source}")
            }
        }
    }
}

impl Error for LoopError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.task_error())
    }
}

/// What the loop does when a task or handler fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Fire the stop event, drain it, and return the error from `run`.
    #[default]
    StopAndPropagate,
    /// Log the error and keep going.
    LogAndContinue,
}

/// Turn a panic payload into a readable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
