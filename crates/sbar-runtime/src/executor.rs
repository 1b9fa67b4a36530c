#![forbid(unsafe_code)]

//! Executors that run event handlers on the loop thread.
//!
//! Timer tasks are always invoked directly by the loop so that firing order
//! stays under its control; only event handler invocation goes through an
//! executor.

use std::panic::{self, AssertUnwindSafe};

use crate::error::{TaskError, TaskResult, panic_message};

/// Runs one handler invocation.
pub trait Executor {
    fn execute(&mut self, job: &mut dyn FnMut() -> TaskResult) -> TaskResult;
}

/// Calls the handler directly. Panics unwind through the loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&mut self, job: &mut dyn FnMut() -> TaskResult) -> TaskResult {
        job()
    }
}

/// Calls the handler and converts a panic into a [`TaskError`], which the
/// loop's error policy then handles like any other failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatchUnwindExecutor;

impl Executor for CatchUnwindExecutor {
    fn execute(&mut self, job: &mut dyn FnMut() -> TaskResult) -> TaskResult {
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(result) => result,
            Err(payload) => Err(TaskError::msg(format!(
                "handler panicked: {}",
                panic_message(&*payload)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_passes_result_through() {
        let mut calls = 0;
        let mut job = || -> TaskResult {
            calls += 1;
            Err(TaskError::msg("nope"))
        };
        let err = InlineExecutor.execute(&mut job).unwrap_err();
        assert_eq!(err.message(), "nope");
        assert_eq!(calls, 1);
    }

    #[test]
    fn catch_unwind_converts_panics() {
        let mut job = || -> TaskResult { panic!("kaboom") };
        let err = CatchUnwindExecutor.execute(&mut job).unwrap_err();
        assert_eq!(err.message(), "handler panicked: kaboom");
    }

    #[test]
    fn catch_unwind_passes_success() {
        let mut job = || -> TaskResult { Ok(()) };
        assert!(CatchUnwindExecutor.execute(&mut job).is_ok());
    }
}
