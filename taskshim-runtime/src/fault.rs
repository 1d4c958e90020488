//! Fatal-condition reporting
//!
//! The donor API has an assertion macro that traps in development builds. The
//! adapter routes the same conditions through a [`FaultReporter`]:
//! - Always logged at `error!`
//! - Handed to an optional hook (test harnesses use it to intercept reports)
//! - Then either halts (panic) or returns the error to the caller
//!
//! A fault is never dropped on the floor; with [`FaultAction::Log`] the
//! operation still fails with the error.

use crate::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Callback invoked for every fatal condition before the action is applied.
pub type FaultHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// What to do after a fatal condition has been logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    /// Panic, the equivalent of a trapping assertion
    Halt,
    /// Log and return the error
    Log,
}

impl Default for FaultAction {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            FaultAction::Halt
        } else {
            FaultAction::Log
        }
    }
}

/// Reports fatal conditions according to the configured action.
#[derive(Clone, Default)]
pub struct FaultReporter {
    action: FaultAction,
    hook: Option<FaultHook>,
}

impl FaultReporter {
    pub fn new(action: FaultAction, hook: Option<FaultHook>) -> Self {
        Self { action, hook }
    }

    pub fn action(&self) -> FaultAction {
        self.action
    }

    /// Report a fatal condition raised by `op`.
    ///
    /// Returns the error so call sites can write `return Err(self.fault(..))`.
    ///
    /// # Panics
    /// Panics when the action is [`FaultAction::Halt`].
    #[track_caller]
    pub fn report(&self, op: &'static str, err: Error) -> Error {
        error!(op, %err, "fatal adapter condition");

        if let Some(hook) = &self.hook {
            hook(&err);
        }

        if self.action == FaultAction::Halt {
            panic!("{op}: {err}");
        }

        err
    }
}

impl fmt::Debug for FaultReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultReporter")
            .field("action", &self.action)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
