//! Error types for the taskshim adapter

use crate::config::Capabilities;
use thiserror::Error;

/// Alias for `Result<T, Error>`
pub type Result<T> = std::result::Result<T, Error>;

/// Adapter errors
///
/// `CreateFailed` is the only recoverable condition. Every other variant is a
/// fatal condition: it has already been passed through the
/// [`FaultReporter`](crate::fault::FaultReporter) by the time a caller sees it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Host kernel returned no thread object
    #[error("host thread creation failed for task {0:?}")]
    CreateFailed(String),

    /// Task created without an entry function
    #[error("task entry function is null")]
    NullEntry,

    /// Null handle given and the host reports no current thread
    #[error("no current task to resolve a null handle against")]
    NoCurrentTask,

    /// Handle refers to nothing the host knows about
    #[error("handle does not refer to a host thread: {0}")]
    UnknownThread(u32),

    /// Host status code outside the translation table
    #[error("host thread status {0:#04x} has no donor task state")]
    UnmappedState(u8),

    /// Donor priority not below the configured maximum
    #[error("priority {priority} out of range (max {max})")]
    PriorityOutOfRange { priority: u32, max: u32 },

    /// Resume called with the null handle
    #[error("cannot resume the calling task")]
    ResumeCurrent,

    /// Scheduler-level operation before the scheduler was started
    #[error("{0} called before the scheduler was started")]
    SchedulerNotStarted(&'static str),

    /// Critical section left with none open
    #[error("exit_critical without a matching enter_critical")]
    UnbalancedCritical,

    /// Critical section entered before scheduler start and left after it
    #[error("critical section entered before scheduler start was exited after it")]
    CriticalAcrossStart,

    /// Optional operation compiled out of this configuration
    #[error("operation requires disabled capability {0:?}")]
    CapabilityDisabled(Capabilities),

    /// Configuration rejected by the builder
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
