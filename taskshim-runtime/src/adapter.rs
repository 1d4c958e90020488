// SPDX-License-Identifier: GPL-2.0-only
// Copyright (C) 2024 Ankit Kumar Pandey <ankitkpandey1@gmail.com>

//! # Task Adapter
//!
//! [`TaskAdapter`] is the single entry point donor-API callers go through.
//! It owns the configuration, the scheduler bookkeeping and a host kernel,
//! and its operations are grouped by facet:
//!
//! - Lifecycle: `lifecycle.rs`
//! - Tick and delay: `tick.rs`
//! - Critical sections: `critical.rs`
//! - Introspection: `introspect.rs`, `report.rs`
//!
//! Every operation that accepts a [`TaskHandle`] resolves the null handle to
//! the calling task through [`TaskAdapter::resolve`].

use crate::config::{AdapterConfig, Capabilities};
use crate::context::SchedulerContext;
use crate::error::{Error, Result};
use crate::fault::FaultReporter;
use crate::host::{HostKernel, TaskHandle, ThreadId, ThreadInfo};
use crate::priority::PriorityTranslator;
use tracing::{debug, info};

pub struct TaskAdapter<H: HostKernel> {
    host: H,
    config: AdapterConfig,
    priorities: PriorityTranslator,
    context: SchedulerContext,
    faults: FaultReporter,
}

impl<H: HostKernel> TaskAdapter<H> {
    /// Create an adapter over `host`.
    ///
    /// The configuration is validated again here so a hand-built
    /// [`AdapterConfig`] cannot bypass the builder's checks.
    pub fn new(host: H, config: AdapterConfig) -> Result<Self> {
        config.validate()?;
        let priorities = PriorityTranslator::new(config.max_priorities, config.reversal_base)?;

        debug!(?config, "task adapter created");

        Ok(Self {
            host,
            priorities,
            faults: FaultReporter::new(config.fault_action, config.fault_hook.clone()),
            context: SchedulerContext::new(),
            config,
        })
    }

    /// Create an adapter with the default configuration.
    pub fn with_defaults(host: H) -> Result<Self> {
        Self::new(host, AdapterConfig::default())
    }

    /// Get the host kernel
    #[inline]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Get the adapter configuration
    #[inline]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    #[inline]
    pub fn priorities(&self) -> &PriorityTranslator {
        &self.priorities
    }

    #[inline]
    pub fn context(&self) -> &SchedulerContext {
        &self.context
    }

    /// Declare the scheduler started.
    ///
    /// The host scheduler is already running by the time donor code calls
    /// this; the call only opens the gate for scheduler-level locking.
    pub fn start_scheduler(&self) {
        if self.context.mark_running() {
            info!("scheduler marked running");
        } else {
            debug!("start_scheduler called again; ignored");
        }
    }

    #[inline]
    pub fn is_scheduler_running(&self) -> bool {
        self.context.is_running()
    }

    /// Number of tasks created through this adapter.
    ///
    /// Bookkeeping only; see [`number_of_tasks`](Self::number_of_tasks) for
    /// the live count.
    pub fn tasks_created(&self) -> u32 {
        self.context.tasks_created()
    }

    /// Report a fatal condition and return it.
    #[track_caller]
    pub(crate) fn fault(&self, op: &'static str, err: Error) -> Error {
        self.faults.report(op, err)
    }

    /// Fail with `CapabilityDisabled` unless `caps` are all enabled.
    #[track_caller]
    pub(crate) fn require(&self, op: &'static str, caps: Capabilities) -> Result<()> {
        if self.config.capabilities.contains(caps) {
            Ok(())
        } else {
            let missing = caps - self.config.capabilities;
            Err(self.fault(op, Error::CapabilityDisabled(missing)))
        }
    }

    /// Resolve a handle, mapping the null handle to the calling task.
    #[track_caller]
    pub(crate) fn resolve(&self, op: &'static str, handle: TaskHandle) -> Result<ThreadId> {
        match handle.thread().or_else(|| self.host.thread_self()) {
            Some(thread) => Ok(thread),
            None => Err(self.fault(op, Error::NoCurrentTask)),
        }
    }

    /// Read a thread's control block; an unknown thread is fatal.
    #[track_caller]
    pub(crate) fn thread_info(&self, op: &'static str, thread: ThreadId) -> Result<ThreadInfo> {
        self.host
            .thread_info(thread)
            .ok_or_else(|| self.fault(op, Error::UnknownThread(thread.get())))
    }
}

impl<H: HostKernel> std::fmt::Debug for TaskAdapter<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskAdapter")
            .field("config", &self.config)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Builder;
    use crate::fault::FaultAction;
    use crate::sim::SimKernel;

    fn adapter() -> TaskAdapter<SimKernel> {
        let config = Builder::new().fault_action(FaultAction::Log).build().unwrap();
        TaskAdapter::new(SimKernel::new(), config).unwrap()
    }

    #[test]
    fn test_resolve_prefers_explicit_handle() {
        let adapter = adapter();
        let main = adapter.host().spawn_current("main", 10);
        let other = ThreadId::new(42).unwrap();

        assert_eq!(adapter.resolve("t", TaskHandle::from(other)).unwrap(), other);
        assert_eq!(adapter.resolve("t", TaskHandle::CURRENT).unwrap(), main);
    }

    #[test]
    fn test_resolve_null_without_current_task() {
        let adapter = adapter();
        assert_eq!(
            adapter.resolve("t", TaskHandle::CURRENT),
            Err(Error::NoCurrentTask)
        );
    }

    #[test]
    fn test_require_reports_missing_bits() {
        let config = Builder::new()
            .without(Capabilities::DELETE)
            .fault_action(FaultAction::Log)
            .build()
            .unwrap();
        let adapter = TaskAdapter::new(SimKernel::new(), config).unwrap();

        assert!(adapter.require("delay", Capabilities::DELAY).is_ok());
        assert_eq!(
            adapter.require("delete", Capabilities::DELETE | Capabilities::DELAY),
            Err(Error::CapabilityDisabled(Capabilities::DELETE))
        );
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let config = AdapterConfig {
            reversal_base: 4,
            ..AdapterConfig::default()
        };
        assert!(matches!(
            TaskAdapter::new(SimKernel::new(), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_start_scheduler_once() {
        let adapter = adapter();
        assert!(!adapter.is_scheduler_running());
        adapter.start_scheduler();
        adapter.start_scheduler();
        assert!(adapter.is_scheduler_running());
    }
}
