//! Lifecycle bridge: create, delete, suspend, resume and priority control
//!
//! Donor tasks map one-to-one onto host threads. A task is started as soon as
//! its thread exists; there is no created-but-not-started state on the donor
//! side. Every operation that changes runnability forces a host reschedule so
//! the effect is visible before the caller continues.

use crate::adapter::TaskAdapter;
use crate::config::Capabilities;
use crate::error::{Error, Result};
use crate::host::{HostKernel, TaskArgument, TaskFunction, TaskHandle, ThreadSpec};
use std::mem::size_of;
use taskshim_common::{BaseType, MemoryRegion, StackType, UBaseType, PD_FAIL, PD_PASS};
use tracing::{debug, trace, warn};

/// Task creation parameters, as the donor `create` call receives them.
#[derive(Debug, Clone)]
pub struct TaskParams<'a> {
    /// Entry point; `None` is the donor's null function pointer
    pub entry: Option<TaskFunction>,
    pub name: &'a str,
    /// Requested stack depth in words
    pub stack_depth: u16,
    pub argument: TaskArgument,
    /// Donor priority
    pub priority: UBaseType,
    /// MPU regions; accepted and ignored
    pub regions: Option<&'a [MemoryRegion]>,
}

impl<'a> TaskParams<'a> {
    pub fn new(
        entry: Option<TaskFunction>,
        name: &'a str,
        stack_depth: u16,
        priority: UBaseType,
    ) -> Self {
        Self {
            entry,
            name,
            stack_depth,
            argument: TaskArgument::default(),
            priority,
            regions: None,
        }
    }

    pub fn argument(mut self, argument: TaskArgument) -> Self {
        self.argument = argument;
        self
    }

    pub fn regions(mut self, regions: &'a [MemoryRegion]) -> Self {
        self.regions = Some(regions);
        self
    }
}

impl<H: HostKernel> TaskAdapter<H> {
    /// Host stack size for a donor stack depth.
    ///
    /// The donor counts words; the host wants bytes and needs room for its
    /// own frame and bookkeeping on top of what the task asked for.
    pub fn host_stack_size(&self, stack_depth: u16) -> usize {
        usize::from(stack_depth) * size_of::<StackType>() + self.config().stack_overhead
    }

    /// Create and start a task.
    ///
    /// Host allocation failure is the one recoverable failure and comes back
    /// as [`Error::CreateFailed`]. A missing entry point or an out-of-range
    /// priority is fatal.
    pub fn spawn(&self, params: TaskParams<'_>) -> Result<TaskHandle> {
        const OP: &str = "create";

        let Some(entry) = params.entry else {
            return Err(self.fault(OP, Error::NullEntry));
        };

        let priority = self
            .priorities()
            .to_host(params.priority)
            .map_err(|e| self.fault(OP, e))?;
        let stack_size = self.host_stack_size(params.stack_depth);

        if let Some(regions) = params.regions {
            debug!(name = params.name, count = regions.len(), "MPU regions ignored");
        }

        debug!(
            name = params.name,
            stack_size,
            priority,
            raw = params.priority,
            "task create"
        );

        let spec = ThreadSpec {
            name: params.name.to_string(),
            entry,
            argument: params.argument,
            stack_size,
            priority,
            time_slice: self.config().time_slice,
        };

        match self.host().thread_create(spec) {
            Some(thread) => {
                self.host().thread_startup(thread);
                let count = self.context().record_created();
                trace!(%thread, count, "task started");
                Ok(TaskHandle::from(thread))
            }
            None => {
                warn!(name = params.name, "host thread creation failed");
                Err(Error::CreateFailed(params.name.to_string()))
            }
        }
    }

    /// Donor-shaped create: returns `PD_PASS`/`PD_FAIL` and writes the handle
    /// (null on failure) to `created` when one is supplied.
    pub fn create(&self, params: TaskParams<'_>, created: Option<&mut TaskHandle>) -> BaseType {
        let result = self.spawn(params);

        if let Some(out) = created {
            *out = result.as_ref().map_or(TaskHandle::CURRENT, |h| *h);
        }

        if result.is_ok() {
            PD_PASS
        } else {
            PD_FAIL
        }
    }

    /// Delete a task; the null handle deletes the caller.
    pub fn delete(&self, handle: TaskHandle) -> Result<()> {
        const OP: &str = "delete";
        self.require(OP, Capabilities::DELETE)?;

        let thread = self.resolve(OP, handle)?;
        debug!(%thread, "task delete");

        self.host().thread_delete(thread);
        self.host().schedule();
        Ok(())
    }

    /// Suspend a task; the null handle suspends the caller.
    pub fn suspend(&self, handle: TaskHandle) -> Result<()> {
        const OP: &str = "suspend";
        self.require(OP, Capabilities::SUSPEND)?;

        let thread = self.resolve(OP, handle)?;
        debug!(%thread, "task suspend");

        self.host().thread_suspend(thread);
        self.host().schedule();
        Ok(())
    }

    /// Resume a suspended task. The null handle is rejected: a suspended task
    /// cannot be the one asking.
    pub fn resume(&self, handle: TaskHandle) -> Result<()> {
        const OP: &str = "resume";
        self.require(OP, Capabilities::SUSPEND)?;

        let Some(thread) = handle.thread() else {
            return Err(self.fault(OP, Error::ResumeCurrent));
        };
        debug!(%thread, "task resume");

        self.host().thread_resume(thread);
        self.host().schedule();
        Ok(())
    }

    /// Resume from interrupt context.
    ///
    /// Returns whether a context switch is required, which is always the case
    /// here.
    pub fn resume_from_isr(&self, handle: TaskHandle) -> Result<bool> {
        const OP: &str = "resume_from_isr";
        self.require(OP, Capabilities::SUSPEND | Capabilities::RESUME_FROM_ISR)?;

        let Some(thread) = handle.thread() else {
            return Err(self.fault(OP, Error::ResumeCurrent));
        };
        trace!(%thread, "task resume from ISR");

        self.host().thread_resume(thread);
        self.host().schedule();
        Ok(true)
    }

    /// Change a task's priority; the null handle targets the caller.
    pub fn priority_set(&self, handle: TaskHandle, priority: UBaseType) -> Result<()> {
        const OP: &str = "priority_set";
        self.require(OP, Capabilities::PRIORITY_SET)?;

        let host_priority = self
            .priorities()
            .to_host(priority)
            .map_err(|e| self.fault(OP, e))?;
        let thread = self.resolve(OP, handle)?;
        debug!(%thread, priority, host_priority, "set priority");

        self.host().thread_change_priority(thread, host_priority);
        Ok(())
    }

    /// A task's configured priority.
    ///
    /// Reads the host's initial priority, so a temporary inheritance boost is
    /// not reported.
    pub fn priority_get(&self, handle: TaskHandle) -> Result<UBaseType> {
        self.read_priority("priority_get", handle)
    }

    /// Interrupt-safe [`priority_get`](Self::priority_get).
    pub fn priority_get_from_isr(&self, handle: TaskHandle) -> Result<UBaseType> {
        self.read_priority("priority_get_from_isr", handle)
    }

    fn read_priority(&self, op: &'static str, handle: TaskHandle) -> Result<UBaseType> {
        self.require(op, Capabilities::PRIORITY_GET)?;

        let thread = self.resolve(op, handle)?;
        let info = self.thread_info(op, thread)?;
        let priority = self.priorities().to_donor(info.init_priority);
        trace!(%thread, priority, name = %info.name, "get priority");

        Ok(priority)
    }

    /// Handle of the calling task, or the null handle if there is none.
    pub fn current_task_handle(&self) -> TaskHandle {
        self.host()
            .thread_self()
            .map_or(TaskHandle::CURRENT, TaskHandle::from)
    }
}
