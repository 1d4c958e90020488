//! Introspection bridge: state, registry count, name and stack usage
//!
//! Nothing here is cached. Every answer is read from the host thread control
//! block at the time of the call.

use crate::adapter::TaskAdapter;
use crate::config::Capabilities;
use crate::error::{Error, Result};
use crate::host::{HostKernel, TaskHandle};
use crate::stack;
use taskshim_common::{translate_status, TaskState, UBaseType};
use tracing::trace;

impl<H: HostKernel> TaskAdapter<H> {
    /// Current state of a task; the null handle queries the caller.
    pub fn state(&self, handle: TaskHandle) -> Result<TaskState> {
        const OP: &str = "state";
        self.require(OP, Capabilities::STATE_QUERY)?;

        let thread = self.resolve(OP, handle)?;
        let info = self.thread_info(OP, thread)?;

        translate_status(info.status).map_err(|unmapped| {
            self.fault(OP, Error::UnmappedState(unmapped.0))
        })
    }

    /// Live number of threads in the host registry.
    ///
    /// Counts every host thread, including ones the adapter did not create,
    /// so it can exceed [`tasks_created`](Self::tasks_created).
    pub fn number_of_tasks(&self) -> UBaseType {
        let mut count: UBaseType = 0;

        self.host().enter_critical();
        self.host().for_each_thread(&mut |_| count += 1);
        self.host().exit_critical();

        trace!(count, "registry walk");
        count
    }

    /// Name of a task; the null handle queries the caller.
    pub fn task_name(&self, handle: TaskHandle) -> Result<String> {
        const OP: &str = "task_name";
        self.require(OP, Capabilities::TASK_NAME)?;

        let thread = self.resolve(OP, handle)?;
        Ok(self.thread_info(OP, thread)?.name)
    }

    /// Minimum free stack ever observed, in words.
    pub fn stack_high_water_mark(&self, handle: TaskHandle) -> Result<UBaseType> {
        const OP: &str = "stack_high_water_mark";
        self.require(OP, Capabilities::STACK_HIGH_WATER_MARK)?;

        let thread = self.resolve(OP, handle)?;
        let growth = self.config().stack_growth;
        let fill = self.config().stack_fill_byte;

        let words = self
            .host()
            .with_stack(thread, |s| stack::free_words(s, growth, fill))
            .ok_or_else(|| self.fault(OP, Error::UnknownThread(thread.get())))?;

        Ok(UBaseType::try_from(words).unwrap_or(UBaseType::MAX))
    }

    /// Address of the stack end that overflows first.
    pub fn bottom_of_stack(&self, handle: TaskHandle) -> Result<usize> {
        const OP: &str = "bottom_of_stack";
        self.require(OP, Capabilities::STACK_HIGH_WATER_MARK)?;

        let thread = self.resolve(OP, handle)?;
        let info = self.thread_info(OP, thread)?;
        Ok(stack::bottom_of_stack(
            info.stack_addr,
            info.stack_size,
            self.config().stack_growth,
        ))
    }
}
