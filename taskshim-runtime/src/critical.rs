//! Critical-section bridge
//!
//! Two levels of exclusion are exposed to donor code:
//! - `suspend_all` / `resume_all`: scheduler-level, one host scheduler-lock
//!   acquire/release per call. The host tracks nesting.
//! - `enter_critical` / `exit_critical`: port-level mutual exclusion, plus
//!   the scheduler lock once the scheduler is running.
//!
//! Both are gated on the scheduler-running flag. Suspending scheduling before
//! it exists is a caller error and is reported; port-level critical sections
//! are legal during initialisation and simply skip the scheduler lock.
//!
//! # Guards
//!
//! [`SchedulerSuspendGuard`] and [`CriticalGuard`] wrap the pairs for Rust
//! callers. They are `!Send` and `!Sync`: the lock belongs to the context
//! that took it and must be released there.

use crate::adapter::TaskAdapter;
use crate::config::Capabilities;
use crate::error::{Error, Result};
use crate::host::HostKernel;
use std::marker::PhantomData;
use taskshim_common::SchedulerState;
use tracing::{debug, trace};

impl<H: HostKernel> TaskAdapter<H> {
    /// Suspend scheduling (nestable).
    pub fn suspend_all(&self) -> Result<()> {
        if !self.is_scheduler_running() {
            return Err(self.fault("suspend_all", Error::SchedulerNotStarted("suspend_all")));
        }

        trace!(level = self.host().critical_level(), "suspend all");
        self.host().enter_critical();
        Ok(())
    }

    /// Undo one [`suspend_all`](Self::suspend_all).
    ///
    /// Returns `true`: the host reschedules on release itself, so callers
    /// never need to yield afterwards, but the donor contract reports that a
    /// yield may have happened.
    pub fn resume_all(&self) -> Result<bool> {
        if !self.is_scheduler_running() {
            return Err(self.fault("resume_all", Error::SchedulerNotStarted("resume_all")));
        }

        trace!(level = self.host().critical_level(), "resume all");
        self.host().exit_critical();
        Ok(true)
    }

    /// Enter a port-level critical section.
    pub fn enter_critical(&self) -> Result<()> {
        self.require("enter_critical", Capabilities::CRITICAL_NESTING_IN_TCB)?;
        self.lock_critical();
        Ok(())
    }

    /// Leave a port-level critical section.
    ///
    /// Releases exactly what the matching [`enter_critical`](Self::enter_critical)
    /// took. Leaving with nothing open, or leaving a section entered before
    /// scheduler start once the scheduler runs, is reported and never
    /// releases a scheduler lock that was not taken.
    pub fn exit_critical(&self) -> Result<()> {
        const OP: &str = "exit_critical";
        self.require(OP, Capabilities::CRITICAL_NESTING_IN_TCB)?;

        let Some(scheduler_locked) = self.context().pop_critical() else {
            return Err(self.fault(OP, Error::UnbalancedCritical));
        };

        if !scheduler_locked && self.is_scheduler_running() {
            self.host().port_unlock();
            return Err(self.fault(OP, Error::CriticalAcrossStart));
        }

        self.unlock_critical(scheduler_locked);
        Ok(())
    }

    /// Returns whether the scheduler lock was taken.
    fn lock_critical(&self) -> bool {
        self.host().port_lock();

        let running = self.is_scheduler_running();
        if running {
            self.host().enter_critical();
        } else {
            debug!("critical section before scheduler start; scheduler lock skipped");
        }
        self.context().push_critical(running);
        running
    }

    fn unlock_critical(&self, scheduler_locked: bool) {
        self.host().port_unlock();

        if scheduler_locked {
            self.host().exit_critical();
        }
    }

    /// Scheduler state as the donor API reports it.
    ///
    /// Interrupt context never counts as running.
    pub fn scheduler_state(&self) -> Result<SchedulerState> {
        self.require("scheduler_state", Capabilities::SCHEDULER_STATE)?;

        if self.host().in_interrupt() || !self.is_scheduler_running() {
            return Ok(SchedulerState::NotStarted);
        }

        if self.host().critical_level() == 0 {
            Ok(SchedulerState::Running)
        } else {
            Ok(SchedulerState::Suspended)
        }
    }

    /// Suspend scheduling until the returned guard is dropped.
    pub fn suspend_scheduler(&self) -> Result<SchedulerSuspendGuard<'_, H>> {
        self.suspend_all()?;
        Ok(SchedulerSuspendGuard {
            adapter: self,
            _marker: PhantomData,
        })
    }

    /// Enter a port-level critical section until the returned guard is
    /// dropped.
    pub fn critical_section(&self) -> Result<CriticalGuard<'_, H>> {
        self.require("critical_section", Capabilities::CRITICAL_NESTING_IN_TCB)?;
        let scheduler_locked = self.lock_critical();
        Ok(CriticalGuard {
            adapter: self,
            scheduler_locked,
            _marker: PhantomData,
        })
    }
}

/// RAII guard for a scheduler suspension
pub struct SchedulerSuspendGuard<'a, H: HostKernel> {
    adapter: &'a TaskAdapter<H>,
    /// *const () is !Send and !Sync
    _marker: PhantomData<*const ()>,
}

impl<H: HostKernel> Drop for SchedulerSuspendGuard<'_, H> {
    fn drop(&mut self) {
        trace!(level = self.adapter.host().critical_level(), "resume all (guard)");
        self.adapter.host().exit_critical();
    }
}

/// RAII guard for a port-level critical section
///
/// Remembers whether it took the scheduler lock, so a section opened before
/// scheduler start and closed after it stays balanced.
pub struct CriticalGuard<'a, H: HostKernel> {
    adapter: &'a TaskAdapter<H>,
    scheduler_locked: bool,
    _marker: PhantomData<*const ()>,
}

impl<H: HostKernel> Drop for CriticalGuard<'_, H> {
    fn drop(&mut self) {
        self.adapter.context().pop_critical();
        self.adapter.unlock_critical(self.scheduler_locked);
    }
}
