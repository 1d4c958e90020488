//! Process-wide scheduler bookkeeping
//!
//! The donor API keeps two pieces of global state: a "scheduler running" flag
//! and a count of created tasks. Here they live in one explicitly constructed
//! context owned by the adapter. The flag is written once (by
//! `start_scheduler`) and only read afterwards.
//!
//! It also tracks open port-level critical sections, split by whether they
//! took the scheduler lock, so an exit is always paired with the lock its
//! enter actually took.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct SchedulerContext {
    running: AtomicBool,
    tasks_created: AtomicU32,
    critical_nesting: AtomicU32,
    /// Open critical sections entered before the scheduler was running
    critical_unlocked: AtomicU32,
}

impl SchedulerContext {
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            tasks_created: AtomicU32::new(0),
            critical_nesting: AtomicU32::new(0),
            critical_unlocked: AtomicU32::new(0),
        }
    }

    /// Mark the scheduler started. Returns `false` if it already was.
    pub fn mark_running(&self) -> bool {
        !self.running.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn record_created(&self) -> u32 {
        self.tasks_created.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn tasks_created(&self) -> u32 {
        self.tasks_created.load(Ordering::Relaxed)
    }

    /// Record a critical section being entered.
    pub fn push_critical(&self, scheduler_locked: bool) {
        if !scheduler_locked {
            self.critical_unlocked.fetch_add(1, Ordering::AcqRel);
        }
        self.critical_nesting.fetch_add(1, Ordering::AcqRel);
    }

    /// Record the innermost critical section being left.
    ///
    /// Returns whether it took the scheduler lock, or `None` if no critical
    /// section is open. Sections entered after scheduler start always nest
    /// inside the ones entered before it.
    pub fn pop_critical(&self) -> Option<bool> {
        let nesting = self.critical_nesting.load(Ordering::Acquire);
        if nesting == 0 {
            return None;
        }
        let unlocked = self.critical_unlocked.load(Ordering::Acquire);
        let scheduler_locked = nesting > unlocked;

        self.critical_nesting.fetch_sub(1, Ordering::AcqRel);
        if !scheduler_locked {
            self.critical_unlocked.fetch_sub(1, Ordering::AcqRel);
        }
        Some(scheduler_locked)
    }

    #[inline]
    pub fn critical_nesting(&self) -> u32 {
        self.critical_nesting.load(Ordering::Acquire)
    }
}
