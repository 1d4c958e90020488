// SPDX-License-Identifier: GPL-2.0-only
// Copyright (C) 2024 Ankit Kumar Pandey <ankitkpandey1@gmail.com>

//! # Host Kernel Interface
//!
//! This module defines the native thread interface the adapter drives. The
//! host kernel owns scheduling, stacks, the object table and the tick source;
//! the adapter only calls through this trait.
//!
//! ## Implementations
//!
//! - A port binds the trait to the real kernel's C API
//! - [`SimKernel`](crate::sim::SimKernel): deterministic in-process host for
//!   tests and tools

use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroU32;
use taskshim_common::TickType;

/// Donor task entry point.
pub type TaskFunction = extern "C" fn(*mut c_void);

/// Opaque argument handed to a task's entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskArgument(pub *mut c_void);

// The adapter never dereferences the argument; it only carries it to the host.
unsafe impl Send for TaskArgument {}
unsafe impl Sync for TaskArgument {}

impl Default for TaskArgument {
    fn default() -> Self {
        Self(std::ptr::null_mut())
    }
}

/// Host thread object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(NonZeroU32);

impl ThreadId {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Donor task handle.
///
/// Wraps a host thread reference without owning it. The null handle
/// ([`TaskHandle::CURRENT`]) stands for "the calling task" in every operation
/// that accepts a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TaskHandle(Option<ThreadId>);

impl TaskHandle {
    /// The null handle
    pub const CURRENT: TaskHandle = TaskHandle(None);

    pub fn from_thread(thread: ThreadId) -> Self {
        Self(Some(thread))
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_none()
    }

    #[inline]
    pub fn thread(self) -> Option<ThreadId> {
        self.0
    }
}

impl From<ThreadId> for TaskHandle {
    fn from(thread: ThreadId) -> Self {
        Self::from_thread(thread)
    }
}

/// Parameters for a host thread creation request.
#[derive(Debug, Clone)]
pub struct ThreadSpec {
    pub name: String,
    pub entry: TaskFunction,
    pub argument: TaskArgument,
    /// Stack size in bytes
    pub stack_size: usize,
    /// Host priority (lower value = more important)
    pub priority: u8,
    /// Round-robin quantum in ticks
    pub time_slice: TickType,
}

/// Snapshot of a host thread control block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub name: String,
    /// Raw status byte, including flag bits
    pub status: u8,
    /// Priority the thread was configured with
    pub init_priority: u8,
    /// Effective priority, possibly raised by inheritance
    pub current_priority: u8,
    /// Lowest address of the stack region
    pub stack_addr: usize,
    /// Stack region length in bytes
    pub stack_size: usize,
}

/// Host kernel native thread interface
///
/// Each method corresponds to one host primitive. Implementations must be
/// callable from any thread of the host; ISR-safe methods are noted.
pub trait HostKernel {
    /// Create a thread. `None` when the host cannot allocate it.
    fn thread_create(&self, spec: ThreadSpec) -> Option<ThreadId>;

    /// Make a created thread runnable.
    fn thread_startup(&self, thread: ThreadId);

    fn thread_delete(&self, thread: ThreadId);

    /// The thread currently executing, if any.
    fn thread_self(&self) -> Option<ThreadId>;

    fn thread_suspend(&self, thread: ThreadId);

    /// Make a suspended thread ready. ISR-safe.
    fn thread_resume(&self, thread: ThreadId);

    /// Block the calling thread for `ticks`.
    fn thread_delay(&self, ticks: TickType);

    /// Priority-change control request.
    fn thread_change_priority(&self, thread: ThreadId, priority: u8);

    /// Read a thread's control block. ISR-safe.
    fn thread_info(&self, thread: ThreadId) -> Option<ThreadInfo>;

    /// Borrow a thread's stack memory, lowest address first.
    fn with_stack<R>(&self, thread: ThreadId, f: impl FnOnce(&[u8]) -> R) -> Option<R>;

    /// Walk the live thread registry. Callers hold the scheduler lock.
    fn for_each_thread(&self, f: &mut dyn FnMut(ThreadId));

    /// Reschedule now.
    fn schedule(&self);

    /// Read the tick counter. ISR-safe.
    fn tick_get(&self) -> TickType;

    fn tick_set(&self, tick: TickType);

    /// Advance the tick counter by one, running tick processing.
    fn tick_increase(&self);

    /// Acquire the nestable scheduler lock.
    fn enter_critical(&self);

    fn exit_critical(&self);

    /// Current scheduler lock nesting depth.
    fn critical_level(&self) -> u16;

    /// Whether the caller is executing in interrupt/exception context.
    fn in_interrupt(&self) -> bool;

    /// Acquire the port-level mutual exclusion primitive.
    fn port_lock(&self);

    fn port_unlock(&self);
}
