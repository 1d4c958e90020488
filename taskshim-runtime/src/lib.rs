// SPDX-License-Identifier: GPL-2.0-only
// Copyright (C) 2024 Ankit Kumar Pandey <ankitkpandey1@gmail.com>

//! # taskshim runtime
//!
//! A task-compatibility adapter: code written against a FreeRTOS-style task
//! API runs unchanged on top of a different RTOS kernel.
//!
//! The adapter owns no scheduler of its own. Every donor call is translated
//! into one or more calls on a [`HostKernel`]; the host's thread objects are
//! the single source of truth for task state.
//!
//! ## Key Components
//!
//! - **TaskAdapter**: the donor API surface, generic over the host kernel
//! - **PriorityTranslator**: reversed priority scales (donor: bigger is more
//!   important; host: smaller is more important)
//! - **Critical sections**: scheduler suspension and port-level locking, with
//!   RAII guards for Rust callers
//! - **FaultReporter**: logs fatal conditions, runs the installed hook, then
//!   halts or returns the error
//! - **SimKernel**: deterministic simulated host for tests and tools
//!
//! ## Usage
//!
//! ```rust
//! use std::ffi::c_void;
//! use taskshim_runtime::{SimKernel, TaskAdapter, TaskParams};
//!
//! extern "C" fn blink(_: *mut c_void) {}
//!
//! let adapter = TaskAdapter::with_defaults(SimKernel::new()).unwrap();
//! let task = adapter
//!     .spawn(TaskParams::new(Some(blink), "blink", 128, 3))
//!     .unwrap();
//! adapter.start_scheduler();
//!
//! let mut last_wake = adapter.tick_count();
//! adapter.delay_until(&mut last_wake, 10).unwrap();
//! assert_eq!(last_wake, 10);
//! assert_eq!(adapter.priority_get(task).unwrap(), 3);
//! ```
//!
//! ## Critical Sections
//!
//! ```rust
//! use taskshim_runtime::{SimKernel, TaskAdapter};
//!
//! let adapter = TaskAdapter::with_defaults(SimKernel::new()).unwrap();
//! adapter.start_scheduler();
//! {
//!     let _guard = adapter.suspend_scheduler().unwrap();
//!     // No context switch until the guard is dropped
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod context;
pub mod critical;
pub mod error;
pub mod fault;
pub mod host;
pub mod introspect;
pub mod lifecycle;
pub mod priority;
pub mod report;
pub mod sim;
pub mod stack;
pub mod tick;

#[cfg(test)]
mod testing;

pub use adapter::TaskAdapter;
pub use config::{AdapterConfig, Builder, Capabilities};
pub use critical::{CriticalGuard, SchedulerSuspendGuard};
pub use error::{Error, Result};
pub use fault::{FaultAction, FaultHook};
pub use host::{HostKernel, TaskArgument, TaskFunction, TaskHandle, ThreadId};
pub use lifecycle::TaskParams;
pub use priority::PriorityTranslator;
pub use sim::SimKernel;
pub use tick::wake_delay;

/// Re-export common types
pub use taskshim_common::{
    BaseType, SchedulerState, SleepModeStatus, StackGrowth, StackType, TaskState, TickType,
    UBaseType,
};
