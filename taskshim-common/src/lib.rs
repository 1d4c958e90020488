// SPDX-License-Identifier: GPL-2.0-only
// Copyright (C) 2024 Ankit Kumar Pandey <ankitkpandey1@gmail.com>

//! # taskshim-common
//!
//! Shared vocabulary for the taskshim adapter: the donor task API's scalar
//! types, status codes and state enums on one side, and the host kernel's raw
//! thread status encoding on the other.
//!
//! Everything here is plain data so it can be used from `no_std` ports and
//! from the runtime crate alike. The translation *logic* lives in
//! `taskshim-runtime`; the only table kept here is the host-status to
//! donor-state mapping, because both sides of it are defined in this crate.
//!
//! ## Design Principles
//!
//! - **Donor values are wire values**: enum discriminants match the donor
//!   API's numeric encoding so ports can hand them straight to C callers
//! - **No silent fallthrough**: host status codes outside the table are an
//!   explicit [`UnmappedStatus`], never a placeholder state

#![no_std]

// ============================================================================
// Donor scalar types and status codes
// ============================================================================

/// Tick counter type. Wraps modulo 2^32.
pub type TickType = u32;

/// Signed base type used for status returns.
pub type BaseType = i32;

/// Unsigned base type used for priorities and counts.
pub type UBaseType = u32;

/// One stack word. Stack depths in the donor API are counted in these.
pub type StackType = u32;

pub const PD_FALSE: BaseType = 0;
pub const PD_TRUE: BaseType = 1;
pub const PD_PASS: BaseType = PD_TRUE;
pub const PD_FAIL: BaseType = PD_FALSE;

/// Block "forever".
pub const MAX_DELAY: TickType = TickType::MAX;

// ============================================================================
// Wrap-safe tick arithmetic
// ============================================================================

/// Unsigned tick counters of any width.
///
/// Deadline checks must be written in terms of wrapping subtraction so that a
/// target which wrapped past zero still compares as "in the future". Making
/// the width a parameter lets the rule be exercised at `u8` where wraparound
/// is cheap to reach.
pub trait WrappingTick: Copy + Eq + Ord + core::fmt::Debug {
    /// Zero ticks.
    const ZERO: Self;

    /// Half the counter range. Differences below this are "in the future".
    const HALF_RANGE: Self;

    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
}

macro_rules! impl_wrapping_tick {
    ($($t:ty),*) => {
        $(
            impl WrappingTick for $t {
                const ZERO: Self = 0;
                const HALF_RANGE: Self = <$t>::MAX / 2;

                #[inline]
                fn wrapping_add(self, rhs: Self) -> Self {
                    <$t>::wrapping_add(self, rhs)
                }

                #[inline]
                fn wrapping_sub(self, rhs: Self) -> Self {
                    <$t>::wrapping_sub(self, rhs)
                }
            }
        )*
    };
}

impl_wrapping_tick!(u8, u16, u32, u64);

// ============================================================================
// Donor task state
// ============================================================================

/// Task state as seen by donor API callers.
///
/// Never stored; always derived from the host thread's live status.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// The task querying its own state
    Running = 0,
    /// Runnable, waiting for the CPU
    Ready = 1,
    /// Waiting on a delay or an event
    Blocked = 2,
    /// Explicitly suspended
    Suspended = 3,
    /// Deleted, not yet reclaimed
    Deleted = 4,
    /// Handle does not refer to a task
    Invalid = 5,
}

impl TaskState {
    /// Single-character code used by task list reports.
    #[inline]
    pub fn symbol(self) -> char {
        match self {
            TaskState::Running => 'X',
            TaskState::Ready => 'R',
            TaskState::Blocked => 'B',
            TaskState::Suspended => 'S',
            TaskState::Deleted => 'D',
            TaskState::Invalid => '?',
        }
    }
}

impl TryFrom<u32> for TaskState {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TaskState::Running),
            1 => Ok(TaskState::Ready),
            2 => Ok(TaskState::Blocked),
            3 => Ok(TaskState::Suspended),
            4 => Ok(TaskState::Deleted),
            5 => Ok(TaskState::Invalid),
            _ => Err(()),
        }
    }
}

// ============================================================================
// Scheduler state
// ============================================================================

/// Scheduler state as reported to donor callers.
///
/// Transitions:
/// ```text
/// NOT_STARTED --start--> RUNNING <--lock depth--> SUSPENDED
/// ```
/// Interrupt context always reads as `NotStarted`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Scheduler lock held (nesting depth > 0)
    Suspended = 0,
    /// Scheduler not started, or caller is in interrupt context
    NotStarted = 1,
    /// Scheduler running, lock not held
    Running = 2,
}

/// Answer to the tickless-idle "may I sleep?" question.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SleepModeStatus {
    /// Something happened since the decision to sleep; stay awake
    #[default]
    AbortSleep = 0,
    /// Sleep until the next expected tick
    StandardSleep = 1,
    /// No task is waiting on a timeout; sleep indefinitely
    NoTasksWaitingTimeout = 2,
}

// ============================================================================
// Host thread status
// ============================================================================

/// Raw host thread status codes.
pub mod host_status {
    pub const INIT: u8 = 0x00;
    pub const READY: u8 = 0x01;
    pub const SUSPEND: u8 = 0x02;
    pub const RUNNING: u8 = 0x03;
    pub const CLOSE: u8 = 0x04;

    /// Bits of the status byte that carry the state; the rest are flags.
    pub const MASK: u8 = 0x07;
}

/// Host thread status after masking.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    /// Created, not yet started
    Init = host_status::INIT,
    Ready = host_status::READY,
    /// Suspended or blocked; the host does not distinguish the two
    Suspend = host_status::SUSPEND,
    Running = host_status::RUNNING,
    /// Deleted / detached
    Close = host_status::CLOSE,
}

impl TryFrom<u8> for HostStatus {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            host_status::INIT => Ok(HostStatus::Init),
            host_status::READY => Ok(HostStatus::Ready),
            host_status::SUSPEND => Ok(HostStatus::Suspend),
            host_status::RUNNING => Ok(HostStatus::Running),
            host_status::CLOSE => Ok(HostStatus::Close),
            _ => Err(()),
        }
    }
}

/// A host status (already masked) with no donor counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmappedStatus(pub u8);

/// Translate a raw host status byte into a donor task state.
///
/// Reserved flag bits are masked off first. `INIT` has no donor equivalent
/// (donor tasks are never created-but-not-started) and is reported as
/// unmapped together with every code outside the table.
pub fn translate_status(raw: u8) -> Result<TaskState, UnmappedStatus> {
    let masked = raw & host_status::MASK;

    match HostStatus::try_from(masked) {
        Ok(HostStatus::Running) => Ok(TaskState::Running),
        Ok(HostStatus::Ready) => Ok(TaskState::Ready),
        Ok(HostStatus::Suspend) => Ok(TaskState::Suspended),
        Ok(HostStatus::Close) => Ok(TaskState::Deleted),
        Ok(HostStatus::Init) | Err(()) => Err(UnmappedStatus(masked)),
    }
}

// ============================================================================
// Stack geometry
// ============================================================================

/// Direction in which a stack grows from its initial pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackGrowth {
    /// Stack pointer starts at the highest address and decreases
    #[default]
    Downward,
    /// Stack pointer starts at the lowest address and increases
    Upward,
}

/// MPU region descriptor accepted by task creation.
///
/// The host kernel has no MPU support; regions are accepted for API
/// compatibility and ignored.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryRegion {
    pub base_address: usize,
    pub length_in_bytes: u32,
    pub parameters: u32,
}

// ============================================================================
// Configuration constants
// ============================================================================

/// Default configuration constants
pub mod config {
    use super::StackGrowth;

    /// Number of donor priority levels; valid priorities are `0..MAX_PRIORITIES`
    pub const MAX_PRIORITIES: u32 = 32;

    /// `host = REVERSAL_BASE - donor`
    pub const REVERSAL_BASE: u32 = 64;

    /// Host round-robin quantum in ticks
    pub const TIME_SLICE: u32 = 10;

    /// Bytes added to every requested stack for host bookkeeping
    pub const STACK_OVERHEAD: usize = 1024 + 512;

    /// Value the host writes over fresh stacks
    pub const STACK_FILL_BYTE: u8 = b'#';

    /// Longest thread name the host keeps
    pub const MAX_TASK_NAME_LEN: usize = 8;

    /// Stack growth direction of the target
    pub const STACK_GROWTH: StackGrowth = StackGrowth::Downward;
}

const _: () = assert!(
    config::REVERSAL_BASE > config::MAX_PRIORITIES - 1,
    "REVERSAL_BASE must exceed the highest donor priority"
);
const _: () = assert!(
    config::REVERSAL_BASE <= u8::MAX as u32,
    "host priorities are 8-bit"
);

// ============================================================================
// Tests
// ============================================================================
