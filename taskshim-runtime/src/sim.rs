//! # Simulated Host Kernel
//!
//! An in-process implementation of [`HostKernel`] for tests and tools.
//!
//! - Deterministic: time only moves when a delay, a tick or the caller
//!   advances it; a delay returns immediately with the clock moved forward
//! - Inspectable: every piece of state can be read and poked directly
//! - Fault injection: thread creation can be made to fail on demand
//!
//! Scheduling is intentionally minimal: [`HostKernel::schedule`] picks the
//! most important ready thread (lowest priority value) while the scheduler
//! lock is not held.

use crate::host::{HostKernel, TaskArgument, TaskFunction, ThreadId, ThreadInfo, ThreadSpec};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use taskshim_common::{config, host_status, StackGrowth, TickType};
use tracing::trace;

#[derive(Debug)]
struct SimThread {
    name: String,
    status: u8,
    init_priority: u8,
    current_priority: u8,
    stack: Vec<u8>,
    entry: Option<TaskFunction>,
    argument: TaskArgument,
    time_slice: TickType,
}

impl SimThread {
    fn state(&self) -> u8 {
        self.status & host_status::MASK
    }

    fn set_state(&mut self, state: u8) {
        self.status = (self.status & !host_status::MASK) | state;
    }

    fn runnable(&self) -> bool {
        matches!(self.state(), host_status::READY | host_status::RUNNING)
    }
}

#[derive(Debug, Default)]
struct SimState {
    threads: BTreeMap<ThreadId, SimThread>,
    current: Option<ThreadId>,
    next_id: u32,
    critical_level: u16,
    port_depth: u32,
    in_interrupt: bool,
    failing_creates: u32,
    reschedules: u64,
    delays: Vec<TickType>,
    wake_latency: TickType,
}

impl SimState {
    fn alloc_id(&mut self) -> ThreadId {
        self.next_id += 1;
        // next_id starts at 0 and is pre-incremented, so it is never zero
        ThreadId::new(self.next_id).unwrap_or_else(|| unreachable!())
    }

    fn pick_next(&self) -> Option<ThreadId> {
        let current = self
            .current
            .filter(|id| self.threads.get(id).is_some_and(SimThread::runnable));

        let best = self
            .threads
            .iter()
            .filter(|(_, t)| t.runnable())
            .min_by_key(|(id, t)| (t.current_priority, **id))
            .map(|(id, _)| *id)?;

        // Equal priority does not preempt the running thread
        match current {
            Some(cur) if self.threads[&cur].current_priority <= self.threads[&best].current_priority => {
                Some(cur)
            }
            _ => Some(best),
        }
    }
}

/// Simulated host kernel
pub struct SimKernel {
    state: Mutex<SimState>,
    tick: AtomicU32,
    fill_byte: u8,
}

impl SimKernel {
    pub fn new() -> Self {
        Self::with_fill_byte(config::STACK_FILL_BYTE)
    }

    /// Create a kernel that fills fresh stacks with `fill_byte`.
    pub fn with_fill_byte(fill_byte: u8) -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            tick: AtomicU32::new(0),
            fill_byte,
        }
    }

    /// Create a running thread and make it the current one.
    ///
    /// Stands in for the context that calls into the adapter (the host's
    /// main thread), which the adapter did not create.
    pub fn spawn_current(&self, name: &str, priority: u8) -> ThreadId {
        let mut state = self.state.lock();
        let id = state.alloc_id();
        state.threads.insert(
            id,
            SimThread {
                name: name.to_string(),
                status: host_status::RUNNING,
                init_priority: priority,
                current_priority: priority,
                stack: vec![self.fill_byte; 256],
                entry: None,
                argument: TaskArgument::default(),
                time_slice: config::TIME_SLICE,
            },
        );
        if let Some(prev) = state.current.replace(id) {
            if let Some(t) = state.threads.get_mut(&prev) {
                if t.state() == host_status::RUNNING {
                    t.set_state(host_status::READY);
                }
            }
        }
        id
    }

    /// Make the next `n` creation requests fail.
    pub fn fail_next_creates(&self, n: u32) {
        self.state.lock().failing_creates = n;
    }

    /// Switch the current thread without running the scheduler.
    pub fn set_current(&self, thread: Option<ThreadId>) {
        self.state.lock().current = thread;
    }

    pub fn current(&self) -> Option<ThreadId> {
        self.state.lock().current
    }

    /// Overwrite a thread's raw status byte.
    pub fn set_raw_status(&self, thread: ThreadId, raw: u8) {
        if let Some(t) = self.state.lock().threads.get_mut(&thread) {
            t.status = raw;
        }
    }

    /// Raise a thread's effective priority, as mutex inheritance would.
    pub fn boost_priority(&self, thread: ThreadId, priority: u8) {
        if let Some(t) = self.state.lock().threads.get_mut(&thread) {
            t.current_priority = priority;
        }
    }

    /// Dirty `bytes` of a thread's stack from the end growth starts at.
    pub fn touch_stack(&self, thread: ThreadId, bytes: usize, growth: StackGrowth) {
        if let Some(t) = self.state.lock().threads.get_mut(&thread) {
            let len = t.stack.len();
            let bytes = bytes.min(len);
            let used = match growth {
                StackGrowth::Downward => &mut t.stack[len - bytes..],
                StackGrowth::Upward => &mut t.stack[..bytes],
            };
            used.fill(!self.fill_byte);
        }
    }

    pub fn set_in_interrupt(&self, in_interrupt: bool) {
        self.state.lock().in_interrupt = in_interrupt;
    }

    pub fn set_tick(&self, tick: TickType) {
        self.tick.store(tick, Ordering::Release);
    }

    /// Let simulated time pass, as if the caller had been computing.
    pub fn advance(&self, ticks: TickType) {
        self.tick.fetch_add(ticks, Ordering::AcqRel);
    }

    /// Extra ticks added to every delay, modelling late wake-ups.
    pub fn set_wake_latency(&self, ticks: TickType) {
        self.state.lock().wake_latency = ticks;
    }

    /// Every delay requested so far, in order.
    pub fn delays(&self) -> Vec<TickType> {
        self.state.lock().delays.clone()
    }

    pub fn reschedule_count(&self) -> u64 {
        self.state.lock().reschedules
    }

    pub fn port_lock_depth(&self) -> u32 {
        self.state.lock().port_depth
    }

    /// Time slice a thread was created with.
    pub fn time_slice(&self, thread: ThreadId) -> Option<TickType> {
        self.state.lock().threads.get(&thread).map(|t| t.time_slice)
    }

    /// Call a thread's entry point with its argument on the calling thread.
    ///
    /// Returns `false` if the thread has no entry (e.g. it came from
    /// [`spawn_current`](Self::spawn_current)).
    pub fn run_entry(&self, thread: ThreadId) -> bool {
        let entry = {
            let state = self.state.lock();
            state
                .threads
                .get(&thread)
                .and_then(|t| t.entry.map(|f| (f, t.argument)))
        };
        // Lock released: the entry may call back into the kernel
        match entry {
            Some((f, arg)) => {
                f(arg.0);
                true
            }
            None => false,
        }
    }
}

impl Default for SimKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl HostKernel for SimKernel {
    fn thread_create(&self, spec: ThreadSpec) -> Option<ThreadId> {
        let mut state = self.state.lock();
        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            trace!(name = %spec.name, "sim: injected creation failure");
            return None;
        }

        let id = state.alloc_id();
        state.threads.insert(
            id,
            SimThread {
                name: spec.name,
                status: host_status::INIT,
                init_priority: spec.priority,
                current_priority: spec.priority,
                stack: vec![self.fill_byte; spec.stack_size],
                entry: Some(spec.entry),
                argument: spec.argument,
                time_slice: spec.time_slice,
            },
        );
        Some(id)
    }

    fn thread_startup(&self, thread: ThreadId) {
        if let Some(t) = self.state.lock().threads.get_mut(&thread) {
            if t.state() == host_status::INIT {
                t.set_state(host_status::READY);
            }
        }
    }

    fn thread_delete(&self, thread: ThreadId) {
        if let Some(t) = self.state.lock().threads.get_mut(&thread) {
            t.set_state(host_status::CLOSE);
        }
    }

    fn thread_self(&self) -> Option<ThreadId> {
        self.state.lock().current
    }

    fn thread_suspend(&self, thread: ThreadId) {
        if let Some(t) = self.state.lock().threads.get_mut(&thread) {
            if t.runnable() {
                t.set_state(host_status::SUSPEND);
            }
        }
    }

    fn thread_resume(&self, thread: ThreadId) {
        if let Some(t) = self.state.lock().threads.get_mut(&thread) {
            if t.state() == host_status::SUSPEND {
                t.set_state(host_status::READY);
            }
        }
    }

    fn thread_delay(&self, ticks: TickType) {
        let mut state = self.state.lock();
        debug_assert!(!state.in_interrupt, "blocking delay from interrupt context");
        state.delays.push(ticks);
        let elapsed = ticks.wrapping_add(state.wake_latency);
        self.tick.fetch_add(elapsed, Ordering::AcqRel);
    }

    fn thread_change_priority(&self, thread: ThreadId, priority: u8) {
        if let Some(t) = self.state.lock().threads.get_mut(&thread) {
            t.init_priority = priority;
            t.current_priority = priority;
        }
    }

    fn thread_info(&self, thread: ThreadId) -> Option<ThreadInfo> {
        self.state.lock().threads.get(&thread).map(|t| ThreadInfo {
            name: t.name.clone(),
            status: t.status,
            init_priority: t.init_priority,
            current_priority: t.current_priority,
            stack_addr: t.stack.as_ptr() as usize,
            stack_size: t.stack.len(),
        })
    }

    fn with_stack<R>(&self, thread: ThreadId, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let state = self.state.lock();
        state.threads.get(&thread).map(|t| f(&t.stack))
    }

    fn for_each_thread(&self, f: &mut dyn FnMut(ThreadId)) {
        let ids: Vec<ThreadId> = {
            let state = self.state.lock();
            state
                .threads
                .iter()
                .filter(|(_, t)| t.state() != host_status::CLOSE)
                .map(|(id, _)| *id)
                .collect()
        };
        for id in ids {
            f(id);
        }
    }

    fn schedule(&self) {
        let mut state = self.state.lock();
        state.reschedules += 1;

        if state.critical_level > 0 || state.in_interrupt {
            return;
        }

        let next = state.pick_next();
        if next == state.current {
            return;
        }

        if let Some(prev) = state.current {
            if let Some(t) = state.threads.get_mut(&prev) {
                if t.state() == host_status::RUNNING {
                    t.set_state(host_status::READY);
                }
            }
        }
        if let Some(id) = next {
            if let Some(t) = state.threads.get_mut(&id) {
                t.set_state(host_status::RUNNING);
            }
        }
        trace!(from = ?state.current, to = ?next, "sim: context switch");
        state.current = next;
    }

    fn tick_get(&self) -> TickType {
        self.tick.load(Ordering::Acquire)
    }

    fn tick_set(&self, tick: TickType) {
        self.tick.store(tick, Ordering::Release);
    }

    fn tick_increase(&self) {
        self.tick.fetch_add(1, Ordering::AcqRel);
    }

    fn enter_critical(&self) {
        let mut state = self.state.lock();
        state.critical_level += 1;
    }

    fn exit_critical(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.critical_level > 0, "scheduler lock released while not held");
        state.critical_level = state.critical_level.saturating_sub(1);
    }

    fn critical_level(&self) -> u16 {
        self.state.lock().critical_level
    }

    fn in_interrupt(&self) -> bool {
        self.state.lock().in_interrupt
    }

    fn port_lock(&self) {
        self.state.lock().port_depth += 1;
    }

    fn port_unlock(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.port_depth > 0, "port lock released while not held");
        state.port_depth = state.port_depth.saturating_sub(1);
    }
}
