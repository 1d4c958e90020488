//! Adapter configuration and builder
//!
//! Mirrors the donor API's compile-time switches: which optional operations
//! exist, and the numeric constants that drive priority translation and stack
//! sizing. Everything is resolved once, before the adapter is constructed.

use crate::error::{Error, Result};
use crate::fault::{FaultAction, FaultHook};
use crate::priority::PriorityTranslator;
use taskshim_common::{config, StackGrowth, TickType};

bitflags::bitflags! {
    /// Optional operations.
    ///
    /// Calling an operation whose capability is absent is a fatal
    /// `CapabilityDisabled` condition rather than a silent no-op.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const DELETE                 = 1 << 0;
        const DELAY                  = 1 << 1;
        const DELAY_UNTIL            = 1 << 2;
        const SUSPEND                = 1 << 3;
        /// Requires `SUSPEND` as well
        const RESUME_FROM_ISR        = 1 << 4;
        const PRIORITY_GET           = 1 << 5;
        const PRIORITY_SET           = 1 << 6;
        const STATE_QUERY            = 1 << 7;
        const TASK_NAME              = 1 << 8;
        const STACK_HIGH_WATER_MARK  = 1 << 9;
        const SCHEDULER_STATE        = 1 << 10;
        /// Tick stepping and the sleep-mode hook
        const TICKLESS_IDLE          = 1 << 11;
        /// Per-task critical nesting: `enter_critical` / `exit_critical`
        const CRITICAL_NESTING_IN_TCB = 1 << 12;
        /// Task list report
        const TRACE_FACILITY         = 1 << 13;
        const RUN_TIME_STATS         = 1 << 14;
    }
}

impl Default for Capabilities {
    /// Everything the donor's default configuration compiles in.
    fn default() -> Self {
        Capabilities::all() - Capabilities::RUN_TIME_STATS
    }
}

/// Adapter configuration
#[derive(Clone)]
pub struct AdapterConfig {
    /// Optional operations compiled in
    pub capabilities: Capabilities,

    /// Number of donor priority levels
    pub max_priorities: u32,

    /// `host = reversal_base - donor`
    pub reversal_base: u32,

    /// Host time slice for created threads, in ticks
    pub time_slice: TickType,

    /// Bytes added to every requested stack
    pub stack_overhead: usize,

    /// Target stack growth direction
    pub stack_growth: StackGrowth,

    /// Value fresh stacks are filled with
    pub stack_fill_byte: u8,

    /// What to do after logging a fatal condition
    pub fault_action: FaultAction,

    /// Optional observer for fatal conditions
    pub fault_hook: Option<FaultHook>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            capabilities: Capabilities::default(),
            max_priorities: config::MAX_PRIORITIES,
            reversal_base: config::REVERSAL_BASE,
            time_slice: config::TIME_SLICE,
            stack_overhead: config::STACK_OVERHEAD,
            stack_growth: config::STACK_GROWTH,
            stack_fill_byte: config::STACK_FILL_BYTE,
            fault_action: FaultAction::default(),
            fault_hook: None,
        }
    }
}

impl std::fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("capabilities", &self.capabilities)
            .field("max_priorities", &self.max_priorities)
            .field("reversal_base", &self.reversal_base)
            .field("time_slice", &self.time_slice)
            .field("stack_overhead", &self.stack_overhead)
            .field("stack_growth", &self.stack_growth)
            .field("stack_fill_byte", &self.stack_fill_byte)
            .field("fault_action", &self.fault_action)
            .field("fault_hook", &self.fault_hook.is_some())
            .finish()
    }
}

impl AdapterConfig {
    /// Check the constants against each other.
    pub fn validate(&self) -> Result<()> {
        PriorityTranslator::new(self.max_priorities, self.reversal_base)?;

        if self.capabilities.contains(Capabilities::RESUME_FROM_ISR)
            && !self.capabilities.contains(Capabilities::SUSPEND)
        {
            return Err(Error::InvalidConfig(
                "RESUME_FROM_ISR requires SUSPEND".into(),
            ));
        }
        Ok(())
    }
}

/// Adapter configuration builder
pub struct Builder {
    config: AdapterConfig,
}

impl Builder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: AdapterConfig::default(),
        }
    }

    /// Replace the capability set
    pub fn capabilities(mut self, caps: Capabilities) -> Self {
        self.config.capabilities = caps;
        self
    }

    /// Remove capabilities from the current set
    pub fn without(mut self, caps: Capabilities) -> Self {
        self.config.capabilities.remove(caps);
        self
    }

    /// Add capabilities to the current set
    pub fn with(mut self, caps: Capabilities) -> Self {
        self.config.capabilities.insert(caps);
        self
    }

    /// Set the number of donor priority levels
    pub fn max_priorities(mut self, n: u32) -> Self {
        self.config.max_priorities = n;
        self
    }

    /// Set the priority reversal base
    pub fn reversal_base(mut self, base: u32) -> Self {
        self.config.reversal_base = base;
        self
    }

    /// Set the host time slice
    pub fn time_slice(mut self, ticks: TickType) -> Self {
        self.config.time_slice = ticks;
        self
    }

    /// Set the per-task stack overhead in bytes
    pub fn stack_overhead(mut self, bytes: usize) -> Self {
        self.config.stack_overhead = bytes;
        self
    }

    /// Set the stack growth direction
    pub fn stack_growth(mut self, growth: StackGrowth) -> Self {
        self.config.stack_growth = growth;
        self
    }

    /// Set the stack fill byte
    pub fn stack_fill_byte(mut self, byte: u8) -> Self {
        self.config.stack_fill_byte = byte;
        self
    }

    /// Set the fault action
    ///
    /// - `Halt`: panic on fatal conditions (debug default)
    /// - `Log`: log and return the error (release default)
    pub fn fault_action(mut self, action: FaultAction) -> Self {
        self.config.fault_action = action;
        self
    }

    /// Install a hook called for every fatal condition
    pub fn on_fault(mut self, hook: FaultHook) -> Self {
        self.config.fault_hook = Some(hook);
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<AdapterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
