//! Shared fixtures for unit tests

use crate::adapter::TaskAdapter;
use crate::config::Builder;
use crate::error::Error;
use crate::fault::FaultAction;
use crate::host::TaskFunction;
use crate::lifecycle::TaskParams;
use crate::sim::SimKernel;
use parking_lot::Mutex;
use std::ffi::c_void;
use std::sync::Arc;

pub(crate) extern "C" fn idle_entry(_: *mut c_void) {}

pub(crate) const IDLE: Option<TaskFunction> = Some(idle_entry);

/// Adapter over a fresh [`SimKernel`] whose faults are logged and recorded.
pub(crate) struct Harness {
    pub adapter: TaskAdapter<SimKernel>,
    pub faults: Arc<Mutex<Vec<Error>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Builder::new())
    }

    pub fn with(builder: Builder) -> Self {
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = faults.clone();
        let config = builder
            .fault_action(FaultAction::Log)
            .on_fault(Arc::new(move |e: &Error| sink.lock().push(e.clone())))
            .build()
            .unwrap();
        Self {
            adapter: TaskAdapter::new(SimKernel::new(), config).unwrap(),
            faults,
        }
    }

    pub fn sim(&self) -> &SimKernel {
        self.adapter.host()
    }

    pub fn faults(&self) -> Vec<Error> {
        self.faults.lock().clone()
    }

    /// Spawn a donor task with a 64-word stack.
    pub fn task(&self, name: &str, priority: u32) -> crate::host::TaskHandle {
        self.adapter
            .spawn(TaskParams::new(IDLE, name, 64, priority))
            .unwrap()
    }
}
