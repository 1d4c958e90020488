//! Integration tests for the taskshim runtime
//!
//! These drive the donor API end to end against the simulated host kernel,
//! through the public surface only.

use parking_lot::Mutex;
use std::ffi::c_void;
use std::sync::Arc;
use taskshim_runtime::{
    Builder, Capabilities, Error, FaultAction, HostKernel, SchedulerState, SimKernel,
    StackGrowth, TaskAdapter, TaskArgument, TaskHandle, TaskParams, TaskState, TickType,
};

extern "C" fn noop(_: *mut c_void) {}

/// Adapter that logs faults instead of halting and records them.
fn logging_adapter(builder: Builder) -> (TaskAdapter<SimKernel>, Arc<Mutex<Vec<Error>>>) {
    let faults = Arc::new(Mutex::new(Vec::new()));
    let sink = faults.clone();
    let config = builder
        .fault_action(FaultAction::Log)
        .on_fault(Arc::new(move |e: &Error| sink.lock().push(e.clone())))
        .build()
        .unwrap();
    (TaskAdapter::new(SimKernel::new(), config).unwrap(), faults)
}

/// Test a task through create, suspend, resume, reprioritise and delete
#[test]
fn test_task_lifecycle() {
    let (adapter, faults) = logging_adapter(Builder::new());
    let main = adapter.host().spawn_current("main", 60);
    adapter.start_scheduler();

    let mut handle = TaskHandle::CURRENT;
    let status = adapter.create(
        TaskParams::new(Some(noop), "worker", 128, 10),
        Some(&mut handle),
    );
    assert_eq!(status, taskshim_common::PD_PASS);
    assert!(!handle.is_null());
    assert_eq!(adapter.tasks_created(), 1);
    assert_eq!(adapter.number_of_tasks(), 2);
    assert_eq!(adapter.state(handle), Ok(TaskState::Ready));
    assert_eq!(adapter.priority_get(handle), Ok(10));
    assert_eq!(adapter.task_name(handle).unwrap(), "worker");

    // Donor 10 maps to host 54, ahead of main at 60: resuming preempts
    adapter.suspend(handle).unwrap();
    assert_eq!(adapter.state(handle), Ok(TaskState::Suspended));
    adapter.resume(handle).unwrap();
    assert_eq!(adapter.state(handle), Ok(TaskState::Running));
    assert_eq!(adapter.current_task_handle(), handle);
    assert_eq!(
        adapter.state(TaskHandle::from(main)),
        Ok(TaskState::Ready)
    );

    // Dropping below main hands the CPU back on the next reschedule
    adapter.priority_set(handle, 1).unwrap();
    assert_eq!(adapter.priority_get(handle), Ok(1));
    adapter.switch_context();
    assert_eq!(adapter.current_task_handle(), TaskHandle::from(main));

    adapter.delete(handle).unwrap();
    assert_eq!(adapter.state(handle), Ok(TaskState::Deleted));
    assert_eq!(adapter.number_of_tasks(), 1);
    assert_eq!(adapter.tasks_created(), 1, "creation count never decreases");

    assert!(faults.lock().is_empty());
}

/// Test that host allocation failure is recoverable and leaves no trace
#[test]
fn test_create_failure_is_recoverable() {
    let (adapter, faults) = logging_adapter(Builder::new());
    adapter.host().fail_next_creates(1);

    let mut handle = TaskHandle::from(taskshim_runtime::ThreadId::new(7).unwrap());
    let status = adapter.create(TaskParams::new(Some(noop), "big", 4096, 3), Some(&mut handle));

    assert_eq!(status, taskshim_common::PD_FAIL);
    assert!(handle.is_null(), "out handle is cleared on failure");
    assert_eq!(adapter.tasks_created(), 0);
    assert_eq!(adapter.number_of_tasks(), 0);
    assert!(faults.lock().is_empty(), "allocation failure is not a fault");

    // The next attempt goes through
    assert_eq!(
        adapter.create(TaskParams::new(Some(noop), "big", 4096, 3), None),
        taskshim_common::PD_PASS
    );
    assert_eq!(adapter.tasks_created(), 1);
}

/// Test that an unmapped host status halts when faults are set to halt
#[test]
#[should_panic(expected = "state:")]
fn test_unmapped_state_halts() {
    let config = Builder::new().fault_action(FaultAction::Halt).build().unwrap();
    let adapter = TaskAdapter::new(SimKernel::new(), config).unwrap();
    let handle = adapter
        .spawn(TaskParams::new(Some(noop), "t", 64, 1))
        .unwrap();

    adapter.host().set_raw_status(handle.thread().unwrap(), 5);
    let _ = adapter.state(handle);
}

/// Test that the fault hook sees a fatal error before the caller does
#[test]
fn test_fault_hook_intercepts_fatal_errors() {
    let (adapter, faults) = logging_adapter(Builder::new());

    assert_eq!(
        adapter.spawn(TaskParams::new(None, "nil", 64, 1)),
        Err(Error::NullEntry)
    );
    assert_eq!(
        adapter.spawn(TaskParams::new(Some(noop), "hi", 64, 32)),
        Err(Error::PriorityOutOfRange {
            priority: 32,
            max: 32
        })
    );
    assert_eq!(adapter.resume(TaskHandle::CURRENT), Err(Error::ResumeCurrent));

    assert_eq!(faults.lock().len(), 3);
    assert_eq!(adapter.tasks_created(), 0);
}

struct Periodic {
    adapter: TaskAdapter<SimKernel>,
    period: TickType,
    wakes: Mutex<Vec<TickType>>,
}

extern "C" fn periodic_entry(arg: *mut c_void) {
    // SAFETY: the test keeps the context alive across run_entry
    let ctx = unsafe { &*(arg as *const Periodic) };

    let mut last_wake = ctx.adapter.tick_count();
    for _ in 0..5 {
        ctx.adapter.delay_until(&mut last_wake, ctx.period).unwrap();
        ctx.wakes.lock().push(last_wake);
    }
}

/// Test a periodic task keeping cadence across the tick counter wrap
#[test]
fn test_periodic_task_across_tick_wrap() {
    let ctx = Periodic {
        adapter: TaskAdapter::with_defaults(SimKernel::new()).unwrap(),
        period: 100,
        wakes: Mutex::new(Vec::new()),
    };
    ctx.adapter.host().set_tick(u32::MAX - 250);

    let argument = TaskArgument(&ctx as *const Periodic as *mut c_void);
    let handle = ctx
        .adapter
        .spawn(TaskParams::new(Some(periodic_entry), "tick", 64, 5).argument(argument))
        .unwrap();
    ctx.adapter.start_scheduler();

    assert!(ctx.adapter.host().run_entry(handle.thread().unwrap()));

    let wakes = ctx.wakes.lock().clone();
    assert_eq!(
        wakes,
        vec![u32::MAX - 150, u32::MAX - 50, 49, 149, 249]
    );
    assert_eq!(ctx.adapter.host().delays(), vec![100; 5]);
}

/// Test that critical sections nest and unwind to zero
#[test]
fn test_critical_nesting_balance() {
    let (adapter, faults) = logging_adapter(Builder::new());
    adapter.host().spawn_current("main", 10);
    assert_eq!(adapter.scheduler_state(), Ok(SchedulerState::NotStarted));

    // Legal before start: port lock only
    {
        let _init = adapter.critical_section().unwrap();
        assert_eq!(adapter.host().port_lock_depth(), 1);
    }

    adapter.start_scheduler();
    assert_eq!(adapter.scheduler_state(), Ok(SchedulerState::Running));

    for depth in 1..=8 {
        for _ in 0..depth {
            adapter.suspend_all().unwrap();
            adapter.enter_critical().unwrap();
        }
        assert_eq!(adapter.scheduler_state(), Ok(SchedulerState::Suspended));
        for _ in 0..depth {
            adapter.exit_critical().unwrap();
            assert!(adapter.resume_all().unwrap());
        }
        assert_eq!(adapter.scheduler_state(), Ok(SchedulerState::Running));
    }

    {
        let _outer = adapter.suspend_scheduler().unwrap();
        let _inner = adapter.critical_section().unwrap();
        assert_eq!(adapter.host().critical_level(), 2);
    }

    assert_eq!(adapter.host().critical_level(), 0);
    assert_eq!(adapter.host().port_lock_depth(), 0);
    assert!(faults.lock().is_empty());
}

/// Test stack high-water marks in both growth directions
#[test]
fn test_stack_high_water_mark_both_directions() {
    for growth in [StackGrowth::Downward, StackGrowth::Upward] {
        let (adapter, _) = logging_adapter(Builder::new().stack_growth(growth));
        let handle = adapter
            .spawn(TaskParams::new(Some(noop), "stk", 100, 1))
            .unwrap();
        let total = (adapter.host_stack_size(100) / 4) as u32;

        assert_eq!(adapter.stack_high_water_mark(handle), Ok(total));
        adapter
            .host()
            .touch_stack(handle.thread().unwrap(), 33 * 4, growth);
        assert_eq!(
            adapter.stack_high_water_mark(handle),
            Ok(total - 33),
            "{growth:?}"
        );
    }
}

/// Test that disabled optional operations fail loudly
#[test]
fn test_disabled_capabilities() {
    let (adapter, faults) =
        logging_adapter(Builder::new().without(Capabilities::DELETE | Capabilities::DELAY_UNTIL));
    let handle = adapter
        .spawn(TaskParams::new(Some(noop), "t", 64, 1))
        .unwrap();

    assert_eq!(
        adapter.delete(handle),
        Err(Error::CapabilityDisabled(Capabilities::DELETE))
    );
    let mut wake = 0;
    assert!(adapter.delay_until(&mut wake, 10).is_err());
    assert_eq!(adapter.state(handle), Ok(TaskState::Ready));
    assert_eq!(faults.lock().len(), 2);
}
