//! Text reports over the host thread registry
//!
//! `list_tasks` renders one tab-separated line per live thread:
//!
//! ```text
//! name      state  priority  high-water-mark  number
//! ```
//!
//! State codes are the [`TaskState::symbol`] characters; a status with no
//! donor counterpart shows as `?` rather than failing the whole report.

use crate::adapter::TaskAdapter;
use crate::config::Capabilities;
use crate::error::Result;
use crate::host::{HostKernel, ThreadId};
use crate::stack;
use std::fmt::Write as _;
use taskshim_common::{config::MAX_TASK_NAME_LEN, translate_status, TaskState};
use tracing::warn;

impl<H: HostKernel> TaskAdapter<H> {
    /// Render the task list report.
    pub fn list_tasks(&self) -> Result<String> {
        self.require("list_tasks", Capabilities::TRACE_FACILITY)?;

        let growth = self.config().stack_growth;
        let fill = self.config().stack_fill_byte;
        let mut output = String::new();

        self.host().enter_critical();

        let mut threads: Vec<ThreadId> = Vec::new();
        self.host().for_each_thread(&mut |id| threads.push(id));

        for thread in threads {
            // A thread may vanish between the walk and the read
            let Some(info) = self.host().thread_info(thread) else {
                continue;
            };
            let symbol = translate_status(info.status).map_or('?', TaskState::symbol);
            let priority = self.priorities().to_donor(info.init_priority);
            let high_water = self
                .host()
                .with_stack(thread, |s| stack::free_words(s, growth, fill))
                .unwrap_or(0);

            let _ = writeln!(
                output,
                "{:<width$}\t{}\t{}\t{}\t{}",
                info.name,
                symbol,
                priority,
                high_water,
                thread.get(),
                width = MAX_TASK_NAME_LEN,
            );
        }

        self.host().exit_critical();

        Ok(output)
    }

    /// Render the run-time statistics report.
    ///
    /// The host keeps no per-thread run-time counters, so the report is
    /// always empty.
    pub fn run_time_stats(&self) -> Result<String> {
        self.require("run_time_stats", Capabilities::RUN_TIME_STATS)?;
        warn!("run-time statistics requested; host keeps no run-time counters");
        Ok(String::new())
    }

    pub fn clear_run_time_counters(&self) -> Result<()> {
        self.require("clear_run_time_counters", Capabilities::RUN_TIME_STATS)?;
        warn!("run-time counters cleared; host keeps no run-time counters");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Builder;
    use crate::error::Error;
    use crate::testing::Harness;
    use taskshim_common::host_status;

    #[test]
    fn test_list_tasks_lines() {
        let h = Harness::new();
        let main = h.sim().spawn_current("main", 30);
        let worker = h.task("worker", 5);
        h.adapter.suspend(worker).unwrap();

        let output = h.adapter.list_tasks().unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let main_fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(main_fields[0], "main    ");
        assert_eq!(main_fields[1], "X");
        assert_eq!(main_fields[2], "34");
        assert_eq!(main_fields[4], main.get().to_string());

        let worker_fields: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(worker_fields[0].trim_end(), "worker");
        assert_eq!(worker_fields[1], "S");
        assert_eq!(worker_fields[2], "5");
        let words = h.adapter.stack_high_water_mark(worker).unwrap();
        assert_eq!(worker_fields[3], words.to_string());

        assert_eq!(h.sim().critical_level(), 0);
    }

    #[test]
    fn test_list_tasks_marks_unmapped_and_skips_deleted() {
        let h = Harness::new();
        let odd = h.task("odd", 1);
        let gone = h.task("gone", 2);
        h.sim().set_raw_status(odd.thread().unwrap(), 6);
        h.adapter.delete(gone).unwrap();

        let output = h.adapter.list_tasks().unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(output.starts_with("odd     \t?\t1\t"));
        assert!(h.faults().is_empty(), "report does not fault on odd states");

        h.sim().set_raw_status(odd.thread().unwrap(), host_status::READY);
        assert!(h.adapter.list_tasks().unwrap().contains("\tR\t"));
    }

    #[test]
    fn test_list_tasks_capability() {
        let h = Harness::with(Builder::new().without(Capabilities::TRACE_FACILITY));
        assert_eq!(
            h.adapter.list_tasks(),
            Err(Error::CapabilityDisabled(Capabilities::TRACE_FACILITY))
        );
    }

    #[test]
    fn test_run_time_stats() {
        let h = Harness::new();
        assert!(h.adapter.run_time_stats().is_err());
        assert!(h.adapter.clear_run_time_counters().is_err());

        let h = Harness::with(Builder::new().with(Capabilities::RUN_TIME_STATS));
        h.task("t", 1);
        assert_eq!(h.adapter.run_time_stats(), Ok(String::new()));
        assert_eq!(h.adapter.clear_run_time_counters(), Ok(()));
    }
}
