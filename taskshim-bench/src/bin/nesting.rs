//! Critical-section nesting soak
//!
//! Opens random stacks of scheduler suspensions, port-level critical
//! sections and RAII guards, unwinds them in reverse, and checks that the
//! host lock depths return to zero after every round.
//!
//! Expected behavior:
//! - Both host depths are zero after every round
//! - The scheduler reads as suspended exactly while something is held
//! - No fault is reported

use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use taskshim_runtime::{
    Builder, Error, FaultAction, HostKernel, SchedulerState, SimKernel, TaskAdapter,
};

/// Critical-section nesting soak
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of rounds
    #[arg(short, long, default_value_t = 100_000)]
    rounds: u64,

    /// Maximum nesting depth per round
    #[arg(short = 'd', long, default_value_t = 16)]
    max_depth: u64,

    /// Seed for the depth and kind sequence
    #[arg(short, long, default_value_t = 0x5eed)]
    seed: u64,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// xorshift64; enough to vary depth and kind reproducibly
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Suspend,
    Critical,
}

/// One round: open `depth` sections, check, close them in reverse.
fn round(adapter: &TaskAdapter<SimKernel>, rng: &mut XorShift, depth: u64) -> Result<(), String> {
    let mut open = Vec::with_capacity(depth as usize);

    for _ in 0..depth {
        let kind = if rng.next() & 1 == 0 {
            Kind::Suspend
        } else {
            Kind::Critical
        };
        let entered = match kind {
            Kind::Suspend => adapter.suspend_all(),
            Kind::Critical => adapter.enter_critical(),
        };
        entered.map_err(|e| e.to_string())?;
        open.push(kind);
    }

    // Guards nest inside the raw pairs
    {
        let _suspend = adapter.suspend_scheduler().map_err(|e| e.to_string())?;
        let _critical = adapter.critical_section().map_err(|e| e.to_string())?;
        if adapter.scheduler_state() != Ok(SchedulerState::Suspended) {
            return Err("scheduler not suspended while guards held".into());
        }
    }

    let criticals = open.iter().filter(|k| matches!(k, Kind::Critical)).count();
    let port = adapter.host().port_lock_depth();
    if port as usize != criticals {
        return Err(format!("port depth {} with {} sections open", port, criticals));
    }
    let level = adapter.host().critical_level();
    if u64::from(level) != depth {
        return Err(format!("lock depth {} at nesting {}", level, depth));
    }

    while let Some(kind) = open.pop() {
        let left = match kind {
            Kind::Suspend => adapter.resume_all().map(|_| ()),
            Kind::Critical => adapter.exit_critical(),
        };
        left.map_err(|e| e.to_string())?;
    }

    let level = adapter.host().critical_level();
    let port = adapter.host().port_lock_depth();
    if level != 0 || port != 0 {
        return Err(format!("unbalanced after unwind: lock {} port {}", level, port));
    }
    if adapter.scheduler_state() != Ok(SchedulerState::Running) {
        return Err("scheduler not running after unwind".into());
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt().with_env_filter(args.log_filter()).init();

    tracing::info!("Nesting soak");
    tracing::info!("  Rounds: {}", args.rounds);
    tracing::info!("  Max depth: {}", args.max_depth);
    tracing::info!("  Seed: {:#x}", args.seed);

    let faults: Arc<Mutex<Vec<Error>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = faults.clone();
    let config = match Builder::new()
        .fault_action(FaultAction::Log)
        .on_fault(Arc::new(move |e: &Error| sink.lock().push(e.clone())))
        .build()
    {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid adapter configuration");
            std::process::exit(2);
        }
    };
    let adapter = match TaskAdapter::new(SimKernel::new(), config) {
        Ok(adapter) => adapter,
        Err(err) => {
            tracing::error!(%err, "adapter creation failed");
            std::process::exit(2);
        }
    };

    adapter.host().spawn_current("soak", 10);
    adapter.start_scheduler();

    let mut rng = XorShift::new(args.seed);
    let mut failures = 0u64;
    let mut deepest = 0u64;

    for n in 0..args.rounds {
        let depth = rng.next() % args.max_depth.max(1) + 1;
        deepest = deepest.max(depth);

        if let Err(reason) = round(&adapter, &mut rng, depth) {
            failures += 1;
            tracing::warn!(round = n, depth, "{}", reason);
            break;
        }
    }

    let fault_count = faults.lock().len();

    tracing::info!("\n=== Results ===");
    tracing::info!("Deepest nesting: {}", deepest);
    tracing::info!("Failures: {}", failures);
    tracing::info!("Faults reported: {}", fault_count);

    if failures > 0 || fault_count > 0 {
        std::process::exit(1);
    }

    tracing::info!("\nSoak complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_selects_filter() {
        let args = Args::try_parse_from(["nesting", "--debug"]).unwrap();
        assert_eq!(args.log_filter(), "debug");

        let args = Args::try_parse_from(["nesting"]).unwrap();
        assert_eq!(args.log_filter(), "info");
    }
}
