//! Periodic task drift tool
//!
//! Runs periodic donor tasks on the simulated host, injects overruns, and
//! reports how the wake times of each task track its period.
//!
//! Expected behavior:
//! - Without overruns or wake latency every wake is exactly one period after
//!   the previous one, including across the tick counter wrap
//! - An overrunning activation misses its deadline; the next wake is taken
//!   immediately and the cadence restarts from it instead of replaying the
//!   missed periods back to back

use clap::Parser;
use parking_lot::Mutex;
use std::ffi::c_void;
use taskshim_runtime::{
    wake_delay, Builder, FaultAction, SimKernel, TaskAdapter, TaskArgument, TaskParams, TickType,
};

/// Periodic wake-time drift tool
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of periodic tasks
    #[arg(short = 'n', long, default_value_t = 4)]
    tasks: u32,

    /// Activations per task
    #[arg(short, long, default_value_t = 1_000)]
    activations: u32,

    /// Base period in ticks; task i runs every period * (i + 1)
    #[arg(short, long, default_value_t = 10)]
    period: TickType,

    /// Inject an overrun every N activations (0 disables)
    #[arg(long, default_value_t = 50)]
    overrun_every: u32,

    /// Length of an overrunning activation, in periods
    #[arg(long, default_value_t = 3)]
    overrun_periods: TickType,

    /// Host wake-up latency in ticks
    #[arg(long, default_value_t = 0)]
    latency: TickType,

    /// Starting tick; the default crosses the counter wrap
    #[arg(long, default_value_t = u32::MAX - 5_000)]
    start_tick: TickType,

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

#[derive(Debug)]
struct Stats {
    wakes: u64,
    missed: u64,
    min_interval: TickType,
    max_interval: TickType,
    total_interval: u64,
}

impl Stats {
    fn new() -> Self {
        Self {
            wakes: 0,
            missed: 0,
            min_interval: TickType::MAX,
            max_interval: 0,
            total_interval: 0,
        }
    }

    fn record(&mut self, interval: TickType, missed: bool) {
        self.wakes += 1;
        self.missed += u64::from(missed);
        self.min_interval = self.min_interval.min(interval);
        self.max_interval = self.max_interval.max(interval);
        self.total_interval += u64::from(interval);
    }

    fn mean_interval(&self) -> f64 {
        if self.wakes == 0 {
            0.0
        } else {
            self.total_interval as f64 / self.wakes as f64
        }
    }
}

struct TaskContext {
    adapter: TaskAdapter<SimKernel>,
    period: TickType,
    activations: u32,
    overrun_every: u32,
    overrun_ticks: TickType,
    stats: Mutex<Stats>,
}

extern "C" fn periodic_task(arg: *mut c_void) {
    // SAFETY: main keeps the context alive until run_entry returns
    let ctx = unsafe { &*(arg as *const TaskContext) };
    let adapter = &ctx.adapter;
    let mut last_wake = adapter.tick_count();

    for n in 1..=ctx.activations {
        // Simulated work: a quarter period, or a long overrun
        let overrun = ctx.overrun_every != 0 && n % ctx.overrun_every == 0;
        let work = if overrun {
            ctx.overrun_ticks
        } else {
            ctx.period / 4
        };
        adapter.host().advance(work);

        let previous = last_wake;
        let missed = wake_delay(previous, ctx.period, adapter.tick_count()).is_none();

        if let Err(err) = adapter.delay_until(&mut last_wake, ctx.period) {
            tracing::error!(%err, "delay_until failed");
            return;
        }

        ctx.stats
            .lock()
            .record(last_wake.wrapping_sub(previous), missed);
    }
}

fn run_task(index: u32, args: &Args) -> Option<Stats> {
    let config = Builder::new()
        .fault_action(FaultAction::Log)
        .build()
        .map_err(|err| tracing::error!(%err, "invalid adapter configuration"))
        .ok()?;
    let adapter = TaskAdapter::new(SimKernel::new(), config)
        .map_err(|err| tracing::error!(%err, "adapter creation failed"))
        .ok()?;

    let period = args.period.saturating_mul(index + 1);
    adapter.host().set_tick(args.start_tick);
    adapter.host().set_wake_latency(args.latency);

    let ctx = TaskContext {
        adapter,
        period,
        activations: args.activations,
        overrun_every: args.overrun_every,
        overrun_ticks: period.saturating_mul(args.overrun_periods),
        stats: Mutex::new(Stats::new()),
    };

    let name = format!("per{}", index);
    let argument = TaskArgument(&ctx as *const TaskContext as *mut c_void);
    let params = TaskParams::new(Some(periodic_task), &name, 256, index % 31 + 1).argument(argument);
    let handle = ctx
        .adapter
        .spawn(params)
        .map_err(|err| tracing::error!(%err, "task creation failed"))
        .ok()?;
    ctx.adapter.start_scheduler();

    let thread = handle.thread()?;
    ctx.adapter.host().run_entry(thread);

    tracing::debug!(
        task = index,
        final_tick = ctx.adapter.tick_count(),
        "task finished"
    );
    Some(ctx.stats.into_inner())
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt().with_env_filter(args.log_filter()).init();

    tracing::info!("Periodic drift tool");
    tracing::info!("  Tasks: {}", args.tasks);
    tracing::info!("  Activations: {}", args.activations);
    tracing::info!("  Base period: {} ticks", args.period);
    tracing::info!("  Overrun every: {}", args.overrun_every);
    tracing::info!("  Wake latency: {} ticks", args.latency);
    tracing::info!("  Start tick: {:#010x}", args.start_tick);

    let mut unexpected = 0;

    for index in 0..args.tasks {
        let Some(stats) = run_task(index, &args) else {
            unexpected += 1;
            continue;
        };
        let period = args.period.saturating_mul(index + 1);

        tracing::info!(
            "task {}: period {} wakes {} missed {} interval min {} max {} mean {:.2}",
            index,
            period,
            stats.wakes,
            stats.missed,
            stats.min_interval,
            stats.max_interval,
            stats.mean_interval()
        );

        // With no overruns and no latency the cadence must be exact
        if args.overrun_every == 0
            && args.latency == 0
            && (stats.min_interval != period || stats.max_interval != period)
        {
            tracing::warn!("task {} drifted without any overrun", index);
            unexpected += 1;
        }
    }

    if unexpected > 0 {
        tracing::warn!("{} task(s) behaved unexpectedly", unexpected);
        std::process::exit(1);
    }

    tracing::info!("Drift check complete");
}
