//! # Bench Stats - Demo Driver
//!
//! Runs a synthetic multi-threaded workload through the statistics core so
//! the whole lifecycle can be exercised from the command line:
//!
//! 1. **Parse arguments** and read them into a `StatsConfig` by option name
//! 2. **Initialize diagnostics** (`tracing`, optionally to a file)
//! 3. **Initialize sinks**: text always, XML/JSON when a target is given
//! 4. **Run workers**: each thread repeatedly times a sleep of `--op-time`
//!    plus up to `--op-jitter` random extra time
//! 5. **Checkpoint** every `--report-checkpoint-interval` seconds if set
//! 6. **Shut down**: wait for workers (optionally only for a grace period,
//!    then report with operations still in flight) and emit the final
//!    report

use anyhow::{Context, Result};
use bench_stats::{
    cli::Args, logging::init_diagnostics, utils::validate_verbosity, CheckpointScheduler,
    ConfigEntry, LoggingContext, OptionValue, Priority, StatsConfig, VERSION,
};
use clap::Parser;
use crossbeam::channel::{self, Receiver};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shared state of the synthetic workload.
struct Workload {
    stop: AtomicBool,
    /// Events left to run; `None` when the run is limited by time only.
    budget: Option<AtomicU64>,
    op_time: Duration,
    op_jitter: Duration,
}

impl Workload {
    fn take_event(&self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return false;
        }
        match &self.budget {
            None => true,
            Some(left) => left
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
                .is_ok(),
        }
    }

    fn op_duration(&self) -> Duration {
        let jitter = u64::try_from(self.op_jitter.as_nanos()).unwrap_or(u64::MAX);
        if jitter == 0 {
            return self.op_time;
        }
        self.op_time + Duration::from_nanos(rand::thread_rng().gen_range(0..=jitter))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = StatsConfig::from_options(&args).context("Invalid configuration")?;
    let verbosity = validate_verbosity(config.verbosity)?;
    let _log_guard = init_diagnostics(verbosity, args.color, args.log_file.as_deref())
        .context("Failed to initialize diagnostics")?;

    let mut ctx = LoggingContext::new(config.clone())?;

    if args.list_options {
        println!("Report sink options:");
        for spec in ctx.option_specs() {
            println!(
                "  --{:<24} {} [{}]",
                spec.name, spec.description, spec.default
            );
        }
        return Ok(());
    }

    ctx.init().context("Failed to initialize report sinks")?;
    let ctx = Arc::new(ctx);

    info!("Starting bench-stats {}", VERSION);
    debug!("Configuration: {:?}", config);

    ctx.emit_text(
        Priority::Notice,
        &format!("bench-stats {} (synthetic workload)", VERSION),
    )?;
    ctx.emit_text(Priority::Notice, "")?;
    ctx.emit_text(
        Priority::Notice,
        &format!("Number of threads: {}", config.threads),
    )?;
    emit_run_config(&ctx, &args, &config);

    let workload = Arc::new(Workload {
        stop: AtomicBool::new(false),
        budget: (args.events > 0).then(|| AtomicU64::new(args.events)),
        op_time: args.op_time,
        op_jitter: args.op_jitter,
    });

    let scheduler = config
        .checkpoint_period()
        .map(|period| CheckpointScheduler::spawn(ctx.clone(), period))
        .transpose()?;

    ctx.emit_text(Priority::Notice, "Threads started!")?;
    let (done_tx, done_rx) = channel::unbounded::<usize>();
    let mut workers = Vec::with_capacity(config.threads);
    for id in 0..config.threads {
        let ctx = ctx.clone();
        let workload = workload.clone();
        let done_tx = done_tx.clone();
        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || {
                run_worker(&ctx, &workload, id);
                let _ = done_tx.send(id);
            })
            .with_context(|| format!("Failed to spawn worker thread {}", id))?;
        workers.push(handle);
    }
    drop(done_tx);

    let finished = wait_for(&done_rx, 0, config.threads, Instant::now() + args.time);
    workload.stop.store(true, Ordering::Relaxed);

    match args.forced_shutdown {
        Some(grace) => {
            let finished = wait_for(&done_rx, finished, config.threads, Instant::now() + grace);
            if finished < config.threads {
                warn!(
                    "{} workers still busy after {:?}, forcing shutdown",
                    config.threads - finished,
                    grace
                );
                ctx.request_forced_shutdown();
            } else {
                join_all(workers);
            }
        }
        None => join_all(workers),
    }

    if let Some(scheduler) = scheduler {
        let reports = scheduler.stop();
        debug!("{} checkpoint reports taken", reports);
    }

    ctx.done().context("Failed to finish reporting")?;

    if let Some(path) = &args.stats_json {
        let stats = ctx.last_report();
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Final statistics written to {}", path.display());
    }

    Ok(())
}

fn run_worker(ctx: &LoggingContext, workload: &Workload, id: usize) {
    while workload.take_event() {
        if let Err(e) = ctx.event_start(id) {
            error!("Worker {} failed to start an operation: {}", id, e);
            return;
        }
        thread::sleep(workload.op_duration());
        if let Err(e) = ctx.event_stop(id) {
            error!("Worker {} failed to stop an operation: {}", id, e);
            return;
        }
    }
}

/// Count worker completions until `total` or the deadline.
fn wait_for(done_rx: &Receiver<usize>, mut finished: usize, total: usize, deadline: Instant) -> usize {
    while finished < total {
        match done_rx.recv_deadline(deadline) {
            Ok(id) => {
                debug!("Worker {} finished", id);
                finished += 1;
            }
            Err(_) => break,
        }
    }
    finished
}

fn join_all(workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        if worker.join().is_err() {
            error!("Worker thread panicked");
        }
    }
}

fn emit_run_config(ctx: &LoggingContext, args: &Args, config: &StatsConfig) {
    let entries = [
        ConfigEntry::new("threads", OptionValue::Int(config.threads as i64)),
        ConfigEntry::new("time", OptionValue::Float(args.time.as_secs_f64())),
        ConfigEntry::new("events", OptionValue::Size(args.events)),
        ConfigEntry::new("percentile", OptionValue::Int(config.percentile)),
        ConfigEntry::new(
            "report-checkpoint-interval",
            OptionValue::Size(config.checkpoint_interval),
        ),
        ConfigEntry::new("debug", OptionValue::Flag(config.per_thread_stats)),
        ConfigEntry::new(
            "op-time",
            OptionValue::Str(bench_stats::utils::format_duration(args.op_time)),
        ),
    ];
    ctx.emit_config(&entries);
}
