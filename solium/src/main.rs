//! Headless simulation driver.
//!
//! Builds a default scenario, runs the tick loop at the requested speed and
//! optionally streams structured events as JSONL.

mod bridge;
mod scheduler;

use anyhow::Context;
use bridge::{ExecutionBridge, TickOutcome};
use clap::Parser;
use scheduler::{SimSpeed, TickScheduler};
use solium_core::army::TrainingItem;
use solium_core::investment::ForeignNation;
use solium_core::metrics::SimMetrics;
use solium_core::pipeline::TickReport;
use solium_core::state::{ResourceId, StratumState};
use solium_core::vassals::VassalState;
use solium_core::{
    apply_result, run_tick, BaselineEconomy, SimConfig, Stratum, UnitTypeRegistry, WorldState,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "solium", about = "Persistent society simulation driver", version)]
struct Args {
    /// Number of days to simulate.
    #[arg(long, default_value_t = 365)]
    days: u64,

    /// Tick rate relative to real time.
    #[arg(long, value_enum, default_value_t = SimSpeed::Unbounded)]
    speed: SimSpeed,

    /// Simulation seed; identical seeds replay identically.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Write structured events as JSONL to this file.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Tunables file (JSON); built-in defaults otherwise.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compute the economy step on the calling thread instead of the worker.
    #[arg(long)]
    sync: bool,

    /// Worker response timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,

    /// Log filter, e.g. "info" or "solium_core=debug".
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// A small realm with enough moving parts to exercise every subsystem.
fn default_world(seed: u64, registry: &UnitTypeRegistry) -> WorldState {
    let mut state = WorldState::default();
    state.rng_seed = seed;
    state.treasury = 10_000.0;
    state.stability = 55.0;

    state
        .strata
        .insert(Stratum::Nobility, StratumState::new(3_000.0, 40_000.0, 35.0));
    state
        .strata
        .insert(Stratum::Clergy, StratumState::new(5_000.0, 15_000.0, 20.0));
    state
        .strata
        .insert(Stratum::Burghers, StratumState::new(12_000.0, 30_000.0, 25.0));
    state
        .strata
        .insert(Stratum::Peasants, StratumState::new(90_000.0, 12_000.0, 12.0));
    state
        .strata
        .insert(Stratum::Laborers, StratumState::new(25_000.0, 6_000.0, 8.0));

    state.resources.insert(ResourceId::GRAIN, 500.0);
    state.resources.insert(ResourceId::TIMBER, 200.0);

    if let Some(militia) = registry.id_by_name("militia") {
        state.army.insert(militia, 8);
    }
    if let Some(pikemen) = registry.id_by_name("pikemen") {
        state.army.insert(pikemen, 4);
        if let Some(def) = registry.get(pikemen) {
            state
                .training_queue
                .push(TrainingItem::waiting(pikemen, def.training_days));
        }
    }

    state
        .vassals
        .push(VassalState::new("marchland", 0.125, 600.0));
    state
        .vassals
        .push(VassalState::new("free city", 0.10, 900.0));

    for (tag, relations, openness, ret, interest) in [
        ("VEN", 60.0, 0.9, 0.08, 0.7),
        ("GEN", 45.0, 0.8, 0.06, 0.4),
        ("HAN", 30.0, 0.7, 0.05, 0.6),
        ("RAG", -20.0, 0.5, 0.09, 0.1),
    ] {
        state.foreign_nations.push(ForeignNation {
            tag: tag.to_string(),
            relations,
            market_openness: openness,
            expected_return: ret,
            inbound_interest: interest,
        });
    }

    state
}

fn write_events(out: &mut Option<BufWriter<File>>, report: &TickReport) -> anyhow::Result<()> {
    if let Some(writer) = out {
        for event in &report.events {
            let line = serde_json::to_string(event)?;
            writeln!(writer, "{line}")?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&args.log_level),
    )
    .init();

    let config = match &args.config {
        Some(path) => SimConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SimConfig::default(),
    };

    let registry = UnitTypeRegistry::standard();
    let economy = Arc::new(BaselineEconomy::new(registry.clone()));
    let mut state = default_world(args.seed, &registry);
    let mut scheduler = TickScheduler::new(args.speed);
    let mut metrics = SimMetrics::default();

    let mut events_out = match &args.events {
        Some(path) => Some(BufWriter::new(File::create(path).with_context(|| {
            format!("creating event log at {}", path.display())
        })?)),
        None => None,
    };

    let mut bridge = if args.sync {
        None
    } else {
        let mut bridge = ExecutionBridge::spawn(
            economy.clone(),
            Duration::from_millis(args.timeout_ms),
        );
        if bridge.ping() {
            log::debug!("Economy worker is live");
        } else {
            log::warn!("Economy worker failed its liveness check; running synchronously");
        }
        Some(bridge)
    };

    let run_start = Instant::now();
    while state.day < args.days {
        if !scheduler.wait_for_tick() {
            log::info!("Scheduler is paused; stopping at day {}", state.day);
            break;
        }

        let tick_start = Instant::now();
        let report = match bridge.as_mut() {
            Some(bridge) => {
                let id = bridge.submit(state.clone());
                let outcome = bridge.wait_for(id);
                let economy_done = Instant::now();
                metrics.economy_time += economy_done - tick_start;
                match outcome {
                    TickOutcome::Computed(result) => {
                        let report = apply_result(&mut state, *result, &registry, &config);
                        metrics.reconcile_time += economy_done.elapsed();
                        report
                    }
                    TickOutcome::Skipped => continue,
                    TickOutcome::Failed(message) => {
                        log::warn!("Worker failed ({message}); computing this day in-process");
                        run_tick(&mut state, economy.as_ref(), &registry, &config)
                    }
                }
            }
            None => run_tick(&mut state, economy.as_ref(), &registry, &config),
        };
        metrics.total_ticks += 1;
        metrics.total_time += tick_start.elapsed();

        for line in &report.log {
            log::debug!("{line}");
        }
        if !report.audit.balanced() {
            log::warn!(
                "Day {} audit corrected by {:.4}",
                report.day,
                report.audit.correction
            );
        }
        write_events(&mut events_out, &report)?;
    }

    if let Some(writer) = events_out.as_mut() {
        writer.flush()?;
    }

    log::info!(
        "Simulated {} days in {:.2}s ({:.0} days/s, {:.3} ms/tick avg)",
        metrics.total_ticks,
        run_start.elapsed().as_secs_f64(),
        metrics.days_per_second(),
        metrics.tick_avg_ms()
    );
    println!(
        "day {} treasury {:.1} population {:.0} stability {:.1} checksum {:016x}",
        state.day,
        state.treasury,
        state.total_population(),
        state.stability,
        state.checksum()
    );

    Ok(())
}
