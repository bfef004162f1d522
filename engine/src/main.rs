#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code to prevent panics from corrupt data.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! Runs a seeded simulation against the in-memory store.
//!
//! Usage: `record-engine [seed] [batches]`

use record_engine::config::EngineConfig;
use record_engine::simulation::{FaultConfig, Simulator, SimulatorConfig};
use record_engine::telemetry::init_tracing;
use tracing::{error, info};

const DEFAULT_BATCHES: usize = 1_000;

fn main() {
    let loaded = EngineConfig::from_env();
    let fallback = EngineConfig::default();
    init_tracing(loaded.as_ref().unwrap_or(&fallback));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let mut args = std::env::args().skip(1);
    let seed = match args.next().map(|arg| arg.parse::<u64>()) {
        None => 0,
        Some(Ok(seed)) => seed,
        Some(Err(e)) => {
            error!("Invalid seed: {e}");
            std::process::exit(2);
        }
    };
    let batches = match args.next().map(|arg| arg.parse::<usize>()) {
        None => DEFAULT_BATCHES,
        Some(Ok(batches)) => batches,
        Some(Err(e)) => {
            error!("Invalid batch count: {e}");
            std::process::exit(2);
        }
    };

    info!(seed, batches, "starting simulation");
    let simulator_config = SimulatorConfig::new(seed)
        .with_fault_config(FaultConfig::low_faults())
        .with_malformed_rate(0.05)
        .with_engine_config(config);
    let result = Simulator::new(simulator_config).run(batches);

    info!(
        saved = result.saved_records,
        failed = result.failed_records,
        rollbacks = result.atomic_rollbacks,
        "simulation summary"
    );
    if !result.passed() {
        for violation in &result.invariant_violations {
            error!(batch = violation.batch_index, "{}", violation.description);
        }
        std::process::exit(1);
    }
}
