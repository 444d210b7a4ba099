//! # Safety I/O Simulator
//!
//! Runs both controllers of a two-channel safety I/O board in lock-step on a
//! simulated board at the configured cycle time. Field inputs, output
//! requests and board faults are set from the command line; the diagnostic
//! engine logs every state transition and test verdict.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use safeio_common::config::LogLevel;
use safeio_common::consts::DEFAULT_CONFIG_PATH;
use safeio_common::diag::fault::FatalFault;
use safeio_common::io::pin::{PinId, Role};
use safeio_core::config::{LoadedConfig, load_config};
use safeio_core::cycle::{CycleRunner, rt_setup};
use safeio_core::hal::FailSafe;
use safeio_core::sim::{LockstepPair, SimFault};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Safety I/O Simulator: lock-step diagnostic engine on a simulated board
#[derive(Parser, Debug)]
#[command(name = "safeio_sim")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Dual-controller safety I/O diagnostics on a simulated board")]
struct Args {
    /// Path to the device configuration TOML.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Number of cycles to run (0 = until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    cycles: u64,

    /// Inputs whose field device is active from the start.
    #[arg(long, value_delimiter = ',', value_name = "PINS")]
    active: Vec<PinId>,

    /// Outputs requested on from the start.
    #[arg(long, value_delimiter = ',', value_name = "OUTPUTS")]
    request: Vec<PinId>,

    /// Board fault to inject (stuck-active:N, stuck-inactive:N, short:N-M,
    /// to-bypass:N, hs-stuck:N, vsup-stuck). Repeatable.
    #[arg(long, value_name = "FAULT")]
    inject: Vec<SimFault>,

    /// Cycle at which the faults are injected.
    #[arg(long, default_value_t = 1000)]
    inject_at: u64,

    /// Cycle at which a global reset is pulsed for one cycle.
    #[arg(long)]
    reset_at: Option<u64>,

    /// CPU core to pin the loop to (`rt` builds).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (`rt` builds).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

/// Safe state of the simulator: log the fault and stop the process.
struct SimFailSafe;

impl FailSafe for SimFailSafe {
    fn halt(&mut self, fault: FatalFault) -> ! {
        error!(%fault, "safe state entered, outputs de-energised");
        process::exit(2);
    }
}

fn main() {
    let args = Args::parse();
    let loaded = load_config(&args.config);
    let configured = loaded
        .as_ref()
        .map(|l| l.device.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, configured);

    info!("Safety I/O simulator v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = loaded
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|loaded| run(&args, loaded));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Safety I/O simulator shutdown complete");
}

fn run(args: &Args, loaded: LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let settings = &loaded.settings;
    info!(
        service = %loaded.device.shared.service_name,
        cycle_time_us = settings.timing.cycle_time_us,
        di_count = settings.topology.di_count(),
        do_count = settings.topology.do_count(),
        worst_case_latency = settings.worst_case_latency(),
        "config OK"
    );

    let mut pair = LockstepPair::new(settings)?;
    for &pin in &args.active {
        pair.board_mut().set_field(pin, true);
    }
    for &output in &args.request {
        pair.payload_mut().request_output(output, true);
    }

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(cpu_core = args.cpu_core, priority = args.rt_priority, "RT setup complete");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut runner = CycleRunner::new(pair, settings.timing.cycle_time_us, running);
    if args.cycles > 0 {
        runner = runner.with_max_cycles(args.cycles);
    }

    let faults = args.inject.clone();
    let inject_at = args.inject_at;
    let reset_at = args.reset_at;
    runner.run(&mut SimFailSafe, |pair| {
        let cycle = pair.cycle();
        if cycle == inject_at {
            for &fault in &faults {
                pair.board_mut().inject(fault);
            }
        }
        if let Some(at) = reset_at {
            pair.payload_mut().global_reset = cycle == at;
        }
    })?;

    report(runner.pair())?;
    Ok(())
}

/// Final pin states as seen by the owning controller.
fn report(pair: &LockstepPair) -> Result<(), FatalFault> {
    let settings = pair.context(Role::A).settings();
    for pin in 0..settings.topology.di_count() {
        info!(
            pin,
            state = ?pair.input_state(pin)?,
            reported = pair.reported(pin),
            "input"
        );
    }
    for output in 0..settings.topology.do_count() {
        info!(
            output,
            state = ?pair.output_state(output)?,
            energised = pair.output_energised(output),
            "output"
        );
    }
    Ok(())
}

fn setup_tracing(args: &Args, configured: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(configured.as_directive()));
    let filter = if args.verbose {
        filter.add_directive(Level::DEBUG.into())
    } else {
        filter
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
