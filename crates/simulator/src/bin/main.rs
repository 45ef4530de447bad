//! Slicesim CLI
//!
//! Run deterministic sliced-cell scheduling simulations with configurable
//! parameters.
//!
//! # Example
//!
//! ```bash
//! # Two eMBB slices of two downlink terminals each, fixed seed
//! slicesim --seed 42 -s 2 -u 2 -d 20
//!
//! # Proportional fair on both levels, heavier traffic
//! slicesim --inter PF11 --sched PF11 --packet-bytes 1500 --interarrival-ms 2
//!
//! # Channel-trace scenario replayed from a dataset directory
//! slicesim --scenario scenario.json --trace-dir datasets/run0 --inter ROT --sched NUM
//! ```

use clap::Parser;
use slicesim_radio::SceneDir;
use slicesim_simulator::{Simulator, SimulatorConfig, UeGroupConfig};
use slicesim_types::{InterAlgorithm, IntraAlgorithm, TraceScenarioConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Slicesim
///
/// Runs deterministic radio-resource scheduling simulations of a sliced
/// cell. Single-threaded, reproducible when the same seed is used.
#[derive(Parser, Debug)]
#[command(name = "slicesim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Simulation duration in seconds
    #[arg(short = 'd', long, default_value = "20")]
    duration: u64,

    /// Random seed for reproducible results. When omitted, a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Carrier bandwidth in MHz
    #[arg(short = 'b', long, default_value = "10")]
    bandwidth: u32,

    /// Carrier frequency in GHz
    #[arg(short = 'f', long, default_value = "3")]
    frequency: u32,

    /// TDD band
    #[arg(long)]
    tdd: bool,

    /// Inter-slice scheduler identifier (RR, RRp, PFxy, DT, ROT)
    #[arg(long, default_value = "RR")]
    inter: String,

    /// Intra-slice scheduler identifier (RR, PFxy, TDD, NUM)
    #[arg(long, default_value = "RR")]
    sched: String,

    /// Number of slices
    #[arg(short = 's', long, default_value = "2")]
    slices: u32,

    /// Downlink terminals per slice
    #[arg(short = 'u', long, default_value = "2")]
    ues: u32,

    /// Mean packet size in bytes
    #[arg(long, default_value = "300")]
    packet_bytes: f64,

    /// Mean packet inter-arrival time in milliseconds
    #[arg(long, default_value = "5")]
    interarrival_ms: f64,

    /// Initial-SINR spec ("S40": all at 40 dB, "D37": decreasing from 37 dB)
    #[arg(long, default_value = "S40")]
    sinr: String,

    /// Per-terminal bearer buffer limit in bytes
    #[arg(long, default_value = "81920")]
    buffer: u64,

    /// Inter-slice allocation period in milliseconds
    #[arg(long, default_value = "1")]
    granularity_ms: u64,

    /// Slice label prefix; decides the service class and numerology
    #[arg(long, default_value = "eMBB")]
    label: String,

    /// Channel-trace scenario file. Overrides bandwidth, frequency, duration
    /// and the slice layout.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Dataset directory with one scene subdirectory per terminal group
    #[arg(long, requires = "scenario")]
    trace_dir: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,slicesim=info")),
        )
        .init();

    let args = Args::parse();

    let inter: InterAlgorithm = args.inter.parse().expect("inter-slice scheduler identifier");
    let sched: IntraAlgorithm = args.sched.parse().expect("intra-slice scheduler identifier");
    let seed = args.seed.unwrap_or_else(rand::random);

    let scenario = args
        .scenario
        .as_ref()
        .map(|path| TraceScenarioConfig::from_file(path).expect("scenario file"));

    let config = match &scenario {
        Some(scenario) => {
            let mut config = SimulatorConfig::new(scenario.bandwidth_mhz, scenario.frequency_ghz)
                .with_tdd(args.tdd)
                .with_buffer_limit(args.buffer)
                .with_granularity(Duration::from_millis(args.granularity_ms))
                .with_inter_algorithm(inter)
                .with_base_prb_count(scenario.base_prb_count)
                .with_horizon(Duration::from_millis(scenario.sim_duration_ms))
                .with_seed(seed);
            for (name, group) in &scenario.ue_groups {
                config = config.with_group(
                    UeGroupConfig::new(name.clone())
                        .with_scheduler(sched)
                        .with_downlink(group.ue_count, args.packet_bytes, args.interarrival_ms)
                        .with_sinr_spec(&args.sinr),
                );
            }
            config
        }
        None => {
            let mut config = SimulatorConfig::new(args.bandwidth, args.frequency)
                .with_tdd(args.tdd)
                .with_buffer_limit(args.buffer)
                .with_granularity(Duration::from_millis(args.granularity_ms))
                .with_inter_algorithm(inter)
                .with_horizon(Duration::from_secs(args.duration))
                .with_seed(seed);
            for i in 0..args.slices {
                config = config.with_group(
                    UeGroupConfig::new(format!("{}-{i}", args.label))
                        .with_scheduler(sched)
                        .with_downlink(args.ues, args.packet_bytes, args.interarrival_ms)
                        .with_sinr_spec(&args.sinr),
                );
            }
            config
        }
    };

    info!(
        bandwidth_mhz = config.bandwidth_mhz,
        frequency_ghz = config.frequency_ghz,
        inter = %config.inter_algorithm,
        slices = config.groups.len(),
        ues = config.total_ues(),
        horizon_secs = config.horizon.as_secs(),
        seed,
        "Starting simulation"
    );

    let mut simulator = Simulator::new(config).expect("Failed to create simulator");

    // In a trace-driven run each group replays its own scene directory; a
    // static dataset holds one scene, so the replay interval never fires.
    if let (Some(scenario), Some(trace_dir)) = (&scenario, &args.trace_dir) {
        let interval = if scenario.is_dynamic {
            Duration::from_millis(scenario.refresh_rate_ms)
        } else {
            Duration::from_millis(scenario.sim_duration_ms)
        };
        for (group, name) in scenario.ue_groups.keys().enumerate() {
            simulator
                .attach_scene_group(group, Box::new(SceneDir::new(trace_dir.join(name))), interval)
                .expect("scene dataset");
        }
    }

    let report = simulator.run().expect("Simulation failed");
    report.print_summary();
}
