//! Configuration types for the simulator.

use slicesim_types::{InterAlgorithm, IntraAlgorithm};
use std::time::Duration;

/// Configuration for a simulation run.
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Component carrier bandwidth, MHz.
    pub bandwidth_mhz: u32,

    /// Carrier frequency, GHz; decides the frequency range.
    pub frequency_ghz: u32,

    /// TDD band.
    pub tdd: bool,

    /// Per-terminal bearer buffer limit, bytes.
    pub max_buffer_bytes: u64,

    /// Inter-slice allocation period.
    pub granularity: Duration,

    /// Inter-slice scheduling algorithm.
    pub inter_algorithm: InterAlgorithm,

    /// Base PRB count, required by the group-rotation scheduler.
    pub base_prb_count: Option<u32>,

    /// Simulation horizon.
    pub horizon: Duration,

    /// Random seed for deterministic simulation.
    pub seed: u64,

    /// One slice is provisioned per terminal group.
    pub groups: Vec<UeGroupConfig>,
}

impl SimulatorConfig {
    pub fn new(bandwidth_mhz: u32, frequency_ghz: u32) -> Self {
        Self {
            bandwidth_mhz,
            frequency_ghz,
            tdd: false,
            max_buffer_bytes: 81_920,
            granularity: Duration::from_millis(1),
            inter_algorithm: InterAlgorithm::RoundRobin,
            base_prb_count: None,
            horizon: Duration::from_secs(20),
            seed: 12345,
            groups: Vec::new(),
        }
    }

    pub fn with_tdd(mut self, tdd: bool) -> Self {
        self.tdd = tdd;
        self
    }

    pub fn with_buffer_limit(mut self, bytes: u64) -> Self {
        self.max_buffer_bytes = bytes;
        self
    }

    pub fn with_granularity(mut self, granularity: Duration) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_inter_algorithm(mut self, algorithm: InterAlgorithm) -> Self {
        self.inter_algorithm = algorithm;
        self
    }

    pub fn with_base_prb_count(mut self, base_prbs: u32) -> Self {
        self.base_prb_count = Some(base_prbs);
        self
    }

    pub fn with_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_group(mut self, group: UeGroupConfig) -> Self {
        self.groups.push(group);
        self
    }

    /// Total number of terminals across all groups.
    pub fn total_ues(&self) -> u32 {
        self.groups.iter().map(|g| g.dl_ues + g.ul_ues).sum()
    }
}

/// One terminal group: the slice it is provisioned into plus the traffic and
/// link parameters shared by its terminals.
#[derive(Clone, Debug)]
pub struct UeGroupConfig {
    /// Slice label; the prefix decides the service class and numerology.
    pub label: String,

    /// Intra-slice scheduling algorithm.
    pub scheduler: IntraAlgorithm,

    pub dl_ues: u32,
    pub ul_ues: u32,

    /// Mean packet size, bytes, per direction.
    pub dl_packet_bytes: f64,
    pub ul_packet_bytes: f64,

    /// Mean packet inter-arrival time, milliseconds, per direction.
    pub dl_interarrival_ms: f64,
    pub ul_interarrival_ms: f64,

    /// Delay budget carried into the slice's service profile, milliseconds.
    pub delay_budget_ms: f64,

    /// Availability target, free-form.
    pub availability: String,

    /// Initial-SINR spec string ("S40": all 40 dB; "D40": decreasing).
    pub sinr_spec: String,

    /// Spatial layers granted to the slice's schedulers.
    pub layers: u8,

    /// Multi-user MIMO mode.
    pub multi_user: bool,

    /// Fraction of sub-frames carrying periodic signaling (TDD scheduler).
    pub signaling_load: f64,

    /// Back the MCS choice off by two indices for reliability.
    pub robust_mcs: bool,
}

impl UeGroupConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            scheduler: IntraAlgorithm::RoundRobin,
            dl_ues: 0,
            ul_ues: 0,
            dl_packet_bytes: 300.0,
            ul_packet_bytes: 300.0,
            dl_interarrival_ms: 5.0,
            ul_interarrival_ms: 5.0,
            delay_budget_ms: 20.0,
            availability: "99.9".into(),
            sinr_spec: "S40".into(),
            layers: 1,
            multi_user: false,
            signaling_load: 0.0,
            robust_mcs: false,
        }
    }

    pub fn with_scheduler(mut self, scheduler: IntraAlgorithm) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_downlink(mut self, ues: u32, packet_bytes: f64, interarrival_ms: f64) -> Self {
        self.dl_ues = ues;
        self.dl_packet_bytes = packet_bytes;
        self.dl_interarrival_ms = interarrival_ms;
        self
    }

    pub fn with_uplink(mut self, ues: u32, packet_bytes: f64, interarrival_ms: f64) -> Self {
        self.ul_ues = ues;
        self.ul_packet_bytes = packet_bytes;
        self.ul_interarrival_ms = interarrival_ms;
        self
    }

    pub fn with_delay_budget(mut self, ms: f64) -> Self {
        self.delay_budget_ms = ms;
        self
    }

    pub fn with_availability(mut self, availability: impl Into<String>) -> Self {
        self.availability = availability.into();
        self
    }

    pub fn with_sinr_spec(mut self, spec: impl Into<String>) -> Self {
        self.sinr_spec = spec.into();
        self
    }

    pub fn with_layers(mut self, layers: u8) -> Self {
        self.layers = layers;
        self
    }

    pub fn with_multi_user(mut self, multi_user: bool) -> Self {
        self.multi_user = multi_user;
        self
    }

    pub fn with_signaling_load(mut self, load: f64) -> Self {
        self.signaling_load = load;
        self
    }

    pub fn with_robust_mcs(mut self, robust: bool) -> Self {
        self.robust_mcs = robust;
        self
    }

    /// Packet arrivals per millisecond for a mean inter-arrival time, 0 for
    /// an unloaded direction.
    pub fn arrival_rate_per_ms(interarrival_ms: f64) -> f64 {
        if interarrival_ms > 0.0 {
            1.0 / interarrival_ms
        } else {
            0.0
        }
    }
}
