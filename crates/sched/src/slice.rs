//! A slice: one named partition of the cell's resources with its service
//! profile, per-direction intra-slice schedulers and the inter-slice PF
//! bookkeeping.

use crate::intra::IntraScheduler;
use crate::registry::UeRegistry;
use slicesim_types::{
    Direction, FrequencyRange, IntraAlgorithm, ServiceClass, ServiceProfile, SliceId,
};
use std::collections::VecDeque;
use std::time::Duration;

/// Sliding-window length of the received-bytes history read by the
/// inter-slice proportional-fair metric.
pub const RCVD_WINDOW: usize = 10;

#[derive(Debug, Clone)]
pub struct Slice {
    pub id: SliceId,
    pub label: String,
    pub service: ServiceClass,
    pub profile: ServiceProfile,
    /// Sub-carrier spacing, kHz, fixed by the service class.
    pub scs_khz: u32,
    /// PRB conversion factor relative to 15 kHz numerology.
    pub numerology_factor: u32,
    /// Scheduling tick of this slice's intra schedulers.
    pub tti: Duration,
    pub dl: IntraScheduler,
    pub ul: IntraScheduler,
    /// Received-bytes samples, oldest first.
    pub rcvd_bytes: VecDeque<u64>,
    /// Current inter-slice PF metric.
    pub metric: f64,
    /// Base PRB indices granted by the group-rotation scheduler.
    pub assigned_base_prbs: Vec<u32>,
}

impl Slice {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: SliceId,
        label: impl Into<String>,
        algorithm: IntraAlgorithm,
        frequency_range: FrequencyRange,
        layers: u8,
        multi_user: bool,
        signaling_load: f64,
        robust_mcs: bool,
        profile: ServiceProfile,
    ) -> Self {
        let label = label.into();
        let service = ServiceClass::from_label(&label);
        let scs_khz = service.scs_khz();
        let numerology_factor = scs_khz / 15;
        // Higher numerologies shorten the slot proportionally.
        let tti = Duration::from_secs_f64(0.001 * 15.0 / scs_khz as f64);
        let scheduler = |direction| {
            IntraScheduler::new(
                id,
                direction,
                algorithm,
                frequency_range,
                numerology_factor,
                layers,
                multi_user,
                signaling_load,
                robust_mcs,
            )
        };
        Self {
            id,
            label,
            service,
            profile,
            scs_khz,
            numerology_factor,
            tti,
            dl: scheduler(Direction::Downlink),
            ul: scheduler(Direction::Uplink),
            rcvd_bytes: VecDeque::new(),
            metric: 0.0,
            assigned_base_prbs: Vec::new(),
        }
    }

    pub fn scheduler(&self, direction: Direction) -> &IntraScheduler {
        match direction {
            Direction::Downlink => &self.dl,
            Direction::Uplink => &self.ul,
        }
    }

    pub fn scheduler_mut(&mut self, direction: Direction) -> &mut IntraScheduler {
        match direction {
            Direction::Downlink => &mut self.dl,
            Direction::Uplink => &mut self.ul,
        }
    }

    /// Push the new PRB budget into both directions' schedulers.
    pub fn update_config(&mut self, prbs: u32) {
        self.dl.prb_budget = prbs;
        self.ul.prb_budget = prbs;
    }

    /// Hand a set of base PRB indices to both directions (trace mode).
    pub fn set_base_prbs(&mut self, prbs: Vec<u32>) {
        let logical = (prbs.len() as u32) / self.numerology_factor;
        self.dl.assigned_base_prbs = prbs.clone();
        self.ul.assigned_base_prbs = prbs.clone();
        self.assigned_base_prbs = prbs;
        self.update_config(logical);
    }

    /// Append a received-bytes sample, evicting the oldest past the window.
    pub fn push_rcvd_sample(&mut self, bytes: u64) {
        if self.rcvd_bytes.len() >= RCVD_WINDOW {
            self.rcvd_bytes.pop_front();
        }
        self.rcvd_bytes.push_back(bytes);
    }

    /// Received-bytes delta over the window, 1 when flat or empty.
    pub fn rcvd_delta(&self) -> f64 {
        let first = self.rcvd_bytes.front().copied().unwrap_or(0);
        let last = self.rcvd_bytes.back().copied().unwrap_or(0);
        let delta = last.saturating_sub(first);
        if delta == 0 {
            1.0
        } else {
            delta as f64
        }
    }

    pub fn has_buffered_traffic(&self, reg: &UeRegistry) -> bool {
        self.dl.buffered_packets(reg) > 0 || self.ul.buffered_packets(reg) > 0
    }

    /// Total bytes waiting in this slice, per direction.
    pub fn buffered_bytes(&self, reg: &UeRegistry) -> (u64, u64) {
        (self.dl.buffered_bytes(reg), self.ul.buffered_bytes(reg))
    }
}
