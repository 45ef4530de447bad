//! Observation points the runner reports into while the simulation advances.

use slicesim_types::{Direction, SliceId, UeId};
use std::time::Duration;

/// One periodic per-terminal measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiSample {
    pub time: Duration,
    pub slice: SliceId,
    pub direction: Direction,
    pub ue: UeId,
    pub link_quality_db: f64,
    pub mcs_index: usize,
    pub bler: f64,
    /// PRBs spent on successful transmissions so far.
    pub resources_used: u64,
    pub sent_packets: u64,
    pub lost_packets: u64,
    pub rcvd_bytes: u64,
}

/// One periodic per-slice measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceKpiSample {
    pub time: Duration,
    pub slice: SliceId,
    /// Terminals currently registered with either direction's scheduler.
    pub connected_ues: usize,
    pub dl_prb_budget: u32,
    pub ul_prb_budget: u32,
    pub dl_buffered_bytes: u64,
    pub ul_buffered_bytes: u64,
    /// Current inter-slice PF metric.
    pub metric: f64,
    pub sent_packets: u64,
    pub lost_packets: u64,
    pub rcvd_bytes: u64,
}

/// Receiver of runner observations. Delivery and slice callbacks default to
/// no-ops so sinks that only want per-terminal samples stay small.
pub trait StatsSink {
    fn on_sample(&mut self, sample: &KpiSample);

    fn on_slice_sample(&mut self, sample: &SliceKpiSample) {
        let _ = sample;
    }

    fn on_delivery(&mut self, ue: UeId, delay: Duration) {
        let _ = (ue, delay);
    }
}

/// Sink that keeps everything, used by tests and the report layer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub samples: Vec<KpiSample>,
    pub slice_samples: Vec<SliceKpiSample>,
    pub deliveries: Vec<(UeId, Duration)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsSink for MemorySink {
    fn on_sample(&mut self, sample: &KpiSample) {
        self.samples.push(*sample);
    }

    fn on_slice_sample(&mut self, sample: &SliceKpiSample) {
        self.slice_samples.push(*sample);
    }

    fn on_delivery(&mut self, ue: UeId, delay: Duration) {
        self.deliveries.push((ue, delay));
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatsSink for NullSink {
    fn on_sample(&mut self, _sample: &KpiSample) {}
}
