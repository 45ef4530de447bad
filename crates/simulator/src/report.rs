//! Post-run report: per-terminal and per-slice KPIs plus packet-delay
//! percentiles.

use hdrhistogram::Histogram;
use slicesim_sched::Cell;
use slicesim_simulation::MemorySink;
use slicesim_traffic::FlowKpis;
use slicesim_types::{Direction, SliceId, UeId};
use std::time::Duration;

/// Final measurements of one terminal's flow.
#[derive(Debug, Clone)]
pub struct UeReport {
    pub ue: UeId,
    pub slice: SliceId,
    pub direction: Direction,
    pub sent_packets: u64,
    pub lost_packets: u64,
    pub rcvd_bytes: u64,
    pub kpis: FlowKpis,
}

/// Aggregated measurements of one slice.
#[derive(Debug, Clone)]
pub struct SliceReport {
    pub slice: SliceId,
    pub label: String,
    pub sent_packets: u64,
    pub lost_packets: u64,
    pub rcvd_bytes: u64,
    pub packet_loss_rate_pct: f64,
    /// Sum of the slice terminals' throughputs, Mbps.
    pub throughput_mbps: f64,
}

/// Everything a run produced, built once after the horizon.
pub struct SimulationReport {
    pub ues: Vec<UeReport>,
    pub slices: Vec<SliceReport>,
    /// Delivered-packet delay distribution, microseconds.
    delays: Histogram<u64>,
}

impl SimulationReport {
    pub(crate) fn build(cell: &Cell, sink: &MemorySink, horizon: Duration) -> Self {
        let horizon_ms = horizon.as_secs_f64() * 1000.0;
        let ues: Vec<UeReport> = cell
            .ues
            .iter()
            .map(|u| UeReport {
                ue: u.id,
                slice: u.slice,
                direction: u.direction,
                sent_packets: u.flow.sent_packets,
                lost_packets: u.flow.lost_packets,
                rcvd_bytes: u.flow.rcvd_bytes,
                kpis: u.flow.kpis(horizon_ms),
            })
            .collect();

        let slices = cell
            .slices
            .iter()
            .map(|(&id, slice)| {
                let mine = ues.iter().filter(|u| u.slice == id);
                let (mut sent, mut lost, mut rcvd, mut throughput) = (0u64, 0u64, 0u64, 0.0f64);
                for u in mine {
                    sent += u.sent_packets;
                    lost += u.lost_packets;
                    rcvd += u.rcvd_bytes;
                    throughput += u.kpis.throughput_mbps;
                }
                let packet_loss_rate_pct = if sent > 0 {
                    100.0 * lost as f64 / sent as f64
                } else {
                    0.0
                };
                SliceReport {
                    slice: id,
                    label: slice.label.clone(),
                    sent_packets: sent,
                    lost_packets: lost,
                    rcvd_bytes: rcvd,
                    packet_loss_rate_pct,
                    throughput_mbps: throughput,
                }
            })
            .collect();

        // Three significant figures always yields a valid histogram.
        let mut delays =
            Histogram::<u64>::new(3).expect("histogram with 3 significant figures");
        for (_, delay) in &sink.deliveries {
            delays.saturating_record(delay.as_micros() as u64);
        }

        Self { ues, slices, delays }
    }

    pub fn delivered_packets(&self) -> u64 {
        self.delays.len()
    }

    /// Delivery-delay quantile (`0.0..=1.0`). Zero when nothing was
    /// delivered.
    pub fn delay_at_quantile(&self, quantile: f64) -> Duration {
        Duration::from_micros(self.delays.value_at_quantile(quantile))
    }

    pub fn p50_delay(&self) -> Duration {
        self.delay_at_quantile(0.50)
    }

    pub fn p99_delay(&self) -> Duration {
        self.delay_at_quantile(0.99)
    }

    /// Print the per-slice table and delay percentiles to stdout.
    pub fn print_summary(&self) {
        println!("=== Slice KPIs ===");
        for s in &self.slices {
            println!(
                "{:<16} sent {:>8}  lost {:>8}  PLR {:>6.2}%  rcvd {:>12} B  {:>8.3} Mbps",
                s.label, s.sent_packets, s.lost_packets, s.packet_loss_rate_pct, s.rcvd_bytes,
                s.throughput_mbps,
            );
        }
        if self.delays.is_empty() {
            println!("no packets delivered");
        } else {
            println!(
                "delay p50 {:?}  p95 {:?}  p99 {:?}  max {:?}",
                self.p50_delay(),
                self.delay_at_quantile(0.95),
                self.p99_delay(),
                Duration::from_micros(self.delays.max()),
            );
        }
    }
}
