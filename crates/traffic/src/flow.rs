//! Per-terminal traffic flows with truncated heavy-tailed generation.

use crate::packet::{Packet, PacketQueue};
use rand::Rng;
use slicesim_types::{Direction, FlowId, SliceId, UeId};
use std::time::Duration;

/// Pareto shape parameter for packet sizes and inter-arrival times.
const PARETO_SHAPE: f64 = 1.2;

/// Protocol header bytes added to every generated payload.
const HEADER_BYTES: f64 = 30.0;

/// Fraction of the horizon during which traffic is generated. The tail is
/// left free so in-flight packets can drain before KPIs are computed.
pub const TRAFFIC_FRACTION: f64 = 0.83;

/// A packet flow: traffic-generation parameters plus the counters the
/// statistics layer reads.
#[derive(Debug, Clone)]
pub struct PacketFlow {
    pub id: FlowId,
    pub ue: UeId,
    pub direction: Direction,
    pub slice: SliceId,
    /// Configured mean packet size, bytes.
    pub mean_packet_bytes: f64,
    /// Configured mean inter-arrival time, milliseconds.
    pub mean_interarrival_ms: f64,
    /// Hard cap for a single size draw; larger draws are resampled.
    size_cap: f64,
    /// Hard cap for a single inter-arrival draw; larger draws are resampled.
    interarrival_cap: f64,
    /// Application-side buffer feeding the connection process.
    pub app_buffer: PacketQueue,
    pub sent_packets: u64,
    pub lost_packets: u64,
    pub rcvd_bytes: u64,
    next_seq: u64,
}

impl PacketFlow {
    pub fn new(
        id: FlowId,
        ue: UeId,
        direction: Direction,
        slice: SliceId,
        mean_packet_bytes: f64,
        mean_interarrival_ms: f64,
    ) -> Self {
        Self {
            id,
            ue,
            direction,
            slice,
            mean_packet_bytes,
            mean_interarrival_ms,
            size_cap: mean_packet_bytes / 350.0 * 600.0,
            interarrival_cap: mean_interarrival_ms / 6.0 * 12.5,
            app_buffer: PacketQueue::new(),
            sent_packets: 0,
            lost_packets: 0,
            rcvd_bytes: 0,
            next_seq: 1,
        }
    }

    /// Random start offset for the first packet, milliseconds (`Exp(1)`).
    pub fn start_offset_ms(rng: &mut impl Rng) -> f64 {
        -(1.0 - rng.gen::<f64>()).ln()
    }

    /// Generate one packet into the application buffer and return the delay
    /// until the next arrival.
    pub fn generate(&mut self, rng: &mut impl Rng, now: Duration) -> Duration {
        self.sent_packets += 1;
        let size = self.sample_size(rng) + HEADER_BYTES;
        let packet = Packet {
            seq: self.next_seq,
            size: size as u64,
            flow: self.id,
            ue: self.ue,
            t_in: now,
        };
        self.next_seq += 1;
        self.app_buffer.push(packet);
        Duration::from_secs_f64(self.sample_interarrival(rng) / 1000.0)
    }

    /// Consume the next sequence number directly, used for signaling blocks
    /// that bypass the application buffer.
    pub fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn sample_size(&self, rng: &mut impl Rng) -> f64 {
        truncated_pareto(rng, self.mean_packet_bytes, self.size_cap)
    }

    fn sample_interarrival(&self, rng: &mut impl Rng) -> f64 {
        truncated_pareto(rng, self.mean_interarrival_ms, self.interarrival_cap)
    }

    /// Post-run KPIs for this flow.
    pub fn kpis(&self, sim_duration_ms: f64) -> FlowKpis {
        let packet_loss_rate_pct = if self.sent_packets > 0 {
            100.0 * self.lost_packets as f64 / self.sent_packets as f64
        } else {
            0.0
        };
        // Throughput is only meaningful for runs longer than a second.
        let throughput_mbps = if sim_duration_ms > 1000.0 {
            self.rcvd_bytes as f64 * 8000.0 / (TRAFFIC_FRACTION * sim_duration_ms * 1024.0 * 1024.0)
        } else {
            0.0
        };
        FlowKpis {
            packet_loss_rate_pct,
            throughput_mbps,
        }
    }
}

/// Aggregate flow measurements computed after the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowKpis {
    pub packet_loss_rate_pct: f64,
    pub throughput_mbps: f64,
}

/// Pareto(shape 1.2) draw scaled by `mean * 0.2/1.2`, resampled while it
/// exceeds `cap`.
fn truncated_pareto(rng: &mut impl Rng, mean: f64, cap: f64) -> f64 {
    let scale = mean * (0.2 / PARETO_SHAPE);
    loop {
        let u = 1.0 - rng.gen::<f64>();
        let draw = scale / u.powf(1.0 / PARETO_SHAPE);
        if draw <= cap {
            return draw;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn flow() -> PacketFlow {
        PacketFlow::new(
            FlowId(1),
            UeId(0),
            Direction::Downlink,
            SliceId(0),
            350.0,
            6.0,
        )
    }

    #[test]
    fn draws_respect_hard_caps() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let f = flow();
        for _ in 0..10_000 {
            assert!(f.sample_size(&mut rng) <= 600.0);
            assert!(f.sample_interarrival(&mut rng) <= 12.5);
        }
    }

    #[test]
    fn generation_counts_and_sequences() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut f = flow();
        let next = f.generate(&mut rng, Duration::from_millis(3));
        assert!(next > Duration::ZERO);
        assert_eq!(f.sent_packets, 1);
        assert_eq!(f.app_buffer.len(), 1);
        let p = f.app_buffer.pop().unwrap();
        assert_eq!(p.seq, 1);
        assert!(p.size >= HEADER_BYTES as u64);
        assert_eq!(p.t_in, Duration::from_millis(3));
    }

    #[test]
    fn same_seed_same_draws() {
        let f = flow();
        let mut a = ChaCha8Rng::seed_from_u64(99);
        let mut b = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..100 {
            assert_eq!(f.sample_size(&mut a), f.sample_size(&mut b));
        }
    }

    #[test]
    fn kpi_formulas() {
        let mut f = flow();
        f.sent_packets = 200;
        f.lost_packets = 10;
        f.rcvd_bytes = 1024 * 1024;
        let k = f.kpis(20_000.0);
        assert!((k.packet_loss_rate_pct - 5.0).abs() < 1e-9);
        let expected = 1024.0 * 1024.0 * 8000.0 / (0.83 * 20_000.0 * 1024.0 * 1024.0);
        assert!((k.throughput_mbps - expected).abs() < 1e-9);
        // Short runs report zero throughput.
        assert_eq!(f.kpis(500.0).throughput_mbps, 0.0);
    }
}
