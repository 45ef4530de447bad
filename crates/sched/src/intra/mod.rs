//! Intra-slice scheduler family.
//!
//! Each TTI the scheduler turns the PRB/symbol budget handed down by the
//! inter-slice scheduler into transport blocks: it runs the algorithm's
//! allocation rule, drains bearer buffers (or services retransmissions) into
//! the TB queue, then transmits the queue against each terminal's block error
//! rate.

mod num;
mod pf;
mod rr;
mod tdd;

use crate::registry::UeRegistry;
use crate::ue::{PacketStamp, TbKind, TbQueue, TransportBlock, Ue, MAX_RETRANSMISSIONS};
use indexmap::IndexSet;
use rand::Rng;
use slicesim_types::{
    phy, Direction, FrequencyRange, IntraAlgorithm, Modulation, SliceId, UeId, MCS_TABLE,
    SYMBOLS_PER_SLOT,
};
use std::time::Duration;
use tracing::{debug, trace};

pub use num::{ANGLE_SEPARATION_DEG, RATE_SMOOTHING, TARGET_BER};

/// TB queue slots available per TTI outside TDD mode: the build walk serves
/// up to two terminals per sub-frame, one block each.
const QUEUE_SLOTS: usize = 2;

/// SINR margin (dB) over the MCS threshold at which the block error rate
/// reaches zero.
const BLER_MARGIN_DB: f64 = 3.0;

/// One packet delivered to its terminal this TTI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub ue: UeId,
    pub seq: u64,
    pub delay: Duration,
}

/// What one scheduling tick produced, consumed by the statistics layer.
#[derive(Debug, Clone, Default)]
pub struct TtiOutcome {
    pub delivered: Vec<Delivery>,
}

/// One direction's scheduler inside a slice.
#[derive(Debug, Clone)]
pub struct IntraScheduler {
    pub slice: SliceId,
    pub direction: Direction,
    pub algorithm: IntraAlgorithm,
    /// Connected terminals, in registration order.
    pub ues: IndexSet<UeId>,
    /// Rotating walk start for round-robin orders.
    rr_index: usize,
    /// PRB budget for the current granularity interval.
    pub prb_budget: u32,
    /// Base PRB indices granted by the group-rotation inter-slice scheduler.
    pub assigned_base_prbs: Vec<u32>,
    /// Logical-PRB conversion factor of the owning slice (scs / 15).
    pub numerology_factor: u32,
    /// Symbol budget of one slot.
    pub symbols_per_slot: u32,
    /// Fraction of sub-frames carrying periodic signaling, TDD mode.
    pub signaling_load: f64,
    pub robust_mcs: bool,
    /// Configured spatial layers.
    pub layers: u8,
    /// Multi-user MIMO: the symbol budget scales by layers, TBS does not.
    pub multi_user: bool,
    pub frequency_range: FrequencyRange,
    pub queue: TbQueue,
    /// Sub-frame counter, drives the TDD signaling cadence.
    pub subframe: u64,
    /// Blocks dropped on queue overflow.
    pub dropped_tbs: u64,
}

impl IntraScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        slice: SliceId,
        direction: Direction,
        algorithm: IntraAlgorithm,
        frequency_range: FrequencyRange,
        numerology_factor: u32,
        layers: u8,
        multi_user: bool,
        signaling_load: f64,
        robust_mcs: bool,
    ) -> Self {
        let capacity = match algorithm {
            IntraAlgorithm::Tdd => SYMBOLS_PER_SLOT as usize,
            _ => QUEUE_SLOTS,
        };
        Self {
            slice,
            direction,
            algorithm,
            ues: IndexSet::new(),
            rr_index: 0,
            prb_budget: 0,
            assigned_base_prbs: Vec::new(),
            numerology_factor: numerology_factor.max(1),
            symbols_per_slot: SYMBOLS_PER_SLOT,
            signaling_load,
            robust_mcs,
            layers: layers.max(1),
            multi_user,
            frequency_range,
            queue: TbQueue::new(capacity),
            subframe: 0,
            dropped_tbs: 0,
        }
    }

    /// Register a connected terminal. Idempotent.
    pub fn register(&mut self, ue: UeId) -> bool {
        self.ues.insert(ue)
    }

    pub fn deregister(&mut self, ue: UeId) {
        self.ues.shift_remove(&ue);
    }

    /// Packets currently buffered across this scheduler's terminals.
    pub fn buffered_packets(&self, reg: &UeRegistry) -> usize {
        self.ues
            .iter()
            .map(|&id| {
                reg.get(id)
                    .bearer
                    .as_ref()
                    .map_or(0, |b| b.buffer.len())
            })
            .sum()
    }

    /// Bytes currently buffered across this scheduler's terminals.
    pub fn buffered_bytes(&self, reg: &UeRegistry) -> u64 {
        self.ues.iter().map(|&id| reg.get(id).bearer_bytes()).sum()
    }

    /// Link quality the MCS choice is based on: the mean SNR over the
    /// terminal's assigned base PRBs in trace mode, the scalar otherwise.
    pub fn link_quality(&self, ue: &Ue) -> f64 {
        if ue.assigned_base_prbs.is_empty() || ue.link.snr_per_prb.is_empty() {
            return ue.link.quality_db;
        }
        let mut sum = 0.0;
        let mut n = 0usize;
        for &prb in &ue.assigned_base_prbs {
            if let Some(snr) = ue.link.snr_per_prb.get(prb as usize) {
                sum += snr;
                n += 1;
            }
        }
        if n == 0 {
            ue.link.quality_db
        } else {
            sum / n as f64
        }
    }

    fn effective_layers(&self, ue: &Ue) -> u32 {
        match self.algorithm {
            IntraAlgorithm::Num => ue.assigned_layers.max(1) as u32,
            _ if self.multi_user => 1,
            _ => self.layers as u32,
        }
    }

    fn tb_symbols(&self, ue: &Ue) -> u32 {
        match self.algorithm {
            IntraAlgorithm::Tdd if ue.symbols > 0 => ue.symbols,
            _ => self.symbols_per_slot,
        }
    }

    /// Achievable TB size in bits for `n_prb` resources, without touching the
    /// terminal's state. Used by metric computations.
    pub fn achievable_tbs(&self, ue: &Ue, n_prb: u32) -> f64 {
        if n_prb == 0 {
            return 0.0;
        }
        let entry = &MCS_TABLE[phy::find_mcs(self.link_quality(ue), self.robust_mcs)];
        phy::transport_block_bits(
            entry,
            self.direction,
            self.frequency_range,
            self.tb_symbols(ue),
            n_prb,
            self.effective_layers(ue),
        )
    }

    /// Choose MCS/BLER for the terminal and return the TB size and modulation
    /// for `n_prb` resources.
    fn set_mod(&self, ue: &mut Ue, n_prb: u32) -> (f64, Modulation) {
        let quality = self.link_quality(ue);
        let idx = phy::find_mcs(quality, self.robust_mcs);
        let entry = &MCS_TABLE[idx];
        ue.mcs_index = idx;
        ue.bler = bler(quality - entry.min_sinr_db);
        let bits = if n_prb > 0 {
            phy::transport_block_bits(
                entry,
                self.direction,
                self.frequency_range,
                self.tb_symbols(ue),
                n_prb,
                self.effective_layers(ue),
            )
        } else {
            0.0
        };
        (bits, entry.modulation)
    }

    /// Run one scheduling tick: allocate, build transport blocks, transmit.
    pub fn schedule_tti(
        &mut self,
        reg: &mut UeRegistry,
        rng: &mut impl Rng,
        now: Duration,
    ) -> TtiOutcome {
        match self.algorithm {
            IntraAlgorithm::RoundRobin => {
                rr::allocate(self, reg);
                self.build_walk(reg);
            }
            IntraAlgorithm::ProportionalFair { exp_num, exp_den } => {
                pf::allocate(self, reg, exp_num, exp_den);
                self.build_walk(reg);
            }
            IntraAlgorithm::Tdd => tdd::schedule(self, reg),
            IntraAlgorithm::Num => {
                num::allocate(self, reg);
                self.build_walk(reg);
            }
        }
        let mut out = TtiOutcome::default();
        self.transmit(reg, rng, now, &mut out);
        self.subframe += 1;
        out
    }

    /// Walk terminals from the rotating start, building one TB per terminal
    /// with resources and data, while queue space remains.
    fn build_walk(&mut self, reg: &mut UeRegistry) {
        let ids: Vec<UeId> = self.ues.iter().copied().collect();
        if ids.is_empty() {
            return;
        }
        let start = self.rr_index % ids.len();
        for k in 0..ids.len() {
            if self.queue.free_space() == 0 {
                break;
            }
            let ue = reg.get_mut(ids[(start + k) % ids.len()]);
            if ue.prbs == 0 {
                continue;
            }
            if !ue.pending_tbs.is_empty() {
                self.retransmit(ue);
            } else if ue.has_bearer_packets() {
                self.data_to_tb(ue);
            }
        }
        self.rr_index = (self.rr_index + 1) % ids.len();
    }

    /// Build one transport block from the terminal's bearer buffer and queue
    /// it. Partially consumed packets are truncated and re-queued at the
    /// buffer head. Returns the symbols consumed.
    pub(crate) fn data_to_tb(&mut self, ue: &mut Ue) -> u32 {
        let n_prb = ue.prbs;
        let (bits, modulation) = self.set_mod(ue, n_prb);
        if matches!(self.algorithm, IntraAlgorithm::ProportionalFair { .. }) {
            ue.record_pf_history();
        }
        ue.tb_size_bits = bits;
        let tb_bytes = (bits / 8.0) as u64;

        let mut drained = 0u64;
        let mut stamps = Vec::new();
        let mut last = None;
        if let Some(bearer) = ue.bearer.as_mut() {
            while drained < tb_bytes {
                let Some(p) = bearer.buffer.pop() else { break };
                drained += p.size;
                stamps.push(PacketStamp {
                    seq: p.seq,
                    t_in: p.t_in,
                });
                last = Some(p);
            }
        }
        if stamps.is_empty() {
            // An empty drain still spends the visit's slot.
            return ue.symbols;
        }
        let payload = drained.min(tb_bytes);
        let overflow = drained.saturating_sub(tb_bytes);
        if overflow > 0 {
            if let (Some(mut p), Some(bearer)) = (last, ue.bearer.as_mut()) {
                p.size = overflow;
                bearer.buffer.push_front(p);
            }
        }
        let tb = TransportBlock {
            id: ue.next_tb_id(),
            ue: ue.id,
            direction: self.direction,
            modulation,
            kind: TbKind::Data,
            packets: stamps,
            n_prb,
            payload_bytes: payload,
            retx_count: 0,
        };
        trace!(
            slice = %self.slice,
            dir = %self.direction,
            ue = %ue.id,
            payload,
            n_prb,
            "queued data TB"
        );
        if !self.queue.insert(tb) {
            // Overflow: the block and its packets are gone.
            self.dropped_tbs += 1;
            ue.lost_tbs += 1;
            debug!(slice = %self.slice, ue = %ue.id, "TB queue overflow, block dropped");
        }
        ue.symbols
    }

    /// Service the terminal's oldest pending block. Blocks past the retry
    /// limit are dropped once, their packets counted lost. Returns the
    /// symbols consumed.
    pub(crate) fn retransmit(&mut self, ue: &mut Ue) -> u32 {
        if self.queue.free_space() == 0 {
            return 0;
        }
        let Some(mut tb) = ue.pending_tbs.pop_front() else {
            return 0;
        };
        if tb.retx_count < MAX_RETRANSMISSIONS {
            tb.retx_count += 1;
            trace!(ue = %ue.id, tb = %tb.id, retx = tb.retx_count, "retransmitting TB");
            if !self.queue.insert(tb) {
                self.dropped_tbs += 1;
                ue.lost_tbs += 1;
            }
            self.symbols_per_slot
        } else {
            ue.lost_tbs += 1;
            if tb.kind == TbKind::Data {
                ue.flow.lost_packets += tb.packets.len() as u64;
            }
            debug!(ue = %ue.id, tb = %tb.id, "retry limit reached, TB dropped");
            0
        }
    }

    /// Drain the TB queue, deciding success per block against the terminal's
    /// block error rate. Failed data blocks go back to the terminal's pending
    /// list; signaling is unacknowledged.
    fn transmit(
        &mut self,
        reg: &mut UeRegistry,
        rng: &mut impl Rng,
        now: Duration,
        out: &mut TtiOutcome,
    ) {
        while let Some(tb) = self.queue.pop() {
            let ue = reg.get_mut(tb.ue);
            match tb.kind {
                TbKind::Signaling => {
                    ue.res_use += tb.n_prb as u64;
                }
                TbKind::Data => {
                    if rng.gen::<f64>() >= ue.bler {
                        ue.flow.rcvd_bytes += tb.payload_bytes;
                        ue.res_use += tb.n_prb as u64;
                        ue.txed_tbs += 1;
                        for stamp in &tb.packets {
                            out.delivered.push(Delivery {
                                ue: tb.ue,
                                seq: stamp.seq,
                                delay: now.saturating_sub(stamp.t_in),
                            });
                        }
                    } else {
                        ue.pending_tbs.push_back(tb);
                    }
                }
            }
        }
    }

    pub(crate) fn rotate_index(&mut self) {
        if !self.ues.is_empty() {
            self.rr_index = (self.rr_index + 1) % self.ues.len();
        }
    }

    pub(crate) fn rr_index(&self) -> usize {
        self.rr_index
    }
}

/// Block error rate from the SINR margin over the chosen MCS threshold:
/// zero at `BLER_MARGIN_DB` or more of headroom, 0.5 at or below the
/// threshold, linear in between.
fn bler(margin_db: f64) -> f64 {
    if margin_db >= BLER_MARGIN_DB {
        0.0
    } else if margin_db <= 0.0 {
        0.5
    } else {
        0.5 * (1.0 - margin_db / BLER_MARGIN_DB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ue::RrcState;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use slicesim_radio::RadioLink;
    use slicesim_traffic::{Bearer, Packet, PacketFlow};
    use slicesim_types::{FlowId, TbId};

    fn sched(algorithm: IntraAlgorithm) -> IntraScheduler {
        IntraScheduler::new(
            SliceId(0),
            Direction::Downlink,
            algorithm,
            FrequencyRange::Fr1,
            1,
            1,
            false,
            0.0,
            false,
        )
    }

    fn connected_ue(reg: &mut UeRegistry, sinr: f64) -> UeId {
        let id = reg.next_id();
        let flow = PacketFlow::new(
            FlowId(id.0),
            id,
            Direction::Downlink,
            SliceId(0),
            300.0,
            5.0,
        );
        let mut ue = Ue::new(id, SliceId(0), Direction::Downlink, flow, RadioLink::new(sinr));
        ue.state = RrcState::Connected;
        ue.bearer = Some(Bearer::new(9, Direction::Downlink));
        reg.insert(ue);
        id
    }

    fn buffer_packet(reg: &mut UeRegistry, id: UeId, seq: u64, size: u64) {
        let ue = reg.get_mut(id);
        if let Some(bearer) = ue.bearer.as_mut() {
            bearer.buffer.push(Packet {
                seq,
                size,
                flow: ue.flow.id,
                ue: id,
                t_in: Duration::ZERO,
            });
        }
    }

    #[test]
    fn bler_ramp() {
        assert_eq!(bler(5.0), 0.0);
        assert_eq!(bler(0.0), 0.5);
        assert_eq!(bler(-2.0), 0.5);
        assert!((bler(1.5) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn registration_is_idempotent() {
        let mut s = sched(IntraAlgorithm::RoundRobin);
        assert!(s.register(UeId(3)));
        assert!(!s.register(UeId(3)));
        assert_eq!(s.ues.len(), 1);
    }

    #[test]
    fn high_sinr_round_robin_delivers_everything() {
        let mut s = sched(IntraAlgorithm::RoundRobin);
        let mut reg = UeRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let id = connected_ue(&mut reg, 40.0);
        s.register(id);
        s.prb_budget = 52;
        buffer_packet(&mut reg, id, 1, 330);
        buffer_packet(&mut reg, id, 2, 330);

        let out = s.schedule_tti(&mut reg, &mut rng, Duration::from_millis(1));
        // 40 dB sits well above the top MCS threshold, BLER is zero.
        assert_eq!(out.delivered.len(), 2);
        let ue = reg.get(id);
        assert_eq!(ue.flow.rcvd_bytes, 660);
        assert_eq!(ue.txed_tbs, 1);
        assert!(!ue.has_bearer_packets());
    }

    #[test]
    fn default_walk_serves_two_terminals_per_sub_frame() {
        let mut s = sched(IntraAlgorithm::RoundRobin);
        let mut reg = UeRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let ids: Vec<UeId> = (0..3).map(|_| connected_ue(&mut reg, 40.0)).collect();
        for &id in &ids {
            s.register(id);
            buffer_packet(&mut reg, id, 1, 100);
        }
        s.prb_budget = 52;

        let out = s.schedule_tti(&mut reg, &mut rng, Duration::from_millis(1));
        let served: std::collections::BTreeSet<UeId> =
            out.delivered.iter().map(|d| d.ue).collect();
        assert_eq!(served.len(), QUEUE_SLOTS);
        // The rotating start picks up the remaining terminal next sub-frame.
        let out = s.schedule_tti(&mut reg, &mut rng, Duration::from_millis(2));
        assert!(out.delivered.iter().any(|d| !served.contains(&d.ue)));
    }

    #[test]
    fn empty_drain_still_charges_the_slot() {
        let mut s = sched(IntraAlgorithm::Tdd);
        let mut reg = UeRegistry::new();
        let id = connected_ue(&mut reg, 40.0);
        s.register(id);
        let ue = reg.get_mut(id);
        ue.prbs = 4;
        ue.symbols = SYMBOLS_PER_SLOT;
        let consumed = s.data_to_tb(ue);
        assert_eq!(consumed, SYMBOLS_PER_SLOT);
        assert!(s.queue.is_empty());
    }

    #[test]
    fn oversized_packet_is_truncated_and_requeued() {
        let mut s = sched(IntraAlgorithm::RoundRobin);
        let mut reg = UeRegistry::new();
        let id = connected_ue(&mut reg, 40.0);
        s.register(id);
        let huge = 10_000_000;
        buffer_packet(&mut reg, id, 1, huge);
        {
            let ue = reg.get_mut(id);
            ue.prbs = 10;
            s.data_to_tb(ue);
        }
        let ue = reg.get(id);
        let remainder = ue.bearer.as_ref().unwrap().buffer.bytes();
        assert!(remainder > 0, "partial packet must return to the buffer");
        let expected_tb = (s.achievable_tbs(ue, 10) / 8.0) as u64;
        assert_eq!(remainder, huge - expected_tb);
    }

    #[test]
    fn failed_blocks_move_to_pending_and_retry() {
        let mut s = sched(IntraAlgorithm::RoundRobin);
        let mut reg = UeRegistry::new();
        // Quality right at the MCS 0 threshold: BLER 0.5.
        let id = connected_ue(&mut reg, -6.7);
        s.register(id);
        s.prb_budget = 52;
        buffer_packet(&mut reg, id, 1, 100);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut failed = false;
        for tick in 0..200u64 {
            s.schedule_tti(&mut reg, &mut rng, Duration::from_millis(tick));
            if !reg.get(id).pending_tbs.is_empty() {
                failed = true;
                break;
            }
            if reg.get(id).flow.rcvd_bytes > 0 && !reg.get(id).has_bearer_packets() {
                buffer_packet(&mut reg, id, tick + 2, 100);
            }
        }
        assert!(failed, "a 50% BLER link must fail some block within 200 TTIs");
    }

    #[test]
    fn retry_exhausted_block_is_dropped_once() {
        let mut s = sched(IntraAlgorithm::RoundRobin);
        let mut reg = UeRegistry::new();
        let id = connected_ue(&mut reg, 40.0);
        s.register(id);
        let ue = reg.get_mut(id);
        ue.pending_tbs.push_back(TransportBlock {
            id: TbId(9),
            ue: id,
            direction: Direction::Downlink,
            modulation: Modulation::Qpsk,
            kind: TbKind::Data,
            packets: vec![
                PacketStamp {
                    seq: 7,
                    t_in: Duration::ZERO,
                },
            ],
            n_prb: 4,
            payload_bytes: 50,
            retx_count: MAX_RETRANSMISSIONS,
        });
        let consumed = s.retransmit(reg.get_mut(id));
        assert_eq!(consumed, 0);
        let ue = reg.get(id);
        assert_eq!(ue.lost_tbs, 1);
        assert_eq!(ue.flow.lost_packets, 1);
        assert!(ue.pending_tbs.is_empty());
        assert!(s.queue.is_empty(), "a dropped block is never rescheduled");
    }
}
