//! TDD symbol-budgeted intra-slice scheduling.
//!
//! Allocation is made in whole slots: every terminal receives the PRB budget
//! and the slot's symbols, then the build walk consumes a per-TTI symbol
//! budget in round-robin order. Periodic unacknowledged signaling is injected
//! for each terminal on a sub-frame cadence derived from the configured
//! signaling load.

use super::IntraScheduler;
use crate::registry::UeRegistry;
use crate::ue::{PacketStamp, TbKind, TransportBlock};
use slicesim_types::{Modulation, UeId};
use tracing::trace;

/// Bytes of an RRC signaling transport block.
const SIGNALING_TB_BYTES: u64 = 19;

pub(super) fn schedule(sched: &mut IntraScheduler, reg: &mut UeRegistry) {
    let ids: Vec<UeId> = sched.ues.iter().copied().collect();
    if ids.is_empty() {
        return;
    }
    for &id in &ids {
        let ue = reg.get_mut(id);
        ue.prbs = sched.prb_budget;
        ue.symbols = sched.symbols_per_slot;
    }

    let budget = if sched.prb_budget == 0 {
        0
    } else if sched.multi_user {
        sched.symbols_per_slot * sched.layers as u32
    } else {
        sched.symbols_per_slot
    };

    let mut consumed = 0u32;
    let mut rotation_consumed = false;
    let mut visits = 0usize;
    while consumed < budget {
        let id = ids[sched.rr_index() % ids.len()];
        let before = consumed;
        let ue = reg.get_mut(id);
        if ue.symbols > 0 && ue.bearer.is_some() {
            if ue.pending_tbs.is_empty() {
                consumed += signaling(sched, reg.get_mut(id));
                let ue = reg.get_mut(id);
                if consumed < budget && ue.has_bearer_packets() {
                    consumed += sched.data_to_tb(ue);
                }
            } else {
                consumed += sched.retransmit(ue);
            }
        }
        rotation_consumed |= consumed > before;
        sched.rotate_index();
        visits += 1;
        if sched.buffered_packets(reg) == 0 {
            break;
        }
        // A full rotation that consumed nothing means no terminal can take
        // more this TTI.
        if visits % ids.len() == 0 {
            if !rotation_consumed {
                break;
            }
            rotation_consumed = false;
        }
    }
}

/// Insert an unacknowledged signaling TB when the terminal's cadence sub-frame
/// comes up: `(subframe - ordinal) % round(1/load) == 0`. Consumes the whole
/// slot's symbols.
fn signaling(sched: &mut IntraScheduler, ue: &mut crate::ue::Ue) -> u32 {
    if sched.signaling_load <= 0.0 {
        return 0;
    }
    let period = (1.0 / sched.signaling_load) as i64;
    if period == 0 {
        return 0;
    }
    let due = (sched.subframe as i64 - ue.id.ordinal() as i64).rem_euclid(period) == 0;
    if !due {
        return 0;
    }
    let seq = ue.flow.take_seq();
    let tb = TransportBlock {
        id: ue.next_tb_id(),
        ue: ue.id,
        direction: sched.direction,
        modulation: Modulation::Qpsk,
        kind: TbKind::Signaling,
        packets: vec![PacketStamp {
            seq,
            t_in: std::time::Duration::ZERO,
        }],
        n_prb: ue.prbs,
        payload_bytes: SIGNALING_TB_BYTES,
        retx_count: 0,
    };
    trace!(ue = %ue.id, subframe = sched.subframe, "signaling TB");
    if !sched.queue.insert(tb) {
        sched.dropped_tbs += 1;
        return 0;
    }
    sched.symbols_per_slot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ue::{RrcState, Ue, MAX_RETRANSMISSIONS};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use slicesim_radio::RadioLink;
    use slicesim_traffic::{Bearer, Packet, PacketFlow};
    use slicesim_types::{
        Direction, FlowId, FrequencyRange, IntraAlgorithm, SliceId, TbId,
    };
    use std::time::Duration;

    fn setup(n: usize, signaling_load: f64) -> (IntraScheduler, UeRegistry) {
        let mut sched = IntraScheduler::new(
            SliceId(0),
            Direction::Downlink,
            IntraAlgorithm::Tdd,
            FrequencyRange::Fr1,
            1,
            1,
            false,
            signaling_load,
            false,
        );
        sched.prb_budget = 52;
        let mut reg = UeRegistry::new();
        for _ in 0..n {
            let id = reg.next_id();
            let flow =
                PacketFlow::new(FlowId(id.0), id, Direction::Downlink, SliceId(0), 300.0, 5.0);
            let mut ue =
                Ue::new(id, SliceId(0), Direction::Downlink, flow, RadioLink::new(35.0));
            ue.state = RrcState::Connected;
            ue.bearer = Some(Bearer::new(9, Direction::Downlink));
            reg.insert(ue);
            sched.register(id);
        }
        (sched, reg)
    }

    fn buffer_packet(reg: &mut UeRegistry, id: UeId, seq: u64) {
        let ue = reg.get_mut(id);
        if let Some(b) = ue.bearer.as_mut() {
            b.buffer.push(Packet {
                seq,
                size: 150,
                flow: ue.flow.id,
                ue: id,
                t_in: Duration::ZERO,
            });
        }
    }

    #[test]
    fn signaling_follows_the_subframe_cadence() {
        // Load 0.25 -> period 4; ue1 (ordinal 1) signals on subframes 1, 5, ...
        let (mut sched, mut reg) = setup(1, 0.25);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut signaled_at = Vec::new();
        for tick in 0..9u64 {
            let res_before = reg.get(UeId(0)).res_use;
            sched.schedule_tti(&mut reg, &mut rng, Duration::from_millis(tick));
            if reg.get(UeId(0)).res_use > res_before {
                signaled_at.push(tick);
            }
        }
        assert_eq!(signaled_at, vec![1, 5], "cadence (subframe-1) % 4 == 0");
    }

    #[test]
    fn data_and_signaling_share_the_symbol_budget() {
        let (mut sched, mut reg) = setup(1, 1.0);
        buffer_packet(&mut reg, UeId(0), 1);
        // Period 1: signaling due every subframe after the first; with the
        // slot consumed by signaling no data TB fits the budget.
        sched.subframe = 1;
        schedule(&mut sched, &mut reg);
        assert_eq!(sched.queue.len(), 1);
        assert!(reg.get(UeId(0)).has_bearer_packets());
    }

    #[test]
    fn retransmission_exhaustion_drops_exactly_once() {
        let (mut sched, mut reg) = setup(1, 0.0);
        let ue = reg.get_mut(UeId(0));
        ue.pending_tbs.push_back(TransportBlock {
            id: TbId(1),
            ue: UeId(0),
            direction: Direction::Downlink,
            modulation: Modulation::Qpsk,
            kind: TbKind::Data,
            packets: vec![PacketStamp {
                seq: 1,
                t_in: Duration::ZERO,
            }],
            n_prb: 4,
            payload_bytes: 80,
            retx_count: MAX_RETRANSMISSIONS,
        });
        schedule(&mut sched, &mut reg);
        let ue = reg.get(UeId(0));
        assert!(ue.pending_tbs.is_empty());
        assert_eq!(ue.lost_tbs, 1);
        assert!(sched.queue.is_empty());
        // A second tick must not resurrect the block.
        schedule(&mut sched, &mut reg);
        assert_eq!(reg.get(UeId(0)).lost_tbs, 1);
    }

    #[test]
    fn multi_user_walk_revisits_a_backlogged_terminal() {
        let (mut sched, mut reg) = setup(1, 0.0);
        sched.layers = 2;
        sched.multi_user = true;
        sched.prb_budget = 4;
        for seq in 0..200 {
            buffer_packet(&mut reg, UeId(0), seq);
        }
        schedule(&mut sched, &mut reg);
        // Two layers double the symbol budget to 28: the walk comes back to
        // the backlogged terminal for a second 14-symbol block.
        assert_eq!(sched.queue.len(), 2);
        assert!(reg.get(UeId(0)).has_bearer_packets());
    }

    #[test]
    fn walk_stops_at_the_symbol_budget() {
        let (mut sched, mut reg) = setup(3, 0.0);
        for id in [UeId(0), UeId(1), UeId(2)] {
            buffer_packet(&mut reg, id, 1);
        }
        schedule(&mut sched, &mut reg);
        // One slot budget: only the first terminal's data TB fits.
        assert_eq!(sched.queue.len(), 1);
    }
}
