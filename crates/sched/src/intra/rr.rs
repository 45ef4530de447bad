//! Round-robin intra-slice allocation: every terminal gets the full slice
//! budget; the build walk's rotating start serves them one at a time per
//! sub-frame.

use super::IntraScheduler;
use crate::registry::UeRegistry;

pub(super) fn allocate(sched: &IntraScheduler, reg: &mut UeRegistry) {
    for &id in &sched.ues {
        let ue = reg.get_mut(id);
        ue.prbs = sched.prb_budget;
        ue.symbols = sched.symbols_per_slot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ue::{RrcState, Ue};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use slicesim_radio::RadioLink;
    use slicesim_traffic::{Bearer, Packet, PacketFlow};
    use slicesim_types::{
        Direction, FlowId, FrequencyRange, IntraAlgorithm, SliceId, UeId,
    };
    use std::time::Duration;

    fn setup(n: usize) -> (IntraScheduler, UeRegistry) {
        let mut sched = IntraScheduler::new(
            SliceId(0),
            Direction::Downlink,
            IntraAlgorithm::RoundRobin,
            FrequencyRange::Fr1,
            1,
            1,
            false,
            0.0,
            false,
        );
        sched.prb_budget = 40;
        let mut reg = UeRegistry::new();
        for _ in 0..n {
            let id = reg.next_id();
            let flow =
                PacketFlow::new(FlowId(id.0), id, Direction::Downlink, SliceId(0), 300.0, 5.0);
            let mut ue =
                Ue::new(id, SliceId(0), Direction::Downlink, flow, RadioLink::new(30.0));
            ue.state = RrcState::Connected;
            let mut bearer = Bearer::new(9, Direction::Downlink);
            bearer.buffer.push(Packet {
                seq: 1,
                size: 200,
                flow: ue.flow.id,
                ue: id,
                t_in: Duration::ZERO,
            });
            ue.bearer = Some(bearer);
            reg.insert(ue);
            sched.register(id);
        }
        (sched, reg)
    }

    #[test]
    fn every_terminal_gets_the_full_budget() {
        let (sched, mut reg) = setup(3);
        allocate(&sched, &mut reg);
        for id in [UeId(0), UeId(1), UeId(2)] {
            assert_eq!(reg.get(id).prbs, 40);
        }
    }

    #[test]
    fn walk_start_rotates_between_ttis() {
        let (mut sched, mut reg) = setup(3);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let before = sched.rr_index();
        sched.schedule_tti(&mut reg, &mut rng, Duration::from_millis(1));
        assert_eq!(sched.rr_index(), (before + 1) % 3);
    }
}
