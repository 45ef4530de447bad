//! Network-utility-maximization intra-slice allocation for channel-trace
//! scenarios with multi-antenna terminals.
//!
//! Base PRBs arrive from the group-rotation inter-slice scheduler and are
//! grouped by the slice's numerology factor into logical resources. Each
//! resource goes to the candidate terminal group with the highest summed
//! utility `throughput / fairnessWeight`; groups are valid when every member
//! pair is angularly separated. Subset enumeration order is fixed (ascending
//! bitmask) so ties resolve deterministically.

use super::IntraScheduler;
use crate::registry::UeRegistry;
use slicesim_types::UeId;
use tracing::trace;

/// Minimum angle-of-departure separation between paired terminals, degrees.
pub const ANGLE_SEPARATION_DEG: f64 = 10.0;

/// Target block error rate in the spectral-efficiency scaling
/// `B = -1.5 / ln(5 * BER)`.
pub const TARGET_BER: f64 = 1e-3;

/// Exponential smoothing constant of the fairness weight.
pub const RATE_SMOOTHING: f64 = 0.7;

pub(super) fn allocate(sched: &mut IntraScheduler, reg: &mut UeRegistry) {
    for &id in &sched.ues {
        let ue = reg.get_mut(id);
        ue.assigned_base_prbs.clear();
        ue.prbs = 0;
        ue.symbols = sched.symbols_per_slot;
    }
    let active: Vec<UeId> = sched
        .ues
        .iter()
        .copied()
        .filter(|&id| reg.get(id).has_bearer_packets())
        .collect();
    if active.is_empty() || sched.assigned_base_prbs.is_empty() {
        return;
    }

    let factor = sched.numerology_factor as usize;
    let scale = snr_scale();
    let base_prbs = sched.assigned_base_prbs.clone();
    for group in base_prbs.chunks(factor) {
        let resource = group[0] as usize;
        let mut best_utility = 0.0;
        let mut best_mask = 0usize;
        for mask in 1..(1usize << active.len()) {
            if !separated(mask, &active, reg, resource) {
                continue;
            }
            let utility: f64 = members(mask, &active)
                .map(|id| {
                    let ue = reg.get(id);
                    throughput(sched, ue, resource, scale) / fairness_weight(ue)
                })
                .sum();
            // Strictly greater: the earliest subset keeps a tie.
            if utility > best_utility {
                best_utility = utility;
                best_mask = mask;
            }
        }
        if best_mask == 0 {
            continue;
        }
        for id in members(best_mask, &active) {
            let rate = {
                let ue = reg.get(id);
                throughput(sched, ue, resource, scale)
            };
            let ue = reg.get_mut(id);
            ue.assigned_base_prbs.extend_from_slice(group);
            ue.assigned_layers = resource_layers(sched, ue, resource);
            ue.cumulative_rate += rate;
            ue.smoothed_rate = RATE_SMOOTHING * ue.smoothed_rate + (1.0 - RATE_SMOOTHING) * rate;
        }
        trace!(
            slice = %sched.slice,
            resource,
            mask = best_mask,
            utility = best_utility,
            "resource group assigned"
        );
    }

    for &id in &active {
        let ue = reg.get_mut(id);
        if !ue.assigned_base_prbs.is_empty() {
            ue.prbs = (ue.assigned_base_prbs.len() as u32 / factor as u32).max(1);
        }
    }
}

fn members(mask: usize, active: &[UeId]) -> impl Iterator<Item = UeId> + '_ {
    active
        .iter()
        .enumerate()
        .filter(move |(i, _)| mask & (1 << i) != 0)
        .map(|(_, &id)| id)
}

/// A group is valid when every pair of members is separated by more than the
/// angular threshold at this resource. Singletons are always valid.
fn separated(mask: usize, active: &[UeId], reg: &UeRegistry, resource: usize) -> bool {
    let ids: Vec<UeId> = members(mask, active).collect();
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let a = angle_at(reg, ids[i], resource);
            let b = angle_at(reg, ids[j], resource);
            if (a - b).abs() <= ANGLE_SEPARATION_DEG {
                return false;
            }
        }
    }
    true
}

fn angle_at(reg: &UeRegistry, id: UeId, resource: usize) -> f64 {
    let link = &reg.get(id).link;
    link.angle_per_prb.get(resource).copied().unwrap_or(0.0)
}

/// Spectral-efficiency throughput of one terminal on one resource:
/// `layers * 14 * log2(1 + B * snr)`, with the SNR taken linear.
fn throughput(sched: &IntraScheduler, ue: &crate::ue::Ue, resource: usize, scale: f64) -> f64 {
    let snr_db = ue
        .link
        .snr_per_prb
        .get(resource)
        .copied()
        .unwrap_or(ue.link.quality_db);
    let snr = 10f64.powf(snr_db / 10.0);
    let layers = resource_layers(sched, ue, resource) as f64;
    layers * 14.0 * (1.0 + scale * snr).log2()
}

fn resource_layers(sched: &IntraScheduler, ue: &crate::ue::Ue, resource: usize) -> u8 {
    let rank = ue
        .link
        .rank_per_prb
        .get(resource)
        .copied()
        .unwrap_or(1)
        .max(1);
    rank.min(sched.layers)
}

/// `B = -1.5 / ln(5 * BER)` for the configured target BER.
fn snr_scale() -> f64 {
    -1.5 / (5.0 * TARGET_BER).ln()
}

/// Smoothed-plus-cumulative fairness weight, floored to keep the utility
/// defined for terminals with no history.
fn fairness_weight(ue: &crate::ue::Ue) -> f64 {
    let w = RATE_SMOOTHING * ue.smoothed_rate + (1.0 - RATE_SMOOTHING) * ue.cumulative_rate;
    w.max(1e-3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ue::{RrcState, Ue};
    use slicesim_radio::RadioLink;
    use slicesim_traffic::{Bearer, Packet, PacketFlow};
    use slicesim_types::{Direction, FlowId, FrequencyRange, IntraAlgorithm, SliceId};
    use std::time::Duration;

    fn setup(angles: &[f64], snr_db: f64) -> (IntraScheduler, UeRegistry) {
        let mut sched = IntraScheduler::new(
            SliceId(0),
            Direction::Downlink,
            IntraAlgorithm::Num,
            FrequencyRange::Fr1,
            2,
            2,
            true,
            0.0,
            false,
        );
        sched.assigned_base_prbs = (0..16).collect();
        let mut reg = UeRegistry::new();
        for &angle in angles {
            let id = reg.next_id();
            let flow =
                PacketFlow::new(FlowId(id.0), id, Direction::Downlink, SliceId(0), 300.0, 5.0);
            let mut ue =
                Ue::new(id, SliceId(0), Direction::Downlink, flow, RadioLink::new(snr_db));
            ue.link
                .apply_scene(&[snr_db; 16], &[2; 16], &[angle; 16]);
            ue.state = RrcState::Connected;
            let mut bearer = Bearer::new(9, Direction::Downlink);
            bearer.buffer.push(Packet {
                seq: 1,
                size: 400,
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
    fn separated_terminals_share_every_resource() {
        let (mut sched, mut reg) = setup(&[0.0, 90.0], 20.0);
        allocate(&mut sched, &mut reg);
        // The pair's utility is the sum of both singletons, so it wins.
        assert_eq!(reg.get(UeId(0)).assigned_base_prbs.len(), 16);
        assert_eq!(reg.get(UeId(1)).assigned_base_prbs.len(), 16);
        assert!(reg.get(UeId(0)).prbs > 0);
    }

    #[test]
    fn close_angles_forbid_pairing() {
        let (mut sched, mut reg) = setup(&[0.0, 5.0], 20.0);
        allocate(&mut sched, &mut reg);
        let a = reg.get(UeId(0)).assigned_base_prbs.len();
        let b = reg.get(UeId(1)).assigned_base_prbs.len();
        // Only singleton groups are valid, each resource goes to one of them.
        assert_eq!(a + b, 16);
    }

    #[test]
    fn fairness_weight_rebalances_over_rounds() {
        let (mut sched, mut reg) = setup(&[0.0, 5.0], 20.0);
        // First round favours one terminal; its growing weight must hand
        // later resources to the other.
        allocate(&mut sched, &mut reg);
        assert!(reg.get(UeId(0)).assigned_base_prbs.len() > 0 || reg.get(UeId(1)).assigned_base_prbs.len() > 0);
        let first = reg.get(UeId(0)).cumulative_rate;
        let second = reg.get(UeId(1)).cumulative_rate;
        // Equal links and alternating weights: neither terminal is starved.
        assert!(first > 0.0 && second > 0.0);
    }

    #[test]
    fn fairness_weight_blends_smoothed_and_cumulative_rates() {
        let (_sched, mut reg) = setup(&[0.0], 20.0);
        let ue = reg.get_mut(UeId(0));
        ue.smoothed_rate = 10.0;
        ue.cumulative_rate = 100.0;
        let expected = RATE_SMOOTHING * 10.0 + (1.0 - RATE_SMOOTHING) * 100.0;
        assert!((fairness_weight(ue) - expected).abs() < 1e-12);
        // Fresh terminals keep a defined utility.
        ue.smoothed_rate = 0.0;
        ue.cumulative_rate = 0.0;
        assert_eq!(fairness_weight(ue), 1e-3);
    }

    #[test]
    fn singletons_are_always_valid() {
        let (mut sched, mut reg) = setup(&[0.0], 20.0);
        allocate(&mut sched, &mut reg);
        assert_eq!(reg.get(UeId(0)).assigned_base_prbs.len(), 16);
    }

    #[test]
    fn layers_follow_resource_rank() {
        let (mut sched, mut reg) = setup(&[0.0], 20.0);
        reg.get_mut(UeId(0)).link.rank_per_prb = vec![1; 16];
        allocate(&mut sched, &mut reg);
        assert_eq!(reg.get(UeId(0)).assigned_layers, 1);
    }

    #[test]
    fn idle_terminals_get_nothing() {
        let (mut sched, mut reg) = setup(&[0.0, 90.0], 20.0);
        reg.get_mut(UeId(1)).bearer = Some(Bearer::new(9, Direction::Downlink));
        allocate(&mut sched, &mut reg);
        assert_eq!(reg.get(UeId(1)).assigned_base_prbs.len(), 0);
        assert_eq!(reg.get(UeId(1)).prbs, 0);
    }
}
