//! Proportional-fair intra-slice allocation.
//!
//! The terminal with the highest `tbs^n / avg(pastTbs)^d` metric takes the
//! whole slice budget; every loser pushes its last TB size into the rolling
//! history and resets. With no buffered metric winner the walk falls back to
//! round-robin among terminals that hold data.

use super::IntraScheduler;
use crate::registry::UeRegistry;
use slicesim_types::UeId;
use tracing::trace;

pub(super) fn allocate(
    sched: &mut IntraScheduler,
    reg: &mut UeRegistry,
    exp_num: f64,
    exp_den: f64,
) {
    if sched.ues.is_empty() {
        return;
    }
    set_factors(sched, reg, exp_num, exp_den);
    let winner = find_max_factor(sched, reg);
    for &id in &sched.ues {
        let ue = reg.get_mut(id);
        ue.symbols = sched.symbols_per_slot;
        if Some(id) == winner {
            ue.prbs = sched.prb_budget;
        } else {
            ue.prbs = 0;
            ue.push_pf_history();
        }
    }
    if let Some(id) = winner {
        trace!(slice = %sched.slice, dir = %sched.direction, ue = %id, "PF winner");
    }
}

/// Metric per terminal: achievable TBS at the full budget over the average
/// of the past-TBS window.
fn set_factors(sched: &IntraScheduler, reg: &mut UeRegistry, exp_num: f64, exp_den: f64) {
    for &id in &sched.ues {
        let ue = reg.get_mut(id);
        let den = ue.mean_past_tb_size();
        let tbs = sched.achievable_tbs(ue, sched.prb_budget);
        ue.pf_metric = tbs.powf(exp_num) / den.powf(exp_den);
        ue.pf_num = tbs;
        ue.pf_den = den;
    }
}

/// Highest metric among terminals with buffered data; first maximum wins.
/// With none, rotate to the next terminal holding packets.
fn find_max_factor(sched: &mut IntraScheduler, reg: &UeRegistry) -> Option<UeId> {
    let mut best = 0.0;
    let mut winner = None;
    for &id in &sched.ues {
        let ue = reg.get(id);
        if ue.has_bearer_packets() && ue.pf_metric > best {
            best = ue.pf_metric;
            winner = Some(id);
        }
    }
    if winner.is_none() {
        let ids: Vec<UeId> = sched.ues.iter().copied().collect();
        for _ in 0..ids.len() {
            let id = ids[sched.rr_index() % ids.len()];
            if reg.get(id).has_bearer_packets() {
                return Some(id);
            }
            sched.rotate_index();
        }
        return None;
    }
    winner
}
