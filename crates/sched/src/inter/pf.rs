//! Winner-take-all proportional-fair inter-slice allocation.

use crate::registry::UeRegistry;
use crate::slice::Slice;
use indexmap::IndexMap;
use rand::Rng;
use slicesim_types::SliceId;
use tracing::trace;

/// Set every slice's metric:
/// `avg(achievable TBS over the slice's terminals)^n / rcvdDelta^d`.
pub(super) fn set_metrics(
    slices: &mut IndexMap<SliceId, Slice>,
    reg: &UeRegistry,
    total_prbs: u32,
    exp_num: f64,
    exp_den: f64,
) {
    for slice in slices.values_mut() {
        let den = slice.rcvd_delta();
        let mut num = 0.0;
        let mut terminals = 0usize;
        for sched in [&slice.dl, &slice.ul] {
            for &id in &sched.ues {
                num += sched.achievable_tbs(reg.get(id), total_prbs);
                terminals += 1;
            }
        }
        slice.metric = if terminals == 0 {
            0.0
        } else {
            (num / terminals as f64).powf(exp_num) / den.powf(exp_den)
        };
    }
}

/// Highest-metric slice; a tie is broken by a uniform pick between the
/// incumbent and the challenger, in declaration order.
pub(super) fn find_max_metric(
    slices: &IndexMap<SliceId, Slice>,
    rng: &mut impl Rng,
) -> Option<SliceId> {
    let mut best = 0.0;
    let mut winner: Option<SliceId> = None;
    for (id, slice) in slices {
        match winner {
            None => {
                best = slice.metric;
                winner = Some(*id);
            }
            Some(incumbent) => {
                if slice.metric > best {
                    best = slice.metric;
                    winner = Some(*id);
                } else if slice.metric == best {
                    winner = Some(if rng.gen::<bool>() { incumbent } else { *id });
                }
            }
        }
    }
    if let Some(id) = winner {
        trace!(slice = %id, metric = best, "PF metric winner");
    }
    winner
}
