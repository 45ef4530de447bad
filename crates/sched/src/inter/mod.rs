//! Inter-slice scheduler family.
//!
//! Each granularity interval the scheduler re-partitions the cell's PRBs
//! among slices and pushes the result into every slice's intra-slice
//! schedulers, converted to each slice's numerology.

mod pf;
mod rotation;

pub use rotation::GroupRotation;

use crate::registry::UeRegistry;
use crate::slice::Slice;
use indexmap::IndexMap;
use rand::Rng;
use slicesim_types::{phy, ConfigError, FrequencyRange, InterAlgorithm, SliceId};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct InterScheduler {
    pub algorithm: InterAlgorithm,
    pub frequency_range: FrequencyRange,
    /// Component carrier bandwidths, MHz.
    pub carriers_mhz: Vec<u32>,
    /// Cell PRB budget at the 15 kHz reference numerology.
    pub total_prbs: u32,
    /// Allocation rounds completed.
    pub intervals: u64,
    /// Group-rotation state, trace mode only.
    rotation: Option<GroupRotation>,
}

impl InterScheduler {
    pub fn new(
        algorithm: InterAlgorithm,
        frequency_range: FrequencyRange,
        carriers_mhz: Vec<u32>,
        base_prb_count: Option<u32>,
    ) -> Result<Self, ConfigError> {
        let rotation = match algorithm {
            InterAlgorithm::GroupRotation => {
                let base = base_prb_count.ok_or_else(|| {
                    ConfigError::field("prb_count", "group rotation requires a base PRB count")
                })?;
                Some(GroupRotation::new(base)?)
            }
            _ => None,
        };
        let total_prbs = match &rotation {
            Some(rot) => rot.base_prb_count(),
            None => phy::total_prbs(frequency_range, 15, &carriers_mhz),
        };
        Ok(Self {
            algorithm,
            frequency_range,
            carriers_mhz,
            total_prbs,
            intervals: 0,
            rotation,
        })
    }

    /// Run one allocation round over the cell's slices.
    pub fn allocate(
        &mut self,
        slices: &mut IndexMap<SliceId, Slice>,
        reg: &UeRegistry,
        rng: &mut impl Rng,
    ) -> Result<(), ConfigError> {
        if slices.is_empty() {
            self.intervals += 1;
            return Ok(());
        }
        if slices.len() == 1 && self.rotation.is_none() {
            // A lone slice gets the whole carrier at its own numerology.
            if let Some(slice) = slices.values_mut().next() {
                let prbs = phy::total_prbs(self.frequency_range, slice.scs_khz, &self.carriers_mhz);
                slice.update_config(prbs);
            }
        } else {
            match self.algorithm {
                InterAlgorithm::RoundRobin => self.round_robin(slices),
                InterAlgorithm::RoundRobinPlus => self.round_robin_plus(slices, reg),
                InterAlgorithm::ProportionalFair { exp_num, exp_den } => {
                    self.proportional_fair(slices, reg, rng, exp_num, exp_den)
                }
                InterAlgorithm::DynamicTdd => self.dynamic_tdd(slices, reg),
                InterAlgorithm::GroupRotation => self.group_rotation(slices)?,
            }
        }
        self.intervals += 1;
        for slice in slices.values() {
            debug!(
                slice = %slice.label,
                prbs = slice.dl.prb_budget,
                metric = slice.metric,
                "slice allocation"
            );
        }
        Ok(())
    }

    /// Equal split among all slices, regardless of load.
    fn round_robin(&self, slices: &mut IndexMap<SliceId, Slice>) {
        let share = self.total_prbs / slices.len() as u32;
        for slice in slices.values_mut() {
            slice.update_config(share / slice.numerology_factor);
        }
    }

    /// Equal split among slices holding buffered traffic; with none loaded,
    /// fall back to the plain equal split.
    fn round_robin_plus(&self, slices: &mut IndexMap<SliceId, Slice>, reg: &UeRegistry) {
        let loaded = slices
            .values()
            .filter(|s| s.has_buffered_traffic(reg))
            .count() as u32;
        if loaded == 0 {
            self.round_robin(slices);
            return;
        }
        let share = self.total_prbs / loaded;
        for slice in slices.values_mut() {
            if slice.has_buffered_traffic(reg) {
                slice.update_config(share / slice.numerology_factor);
            } else {
                slice.update_config(0);
            }
        }
    }

    /// Winner-take-all PF over the received-bytes window. The first round has
    /// no history and picks a uniformly random slice.
    fn proportional_fair(
        &self,
        slices: &mut IndexMap<SliceId, Slice>,
        reg: &UeRegistry,
        rng: &mut impl Rng,
        exp_num: f64,
        exp_den: f64,
    ) {
        let winner = if self.intervals == 0 {
            let pick = rng.gen_range(0..slices.len());
            slices.get_index(pick).map(|(id, _)| *id)
        } else {
            pf::set_metrics(slices, reg, self.total_prbs, exp_num, exp_den);
            pf::find_max_metric(slices, rng)
        };
        let Some(winner) = winner else { return };
        for (id, slice) in slices.iter_mut() {
            if *id == winner {
                let share = self.total_prbs / slice.numerology_factor;
                slice.update_config(share);
            } else {
                slice.update_config(0);
            }
        }
    }

    /// Direction-aware variant: shares follow each slice's dominant buffered
    /// direction, with the integer remainder dealt to the earliest slices.
    fn dynamic_tdd(&self, slices: &mut IndexMap<SliceId, Slice>, reg: &UeRegistry) {
        let weights: Vec<u64> = slices
            .values()
            .map(|s| {
                let (dl, ul) = s.buffered_bytes(reg);
                dl.max(ul)
            })
            .collect();
        let total_weight: u64 = weights.iter().sum();
        if total_weight == 0 {
            self.round_robin(slices);
            return;
        }
        let mut shares: Vec<u32> = weights
            .iter()
            .map(|&w| ((self.total_prbs as u64 * w) / total_weight) as u32)
            .collect();
        let mut remainder = self.total_prbs - shares.iter().sum::<u32>();
        for share in shares.iter_mut() {
            if remainder == 0 {
                break;
            }
            *share += 1;
            remainder -= 1;
        }
        for (slice, share) in slices.values_mut().zip(shares) {
            slice.update_config(share / slice.numerology_factor);
        }
    }

    /// Deal whole base-PRB groups with the rotating start index.
    fn group_rotation(&mut self, slices: &mut IndexMap<SliceId, Slice>) -> Result<(), ConfigError> {
        let Some(rotation) = self.rotation.as_mut() else {
            return Err(ConfigError::field(
                "scheduler",
                "group rotation state missing",
            ));
        };
        let assigned = rotation.divide(slices.len())?;
        for (slice, prbs) in slices.values_mut().zip(assigned) {
            slice.set_base_prbs(prbs);
        }
        Ok(())
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
    use slicesim_types::{Direction, FlowId, IntraAlgorithm, ServiceProfile, UeId};
    use std::time::Duration;

    fn slice(id: u32, label: &str) -> Slice {
        Slice::new(
            SliceId(id),
            label,
            IntraAlgorithm::RoundRobin,
            FrequencyRange::Fr1,
            1,
            false,
            0.0,
            false,
            ServiceProfile::from_traffic(20.0, 300.0, 0.2, 300.0, 0.2, "99.9"),
        )
    }

    fn loaded_ue(reg: &mut UeRegistry, slice: &mut Slice, bytes: u64) -> UeId {
        let id = reg.next_id();
        let flow = PacketFlow::new(FlowId(id.0), id, Direction::Downlink, slice.id, 300.0, 5.0);
        let mut ue = Ue::new(id, slice.id, Direction::Downlink, flow, RadioLink::new(25.0));
        ue.state = RrcState::Connected;
        let mut bearer = Bearer::new(9, Direction::Downlink);
        if bytes > 0 {
            bearer.buffer.push(Packet {
                seq: 1,
                size: bytes,
                flow: ue.flow.id,
                ue: id,
                t_in: Duration::ZERO,
            });
        }
        ue.bearer = Some(bearer);
        reg.insert(ue);
        slice.dl.register(id);
        id
    }

    fn scheduler(algorithm: InterAlgorithm) -> InterScheduler {
        InterScheduler::new(algorithm, FrequencyRange::Fr1, vec![10], None).unwrap()
    }

    #[test]
    fn round_robin_splits_evenly() {
        let mut inter = scheduler(InterAlgorithm::RoundRobin);
        let mut slices = IndexMap::new();
        slices.insert(SliceId(0), slice(0, "mMTC-a"));
        slices.insert(SliceId(1), slice(1, "mMTC-b"));
        let reg = UeRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        inter.allocate(&mut slices, &reg, &mut rng).unwrap();
        // A 10 MHz FR1 carrier at 15 kHz is 52 PRBs.
        assert_eq!(slices[&SliceId(0)].dl.prb_budget, 26);
        assert_eq!(slices[&SliceId(1)].dl.prb_budget, 26);
    }

    #[test]
    fn lone_slice_gets_the_carrier_at_its_numerology() {
        let mut inter = scheduler(InterAlgorithm::RoundRobin);
        let mut slices = IndexMap::new();
        slices.insert(SliceId(0), slice(0, "eMBB"));
        let reg = UeRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        inter.allocate(&mut slices, &reg, &mut rng).unwrap();
        // 10 MHz at 30 kHz is 24 PRBs.
        assert_eq!(slices[&SliceId(0)].dl.prb_budget, 24);
    }

    #[test]
    fn rr_plus_skips_empty_slices_and_conserves_budget() {
        let mut inter = scheduler(InterAlgorithm::RoundRobinPlus);
        let mut slices = IndexMap::new();
        let mut a = slice(0, "mMTC-a");
        let mut b = slice(1, "mMTC-b");
        let mut reg = UeRegistry::new();
        loaded_ue(&mut reg, &mut a, 500);
        loaded_ue(&mut reg, &mut b, 0);
        slices.insert(SliceId(0), a);
        slices.insert(SliceId(1), b);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        inter.allocate(&mut slices, &reg, &mut rng).unwrap();
        assert_eq!(slices[&SliceId(0)].dl.prb_budget, 52);
        assert_eq!(slices[&SliceId(1)].dl.prb_budget, 0);
        let granted: u32 = slices.values().map(|s| s.dl.prb_budget * s.numerology_factor).sum();
        assert_eq!(granted, inter.total_prbs);
    }

    #[test]
    fn rr_plus_with_no_traffic_falls_back_to_equal_split() {
        let mut inter = scheduler(InterAlgorithm::RoundRobinPlus);
        let mut slices = IndexMap::new();
        slices.insert(SliceId(0), slice(0, "mMTC-a"));
        slices.insert(SliceId(1), slice(1, "mMTC-b"));
        let reg = UeRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        inter.allocate(&mut slices, &reg, &mut rng).unwrap();
        assert_eq!(slices[&SliceId(0)].dl.prb_budget, 26);
        assert_eq!(slices[&SliceId(1)].dl.prb_budget, 26);
    }

    #[test]
    fn pf_first_interval_picks_a_random_slice() {
        let mut inter = scheduler(InterAlgorithm::ProportionalFair {
            exp_num: 1.0,
            exp_den: 1.0,
        });
        let mut slices = IndexMap::new();
        slices.insert(SliceId(0), slice(0, "mMTC-a"));
        slices.insert(SliceId(1), slice(1, "mMTC-b"));
        let reg = UeRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        inter.allocate(&mut slices, &reg, &mut rng).unwrap();
        let budgets: Vec<u32> = slices.values().map(|s| s.dl.prb_budget).collect();
        assert!(budgets.contains(&52) && budgets.contains(&0), "{budgets:?}");
    }

    #[test]
    fn pf_long_run_shares_converge_under_equal_load() {
        let mut inter = scheduler(InterAlgorithm::ProportionalFair {
            exp_num: 1.0,
            exp_den: 1.0,
        });
        let mut slices = IndexMap::new();
        let mut a = slice(0, "mMTC-a");
        let mut b = slice(1, "mMTC-b");
        let mut reg = UeRegistry::new();
        loaded_ue(&mut reg, &mut a, 500);
        loaded_ue(&mut reg, &mut b, 500);
        slices.insert(SliceId(0), a);
        slices.insert(SliceId(1), b);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut wins = [0u32; 2];
        let mut served = [0u64; 2];
        for _ in 0..400 {
            inter.allocate(&mut slices, &reg, &mut rng).unwrap();
            for (i, s) in slices.values_mut().enumerate() {
                if s.dl.prb_budget > 0 {
                    wins[i] += 1;
                    served[i] += 1000;
                }
                served[i] += 1;
                s.push_rcvd_sample(served[i]);
            }
        }
        let ratio = wins[0] as f64 / (wins[0] + wins[1]) as f64;
        assert!(
            (0.35..=0.65).contains(&ratio),
            "long-run share should be near-equal, got {wins:?}"
        );
    }

    #[test]
    fn dynamic_tdd_follows_dominant_buffered_direction() {
        let mut inter = scheduler(InterAlgorithm::DynamicTdd);
        let mut slices = IndexMap::new();
        let mut a = slice(0, "mMTC-a");
        let mut b = slice(1, "mMTC-b");
        let mut reg = UeRegistry::new();
        loaded_ue(&mut reg, &mut a, 3000);
        loaded_ue(&mut reg, &mut b, 1000);
        slices.insert(SliceId(0), a);
        slices.insert(SliceId(1), b);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        inter.allocate(&mut slices, &reg, &mut rng).unwrap();
        let heavy = slices[&SliceId(0)].dl.prb_budget;
        let light = slices[&SliceId(1)].dl.prb_budget;
        assert!(heavy > light, "3:1 load must skew the split, got {heavy}/{light}");
        assert_eq!(heavy + light, 52);
    }

    #[test]
    fn group_rotation_pushes_base_prbs_into_slices() {
        let mut inter = InterScheduler::new(
            InterAlgorithm::GroupRotation,
            FrequencyRange::Fr1,
            vec![10],
            Some(64),
        )
        .unwrap();
        let mut slices = IndexMap::new();
        slices.insert(SliceId(0), slice(0, "mMTC-a"));
        slices.insert(SliceId(1), slice(1, "mMTC-b"));
        let reg = UeRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        inter.allocate(&mut slices, &reg, &mut rng).unwrap();
        let total: usize = slices
            .values()
            .map(|s| s.assigned_base_prbs.len())
            .sum();
        assert_eq!(total, 64);
        assert!(slices[&SliceId(0)].dl.prb_budget > 0);
    }

    #[test]
    fn rotation_requires_a_base_prb_count() {
        assert!(InterScheduler::new(
            InterAlgorithm::GroupRotation,
            FrequencyRange::Fr1,
            vec![10],
            None
        )
        .is_err());
    }
}
