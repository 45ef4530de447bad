//! Scenario wiring: provisions a cell from a [`SimulatorConfig`] and drives
//! it through the simulation runner.

use crate::config::{SimulatorConfig, UeGroupConfig};
use crate::report::SimulationReport;
use slicesim_radio::{RadioLink, SceneSource};
use slicesim_sched::{Cell, Slice, Ue};
use slicesim_simulation::{MemorySink, SimulationError, SimulationRunner};
use slicesim_traffic::PacketFlow;
use slicesim_types::{
    initial_sinr, ConfigError, Direction, FlowId, FrequencyRange, ServiceProfile, SliceId, UeId,
};
use std::time::Duration;
use tracing::info;

/// A fully provisioned simulation: one cell, one slice per terminal group,
/// one seeded runner.
pub struct Simulator {
    config: SimulatorConfig,
    runner: SimulationRunner,
    /// Terminal identifiers per group, in provisioning order.
    group_ues: Vec<Vec<UeId>>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulationError> {
        let frequency_range = FrequencyRange::from_ghz(config.frequency_ghz);
        let mut cell = Cell::new(
            vec![config.bandwidth_mhz],
            frequency_range,
            config.tdd,
            config.max_buffer_bytes,
            config.granularity,
            config.inter_algorithm,
            config.base_prb_count,
        )?;

        let mut group_ues = Vec::with_capacity(config.groups.len());
        for (index, group) in config.groups.iter().enumerate() {
            let slice_id = SliceId(index as u32);
            cell.add_slice(Slice::new(
                slice_id,
                group.label.clone(),
                group.scheduler,
                frequency_range,
                group.layers,
                group.multi_user,
                group.signaling_load,
                group.robust_mcs,
                profile_for(group),
            ));
            group_ues.push(provision_terminals(&mut cell, slice_id, group)?);
            info!(
                slice = %slice_id,
                label = %group.label,
                dl_ues = group.dl_ues,
                ul_ues = group.ul_ues,
                "provisioned terminal group"
            );
        }

        let runner = SimulationRunner::new(cell, config.seed, config.horizon);
        Ok(Self {
            config,
            runner,
            group_ues,
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn runner(&self) -> &SimulationRunner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut SimulationRunner {
        &mut self.runner
    }

    /// Terminals of one provisioned group, in creation order.
    pub fn group_ues(&self, group: usize) -> &[UeId] {
        self.group_ues
            .get(group)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Replay a channel trace over one group's terminals.
    pub fn attach_scene_group(
        &mut self,
        group: usize,
        source: Box<dyn SceneSource>,
        interval: Duration,
    ) -> Result<(), SimulationError> {
        let ues = self
            .group_ues
            .get(group)
            .cloned()
            .unwrap_or_default();
        self.runner.add_scene_group(ues, source, interval)
    }

    /// Run to the horizon and build the report.
    pub fn run(&mut self) -> Result<SimulationReport, SimulationError> {
        let mut sink = MemorySink::new();
        self.runner.run(&mut sink)?;
        Ok(SimulationReport::build(
            self.runner.cell(),
            &sink,
            self.config.horizon,
        ))
    }
}

fn profile_for(group: &UeGroupConfig) -> ServiceProfile {
    ServiceProfile::from_traffic(
        group.delay_budget_ms,
        group.dl_packet_bytes,
        UeGroupConfig::arrival_rate_per_ms(group.dl_interarrival_ms),
        group.ul_packet_bytes,
        UeGroupConfig::arrival_rate_per_ms(group.ul_interarrival_ms),
        group.availability.clone(),
    )
}

/// Create the group's terminals, downlink first, with initial link qualities
/// from the group's SINR spec.
fn provision_terminals(
    cell: &mut Cell,
    slice: SliceId,
    group: &UeGroupConfig,
) -> Result<Vec<UeId>, SimulationError> {
    let total = (group.dl_ues + group.ul_ues) as usize;
    let sinrs = initial_sinr(total, &group.sinr_spec)
        .map_err(|e| ConfigError::field("initial_sinr", e.to_string()))?;
    let mut ids = Vec::with_capacity(total);
    for (i, sinr) in sinrs.into_iter().enumerate() {
        let direction = if (i as u32) < group.dl_ues {
            Direction::Downlink
        } else {
            Direction::Uplink
        };
        let (bytes, interarrival) = match direction {
            Direction::Downlink => (group.dl_packet_bytes, group.dl_interarrival_ms),
            Direction::Uplink => (group.ul_packet_bytes, group.ul_interarrival_ms),
        };
        let id = cell.ues.next_id();
        let flow = PacketFlow::new(FlowId(id.0), id, direction, slice, bytes, interarrival);
        ids.push(cell.add_ue(Ue::new(id, slice, direction, flow, RadioLink::new(sinr))));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicesim_types::IntraAlgorithm;
    use tracing_test::traced_test;

    fn config() -> SimulatorConfig {
        SimulatorConfig::new(10, 3)
            .with_seed(3)
            .with_horizon(Duration::from_secs(2))
            .with_group(
                UeGroupConfig::new("eMBB-video")
                    .with_downlink(2, 300.0, 5.0)
                    .with_uplink(1, 150.0, 10.0)
                    .with_sinr_spec("D37"),
            )
            .with_group(
                UeGroupConfig::new("URLLC-ctrl")
                    .with_scheduler(IntraAlgorithm::RoundRobin)
                    .with_downlink(1, 80.0, 2.0),
            )
    }

    #[traced_test]
    #[test]
    fn provisioning_creates_slices_and_terminals() {
        let sim = Simulator::new(config()).unwrap();
        let cell = sim.runner().cell();
        assert_eq!(cell.slices.len(), 2);
        assert_eq!(cell.ues.len(), 4);
        assert_eq!(sim.group_ues(0).len(), 3);
        assert_eq!(sim.group_ues(1).len(), 1);
        // D37 spreads the group's qualities downward from 37 dB.
        let first = cell.ues.get(sim.group_ues(0)[0]).link.quality_db;
        let last = cell.ues.get(sim.group_ues(0)[2]).link.quality_db;
        assert_eq!(first, 37.0);
        assert!(last < first);
        // Uplink terminals come after the downlink block.
        assert_eq!(cell.ues.get(sim.group_ues(0)[2]).direction, Direction::Uplink);
        assert!(logs_contain("provisioned terminal group"));
    }

    #[test]
    fn malformed_sinr_spec_is_a_config_error() {
        let bad = SimulatorConfig::new(10, 3)
            .with_group(UeGroupConfig::new("eMBB").with_downlink(1, 300.0, 5.0).with_sinr_spec("Q9"));
        assert!(matches!(
            Simulator::new(bad),
            Err(SimulationError::Config(_))
        ));
    }

    #[test]
    fn run_produces_a_populated_report() {
        let mut sim = Simulator::new(config()).unwrap();
        let report = sim.run().unwrap();
        assert_eq!(report.slices.len(), 2);
        assert_eq!(report.ues.len(), 4);
        let sent: u64 = report.ues.iter().map(|u| u.sent_packets).sum();
        assert!(sent > 0);
    }
}
