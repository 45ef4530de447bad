//! Deterministic simulation runner.
//!
//! Drives one cell through a run: traffic generation, connection polls,
//! channel evolution, both scheduler levels and periodic KPI sampling all
//! come out of a single ordered event queue fed by one seeded RNG, so the
//! same seed reproduces the run bit for bit.

use crate::event_queue::{Event, EventKey};
use crate::sinks::{KpiSample, SliceKpiSample, StatsSink};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use slicesim_radio::{SceneSource, TraceError};
use slicesim_sched::{Cell, POLL_INTERVAL};
use slicesim_traffic::{PacketFlow, TRAFFIC_FRACTION};
use slicesim_types::{ConfigError, Direction, SliceId, UeId};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Fatal simulation-setup or trace-replay failure.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// Counters collected while the run advances.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimulationStats {
    pub events_processed: u64,
    pub packets_generated: u64,
    pub packets_delivered: u64,
    pub allocation_rounds: u64,
    pub kpi_samples: u64,
}

/// A set of terminals replaying a shared channel trace, advanced one scene
/// at a time. Row `i` of each scene belongs to `ues[i]`.
struct SceneGroup {
    ues: Vec<UeId>,
    source: Box<dyn SceneSource>,
    interval: Duration,
    next_scene: usize,
}

/// Deterministic simulation runner.
///
/// Processes events in deterministic order. Given the same seed and the same
/// scenario, produces identical results every run.
pub struct SimulationRunner {
    cell: Cell,
    queue: BTreeMap<EventKey, Event>,
    sequence: u64,
    now: Duration,
    /// End of the run.
    horizon: Duration,
    /// Traffic, channel evolution and sampling stop here; the tail of the
    /// run drains what is still in flight.
    traffic_deadline: Duration,
    link_update_interval: Duration,
    stats_interval: Duration,
    scene_groups: Vec<SceneGroup>,
    rng: ChaCha8Rng,
    stats: SimulationStats,
    started: bool,
    /// Next 10%-of-horizon mark to log progress at.
    next_progress: Duration,
}

impl SimulationRunner {
    pub fn new(cell: Cell, seed: u64, horizon: Duration) -> Self {
        let stats_interval = cell.granularity;
        info!(seed, horizon = ?horizon, "created simulation runner");
        Self {
            cell,
            queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            horizon,
            traffic_deadline: Duration::from_secs_f64(
                horizon.as_secs_f64() * TRAFFIC_FRACTION,
            ),
            link_update_interval: Duration::from_millis(1),
            stats_interval,
            scene_groups: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats: SimulationStats::default(),
            started: false,
            next_progress: horizon / 10,
        }
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn cell_mut(&mut self) -> &mut Cell {
        &mut self.cell
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn set_stats_interval(&mut self, interval: Duration) {
        self.stats_interval = interval;
    }

    pub fn set_link_update_interval(&mut self, interval: Duration) {
        self.link_update_interval = interval;
    }

    /// Attach a trace-driven terminal group: scene 0 is applied immediately,
    /// later scenes replay at `interval`. Terminals in a group are excluded
    /// from the random-walk channel.
    pub fn add_scene_group(
        &mut self,
        ues: Vec<UeId>,
        source: Box<dyn SceneSource>,
        interval: Duration,
    ) -> Result<(), SimulationError> {
        let scene = source.read(ues.len(), 0)?;
        for (row, &id) in ues.iter().enumerate() {
            let (snr, rank, angle) = scene.row(row);
            self.cell.ues.get_mut(id).link.apply_scene(snr, rank, angle);
        }
        self.scene_groups.push(SceneGroup {
            ues,
            source,
            interval,
            next_scene: 1,
        });
        Ok(())
    }

    /// Run to the horizon, then sweep whatever is still queued into the loss
    /// counters.
    pub fn run(&mut self, sink: &mut dyn StatsSink) -> Result<(), SimulationError> {
        if !self.started {
            self.schedule_initial_events();
            self.started = true;
        }
        loop {
            let Some((&key, _)) = self.queue.first_key_value() else {
                break;
            };
            if key.time > self.horizon {
                break;
            }
            let Some((key, event)) = self.queue.pop_first() else {
                break;
            };
            self.now = key.time;
            while self.next_progress > Duration::ZERO && self.now >= self.next_progress {
                let percent =
                    100 * self.next_progress.as_millis() / self.horizon.as_millis().max(1);
                info!(percent = percent as u64, "simulation progress");
                self.next_progress += self.horizon / 10;
            }
            self.stats.events_processed += 1;
            self.handle(event, sink)?;
        }
        if self.now < self.horizon {
            self.now = self.horizon;
        }
        self.cell.sweep_undelivered();
        debug!(
            events = self.stats.events_processed,
            delivered = self.stats.packets_delivered,
            "run complete"
        );
        Ok(())
    }

    fn schedule_initial_events(&mut self) {
        let traced: std::collections::HashSet<UeId> = self
            .scene_groups
            .iter()
            .flat_map(|g| g.ues.iter().copied())
            .collect();
        let ids: Vec<UeId> = self.cell.ues.ids().collect();
        for id in ids {
            let offset_ms = PacketFlow::start_offset_ms(&mut self.rng);
            self.schedule(
                Duration::from_secs_f64(offset_ms / 1000.0),
                Event::PacketArrival { ue: id },
            );
            self.schedule(POLL_INTERVAL, Event::ConnectionPoll { ue: id });
            if !traced.contains(&id) {
                self.schedule(self.link_update_interval, Event::LinkUpdate { ue: id });
            }
        }
        for group in 0..self.scene_groups.len() {
            self.schedule(self.scene_groups[group].interval, Event::SceneAdvance { group });
        }
        self.schedule(Duration::ZERO, Event::InterAllocation);
        let ticks: Vec<(SliceId, Duration)> = self
            .cell
            .slices
            .iter()
            .map(|(&id, s)| (id, s.tti))
            .collect();
        for (slice, tti) in ticks {
            for direction in Direction::BOTH {
                self.schedule(tti, Event::IntraTick { slice, direction });
            }
        }
        self.schedule(self.stats_interval, Event::StatsSample);
    }

    fn handle(&mut self, event: Event, sink: &mut dyn StatsSink) -> Result<(), SimulationError> {
        match event {
            Event::PacketArrival { ue } => {
                if self.now < self.traffic_deadline {
                    let now = self.now;
                    let flow = &mut self.cell.ues.get_mut(ue).flow;
                    let delay = flow.generate(&mut self.rng, now);
                    self.stats.packets_generated += 1;
                    self.schedule(now + delay, Event::PacketArrival { ue });
                }
            }
            Event::ConnectionPoll { ue } => {
                self.cell.poll_connection(ue, self.now);
                self.schedule(self.now + POLL_INTERVAL, Event::ConnectionPoll { ue });
            }
            Event::LinkUpdate { ue } => {
                if self.now < self.traffic_deadline {
                    self.cell.ues.get_mut(ue).link.perturb(&mut self.rng);
                    self.schedule(
                        self.now + self.link_update_interval,
                        Event::LinkUpdate { ue },
                    );
                }
            }
            Event::SceneAdvance { group } => {
                if self.now < self.traffic_deadline {
                    self.advance_scene(group)?;
                    if let Some(g) = self.scene_groups.get(group) {
                        self.schedule(self.now + g.interval, Event::SceneAdvance { group });
                    }
                }
            }
            Event::InterAllocation => {
                self.push_slice_rcvd_samples();
                self.cell.allocate_slices(&mut self.rng)?;
                self.stats.allocation_rounds += 1;
                self.schedule(self.now + self.cell.granularity, Event::InterAllocation);
            }
            Event::IntraTick { slice, direction } => {
                let Some(tti) = self.cell.slices.get(&slice).map(|s| s.tti) else {
                    return Ok(());
                };
                let outcome = {
                    let Cell { slices, ues, .. } = &mut self.cell;
                    let Some(s) = slices.get_mut(&slice) else {
                        return Ok(());
                    };
                    s.scheduler_mut(direction)
                        .schedule_tti(ues, &mut self.rng, self.now)
                };
                for delivery in &outcome.delivered {
                    self.stats.packets_delivered += 1;
                    sink.on_delivery(delivery.ue, delivery.delay);
                }
                self.schedule(self.now + tti, Event::IntraTick { slice, direction });
            }
            Event::StatsSample => {
                if self.now < self.traffic_deadline {
                    self.sample(sink);
                    self.schedule(self.now + self.stats_interval, Event::StatsSample);
                }
            }
        }
        Ok(())
    }

    /// Replay the group's next scene onto its terminals; an exhausted trace
    /// wraps around to scene 0.
    fn advance_scene(&mut self, group: usize) -> Result<(), SimulationError> {
        let Some(g) = self.scene_groups.get_mut(group) else {
            return Ok(());
        };
        let scene = match g.source.read(g.ues.len(), g.next_scene) {
            Ok(scene) => {
                g.next_scene += 1;
                scene
            }
            Err(TraceError::MissingScene { .. }) if g.next_scene > 0 => {
                trace!(group, "trace exhausted, wrapping to scene 0");
                let scene = g.source.read(g.ues.len(), 0)?;
                g.next_scene = 1;
                scene
            }
            Err(e) => return Err(e.into()),
        };
        let ues = g.ues.clone();
        for (row, id) in ues.into_iter().enumerate() {
            let (snr, rank, angle) = scene.row(row);
            self.cell.ues.get_mut(id).link.apply_scene(snr, rank, angle);
        }
        Ok(())
    }

    /// Feed each slice's cumulative received bytes into its inter-slice PF
    /// window, once per allocation round.
    fn push_slice_rcvd_samples(&mut self) {
        let ids: Vec<SliceId> = self.cell.slices.keys().copied().collect();
        for id in ids {
            let total: u64 = self
                .cell
                .ues
                .iter()
                .filter(|u| u.slice == id)
                .map(|u| u.flow.rcvd_bytes)
                .sum();
            if let Some(slice) = self.cell.slices.get_mut(&id) {
                slice.push_rcvd_sample(total);
            }
        }
    }

    fn sample(&mut self, sink: &mut dyn StatsSink) {
        for ue in self.cell.ues.iter() {
            sink.on_sample(&KpiSample {
                time: self.now,
                slice: ue.slice,
                direction: ue.direction,
                ue: ue.id,
                link_quality_db: ue.link.quality_db,
                mcs_index: ue.mcs_index,
                bler: ue.bler,
                resources_used: ue.res_use,
                sent_packets: ue.flow.sent_packets,
                lost_packets: ue.flow.lost_packets,
                rcvd_bytes: ue.flow.rcvd_bytes,
            });
        }
        for (&id, slice) in &self.cell.slices {
            let (mut sent, mut lost, mut rcvd) = (0u64, 0u64, 0u64);
            for ue in self.cell.ues.iter().filter(|u| u.slice == id) {
                sent += ue.flow.sent_packets;
                lost += ue.flow.lost_packets;
                rcvd += ue.flow.rcvd_bytes;
            }
            let (dl_buffered_bytes, ul_buffered_bytes) = slice.buffered_bytes(&self.cell.ues);
            sink.on_slice_sample(&SliceKpiSample {
                time: self.now,
                slice: id,
                connected_ues: slice.dl.ues.len() + slice.ul.ues.len(),
                dl_prb_budget: slice.dl.prb_budget,
                ul_prb_budget: slice.ul.prb_budget,
                dl_buffered_bytes,
                ul_buffered_bytes,
                metric: slice.metric,
                sent_packets: sent,
                lost_packets: lost,
                rcvd_bytes: rcvd,
            });
        }
        self.stats.kpi_samples += 1;
    }

    fn schedule(&mut self, time: Duration, event: Event) {
        self.sequence += 1;
        let key = EventKey::new(time, &event, self.sequence);
        self.queue.insert(key, event);
    }
}
