//! The cell: owns the slice registry, the terminal registry, the inter-slice
//! scheduler and the per-terminal connection state machine.

use crate::inter::InterScheduler;
use crate::registry::UeRegistry;
use crate::slice::Slice;
use crate::ue::{RrcState, TbKind, Ue};
use indexmap::IndexMap;
use rand::Rng;
use slicesim_traffic::Bearer;
use slicesim_types::{ConfigError, FrequencyRange, InterAlgorithm, SliceId, UeId};
use std::time::Duration;
use tracing::{debug, info};

/// Inactivity timeout after which a connected terminal is released.
pub const INACTIVITY_TIMER: Duration = Duration::from_millis(3000);

/// Connection state machine poll interval (50 microseconds).
pub const POLL_INTERVAL: Duration = Duration::from_micros(50);

#[derive(Debug, Clone)]
pub struct Cell {
    /// Component carrier bandwidths, MHz.
    pub carriers_mhz: Vec<u32>,
    pub frequency_range: FrequencyRange,
    pub tdd: bool,
    /// Bearer buffer limit per terminal, bytes.
    pub max_buffer_bytes: u64,
    /// Inter-slice allocation period.
    pub granularity: Duration,
    pub slices: IndexMap<SliceId, Slice>,
    pub ues: UeRegistry,
    pub inter: InterScheduler,
}

impl Cell {
    pub fn new(
        carriers_mhz: Vec<u32>,
        frequency_range: FrequencyRange,
        tdd: bool,
        max_buffer_bytes: u64,
        granularity: Duration,
        inter_algorithm: InterAlgorithm,
        base_prb_count: Option<u32>,
    ) -> Result<Self, ConfigError> {
        let inter = InterScheduler::new(
            inter_algorithm,
            frequency_range,
            carriers_mhz.clone(),
            base_prb_count,
        )?;
        info!(
            ?carriers_mhz,
            fr = %frequency_range,
            algorithm = %inter_algorithm,
            total_prbs = inter.total_prbs,
            "cell created"
        );
        Ok(Self {
            carriers_mhz,
            frequency_range,
            tdd,
            max_buffer_bytes,
            granularity,
            slices: IndexMap::new(),
            ues: UeRegistry::new(),
            inter,
        })
    }

    pub fn add_slice(&mut self, slice: Slice) -> SliceId {
        let id = slice.id;
        self.slices.insert(id, slice);
        id
    }

    pub fn add_ue(&mut self, ue: Ue) -> UeId {
        self.ues.insert(ue)
    }

    /// One allocation round of the inter-slice scheduler.
    pub fn allocate_slices(&mut self, rng: &mut impl Rng) -> Result<(), ConfigError> {
        self.inter.allocate(&mut self.slices, &self.ues, rng)
    }

    /// One poll of a terminal's connection state machine.
    ///
    /// With application data waiting an idle terminal connects; a connected
    /// one moves one packet to its bearer under the admission rule. With no
    /// activity for the inactivity timeout the connection is released and
    /// its buffered content counted lost.
    pub fn poll_connection(&mut self, id: UeId, now: Duration) {
        let (state, last_activity, has_app_data) = {
            let ue = self.ues.get(id);
            (ue.state, ue.last_activity, !ue.flow.app_buffer.is_empty())
        };
        match state {
            RrcState::Idle if has_app_data => self.connect(id, now),
            RrcState::Connected if has_app_data => {
                self.queue_data_packet(id);
                self.ues.get_mut(id).last_activity = now;
            }
            RrcState::Connected
                if now.saturating_sub(last_activity) >= INACTIVITY_TIMER =>
            {
                self.release(id)
            }
            _ => {}
        }
    }

    /// `idle -> connected`: create the bearer, register with the slice
    /// scheduler (idempotent) and admit the first packet.
    fn connect(&mut self, id: UeId, now: Duration) {
        let (slice_id, direction) = {
            let ue = self.ues.get_mut(id);
            ue.bearer = Some(Bearer::new(9, ue.direction));
            ue.state = RrcState::Connected;
            ue.last_activity = now;
            (ue.slice, ue.direction)
        };
        self.queue_data_packet(id);
        if let Some(slice) = self.slices.get_mut(&slice_id) {
            slice.scheduler_mut(direction).register(id);
        }
        debug!(ue = %id, slice = %slice_id, dir = %direction, "terminal connected");
    }

    /// Move one packet from the application buffer into the bearer, dropping
    /// it as lost when the bearer already holds the cell's buffer limit.
    fn queue_data_packet(&mut self, id: UeId) {
        let limit = self.max_buffer_bytes;
        let ue = self.ues.get_mut(id);
        let Some(packet) = ue.flow.app_buffer.pop() else {
            return;
        };
        if ue.bearer_bytes() < limit {
            if let Some(bearer) = ue.bearer.as_mut() {
                bearer.buffer.push(packet);
            }
        } else {
            ue.flow.lost_packets += 1;
            debug!(ue = %id, seq = packet.seq, "buffer full, packet lost");
        }
    }

    /// `connected -> idle`: the bearer and all pending blocks are discarded;
    /// every packet still queued or awaiting retransmission counts lost once.
    fn release(&mut self, id: UeId) {
        let (slice_id, direction) = {
            let ue = self.ues.get_mut(id);
            let mut lost = 0u64;
            if let Some(mut bearer) = ue.bearer.take() {
                lost += bearer.buffer.drain().count() as u64;
            }
            for tb in ue.pending_tbs.drain(..) {
                if tb.kind == TbKind::Data {
                    lost += tb.packets.len() as u64;
                }
            }
            ue.flow.lost_packets += lost;
            ue.state = RrcState::Idle;
            (ue.slice, ue.direction)
        };
        if let Some(slice) = self.slices.get_mut(&slice_id) {
            slice.scheduler_mut(direction).deregister(id);
        }
        debug!(ue = %id, "connection released after inactivity");
    }

    /// Horizon sweep: everything still queued at the end of the run counts
    /// lost exactly once (application buffer, bearer, pending blocks).
    pub fn sweep_undelivered(&mut self) {
        for ue in self.ues.iter_mut() {
            let mut lost = ue.flow.app_buffer.drain().count() as u64;
            if let Some(bearer) = ue.bearer.as_mut() {
                lost += bearer.buffer.drain().count() as u64;
            }
            for tb in ue.pending_tbs.drain(..) {
                if tb.kind == TbKind::Data {
                    lost += tb.packets.len() as u64;
                }
            }
            ue.flow.lost_packets += lost;
        }
    }
}
