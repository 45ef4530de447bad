//! Event queue with deterministic ordering.

use slicesim_types::{Direction, SliceId, UeId};
use std::cmp::Ordering;
use std::time::Duration;

/// Priority for ordering events that fire at the same instant.
///
/// Traffic lands before the connection machine polls, the channel settles
/// before any scheduler runs, and the inter-slice budget is refreshed before
/// the intra-slice ticks that consume it. Statistics sample last so they see
/// the instant's final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    Traffic,
    Connection,
    Channel,
    InterAllocation,
    IntraTick,
    Stats,
}

/// One scheduled occurrence in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A flow generates its next packet.
    PacketArrival { ue: UeId },
    /// One poll of a terminal's connection state machine.
    ConnectionPoll { ue: UeId },
    /// One random-walk step of a terminal's link quality.
    LinkUpdate { ue: UeId },
    /// A terminal group advances to its next channel scene.
    SceneAdvance { group: usize },
    /// One inter-slice allocation round.
    InterAllocation,
    /// One scheduling tick of a slice direction.
    IntraTick { slice: SliceId, direction: Direction },
    /// One KPI sample.
    StatsSample,
}

impl Event {
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::PacketArrival { .. } => EventPriority::Traffic,
            Event::ConnectionPoll { .. } => EventPriority::Connection,
            Event::LinkUpdate { .. } | Event::SceneAdvance { .. } => EventPriority::Channel,
            Event::InterAllocation => EventPriority::InterAllocation,
            Event::IntraTick { .. } => EventPriority::IntraTick,
            Event::StatsSample => EventPriority::Stats,
        }
    }

    /// Tie-break index within a priority class.
    pub fn actor(&self) -> u64 {
        match self {
            Event::PacketArrival { ue }
            | Event::ConnectionPoll { ue }
            | Event::LinkUpdate { ue } => u64::from(ue.0),
            Event::SceneAdvance { group } => *group as u64,
            Event::IntraTick { slice, direction } => {
                u64::from(slice.0) * 2
                    + match direction {
                        Direction::Downlink => 0,
                        Direction::Uplink => 1,
                    }
            }
            Event::InterAllocation | Event::StatsSample => 0,
        }
    }
}

/// Key for ordering events in the queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Priority (traffic before connection before channel before schedulers)
/// 3. Actor (deterministic ordering within a class)
/// 4. Sequence number (FIFO for same time/priority/actor)
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventKey {
    pub time: Duration,
    pub priority: EventPriority,
    pub actor: u64,
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, sequence: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            actor: event.actor(),
            sequence,
        }
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.priority.cmp(&other.priority) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.actor.cmp(&other.actor) {
            Ordering::Equal => {}
            ord => return ord,
        }
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
