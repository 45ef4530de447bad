//! Packets, FIFO packet queues and bearers.

use slicesim_types::{Direction, FlowId, UeId};
use std::collections::VecDeque;
use std::time::Duration;

/// An application packet.
///
/// Immutable once created except for in-place size truncation when only part
/// of it fits a transport block (the remainder is re-queued at the buffer
/// head).
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Sequence number within the owning flow.
    pub seq: u64,
    /// Remaining size in bytes.
    pub size: u64,
    /// Owning flow.
    pub flow: FlowId,
    /// Owning terminal.
    pub ue: UeId,
    /// Arrival timestamp (simulated time).
    pub t_in: Duration,
}

/// Byte-oriented FIFO queue of packets, used for both the application buffer
/// and the bearer buffer.
#[derive(Debug, Clone, Default)]
pub struct PacketQueue {
    packets: VecDeque<Packet>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the tail.
    pub fn push(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }

    /// Re-insert a partially consumed packet at the head.
    pub fn push_front(&mut self, packet: Packet) {
        self.packets.push_front(packet);
    }

    /// Remove from the head.
    pub fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Total queued bytes.
    pub fn bytes(&self) -> u64 {
        self.packets.iter().map(|p| p.size).sum()
    }

    /// Drain every queued packet, e.g. when a bearer is discarded.
    pub fn drain(&mut self) -> impl Iterator<Item = Packet> + '_ {
        self.packets.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Packet> {
        self.packets.iter()
    }
}

/// A radio bearer: the buffered byte queue between the application and the
/// scheduler, created on connection and discarded on release.
#[derive(Debug, Clone)]
pub struct Bearer {
    /// QoS class identifier. Only carried for reporting.
    pub qci: u8,
    pub direction: Direction,
    pub buffer: PacketQueue,
}

impl Bearer {
    pub fn new(qci: u8, direction: Direction) -> Self {
        Self {
            qci,
            direction,
            buffer: PacketQueue::new(),
        }
    }

    pub fn has_packets(&self) -> bool {
        !self.buffer.is_empty()
    }
}
