//! Terminal state: connection machine inputs, transport blocks and the
//! scheduler-facing per-terminal bookkeeping.

use slicesim_radio::RadioLink;
use slicesim_traffic::{Bearer, PacketFlow};
use slicesim_types::{Direction, Modulation, SliceId, TbId, UeId};
use std::collections::VecDeque;
use std::time::Duration;

/// Length of the past-TBS history used by the proportional-fair metric.
pub const PF_HISTORY_LEN: usize = 30;

/// Retransmissions allowed before a transport block is dropped.
pub const MAX_RETRANSMISSIONS: u32 = 3000;

/// RRC connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrcState {
    Idle,
    Connected,
}

/// Sequence number and arrival stamp of a packet carried inside a transport
/// block, kept so delivery delay can be measured when the block lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketStamp {
    pub seq: u64,
    pub t_in: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TbKind {
    Data,
    Signaling,
}

/// The unit scheduled onto resources in one TTI.
#[derive(Debug, Clone)]
pub struct TransportBlock {
    pub id: TbId,
    pub ue: UeId,
    pub direction: Direction,
    pub modulation: Modulation,
    pub kind: TbKind,
    /// Packets (fully or partially) carried by this block.
    pub packets: Vec<PacketStamp>,
    pub n_prb: u32,
    pub payload_bytes: u64,
    pub retx_count: u32,
}

/// Scheduler-level transport-block queue with a finite unit capacity: slot
/// count in FDD mode, the symbol budget in TDD mode. Overflow drops the
/// block, it is never an error.
#[derive(Debug, Clone)]
pub struct TbQueue {
    blocks: VecDeque<TransportBlock>,
    capacity: usize,
}

impl TbQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            blocks: VecDeque::new(),
            capacity,
        }
    }

    pub fn free_space(&self) -> usize {
        self.capacity.saturating_sub(self.blocks.len())
    }

    /// Insert if a unit of space remains. Returns whether the block was
    /// accepted.
    pub fn insert(&mut self, tb: TransportBlock) -> bool {
        if self.free_space() >= 1 {
            self.blocks.push_back(tb);
            true
        } else {
            false
        }
    }

    pub fn pop(&mut self) -> Option<TransportBlock> {
        self.blocks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
    }
}

/// One terminal of one direction. The cell creates terminals at scenario
/// setup; they toggle between idle and connected but are never destroyed.
#[derive(Debug, Clone)]
pub struct Ue {
    pub id: UeId,
    pub slice: SliceId,
    pub direction: Direction,
    pub state: RrcState,
    pub flow: PacketFlow,
    /// Present while connected.
    pub bearer: Option<Bearer>,
    pub link: RadioLink,
    /// Blocks waiting for retransmission.
    pub pending_tbs: VecDeque<TransportBlock>,

    // Per-TTI allocation, rewritten by the intra-slice scheduler.
    pub prbs: u32,
    pub assigned_base_prbs: Vec<u32>,
    pub assigned_layers: u8,
    pub symbols: u32,

    pub mcs_index: usize,
    pub bler: f64,
    /// Achievable TB size set by the last allocation, bits.
    pub tb_size_bits: f64,
    /// Rolling history of past TB sizes for the PF metric.
    pub past_tb_sizes: VecDeque<f64>,
    pub pf_metric: f64,
    pub pf_num: f64,
    pub pf_den: f64,

    // NUM scheduler fairness state.
    pub cumulative_rate: f64,
    pub smoothed_rate: f64,

    pub res_use: u64,
    pub txed_tbs: u64,
    pub lost_tbs: u64,
    next_tb_id: u64,
    pub last_activity: Duration,
}

impl Ue {
    pub fn new(id: UeId, slice: SliceId, direction: Direction, flow: PacketFlow, link: RadioLink) -> Self {
        Self {
            id,
            slice,
            direction,
            state: RrcState::Idle,
            flow,
            bearer: None,
            link,
            pending_tbs: VecDeque::new(),
            prbs: 0,
            assigned_base_prbs: Vec::new(),
            assigned_layers: 1,
            symbols: 0,
            mcs_index: 0,
            bler: 0.0,
            tb_size_bits: 1.0,
            past_tb_sizes: VecDeque::from([1.0]),
            pf_metric: 1.0,
            pf_num: 0.0,
            pf_den: 0.001,
            cumulative_rate: 0.0,
            smoothed_rate: 0.0,
            res_use: 0,
            txed_tbs: 0,
            lost_tbs: 0,
            next_tb_id: 1,
            last_activity: Duration::ZERO,
        }
    }

    pub fn next_tb_id(&mut self) -> TbId {
        let id = TbId(self.next_tb_id);
        self.next_tb_id += 1;
        id
    }

    pub fn has_bearer_packets(&self) -> bool {
        self.bearer.as_ref().is_some_and(Bearer::has_packets)
    }

    pub fn bearer_bytes(&self) -> u64 {
        self.bearer.as_ref().map_or(0, |b| b.buffer.bytes())
    }

    /// Push the last achieved TB size into the PF history, evicting the
    /// oldest sample past the window, then reset the current size.
    pub fn push_pf_history(&mut self) {
        if self.past_tb_sizes.len() > PF_HISTORY_LEN {
            self.past_tb_sizes.pop_front();
        }
        self.past_tb_sizes.push_back(self.tb_size_bits);
        self.tb_size_bits = 1.0;
    }

    /// Record the last TB size without resetting it, used when the terminal
    /// keeps the allocation this TTI.
    pub fn record_pf_history(&mut self) {
        if self.past_tb_sizes.len() > PF_HISTORY_LEN {
            self.past_tb_sizes.pop_front();
        }
        self.past_tb_sizes.push_back(self.tb_size_bits);
    }

    pub fn mean_past_tb_size(&self) -> f64 {
        let sum: f64 = self.past_tb_sizes.iter().sum();
        sum / self.past_tb_sizes.len() as f64
    }
}
