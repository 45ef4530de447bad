//! Two-level radio-resource scheduling for a sliced cell: the cell and its
//! connection state machine, the slice registry, and the intra-/inter-slice
//! scheduler families.

mod cell;
mod inter;
mod intra;
mod registry;
mod slice;
mod ue;

pub use cell::{Cell, INACTIVITY_TIMER, POLL_INTERVAL};
pub use inter::{GroupRotation, InterScheduler};
pub use intra::{
    Delivery, IntraScheduler, TtiOutcome, ANGLE_SEPARATION_DEG, RATE_SMOOTHING, TARGET_BER,
};
pub use registry::UeRegistry;
pub use slice::{Slice, RCVD_WINDOW};
pub use ue::{
    PacketStamp, RrcState, TbKind, TbQueue, TransportBlock, Ue, MAX_RETRANSMISSIONS,
    PF_HISTORY_LEN,
};
