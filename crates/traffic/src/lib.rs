//! Traffic generation for the sliced-cell simulator: heavy-tailed packet
//! flows, FIFO packet queues and radio bearers.

mod flow;
mod packet;

pub use flow::{FlowKpis, PacketFlow, TRAFFIC_FRACTION};
pub use packet::{Bearer, Packet, PacketQueue};
