//! Core types for the sliced-cell scheduling simulator: identifiers,
//! physical-layer tables, service profiles and scenario configuration.

mod config;
mod identifiers;
pub mod phy;
mod profile;

pub use config::{
    ConfigError, InterAlgorithm, IntraAlgorithm, TraceScenarioConfig, UeGroupInfo, MIN_PRB_GROUP,
};
pub use identifiers::{Direction, FlowId, SliceId, TbId, UeId};
pub use phy::{FrequencyRange, McsEntry, Modulation, MCS_TABLE, SYMBOLS_PER_SLOT};
pub use profile::{initial_sinr, ServiceClass, ServiceProfile, SinrSpecError};
