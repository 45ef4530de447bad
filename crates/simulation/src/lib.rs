//! Deterministic discrete-event driver for the sliced-cell model.
//!
//! The runner owns one [`slicesim_sched::Cell`] and a single seeded RNG and
//! advances everything through one ordered event queue: the same seed and
//! scenario reproduce a run exactly.

mod event_queue;
mod runner;
mod sinks;

pub use event_queue::{Event, EventKey, EventPriority};
pub use runner::{SimulationError, SimulationRunner, SimulationStats};
pub use sinks::{KpiSample, MemorySink, NullSink, SliceKpiSample, StatsSink};
