//! Radio link modelling: per-terminal link state, the bounded random-walk
//! quality model and channel-trace scene replay.

mod link;
mod trace;

pub use link::RadioLink;
pub use trace::{MemoryScenes, Scene, SceneDir, SceneSource, TraceError};
