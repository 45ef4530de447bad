//! Slicesim Simulator
//!
//! Scenario wiring and reporting on top of the simulation engine: builds a
//! sliced cell from a configuration, runs it to the horizon and aggregates
//! per-terminal and per-slice KPIs.
//!
//! # Example
//!
//! ```ignore
//! use slicesim_simulator::{Simulator, SimulatorConfig, UeGroupConfig};
//! use std::time::Duration;
//!
//! // A 10 MHz FR1 cell with one video slice of four downlink terminals.
//! let config = SimulatorConfig::new(10, 3)
//!     .with_horizon(Duration::from_secs(20))
//!     .with_group(UeGroupConfig::new("eMBB-video").with_downlink(4, 1500.0, 2.0));
//!
//! let mut simulator = Simulator::new(config)?;
//! let report = simulator.run()?;
//!
//! println!("p99 delay: {:?}", report.p99_delay());
//! report.print_summary();
//! ```

pub mod config;
pub mod report;
pub mod runner;

pub use config::{SimulatorConfig, UeGroupConfig};
pub use report::{SimulationReport, SliceReport, UeReport};
pub use runner::Simulator;
