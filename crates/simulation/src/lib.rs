//! Deterministic simulation of a Phalanx cluster.
//!
//! Runs one [`phalanx_ordering::OrderingState`] per replica over a seeded,
//! latency-jittered network. Same seed, same commits.

mod network;
mod runner;

pub use network::{NetworkConfig, SimulatedNetwork};
pub use runner::{SimulationConfig, SimulationError, SimulationRunner, SimulationStats};
