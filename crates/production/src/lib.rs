//! Production runner with async I/O.
//!
//! This crate wraps the deterministic ordering state machine with real async
//! I/O:
//!
//! - Verified evidence arrives on a bounded tokio channel
//! - Ordered blocks are completed from a [`CommandStore`] and handed to an
//!   [`ExecutionSink`] strictly in sequence order
//! - Configuration is read from TOML, logging goes through `tracing`
//!
//! # Architecture
//!
//! A single task owns the state machine and receives events via an mpsc
//! channel. This avoids mutex contention and keeps every ledger mutation on
//! one logical thread.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          OrderingRunner                           │
//! │                                                                   │
//! │  evidence ──▶ mpsc ──▶ OrderingState::handle() ──▶ CommitBlock    │
//! │                                                      │            │
//! │                                                      ▼            │
//! │                  CommandStore ◀── poll ── BlockAssembler          │
//! │                                                      │            │
//! │                                                      ▼            │
//! │                                              ExecutionSink        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

mod assembler;
pub mod config;
mod runner;
mod store;
pub mod telemetry;

pub use assembler::BlockAssembler;
pub use config::{ConfigError, NodeConfig};
pub use runner::{OrderingRunner, OrderingRunnerBuilder, RunnerError, ShutdownHandle};
pub use store::{ChannelSink, CommandStore, ExecutionSink, MemoryCommandStore, RecordingSink};
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
