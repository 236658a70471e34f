//! Core types for the Phalanx ordering engine.
//!
//! This crate provides the foundational types for the engine architecture:
//!
//! - [`Event`]: All possible inputs to the state machine
//! - [`Action`]: All possible outputs from the state machine
//! - [`StateMachine`]: The trait the ordering engine implements
//!
//! # Model
//!
//! ```text
//! verified OrderInfo ──▶ Event ──▶ OrderingState::handle() ──▶ Action::CommitBlock
//! ```
//!
//! `handle` never blocks and never touches I/O; its output depends only on
//! the ledger contents and the event. The runner that owns the state machine
//! (tokio in production, a seeded event queue in simulation) feeds it
//! evidence one event at a time and carries out the commits it returns.

mod action;
mod event;
mod traits;

pub use action::Action;
pub use event::Event;
pub use traits::StateMachine;
