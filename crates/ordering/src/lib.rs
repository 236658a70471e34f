//! Leaderless BFT ordering for Phalanx.
//!
//! Replicas each publish their own partial order over client commands. This
//! crate turns the collected partial orders into one total order that every
//! correct replica agrees on, without a leader:
//!
//! 1. [`collection`]: admit evidence, promoting commands to
//!    correct-sequenced (`f+1` orders) and quorum-sequenced (`n−f` orders)
//! 2. [`resolver`]: decide whether a quorum-sequenced command must wait for
//!    others, refusing edges that would form a Condorcet cycle
//! 3. [`interceptor`]: prove queue-head candidates safe (anchor strategy)
//! 4. [`free_will`]: emit committable commands in rounds, ordered by trusted
//!    timestamp then digest
//!
//! [`OrderingState`] ties these together behind the
//! [`StateMachine`](phalanx_core::StateMachine) trait.

pub mod collection;
pub mod config;
pub mod free_will;
pub mod interceptor;
pub mod resolver;
mod state;

pub use config::{OrderingConfig, SelectionStrategy};
pub use free_will::{DemocracyIndex, FreeWill};
pub use state::{OrderingError, OrderingState, OrderingStats};
