//! Core types for the Phalanx ordering engine.
//!
//! This crate provides the foundational types used throughout the ordering
//! implementation:
//!
//! - **Primitives**: [`Digest`] command identifiers
//! - **Identifiers**: [`ReplicaId`], [`SeqNo`]
//! - **Evidence**: [`OrderInfo`], one replica's partial-order assertion
//! - **Output**: [`Command`], [`OrderedBlock`], [`Block`]
//! - **Parameters**: [`QuorumParams`], the thresholds derived from `n`
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod block;
mod digest;
mod identifiers;
mod order;
mod params;

pub use block::{Block, Command, OrderedBlock};
pub use digest::Digest;
pub use identifiers::{ReplicaId, SeqNo};
pub use order::{sequence_partial_order, OrderInfo};
pub use params::{ParamsError, QuorumParams};

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Create a digest with predictable ordering: lower prefix = lower digest.
    pub fn digest_with_prefix(prefix: u8) -> Digest {
        let mut bytes = [0u8; 32];
        bytes[0] = prefix;
        Digest::from_hash_bytes(&bytes)
    }

    /// Create an `OrderInfo` for tests.
    pub fn order(author: u64, sequence: u64, command: Digest, timestamp: i64) -> OrderInfo {
        OrderInfo::new(ReplicaId(author), sequence, command, timestamp)
    }
}
