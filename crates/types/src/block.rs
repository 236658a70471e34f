//! Commands and the blocks produced for them.

use crate::{Digest, ReplicaId};
use std::fmt;

/// A raw command: a batch of client transactions proposed by one replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Digest over proposer, sequence and payload.
    pub digest: Digest,
    /// Replica that batched the command.
    pub author: ReplicaId,
    /// Proposer-local command sequence.
    pub sequence: u64,
    /// Opaque transaction payloads.
    pub transactions: Vec<Vec<u8>>,
}

impl Command {
    pub fn new(author: ReplicaId, sequence: u64, transactions: Vec<Vec<u8>>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&author.0.to_le_bytes());
        hasher.update(&sequence.to_le_bytes());
        for tx in &transactions {
            hasher.update(&(tx.len() as u64).to_le_bytes());
            hasher.update(tx);
        }
        let digest = Digest::from_hash_bytes(hasher.finalize().as_bytes());

        Self {
            digest,
            author,
            sequence,
            transactions,
        }
    }
}

/// An ordering decision for one command, produced by the ordering engine
/// before the raw command body is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderedBlock {
    /// Digest of the committed command.
    pub digest: Digest,
    /// Byzantine-resistant timestamp of the command.
    pub trusted_ts: i64,
    /// Free-will round that committed the command.
    pub round: u64,
}

impl fmt::Display for OrderedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Block: command {}, trusted-ts {}, round {}]",
            self.digest, self.trusted_ts, self.round
        )
    }
}

/// A fully assembled block handed to the execution service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The committed command.
    pub command: Command,
    /// Byzantine-resistant timestamp of the command.
    pub trusted_ts: i64,
    /// Free-will round that committed the command.
    pub round: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_digest_binds_author_and_payload() {
        let a = Command::new(ReplicaId(1), 1, vec![b"tx".to_vec()]);
        let b = Command::new(ReplicaId(2), 1, vec![b"tx".to_vec()]);
        let c = Command::new(ReplicaId(1), 1, vec![b"t".to_vec(), b"x".to_vec()]);

        assert_ne!(a.digest, b.digest);
        assert_ne!(a.digest, c.digest);
        assert_eq!(a, Command::new(ReplicaId(1), 1, vec![b"tx".to_vec()]));
    }
}
