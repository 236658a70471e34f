//! Identifier newtypes.

use std::fmt;

/// Identifier of a replica in the cluster.
///
/// Replica identifiers are 1-based: a cluster of `n` replicas uses
/// `ReplicaId(1)..=ReplicaId(n)`. Every replica is also an author of
/// partial orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaId(pub u64);

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an ordered block in the local commit sequence.
///
/// Strictly increasing, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SeqNo(pub u64);

impl SeqNo {
    pub fn next(self) -> Self {
        SeqNo(self.0 + 1)
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
