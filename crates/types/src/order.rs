//! Partial-order evidence.

use crate::{Digest, ReplicaId};
use std::fmt;

/// One replica's assertion about the position of one command in its own
/// partial order.
///
/// `sequence` is the author's local counter over the commands it has
/// ordered; it is not global. `timestamp` is the author's local clock
/// (nanoseconds) when it ordered the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderInfo {
    /// Replica that produced this partial order.
    pub author: ReplicaId,
    /// Author-local sequence number.
    pub sequence: u64,
    /// Digest of the ordered command.
    pub command: Digest,
    /// Author-local timestamp.
    pub timestamp: i64,
}

impl OrderInfo {
    pub fn new(author: ReplicaId, sequence: u64, command: Digest, timestamp: i64) -> Self {
        Self {
            author,
            sequence,
            command,
            timestamp,
        }
    }
}

impl fmt::Display for OrderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[OrderInfo: author {}, sequence {}, command {}, timestamp {}]",
            self.author, self.sequence, self.command, self.timestamp
        )
    }
}

/// Convert an author's partial order (a list of command digests with their
/// timestamps) into sequenced `OrderInfo`s.
///
/// `last_sequence` is the highest sequence already assigned for `author`.
/// Returns the infos and the new highest sequence.
pub fn sequence_partial_order(
    author: ReplicaId,
    last_sequence: u64,
    commands: &[(Digest, i64)],
) -> (Vec<OrderInfo>, u64) {
    let mut sequence = last_sequence;
    let infos = commands
        .iter()
        .map(|(command, timestamp)| {
            sequence += 1;
            OrderInfo::new(author, sequence, *command, *timestamp)
        })
        .collect();
    (infos, sequence)
}
