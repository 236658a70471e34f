//! Free-will commitment: turn a committable set into ordered blocks.
//!
//! Safety of every command in the committable set is already established.
//! What remains is the order: each round takes the commands that head the
//! per-author democracy index, and each replica breaks ties the same way
//! (trusted timestamp, then digest), so all correct replicas emit the same
//! sequence.

use phalanx_ledger::CommandLedger;
use phalanx_types::{Digest, OrderedBlock, ReplicaId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Per-author index of the committable set, keyed by each author's
/// sequence number.
#[derive(Debug, Default)]
pub struct DemocracyIndex {
    index: BTreeMap<ReplicaId, BTreeMap<u64, Digest>>,
}

impl DemocracyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every order of every command in `committable`.
    pub fn build(ledger: &CommandLedger, committable: &[Digest]) -> Self {
        let mut index = Self::new();
        for digest in committable {
            if let Some(info) = ledger.command_info(digest) {
                for order in info.orders().values() {
                    index.insert(order.author, order.sequence, *digest);
                }
            }
        }
        index
    }

    pub fn insert(&mut self, author: ReplicaId, sequence: u64, digest: Digest) {
        self.index.entry(author).or_default().insert(sequence, digest);
    }

    /// Drop every entry naming `digest`.
    pub fn remove(&mut self, digest: &Digest) {
        for entries in self.index.values_mut() {
            entries.retain(|_, d| d != digest);
        }
        self.index.retain(|_, entries| !entries.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Commands to commit together this round.
    ///
    /// Digests heading at least `one_correct` authors' indexes; if none
    /// reach that threshold, every current head.
    pub fn concurrent_set(&self, one_correct: usize) -> Vec<Digest> {
        let mut tally: BTreeMap<Digest, usize> = BTreeMap::new();
        for entries in self.index.values() {
            if let Some((_, digest)) = entries.first_key_value() {
                *tally.entry(*digest).or_default() += 1;
            }
        }

        let supported: Vec<Digest> = tally
            .iter()
            .filter(|(_, count)| **count >= one_correct)
            .map(|(digest, _)| *digest)
            .collect();
        if supported.is_empty() {
            tally.into_keys().collect()
        } else {
            supported
        }
    }
}

/// Emits blocks for committable sets, numbering the rounds.
#[derive(Debug, Default)]
pub struct FreeWill {
    round: u64,
}

impl FreeWill {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rounds emitted so far.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Commit every command in `committable`, returning its blocks in commit
    /// order.
    ///
    /// Each commit goes through the ledger, so waiting commands released by
    /// it are back in QuorumSequenced when this returns.
    pub fn commit(&mut self, ledger: &mut CommandLedger, committable: &[Digest]) -> Vec<OrderedBlock> {
        let one_correct = ledger.params().one_correct();
        let mut index = DemocracyIndex::build(ledger, committable);
        let mut remaining: BTreeSet<Digest> = committable.iter().copied().collect();
        let mut blocks = Vec::with_capacity(committable.len());

        while !index.is_empty() {
            let concurrent = index.concurrent_set(one_correct);
            if concurrent.is_empty() {
                break;
            }
            self.round += 1;

            let mut batch: Vec<(i64, Digest)> = concurrent
                .iter()
                .filter_map(|d| ledger.command_info(d))
                .map(|info| (info.trusted_ts().unwrap_or_default(), info.digest()))
                .collect();
            batch.sort_unstable();
            debug!(round = self.round, size = batch.len(), "Free-will round");

            for (trusted_ts, digest) in batch {
                index.remove(&digest);
                remaining.remove(&digest);
                ledger.committed_status(digest);
                trace!(command = %digest, trusted_ts, round = self.round, "Command committed");
                blocks.push(OrderedBlock {
                    digest,
                    trusted_ts,
                    round: self.round,
                });
            }
        }

        debug_assert!(remaining.is_empty(), "committable commands left uncommitted");
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::collect_evidence;
    use phalanx_types::test_utils::{digest_with_prefix, order};
    use phalanx_types::QuorumParams;

    #[test]
    fn test_concurrent_set_requires_one_correct_agreement() {
        let a = digest_with_prefix(1);
        let b = digest_with_prefix(2);

        let mut index = DemocracyIndex::new();
        index.insert(ReplicaId(1), 1, a);
        index.insert(ReplicaId(2), 4, a);
        index.insert(ReplicaId(3), 1, b);
        index.insert(ReplicaId(3), 2, a);

        // n = 4 → one_correct = 2
        assert_eq!(index.concurrent_set(2), vec![a]);

        index.remove(&a);
        assert_eq!(index.concurrent_set(2), vec![b]);
    }

    #[test]
    fn test_concurrent_set_falls_back_to_all_heads() {
        let a = digest_with_prefix(1);
        let b = digest_with_prefix(2);

        let mut index = DemocracyIndex::new();
        index.insert(ReplicaId(1), 1, b);
        index.insert(ReplicaId(2), 1, a);

        assert_eq!(index.concurrent_set(2), vec![a, b]);
    }

    #[test]
    fn test_commit_orders_by_trusted_timestamp() {
        let mut ledger = CommandLedger::new(QuorumParams::new(4).unwrap());
        let a = digest_with_prefix(1);
        let b = digest_with_prefix(2);

        // Authors disagree on the head, so both land in one round.
        collect_evidence(&mut ledger, order(1, 1, a, 50));
        collect_evidence(&mut ledger, order(2, 1, b, 10));
        collect_evidence(&mut ledger, order(3, 1, a, 50));
        collect_evidence(&mut ledger, order(4, 1, b, 10));
        collect_evidence(&mut ledger, order(1, 2, b, 10));
        collect_evidence(&mut ledger, order(2, 2, a, 50));

        let mut free_will = FreeWill::new();
        let blocks = free_will.commit(&mut ledger, &[a, b]);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].digest, b);
        assert_eq!(blocks[1].digest, a);
        assert_eq!(blocks[0].round, 1);
        assert_eq!(blocks[1].round, 1);
        assert!(ledger.is_committed(&a) && ledger.is_committed(&b));
        assert_eq!(free_will.round(), 1);
    }
}
