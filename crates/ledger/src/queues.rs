//! Per-author FIFO queues of accepted partial orders.

use phalanx_types::{Digest, OrderInfo, QuorumParams, ReplicaId};
use std::collections::{BTreeMap, VecDeque};

/// Result of inspecting the heads of every author's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontSet {
    /// Candidate digests, ascending.
    pub digests: Vec<Digest>,

    /// `true` when a single digest heads at least a quorum of queues, so it
    /// can be committed next without further evidence.
    pub safe: bool,
}

/// One queue per replica, holding that author's accepted orders in
/// sequence order.
#[derive(Debug)]
pub struct FrontQueues {
    queues: BTreeMap<ReplicaId, VecDeque<OrderInfo>>,
}

impl FrontQueues {
    pub fn new(params: &QuorumParams) -> Self {
        Self {
            queues: params.replicas().map(|id| (id, VecDeque::new())).collect(),
        }
    }

    /// Append an order to its author's queue. Unknown authors are ignored.
    pub fn push_back(&mut self, info: OrderInfo) -> bool {
        match self.queues.get_mut(&info.author) {
            Some(queue) => {
                queue.push_back(info);
                true
            }
            None => false,
        }
    }

    /// Current head of each non-empty queue.
    ///
    /// Heads for which `is_committed` holds are popped first.
    pub fn fronts(&mut self, is_committed: impl Fn(&Digest) -> bool) -> BTreeMap<ReplicaId, Digest> {
        let mut fronts = BTreeMap::new();
        for (author, queue) in &mut self.queues {
            while queue.front().is_some_and(|o| is_committed(&o.command)) {
                queue.pop_front();
            }
            if let Some(head) = queue.front() {
                fronts.insert(*author, head.command);
            }
        }
        fronts
    }

    /// Drop `digest` from the queues of the given authors.
    pub fn remove(&mut self, digest: &Digest, authors: impl IntoIterator<Item = ReplicaId>) {
        for author in authors {
            if let Some(queue) = self.queues.get_mut(&author) {
                queue.retain(|o| o.command != *digest);
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}
