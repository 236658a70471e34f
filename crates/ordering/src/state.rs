//! Ordering state machine.

use crate::collection::collect_evidence;
use crate::config::{OrderingConfig, SelectionStrategy};
use crate::free_will::FreeWill;
use crate::interceptor::select_to_commit;
use crate::resolver::resolve_priorities;
use phalanx_core::{Action, Event, StateMachine};
use phalanx_ledger::{CommandLedger, CommandStatus};
use phalanx_types::{Digest, OrderInfo, OrderedBlock, QuorumParams, ReplicaId, SeqNo};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Errors constructing the ordering state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    #[error("replica {replica} is not a member of a {n}-replica cluster")]
    InvalidReplica { replica: ReplicaId, n: usize },
}

/// Ordering statistics for monitoring.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderingStats {
    /// Non-committed commands with at least one order.
    pub tracked: usize,
    /// Correct-sequenced commands.
    pub correct: usize,
    /// Quorum-sequenced commands not waiting on priorities.
    pub quorum: usize,
    /// Commands waiting on priorities.
    pub waiting: usize,
    /// Commands currently marked as leaves.
    pub leaves: usize,
    /// Commands committed.
    pub committed: usize,
    /// Free-will rounds emitted.
    pub rounds: u64,
    /// Sequence number of the last emitted block.
    pub last_seq_no: u64,
}

/// Leaderless ordering engine for one replica.
///
/// Consumes verified partial orders and emits [`Action::CommitBlock`] for
/// every command once its position in the total order is final. All
/// correct replicas fed the same evidence emit the same block sequence.
pub struct OrderingState {
    /// This replica.
    replica_id: ReplicaId,

    ledger: CommandLedger,
    free_will: FreeWill,

    /// Sequence number of the last emitted block.
    last_seq_no: SeqNo,

    config: OrderingConfig,

    /// Current time.
    now: Duration,
}

impl std::fmt::Debug for OrderingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderingState")
            .field("replica_id", &self.replica_id)
            .field("strategy", &self.config.strategy)
            .field("last_seq_no", &self.last_seq_no)
            .field("ledger", &self.ledger.stats())
            .finish()
    }
}

impl OrderingState {
    /// Create a new ordering state machine with the default configuration.
    pub fn new(params: QuorumParams, replica_id: ReplicaId) -> Result<Self, OrderingError> {
        Self::with_config(params, replica_id, OrderingConfig::default())
    }

    /// Create a new ordering state machine with custom configuration.
    pub fn with_config(
        params: QuorumParams,
        replica_id: ReplicaId,
        config: OrderingConfig,
    ) -> Result<Self, OrderingError> {
        if !params.contains(replica_id) {
            return Err(OrderingError::InvalidReplica {
                replica: replica_id,
                n: params.n(),
            });
        }
        Ok(Self {
            replica_id,
            ledger: CommandLedger::new(params),
            free_will: FreeWill::new(),
            last_seq_no: SeqNo::default(),
            config,
            now: Duration::ZERO,
        })
    }

    pub fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    pub fn config(&self) -> &OrderingConfig {
        &self.config
    }

    pub fn ledger(&self) -> &CommandLedger {
        &self.ledger
    }

    pub fn status(&self, digest: &Digest) -> CommandStatus {
        self.ledger.status(digest)
    }

    pub fn stats(&self) -> OrderingStats {
        let ledger = self.ledger.stats();
        OrderingStats {
            tracked: ledger.tracked,
            correct: ledger.correct,
            quorum: ledger.quorum,
            waiting: ledger.waiting,
            leaves: ledger.leaves,
            committed: ledger.committed,
            rounds: self.free_will.round(),
            last_seq_no: self.last_seq_no.0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Evidence
    // ═══════════════════════════════════════════════════════════════════════

    /// Admit one verified partial order.
    pub fn on_order(&mut self, info: OrderInfo) -> Vec<Action> {
        let promoted = collect_evidence(&mut self.ledger, info);
        self.run_ordering(promoted)
    }

    /// Admit a batch of partial orders, ordering once after the batch.
    pub fn on_order_stream(&mut self, stream: Vec<OrderInfo>) -> Vec<Action> {
        let mut promoted = false;
        for info in stream {
            promoted |= collect_evidence(&mut self.ledger, info);
        }
        self.run_ordering(promoted)
    }

    fn run_ordering(&mut self, promoted: bool) -> Vec<Action> {
        let blocks = match self.config.strategy {
            SelectionStrategy::NaturalOrder if promoted => self.order_natural(),
            SelectionStrategy::NaturalOrder => Vec::new(),
            SelectionStrategy::AnchorFront => self.order_anchor_front(),
        };
        blocks.into_iter().map(|block| self.emit(block)).collect()
    }

    fn emit(&mut self, block: OrderedBlock) -> Action {
        self.last_seq_no = self.last_seq_no.next();
        info!(
            seq_no = self.last_seq_no.0,
            command = %block.digest,
            trusted_ts = block.trusted_ts,
            round = block.round,
            "Block ordered"
        );
        Action::CommitBlock {
            block,
            seq_no: self.last_seq_no,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Natural order
    // ═══════════════════════════════════════════════════════════════════════

    /// Commit until no quorum-sequenced command is committable.
    fn order_natural(&mut self) -> Vec<OrderedBlock> {
        let mut blocks = Vec::new();
        loop {
            let committable = self.natural_committable();
            if committable.is_empty() {
                break;
            }
            let batch = self.free_will.commit(&mut self.ledger, &committable);
            if batch.is_empty() {
                break;
            }
            blocks.extend(batch);
        }
        blocks
    }

    fn natural_committable(&mut self) -> Vec<Digest> {
        let candidates = self.ledger.quorum_digests();
        let stats = self.ledger.stats();

        if stats.correct == 0 && stats.waiting == 0 {
            trace!(count = candidates.len(), "No competing commands, all quorum commands trusted");
            for digest in &candidates {
                self.ledger.mark_trusted(digest);
            }
            return candidates;
        }

        candidates
            .into_iter()
            .filter(|digest| resolve_priorities(&mut self.ledger, *digest))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Anchor front
    // ═══════════════════════════════════════════════════════════════════════

    /// Commit from the heads of the per-author queues while they can be
    /// proven safe.
    fn order_anchor_front(&mut self) -> Vec<OrderedBlock> {
        let mut blocks = Vec::new();
        loop {
            let Some(fronts) = self.ledger.front_commands() else {
                break;
            };

            let committable = if fronts.safe {
                fronts.digests
            } else {
                let mut seed: Vec<Digest> = fronts
                    .digests
                    .into_iter()
                    .filter(|d| self.ledger.status(d) == CommandStatus::QuorumSequenced)
                    .collect();
                if seed.is_empty() {
                    seed.extend(self.ledger.pick_quorum_info());
                }
                if seed.is_empty() {
                    break;
                }
                match select_to_commit(&self.ledger, &seed) {
                    Some(selected) => selected,
                    None => {
                        debug!(seed = seed.len(), "Front set not yet safe");
                        break;
                    }
                }
            };

            let batch = self.free_will.commit(&mut self.ledger, &committable);
            if batch.is_empty() {
                break;
            }
            blocks.extend(batch);
        }
        blocks
    }
}

impl StateMachine for OrderingState {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        trace!(event = event.type_name(), evidence = event.evidence_count(), "Handling event");
        match event {
            Event::OrderReceived { info } => self.on_order(info),
            Event::OrderStreamReceived { stream } => self.on_order_stream(stream),
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
        self.ledger.set_time(now);
    }

    fn now(&self) -> Duration {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phalanx_types::test_utils::{digest_with_prefix, order};
    use tracing_test::traced_test;

    fn state() -> OrderingState {
        OrderingState::new(QuorumParams::new(4).unwrap(), ReplicaId(1)).unwrap()
    }

    fn committed(actions: &[Action]) -> Vec<(Digest, u64)> {
        actions
            .iter()
            .map(|Action::CommitBlock { block, seq_no }| (block.digest, seq_no.0))
            .collect()
    }

    #[test]
    fn test_rejects_foreign_replica_id() {
        let params = QuorumParams::new(4).unwrap();
        assert_eq!(
            OrderingState::new(params, ReplicaId(5)).unwrap_err(),
            OrderingError::InvalidReplica {
                replica: ReplicaId(5),
                n: 4
            }
        );
    }

    #[traced_test]
    #[test]
    fn test_fast_path_commits_on_quorum() {
        let mut state = state();
        let x = digest_with_prefix(1);

        assert!(state.handle(Event::OrderReceived { info: order(1, 1, x, 10) }).is_empty());
        assert!(state.handle(Event::OrderReceived { info: order(2, 1, x, 20) }).is_empty());
        let actions = state.handle(Event::OrderReceived { info: order(3, 1, x, 30) });

        assert_eq!(committed(&actions), vec![(x, 1)]);
        let Action::CommitBlock { block, .. } = &actions[0];
        assert_eq!(block.trusted_ts, 20);
        assert_eq!(state.status(&x), CommandStatus::Committed);

        // Late evidence is a no-op.
        assert!(state.handle(Event::OrderReceived { info: order(4, 1, x, 40) }).is_empty());
        assert_eq!(state.stats().committed, 1);
    }

    #[traced_test]
    #[test]
    fn test_stream_orders_after_batch() {
        let mut state = state();
        let a = digest_with_prefix(1);
        let b = digest_with_prefix(2);

        let stream = vec![
            order(1, 1, a, 10),
            order(1, 2, b, 20),
            order(2, 1, a, 10),
            order(2, 2, b, 20),
            order(3, 1, a, 10),
            order(3, 2, b, 20),
        ];
        let actions = state.handle(Event::OrderStreamReceived { stream });
        assert_eq!(committed(&actions), vec![(a, 1), (b, 2)]);
        assert_eq!(state.stats().rounds, 2);
    }

    #[traced_test]
    #[test]
    fn test_anchor_front_strategy() {
        let config = OrderingConfig::with_strategy(SelectionStrategy::AnchorFront);
        let mut state =
            OrderingState::with_config(QuorumParams::new(4).unwrap(), ReplicaId(2), config).unwrap();
        let a = digest_with_prefix(1);
        let b = digest_with_prefix(2);

        for author in 1..=3 {
            state.handle(Event::OrderReceived { info: order(author, 1, a, 10) });
        }
        assert_eq!(state.status(&a), CommandStatus::Committed);

        for author in 1..=3 {
            state.handle(Event::OrderReceived { info: order(author, 2, b, 20) });
        }
        assert_eq!(state.status(&b), CommandStatus::Committed);
        assert_eq!(state.stats().last_seq_no, 2);
    }
}
