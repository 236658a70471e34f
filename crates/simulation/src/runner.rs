//! Deterministic simulation runner.
//!
//! Every replica doubles as a client gateway: it proposes commands, hears
//! every command over the simulated network, and broadcasts its local
//! arrival order as [`OrderInfo`](phalanx_types::OrderInfo) evidence. Each
//! replica runs its own [`OrderingState`] and the runner records what it
//! commits.

use crate::network::{NetworkConfig, SimulatedNetwork};
use phalanx_core::{Action, Event, StateMachine};
use phalanx_ordering::{OrderingConfig, OrderingError, OrderingState};
use phalanx_types::{
    sequence_partial_order, Command, Digest, OrderedBlock, ParamsError, QuorumParams, ReplicaId,
    SeqNo,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid replica parameters: {0}")]
    Params(#[from] ParamsError),

    #[error("Ordering error: {0}")]
    Ordering(#[from] OrderingError),

    #[error("{byzantine} byzantine replicas exceed the fault bound {fault}")]
    TooManyByzantine { byzantine: usize, fault: usize },

    #[error("byzantine replica {0} is not part of the cluster")]
    UnknownByzantine(ReplicaId),
}

/// Simulation setup.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub replicas: usize,
    /// Commands proposed by each replica.
    pub commands_per_replica: usize,
    /// Gap between consecutive command proposals across the whole cluster.
    pub command_interval: Duration,
    /// Replicas that report their arrival order reversed and with zero
    /// timestamps.
    pub byzantine: Vec<ReplicaId>,
    pub ordering: OrderingConfig,
    pub network: NetworkConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            replicas: 4,
            commands_per_replica: 5,
            command_interval: Duration::from_millis(10),
            byzantine: Vec::new(),
            ordering: OrderingConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

/// Statistics collected during a simulation run.
#[derive(Debug, Default, Clone)]
pub struct SimulationStats {
    pub events_processed: u64,
    pub orders_sent: u64,
    pub blocks_committed: u64,
    /// Sequence numbers that were not the successor of the previous one.
    pub sequence_gaps: u64,
}

/// Deterministic simulation runner.
///
/// Processes events in `(time, insertion)` order. Given the same seed,
/// produces identical results every run.
pub struct SimulationRunner {
    params: QuorumParams,
    nodes: Vec<OrderingState>,
    commands: Vec<Command>,
    /// Proposal time of each command, by digest.
    created_at: HashMap<Digest, Duration>,
    committed: Vec<Vec<(SeqNo, OrderedBlock)>>,
    /// `(priority, dependent)` edges each replica has recorded.
    priority_edges: Vec<BTreeSet<(Digest, Digest)>>,
    queue: BTreeMap<(Duration, u64), (ReplicaId, Event)>,
    sequence: u64,
    now: Duration,
    stats: SimulationStats,
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("replicas", &self.nodes.len())
            .field("commands", &self.commands.len())
            .field("queued", &self.queue.len())
            .field("now", &self.now)
            .finish()
    }
}

impl SimulationRunner {
    pub fn new(config: SimulationConfig, seed: u64) -> Result<Self, SimulationError> {
        let params = QuorumParams::new(config.replicas)?;
        if config.byzantine.len() > params.fault() {
            return Err(SimulationError::TooManyByzantine {
                byzantine: config.byzantine.len(),
                fault: params.fault(),
            });
        }
        if let Some(unknown) = config.byzantine.iter().find(|r| !params.contains(**r)) {
            return Err(SimulationError::UnknownByzantine(*unknown));
        }

        let nodes = params
            .replicas()
            .map(|replica| OrderingState::with_config(params, replica, config.ordering.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut network = SimulatedNetwork::new(config.network.clone());

        let mut commands = Vec::new();
        let mut created_at = HashMap::new();
        for round in 0..config.commands_per_replica {
            for author in params.replicas() {
                let slot = (round * params.n()) as u32 + (author.0 as u32 - 1);
                let command = Command::new(
                    author,
                    round as u64 + 1,
                    vec![format!("{author}:{round}").into_bytes()],
                );
                created_at.insert(command.digest, config.command_interval * slot);
                commands.push(command);
            }
        }

        let mut runner = Self {
            params,
            nodes,
            commands,
            created_at,
            committed: vec![Vec::new(); params.n()],
            priority_edges: vec![BTreeSet::new(); params.n()],
            queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            stats: SimulationStats::default(),
        };

        for author in params.replicas() {
            let byzantine = config.byzantine.contains(&author);
            let mut arrivals: Vec<(Duration, Digest)> = runner
                .commands
                .iter()
                .map(|c| (runner.created_at[&c.digest] + network.sample_latency(&mut rng), c.digest))
                .collect();
            arrivals.sort();

            let last_arrival = arrivals.last().map(|(t, _)| *t).unwrap_or_default();
            if byzantine {
                arrivals.reverse();
            }

            let partial: Vec<(Digest, i64)> = arrivals
                .iter()
                .map(|(arrival, digest)| {
                    let timestamp = if byzantine { 0 } else { arrival.as_millis() as i64 };
                    (*digest, timestamp)
                })
                .collect();
            let (infos, _) = sequence_partial_order(author, 0, &partial);

            for ((arrival, _), info) in arrivals.iter().zip(infos) {
                let send_time = if byzantine { last_arrival } else { *arrival };
                for recipient in params.replicas() {
                    let at = network.schedule(author, recipient, send_time, &mut rng);
                    runner.schedule_event(recipient, at, Event::OrderReceived { info });
                }
                runner.stats.orders_sent += 1;
            }
        }

        info!(
            replicas = params.n(),
            commands = runner.commands.len(),
            byzantine = config.byzantine.len(),
            strategy = ?config.ordering.strategy,
            seed,
            "Simulation initialized"
        );
        Ok(runner)
    }

    fn schedule_event(&mut self, replica: ReplicaId, at: Duration, event: Event) {
        self.sequence += 1;
        self.queue.insert((at, self.sequence), (replica, event));
    }

    fn index(replica: ReplicaId) -> usize {
        (replica.0 - 1) as usize
    }

    /// Process events up to and including `end`.
    pub fn run_until(&mut self, end: Duration) {
        while let Some((&(at, _), _)) = self.queue.first_key_value() {
            if at > end {
                break;
            }
            let Some(((at, _), (replica, event))) = self.queue.pop_first() else {
                break;
            };
            self.now = at;
            trace!(time = ?at, replica = replica.0, event = event.type_name(), "Delivering event");

            let index = Self::index(replica);
            let node = &mut self.nodes[index];
            node.set_time(at);
            let actions = node.handle(event);
            self.stats.events_processed += 1;

            let edges = &mut self.priority_edges[index];
            for waiting in node.ledger().read_waiting_infos() {
                for priority in waiting.pri_cmd() {
                    edges.insert((*priority, waiting.digest()));
                }
            }

            for action in actions {
                self.process_action(replica, action);
            }
        }
        if self.now < end && end != Duration::MAX {
            self.now = end;
        }
    }

    /// Process every queued event.
    pub fn run_to_completion(&mut self) {
        self.run_until(Duration::MAX);
        info!(
            events = self.stats.events_processed,
            committed = self.stats.blocks_committed,
            time = ?self.now,
            "Simulation finished"
        );
    }

    fn process_action(&mut self, replica: ReplicaId, action: Action) {
        match action {
            Action::CommitBlock { block, seq_no } => {
                let log = &mut self.committed[Self::index(replica)];
                let expected = log.last().map(|(s, _)| s.next()).unwrap_or(SeqNo(1));
                if seq_no != expected {
                    warn!(
                        replica = replica.0,
                        seq_no = seq_no.0,
                        expected = expected.0,
                        "Sequence gap in committed blocks"
                    );
                    self.stats.sequence_gaps += 1;
                }
                debug!(replica = replica.0, seq_no = seq_no.0, command = %block.digest, "Committed");
                log.push((seq_no, block));
                self.stats.blocks_committed += 1;
            }
        }
    }

    pub fn params(&self) -> QuorumParams {
        self.params
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// All proposed commands, in proposal order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn created_at(&self, digest: &Digest) -> Option<Duration> {
        self.created_at.get(digest).copied()
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn node(&self, replica: ReplicaId) -> Option<&OrderingState> {
        if !self.params.contains(replica) {
            return None;
        }
        self.nodes.get(Self::index(replica))
    }

    /// Every `(priority, dependent)` edge `replica` held at the end of some
    /// event.
    pub fn priority_edges(&self, replica: ReplicaId) -> Option<&BTreeSet<(Digest, Digest)>> {
        if !self.params.contains(replica) {
            return None;
        }
        self.priority_edges.get(Self::index(replica))
    }

    /// Blocks committed by `replica`, in commit order.
    pub fn committed(&self, replica: ReplicaId) -> &[(SeqNo, OrderedBlock)] {
        if !self.params.contains(replica) {
            return &[];
        }
        &self.committed[Self::index(replica)]
    }
}
