//! Production runner implementation.

use crate::assembler::BlockAssembler;
use crate::config::{ConfigError, NodeConfig};
use crate::store::{CommandStore, ExecutionSink};
use phalanx_core::{Action, Event, StateMachine};
use phalanx_ordering::{OrderingConfig, OrderingError, OrderingState, OrderingStats};
use phalanx_types::{QuorumParams, ReplicaId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{span, Level};

/// Errors from the production runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Event channel closed")]
    ChannelClosed,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("channel_capacity must be greater than zero")]
    ZeroChannelCapacity,
    #[error("Ordering error: {0}")]
    Ordering(#[from] OrderingError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Handle for shutting down a running [`OrderingRunner`].
///
/// When dropped, signals the runner to exit gracefully.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl ShutdownHandle {
    /// Trigger shutdown (consumes the handle).
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Builder for constructing an [`OrderingRunner`].
///
/// Required fields:
/// - `params` - Quorum parameters for the cluster
/// - `replica_id` - This replica's id
/// - `command_store` - Source of raw command bodies
/// - `sink` - Receiver of ordered blocks
///
/// Optional fields:
/// - `ordering_config` - Engine configuration (defaults to natural order)
/// - `channel_capacity` - Evidence channel capacity (defaults to 10,000)
/// - `command_poll_interval` - Re-poll period for missing bodies (defaults to 50ms)
///
/// # Example
///
/// ```no_run
/// use phalanx_production::{MemoryCommandStore, OrderingRunner, RecordingSink};
/// use phalanx_types::{QuorumParams, ReplicaId};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut runner = OrderingRunner::builder()
///     .params(QuorumParams::new(4)?)
///     .replica_id(ReplicaId(1))
///     .command_store(Arc::new(MemoryCommandStore::new()))
///     .sink(Arc::new(RecordingSink::new()))
///     .build()?;
///
/// let evidence = runner.evidence_sender();
/// let shutdown = runner.shutdown_handle();
/// tokio::spawn(runner.run());
/// # drop((evidence, shutdown));
/// # Ok(())
/// # }
/// ```
pub struct OrderingRunnerBuilder {
    params: Option<QuorumParams>,
    replica_id: Option<ReplicaId>,
    ordering_config: OrderingConfig,
    command_store: Option<Arc<dyn CommandStore>>,
    sink: Option<Arc<dyn ExecutionSink>>,
    channel_capacity: usize,
    command_poll_interval: Duration,
}

impl Default for OrderingRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderingRunnerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            params: None,
            replica_id: None,
            ordering_config: OrderingConfig::default(),
            command_store: None,
            sink: None,
            channel_capacity: 10_000,
            command_poll_interval: Duration::from_millis(50),
        }
    }

    /// Take identity, engine and runner settings from a loaded configuration.
    pub fn node_config(self, config: &NodeConfig) -> Result<Self, RunnerError> {
        Ok(self
            .params(config.quorum_params()?)
            .replica_id(config.replica_id())
            .ordering_config(config.ordering_config())
            .channel_capacity(config.runner.channel_capacity)
            .command_poll_interval(config.command_poll_interval()))
    }

    pub fn params(mut self, params: QuorumParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn replica_id(mut self, replica_id: ReplicaId) -> Self {
        self.replica_id = Some(replica_id);
        self
    }

    pub fn ordering_config(mut self, config: OrderingConfig) -> Self {
        self.ordering_config = config;
        self
    }

    pub fn command_store(mut self, store: Arc<dyn CommandStore>) -> Self {
        self.command_store = Some(store);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ExecutionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the evidence channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn command_poll_interval(mut self, interval: Duration) -> Self {
        self.command_poll_interval = interval;
        self
    }

    /// Build the runner.
    pub fn build(self) -> Result<OrderingRunner, RunnerError> {
        let params = self.params.ok_or(RunnerError::MissingField("params"))?;
        let replica_id = self
            .replica_id
            .ok_or(RunnerError::MissingField("replica_id"))?;
        let store = self
            .command_store
            .ok_or(RunnerError::MissingField("command_store"))?;
        let sink = self.sink.ok_or(RunnerError::MissingField("sink"))?;
        if self.channel_capacity == 0 {
            return Err(RunnerError::ZeroChannelCapacity);
        }

        let state = OrderingState::with_config(params, replica_id, self.ordering_config)?;
        let (event_tx, event_rx) = mpsc::channel(self.channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        Ok(OrderingRunner {
            state,
            assembler: BlockAssembler::new(store, sink),
            event_tx,
            event_rx,
            shutdown_tx: Some(shutdown_tx),
            shutdown_rx,
            command_poll_interval: self.command_poll_interval,
            start_time: Instant::now(),
        })
    }
}

/// Async wrapper around the ordering state machine.
///
/// A single task owns the [`OrderingState`] and receives evidence through a
/// bounded channel, so ledger mutations never interleave. Ordered blocks go
/// through a [`BlockAssembler`], which attaches command bodies without ever
/// blocking the loop.
pub struct OrderingRunner {
    state: OrderingState,
    assembler: BlockAssembler,
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_rx: oneshot::Receiver<()>,
    command_poll_interval: Duration,
    start_time: Instant,
}

impl std::fmt::Debug for OrderingRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderingRunner")
            .field("state", &self.state)
            .field("assembler", &self.assembler)
            .finish()
    }
}

impl OrderingRunner {
    /// Create a new builder.
    pub fn builder() -> OrderingRunnerBuilder {
        OrderingRunnerBuilder::new()
    }

    /// Get a sender for delivering verified evidence.
    pub fn evidence_sender(&self) -> mpsc::Sender<Event> {
        self.event_tx.clone()
    }

    /// Take the shutdown handle. Returns `None` if already taken.
    pub fn shutdown_handle(&mut self) -> Option<ShutdownHandle> {
        self.shutdown_tx
            .take()
            .map(|tx| ShutdownHandle { tx: Some(tx) })
    }

    pub fn replica_id(&self) -> ReplicaId {
        self.state.replica_id()
    }

    /// Run the event loop until shutdown.
    ///
    /// Priority order:
    /// 1. Shutdown
    /// 2. Evidence
    /// 3. Poll tick (re-try pending command bodies)
    ///
    /// Returns the final ordering statistics.
    pub async fn run(mut self) -> Result<OrderingStats, RunnerError> {
        tracing::info!(
            replica = self.state.replica_id().0,
            strategy = ?self.state.config().strategy,
            "Starting ordering runner"
        );

        let mut poll_tick = tokio::time::interval(self.command_poll_interval);
        poll_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    tracing::info!("Shutdown signal received");
                    break;
                }

                event = self.event_rx.recv() => {
                    // The runner holds a sender, so the channel only closes
                    // if that invariant is broken.
                    let Some(event) = event else {
                        return Err(RunnerError::ChannelClosed);
                    };
                    let event_type = event.type_name();
                    let event_span = span!(
                        Level::DEBUG,
                        "handle_event",
                        event.type = %event_type,
                        replica = self.state.replica_id().0,
                    );
                    let _event_guard = event_span.enter();

                    self.state.set_time(self.start_time.elapsed());
                    let actions = self.state.handle(event);
                    for action in actions {
                        self.process_action(action);
                    }
                }

                _ = poll_tick.tick() => {
                    if self.assembler.pending() > 0 {
                        self.assembler.flush();
                    }
                }
            }
        }

        let stats = self.state.stats();
        tracing::info!(
            committed = stats.committed,
            last_seq_no = stats.last_seq_no,
            pending_blocks = self.assembler.pending(),
            "Ordering runner stopped"
        );
        Ok(stats)
    }

    fn process_action(&mut self, action: Action) {
        match action {
            Action::CommitBlock { block, seq_no } => {
                self.assembler.enqueue(block, seq_no);
            }
        }
    }
}
