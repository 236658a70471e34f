//! Seams to the raw command store and the execution service.

use parking_lot::{Mutex, RwLock};
use phalanx_types::{Block, Command, Digest, SeqNo};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Source of raw command bodies.
///
/// Lookups must not block: `None` means the body has not arrived yet and
/// the caller will ask again later.
pub trait CommandStore: Send + Sync {
    fn read_command(&self, digest: &Digest) -> Option<Command>;
}

/// Receiver of ordered blocks.
///
/// Called exactly once per committed command, with strictly increasing
/// sequence numbers starting at 1.
pub trait ExecutionSink: Send + Sync {
    fn command_execution(&self, block: Block, seq_no: SeqNo);
}

/// In-memory command store.
#[derive(Debug, Default)]
pub struct MemoryCommandStore {
    commands: RwLock<HashMap<Digest, Command>>,
}

impl MemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, command: Command) {
        self.commands.write().insert(command.digest, command);
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }
}

impl CommandStore for MemoryCommandStore {
    fn read_command(&self, digest: &Digest) -> Option<Command> {
        self.commands.read().get(digest).cloned()
    }
}

/// Sink that keeps every delivered block.
#[derive(Debug, Default)]
pub struct RecordingSink {
    blocks: Mutex<Vec<(SeqNo, Block)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered blocks in delivery order.
    pub fn blocks(&self) -> Vec<(SeqNo, Block)> {
        self.blocks.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }
}

impl ExecutionSink for RecordingSink {
    fn command_execution(&self, block: Block, seq_no: SeqNo) {
        self.blocks.lock().push((seq_no, block));
    }
}

/// Sink that forwards blocks into a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(SeqNo, Block)>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(SeqNo, Block)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ExecutionSink for ChannelSink {
    fn command_execution(&self, block: Block, seq_no: SeqNo) {
        if self.tx.send((seq_no, block)).is_err() {
            tracing::warn!(seq_no = seq_no.0, "Execution receiver dropped, block discarded");
        }
    }
}
