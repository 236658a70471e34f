//! Block assembly: attach command bodies and deliver in sequence order.

use crate::store::{CommandStore, ExecutionSink};
use phalanx_types::{Block, OrderedBlock, SeqNo};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Holds ordered blocks until their command body is available and every
/// earlier sequence number has been delivered.
///
/// The ordering loop never waits on the store: a block whose body is
/// missing stays pending and [`flush`](Self::flush) retries it.
pub struct BlockAssembler {
    store: Arc<dyn CommandStore>,
    sink: Arc<dyn ExecutionSink>,

    /// Sequence number the sink expects next.
    next_seq_no: SeqNo,

    pending: BTreeMap<SeqNo, OrderedBlock>,
}

impl std::fmt::Debug for BlockAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockAssembler")
            .field("next_seq_no", &self.next_seq_no)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl BlockAssembler {
    pub fn new(store: Arc<dyn CommandStore>, sink: Arc<dyn ExecutionSink>) -> Self {
        Self {
            store,
            sink,
            next_seq_no: SeqNo(1),
            pending: BTreeMap::new(),
        }
    }

    pub fn next_seq_no(&self) -> SeqNo {
        self.next_seq_no
    }

    /// Blocks accepted but not yet delivered.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Accept an ordered block and deliver whatever is ready.
    ///
    /// Duplicate or regressing sequence numbers indicate a bug upstream; the
    /// block is logged and dropped.
    pub fn enqueue(&mut self, block: OrderedBlock, seq_no: SeqNo) -> usize {
        if seq_no < self.next_seq_no || self.pending.contains_key(&seq_no) {
            error!(
                seq_no = seq_no.0,
                expected = self.next_seq_no.0,
                command = %block.digest,
                "Duplicate or regressing sequence number, block dropped"
            );
            return 0;
        }
        if seq_no > self.next_seq_no && !self.pending.contains_key(&self.next_seq_no) {
            warn!(
                seq_no = seq_no.0,
                expected = self.next_seq_no.0,
                "Out-of-order block buffered"
            );
        }
        self.pending.insert(seq_no, block);
        self.flush()
    }

    /// Deliver consecutive pending blocks whose command body is available.
    ///
    /// Returns the number of blocks delivered.
    pub fn flush(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(ordered) = self.pending.get(&self.next_seq_no) {
            let Some(command) = self.store.read_command(&ordered.digest) else {
                trace!(
                    seq_no = self.next_seq_no.0,
                    command = %ordered.digest,
                    "Command body not yet available"
                );
                break;
            };
            let seq_no = self.next_seq_no;
            let Some(ordered) = self.pending.remove(&seq_no) else {
                break;
            };

            debug!(seq_no = seq_no.0, command = %ordered.digest, "Delivering block");
            self.sink.command_execution(
                Block {
                    command,
                    trusted_ts: ordered.trusted_ts,
                    round: ordered.round,
                },
                seq_no,
            );
            self.next_seq_no = seq_no.next();
            delivered += 1;
        }
        delivered
    }
}
