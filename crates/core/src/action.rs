//! Action types for the deterministic state machine.

use phalanx_types::{OrderedBlock, SeqNo};

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes actions; the state machine never performs I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Hand an ordered block to the execution service.
    ///
    /// The runner attaches the raw command body (polling the command store
    /// until it is available) and delivers blocks strictly in `seq_no` order.
    CommitBlock { block: OrderedBlock, seq_no: SeqNo },
}

impl Action {
    /// Get the action type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::CommitBlock { .. } => "CommitBlock",
        }
    }
}
