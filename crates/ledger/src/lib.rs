//! Command ledger for the Phalanx ordering engine.
//!
//! The ledger is the single authority on what is known about each command:
//! the partial orders collected for it, its lifecycle status, and the
//! dependency edges that decide when it may commit.
//!
//! - [`CommandLedger`]: entries, status sets, priority cascade, leaf set
//! - [`CommandInfo`]: one entry
//! - [`CondorcetScanner`]: cycle detection over lowest-dependency edges
//!
//! Dependency edges are digest keys into the ledger. Nothing holds a
//! reference to another entry, so commits can free entries without
//! invalidating the graph.

mod command_info;
mod leaves;
mod ledger;
mod queues;
mod scanner;

pub use command_info::{CommandInfo, CommandStatus};
pub use leaves::LeafSet;
pub use ledger::{CommandLedger, LedgerStats};
pub use queues::{FrontQueues, FrontSet};
pub use scanner::CondorcetScanner;
