//! Ordering engine configuration.

use serde::{Deserialize, Serialize};

/// How the committable set is chosen each round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Derive the committable set from the natural-order graph: every
    /// quorum-sequenced command that passes priority resolution.
    #[default]
    NaturalOrder,

    /// Take candidates from the heads of the per-author queues and prove
    /// them safe through the front-set interceptor.
    AnchorFront,
}

/// Configuration for the ordering state machine.
#[derive(Debug, Clone, Default)]
pub struct OrderingConfig {
    pub strategy: SelectionStrategy,
}

impl OrderingConfig {
    pub fn with_strategy(strategy: SelectionStrategy) -> Self {
        Self { strategy }
    }
}
