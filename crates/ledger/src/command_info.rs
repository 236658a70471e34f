//! Per-command ledger entry.

use phalanx_types::{Digest, OrderInfo, ReplicaId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// Lifecycle status of a command in the ledger.
///
/// ```text
/// Unseen → CorrectSequenced → QuorumSequenced ⇄ Waiting
///                                    ↓
///                                Committed
/// ```
///
/// Status is monotonic apart from the Waiting ⇄ QuorumSequenced bounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    /// Fewer than `one_correct` orders collected (or never seen).
    Unseen,
    /// At least one correct replica has ordered the command (CSC).
    CorrectSequenced,
    /// A full quorum has ordered the command (QSC).
    QuorumSequenced,
    /// Quorum-sequenced, but other commands must commit first.
    Waiting,
    /// Terminal.
    Committed,
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandStatus::Unseen => "unseen",
            CommandStatus::CorrectSequenced => "csc",
            CommandStatus::QuorumSequenced => "qsc",
            CommandStatus::Waiting => "waiting",
            CommandStatus::Committed => "committed",
        };
        f.write_str(s)
    }
}

/// Ledger entry for one command digest.
///
/// Dependency edges (`pri_cmd`, `low_cmd`) are digest keys resolved through
/// the owning [`CommandLedger`](crate::CommandLedger), never references to
/// other entries.
#[derive(Debug, Clone)]
pub struct CommandInfo {
    digest: Digest,

    /// Collected partial orders, one per author.
    orders: BTreeMap<ReplicaId, OrderInfo>,

    /// Timestamps of the collected orders, sorted when the trusted
    /// timestamp is sealed.
    timestamps: Vec<i64>,

    /// Commands that must commit before this one.
    pri_cmd: BTreeSet<Digest>,

    /// Lowest known dependencies, used only for cycle detection.
    low_cmd: BTreeSet<Digest>,

    /// Priority check finished with no pending priorities.
    trusted: bool,

    /// Time the entry was created (latency accounting only).
    created_at: Duration,

    /// Byzantine-resistant timestamp, set once the quorum is sealed.
    trusted_ts: Option<i64>,
}

impl CommandInfo {
    pub fn new(digest: Digest, created_at: Duration) -> Self {
        Self {
            digest,
            orders: BTreeMap::new(),
            timestamps: Vec::new(),
            pri_cmd: BTreeSet::new(),
            low_cmd: BTreeSet::new(),
            trusted: false,
            created_at,
            trusted_ts: None,
        }
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    pub fn orders(&self) -> &BTreeMap<ReplicaId, OrderInfo> {
        &self.orders
    }

    pub fn order_from(&self, author: ReplicaId) -> Option<&OrderInfo> {
        self.orders.get(&author)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn pri_cmd(&self) -> &BTreeSet<Digest> {
        &self.pri_cmd
    }

    pub fn low_cmd(&self) -> &BTreeSet<Digest> {
        &self.low_cmd
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn created_at(&self) -> Duration {
        self.created_at
    }

    pub fn trusted_ts(&self) -> Option<i64> {
        self.trusted_ts
    }

    /// Record a partial order for this command.
    ///
    /// Returns `false` (and changes nothing) if the author already has an
    /// order recorded for this command.
    pub fn order_append(&mut self, info: OrderInfo) -> bool {
        debug_assert_eq!(info.command, self.digest);
        if self.orders.contains_key(&info.author) {
            return false;
        }
        self.orders.insert(info.author, info);
        self.timestamps.push(info.timestamp);
        true
    }

    /// Seal the trusted timestamp: the `(f+1)`-th smallest collected
    /// timestamp.
    ///
    /// At most `f` Byzantine replicas can pull the chosen value down, and
    /// the `f+1`-th value is always reported by a correct replica or bounded
    /// by one.
    pub fn seal_trusted_ts(&mut self, fault: usize) -> i64 {
        self.timestamps.sort_unstable();
        let index = fault.min(self.timestamps.len().saturating_sub(1));
        let ts = self.timestamps.get(index).copied().unwrap_or_default();
        self.trusted_ts = Some(ts);
        ts
    }

    /// Author → sequence pointers of the collected orders.
    pub fn sequence_pointers(&self) -> BTreeMap<ReplicaId, u64> {
        self.orders
            .iter()
            .map(|(author, info)| (*author, info.sequence))
            .collect()
    }

    /// Count the authors in `anchor` whose evidence places this command
    /// strictly before the anchor command.
    ///
    /// `anchor` maps each author of the anchor command to the sequence it
    /// assigned. An author that has not ordered this command has, under
    /// per-author FIFO delivery, not ordered it earlier, so it contributes
    /// nothing.
    pub fn votes_before(&self, anchor: &BTreeMap<ReplicaId, u64>) -> usize {
        anchor
            .iter()
            .filter(|(author, seq)| {
                self.orders
                    .get(author)
                    .is_some_and(|order| order.sequence < **seq)
            })
            .count()
    }

    pub(crate) fn set_trusted(&mut self) {
        self.trusted = true;
    }

    pub(crate) fn priori_record(&mut self, digest: Digest) {
        self.pri_cmd.insert(digest);
    }

    pub(crate) fn priori_commit(&mut self, digest: &Digest) {
        self.pri_cmd.remove(digest);
    }

    pub(crate) fn priori_finished(&self) -> bool {
        self.pri_cmd.is_empty()
    }

    pub(crate) fn insert_low(&mut self, digest: Digest) -> bool {
        self.low_cmd.insert(digest)
    }

    pub(crate) fn remove_low(&mut self, digest: &Digest) -> bool {
        self.low_cmd.remove(digest)
    }
}

impl fmt::Display for CommandInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let orders: Vec<String> = self
            .orders
            .values()
            .map(|o| format!("<{}, {}, {}>", o.author, o.sequence, o.timestamp))
            .collect();
        write!(
            f,
            "[CommandInfo: command {}, order-count {}, trusted-ts {:?}, orders {}]",
            self.digest,
            self.orders.len(),
            self.trusted_ts,
            orders.join(",")
        )
    }
}
