//! Command ledger: status tracking and dependency bookkeeping.

use crate::command_info::{CommandInfo, CommandStatus};
use crate::leaves::LeafSet;
use crate::queues::{FrontQueues, FrontSet};
use phalanx_types::{Digest, OrderInfo, QuorumParams};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, trace};

/// Ledger statistics for monitoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// Entries currently tracked (every non-committed digest seen).
    pub tracked: usize,
    /// Correct-sequenced commands.
    pub correct: usize,
    /// Quorum-sequenced commands ready for evaluation.
    pub quorum: usize,
    /// Quorum-sequenced commands blocked on priorities.
    pub waiting: usize,
    /// Commands committed since start.
    pub committed: usize,
    /// Commands currently marked as leaves.
    pub leaves: usize,
}

/// Single authority for command state.
///
/// Owned exclusively by the ordering state machine; all reads and writes
/// happen on one logical thread of control.
#[derive(Debug)]
pub struct CommandLedger {
    params: QuorumParams,

    /// Every non-committed digest seen so far.
    commands: HashMap<Digest, CommandInfo>,

    correct: BTreeSet<Digest>,
    quorum: BTreeSet<Digest>,
    waiting: BTreeSet<Digest>,

    /// Committed digests, kept for the life of the process so late evidence
    /// never re-admits a committed command.
    committed: HashSet<Digest>,

    /// priority → waiting commands that list it in `pri_cmd`.
    dependents: HashMap<Digest, BTreeSet<Digest>>,

    leaves: LeafSet,
    queues: FrontQueues,

    now: Duration,
}

impl CommandLedger {
    pub fn new(params: QuorumParams) -> Self {
        Self {
            params,
            commands: HashMap::new(),
            correct: BTreeSet::new(),
            quorum: BTreeSet::new(),
            waiting: BTreeSet::new(),
            committed: HashSet::new(),
            dependents: HashMap::new(),
            leaves: LeafSet::new(),
            queues: FrontQueues::new(&params),
            now: Duration::ZERO,
        }
    }

    pub fn params(&self) -> &QuorumParams {
        &self.params
    }

    pub fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Entries
    // ═══════════════════════════════════════════════════════════════════════

    /// Return the entry for `digest`, creating an empty one if absent.
    ///
    /// Callers must not read entries for committed digests.
    pub fn read_command_info(&mut self, digest: Digest) -> &mut CommandInfo {
        debug_assert!(
            !self.committed.contains(&digest),
            "committed command {digest} re-entered the ledger"
        );
        let now = self.now;
        self.commands.entry(digest).or_insert_with(|| {
            trace!(command = %digest, "Tracking new command");
            CommandInfo::new(digest, now)
        })
    }

    pub fn command_info(&self, digest: &Digest) -> Option<&CommandInfo> {
        self.commands.get(digest)
    }

    pub fn is_committed(&self, digest: &Digest) -> bool {
        self.committed.contains(digest)
    }

    pub fn status(&self, digest: &Digest) -> CommandStatus {
        if self.committed.contains(digest) {
            CommandStatus::Committed
        } else if self.waiting.contains(digest) {
            CommandStatus::Waiting
        } else if self.quorum.contains(digest) {
            CommandStatus::QuorumSequenced
        } else if self.correct.contains(digest) {
            CommandStatus::CorrectSequenced
        } else {
            CommandStatus::Unseen
        }
    }

    /// Snapshot of the correct-sequenced digests, ascending.
    pub fn correct_digests(&self) -> Vec<Digest> {
        self.correct.iter().copied().collect()
    }

    /// Snapshot of the quorum-sequenced (non-waiting) digests, ascending.
    pub fn quorum_digests(&self) -> Vec<Digest> {
        self.quorum.iter().copied().collect()
    }

    /// Snapshot of the waiting digests, ascending.
    pub fn waiting_digests(&self) -> Vec<Digest> {
        self.waiting.iter().copied().collect()
    }

    pub fn read_csc_infos(&self) -> Vec<&CommandInfo> {
        self.infos_of(&self.correct)
    }

    pub fn read_qsc_infos(&self) -> Vec<&CommandInfo> {
        self.infos_of(&self.quorum)
    }

    pub fn read_waiting_infos(&self) -> Vec<&CommandInfo> {
        self.infos_of(&self.waiting)
    }

    fn infos_of(&self, set: &BTreeSet<Digest>) -> Vec<&CommandInfo> {
        set.iter().filter_map(|d| self.commands.get(d)).collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Status transitions
    // ═══════════════════════════════════════════════════════════════════════

    /// Unseen → CorrectSequenced.
    pub fn correct_status(&mut self, digest: Digest) {
        if self.correct.insert(digest) {
            debug!(command = %digest, "Command correct-sequenced");
        }
    }

    /// CorrectSequenced → QuorumSequenced.
    pub fn quorum_status(&mut self, digest: Digest) {
        debug_assert!(self
            .commands
            .get(&digest)
            .is_some_and(|info| info.order_count() <= self.params.quorum()));
        self.correct.remove(&digest);
        if self.quorum.insert(digest) {
            debug!(command = %digest, "Command quorum-sequenced");
        }
    }

    /// Mark a quorum-sequenced command as having no pending priorities.
    pub fn mark_trusted(&mut self, digest: &Digest) {
        if let Some(info) = self.commands.get_mut(digest) {
            info.set_trusted();
        }
    }

    /// Move `digest` to Waiting and record `priorities` as commands that
    /// must commit first.
    ///
    /// The priorities' own lowest dependencies are folded into `digest`'s
    /// `low_cmd` so cycle detection can see through them.
    pub fn record_priority(&mut self, digest: Digest, priorities: &[Digest]) {
        if priorities.is_empty() {
            return;
        }
        self.quorum.remove(&digest);
        self.waiting.insert(digest);

        for priority in priorities {
            if *priority == digest || self.committed.contains(priority) {
                continue;
            }
            let inherited: Vec<Digest> = self
                .commands
                .get(priority)
                .map(|p| p.low_cmd().iter().copied().collect())
                .unwrap_or_default();

            if let Some(info) = self.commands.get_mut(&digest) {
                info.priori_record(*priority);
            }
            self.dependents.entry(*priority).or_default().insert(digest);

            for low in inherited {
                if low != digest {
                    self.append_low(digest, low);
                }
            }
            debug!(command = %digest, priority = %priority, "Priority edge recorded");
        }
    }

    /// Whether `from` reaches `target` through `pri_cmd` edges.
    pub fn depends_on(&self, from: &Digest, target: &Digest) -> bool {
        let mut stack = vec![*from];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == *target {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(info) = self.commands.get(&current) {
                stack.extend(info.pri_cmd().iter().copied());
            }
        }
        false
    }

    /// Mark `digest` committed and cascade the release to its dependents.
    ///
    /// Returns the waiting commands that had their last priority removed and
    /// were moved back to QuorumSequenced, ascending.
    pub fn committed_status(&mut self, digest: Digest) -> Vec<Digest> {
        if !self.committed.insert(digest) {
            return Vec::new();
        }
        self.correct.remove(&digest);
        self.quorum.remove(&digest);
        self.waiting.remove(&digest);
        let info = self.commands.remove(&digest);

        if let Some(info) = &info {
            for priority in info.pri_cmd() {
                if let Some(waiters) = self.dependents.get_mut(priority) {
                    waiters.remove(&digest);
                }
            }
            self.queues.remove(&digest, info.orders().keys().copied());
        }

        let mut promoted = Vec::new();
        for waiter in self.dependents.remove(&digest).unwrap_or_default() {
            let Some(waiter_info) = self.commands.get_mut(&waiter) else {
                continue;
            };
            waiter_info.priori_commit(&digest);
            if waiter_info.priori_finished() && self.waiting.remove(&waiter) {
                self.quorum.insert(waiter);
                debug!(command = %waiter, released_by = %digest, "Waiting command released");
                promoted.push(waiter);
            }
        }

        for owner in self.leaves.release(&digest) {
            if let Some(owner_info) = self.commands.get_mut(&owner) {
                owner_info.remove_low(&digest);
            }
        }

        trace!(command = %digest, promoted = promoted.len(), "Command committed");
        promoted
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Leaves and lowest dependencies
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_leaf(&mut self, digest: Digest) {
        self.leaves.add(digest);
    }

    pub fn cut_leaf(&mut self, digest: &Digest) {
        self.leaves.cut(digest);
    }

    pub fn is_leaf(&self, digest: &Digest) -> bool {
        self.leaves.contains(digest)
    }

    pub fn trace_leaf(&self, owner: &Digest, low: &Digest) -> bool {
        self.leaves.trace_leaf(owner, low)
    }

    pub fn leaf_group(&self, low: &Digest) -> Option<&BTreeSet<Digest>> {
        self.leaves.leaf_group(low)
    }

    /// Snapshot of `digest`'s lowest dependencies.
    pub fn low_of(&self, digest: &Digest) -> Vec<Digest> {
        self.commands
            .get(digest)
            .map(|info| info.low_cmd().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Add `low` to `owner`'s lowest dependencies.
    pub fn append_low(&mut self, owner: Digest, low: Digest) {
        debug_assert_ne!(owner, low, "command cannot be its own lowest dependency");
        self.link_low(owner, low);
    }

    /// Replace `parent` in `owner`'s lowest dependencies with `parent`'s own
    /// lowest dependencies.
    ///
    /// Unlike [`append_low`](Self::append_low) this may make `owner` reach
    /// itself; only the cycle scanner calls it, and it treats that as a
    /// detected cycle.
    pub(crate) fn transitive_low(&mut self, owner: Digest, parent: &Digest) {
        let inherited = self.low_of(parent);
        if let Some(info) = self.commands.get_mut(&owner) {
            info.remove_low(parent);
        }
        for low in inherited {
            self.link_low(owner, low);
        }
    }

    fn link_low(&mut self, owner: Digest, low: Digest) {
        if self.committed.contains(&low) {
            return;
        }
        if let Some(info) = self.commands.get_mut(&owner) {
            if info.insert_low(low) {
                self.leaves.link(owner, low);
                trace!(owner = %owner, low = %low, "Lowest dependency linked");
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Front queues
    // ═══════════════════════════════════════════════════════════════════════

    /// Append an accepted order to its author's FIFO queue.
    pub fn push_order(&mut self, info: OrderInfo) {
        self.queues.push_back(info);
    }

    /// Inspect the heads of the per-author queues.
    ///
    /// Returns `None` while fewer than a quorum of authors have pending
    /// orders. Otherwise, a digest heading at least a quorum of queues is
    /// returned alone and marked safe; failing that, the digests heading at
    /// least `one_correct` queues, or every head if there are none.
    pub fn front_commands(&mut self) -> Option<FrontSet> {
        let committed = &self.committed;
        let fronts = self.queues.fronts(|d| committed.contains(d));
        if fronts.len() < self.params.quorum() {
            return None;
        }

        let mut tally: BTreeMap<Digest, usize> = BTreeMap::new();
        for digest in fronts.values() {
            *tally.entry(*digest).or_default() += 1;
        }

        if let Some((digest, _)) = tally.iter().find(|(_, n)| **n >= self.params.quorum()) {
            return Some(FrontSet {
                digests: vec![*digest],
                safe: true,
            });
        }

        let supported: Vec<Digest> = tally
            .iter()
            .filter(|(_, n)| **n >= self.params.one_correct())
            .map(|(d, _)| *d)
            .collect();
        let digests = if supported.is_empty() {
            tally.into_keys().collect()
        } else {
            supported
        };
        Some(FrontSet {
            digests,
            safe: false,
        })
    }

    /// Quorum-sequenced, non-waiting command with the lowest
    /// `(trusted_ts, digest)`.
    pub fn pick_quorum_info(&self) -> Option<Digest> {
        self.quorum
            .iter()
            .filter_map(|d| self.commands.get(d))
            .min_by_key(|info| (info.trusted_ts().unwrap_or(i64::MAX), info.digest()))
            .map(CommandInfo::digest)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Statistics
    // ═══════════════════════════════════════════════════════════════════════

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            tracked: self.commands.len(),
            correct: self.correct.len(),
            quorum: self.quorum.len(),
            waiting: self.waiting.len(),
            committed: self.committed.len(),
            leaves: self.leaves.len(),
        }
    }

    pub fn pending_orders(&self) -> usize {
        self.queues.pending()
    }
}
