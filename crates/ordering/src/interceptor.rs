//! Front-set interceptor.
//!
//! Candidates taken from the heads of the per-author queues are not known to
//! be safe. The interceptor closes the seed over every quorum-sequenced
//! command that evidence places before it, and refuses the whole batch if a
//! command that has not yet reached quorum should come first.

use phalanx_ledger::{CommandInfo, CommandLedger};
use phalanx_types::{Digest, ReplicaId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Return the closed, safe set for `seed`, or `None` if it cannot be proven
/// safe yet.
pub fn select_to_commit(ledger: &CommandLedger, seed: &[Digest]) -> Option<Vec<Digest>> {
    let one_correct = ledger.params().one_correct();
    let mut selected: BTreeSet<Digest> = seed.iter().copied().collect();
    let mut frontier: Vec<Digest> = seed.to_vec();

    while !frontier.is_empty() {
        let anchors: Vec<BTreeMap<ReplicaId, u64>> = frontier
            .iter()
            .filter_map(|d| ledger.command_info(d))
            .map(|info| info.sequence_pointers())
            .collect();
        let precedes = |info: &CommandInfo| {
            anchors
                .iter()
                .any(|anchor| info.votes_before(anchor) >= one_correct)
        };

        for c_info in ledger.read_csc_infos() {
            if precedes(c_info) {
                debug!(blocker = %c_info.digest(), "Front set rejected, correct-sequenced command precedes");
                return None;
            }
        }

        let mut additional = Vec::new();
        for q_info in ledger.read_qsc_infos() {
            if selected.contains(&q_info.digest()) {
                continue;
            }
            if precedes(q_info) {
                trace!(command = %q_info.digest(), "Front set extended");
                additional.push(q_info.digest());
            }
        }

        selected.extend(additional.iter().copied());
        frontier = additional;
    }

    Some(selected.into_iter().collect())
}
