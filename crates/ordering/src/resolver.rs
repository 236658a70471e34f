//! Priority resolution for quorum-sequenced commands.
//!
//! A quorum-sequenced command may be committed only once no other pending
//! command must precede it. "Must precede" is decided from evidence: if at
//! least `one_correct` of the command's authors placed another command
//! earlier in their own sequence, a correct replica did so, and that order is
//! binding.

use phalanx_ledger::CommandLedger;
use phalanx_types::Digest;
use tracing::{debug, warn};

/// Evaluate one quorum-sequenced command.
///
/// Returns `true` when the command has no outstanding priorities and is
/// marked trusted. Otherwise the discovered priorities are recorded, the
/// command moves to Waiting, and `false` is returned.
pub fn resolve_priorities(ledger: &mut CommandLedger, digest: Digest) -> bool {
    let Some(q_info) = ledger.command_info(&digest) else {
        return false;
    };
    if q_info.is_trusted() {
        return true;
    }
    let one_correct = ledger.params().one_correct();
    let pointers = q_info.sequence_pointers();
    let recorded = q_info.pri_cmd().clone();

    let mut priorities: Vec<Digest> = Vec::new();

    // Waiting commands, and quorum-sequenced peers not yet resolved, that
    // must precede. Peers count the same as waiting commands so the outcome
    // does not depend on which of two quorum commands is evaluated first.
    let waiting: Vec<Digest> = ledger
        .read_waiting_infos()
        .into_iter()
        .chain(ledger.read_qsc_infos().into_iter().filter(|p| !p.is_trusted()))
        .filter(|w| w.digest() != digest && !recorded.contains(&w.digest()))
        .filter(|w| w.votes_before(&pointers) >= one_correct)
        .map(|w| w.digest())
        .collect();
    for w in waiting {
        if ledger.depends_on(&w, &digest) {
            warn!(command = %digest, priority = %w, "Priority would close a cycle, edge rejected");
            continue;
        }
        debug!(command = %digest, priority = %w, "Quorum command must precede");
        priorities.push(w);
    }

    // Correct-sequenced commands that must precede.
    let correct: Vec<Digest> = ledger
        .read_csc_infos()
        .into_iter()
        .filter(|c| c.digest() != digest && !recorded.contains(&c.digest()))
        .filter(|c| c.votes_before(&pointers) >= one_correct)
        .map(|c| c.digest())
        .collect();
    for c in correct {
        if ledger.is_leaf(&digest) && ledger.has_cycle(digest) {
            warn!(command = %digest, priority = %c, "Condorcet cycle detected, edge rejected");
            continue;
        }
        debug!(command = %digest, priority = %c, "Correct-sequenced command must precede");
        priorities.push(c);
        ledger.add_leaf(c);
        ledger.append_low(digest, c);
    }

    ledger.cut_leaf(&digest);

    if priorities.is_empty() {
        ledger.mark_trusted(&digest);
        debug!(command = %digest, "Command trusted");
        true
    } else {
        ledger.record_priority(digest, &priorities);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::collect_evidence;
    use phalanx_ledger::CommandStatus;
    use phalanx_types::test_utils::{digest_with_prefix, order};
    use phalanx_types::QuorumParams;
    use tracing_test::traced_test;

    fn ledger() -> CommandLedger {
        CommandLedger::new(QuorumParams::new(4).unwrap())
    }

    #[traced_test]
    #[test]
    fn test_no_competitors_trusted() {
        let mut ledger = ledger();
        let q = digest_with_prefix(1);
        for a in 1..=3 {
            collect_evidence(&mut ledger, order(a, 1, q, 10));
        }
        assert!(resolve_priorities(&mut ledger, q));
        assert!(ledger.command_info(&q).unwrap().is_trusted());
        assert_eq!(ledger.status(&q), CommandStatus::QuorumSequenced);
    }

    #[traced_test]
    #[test]
    fn test_correct_sequenced_predecessor_blocks() {
        let mut ledger = ledger();
        let c = digest_with_prefix(1);
        let q = digest_with_prefix(2);

        // Authors 1 and 2 order c before q; author 3 has only seen q.
        collect_evidence(&mut ledger, order(1, 1, c, 5));
        collect_evidence(&mut ledger, order(2, 1, c, 5));
        collect_evidence(&mut ledger, order(1, 2, q, 10));
        collect_evidence(&mut ledger, order(2, 2, q, 10));
        collect_evidence(&mut ledger, order(3, 1, q, 10));

        assert_eq!(ledger.status(&c), CommandStatus::CorrectSequenced);
        assert!(!resolve_priorities(&mut ledger, q));
        assert_eq!(ledger.status(&q), CommandStatus::Waiting);
        assert!(ledger.command_info(&q).unwrap().pri_cmd().contains(&c));
        assert!(ledger.is_leaf(&c));
        assert!(!ledger.is_leaf(&q));
        assert_eq!(ledger.low_of(&q), vec![c]);
    }

    #[test]
    fn test_single_vote_does_not_block() {
        let mut ledger = ledger();
        let c = digest_with_prefix(1);
        let q = digest_with_prefix(2);

        collect_evidence(&mut ledger, order(1, 1, c, 5));
        collect_evidence(&mut ledger, order(2, 2, c, 5));
        collect_evidence(&mut ledger, order(1, 2, q, 10));
        collect_evidence(&mut ledger, order(2, 1, q, 10));
        collect_evidence(&mut ledger, order(3, 1, q, 10));

        assert!(resolve_priorities(&mut ledger, q));
    }

    #[traced_test]
    #[test]
    fn test_waiting_edge_never_closes_cycle() {
        // n = 5: quorum 4 leaves room for two opposing pairs of authors.
        let mut ledger = CommandLedger::new(QuorumParams::new(5).unwrap());
        let c = digest_with_prefix(1);
        let q = digest_with_prefix(2);

        // Authors 1, 2 order c first; authors 3, 4 order q first.
        collect_evidence(&mut ledger, order(1, 1, c, 5));
        collect_evidence(&mut ledger, order(2, 1, c, 5));
        for a in 1..=2 {
            collect_evidence(&mut ledger, order(a, 2, q, 10));
        }
        for a in 3..=4 {
            collect_evidence(&mut ledger, order(a, 1, q, 10));
        }
        assert!(!resolve_priorities(&mut ledger, q));
        assert_eq!(ledger.status(&q), CommandStatus::Waiting);

        // c reaches quorum. q qualifies as its priority through authors 3
        // and 4, but q already waits on c.
        for a in 3..=4 {
            collect_evidence(&mut ledger, order(a, 2, c, 20));
        }
        assert!(resolve_priorities(&mut ledger, c));
        assert!(ledger.command_info(&c).unwrap().pri_cmd().is_empty());
        assert!(logs_contain("edge rejected"));

        assert_eq!(ledger.committed_status(c), vec![q]);
        assert!(resolve_priorities(&mut ledger, q));
    }

    #[traced_test]
    #[test]
    fn test_leaf_in_cycle_skips_correct_edge() {
        let mut ledger = ledger();
        let c = digest_with_prefix(1);
        let q = digest_with_prefix(2);
        let p = digest_with_prefix(3);

        // c would normally become q's priority, as in
        // test_correct_sequenced_predecessor_blocks.
        collect_evidence(&mut ledger, order(1, 1, c, 5));
        collect_evidence(&mut ledger, order(2, 1, c, 5));
        collect_evidence(&mut ledger, order(1, 2, q, 10));
        collect_evidence(&mut ledger, order(2, 2, q, 10));
        collect_evidence(&mut ledger, order(3, 1, q, 10));
        collect_evidence(&mut ledger, order(4, 1, p, 1));

        // q is a leaf whose lowest dependencies lead back to itself.
        ledger.add_leaf(q);
        ledger.append_low(q, p);
        ledger.append_low(p, q);

        assert!(resolve_priorities(&mut ledger, q));
        assert!(logs_contain("Condorcet cycle detected, edge rejected"));
        assert!(ledger.command_info(&q).unwrap().pri_cmd().is_empty());
        assert!(!ledger.is_leaf(&c));
        assert!(!ledger.is_leaf(&q));
        assert_eq!(ledger.status(&q), CommandStatus::QuorumSequenced);
    }

    #[test]
    fn test_unresolved_quorum_peer_must_precede() {
        let mut ledger = ledger();
        let a = digest_with_prefix(2);
        let b = digest_with_prefix(1);

        // Authors 1 and 3 order a before b; both reach quorum.
        collect_evidence(&mut ledger, order(1, 1, a, 10));
        collect_evidence(&mut ledger, order(2, 1, a, 10));
        collect_evidence(&mut ledger, order(3, 1, a, 10));
        collect_evidence(&mut ledger, order(1, 2, b, 20));
        collect_evidence(&mut ledger, order(3, 2, b, 20));
        collect_evidence(&mut ledger, order(4, 1, b, 20));

        assert!(!resolve_priorities(&mut ledger, b));
        assert!(ledger.command_info(&b).unwrap().pri_cmd().contains(&a));
        assert!(resolve_priorities(&mut ledger, a));
        assert_eq!(ledger.committed_status(a), vec![b]);
        assert!(resolve_priorities(&mut ledger, b));
    }
}
