//! Cycle detection over lowest-dependency edges.

use crate::ledger::CommandLedger;
use phalanx_types::Digest;
use std::collections::HashSet;
use tracing::trace;

/// Depth-first search for a Condorcet cycle through a target command.
///
/// Walking the `low_cmd` edges from the target, the scanner reports a cycle
/// when the target is reachable from itself. As a side effect every visited
/// command with a non-empty lowest set has each child replaced by that
/// child's own lowest set, so later scans start closer to the leaves.
pub struct CondorcetScanner<'a> {
    ledger: &'a mut CommandLedger,
    target: Digest,
    found: bool,
    /// Commands on the current DFS path.
    on_path: HashSet<Digest>,
}

impl<'a> CondorcetScanner<'a> {
    pub fn new(ledger: &'a mut CommandLedger, target: Digest) -> Self {
        Self {
            ledger,
            target,
            found: false,
            on_path: HashSet::new(),
        }
    }

    /// Run the scan. Returns `true` if `target` depends on itself.
    pub fn has_cycle(mut self) -> bool {
        let target = self.target;
        self.search_lowest(target);
        if self.found {
            trace!(command = %target, "Condorcet cycle found");
        }
        self.found
    }

    /// Visit `digest`, returning whether it still has lowest dependencies
    /// once its children have been folded in.
    fn search_lowest(&mut self, digest: Digest) -> bool {
        if self.found || !self.on_path.insert(digest) {
            return false;
        }

        for low in self.ledger.low_of(&digest) {
            if low == self.target || self.ledger.trace_leaf(&low, &self.target) {
                self.found = true;
                break;
            }
            if self.search_lowest(low) {
                self.ledger.transitive_low(digest, &low);
            }
            if self.found {
                break;
            }
        }

        self.on_path.remove(&digest);
        !self.found && !self.ledger.low_of(&digest).is_empty()
    }
}

impl CommandLedger {
    /// Whether `digest` is part of a dependency cycle.
    pub fn has_cycle(&mut self, digest: Digest) -> bool {
        CondorcetScanner::new(self, digest).has_cycle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phalanx_types::test_utils::digest_with_prefix;
    use phalanx_types::QuorumParams;

    fn ledger_with(digests: &[Digest]) -> CommandLedger {
        let mut ledger = CommandLedger::new(QuorumParams::new(4).unwrap());
        for d in digests {
            ledger.read_command_info(*d);
        }
        ledger
    }

    #[test]
    fn test_no_cycle_on_chain() {
        let a = digest_with_prefix(1);
        let b = digest_with_prefix(2);
        let c = digest_with_prefix(3);
        let mut ledger = ledger_with(&[a, b, c]);
        ledger.append_low(a, b);
        ledger.append_low(b, c);

        assert!(!ledger.has_cycle(a));
        // a's lowest set was flattened through b down to c.
        assert_eq!(ledger.low_of(&a), vec![c]);
    }

    #[test]
    fn test_cycle_through_intermediate() {
        let a = digest_with_prefix(1);
        let b = digest_with_prefix(2);
        let c = digest_with_prefix(3);
        let mut ledger = ledger_with(&[a, b, c]);
        ledger.append_low(a, b);
        ledger.append_low(b, c);
        ledger.append_low(c, a);

        assert!(ledger.has_cycle(a));
    }

    #[test]
    fn test_cycle_not_through_target_terminates() {
        let a = digest_with_prefix(1);
        let b = digest_with_prefix(2);
        let c = digest_with_prefix(3);
        let mut ledger = ledger_with(&[a, b, c]);
        ledger.append_low(a, b);
        ledger.append_low(b, c);
        ledger.append_low(c, b);

        assert!(!ledger.has_cycle(a));
    }

    #[test]
    fn test_trace_shortcut() {
        let a = digest_with_prefix(1);
        let b = digest_with_prefix(2);
        let mut ledger = ledger_with(&[a, b]);
        ledger.append_low(a, b);
        ledger.append_low(b, a);
        // b historically reached a; the scan stops at the first hop.
        assert!(ledger.has_cycle(a));
    }
}
