//! Collection rule: admit one partial order into the ledger.

use phalanx_ledger::CommandLedger;
use phalanx_types::OrderInfo;
use tracing::trace;

/// Record `info` and promote its command across the `one_correct` and
/// `quorum` thresholds.
///
/// Unknown authors, committed commands, commands whose evidence is already
/// sealed, and repeated evidence from the same author are ignored. Returns
/// whether a status promotion happened.
pub fn collect_evidence(ledger: &mut CommandLedger, info: OrderInfo) -> bool {
    let params = *ledger.params();
    let digest = info.command;

    if !params.contains(info.author) {
        trace!(author = %info.author, command = %digest, "Ignoring order from unknown author");
        return false;
    }
    if ledger.is_committed(&digest) {
        trace!(author = %info.author, command = %digest, "Ignoring order for committed command");
        return false;
    }
    if ledger
        .command_info(&digest)
        .is_some_and(|existing| existing.order_count() >= params.quorum())
    {
        trace!(author = %info.author, command = %digest, "Ignoring order beyond quorum");
        return false;
    }

    let entry = ledger.read_command_info(digest);
    if !entry.order_append(info) {
        trace!(author = %info.author, command = %digest, "Ignoring duplicate order");
        return false;
    }
    let count = entry.order_count();
    debug_assert!(count <= params.quorum());

    let mut promoted = false;
    if count == params.quorum() {
        entry.seal_trusted_ts(params.fault());
    }
    ledger.push_order(info);

    if count == params.one_correct() {
        ledger.correct_status(digest);
        promoted = true;
    }
    if count == params.quorum() {
        ledger.quorum_status(digest);
        promoted = true;
    }
    promoted
}
