use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::transaction::TransactionRecord;

/// Trims `transactions` to at most `limit` (nonce, chain, day) groups.
///
/// Groups are ranked newest first. A group holding a non-final record is
/// always kept, and groups are kept or evicted as a whole.
pub fn trim_transactions(
    transactions: Vec<TransactionRecord>,
    limit: usize,
) -> Vec<TransactionRecord> {
    let mut has_pending = HashMap::new();
    for tx in &transactions {
        let pending = has_pending.entry(tx.trim_group()).or_insert(false);
        *pending |= !tx.status.is_final();
    }

    let mut kept = HashSet::new();
    for group in transactions.iter().rev().map(|tx| tx.trim_group()).unique() {
        let pending = has_pending.get(&group).copied().unwrap_or(false);
        if kept.len() < limit || pending {
            kept.insert(group);
        }
    }

    transactions
        .into_iter()
        .filter(|tx| kept.contains(&tx.trim_group()))
        .collect()
}
