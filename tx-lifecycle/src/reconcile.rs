//! Per-block reconciliation of local records against chain state.

use derive_new::new;
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

pub(crate) use interval::IntervalGate;

use crate::controller::{is_observable, TransactionController};

mod engine;
mod interval;


/// A new block observed on a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct NewBlock {
    pub chain_id: u64,
    pub block_number: u64,
}

impl TransactionController {
    /// Reconciles on every new block until the channel closes
    pub async fn run(self, mut blocks: mpsc::Receiver<NewBlock>) {
        info!("Starting transaction reconciliation");
        while let Some(block) = blocks.recv().await {
            self.on_new_block(block).await;
        }
        error!("Block updates channel closed");
    }

    /// Reconciles the active chain, at most once per status update interval.
    /// Returns whether reconciliation ran.
    pub async fn on_new_block(&self, block: NewBlock) -> bool {
        if block.chain_id != self.network.chain_id() {
            debug!(?block, "Ignoring block of inactive chain");
            return false;
        }
        let interval = self
            .network
            .status_update_interval(block.chain_id)
            .unwrap_or_else(|| self.settings.status_update_interval());
        if !self.status_gate.try_acquire(block.chain_id, interval) {
            return false;
        }
        self.query_transaction_statuses(block.block_number).await;
        true
    }

    /// Advances every unverified record of the active chain against the chain
    /// state at `block_number`. Records are reconciled concurrently and a
    /// failure of one does not affect the others.
    #[instrument(skip(self))]
    pub async fn query_transaction_statuses(&self, block_number: u64) {
        let chain_id = self.network.chain_id();
        let pending: Vec<_> = self
            .store
            .snapshot()
            .iter()
            .filter(|tx| tx.chain_id == chain_id && !tx.verified_on_blockchain && is_observable(tx))
            .cloned()
            .collect();
        self.metrics
            .set_pending_transactions_metric(chain_id, pending.len());
        if pending.is_empty() {
            return;
        }

        let results = join_all(
            pending
                .iter()
                .map(|record| self.reconcile_transaction(record, block_number)),
        )
        .await;

        for (record, result) in pending.iter().zip(results) {
            if let Err(err) = result {
                warn!(id = %record.id, status = ?record.status, error = %err, "Failed to reconcile transaction");
                self.metrics.update_reconciliation_error_metric(chain_id);
            }
        }
    }
}
