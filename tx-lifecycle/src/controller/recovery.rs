use tracing::{info, warn};

use crate::error::ControllerError;
use crate::transaction::TransactionStatus;

use super::TransactionController;

impl TransactionController {
    pub(crate) async fn recover(&self) -> Result<(), ControllerError> {
        self.clear_unapproved_transactions().await?;
        self.wipe_approved_transactions().await?;
        self.check_for_signed_transactions().await;
        Ok(())
    }

    /// Removes every record still waiting for the user's decision
    pub async fn clear_unapproved_transactions(&self) -> Result<usize, ControllerError> {
        let removed = self
            .store
            .retain(|tx| tx.status != TransactionStatus::Unapproved)
            .await?;
        if !removed.is_empty() {
            info!(removed = removed.len(), "Cleared unapproved transactions");
        }
        Ok(self.discard_removed(&removed))
    }

    /// Approved records that were never signed cannot be resumed
    async fn wipe_approved_transactions(&self) -> Result<usize, ControllerError> {
        let removed = self
            .store
            .retain(|tx| tx.status != TransactionStatus::Approved)
            .await?;
        if !removed.is_empty() {
            info!(removed = removed.len(), "Removed interrupted approved transactions");
        }
        Ok(self.discard_removed(&removed))
    }

    /// Re-broadcasts SIGNED records of the active chain whose submission was
    /// interrupted
    pub async fn check_for_signed_transactions(&self) {
        let chain_id = self.network.chain_id();
        let signed: Vec<_> = self
            .store
            .snapshot()
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Signed && tx.chain_id == chain_id)
            .cloned()
            .collect();

        for record in signed {
            if let Err(err) = self.submit_transaction(&record, true).await {
                warn!(id = %record.id, error = %err, "Failed to resubmit signed transaction");
            }
        }
    }

    /// Resumes signed records after the active network changed
    pub async fn on_network_change(&self) {
        info!(chain_id = self.network.chain_id(), "Network changed");
        self.check_for_signed_transactions().await;
    }
}
