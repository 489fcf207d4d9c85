use chrono::Utc;
use ethers_core::types::{TransactionReceipt, H256, U64};
use tracing::{debug, info};

use crate::controller::TransactionController;
use crate::error::ControllerError;
use crate::provider::RelayTxStatus;
use crate::transaction::{TransactionRecord, TransactionStatus};

fn succeeded(receipt: &TransactionReceipt) -> bool {
    receipt.status == Some(U64::one())
}

fn broadcast_hash(record: &TransactionRecord) -> Result<H256, ControllerError> {
    record
        .params
        .hash
        .ok_or_else(|| ControllerError::Validation("transaction has no hash".into()))
}

impl TransactionController {
    pub(crate) async fn reconcile_transaction(
        &self,
        record: &TransactionRecord,
        block_number: u64,
    ) -> Result<(), ControllerError> {
        if record.verified_on_blockchain {
            return Ok(());
        }
        match record.status {
            TransactionStatus::Confirmed | TransactionStatus::Failed => self
                .verify_confirmed_transaction(record, block_number)
                .await
                .map(|_| ()),
            TransactionStatus::Submitted => self.reconcile_submitted(record, block_number).await,
            _ => Ok(()),
        }
    }

    /// Checks the receipt of a mined transaction is still there and deep
    /// enough. A verified success drops every other pending record claiming
    /// the same nonce. Returns whether the record was verified.
    async fn verify_confirmed_transaction(
        &self,
        record: &TransactionRecord,
        block_number: u64,
    ) -> Result<bool, ControllerError> {
        let hash = broadcast_hash(record)?;
        let Some(receipt) = self.provider.get_transaction_receipt(hash).await? else {
            if !record.is_deposit() {
                info!(id = %record.id, "Receipt disappeared, transaction is pending again");
                self.update_transaction(&record.id, |tx| {
                    tx.status = TransactionStatus::Submitted;
                    tx.confirmed_at = None;
                })
                .await?;
            }
            return Ok(false);
        };

        let mined_at = receipt
            .block_number
            .map(|n| n.as_u64())
            .unwrap_or(block_number);
        let depth = block_number.saturating_sub(mined_at);
        if !record.is_deposit() && depth < self.settings.transaction_confirmations {
            debug!(id = %record.id, depth, "Waiting for more confirmations");
            return Ok(false);
        }

        if !succeeded(&receipt) {
            self.update_transaction(&record.id, |tx| tx.receipt = Some(receipt))
                .await?;
            self.fail_transaction(&record.id, &ControllerError::Reverted, false)
                .await?;
            return Ok(false);
        }

        self.update_transaction(&record.id, |tx| {
            tx.verified_on_blockchain = true;
            tx.receipt = Some(receipt);
        })
        .await?;
        info!(id = %record.id, ?hash, "Transaction verified on chain");
        self.drop_nonce_siblings(record).await?;
        Ok(true)
    }

    async fn drop_nonce_siblings(&self, record: &TransactionRecord) -> Result<(), ControllerError> {
        let siblings: Vec<_> = self
            .store
            .snapshot()
            .iter()
            .filter(|tx| tx.id != record.id && tx.shares_nonce_with(record) && !tx.status.is_final())
            .map(|tx| tx.id)
            .collect();
        for id in siblings {
            self.fail_transaction(&id, &ControllerError::DroppedOrReplaced, true)
                .await?;
        }
        Ok(())
    }

    async fn reconcile_submitted(
        &self,
        record: &TransactionRecord,
        block_number: u64,
    ) -> Result<(), ControllerError> {
        let hash = broadcast_hash(record)?;

        if let (true, Some(relay)) = (record.private_relay, &self.relay_status) {
            match relay.transaction_status(hash).await? {
                RelayTxStatus::Pending => return Ok(()),
                RelayTxStatus::Failed => {
                    let error = ControllerError::Failed(
                        "Transaction was dropped by the private relay".into(),
                    );
                    return self.fail_transaction(&record.id, &error, true).await;
                }
                RelayTxStatus::Included | RelayTxStatus::Unknown => {}
            }
        }

        let known = self.provider.get_transaction(hash).await?;
        match known.as_ref().and_then(|tx| tx.block_number) {
            Some(mined_at) => {
                self.confirm_mined(record, hash, mined_at.as_u64(), block_number)
                    .await
            }
            None => self.check_dropped(record, known.is_some()).await,
        }
    }

    async fn confirm_mined(
        &self,
        record: &TransactionRecord,
        hash: H256,
        mined_at: u64,
        block_number: u64,
    ) -> Result<(), ControllerError> {
        let mut receipt = None;
        if record.is_deposit() {
            if block_number.saturating_sub(mined_at) < self.settings.deposit_confirmations {
                return Ok(());
            }
            if !self.verify_confirmed_transaction(record, block_number).await? {
                return Ok(());
            }
        } else {
            receipt = self.provider.get_transaction_receipt(hash).await?;
            if let Some(reverted) = receipt.as_ref().filter(|r| !succeeded(r)).cloned() {
                self.update_transaction(&record.id, |tx| tx.receipt = Some(reverted))
                    .await?;
                return self
                    .fail_transaction(&record.id, &ControllerError::Reverted, false)
                    .await;
            }
        }

        let confirmed = self
            .update_transaction(&record.id, |tx| {
                tx.status = TransactionStatus::Confirmed;
                tx.confirmed_at = Some(Utc::now());
                tx.blocks_drop_count = 0;
                if receipt.is_some() {
                    tx.receipt = receipt;
                }
            })
            .await?;
        if let Some(confirmed) = confirmed {
            info!(id = %confirmed.id, ?hash, mined_at, "Transaction confirmed");
            self.events.confirmed(&confirmed);
        }
        Ok(())
    }

    /// Counts polls that did not find the transaction and drops it once the
    /// network nonce has moved past it for long enough
    async fn check_dropped(
        &self,
        record: &TransactionRecord,
        known_to_node: bool,
    ) -> Result<(), ControllerError> {
        let nonce = record
            .nonce()
            .ok_or_else(|| ControllerError::Validation("transaction has no nonce".into()))?;
        let network_nonce = self.nonce_tracker.get_network_nonce(record.from()).await?;
        if nonce > network_nonce {
            return Ok(());
        }

        if known_to_node {
            if record.blocks_drop_count > 0 {
                self.update_transaction(&record.id, |tx| tx.blocks_drop_count = 0)
                    .await?;
            }
            return Ok(());
        }

        let threshold = if nonce == network_nonce {
            self.settings.next_nonce_blocks_before_drop
        } else {
            self.settings.blocks_before_drop
        };
        let count = record.blocks_drop_count.saturating_add(1);
        if count < threshold {
            debug!(id = %record.id, count, threshold, "Transaction not found on chain");
            self.update_transaction(&record.id, |tx| tx.blocks_drop_count = count)
                .await?;
            return Ok(());
        }
        self.fail_transaction(&record.id, &ControllerError::DroppedOrReplaced, true)
            .await
    }
}
