use std::sync::Arc;

use chrono::Utc;
use ethers_core::types::{Bytes, Signature, H256, U256};
use ethers_core::utils::keccak256;
use tracing::{error, info, instrument, warn};

use crate::error::{BroadcastError, ControllerError};
use crate::nonce::NonceLock;
use crate::provider::ChainProvider;
use crate::transaction::{TransactionId, TransactionParams, TransactionRecord, TransactionStatus};

use super::TransactionController;

/// Signed transaction ready for broadcast
pub(crate) struct SignedTransaction {
    pub raw: Bytes,
    pub hash: H256,
}

impl TransactionController {
    /// Assigns a nonce, signs and broadcasts an UNAPPROVED transaction.
    ///
    /// Approvals are serialised controller-wide. The nonce lock is held until
    /// the broadcast outcome is persisted and released on every exit path.
    #[instrument(skip_all, name = "approve_transaction", fields(%id))]
    pub async fn approve_transaction(&self, id: &TransactionId) -> Result<(), ControllerError> {
        let _approval = self.approval_mutex.lock().await;

        let record = self.store.get(id).ok_or(ControllerError::NotFound(*id))?;
        if record.status != TransactionStatus::Unapproved {
            return Err(ControllerError::InvalidState {
                id: *id,
                action: "approved",
                status: record.status,
            });
        }

        let mut nonce_lock = None;
        let outcome = self.approve_and_submit(&record, &mut nonce_lock).await;
        if let Some(lock) = nonce_lock.as_mut() {
            lock.release();
        }

        if let Err(err) = outcome {
            error!(error = %err, "Failed to approve transaction");
            self.fail_transaction(id, &err, false).await?;
            return Err(err);
        }
        Ok(())
    }

    async fn approve_and_submit(
        &self,
        record: &TransactionRecord,
        nonce_lock: &mut Option<NonceLock>,
    ) -> Result<(), ControllerError> {
        let nonce = match record.nonce() {
            Some(nonce) => nonce,
            None => {
                let lock = self.nonce_tracker.get_nonce_lock(record.from()).await?;
                let nonce = lock.next_nonce;
                *nonce_lock = Some(lock);
                nonce
            }
        };
        let chain_id = self.network.chain_id();

        let approved = self
            .update_transaction(&record.id, |tx| {
                tx.status = TransactionStatus::Approved;
                tx.params.nonce = Some(nonce);
                tx.params.chain_id = chain_id;
                tx.chain_id = chain_id;
            })
            .await?
            .ok_or(ControllerError::NotFound(record.id))?;
        info!(?nonce, "Transaction approved");

        let signed = self.sign_params(&approved.params).await?;
        let signed_record = self
            .update_transaction(&record.id, |tx| {
                tx.status = TransactionStatus::Signed;
                tx.raw_transaction = Some(signed.raw.clone());
            })
            .await?
            .ok_or(ControllerError::NotFound(record.id))?;

        self.submit_transaction(&signed_record, false).await
    }

    /// Signs `params`, checking the signature is complete
    pub(crate) async fn sign_params(
        &self,
        params: &TransactionParams,
    ) -> Result<SignedTransaction, ControllerError> {
        if params.fees.is_none() {
            return Err(ControllerError::Validation(
                "transaction has no fee values".into(),
            ));
        }
        let tx = params.to_typed_transaction();
        let signature = self
            .signer
            .sign_transaction(&tx, params.from)
            .await
            .map_err(|err| ControllerError::Signing(err.to_string()))?;
        if !is_complete_signature(&signature) {
            return Err(ControllerError::Signing(
                "signature is missing r, s or v".into(),
            ));
        }
        let raw = tx.rlp_signed(&signature);
        let hash = H256::from(keccak256(&raw));
        Ok(SignedTransaction { raw, hash })
    }

    /// Broadcasts the raw bytes of a SIGNED record and marks it SUBMITTED.
    ///
    /// A node that already knows the transaction counts as success. With
    /// `force_submitted`, used when resuming signed records, any other
    /// broadcast error is logged and the record is still submitted so
    /// reconciliation can settle it.
    #[instrument(skip_all, name = "submit_transaction", fields(id = %record.id, force_submitted))]
    pub(crate) async fn submit_transaction(
        &self,
        record: &TransactionRecord,
        force_submitted: bool,
    ) -> Result<(), ControllerError> {
        let raw = record.raw_transaction.clone().ok_or_else(|| {
            ControllerError::Validation("transaction has not been signed".into())
        })?;
        let local_hash = H256::from(keccak256(&raw));
        let provider: Arc<dyn ChainProvider> = self.provider_for(record);

        let hash = match provider.send_raw_transaction(raw).await {
            Ok(hash) => hash,
            Err(err) => match BroadcastError::classify(&err, local_hash) {
                BroadcastError::AlreadyKnown { hash } => {
                    info!(?hash, "Transaction already known to the node");
                    hash
                }
                broadcast_error if force_submitted => {
                    warn!(error = %broadcast_error, "Forced re-submission failed, tracking transaction anyway");
                    local_hash
                }
                broadcast_error => {
                    self.metrics
                        .update_broadcast_metric(record.chain_id, broadcast_error.to_metrics_label());
                    return Err(broadcast_error.into());
                }
            },
        };

        let submitted = self
            .update_transaction(&record.id, |tx| {
                tx.status = TransactionStatus::Submitted;
                tx.params.hash = Some(hash);
                tx.submitted_at = Some(Utc::now());
            })
            .await?
            .ok_or(ControllerError::NotFound(record.id))?;
        self.metrics
            .update_broadcast_metric(record.chain_id, "submitted");
        info!(?hash, "Transaction submitted");
        self.events.finished(&submitted);
        Ok(())
    }

    /// Declines an UNAPPROVED or APPROVED transaction and removes it.
    ///
    /// Waits for any approval in progress, so a nonce lock can never be left
    /// held by a rejected record.
    pub async fn reject_transaction(&self, id: &TransactionId) -> Result<(), ControllerError> {
        let _approval = self.approval_mutex.lock().await;

        let mut record = self.store.get(id).ok_or(ControllerError::NotFound(*id))?;
        if !matches!(
            record.status,
            TransactionStatus::Unapproved | TransactionStatus::Approved
        ) {
            return Err(ControllerError::InvalidState {
                id: *id,
                action: "rejected",
                status: record.status,
            });
        }

        self.store.remove(id).await?;
        record.status = TransactionStatus::Rejected;
        self.metrics
            .update_status_transition_metric(record.chain_id, record.status.as_str());
        info!(%id, "Transaction rejected");
        self.events.status_update(&record);
        self.events.finished(&record);
        Ok(())
    }
}

fn is_complete_signature(signature: &Signature) -> bool {
    let valid_v = matches!(signature.v, 0 | 1 | 27 | 28) || signature.v >= 35;
    signature.r != U256::zero() && signature.s != U256::zero() && valid_v
}
