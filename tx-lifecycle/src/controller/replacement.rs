use chrono::Utc;
use ethers_core::types::U256;
use tracing::{info, instrument, warn};

use crate::error::{BroadcastError, ControllerError};
use crate::fees::{
    minimum_replacement_fee, replacement_fee, validate_explicit_fees, FeeParams, GasValues,
    ReplacementKind,
};
use crate::transaction::{
    MetaType, TransactionId, TransactionParams, TransactionRecord, TransactionStatus,
};

use super::TransactionController;

impl TransactionController {
    /// Replaces a submitted transaction with a zero-value self-transfer
    /// using the same nonce
    pub async fn cancel_transaction(
        &self,
        id: &TransactionId,
        gas_values: Option<GasValues>,
        gas_limit: Option<U256>,
    ) -> Result<TransactionRecord, ControllerError> {
        self.replace_transaction(ReplacementKind::Cancel, id, gas_values, gas_limit)
            .await
    }

    /// Re-sends a submitted transaction with the same nonce and higher fees
    pub async fn speed_up_transaction(
        &self,
        id: &TransactionId,
        gas_values: Option<GasValues>,
        gas_limit: Option<U256>,
    ) -> Result<TransactionRecord, ControllerError> {
        self.replace_transaction(ReplacementKind::SpeedUp, id, gas_values, gas_limit)
            .await
    }

    /// Lowest fees a cancel or speed-up of `id` would be sent with when no
    /// explicit fees are given
    pub fn minimum_replacement_fee(
        &self,
        kind: ReplacementKind,
        id: &TransactionId,
    ) -> Result<FeeParams, ControllerError> {
        let original = self.store.get(id).ok_or(ControllerError::NotFound(*id))?;
        let current_fees = original.params.fees.ok_or_else(|| {
            ControllerError::Validation("transaction has no fee values".into())
        })?;
        let fast = self.fee_oracle.fast_fee_data(original.chain_id);
        Ok(minimum_replacement_fee(kind, &current_fees, &fast))
    }

    #[instrument(skip_all, name = "replace_transaction", fields(%id, kind = kind.as_str()))]
    async fn replace_transaction(
        &self,
        kind: ReplacementKind,
        id: &TransactionId,
        gas_values: Option<GasValues>,
        gas_limit: Option<U256>,
    ) -> Result<TransactionRecord, ControllerError> {
        let explicit_fees = gas_values.as_ref().map(validate_explicit_fees).transpose()?;

        let original = self.store.get(id).ok_or(ControllerError::NotFound(*id))?;
        if original.status != TransactionStatus::Submitted {
            return Err(ControllerError::InvalidState {
                id: *id,
                action: "replaced",
                status: original.status,
            });
        }
        let (Some(nonce), Some(current_fees)) = (original.nonce(), original.params.fees) else {
            return Err(ControllerError::Validation(
                "replaced transaction has no nonce or fee values".into(),
            ));
        };

        // persisted first so an interrupted replacement stays visible
        self.update_transaction(id, |tx| tx.meta_type = kind.in_flight_meta_type())
            .await?;

        let fast = self.fee_oracle.fast_fee_data(original.chain_id);
        let fees = replacement_fee(kind, &current_fees, explicit_fees, &fast);
        let gas_limit = gas_limit.or(original.params.gas_limit);
        let mut params = match kind {
            ReplacementKind::Cancel => TransactionParams {
                from: original.from(),
                to: Some(original.from()),
                value: U256::zero(),
                data: None,
                nonce: Some(nonce),
                gas_limit,
                fees: Some(fees),
                chain_id: original.chain_id,
                hash: None,
            },
            ReplacementKind::SpeedUp => TransactionParams {
                gas_limit,
                fees: Some(fees),
                hash: None,
                ..original.params.clone()
            },
        };
        params.validate()?;

        let signed = match self.sign_params(&params).await {
            Ok(signed) => signed,
            Err(err) => {
                // nothing reached the network
                self.update_transaction(id, |tx| tx.meta_type = MetaType::Regular)
                    .await?;
                self.metrics
                    .update_replacement_metric(original.chain_id, kind.as_str(), "signing");
                return Err(err);
            }
        };

        // cancellations go through the public mempool
        let provider = match kind {
            ReplacementKind::Cancel => self.provider.clone(),
            ReplacementKind::SpeedUp => self.provider_for(&original),
        };
        let hash = match provider.send_raw_transaction(signed.raw.clone()).await {
            Ok(hash) => hash,
            Err(err) => match BroadcastError::classify(&err, signed.hash) {
                BroadcastError::AlreadyKnown { hash } => hash,
                BroadcastError::ReplacementUnderpriced(message) => {
                    warn!(%message, "Replacement fee too low, restoring original");
                    self.update_transaction(id, |tx| tx.meta_type = MetaType::Regular)
                        .await?;
                    self.metrics.update_replacement_metric(
                        original.chain_id,
                        kind.as_str(),
                        "underpriced",
                    );
                    return Err(BroadcastError::ReplacementUnderpriced(message).into());
                }
                other => {
                    self.metrics
                        .update_replacement_metric(original.chain_id, kind.as_str(), "broadcast");
                    return Err(other.into());
                }
            },
        };
        params.hash = Some(hash);

        let now = Utc::now();
        let replacement = TransactionRecord {
            id: TransactionId::random(),
            created_at: now,
            submitted_at: Some(now),
            confirmed_at: None,
            params,
            status: TransactionStatus::Submitted,
            meta_type: kind.replacement_meta_type(),
            raw_transaction: Some(signed.raw),
            receipt: None,
            verified_on_blockchain: false,
            blocks_drop_count: 0,
            error: None,
            private_relay: matches!(kind, ReplacementKind::SpeedUp) && original.private_relay,
            ..original
        };
        self.store.push(replacement.clone()).await?;
        self.metrics
            .update_replacement_metric(replacement.chain_id, kind.as_str(), "submitted");
        info!(replacement_id = %replacement.id, ?hash, "Replacement submitted");

        match kind {
            ReplacementKind::Cancel => self.events.cancellation(&replacement),
            ReplacementKind::SpeedUp => self.events.speed_up(&replacement),
        }
        Ok(replacement)
    }
}
