use ethers_core::types::{Address, U256};
use tracing::{info, instrument, warn};

use crate::error::ControllerError;
use crate::events::TransactionResult;
use crate::fees::{apply_gas_limit_policy, fallback_gas_limit, fill_fee_params, GasEstimation, GasValues};
use crate::transaction::{
    decode_approve_call, resolve_preset_category, ApprovalData, Origin, TransactionCategory,
    TransactionIntent, TransactionParams, TransactionRecord, TransactionStatus,
};

use super::TransactionController;

/// A caller's request to add a transaction
#[derive(Debug, Clone)]
pub struct AddTransactionRequest {
    pub intent: TransactionIntent,
    pub origin: Origin,
    pub origin_id: Option<String>,
    /// resolve the result once confirmed instead of once submitted
    pub wait_for_confirmation: bool,
    /// overrides category inference
    pub category: Option<TransactionCategory>,
    pub private_relay: bool,
}

impl AddTransactionRequest {
    pub fn internal(intent: TransactionIntent) -> Self {
        Self {
            intent,
            origin: Origin::Internal,
            origin_id: None,
            wait_for_confirmation: false,
            category: None,
            private_relay: false,
        }
    }

    pub fn external(intent: TransactionIntent, origin: impl Into<String>) -> Self {
        Self {
            origin: Origin::External(origin.into()),
            ..Self::internal(intent)
        }
    }
}

/// A record persisted as UNAPPROVED and the pending outcome of it
#[derive(Debug)]
pub struct AddedTransaction {
    pub record: TransactionRecord,
    pub result: TransactionResult,
}

impl TransactionController {
    /// Validates and classifies the request, estimates gas, fills fees and
    /// persists the record as UNAPPROVED.
    ///
    /// Validation errors are returned without persisting anything. Failures
    /// while preparing the record persist it as FAILED.
    #[instrument(skip_all, name = "add_transaction", fields(origin = %request.origin))]
    pub async fn add_transaction(
        &self,
        request: AddTransactionRequest,
    ) -> Result<AddedTransaction, ControllerError> {
        let chain_id = self.network.chain_id();
        let from = self.resolve_sender(&request)?;
        let params = TransactionParams::from_intent(&request.intent, from, chain_id);
        params.validate()?;

        let mut record = TransactionRecord::new(chain_id, request.origin.clone(), params);
        record.origin_id = request.origin_id.clone();
        record.private_relay = request.private_relay;
        record.category = request
            .category
            .or_else(|| resolve_preset_category(&record.params));

        if let Err(err) = self.prepare_transaction(&mut record, &request.intent.gas).await {
            warn!(id = %record.id, error = %err, "Failed to prepare transaction");
            record.status = TransactionStatus::Failed;
            record.error = Some(err.to_string());
            record.verified_on_blockchain = true;
            self.store.push(record.clone()).await?;
            self.metrics
                .update_status_transition_metric(chain_id, record.status.as_str());
            self.events.finished(&record);
            return Err(err);
        }

        let result = self
            .events
            .wait_for_result(record.id, request.wait_for_confirmation);
        self.store.push(record.clone()).await?;
        self.metrics
            .update_status_transition_metric(chain_id, record.status.as_str());
        info!(id = %record.id, category = ?record.category, "Added transaction");

        let controller = self.clone();
        let id = record.id;
        let category_known = record.category.is_some();
        tokio::spawn(async move {
            let outcome = if category_known {
                controller.set_method_signature(&id).await
            } else {
                controller.set_transaction_category(&id).await
            };
            if let Err(err) = outcome {
                warn!(%id, error = %err, "Failed to classify transaction");
            }
        });

        Ok(AddedTransaction { record, result })
    }

    /// Estimates the gas limit of `record`. Never fails: an unsuccessful
    /// simulation yields a conservative fallback limit.
    pub async fn estimate_gas(&self, record: &TransactionRecord) -> GasEstimation {
        if let Some(gas_limit) = record.params.gas_limit {
            return GasEstimation {
                gas_limit,
                estimation_succeeded: true,
            };
        }

        let block_gas_limit = self.fee_oracle.block_gas_limit(record.chain_id);
        let tx = record.params.to_typed_transaction();
        match self.provider.estimate_gas(&tx).await {
            Ok(estimated) => GasEstimation {
                gas_limit: apply_gas_limit_policy(
                    estimated,
                    &block_gas_limit,
                    self.network.is_custom_network(record.chain_id),
                ),
                estimation_succeeded: true,
            },
            Err(err) => {
                let category_fallback = record.category.and_then(|c| c.fallback_gas_limit());
                let gas_limit = fallback_gas_limit(category_fallback, &block_gas_limit);
                warn!(id = %record.id, error = %err, ?gas_limit, "Gas estimation failed, using fallback limit");
                GasEstimation {
                    gas_limit,
                    estimation_succeeded: false,
                }
            }
        }
    }

    /// Next nonce of `address`, skipping nonces of submitted transactions
    pub async fn get_next_nonce(&self, address: Address) -> Result<U256, ControllerError> {
        Ok(self
            .nonce_tracker
            .get_highest_continuous_next_nonce(address)
            .await?)
    }

    fn resolve_sender(&self, request: &AddTransactionRequest) -> Result<Address, ControllerError> {
        match &request.origin {
            Origin::Internal => {
                let selected = self.accounts.selected_address();
                match request.intent.from {
                    Some(from) if from != selected => Err(ControllerError::Validation(
                        "Internally initiated transaction is using invalid account".into(),
                    )),
                    _ => Ok(selected),
                }
            }
            Origin::External(origin) => {
                let from = request.intent.from.ok_or_else(|| {
                    ControllerError::Validation(
                        "Externally initiated transaction has undefined \"from\" parameter".into(),
                    )
                })?;
                if !self.accounts.has_permission(origin, from) {
                    return Err(ControllerError::PermissionDenied {
                        origin: origin.clone(),
                        account: from,
                    });
                }
                Ok(from)
            }
        }
    }

    async fn prepare_transaction(
        &self,
        record: &mut TransactionRecord,
        supplied_fees: &GasValues,
    ) -> Result<(), ControllerError> {
        if record.category == Some(TransactionCategory::TokenMethodApprove) {
            record.approval = Some(self.approval_data(record).await?);
        }

        let estimation = self.estimate_gas(record).await;
        record.params.gas_limit = Some(estimation.gas_limit);
        record.gas_estimation_failed = !estimation.estimation_succeeded;

        let supports_fee_market = self.network.supports_fee_market(record.chain_id).await?;
        let suggested = self.fee_oracle.fee_data(record.chain_id);
        record.params.fees = Some(fill_fee_params(
            supplied_fees,
            supports_fee_market,
            &suggested,
        )?);
        Ok(())
    }

    async fn approval_data(&self, record: &TransactionRecord) -> Result<ApprovalData, ControllerError> {
        let (Some(token), Some(data)) = (record.params.to, &record.params.data) else {
            return Err(ControllerError::Validation(
                "approve call without token or data".into(),
            ));
        };
        let (spender, allowance) = decode_approve_call(data)?;
        let decimals = self
            .token_registry
            .token_decimals(record.chain_id, token)
            .await?;
        Ok(ApprovalData {
            spender,
            allowance,
            decimals,
        })
    }
}
