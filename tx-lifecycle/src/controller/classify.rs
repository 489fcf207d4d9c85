use tracing::{debug, warn};

use crate::error::ControllerError;
use crate::transaction::{MethodSignature, TransactionCategory, TransactionId};

use super::TransactionController;

impl TransactionController {
    /// Resolves the category of a record whose call data matched no preset,
    /// based on whether the destination holds code
    pub async fn set_transaction_category(&self, id: &TransactionId) -> Result<(), ControllerError> {
        let Some(record) = self.store.get(id) else {
            return Ok(());
        };
        if record.category.is_none() {
            let category = match record.params.to {
                None => TransactionCategory::ContractDeployment,
                Some(to) => match self.provider.get_code(to).await {
                    Ok(code) if !code.is_empty() => TransactionCategory::ContractInteraction,
                    Ok(_) => TransactionCategory::SentEther,
                    Err(err) => {
                        warn!(%id, error = %err, "Failed to fetch destination code");
                        TransactionCategory::SentEther
                    }
                },
            };
            debug!(%id, ?category, "Resolved transaction category");
            self.update_transaction(id, |tx| {
                tx.category.get_or_insert(category);
            })
            .await?;
        }
        self.set_method_signature(id).await
    }

    /// Looks up the method signature of a contract interaction
    pub async fn set_method_signature(&self, id: &TransactionId) -> Result<(), ControllerError> {
        let Some(record) = self.store.get(id) else {
            return Ok(());
        };
        if record.category != Some(TransactionCategory::ContractInteraction)
            || record.method_signature.is_some()
        {
            return Ok(());
        }
        let Some(selector) = record.params.selector() else {
            return Ok(());
        };

        let signature = match self.signature_registry.lookup(selector).await {
            Ok(text) => text.as_deref().and_then(MethodSignature::parse),
            Err(err) => {
                warn!(%id, error = %err, "Method signature lookup failed");
                None
            }
        };
        if let Some(signature) = signature {
            self.update_transaction(id, |tx| {
                tx.method_signature.get_or_insert(signature);
            })
            .await?;
        }
        Ok(())
    }
}
