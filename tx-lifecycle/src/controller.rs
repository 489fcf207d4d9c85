//! Orchestrates the transaction lifecycle: add, approve, sign, broadcast,
//! reject and replace, on top of the shared [`TransactionStore`].

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub use add::{AddTransactionRequest, AddedTransaction};

use crate::error::ControllerError;
use crate::events::{EventHub, TransactionEvent};
use crate::metrics::ControllerMetrics;
use crate::nonce::NonceTracker;
use crate::provider::{
    AccountPermissions, ChainProvider, FeeOracle, FlashbotsStatusClient, NetworkInfo,
    RelayStatusApi, SignatureRegistry, TokenRegistry, TransactionSigner,
};
use crate::reconcile::IntervalGate;
use crate::settings::ControllerSettings;
use crate::store::{Snapshot, TransactionStateDb, TransactionStore};
use crate::transaction::{
    decode_approve_call, encode_approve_call, MetaType, TransactionCategory, TransactionId,
    TransactionRecord, TransactionStatus,
};

mod add;
mod approve;
mod classify;
mod recovery;
mod replacement;


/// External dependencies of the controller
pub struct Collaborators {
    pub provider: Arc<dyn ChainProvider>,
    /// private relay used for records flagged `private_relay`
    pub relay_provider: Option<Arc<dyn ChainProvider>>,
    /// defaults to the Flashbots status API at the configured url
    pub relay_status: Option<Arc<dyn RelayStatusApi>>,
    pub signer: Arc<dyn TransactionSigner>,
    pub fee_oracle: Arc<dyn FeeOracle>,
    pub network: Arc<dyn NetworkInfo>,
    pub accounts: Arc<dyn AccountPermissions>,
    pub signature_registry: Arc<dyn SignatureRegistry>,
    pub token_registry: Arc<dyn TokenRegistry>,
    pub state_db: Arc<dyn TransactionStateDb>,
}

/// Previous status and written version of an updated record
type UpdateOutcome = Option<(TransactionStatus, TransactionRecord)>;

#[derive(Clone)]
pub struct TransactionController {
    pub(crate) store: Arc<TransactionStore>,
    pub(crate) nonce_tracker: Arc<NonceTracker>,
    pub(crate) events: Arc<EventHub>,
    pub(crate) provider: Arc<dyn ChainProvider>,
    pub(crate) relay_provider: Option<Arc<dyn ChainProvider>>,
    pub(crate) relay_status: Option<Arc<dyn RelayStatusApi>>,
    pub(crate) signer: Arc<dyn TransactionSigner>,
    pub(crate) fee_oracle: Arc<dyn FeeOracle>,
    pub(crate) network: Arc<dyn NetworkInfo>,
    pub(crate) accounts: Arc<dyn AccountPermissions>,
    pub(crate) signature_registry: Arc<dyn SignatureRegistry>,
    pub(crate) token_registry: Arc<dyn TokenRegistry>,
    /// serialises approvals across all accounts
    pub(crate) approval_mutex: Arc<Mutex<()>>,
    pub(crate) status_gate: Arc<IntervalGate>,
    pub(crate) settings: Arc<ControllerSettings>,
    pub(crate) metrics: ControllerMetrics,
}

impl TransactionController {
    /// Loads the persisted records and recovers from an interrupted session:
    /// unapproved and approved records are discarded, signed ones are
    /// re-broadcast.
    pub async fn new(
        collaborators: Collaborators,
        settings: ControllerSettings,
        metrics: ControllerMetrics,
    ) -> Result<Self, ControllerError> {
        let Collaborators {
            provider,
            relay_provider,
            relay_status,
            signer,
            fee_oracle,
            network,
            accounts,
            signature_registry,
            token_registry,
            state_db,
        } = collaborators;

        let store = Arc::new(TransactionStore::load(state_db, settings.tx_history_limit).await?);
        let nonce_tracker = Arc::new(NonceTracker::new(
            provider.clone(),
            network.clone(),
            store.clone(),
        ));
        let relay_status = match (relay_status, &settings.relay_status_url) {
            (Some(relay_status), _) => Some(relay_status),
            (None, Some(url)) => Some(
                Arc::new(FlashbotsStatusClient::new(url.clone())?) as Arc<dyn RelayStatusApi>
            ),
            (None, None) => None,
        };

        let controller = Self {
            store,
            nonce_tracker,
            events: Arc::new(EventHub::default()),
            provider,
            relay_provider,
            relay_status,
            signer,
            fee_oracle,
            network,
            accounts,
            signature_registry,
            token_registry,
            approval_mutex: Arc::new(Mutex::new(())),
            status_gate: Arc::new(IntervalGate::default()),
            settings: Arc::new(settings),
            metrics,
        };
        controller.recover().await?;
        Ok(controller)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransactionEvent> {
        self.events.subscribe()
    }

    /// Every committed state of the record table
    pub fn subscribe_to_store(&self) -> tokio::sync::watch::Receiver<Snapshot> {
        self.store.subscribe()
    }

    pub fn get_transaction(&self, id: &TransactionId) -> Option<TransactionRecord> {
        self.store.get(id)
    }

    pub fn transactions(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn nonce_tracker(&self) -> &NonceTracker {
        &self.nonce_tracker
    }

    /// Whether any record of the active chain still needs chain observation
    pub fn has_pending_transactions(&self) -> bool {
        let chain_id = self.network.chain_id();
        self.store
            .snapshot()
            .iter()
            .any(|tx| tx.chain_id == chain_id && !tx.verified_on_blockchain && is_observable(tx))
    }

    /// Removes all records of the active chain, or every record when
    /// `ignore_network` is set
    pub async fn wipe_transactions(&self, ignore_network: bool) -> Result<usize, ControllerError> {
        let chain_id = self.network.chain_id();
        let removed = self
            .store
            .retain(|tx| !ignore_network && tx.chain_id != chain_id)
            .await?;
        info!(removed = removed.len(), ignore_network, chain_id, "Wiped transactions");
        Ok(self.discard_removed(&removed))
    }

    /// Fails the pending results of records removed without a final event
    pub(crate) fn discard_removed(&self, removed: &[TransactionRecord]) -> usize {
        for record in removed {
            self.events.discard(&record.id);
        }
        removed.len()
    }

    /// The single validated write path for existing records.
    ///
    /// `f` is applied to the latest stored version of the record, after which
    /// its params are re-normalized and validated. A cached category or
    /// method signature is never overwritten. Returns the written record, or
    /// `None` if no record has this id.
    pub(crate) async fn update_transaction<F>(
        &self,
        id: &TransactionId,
        f: F,
    ) -> Result<Option<TransactionRecord>, ControllerError>
    where
        F: FnOnce(&mut TransactionRecord),
    {
        let outcome = self
            .store
            .mutate(|transactions| -> Result<UpdateOutcome, ControllerError> {
                let Some(current) = transactions.iter_mut().find(|tx| &tx.id == id) else {
                    return Ok(None);
                };
                let mut updated = current.clone();
                f(&mut updated);
                if current.category.is_some() {
                    updated.category = current.category;
                }
                if current.method_signature.is_some() {
                    updated.method_signature = current.method_signature.clone();
                }
                reencode_custom_allowance(&mut updated)?;
                updated.params = updated.params.clone().normalized();
                updated.params.validate()?;

                let previous_status = current.status;
                *current = updated.clone();
                Ok(Some((previous_status, updated)))
            })
            .await??;

        let Some((previous_status, updated)) = outcome else {
            debug!(%id, "Transaction not found, skipping update");
            return Ok(None);
        };
        if previous_status != updated.status {
            debug!(%id, ?previous_status, status = ?updated.status, "Transaction status updated");
            self.metrics
                .update_status_transition_metric(updated.chain_id, updated.status.as_str());
            self.events.status_update(&updated);
        }
        Ok(Some(updated))
    }

    /// Marks a record FAILED, or DROPPED when `dropped` is set, and verified.
    /// A record whose nonce was taken by a cancellation becomes CANCELLED.
    pub(crate) async fn fail_transaction(
        &self,
        id: &TransactionId,
        error: &ControllerError,
        dropped: bool,
    ) -> Result<(), ControllerError> {
        let cancelled = self
            .store
            .get(id)
            .map(|record| self.has_cancellation(&record))
            .unwrap_or(false);
        let status = match (cancelled, dropped) {
            (true, _) => TransactionStatus::Cancelled,
            (false, true) => TransactionStatus::Dropped,
            (false, false) => TransactionStatus::Failed,
        };

        let message = error.to_string();
        let Some(record) = self
            .update_transaction(id, |record| {
                record.status = status;
                record.error = Some(message);
                record.verified_on_blockchain = true;
            })
            .await?
        else {
            return Ok(());
        };
        warn!(%id, ?status, error = %error, "Transaction failed");
        self.events.finished(&record);
        Ok(())
    }

    /// Whether another record claiming the same nonce is a cancellation
    fn has_cancellation(&self, record: &TransactionRecord) -> bool {
        self.store.snapshot().iter().any(|other| {
            other.id != record.id
                && other.meta_type == MetaType::Cancel
                && other.shares_nonce_with(record)
        })
    }

    fn provider_for(&self, record: &TransactionRecord) -> Arc<dyn ChainProvider> {
        match (&self.relay_provider, record.private_relay) {
            (Some(relay), true) => relay.clone(),
            _ => self.provider.clone(),
        }
    }
}

/// Records that reconciliation still has work for
pub(crate) fn is_observable(record: &TransactionRecord) -> bool {
    matches!(
        record.status,
        TransactionStatus::Submitted | TransactionStatus::Confirmed | TransactionStatus::Failed
    )
}

/// Rewrites approve call data when the stored allowance was changed
fn reencode_custom_allowance(record: &mut TransactionRecord) -> Result<(), ControllerError> {
    if record.category != Some(TransactionCategory::TokenMethodApprove) {
        return Ok(());
    }
    let (Some(approval), Some(data)) = (&record.approval, &record.params.data) else {
        return Ok(());
    };
    let (spender, allowance) = decode_approve_call(data)?;
    if allowance != approval.allowance {
        debug!(id = %record.id, ?allowance, new_allowance = ?approval.allowance, "Updating approve allowance");
        record.params.data = Some(encode_approve_call(data, spender, approval.allowance)?);
    }
    Ok(())
}
