use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ethers_core::types::{Address, U256};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::provider::{ChainProvider, ChainResult, NetworkInfo};
use crate::store::TransactionStore;
use crate::transaction::{TransactionRecord, TransactionStatus};

/// Inputs the next nonce was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceDetails {
    pub network_nonce: U256,
    pub highest_confirmed: Option<U256>,
    pub highest_submitted: Option<U256>,
}

/// Exclusive permission to use `next_nonce` for `address`.
///
/// Other lock requests for the same address queue until this lock is
/// released, either explicitly or by dropping it.
#[derive(Debug)]
pub struct NonceLock {
    pub address: Address,
    pub next_nonce: U256,
    pub details: NonceDetails,
    guard: Option<OwnedMutexGuard<()>>,
}

impl NonceLock {
    /// Releases the lock. Safe to call more than once.
    pub fn release(&mut self) {
        if self.guard.take().is_some() {
            debug!(address = ?self.address, nonce = ?self.next_nonce, "Released nonce lock");
        }
    }

    pub fn is_released(&self) -> bool {
        self.guard.is_none()
    }
}

impl Drop for NonceLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Allocates nonces per account, serialising concurrent allocations for the
/// same account
pub struct NonceTracker {
    provider: Arc<dyn ChainProvider>,
    network: Arc<dyn NetworkInfo>,
    store: Arc<TransactionStore>,
    locks: parking_lot::Mutex<HashMap<Address, Arc<Mutex<()>>>>,
}

impl NonceTracker {
    pub fn new(
        provider: Arc<dyn ChainProvider>,
        network: Arc<dyn NetworkInfo>,
        store: Arc<TransactionStore>,
    ) -> Self {
        Self {
            provider,
            network,
            store,
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Waits for exclusive use of `address`'s nonce and computes the next one
    pub async fn get_nonce_lock(&self, address: Address) -> ChainResult<NonceLock> {
        let address_lock = self.locks.lock().entry(address).or_default().clone();
        let guard = address_lock.lock_owned().await;

        // on error the guard drops here, releasing the address
        let network_nonce = self.get_network_nonce(address).await?;
        let (highest_confirmed, highest_submitted) = self.highest_local_nonces(address);

        let next_nonce = [
            Some(network_nonce),
            highest_confirmed.map(|n| n.saturating_add(U256::one())),
            highest_submitted.map(|n| n.saturating_add(U256::one())),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(network_nonce);

        info!(
            ?address,
            ?next_nonce,
            ?network_nonce,
            ?highest_confirmed,
            ?highest_submitted,
            "Acquired nonce lock"
        );

        Ok(NonceLock {
            address,
            next_nonce,
            details: NonceDetails {
                network_nonce,
                highest_confirmed,
                highest_submitted,
            },
            guard: Some(guard),
        })
    }

    /// Transaction count of `address` as reported by the node
    pub async fn get_network_nonce(&self, address: Address) -> ChainResult<U256> {
        self.provider.get_transaction_count(address).await
    }

    /// Smallest nonce not yet used by a confirmed or submitted transaction,
    /// walking submitted nonces from the network count up to the first gap
    pub async fn get_highest_continuous_next_nonce(&self, address: Address) -> ChainResult<U256> {
        let network_nonce = self.get_network_nonce(address).await?;
        let (highest_confirmed, _) = self.highest_local_nonces(address);

        let mut next_nonce = highest_confirmed
            .map(|n| n.saturating_add(U256::one()))
            .map_or(network_nonce, |local| local.max(network_nonce));

        let submitted: HashSet<U256> = self
            .local_transactions(address)
            .into_iter()
            .filter(|tx| tx.status == TransactionStatus::Submitted)
            .filter_map(|tx| tx.nonce())
            .collect();
        while submitted.contains(&next_nonce) {
            next_nonce = next_nonce.saturating_add(U256::one());
        }
        Ok(next_nonce)
    }

    fn local_transactions(&self, address: Address) -> Vec<TransactionRecord> {
        let chain_id = self.network.chain_id();
        self.store
            .snapshot()
            .iter()
            .filter(|tx| tx.chain_id == chain_id && tx.from() == address)
            .cloned()
            .collect()
    }

    fn highest_local_nonces(&self, address: Address) -> (Option<U256>, Option<U256>) {
        let transactions = self.local_transactions(address);
        let highest = |status: TransactionStatus| {
            transactions
                .iter()
                .filter(|tx| tx.status == status)
                .filter_map(|tx| tx.nonce())
                .max()
        };
        (
            highest(TransactionStatus::Confirmed),
            highest(TransactionStatus::Submitted),
        )
    }
}
