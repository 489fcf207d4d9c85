use std::time::Duration;

use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Bytes, Transaction, TransactionReceipt, H256, U256};

use crate::fees::FeeData;

use super::ChainResult;

/// Node access for one chain
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Simulate the transaction and return the gas it would use
    async fn estimate_gas(&self, tx: &TypedTransaction) -> ChainResult<U256>;

    /// Transaction by hash, `None` if the node does not know it
    async fn get_transaction(&self, hash: H256) -> ChainResult<Option<Transaction>>;

    /// Receipt by hash, `None` until mined
    async fn get_transaction_receipt(&self, hash: H256) -> ChainResult<Option<TransactionReceipt>>;

    /// Broadcast signed bytes, returning the transaction hash
    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<H256>;

    /// Number of transactions sent from `address` as of the latest block
    async fn get_transaction_count(&self, address: Address) -> ChainResult<U256>;

    /// Deployed code at `address`
    async fn get_code(&self, address: Address) -> ChainResult<Bytes>;
}

/// Fee levels and gas limits per chain
pub trait FeeOracle: Send + Sync {
    /// Default fee levels for new transactions
    fn fee_data(&self, chain_id: u64) -> FeeData;

    /// The "fast" tier, used as a floor for replacements
    fn fast_fee_data(&self, chain_id: u64) -> FeeData;

    fn block_gas_limit(&self, chain_id: u64) -> U256;
}

/// Network configuration and selection
#[async_trait]
pub trait NetworkInfo: Send + Sync {
    /// Chain id of the active network
    fn chain_id(&self) -> u64;

    async fn supports_fee_market(&self, chain_id: u64) -> ChainResult<bool>;

    /// Whether the network was added by the user rather than shipped
    fn is_custom_network(&self, chain_id: u64) -> bool;

    /// Minimum time between two status reconciliations, if the network
    /// overrides the configured default
    fn status_update_interval(&self, _chain_id: u64) -> Option<Duration> {
        None
    }
}
