use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, Signature};

use super::ChainResult;

/// Signs transactions with the key of `from`
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign_transaction(
        &self,
        tx: &TypedTransaction,
        from: Address,
    ) -> eyre::Result<Signature>;
}

/// Account selection and per-origin permissions
pub trait AccountPermissions: Send + Sync {
    /// Account currently selected in the wallet
    fn selected_address(&self) -> Address;

    fn has_permission(&self, origin: &str, account: Address) -> bool;
}

/// Lookup of 4-byte method selectors
#[async_trait]
pub trait SignatureRegistry: Send + Sync {
    /// Text signature such as `transfer(address,uint256)`
    async fn lookup(&self, selector: [u8; 4]) -> ChainResult<Option<String>>;
}

#[async_trait]
pub trait TokenRegistry: Send + Sync {
    async fn token_decimals(&self, chain_id: u64, token: Address) -> ChainResult<Option<u8>>;
}
