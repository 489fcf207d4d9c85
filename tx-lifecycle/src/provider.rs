//! External collaborators consumed by the controller.

pub use chain::{ChainProvider, FeeOracle, NetworkInfo};
pub use relay::{FlashbotsStatusClient, RelayStatusApi, RelayTxStatus};
pub use wallet::{AccountPermissions, SignatureRegistry, TokenRegistry, TransactionSigner};

mod chain;
mod relay;
mod wallet;

/// Errors raised while talking to a node, relay or registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainCommunicationError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Relay error: {0}")]
    Relay(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for ChainCommunicationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChainCommunicationError::Timeout
        } else {
            ChainCommunicationError::Relay(err.to_string())
        }
    }
}

pub type ChainResult<T> = Result<T, ChainCommunicationError>;
