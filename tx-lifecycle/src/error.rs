use ethers_core::types::{Address, H256};
use lazy_static::lazy_static;
use regex::Regex;

use crate::provider::ChainCommunicationError;
use crate::store::DbError;
use crate::transaction::{TransactionId, TransactionStatus};

lazy_static! {
    static ref ALREADY_KNOWN: Regex =
        Regex::new(r"(?i)(known transaction|already known)").expect("valid regex");
    static ref REPLACEMENT_UNDERPRICED: Regex =
        Regex::new(r"(?i)(replacement fee too low|replacement transaction underpriced)")
            .expect("valid regex");
}

/// Errors surfaced by the public controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Invalid transaction: {0}")]
    Validation(String),
    #[error("Origin {origin} has no permission to use account {account:?}")]
    PermissionDenied { origin: String, account: Address },
    #[error("Transaction {0} not found")]
    NotFound(TransactionId),
    #[error("Transaction {id} cannot be {action} while {status:?}")]
    InvalidState {
        id: TransactionId,
        action: &'static str,
        status: TransactionStatus,
    },
    #[error("An error while signing the transaction occurred: {0}")]
    Signing(String),
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
    #[error("Transaction failed. The transaction was reverted by the EVM")]
    Reverted,
    #[error("Transaction failed. The transaction was dropped or replaced by a new one")]
    DroppedOrReplaced,
    #[error("Transaction rejected")]
    Rejected,
    #[error("User cancelled the transaction")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
    #[error("Chain communication error: {0}")]
    Chain(#[from] ChainCommunicationError),
    #[error("DB error: {0}")]
    Db(#[from] DbError),
    #[error("{0}")]
    EyreError(#[from] eyre::Report),
}

impl ControllerError {
    /// Label used for metrics
    pub fn to_metrics_label(&self) -> &'static str {
        match self {
            ControllerError::Validation(_) => "validation",
            ControllerError::PermissionDenied { .. } => "permission_denied",
            ControllerError::NotFound(_) => "not_found",
            ControllerError::InvalidState { .. } => "invalid_state",
            ControllerError::Signing(_) => "signing",
            ControllerError::Broadcast(err) => err.to_metrics_label(),
            ControllerError::Reverted => "reverted",
            ControllerError::DroppedOrReplaced => "dropped",
            ControllerError::Rejected => "rejected",
            ControllerError::Cancelled => "cancelled",
            ControllerError::Failed(_) => "failed",
            ControllerError::Chain(_) => "chain",
            ControllerError::Db(_) => "db",
            ControllerError::EyreError(_) => "other",
        }
    }
}

/// A provider rejection of a raw transaction, classified by its message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    #[error("Transaction {hash:?} is already known to the node")]
    AlreadyKnown { hash: H256 },
    #[error("Replacement fee too low: {0}")]
    ReplacementUnderpriced(String),
    #[error("Broadcast failed: {0}")]
    Other(String),
}

impl BroadcastError {
    /// Classifies a provider error raised while sending `hash`.
    pub fn classify(err: &ChainCommunicationError, hash: H256) -> Self {
        let message = err.to_string();
        if ALREADY_KNOWN.is_match(&message) {
            BroadcastError::AlreadyKnown { hash }
        } else if REPLACEMENT_UNDERPRICED.is_match(&message) {
            BroadcastError::ReplacementUnderpriced(message)
        } else {
            BroadcastError::Other(message)
        }
    }

    pub fn to_metrics_label(&self) -> &'static str {
        match self {
            BroadcastError::AlreadyKnown { .. } => "already_known",
            BroadcastError::ReplacementUnderpriced(_) => "underpriced",
            BroadcastError::Other(_) => "broadcast",
        }
    }
}
