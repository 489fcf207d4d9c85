//! Wallet transaction lifecycle.
//!
//! Tracks transactions from the moment a caller submits an intent until the
//! chain settles them: nonce allocation, fee filling, signing, broadcast,
//! cancel/speed-up replacement and per-block reconciliation against chain
//! state. Chain access, signing and persistence are consumed through the
//! traits in [`provider`] and [`store`].

#![deny(clippy::unwrap_used, clippy::panic)]
#![deny(clippy::arithmetic_side_effects)]

pub use controller::{AddTransactionRequest, AddedTransaction, Collaborators, TransactionController};
pub use error::{BroadcastError, ControllerError};
pub use events::{EventHub, TransactionEvent, TransactionResult};
pub use fees::{FeeData, FeeParams, GasValues, ReplacementKind, TransactionType};
pub use metrics::ControllerMetrics;
pub use nonce::{NonceLock, NonceTracker};
pub use provider::{ChainCommunicationError, ChainResult};
pub use reconcile::NewBlock;
pub use settings::ControllerSettings;
pub use store::{DbError, DbResult, InMemoryStateDb, RocksStateDb, TransactionStateDb, TransactionStore};
pub use transaction::{
    ApprovalData, MetaType, MethodSignature, Origin, TransactionCategory, TransactionId,
    TransactionIntent, TransactionParams, TransactionRecord, TransactionStatus,
};

pub mod controller;
mod error;
mod events;
pub mod fees;
mod metrics;
pub mod nonce;
pub mod provider;
mod reconcile;
pub mod settings;
pub mod store;
pub mod transaction;

#[cfg(test)]
mod test_utils;
