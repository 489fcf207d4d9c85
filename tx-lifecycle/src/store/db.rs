use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::transaction::TransactionRecord;

/// DB Error type
#[derive(thiserror::Error, Debug)]
pub enum DbError {
    /// Rocks DB Error
    #[error("{0}")]
    RockError(#[from] rocksdb::Error),
    /// Error opening the database
    #[error("Failed to open {path}, canonicalized as {canonicalized}: {source}")]
    OpeningError {
        #[source]
        source: rocksdb::Error,
        path: PathBuf,
        canonicalized: PathBuf,
    },
    /// Could not parse the provided database path string
    #[error("Invalid database path supplied {1:?}; {0}")]
    InvalidDbPath(#[source] io::Error, String),
    #[error("Failed to encode or decode transactions: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

/// Durable storage of the transaction table
#[async_trait]
pub trait TransactionStateDb: Send + Sync {
    /// Retrieve all persisted records in insertion order
    async fn retrieve_transactions(&self) -> DbResult<Vec<TransactionRecord>>;

    /// Replace the persisted records
    async fn store_transactions(&self, transactions: &[TransactionRecord]) -> DbResult<()>;
}

/// Non-durable state, for tests and ephemeral wallets
#[derive(Debug, Default)]
pub struct InMemoryStateDb {
    transactions: Mutex<Vec<TransactionRecord>>,
}

impl InMemoryStateDb {
    pub fn with_transactions(transactions: Vec<TransactionRecord>) -> Self {
        Self {
            transactions: Mutex::new(transactions),
        }
    }
}

#[async_trait]
impl TransactionStateDb for InMemoryStateDb {
    async fn retrieve_transactions(&self) -> DbResult<Vec<TransactionRecord>> {
        Ok(self.transactions.lock().clone())
    }

    async fn store_transactions(&self, transactions: &[TransactionRecord]) -> DbResult<()> {
        *self.transactions.lock() = transactions.to_vec();
        Ok(())
    }
}
