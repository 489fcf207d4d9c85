use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rocksdb::{Options, DB as Rocks};
use tracing::info;

use crate::transaction::TransactionRecord;

use super::db::{DbError, DbResult, TransactionStateDb};

const TRANSACTIONS_STORAGE_KEY: &[u8] = b"transactions_state";

/// Transaction table persisted in RocksDB as one JSON document
#[derive(Debug, Clone)]
pub struct RocksStateDb(Arc<Rocks>);

impl RocksStateDb {
    /// Opens db at `db_path` and creates if missing
    #[tracing::instrument(err)]
    pub fn from_path(db_path: &Path) -> DbResult<Self> {
        let path = {
            let mut path = db_path
                .parent()
                .unwrap_or(Path::new("."))
                .canonicalize()
                .map_err(|e| DbError::InvalidDbPath(e, db_path.to_string_lossy().into()))?;
            if let Some(file_name) = db_path.file_name() {
                path.push(file_name);
            }
            path
        };

        if path.is_dir() {
            info!(path=%path.to_string_lossy(), "Opening existing db")
        } else {
            info!(path=%path.to_string_lossy(), "Creating db")
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);

        Rocks::open(&opts, &path)
            .map_err(|e| DbError::OpeningError {
                source: e,
                path: db_path.into(),
                canonicalized: path,
            })
            .map(|rocks| Self(Arc::new(rocks)))
    }
}

#[async_trait]
impl TransactionStateDb for RocksStateDb {
    async fn retrieve_transactions(&self) -> DbResult<Vec<TransactionRecord>> {
        match self.0.get(TRANSACTIONS_STORAGE_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    async fn store_transactions(&self, transactions: &[TransactionRecord]) -> DbResult<()> {
        let bytes = serde_json::to_vec(transactions)?;
        Ok(self.0.put(TRANSACTIONS_STORAGE_KEY, bytes)?)
    }
}
