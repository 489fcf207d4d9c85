//! The persisted, insertion-ordered table of transaction records.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

pub use db::{DbError, DbResult, InMemoryStateDb, TransactionStateDb};
pub use rocks::RocksStateDb;
pub use trim::trim_transactions;

use crate::transaction::{TransactionId, TransactionRecord};

mod db;
mod rocks;
mod trim;


pub type Snapshot = Arc<Vec<TransactionRecord>>;

/// Lock-guarded owner of all transaction records.
///
/// Every write is applied to a copy, persisted, and only then committed and
/// published to subscribers, so a failed write leaves the table untouched.
pub struct TransactionStore {
    transactions: Mutex<Vec<TransactionRecord>>,
    db: Arc<dyn TransactionStateDb>,
    history_limit: usize,
    snapshots: watch::Sender<Snapshot>,
}

impl TransactionStore {
    pub async fn load(db: Arc<dyn TransactionStateDb>, history_limit: usize) -> DbResult<Self> {
        let transactions = db.retrieve_transactions().await?;
        info!(count = transactions.len(), "Loaded persisted transactions");
        let (snapshots, _) = watch::channel(Arc::new(transactions.clone()));
        Ok(Self {
            transactions: Mutex::new(transactions),
            db,
            history_limit,
            snapshots,
        })
    }

    /// Receives every committed state of the table
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn get(&self, id: &TransactionId) -> Option<TransactionRecord> {
        self.snapshots
            .borrow()
            .iter()
            .find(|tx| &tx.id == id)
            .cloned()
    }

    /// Appends a record and trims the table to the history limit
    pub async fn push(&self, record: TransactionRecord) -> DbResult<()> {
        let limit = self.history_limit;
        self.commit(|transactions| {
            transactions.push(record);
            let trimmed = trim_transactions(std::mem::take(transactions), limit);
            *transactions = trimmed;
        })
        .await
    }

    /// Applies `f` to the table as one atomic write
    pub async fn mutate<R, F>(&self, f: F) -> DbResult<R>
    where
        F: FnOnce(&mut Vec<TransactionRecord>) -> R,
    {
        self.commit(f).await
    }

    pub async fn remove(&self, id: &TransactionId) -> DbResult<Option<TransactionRecord>> {
        self.commit(|transactions| {
            let index = transactions.iter().position(|tx| &tx.id == id)?;
            Some(transactions.remove(index))
        })
        .await
    }

    /// Keeps only the records matching `keep`, returning the removed ones
    pub async fn retain<F>(&self, mut keep: F) -> DbResult<Vec<TransactionRecord>>
    where
        F: FnMut(&TransactionRecord) -> bool,
    {
        self.commit(|transactions| {
            let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(transactions)
                .into_iter()
                .partition(|tx| keep(tx));
            *transactions = kept;
            removed
        })
        .await
    }

    async fn commit<R, F>(&self, f: F) -> DbResult<R>
    where
        F: FnOnce(&mut Vec<TransactionRecord>) -> R,
    {
        let mut transactions = self.transactions.lock().await;
        let mut next = transactions.clone();
        let result = f(&mut next);
        self.db.store_transactions(&next).await?;
        debug!(count = next.len(), "Committed transaction state");
        *transactions = next;
        self.snapshots.send_replace(Arc::new(transactions.clone()));
        Ok(result)
    }
}
