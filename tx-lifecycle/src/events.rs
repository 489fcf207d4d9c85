use std::collections::HashMap;

use ethers_core::types::H256;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use crate::error::ControllerError;
use crate::transaction::{TransactionId, TransactionRecord, TransactionStatus};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle notifications for UI and notification layers
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEvent {
    StatusUpdate(TransactionRecord),
    /// the record reached SUBMITTED or a final status
    Finished(TransactionRecord),
    Confirmed(TransactionRecord),
    /// carries the new cancel record
    Cancellation(TransactionRecord),
    /// carries the new speed-up record
    SpeedUp(TransactionRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum WaitFor {
    Finished,
    Confirmed,
}

/// Broadcast channel of all events plus one-shot waiters keyed by
/// transaction id
pub struct EventHub {
    events: broadcast::Sender<TransactionEvent>,
    waiters: Mutex<HashMap<(TransactionId, WaitFor), Vec<oneshot::Sender<TransactionRecord>>>>,
}

impl Default for EventHub {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            events,
            waiters: Mutex::new(HashMap::new()),
        }
    }
}

impl EventHub {
    pub fn subscribe(&self) -> broadcast::Receiver<TransactionEvent> {
        self.events.subscribe()
    }

    /// Future resolving with the outcome of `id`: once submitted, or once
    /// confirmed when `wait_for_confirmation` is set
    pub fn wait_for_result(
        &self,
        id: TransactionId,
        wait_for_confirmation: bool,
    ) -> TransactionResult {
        let kind = if wait_for_confirmation {
            WaitFor::Confirmed
        } else {
            WaitFor::Finished
        };
        let (sender, receiver) = oneshot::channel();
        self.waiters.lock().entry((id, kind)).or_default().push(sender);
        TransactionResult { id, receiver }
    }

    pub fn status_update(&self, record: &TransactionRecord) {
        self.publish(TransactionEvent::StatusUpdate(record.clone()));
    }

    pub fn finished(&self, record: &TransactionRecord) {
        self.resolve(record, WaitFor::Finished);
        if record.status.is_final() {
            // a final status will never be followed by a confirmation
            self.resolve(record, WaitFor::Confirmed);
        }
        self.publish(TransactionEvent::Finished(record.clone()));
    }

    pub fn confirmed(&self, record: &TransactionRecord) {
        self.resolve(record, WaitFor::Confirmed);
        self.publish(TransactionEvent::Confirmed(record.clone()));
    }

    pub fn cancellation(&self, replacement: &TransactionRecord) {
        self.publish(TransactionEvent::Cancellation(replacement.clone()));
    }

    pub fn speed_up(&self, replacement: &TransactionRecord) {
        self.publish(TransactionEvent::SpeedUp(replacement.clone()));
    }

    /// Drops every waiter of `id`, which then fails as discarded
    pub fn discard(&self, id: &TransactionId) {
        let mut waiters = self.waiters.lock();
        waiters.remove(&(*id, WaitFor::Finished));
        waiters.remove(&(*id, WaitFor::Confirmed));
    }

    fn resolve(&self, record: &TransactionRecord, kind: WaitFor) {
        let Some(waiters) = self.waiters.lock().remove(&(record.id, kind)) else {
            return;
        };
        for waiter in waiters {
            // the caller may have dropped its future
            let _ = waiter.send(record.clone());
        }
    }

    fn publish(&self, event: TransactionEvent) {
        // sending only fails when nobody is subscribed
        if self.events.send(event).is_err() {
            debug!("No subscribers for transaction event");
        }
    }
}

/// Pending outcome of an added transaction
#[derive(Debug)]
pub struct TransactionResult {
    id: TransactionId,
    receiver: oneshot::Receiver<TransactionRecord>,
}

impl TransactionResult {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Resolves to the broadcast hash, or the reason the transaction did not
    /// make it
    pub async fn wait(self) -> Result<H256, ControllerError> {
        let record = self.receiver.await.map_err(|_| {
            ControllerError::Failed(format!("Transaction {} was discarded", self.id))
        })?;
        match record.status {
            TransactionStatus::Submitted | TransactionStatus::Confirmed => {
                record.params.hash.ok_or_else(|| {
                    ControllerError::Failed("Transaction has no hash".to_string())
                })
            }
            TransactionStatus::Rejected => Err(ControllerError::Rejected),
            TransactionStatus::Cancelled => Err(ControllerError::Cancelled),
            TransactionStatus::Failed | TransactionStatus::Dropped => Err(ControllerError::Failed(
                record
                    .error
                    .unwrap_or_else(|| "Transaction failed".to_string()),
            )),
            status => {
                warn!(id = %record.id, ?status, "Unexpected status for a finished transaction");
                Err(ControllerError::Failed(format!(
                    "Unknown problem, transaction ended as {status:?}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ethers_core::types::{Address, U256};

    use crate::transaction::{Origin, TransactionParams};

    use super::*;

    fn record() -> TransactionRecord {
        let params = TransactionParams {
            from: Address::repeat_byte(1),
            to: Some(Address::repeat_byte(2)),
            value: U256::zero(),
            data: None,
            nonce: Some(U256::zero()),
            gas_limit: None,
            fees: None,
            chain_id: 1,
            hash: Some(H256::repeat_byte(3)),
        };
        TransactionRecord::new(1, Origin::Internal, params)
    }

    #[tokio::test]
    async fn test_finished_resolves_with_hash() {
        let hub = EventHub::default();
        let mut tx = record();
        let result = hub.wait_for_result(tx.id, false);

        tx.status = TransactionStatus::Submitted;
        hub.finished(&tx);
        assert_eq!(result.wait().await.unwrap(), H256::repeat_byte(3));
    }

    #[tokio::test]
    async fn test_confirmation_waiter_ignores_submission() {
        let hub = EventHub::default();
        let mut tx = record();
        let mut result = hub.wait_for_result(tx.id, true);

        tx.status = TransactionStatus::Submitted;
        hub.finished(&tx);
        assert!(result.receiver.try_recv().is_err());

        tx.status = TransactionStatus::Confirmed;
        hub.confirmed(&tx);
        assert_eq!(result.wait().await.unwrap(), H256::repeat_byte(3));
    }

    #[tokio::test]
    async fn test_terminal_statuses_map_to_errors() {
        let hub = EventHub::default();

        let mut tx = record();
        let result = hub.wait_for_result(tx.id, false);
        tx.status = TransactionStatus::Rejected;
        hub.finished(&tx);
        assert!(matches!(result.wait().await, Err(ControllerError::Rejected)));

        let mut tx = record();
        let result = hub.wait_for_result(tx.id, true);
        tx.status = TransactionStatus::Cancelled;
        hub.finished(&tx);
        assert!(matches!(result.wait().await, Err(ControllerError::Cancelled)));

        let mut tx = record();
        let result = hub.wait_for_result(tx.id, false);
        tx.status = TransactionStatus::Failed;
        tx.error = Some("out of gas".to_string());
        hub.finished(&tx);
        match result.wait().await {
            Err(ControllerError::Failed(message)) => assert_eq!(message, "out of gas"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let hub = EventHub::default();
        let mut events = hub.subscribe();
        let tx = record();

        hub.status_update(&tx);
        hub.speed_up(&tx);
        assert_eq!(
            events.recv().await.unwrap(),
            TransactionEvent::StatusUpdate(tx.clone())
        );
        assert_eq!(events.recv().await.unwrap(), TransactionEvent::SpeedUp(tx));
    }
}
