use std::sync::Arc;
use std::time::Duration;

use ethers_core::types::{Address, U256};

use crate::provider::ChainCommunicationError;
use crate::test_utils::{record_with, sender, store_with, MockProvider, TestNetwork};
use crate::transaction::TransactionStatus;

use super::*;

fn provider_with_count(count: u64) -> MockProvider {
    let mut provider = MockProvider::new();
    provider
        .expect_get_transaction_count()
        .returning(move |_| Ok(U256::from(count)));
    provider
}

async fn tracker(provider: MockProvider, store_records: Vec<crate::TransactionRecord>) -> Arc<NonceTracker> {
    let store = store_with(store_records).await;
    Arc::new(NonceTracker::new(
        Arc::new(provider),
        Arc::new(TestNetwork::default()),
        store,
    ))
}

#[tokio::test]
async fn test_network_nonce_is_used_without_local_history() {
    let tracker = tracker(provider_with_count(4), vec![]).await;
    let lock = tracker.get_nonce_lock(sender()).await.unwrap();
    assert_eq!(lock.next_nonce, U256::from(4));
    assert_eq!(lock.details.highest_confirmed, None);
}

#[tokio::test]
async fn test_local_submitted_nonce_wins_over_stale_network_count() {
    let records = vec![
        record_with(3, TransactionStatus::Confirmed),
        record_with(4, TransactionStatus::Submitted),
        record_with(5, TransactionStatus::Submitted),
    ];
    let tracker = tracker(provider_with_count(4), records).await;
    let lock = tracker.get_nonce_lock(sender()).await.unwrap();
    assert_eq!(lock.next_nonce, U256::from(6));
    assert_eq!(lock.details.highest_confirmed, Some(3.into()));
    assert_eq!(lock.details.highest_submitted, Some(5.into()));
}

#[tokio::test]
async fn test_other_chains_and_accounts_are_ignored() {
    let mut other_chain = record_with(10, TransactionStatus::Submitted);
    other_chain.chain_id = 99;
    let mut other_account = record_with(11, TransactionStatus::Submitted);
    other_account.params.from = Address::repeat_byte(0x99);

    let tracker = tracker(provider_with_count(2), vec![other_chain, other_account]).await;
    let lock = tracker.get_nonce_lock(sender()).await.unwrap();
    assert_eq!(lock.next_nonce, U256::from(2));
}

#[tokio::test]
async fn test_concurrent_locks_for_same_address_never_share_a_nonce() {
    let store = store_with(vec![]).await;
    let tracker = Arc::new(NonceTracker::new(
        Arc::new(provider_with_count(7)),
        Arc::new(TestNetwork::default()),
        store.clone(),
    ));

    let mut first = tracker.get_nonce_lock(sender()).await.unwrap();
    assert_eq!(first.next_nonce, U256::from(7));

    let waiting = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.get_nonce_lock(sender()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiting.is_finished());

    // the first holder broadcasts before releasing
    store
        .push(record_with(7, TransactionStatus::Submitted))
        .await
        .unwrap();
    first.release();

    let second = waiting.await.unwrap().unwrap();
    assert_eq!(second.next_nonce, U256::from(8));
}

#[tokio::test]
async fn test_locks_for_different_addresses_do_not_block() {
    let tracker = tracker(provider_with_count(1), vec![]).await;
    let _first = tracker.get_nonce_lock(sender()).await.unwrap();
    let second = tokio::time::timeout(
        Duration::from_secs(1),
        tracker.get_nonce_lock(Address::repeat_byte(0x33)),
    )
    .await
    .expect("lock for another address must not wait");
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_release_is_idempotent_and_drop_releases() {
    let tracker = tracker(provider_with_count(1), vec![]).await;

    let mut lock = tracker.get_nonce_lock(sender()).await.unwrap();
    lock.release();
    lock.release();
    assert!(lock.is_released());

    {
        let _dropped = tracker.get_nonce_lock(sender()).await.unwrap();
    }
    let reacquired =
        tokio::time::timeout(Duration::from_secs(1), tracker.get_nonce_lock(sender())).await;
    assert!(reacquired.is_ok());
}

#[tokio::test]
async fn test_failed_nonce_lookup_does_not_hold_the_lock() {
    let mut provider = MockProvider::new();
    let mut calls = 0;
    provider.expect_get_transaction_count().returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(ChainCommunicationError::Timeout)
        } else {
            Ok(U256::from(3))
        }
    });
    let tracker = tracker(provider, vec![]).await;

    assert!(tracker.get_nonce_lock(sender()).await.is_err());
    let lock = tokio::time::timeout(Duration::from_secs(1), tracker.get_nonce_lock(sender()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lock.next_nonce, U256::from(3));
}

#[tokio::test]
async fn test_highest_continuous_next_nonce_stops_at_first_gap() {
    let records = vec![
        record_with(4, TransactionStatus::Confirmed),
        record_with(5, TransactionStatus::Submitted),
        record_with(6, TransactionStatus::Submitted),
        record_with(8, TransactionStatus::Submitted),
    ];
    let tracker = tracker(provider_with_count(5), records).await;
    let next = tracker
        .get_highest_continuous_next_nonce(sender())
        .await
        .unwrap();
    assert_eq!(next, U256::from(7));
}
