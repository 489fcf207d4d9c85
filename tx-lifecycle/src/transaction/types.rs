use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDate, Utc};
use ethers_core::types::{Address, Bytes, TransactionReceipt, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::approval::ApprovalData;
use super::category::{MethodSignature, TransactionCategory};
use super::params::TransactionParams;

/// Unique transaction identifier. Used as the primary key of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// created, waiting for the user's decision
    #[default]
    Unapproved,
    /// approved by the user, nonce assigned
    Approved,
    /// signed, raw bytes available
    Signed,
    /// accepted by the node, pending inclusion
    Submitted,
    /// mined successfully
    Confirmed,
    /// reverted, or failed before reaching the chain
    Failed,
    /// never mined, or replaced by another transaction with the same nonce
    Dropped,
    /// replaced by a confirmed cancellation
    Cancelled,
    /// declined by the user before broadcast
    Rejected,
}

impl TransactionStatus {
    /// No lifecycle transition leaves a final status
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Confirmed
                | TransactionStatus::Failed
                | TransactionStatus::Dropped
                | TransactionStatus::Cancelled
                | TransactionStatus::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Unapproved => "unapproved",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Signed => "signed",
            TransactionStatus::Submitted => "submitted",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Dropped => "dropped",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Rejected => "rejected",
        }
    }
}

/// Replacement lineage of a record
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetaType {
    #[default]
    Regular,
    /// a cancellation of this record is being built
    Cancelling,
    /// a speed-up of this record is being built
    SpeedingUp,
    Cancel,
    SpeedUp,
}

/// Who requested the transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    /// the wallet itself
    Internal,
    /// an external site or application
    External(String),
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Internal => write!(f, "internal"),
            Origin::External(origin) => write!(f, "{origin}"),
        }
    }
}

/// Full lifecycle metadata of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub chain_id: u64,
    pub origin: Origin,
    /// caller supplied correlation id of the originating request
    pub origin_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub params: TransactionParams,
    pub status: TransactionStatus,
    pub category: Option<TransactionCategory>,
    pub method_signature: Option<MethodSignature>,
    pub meta_type: MetaType,
    pub raw_transaction: Option<Bytes>,
    pub receipt: Option<TransactionReceipt>,
    pub verified_on_blockchain: bool,
    /// consecutive polls without finding the transaction on chain
    pub blocks_drop_count: u32,
    pub error: Option<String>,
    pub gas_estimation_failed: bool,
    /// broadcast through the private relay instead of the public mempool
    pub private_relay: bool,
    pub approval: Option<ApprovalData>,
}

impl TransactionRecord {
    pub fn new(chain_id: u64, origin: Origin, params: TransactionParams) -> Self {
        Self {
            id: TransactionId::random(),
            chain_id,
            origin,
            origin_id: None,
            created_at: Utc::now(),
            submitted_at: None,
            confirmed_at: None,
            params,
            status: TransactionStatus::Unapproved,
            category: None,
            method_signature: None,
            meta_type: MetaType::Regular,
            raw_transaction: None,
            receipt: None,
            verified_on_blockchain: false,
            blocks_drop_count: 0,
            error: None,
            gas_estimation_failed: false,
            private_relay: false,
            approval: None,
        }
    }

    pub fn from(&self) -> Address {
        self.params.from
    }

    pub fn nonce(&self) -> Option<U256> {
        self.params.nonce
    }

    pub fn is_deposit(&self) -> bool {
        self.category == Some(TransactionCategory::ProtocolDeposit)
    }

    /// Whether `other` claims the same nonce of the same account on the same chain
    pub fn shares_nonce_with(&self, other: &TransactionRecord) -> bool {
        self.params.nonce.is_some()
            && self.params.nonce == other.params.nonce
            && self.params.from == other.params.from
            && self.chain_id == other.chain_id
    }

    /// Trimming group key: records sharing it are kept or evicted together
    pub fn trim_group(&self) -> (Option<U256>, u64, NaiveDate) {
        (self.params.nonce, self.chain_id, self.created_at.date_naive())
    }
}
