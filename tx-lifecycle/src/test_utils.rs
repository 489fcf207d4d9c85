use std::sync::Arc;

use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{
    Address, Bytes, Signature, Transaction, TransactionReceipt, H256, U256,
};

use crate::controller::{Collaborators, TransactionController};
use crate::fees::FeeData;
use crate::metrics::ControllerMetrics;
use crate::provider::{
    AccountPermissions, ChainProvider, ChainResult, FeeOracle, NetworkInfo, RelayStatusApi,
    RelayTxStatus, SignatureRegistry, TokenRegistry, TransactionSigner,
};
use crate::settings::ControllerSettings;
use crate::store::{InMemoryStateDb, TransactionStore};
use crate::transaction::{Origin, TransactionParams, TransactionRecord, TransactionStatus};

pub const CHAIN_ID: u64 = 5;

mockall::mock! {
    pub Provider {}

    #[async_trait]
    impl ChainProvider for Provider {
        async fn estimate_gas(&self, tx: &TypedTransaction) -> ChainResult<U256>;

        async fn get_transaction(&self, hash: H256) -> ChainResult<Option<Transaction>>;

        async fn get_transaction_receipt(&self, hash: H256) -> ChainResult<Option<TransactionReceipt>>;

        async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<H256>;

        async fn get_transaction_count(&self, address: Address) -> ChainResult<U256>;

        async fn get_code(&self, address: Address) -> ChainResult<Bytes>;
    }
}

mockall::mock! {
    pub Signer {}

    #[async_trait]
    impl TransactionSigner for Signer {
        async fn sign_transaction(
            &self,
            tx: &TypedTransaction,
            from: Address,
        ) -> eyre::Result<Signature>;
    }
}

mockall::mock! {
    pub Registry {}

    #[async_trait]
    impl SignatureRegistry for Registry {
        async fn lookup(&self, selector: [u8; 4]) -> ChainResult<Option<String>>;
    }
}

mockall::mock! {
    pub Tokens {}

    #[async_trait]
    impl TokenRegistry for Tokens {
        async fn token_decimals(&self, chain_id: u64, token: Address) -> ChainResult<Option<u8>>;
    }
}

mockall::mock! {
    pub Relay {}

    #[async_trait]
    impl RelayStatusApi for Relay {
        async fn transaction_status(&self, hash: H256) -> ChainResult<RelayTxStatus>;
    }
}

#[derive(Debug, Clone)]
pub struct TestNetwork {
    pub chain_id: u64,
    pub fee_market: bool,
    pub custom: bool,
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self {
            chain_id: CHAIN_ID,
            fee_market: false,
            custom: false,
        }
    }
}

#[async_trait]
impl NetworkInfo for TestNetwork {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn supports_fee_market(&self, _chain_id: u64) -> ChainResult<bool> {
        Ok(self.fee_market)
    }

    fn is_custom_network(&self, _chain_id: u64) -> bool {
        self.custom
    }
}

#[derive(Debug, Clone)]
pub struct TestFeeOracle {
    pub fee_data: FeeData,
    pub fast: FeeData,
    pub block_gas_limit: U256,
}

impl Default for TestFeeOracle {
    fn default() -> Self {
        Self {
            fee_data: FeeData {
                gas_price: Some(100.into()),
                max_fee_per_gas: Some(200.into()),
                max_priority_fee_per_gas: Some(2.into()),
            },
            fast: FeeData {
                gas_price: Some(120.into()),
                max_fee_per_gas: Some(240.into()),
                max_priority_fee_per_gas: Some(3.into()),
            },
            block_gas_limit: 30_000_000.into(),
        }
    }
}

impl FeeOracle for TestFeeOracle {
    fn fee_data(&self, _chain_id: u64) -> FeeData {
        self.fee_data
    }

    fn fast_fee_data(&self, _chain_id: u64) -> FeeData {
        self.fast
    }

    fn block_gas_limit(&self, _chain_id: u64) -> U256 {
        self.block_gas_limit
    }
}

#[derive(Debug, Clone)]
pub struct TestAccounts {
    pub selected: Address,
    pub permitted: Vec<(String, Address)>,
}

impl AccountPermissions for TestAccounts {
    fn selected_address(&self) -> Address {
        self.selected
    }

    fn has_permission(&self, origin: &str, account: Address) -> bool {
        self.permitted
            .iter()
            .any(|(o, a)| o == origin && *a == account)
    }
}

pub fn sender() -> Address {
    Address::repeat_byte(0x11)
}

pub fn recipient() -> Address {
    Address::repeat_byte(0x22)
}

pub fn valid_signature() -> Signature {
    Signature {
        r: U256::from(1),
        s: U256::from(2),
        v: 27,
    }
}

pub fn record_with(nonce: u64, status: TransactionStatus) -> TransactionRecord {
    let params = TransactionParams {
        from: sender(),
        to: Some(recipient()),
        value: U256::one(),
        data: None,
        nonce: Some(nonce.into()),
        gas_limit: Some(21_000.into()),
        fees: Some(crate::fees::FeeParams::Legacy {
            gas_price: 100.into(),
        }),
        chain_id: CHAIN_ID,
        hash: Some(H256::from_low_u64_be(nonce.saturating_add(1))),
    };
    let mut record = TransactionRecord::new(CHAIN_ID, Origin::Internal, params);
    record.status = status;
    record
}

pub async fn store_with(records: Vec<TransactionRecord>) -> Arc<TransactionStore> {
    let db = Arc::new(InMemoryStateDb::with_transactions(records));
    Arc::new(TransactionStore::load(db, 40).await.unwrap())
}

/// Collaborators of a controller under test, built with [`Harness::build`]
pub struct Harness {
    pub provider: MockProvider,
    pub signer: MockSigner,
    pub registry: MockRegistry,
    pub tokens: MockTokens,
    pub relay: Option<MockRelay>,
    pub network: TestNetwork,
    pub fee_oracle: TestFeeOracle,
    pub accounts: TestAccounts,
    pub records: Vec<TransactionRecord>,
    pub settings: ControllerSettings,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            provider: MockProvider::new(),
            signer: MockSigner::new(),
            registry: MockRegistry::new(),
            tokens: MockTokens::new(),
            relay: None,
            network: TestNetwork::default(),
            fee_oracle: TestFeeOracle::default(),
            accounts: TestAccounts {
                selected: sender(),
                permitted: vec![("https://dapp.example".to_owned(), sender())],
            },
            records: vec![],
            settings: ControllerSettings {
                relay_status_url: None,
                ..Default::default()
            },
        }
    }
}

impl Harness {
    pub fn with_records(records: Vec<TransactionRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub async fn build(self) -> TransactionController {
        let collaborators = Collaborators {
            provider: Arc::new(self.provider),
            relay_provider: None,
            relay_status: self
                .relay
                .map(|relay| Arc::new(relay) as Arc<dyn RelayStatusApi>),
            signer: Arc::new(self.signer),
            fee_oracle: Arc::new(self.fee_oracle),
            network: Arc::new(self.network),
            accounts: Arc::new(self.accounts),
            signature_registry: Arc::new(self.registry),
            token_registry: Arc::new(self.tokens),
            state_db: Arc::new(InMemoryStateDb::with_transactions(self.records)),
        };
        TransactionController::new(
            collaborators,
            self.settings,
            ControllerMetrics::dummy_instance(),
        )
        .await
        .unwrap()
    }
}

pub fn mined_transaction(block_number: u64) -> Transaction {
    Transaction {
        block_number: Some(block_number.into()),
        ..Default::default()
    }
}

pub fn receipt(block_number: u64, success: bool) -> TransactionReceipt {
    TransactionReceipt {
        block_number: Some(block_number.into()),
        status: Some(u64::from(success).into()),
        ..Default::default()
    }
}
