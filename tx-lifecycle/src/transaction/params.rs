use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{
    Address, Bytes, Eip1559TransactionRequest, TransactionRequest, H256, U256, U64,
};
use serde::{Deserialize, Serialize};

use crate::error::ControllerError;
use crate::fees::{FeeParams, GasValues};

/// Transaction intent as submitted by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionIntent {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
    pub nonce: Option<U256>,
    pub gas_limit: Option<U256>,
    #[serde(flatten)]
    pub gas: GasValues,
}

/// Normalized transaction parameters of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionParams {
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Option<Bytes>,
    pub nonce: Option<U256>,
    pub gas_limit: Option<U256>,
    pub fees: Option<FeeParams>,
    pub chain_id: u64,
    pub hash: Option<H256>,
}

impl TransactionParams {
    /// Builds params from a caller's intent. Fees are resolved later, against
    /// the chain's fee model.
    pub fn from_intent(intent: &TransactionIntent, from: Address, chain_id: u64) -> Self {
        Self {
            from,
            to: intent.to,
            value: intent.value.unwrap_or_default(),
            data: intent.data.clone(),
            nonce: intent.nonce,
            gas_limit: intent.gas_limit,
            fees: None,
            chain_id,
            hash: None,
        }
        .normalized()
    }

    pub fn normalized(mut self) -> Self {
        if self.data.as_ref().map(|d| d.is_empty()).unwrap_or(false) {
            self.data = None;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.from.is_zero() {
            return Err(ControllerError::Validation(
                "\"from\" must be a non-zero address".into(),
            ));
        }
        if self.to.is_none() && self.data.is_none() {
            return Err(ControllerError::Validation(
                "contract deployment requires data".into(),
            ));
        }
        if self.gas_limit.map(|g| g.is_zero()).unwrap_or(false) {
            return Err(ControllerError::Validation(
                "gas limit must be positive".into(),
            ));
        }
        Ok(())
    }

    /// 4-byte call data selector
    pub fn selector(&self) -> Option<[u8; 4]> {
        let data = self.data.as_ref()?;
        let bytes = data.get(..4)?;
        let mut selector = [0u8; 4];
        selector.copy_from_slice(bytes);
        Some(selector)
    }

    pub fn gas_values(&self) -> GasValues {
        self.fees.map(GasValues::from).unwrap_or_default()
    }

    /// Unsigned transaction in the shape of its fee model
    pub fn to_typed_transaction(&self) -> TypedTransaction {
        let chain_id = Some(U64::from(self.chain_id));
        match self.fees {
            Some(FeeParams::FeeMarket {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            }) => TypedTransaction::Eip1559(Eip1559TransactionRequest {
                from: Some(self.from),
                to: self.to.map(Into::into),
                gas: self.gas_limit,
                value: Some(self.value),
                data: self.data.clone(),
                nonce: self.nonce,
                max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
                max_fee_per_gas: Some(max_fee_per_gas),
                chain_id,
                ..Default::default()
            }),
            legacy => TypedTransaction::Legacy(TransactionRequest {
                from: Some(self.from),
                to: self.to.map(Into::into),
                gas: self.gas_limit,
                gas_price: legacy.map(|fees| fees.max_price_per_gas()),
                value: Some(self.value),
                data: self.data.clone(),
                nonce: self.nonce,
                chain_id,
                ..Default::default()
            }),
        }
    }
}
