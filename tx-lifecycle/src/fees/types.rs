use ethers_core::types::U256;
use serde::{Deserialize, Serialize};

/// Fee model of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionType {
    Legacy,
    FeeMarket,
}

/// Normalized fee values of a transaction. Only one representation can be
/// populated at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeeParams {
    Legacy {
        gas_price: U256,
    },
    FeeMarket {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl FeeParams {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            FeeParams::Legacy { .. } => TransactionType::Legacy,
            FeeParams::FeeMarket { .. } => TransactionType::FeeMarket,
        }
    }

    /// The highest price per gas the transaction may pay
    pub fn max_price_per_gas(&self) -> U256 {
        match self {
            FeeParams::Legacy { gas_price } => *gas_price,
            FeeParams::FeeMarket {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

/// Fee values as supplied by a caller. Any combination of fields may be
/// present until they are resolved into [`FeeParams`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasValues {
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl GasValues {
    pub fn legacy(gas_price: U256) -> Self {
        Self {
            gas_price: Some(gas_price),
            ..Default::default()
        }
    }

    pub fn fee_market(max_fee_per_gas: U256, max_priority_fee_per_gas: U256) -> Self {
        Self {
            gas_price: None,
            max_fee_per_gas: Some(max_fee_per_gas),
            max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gas_price.is_none()
            && self.max_fee_per_gas.is_none()
            && self.max_priority_fee_per_gas.is_none()
    }
}

impl From<FeeParams> for GasValues {
    fn from(fees: FeeParams) -> Self {
        match fees {
            FeeParams::Legacy { gas_price } => GasValues::legacy(gas_price),
            FeeParams::FeeMarket {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => GasValues::fee_market(max_fee_per_gas, max_priority_fee_per_gas),
        }
    }
}

/// Fee levels reported by the fee oracle for one chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeData {
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}
