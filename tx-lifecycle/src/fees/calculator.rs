use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ControllerError;
use crate::transaction::MetaType;

use super::types::{FeeData, FeeParams, GasValues, TransactionType};

/// Exact-fraction multiplier applied to fees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    pub numerator: u64,
    pub denominator: u64,
}

impl FeeRate {
    pub fn apply(&self, value: &U256) -> U256 {
        let numerator = U256::from(self.numerator);
        let denominator = U256::from(self.denominator.max(1));
        value.saturating_mul(numerator).div_mod(denominator).0
    }
}

pub const CANCEL_RATE: FeeRate = FeeRate {
    numerator: 3,
    denominator: 2,
};

pub const SPEED_UP_RATE: FeeRate = FeeRate {
    numerator: 11,
    denominator: 10,
};

/// Kind of a same-nonce replacement transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplacementKind {
    Cancel,
    SpeedUp,
}

impl ReplacementKind {
    pub fn rate(&self) -> FeeRate {
        match self {
            ReplacementKind::Cancel => CANCEL_RATE,
            ReplacementKind::SpeedUp => SPEED_UP_RATE,
        }
    }

    /// Tag held by the original record while the replacement is built
    pub fn in_flight_meta_type(&self) -> MetaType {
        match self {
            ReplacementKind::Cancel => MetaType::Cancelling,
            ReplacementKind::SpeedUp => MetaType::SpeedingUp,
        }
    }

    /// Tag carried by the replacement record itself
    pub fn replacement_meta_type(&self) -> MetaType {
        match self {
            ReplacementKind::Cancel => MetaType::Cancel,
            ReplacementKind::SpeedUp => MetaType::SpeedUp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplacementKind::Cancel => "cancel",
            ReplacementKind::SpeedUp => "speed_up",
        }
    }
}

/// Fee-market when both max fee fields are present, legacy otherwise.
pub fn determine_transaction_type(values: &GasValues) -> TransactionType {
    match (values.max_fee_per_gas, values.max_priority_fee_per_gas) {
        (Some(_), Some(_)) => TransactionType::FeeMarket,
        _ => TransactionType::Legacy,
    }
}

/// Resolves the fee values of a new transaction, filling whatever the caller
/// left out from the oracle's suggested levels.
///
/// On a fee-market chain, a legacy-only supply is migrated into both max fee
/// fields and the gas price is dropped.
pub fn fill_fee_params(
    supplied: &GasValues,
    supports_fee_market: bool,
    suggested: &FeeData,
) -> Result<FeeParams, ControllerError> {
    if !supports_fee_market {
        let gas_price = supplied
            .gas_price
            .or(suggested.gas_price)
            .ok_or_else(|| ControllerError::Validation("Unable to determine gas price".into()))?;
        return Ok(FeeParams::Legacy { gas_price });
    }

    let legacy_only = supplied.gas_price.is_some()
        && supplied.max_fee_per_gas.is_none()
        && supplied.max_priority_fee_per_gas.is_none();
    if let (true, Some(gas_price)) = (legacy_only, supplied.gas_price) {
        debug!(
            ?gas_price,
            "Migrating legacy gas price to fee-market values"
        );
        return Ok(FeeParams::FeeMarket {
            max_fee_per_gas: gas_price,
            max_priority_fee_per_gas: gas_price,
        });
    }

    let filled = GasValues {
        gas_price: None,
        max_fee_per_gas: supplied.max_fee_per_gas.or(suggested.max_fee_per_gas),
        max_priority_fee_per_gas: supplied
            .max_priority_fee_per_gas
            .or(suggested.max_priority_fee_per_gas),
    };
    match (filled.max_fee_per_gas, filled.max_priority_fee_per_gas) {
        (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) => Ok(FeeParams::FeeMarket {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }),
        _ => match suggested.gas_price {
            // the oracle has no fee-market levels for this chain yet
            Some(gas_price) => Ok(FeeParams::FeeMarket {
                max_fee_per_gas: gas_price,
                max_priority_fee_per_gas: gas_price,
            }),
            None => Err(ControllerError::Validation(
                "Unable to determine fee-market values".into(),
            )),
        },
    }
}

/// Lowest fee a replacement of `current` must pay: the current fee scaled by
/// the kind's rate, floored at the network's fast tier.
pub fn minimum_replacement_fee(
    kind: ReplacementKind,
    current: &FeeParams,
    fast: &FeeData,
) -> FeeParams {
    let rate = kind.rate();
    let floor = |scaled: U256, fast_value: Option<U256>| match fast_value {
        Some(fast_value) => scaled.max(fast_value),
        None => scaled,
    };

    match current {
        FeeParams::Legacy { gas_price } => FeeParams::Legacy {
            gas_price: floor(rate.apply(gas_price), fast.gas_price),
        },
        FeeParams::FeeMarket {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => FeeParams::FeeMarket {
            max_fee_per_gas: floor(rate.apply(max_fee_per_gas), fast.max_fee_per_gas),
            max_priority_fee_per_gas: floor(
                rate.apply(max_priority_fee_per_gas),
                fast.max_priority_fee_per_gas,
            ),
        },
    }
}

/// Validates caller supplied replacement fees.
pub(crate) fn validate_explicit_fees(values: &GasValues) -> Result<FeeParams, ControllerError> {
    let has_fee_market_field =
        values.max_fee_per_gas.is_some() || values.max_priority_fee_per_gas.is_some();
    if !has_fee_market_field {
        return values
            .gas_price
            .map(|gas_price| FeeParams::Legacy { gas_price })
            .ok_or_else(|| ControllerError::Validation("gasPrice is required".into()));
    }
    if values.gas_price.is_some() {
        return Err(ControllerError::Validation(
            "gasPrice cannot be combined with fee-market values".into(),
        ));
    }
    match (values.max_fee_per_gas, values.max_priority_fee_per_gas) {
        (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) => {
            if max_priority_fee_per_gas > max_fee_per_gas {
                return Err(ControllerError::Validation(
                    "maxPriorityFeePerGas cannot exceed maxFeePerGas".into(),
                ));
            }
            Ok(FeeParams::FeeMarket {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            })
        }
        _ => Err(ControllerError::Validation(
            "maxFeePerGas and maxPriorityFeePerGas are both required".into(),
        )),
    }
}

/// Fees of a replacement. Explicit values win when they match the original's
/// fee model, otherwise the minimum replacement fee applies.
pub(crate) fn replacement_fee(
    kind: ReplacementKind,
    current: &FeeParams,
    explicit: Option<FeeParams>,
    fast: &FeeData,
) -> FeeParams {
    let minimum = minimum_replacement_fee(kind, current, fast);
    match explicit {
        None => minimum,
        Some(explicit) if explicit.transaction_type() == current.transaction_type() => explicit,
        Some(explicit) => {
            warn!(
                ?explicit,
                ?current,
                "Explicit replacement fees do not match the original fee model, using minimum"
            );
            minimum
        }
    }
}
