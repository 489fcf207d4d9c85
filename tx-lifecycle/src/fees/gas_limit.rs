use ethers_core::types::U256;

/// Intrinsic gas of a plain value transfer
pub const SEND_GAS_COST: u64 = 0x5208;

const MAX_LIMIT_NUMERATOR: u64 = 9;
const MAX_LIMIT_DENOMINATOR: u64 = 10;
const FALLBACK_NUMERATOR: u64 = 19;
const FALLBACK_DENOMINATOR: u64 = 20;
const PADDING_NUMERATOR: u64 = 3;
const PADDING_DENOMINATOR: u64 = 2;

/// Outcome of a gas limit estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimation {
    pub gas_limit: U256,
    pub estimation_succeeded: bool,
}

fn scale(value: &U256, numerator: u64, denominator: u64) -> U256 {
    value
        .saturating_mul(U256::from(numerator))
        .div_mod(U256::from(denominator))
        .0
}

/// Gas limit used when simulation fails: the category's fallback, or 95% of
/// the block gas limit.
pub fn fallback_gas_limit(category_fallback: Option<U256>, block_gas_limit: &U256) -> U256 {
    category_fallback
        .unwrap_or_else(|| scale(block_gas_limit, FALLBACK_NUMERATOR, FALLBACK_DENOMINATOR))
}

/// Turns a node estimate into the gas limit to send with.
pub fn apply_gas_limit_policy(
    estimated: U256,
    block_gas_limit: &U256,
    is_custom_network: bool,
) -> U256 {
    if estimated == U256::from(SEND_GAS_COST) && !is_custom_network {
        return estimated;
    }

    let upper_limit = scale(block_gas_limit, MAX_LIMIT_NUMERATOR, MAX_LIMIT_DENOMINATOR);
    if estimated > upper_limit || is_custom_network {
        return estimated;
    }

    let padded = scale(&estimated, PADDING_NUMERATOR, PADDING_DENOMINATOR);
    padded.min(upper_limit)
}
