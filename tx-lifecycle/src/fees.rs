pub use calculator::{
    determine_transaction_type, fill_fee_params, minimum_replacement_fee, FeeRate, ReplacementKind,
    CANCEL_RATE, SPEED_UP_RATE,
};
pub use gas_limit::{apply_gas_limit_policy, fallback_gas_limit, GasEstimation, SEND_GAS_COST};
pub(crate) use calculator::{replacement_fee, validate_explicit_fees};
pub use types::{FeeData, FeeParams, GasValues, TransactionType};

mod calculator;
mod gas_limit;
mod types;

#[cfg(test)]
mod tests;
