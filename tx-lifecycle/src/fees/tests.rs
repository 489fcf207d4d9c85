use ethers_core::types::U256;

use crate::error::ControllerError;

use super::*;

fn fast_tier(gas_price: u64) -> FeeData {
    FeeData {
        gas_price: Some(gas_price.into()),
        ..Default::default()
    }
}

#[test]
fn test_determine_transaction_type() {
    assert_eq!(
        determine_transaction_type(&GasValues::fee_market(10.into(), 1.into())),
        TransactionType::FeeMarket
    );
    assert_eq!(
        determine_transaction_type(&GasValues::legacy(10.into())),
        TransactionType::Legacy
    );
    let partial = GasValues {
        max_fee_per_gas: Some(10.into()),
        ..Default::default()
    };
    assert_eq!(determine_transaction_type(&partial), TransactionType::Legacy);
    assert_eq!(
        determine_transaction_type(&GasValues::default()),
        TransactionType::Legacy
    );
}

#[test]
fn test_legacy_values_migrate_on_fee_market_chain() {
    let fees = fill_fee_params(&GasValues::legacy(42.into()), true, &FeeData::default()).unwrap();
    assert_eq!(
        fees,
        FeeParams::FeeMarket {
            max_fee_per_gas: 42.into(),
            max_priority_fee_per_gas: 42.into(),
        }
    );
}

#[test]
fn test_missing_fee_market_values_are_filled_from_oracle() {
    let suggested = FeeData {
        gas_price: Some(5.into()),
        max_fee_per_gas: Some(100.into()),
        max_priority_fee_per_gas: Some(2.into()),
    };
    let supplied = GasValues {
        max_priority_fee_per_gas: Some(3.into()),
        ..Default::default()
    };
    let fees = fill_fee_params(&supplied, true, &suggested).unwrap();
    assert_eq!(
        fees,
        FeeParams::FeeMarket {
            max_fee_per_gas: 100.into(),
            max_priority_fee_per_gas: 3.into(),
        }
    );
}

#[test]
fn test_legacy_chain_fills_gas_price() {
    let fees = fill_fee_params(&GasValues::default(), false, &fast_tier(7)).unwrap();
    assert_eq!(fees, FeeParams::Legacy { gas_price: 7.into() });

    let err = fill_fee_params(&GasValues::default(), false, &FeeData::default()).unwrap_err();
    assert!(matches!(err, ControllerError::Validation(_)));
}

#[test]
fn test_cancel_fee_uses_scaled_price_above_fast_tier() {
    let current = FeeParams::Legacy {
        gas_price: 100.into(),
    };
    let fee = minimum_replacement_fee(ReplacementKind::Cancel, &current, &fast_tier(120));
    assert_eq!(
        fee,
        FeeParams::Legacy {
            gas_price: 150.into()
        }
    );
}

#[test]
fn test_speed_up_fee_is_floored_at_fast_tier() {
    let current = FeeParams::Legacy {
        gas_price: 100.into(),
    };
    let fee = minimum_replacement_fee(ReplacementKind::SpeedUp, &current, &fast_tier(120));
    assert_eq!(
        fee,
        FeeParams::Legacy {
            gas_price: 120.into()
        }
    );
}

#[test]
fn test_fee_market_replacement_scales_each_field() {
    let current = FeeParams::FeeMarket {
        max_fee_per_gas: 1_000.into(),
        max_priority_fee_per_gas: 10.into(),
    };
    let fast = FeeData {
        gas_price: None,
        max_fee_per_gas: Some(900.into()),
        max_priority_fee_per_gas: Some(20.into()),
    };
    let fee = minimum_replacement_fee(ReplacementKind::SpeedUp, &current, &fast);
    assert_eq!(
        fee,
        FeeParams::FeeMarket {
            max_fee_per_gas: 1_100.into(),
            max_priority_fee_per_gas: 20.into(),
        }
    );
}

#[test]
fn test_fee_rate_rounds_down_exactly() {
    // 3/2 of an odd number truncates, no float rounding
    assert_eq!(CANCEL_RATE.apply(&U256::from(101)), U256::from(151));
    assert_eq!(SPEED_UP_RATE.apply(&U256::from(9)), U256::from(9));
    let huge = U256::MAX;
    assert_eq!(CANCEL_RATE.apply(&huge), U256::MAX.div_mod(2.into()).0);
}

#[test]
fn test_explicit_replacement_fees_validation() {
    assert!(validate_explicit_fees(&GasValues::legacy(1.into())).is_ok());
    assert!(validate_explicit_fees(&GasValues::fee_market(2.into(), 1.into())).is_ok());
    assert!(validate_explicit_fees(&GasValues::default()).is_err());
    assert!(validate_explicit_fees(&GasValues {
        max_fee_per_gas: Some(2.into()),
        ..Default::default()
    })
    .is_err());
    assert!(validate_explicit_fees(&GasValues {
        gas_price: Some(1.into()),
        max_fee_per_gas: Some(2.into()),
        max_priority_fee_per_gas: Some(1.into()),
    })
    .is_err());
    assert!(validate_explicit_fees(&GasValues::fee_market(1.into(), 2.into())).is_err());
}

#[test]
fn test_explicit_fees_of_other_model_fall_back_to_minimum() {
    let current = FeeParams::FeeMarket {
        max_fee_per_gas: 100.into(),
        max_priority_fee_per_gas: 10.into(),
    };
    let explicit = FeeParams::Legacy {
        gas_price: 500.into(),
    };
    let fee = replacement_fee(
        ReplacementKind::Cancel,
        &current,
        Some(explicit),
        &FeeData::default(),
    );
    assert_eq!(
        fee,
        FeeParams::FeeMarket {
            max_fee_per_gas: 150.into(),
            max_priority_fee_per_gas: 15.into(),
        }
    );
}

#[test]
fn test_plain_transfer_estimate_is_not_padded() {
    let block_gas_limit = U256::from(30_000_000);
    let limit = apply_gas_limit_policy(SEND_GAS_COST.into(), &block_gas_limit, false);
    assert_eq!(limit, U256::from(0x5208));
}

#[test]
fn test_estimate_is_padded_and_capped() {
    let block_gas_limit = U256::from(1_000_000);
    assert_eq!(
        apply_gas_limit_policy(100_000.into(), &block_gas_limit, false),
        U256::from(150_000)
    );
    // padding would exceed 90% of the block
    assert_eq!(
        apply_gas_limit_policy(800_000.into(), &block_gas_limit, false),
        U256::from(900_000)
    );
    // already above 90% of the block
    assert_eq!(
        apply_gas_limit_policy(950_000.into(), &block_gas_limit, false),
        U256::from(950_000)
    );
}

#[test]
fn test_custom_network_estimate_is_used_as_is() {
    let block_gas_limit = U256::from(1_000_000);
    assert_eq!(
        apply_gas_limit_policy(100_000.into(), &block_gas_limit, true),
        U256::from(100_000)
    );
    assert_eq!(
        apply_gas_limit_policy(SEND_GAS_COST.into(), &block_gas_limit, true),
        U256::from(SEND_GAS_COST)
    );
}

#[test]
fn test_fallback_gas_limit() {
    let block_gas_limit = U256::from(1_000_000);
    assert_eq!(
        fallback_gas_limit(None, &block_gas_limit),
        U256::from(950_000)
    );
    assert_eq!(
        fallback_gas_limit(Some(0xcb34.into()), &block_gas_limit),
        U256::from(0xcb34)
    );
}
