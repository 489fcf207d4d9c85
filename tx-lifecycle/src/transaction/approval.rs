use ethers_core::abi::{self, ParamType, Token};
use ethers_core::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::ControllerError;

/// Gas limit for `approve` calls whose estimation failed
pub const APPROVE_FALLBACK_GAS_LIMIT: u64 = 0xcb34;

/// Decoded arguments of a token `approve` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalData {
    pub spender: Address,
    pub allowance: U256,
    pub decimals: Option<u8>,
}

/// Decodes `approve(address,uint256)` call data.
pub fn decode_approve_call(data: &Bytes) -> Result<(Address, U256), ControllerError> {
    let args = data
        .get(4..)
        .ok_or_else(|| ControllerError::Validation("approve call data too short".into()))?;
    let tokens = abi::decode(&[ParamType::Address, ParamType::Uint(256)], args)
        .map_err(|err| ControllerError::Validation(format!("invalid approve call data: {err}")))?;
    match tokens.as_slice() {
        [Token::Address(spender), Token::Uint(allowance)] => Ok((*spender, *allowance)),
        _ => Err(ControllerError::Validation(
            "invalid approve call data".into(),
        )),
    }
}

/// Re-encodes `approve` call data keeping the selector of `data`.
pub fn encode_approve_call(
    data: &Bytes,
    spender: Address,
    allowance: U256,
) -> Result<Bytes, ControllerError> {
    let selector = data
        .get(..4)
        .ok_or_else(|| ControllerError::Validation("approve call data too short".into()))?;
    let mut encoded = selector.to_vec();
    encoded.extend(abi::encode(&[Token::Address(spender), Token::Uint(allowance)]));
    Ok(encoded.into())
}
