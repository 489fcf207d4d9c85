use ethers_core::types::U256;
use serde::{Deserialize, Serialize};

use super::approval::APPROVE_FALLBACK_GAS_LIMIT;
use super::params::TransactionParams;

const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
const TRANSFER_FROM_SELECTOR: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionCategory {
    SentEther,
    ContractInteraction,
    ContractDeployment,
    TokenMethodApprove,
    TokenMethodTransfer,
    TokenMethodTransferFrom,
    /// deposit into the wallet's privacy protocol
    ProtocolDeposit,
}

impl TransactionCategory {
    /// Gas limit used when the node cannot estimate this category
    pub fn fallback_gas_limit(&self) -> Option<U256> {
        match self {
            TransactionCategory::TokenMethodApprove => Some(U256::from(APPROVE_FALLBACK_GAS_LIMIT)),
            _ => None,
        }
    }
}

/// Category derivable from the params alone. `None` means it depends on
/// whether the destination holds code.
pub fn resolve_preset_category(params: &TransactionParams) -> Option<TransactionCategory> {
    params.data.as_ref()?;
    if params.to.is_none() {
        return Some(TransactionCategory::ContractDeployment);
    }
    match params.selector()? {
        APPROVE_SELECTOR => Some(TransactionCategory::TokenMethodApprove),
        TRANSFER_SELECTOR => Some(TransactionCategory::TokenMethodTransfer),
        TRANSFER_FROM_SELECTOR => Some(TransactionCategory::TokenMethodTransferFrom),
        _ => None,
    }
}

/// Decoded method signature, e.g. `transfer(address,uint256)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub args: Vec<String>,
}

impl MethodSignature {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let open = text.find('(')?;
        let inner = text.get(open.saturating_add(1)..)?.strip_suffix(')')?;
        let name = text.get(..open)?.trim();
        if name.is_empty() {
            return None;
        }
        let args = inner
            .split(',')
            .map(str::trim)
            .filter(|arg| !arg.is_empty())
            .map(str::to_string)
            .collect();
        Some(Self {
            name: name.to_string(),
            args,
        })
    }
}
