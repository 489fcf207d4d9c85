pub use approval::{decode_approve_call, encode_approve_call, ApprovalData, APPROVE_FALLBACK_GAS_LIMIT};
pub use category::{resolve_preset_category, MethodSignature, TransactionCategory};
pub use params::{TransactionIntent, TransactionParams};
pub use types::{MetaType, Origin, TransactionId, TransactionRecord, TransactionStatus};

mod approval;
mod category;
mod params;
mod types;
