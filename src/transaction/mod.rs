//! Transaction construction
//!
//! Instruction sequences are expressed as ordered plans whose preconditions
//! can be checked without a network.

mod amount;
mod builder;
mod plan;

pub use amount::parse_sol_amount;
pub use builder::{
    parse_address, BuiltTransaction, NativeTransferDraft, NftMetadata, NftMintDraft,
    NftTransferDraft, OperationKind, TransactionBuilder, MAX_NAME_LEN, MAX_SYMBOL_LEN,
    MAX_URI_LEN,
};
pub use plan::{PlannedInstruction, Step, TransactionPlan};
