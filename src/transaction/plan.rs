//! Declarative instruction ordering
//!
//! Each step names the on-chain preconditions it depends on. A plan is valid
//! when every step's requirements appear before it, pairwise ordering
//! constraints hold, and nothing follows a terminal step.

use crate::error::{CustodyError, Result};
use solana_sdk::instruction::Instruction;
use std::fmt;

/// A named instruction slot within a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    NativeTransfer,
    CreateMintAccount,
    InitializeMetadataPointer,
    InitializeMint,
    InitializeMetadata,
    CreateHoldingAccount,
    MintOne,
    RevokeMintAuthority,
    CreateReceiverHoldingAccount,
    TransferOne,
}

impl Step {
    /// Steps that must already have executed
    pub fn requires(self) -> &'static [Step] {
        match self {
            Step::InitializeMetadataPointer => &[Step::CreateMintAccount],
            // extensions are initialized before the mint itself
            Step::InitializeMint => &[Step::CreateMintAccount, Step::InitializeMetadataPointer],
            Step::InitializeMetadata => &[Step::InitializeMint],
            Step::CreateHoldingAccount => &[Step::InitializeMint],
            Step::MintOne => &[Step::InitializeMint, Step::CreateHoldingAccount],
            Step::RevokeMintAuthority => &[Step::InitializeMint, Step::MintOne],
            _ => &[],
        }
    }

    /// Steps that must come after this one when both are present
    pub fn precedes(self) -> &'static [Step] {
        match self {
            Step::CreateReceiverHoldingAccount => &[Step::TransferOne],
            _ => &[],
        }
    }

    /// Nothing may follow a terminal step
    pub fn is_terminal(self) -> bool {
        matches!(self, Step::RevokeMintAuthority)
    }

    pub fn name(self) -> &'static str {
        match self {
            Step::NativeTransfer => "native transfer",
            Step::CreateMintAccount => "create mint account",
            Step::InitializeMetadataPointer => "initialize metadata pointer",
            Step::InitializeMint => "initialize mint",
            Step::InitializeMetadata => "initialize metadata",
            Step::CreateHoldingAccount => "create holding account",
            Step::MintOne => "mint one unit",
            Step::RevokeMintAuthority => "revoke mint authority",
            Step::CreateReceiverHoldingAccount => "create receiver holding account",
            Step::TransferOne => "transfer one unit",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct PlannedInstruction {
    pub step: Step,
    pub instruction: Instruction,
}

/// Ordered instructions for one transaction
#[derive(Debug, Clone, Default)]
pub struct TransactionPlan {
    entries: Vec<PlannedInstruction>,
}

impl TransactionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Step, instruction: Instruction) -> &mut Self {
        self.entries.push(PlannedInstruction { step, instruction });
        self
    }

    pub fn steps(&self) -> Vec<Step> {
        self.entries.iter().map(|e| e.step).collect()
    }

    pub fn entries(&self) -> &[PlannedInstruction] {
        &self.entries
    }

    pub fn instructions(&self) -> Vec<Instruction> {
        self.entries.iter().map(|e| e.instruction.clone()).collect()
    }

    /// Check ordering constraints without touching the network
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(CustodyError::build("transaction has no instructions"));
        }

        let steps = self.steps();
        for (index, step) in steps.iter().enumerate() {
            let earlier = &steps[..index];
            let later = &steps[index + 1..];

            if let Some(missing) = step.requires().iter().find(|r| !earlier.contains(r)) {
                return Err(CustodyError::build(format!(
                    "'{}' requires '{}' to run first",
                    step, missing
                )));
            }

            if let Some(before) = step.precedes().iter().find(|p| earlier.contains(p)) {
                return Err(CustodyError::build(format!(
                    "'{}' must come before '{}'",
                    step, before
                )));
            }

            if step.is_terminal() && !later.is_empty() {
                return Err(CustodyError::build(format!("'{}' must be the last instruction", step)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn ix() -> Instruction {
        Instruction::new_with_bytes(Pubkey::new_unique(), &[], vec![])
    }

    fn plan(steps: &[Step]) -> TransactionPlan {
        let mut plan = TransactionPlan::new();
        for step in steps {
            plan.push(*step, ix());
        }
        plan
    }

    const MINT_ORDER: [Step; 7] = [
        Step::CreateMintAccount,
        Step::InitializeMetadataPointer,
        Step::InitializeMint,
        Step::InitializeMetadata,
        Step::CreateHoldingAccount,
        Step::MintOne,
        Step::RevokeMintAuthority,
    ];

    #[test]
    fn test_mint_order_is_valid() {
        assert!(plan(&MINT_ORDER).validate().is_ok());
    }

    #[test]
    fn test_holding_account_may_precede_metadata() {
        let steps = [
            Step::CreateMintAccount,
            Step::InitializeMetadataPointer,
            Step::InitializeMint,
            Step::CreateHoldingAccount,
            Step::InitializeMetadata,
            Step::MintOne,
            Step::RevokeMintAuthority,
        ];
        assert!(plan(&steps).validate().is_ok());
    }

    #[test]
    fn test_mint_before_pointer_is_rejected() {
        let steps = [
            Step::CreateMintAccount,
            Step::InitializeMint,
            Step::InitializeMetadataPointer,
        ];
        assert!(matches!(plan(&steps).validate(), Err(CustodyError::BuildFailure(_))));
    }

    #[test]
    fn test_nothing_after_authority_revocation() {
        let mut steps = MINT_ORDER.to_vec();
        steps.push(Step::MintOne);
        let err = plan(&steps).validate().unwrap_err();
        assert!(err.to_string().contains("last instruction"));
    }

    #[test]
    fn test_every_single_swap_of_mint_order_is_rejected() {
        for i in 0..MINT_ORDER.len() - 1 {
            let mut steps = MINT_ORDER;
            steps.swap(i, i + 1);
            // metadata and holding account creation are independent of each other
            if steps[i] == Step::CreateHoldingAccount && steps[i + 1] == Step::InitializeMetadata {
                continue;
            }
            assert!(plan(&steps).validate().is_err(), "swap at {} accepted", i);
        }
    }

    #[test]
    fn test_receiver_account_must_precede_transfer() {
        assert!(plan(&[Step::CreateReceiverHoldingAccount, Step::TransferOne]).validate().is_ok());
        assert!(plan(&[Step::TransferOne]).validate().is_ok());
        assert!(plan(&[Step::TransferOne, Step::CreateReceiverHoldingAccount]).validate().is_err());
    }

    #[test]
    fn test_empty_plan_is_rejected() {
        assert!(TransactionPlan::new().validate().is_err());
    }
}
