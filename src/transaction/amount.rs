//! SOL display amounts to lamports

use crate::error::{CustodyError, Result};
use crate::types::SOL_DECIMALS;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a user-supplied SOL amount into lamports, truncating toward zero.
pub fn parse_sol_amount(amount: &str) -> Result<u64> {
    let trimmed = amount.trim();
    let sol = Decimal::from_str(&drop_sub_lamport_digits(trimmed)?)
        .map_err(|_| CustodyError::InvalidInput(format!("'{}' is not a number", trimmed)))?;

    if sol.is_sign_negative() {
        return Err(CustodyError::InvalidInput("amount must be positive".to_string()));
    }

    let lamports = sol
        .checked_mul(Decimal::from(10u64.pow(SOL_DECIMALS)))
        .map(|d| d.trunc())
        .and_then(|d| d.to_u64())
        .ok_or_else(|| CustodyError::InvalidInput(format!("amount '{}' is too large", trimmed)))?;

    if lamports == 0 {
        return Err(CustodyError::InvalidInput(
            "amount is smaller than one lamport".to_string(),
        ));
    }

    Ok(lamports)
}

/// Cut the fraction to lamport precision before parsing, since `Decimal`
/// rounds inputs longer than its 28 significant digits.
fn drop_sub_lamport_digits(amount: &str) -> Result<String> {
    let Some((whole, fraction)) = amount.split_once('.') else {
        return Ok(amount.to_string());
    };

    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CustodyError::InvalidInput(format!("'{}' is not a number", amount)));
    }

    let kept = &fraction[..fraction.len().min(SOL_DECIMALS as usize)];
    if kept.is_empty() {
        return Ok(whole.to_string());
    }
    Ok(format!("{}.{}", whole, kept))
}
