//! Conversion between decimal token quantities and on-chain base units.
//!
//! Every token quantity crossing the chain boundary is an integer count of base units, one
//! whole token being `10^18` base units.

use alloy_core::primitives::{
    U256,
    utils::{format_units as format_base_units, parse_units as parse_base_units},
};

use crate::OrchestratorError;

/// Number of fractional digits of every token managed by vaultkit.
pub const TOKEN_DECIMALS: u8 = 18;

/// Parse a decimal quantity (`"10000000000000"`, `"1.5"`, `"1_000"`) into base units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, OrchestratorError> {
    let invalid = |reason: String| OrchestratorError::InvalidAmount {
        amount: amount.to_string(),
        reason,
    };

    let normalized: String = amount.trim().chars().filter(|c| *c != '_').collect();
    if normalized.is_empty() {
        return Err(invalid("amount is empty".to_string()));
    }
    if normalized.starts_with('-') {
        return Err(invalid("amount must not be negative".to_string()));
    }
    if let Some((_, fraction)) = normalized.split_once('.') {
        if fraction.len() > decimals as usize {
            return Err(invalid(format!(
                "more than {decimals} fractional digits"
            )));
        }
    }

    let parsed = parse_base_units(&normalized, decimals).map_err(|e| invalid(e.to_string()))?;
    Ok(parsed.get_absolute())
}

/// Parse a decimal quantity of whole tokens into base units.
pub fn parse_token_amount(amount: &str) -> Result<U256, OrchestratorError> {
    parse_units(amount, TOKEN_DECIMALS)
}

/// Render base units as a decimal quantity, without trailing fractional zeros.
pub fn format_units(amount: U256, decimals: u8) -> String {
    match format_base_units(amount, decimals) {
        Ok(formatted) => {
            if formatted.contains('.') {
                formatted
                    .trim_end_matches('0')
                    .trim_end_matches('.')
                    .to_string()
            } else {
                formatted
            }
        }
        Err(_) => amount.to_string(),
    }
}

/// Render base units as a decimal quantity of whole tokens.
pub fn format_token_amount(amount: U256) -> String {
    format_units(amount, TOKEN_DECIMALS)
}
