//! # Precompiled Contracts
//!
//! Ethereum precompiled contracts at addresses `0x01`-`0x04`: ECDSA recover,
//! SHA-256, RIPEMD-160, and identity/data-copy.

pub mod ecrecover;
pub mod identity;
pub mod ripemd160;
pub mod sha256;

use crate::domain::value_objects::{Address, Bytes};
use crate::errors::PrecompileError;

/// Precompile execution result.
pub struct PrecompileOutput {
    /// Gas used by the precompile.
    pub gas_used: u64,
    /// Output data.
    pub output: Bytes,
}

/// Trait for precompiled contracts.
pub trait Precompile: Send + Sync {
    /// Execute the precompile with given input.
    ///
    /// # Errors
    ///
    /// Returns `PrecompileError::OutOfGas` if `gas_limit` is insufficient.
    fn execute(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError>;

    /// Get the address of this precompile.
    fn address(&self) -> Address;
}

/// Executes the precompile at `address`, if any.
///
/// Returns `None` when `address` is not one of the four mapped precompiles;
/// the caller should then treat it as an ordinary (empty-code) account.
#[must_use]
pub fn execute_precompile(
    address: Address,
    input: &[u8],
    gas_limit: u64,
) -> Option<Result<PrecompileOutput, PrecompileError>> {
    if !address.is_precompile() {
        return None;
    }

    let precompile_num = address.as_bytes()[19];

    let result = match precompile_num {
        1 => ecrecover::Ecrecover.execute(input, gas_limit),
        2 => sha256::Sha256Precompile.execute(input, gas_limit),
        3 => ripemd160::Ripemd160Precompile.execute(input, gas_limit),
        4 => identity::Identity.execute(input, gas_limit),
        _ => return None,
    };

    Some(result)
}

// =============================================================================
// TESTS
// =============================================================================
