//! # RIPEMD-160 Precompile (0x03)
//!
//! Computes the RIPEMD-160 hash of the input, left-padded to a 32-byte word.

use super::{Precompile, PrecompileOutput};
use crate::domain::value_objects::{Address, Bytes};
use crate::errors::PrecompileError;
use ripemd::{Digest, Ripemd160};

/// Gas cost per word.
const RIPEMD160_WORD_COST: u64 = 120;
/// Base gas cost.
const RIPEMD160_BASE_COST: u64 = 600;

/// RIPEMD-160 precompile.
pub struct Ripemd160Precompile;

impl Precompile for Ripemd160Precompile {
    fn execute(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let word_size = (input.len() + 31) / 32;
        let gas_cost = RIPEMD160_BASE_COST + RIPEMD160_WORD_COST * word_size as u64;

        if gas_cost > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }

        let digest = Ripemd160::digest(input);
        let mut output = vec![0u8; 32];
        output[12..].copy_from_slice(&digest);

        Ok(PrecompileOutput {
            gas_used: gas_cost,
            output: Bytes::from_vec(output),
        })
    }

    fn address(&self) -> Address {
        let mut addr = [0u8; 20];
        addr[19] = 3;
        Address::new(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ripemd160_empty() {
        let precompile = Ripemd160Precompile;
        let result = precompile.execute(&[], 100_000).unwrap();
        // RIPEMD-160("") = 9c1185a5c5e9fc54612808977ee8f548b2258d31, left-padded
        assert_eq!(result.output.len(), 32);
        assert_eq!(&result.output.as_slice()[0..12], &[0u8; 12]);
        assert_eq!(result.output.as_slice()[12], 0x9c);
    }

    #[test]
    fn test_ripemd160_out_of_gas() {
        let precompile = Ripemd160Precompile;
        let result = precompile.execute(&[0u8; 100], 1);
        assert!(matches!(result, Err(PrecompileError::OutOfGas)));
    }
}
