//! # Ecrecover Precompile (0x01)
//!
//! Recovers the signer address from an ECDSA signature.
//!
//! Input format (128 bytes):
//! - bytes 0-31: message hash
//! - bytes 32-63: v (recovery id, should be 27 or 28)
//! - bytes 64-95: r
//! - bytes 96-127: s

use super::{Precompile, PrecompileOutput};
use crate::domain::value_objects::{Address, Bytes};
use crate::errors::PrecompileError;

/// Fixed gas cost for ecrecover.
const ECRECOVER_GAS: u64 = 3000;

/// Ecrecover precompile.
pub struct Ecrecover;

impl Precompile for Ecrecover {
    fn execute(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        if ECRECOVER_GAS > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }

        // Pad input to 128 bytes
        let mut padded = [0u8; 128];
        let len = input.len().min(128);
        padded[..len].copy_from_slice(&input[..len]);

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&padded[0..32]);
        let v = padded[63];
        let mut r = [0u8; 32];
        r.copy_from_slice(&padded[64..96]);
        let mut s = [0u8; 32];
        s.copy_from_slice(&padded[96..128]);

        // Any malformed input (bad v, r/s out of curve order, point not on
        // curve) recovers nothing: the precompile returns empty output, not
        // an error.
        match shared_crypto::ecdsa_recover(&hash, v, &r, &s) {
            Ok(address) => Ok(PrecompileOutput {
                gas_used: ECRECOVER_GAS,
                output: Bytes::from_vec(pad_address(&address)),
            }),
            Err(_) => Ok(PrecompileOutput {
                gas_used: ECRECOVER_GAS,
                output: Bytes::new(),
            }),
        }
    }

    fn address(&self) -> Address {
        let mut addr = [0u8; 20];
        addr[19] = 1;
        Address::new(addr)
    }
}

/// Left-pads a 20-byte address to a 32-byte word, as the precompile's ABI
/// output requires.
fn pad_address(address: &[u8; 20]) -> Vec<u8> {
    let mut out = vec![0u8; 32];
    out[12..].copy_from_slice(address);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecrecover_gas() {
        let precompile = Ecrecover;
        let input = [0u8; 128];
        let result = precompile.execute(&input, 100_000).unwrap();
        assert_eq!(result.gas_used, ECRECOVER_GAS);
    }

    #[test]
    fn test_ecrecover_out_of_gas() {
        let precompile = Ecrecover;
        let input = [0u8; 128];
        let result = precompile.execute(&input, 100);
        assert!(matches!(result, Err(PrecompileError::OutOfGas)));
    }

    #[test]
    fn test_ecrecover_invalid_v() {
        let precompile = Ecrecover;
        let mut input = [0u8; 128];
        input[63] = 30; // Invalid v
        let result = precompile.execute(&input, 100_000).unwrap();
        assert!(result.output.is_empty()); // Returns empty on invalid
    }

    #[test]
    fn test_ecrecover_zero_rs() {
        let precompile = Ecrecover;
        let mut input = [0u8; 128];
        input[63] = 27;
        let result = precompile.execute(&input, 100_000).unwrap();
        assert!(result.output.is_empty());
    }
}
