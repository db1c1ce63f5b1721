//! # Error Types
//!
//! Error taxonomy for smart contract execution, split by layer: the five
//! VM-frame exceptions (all cause full-frame revert and full-gas-consumption),
//! and precompile failures (which never propagate as VM-frame exceptions —
//! they surface as a failed call, i.e. `0` on the caller's stack).

use thiserror::Error;

/// Errors that cause a VM frame to halt exceptionally: the whole frame's
/// state changes are reverted, output is discarded, and all remaining gas
/// for that frame is consumed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Remaining gas was less than the computed cost of the current instruction.
    #[error("insufficient gas")]
    InsufficientGas,

    /// The opcode byte at `pc` has no mapping in the instruction table.
    #[error("invalid instruction: 0x{0:02x}")]
    InvalidInstruction(u8),

    /// Fewer items on the stack than the current instruction requires.
    #[error("stack underflow")]
    StackUnderflow,

    /// The current instruction would push the stack past 1024 items.
    #[error("stack overflow")]
    StackOverflow,

    /// `JUMP`/`JUMPI` targeted a byte outside the code's valid-jump-destination set.
    #[error("invalid jump destination: {0}")]
    InvalidJumpDestination(usize),

    /// A precompiled contract's input or computation failed.
    #[error(transparent)]
    Precompile(#[from] PrecompileError),

    /// The backing state store faulted (trie corruption, I/O error) while
    /// the frame was running. Distinct from the five VM-frame exceptions
    /// above: those are ordinary, expected outcomes of running untrusted
    /// bytecode, while this one means the node's own data is broken.
    #[error("state fault: {0}")]
    StateFault(String),

    /// A read-only call (`eth_call`-style) completed without reaching
    /// success. Not itself a frame exception: it carries the decoded
    /// revert reason of an already-finished `ExecutionResult`, used only
    /// at the `SmartContractApi::call` boundary.
    #[error("execution reverted{}", .0.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted(Option<String>),
}

/// Errors from precompiled contract execution. These never escape as a
/// `VmError` exception on their own terms; the calling `CALL`/`CALLCODE`/
/// `DELEGATECALL` handler treats any `PrecompileError` as an ordinary call
/// failure (pushes `0`), consistent with "precompile input malformed" being
/// a call failure rather than a VM-frame exception.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrecompileError {
    /// Input bytes didn't match what the precompile expects.
    #[error("invalid input length: expected {expected}, got {actual}")]
    InvalidInputLength {
        /// Length the precompile expects.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Input bytes were the right length but malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Gas supplied to the call was less than the precompile's fixed cost.
    #[error("precompile out of gas")]
    OutOfGas,

    /// The underlying cryptographic primitive rejected the input (e.g. `ecrecover`
    /// given a non-canonical signature).
    #[error("crypto error: {0}")]
    CryptoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_error_display() {
        assert_eq!(VmError::InsufficientGas.to_string(), "insufficient gas");
        assert_eq!(
            VmError::InvalidInstruction(0xfe).to_string(),
            "invalid instruction: 0xfe"
        );
        assert_eq!(
            VmError::InvalidJumpDestination(42).to_string(),
            "invalid jump destination: 42"
        );
    }

    #[test]
    fn test_precompile_error_converts_into_vm_error() {
        let err: VmError = PrecompileError::OutOfGas.into();
        assert!(matches!(err, VmError::Precompile(PrecompileError::OutOfGas)));
    }

    #[test]
    fn test_reverted_display_with_and_without_reason() {
        assert_eq!(VmError::Reverted(None).to_string(), "execution reverted");
        assert_eq!(
            VmError::Reverted(Some("insufficient balance".to_string())).to_string(),
            "execution reverted: insufficient balance"
        );
    }
}
