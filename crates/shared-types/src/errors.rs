//! Cross-crate error types: block validity faults and transaction rejection.
//!
//! These sit above [`crate::entities`] because both the block-production
//! crate and the node runtime need to agree on their shape without either
//! depending on the other.

use crate::Hash;
use thiserror::Error;

/// Block-level faults: a block or header fails a structural/consensus
/// check before any transaction in it is executed.
#[derive(Debug, Clone, Error)]
pub enum BlockError {
    /// A block names a parent hash with no corresponding node in the tree.
    #[error("no path to parent block {0:02x?}")]
    NoPath(Hash),

    /// `gas_limit` falls outside the ±1/1024 admissible adjustment window,
    /// or beneath the 125,000 floor.
    #[error("invalid gas limit: {gas_limit} (parent {parent_gas_limit})")]
    InvalidGasLimit {
        /// The candidate block's gas limit.
        gas_limit: u64,
        /// The parent block's gas limit.
        parent_gas_limit: u64,
    },

    /// Recomputing the difficulty formula did not match the block's
    /// declared difficulty.
    #[error("invalid difficulty: declared {declared}, computed {computed}")]
    InvalidDifficulty {
        /// Declared in the header.
        declared: u128,
        /// Value the formula in §5.2 produces.
        computed: u128,
    },

    /// The state root committed after executing all transactions in the
    /// block didn't match the header's declared `state_root`.
    #[error("state root mismatch: declared {declared:02x?}, computed {computed:02x?}")]
    InvalidStateRoot {
        /// Declared in the header.
        declared: Hash,
        /// Root the trie actually produced.
        computed: Hash,
    },
}

/// Pre-execution transaction rejection: the transaction never reaches the
/// interpreter because it fails a check the executor runs first.
#[derive(Debug, Clone, Error)]
pub enum TxRejection {
    /// Signature bytes didn't recover to a valid public key.
    #[error("invalid signature")]
    InvalidSignature,

    /// Sender's account nonce doesn't match the transaction's nonce.
    #[error("nonce mismatch: account has {account}, transaction has {tx}")]
    NonceMismatch {
        /// Nonce on the sender's account.
        account: u64,
        /// Nonce the transaction presented.
        tx: u64,
    },

    /// Sender's balance can't cover `gas_limit * gas_price` up front.
    #[error("insufficient balance to cover gas: need {required}, have {available}")]
    InsufficientBalanceForGas {
        /// `gas_limit * gas_price`.
        required: u128,
        /// Sender's current balance.
        available: u128,
    },

    /// `gas_limit` is below the transaction's intrinsic gas cost.
    #[error("gas limit {gas_limit} below intrinsic cost {intrinsic}")]
    IntrinsicGasTooLow {
        /// Gas limit on the transaction.
        gas_limit: u64,
        /// Intrinsic cost computed from the transaction's payload.
        intrinsic: u64,
    },
}
