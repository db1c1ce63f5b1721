//! State and trie error types.
//!
//! Split per §7's layering: [`StateError::KeyNotFound`] is the one
//! genuinely *fatal* variant here — a hashed child-ref the trie expects to
//! resolve is missing from the backing store, which can only mean store
//! corruption or a programming error, never a well-formed lookup miss
//! (those return `None`, not an error). The rest are ordinary account-store
//! faults callers are expected to handle.

use super::Address;
use primitive_types::U256;
use thiserror::Error;

/// State and trie errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// Account does not exist in state trie. Informational: callers
    /// typically treat this the same as a zeroed default account.
    #[error("account not found: {address:?}")]
    AccountNotFound {
        /// The missing account's address.
        address: Address,
    },

    /// Balance invariant violation: a debit would take balance negative.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount the operation needed.
        required: U256,
        /// Amount actually present.
        available: U256,
    },

    /// Sender's nonce didn't match what the executor expected.
    #[error("invalid nonce: expected {expected}, got {actual}")]
    InvalidNonce {
        /// Nonce the state trie has on record.
        expected: u64,
        /// Nonce the transaction presented.
        actual: u64,
    },

    /// A hashed child-ref was not found in the backing node store. Per
    /// §4.4's failure semantics, this is a hard/fatal error: the backend
    /// has lost data, not merely a missing key.
    #[error("trie corruption: node hash {0:02x?} not found in backing store")]
    KeyNotFound([u8; 32]),

    /// The backing key/value store itself failed (I/O error, etc.).
    #[error("database error: {0}")]
    DatabaseError(String),

    /// An internal lock was poisoned by a panicking thread.
    #[error("state lock poisoned")]
    LockPoisoned,
}
