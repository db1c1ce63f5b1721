//! Error types for block production

use thiserror::Error;

/// Result type alias for block production operations.
pub type Result<T> = std::result::Result<T, BlockProductionError>;

/// Errors that can occur while assembling or linking blocks.
#[derive(Debug, Error)]
pub enum BlockProductionError {
    /// A transaction's `v`/`r`/`s` didn't recover to a valid signer.
    #[error("invalid transaction signature")]
    InvalidSignature,

    /// Transaction execution faulted the backing state store.
    #[error("state fault: {0}")]
    StateFault(String),

    /// Writing a transaction or receipt into the per-block index trie faulted.
    #[error("trie error: {0}")]
    TrieError(String),

    /// A candidate block's parent hash has no node in the tree.
    #[error("no path to parent block")]
    NoPath,
}

impl From<qc_11_smart_contracts::errors::VmError> for BlockProductionError {
    fn from(err: qc_11_smart_contracts::errors::VmError) -> Self {
        Self::StateFault(err.to_string())
    }
}

impl From<qc_04_state_management::StateError> for BlockProductionError {
    fn from(err: qc_04_state_management::StateError) -> Self {
        Self::TrieError(err.to_string())
    }
}
