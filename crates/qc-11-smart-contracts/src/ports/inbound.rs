//! # Driving Ports (API - Inbound)
//!
//! Interfaces exposed by the smart contract subsystem: the entry points a
//! transaction executor or block producer calls into to run bytecode.
//! Execution is synchronous throughout — no operation within a VM frame
//! suspends or yields.

use crate::domain::entities::{BlockContext, ExecutionContext, ExecutionResult};
use crate::domain::value_objects::{Address, Bytes, Hash, U256};
use crate::errors::VmError;

/// Signed transaction for execution.
///
/// Mirrors `shared-types`' transaction shape but is defined here to avoid
/// tight coupling to its internals.
#[derive(Clone, Debug)]
pub struct SignedTransaction {
    /// Sender address (20 bytes).
    pub from: Address,
    /// Recipient address (None for contract creation).
    pub to: Option<Address>,
    /// Transaction value in wei.
    pub value: U256,
    /// Sender's nonce.
    pub nonce: u64,
    /// Gas price in wei.
    pub gas_price: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Transaction data (calldata or init code).
    pub data: Bytes,
    /// Transaction hash (computed from signed data).
    pub hash: Hash,
}

impl SignedTransaction {
    /// Returns true if this is a contract creation transaction.
    #[must_use]
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Returns the transaction hash.
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Returns the sender address.
    #[must_use]
    pub fn sender(&self) -> Address {
        self.from
    }
}

impl Default for SignedTransaction {
    fn default() -> Self {
        Self {
            from: Address::ZERO,
            to: None,
            value: U256::zero(),
            nonce: 0,
            gas_price: U256::from(1_000_000_000u64), // 1 gwei
            gas_limit: 21000,                        // Basic transfer gas
            data: Bytes::new(),
            hash: Hash::ZERO,
        }
    }
}

/// Primary API for smart contract execution.
pub trait SmartContractApi: Send + Sync {
    /// Executes a contract call with the given context and code.
    ///
    /// This is the low-level execution primitive; most callers should go
    /// through `execute_transaction` instead.
    fn execute(&self, context: ExecutionContext, code: &[u8]) -> Result<ExecutionResult, VmError>;

    /// Executes a signed transaction: dispatches to contract creation or
    /// message call, transferring value and deducting gas along the way.
    fn execute_transaction(
        &self,
        tx: &SignedTransaction,
        block: &BlockContext,
    ) -> Result<ExecutionResult, VmError>;

    /// Estimates gas for a call by running it without applying state changes.
    fn estimate_gas(&self, context: ExecutionContext, code: &[u8]) -> Result<u64, VmError>;

    /// Executes a read-only call (`eth_call`): runs the frame and returns its
    /// output, but never commits any of the state changes it collects along
    /// the way.
    fn call(&self, context: ExecutionContext, code: &[u8]) -> Result<Bytes, VmError>;
}

/// Result of a single transaction in a batch.
#[derive(Clone, Debug)]
pub struct TransactionReceipt {
    /// Transaction hash.
    pub tx_hash: Hash,
    /// Whether the transaction succeeded.
    pub success: bool,
    /// Gas used by this transaction.
    pub gas_used: u64,
    /// Cumulative gas used in the block so far.
    pub cumulative_gas_used: u64,
    /// Return data (for contract calls).
    pub output: Bytes,
    /// Logs emitted.
    pub logs: Vec<crate::domain::entities::Log>,
    /// Contract address (if this was a contract creation).
    pub contract_address: Option<Address>,
}

/// Batch transaction executor for block processing.
///
/// Transactions are applied strictly in order, since each observes the
/// post-state of its predecessors; a failed transaction still consumes gas
/// and execution continues with the next one.
pub trait BatchExecutor: Send + Sync {
    /// Executes a batch of transactions in a block, returning one receipt
    /// per transaction in order.
    fn execute_batch(
        &self,
        transactions: &[SignedTransaction],
        block: &BlockContext,
    ) -> Result<Vec<TransactionReceipt>, VmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_transaction_is_contract_creation() {
        let tx = SignedTransaction {
            from: Address::ZERO,
            to: None,
            value: U256::zero(),
            nonce: 0,
            gas_price: U256::from(1),
            gas_limit: 21000,
            data: Bytes::new(),
            hash: Hash::ZERO,
        };

        assert!(tx.is_contract_creation());

        let tx_call = SignedTransaction {
            to: Some(Address::new([1u8; 20])),
            ..tx
        };

        assert!(!tx_call.is_contract_creation());
    }
}
