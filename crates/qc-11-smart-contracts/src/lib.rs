//! # QC-11 Smart Contracts - Programmable Execution Subsystem
//!
//! **Subsystem ID:** 11
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! Provides a stack-based virtual machine (EVM) for executing deterministic
//! smart contract bytecode, plus the transaction executor that drives it:
//! intrinsic gas accounting, value transfer, contract creation, and the gas
//! refund. Execution is synchronous throughout — no operation within a VM
//! frame suspends or yields.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | INVARIANT-1 | Gas Limit Enforcement | `domain/invariants.rs` - `check_gas_limit_invariant()` |
//! | INVARIANT-2 | Deterministic Execution | `domain/invariants.rs` - `check_determinism_invariant()` |
//! | INVARIANT-3 | No State Change on Revert | `domain/invariants.rs` - `check_revert_rollback_invariant()` |
//! | INVARIANT-4 | Call Depth Limit | `domain/invariants.rs` - `check_call_depth_invariant()` |
//!
//! ## Outbound Dependencies
//!
//! | Subsystem | Trait | Purpose |
//! |-----------|-------|---------|
//! | 4 (State Mgmt) | `StateAccess` | Read/write contract state |
//! | 10 (Sig Verify) | `SignatureVerifier` | ecrecover precompile |
//!
//! ## EVM Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Interpreter | `evm/interpreter.rs` | Main execution engine |
//! | Stack | `evm/stack.rs` | 1024-item stack |
//! | Memory | `evm/memory.rs` | Dynamic memory with gas |
//! | Gas | `evm/gas.rs` | Cost tables & calculations |
//! | Precompiles | `evm/precompiles/` | ecrecover, sha256, ripemd160, identity |
//! | Executor | `executor.rs` | Transaction-level gas/value/fee accounting |
//!
//! ## Usage Example
//!
//! ```ignore
//! use qc_11_smart_contracts::prelude::*;
//!
//! let executor = Executor::new(&state, &block_hashes);
//! let result = executor.execute_transaction(&tx, &block_context)?;
//!
//! if result.success {
//!     println!("Gas used: {}", result.gas_used);
//!     println!("Output: {:?}", result.output);
//! }
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod errors;
pub mod evm;
pub mod executor;
pub mod ports;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        BlockContext, ExecutionContext, ExecutionResult, Log, StateChange, VmConfig,
    };

    // Value objects
    pub use crate::domain::value_objects::{
        Address, Bytes, EcdsaSignature, GasCounter, Hash, StorageKey, StorageValue, U256,
    };

    // Domain services
    pub use crate::domain::services::{compute_contract_address, estimate_base_gas, keccak256};

    // Invariants
    pub use crate::domain::invariants::{
        check_all_invariants, limits, InvariantCheckResult, InvariantViolation,
    };

    // Ports
    pub use crate::ports::inbound::{
        BatchExecutor, SignedTransaction, SmartContractApi, TransactionReceipt,
    };
    pub use crate::ports::outbound::{BlockHashOracle, SignatureVerifier, StateAccess};

    // Errors
    pub use crate::errors::{PrecompileError, VmError};

    // EVM components
    pub use crate::evm::{gas, memory::Memory, opcodes::Opcode, stack::Stack, Interpreter};

    // Adapters
    pub use crate::adapters::state_adapter::StateAdapter;

    // Executor
    pub use crate::executor::{execute_transaction, Executor};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Subsystem ID.
pub const SUBSYSTEM_ID: u8 = 11;

/// Subsystem name.
pub const SUBSYSTEM_NAME: &str = "Smart Contracts";

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_id() {
        assert_eq!(SUBSYSTEM_ID, 11);
    }

    #[test]
    fn test_prelude_exports() {
        use prelude::*;
        let _ = VmConfig::default();
        let _ = Address::ZERO;
    }
}
