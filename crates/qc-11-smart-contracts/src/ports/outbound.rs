//! # Driven Ports (SPI - Outbound)
//!
//! Interfaces the VM depends on but does not implement itself: world-state
//! access (bridged to `qc-04-state-management`'s typed stores) and ECDSA
//! recovery (bridged to `shared-crypto`) for the `ecrecover` precompile.
//! Every call here is synchronous, matching the interpreter's tight loop.

use crate::domain::value_objects::{Address, Bytes, EcdsaSignature, Hash, StorageKey, StorageValue, U256};
use qc_04_state_management::StateError;

/// Interface for accessing blockchain state from within the VM.
///
/// This subsystem is the only one that writes state during transaction
/// execution; `set_storage` queues a write applied by the caller on commit,
/// not immediately.
pub trait StateAccess: Send + Sync {
    /// Account balance, or zero if the account has never been written.
    fn get_balance(&self, address: Address) -> Result<U256, StateError>;

    /// Account nonce, or zero if the account has never been written.
    fn get_nonce(&self, address: Address) -> Result<u64, StateError>;

    /// Keccak256 of the account's code, or the empty-code hash for an EOA.
    fn get_code_hash(&self, address: Address) -> Result<Hash, StateError>;

    /// Contract bytecode (empty for an EOA).
    fn get_code(&self, address: Address) -> Result<Bytes, StateError>;

    /// Size in bytes of the account's code.
    fn get_code_size(&self, address: Address) -> Result<usize, StateError> {
        Ok(self.get_code(address)?.len())
    }

    /// Storage value at `key`, zero if the slot was never written.
    fn get_storage(&self, address: Address, key: StorageKey) -> Result<StorageValue, StateError>;

    /// Queues a storage write.
    fn set_storage(&self, address: Address, key: StorageKey, value: StorageValue) -> Result<(), StateError>;

    /// An account "exists" if it has non-zero balance, non-zero nonce, or
    /// non-empty code.
    fn account_exists(&self, address: Address) -> Result<bool, StateError>;
}

/// Interface for ECDSA signature recovery, used by the `ecrecover` precompile
/// (address `0x01`).
pub trait SignatureVerifier: Send + Sync {
    /// Recovers the signer address from an ECDSA signature over `hash`.
    /// Returns `None` if the signature is invalid or doesn't recover.
    fn ecrecover(&self, hash: &Hash, signature: &EcdsaSignature) -> Option<Address>;
}

/// Interface for querying historical block hashes, used by the `BLOCKHASH`
/// opcode, which can access the last 256 block hashes.
pub trait BlockHashOracle: Send + Sync {
    /// Returns the hash of block `number`, or `None` if it's too old (more
    /// than 256 blocks behind `current_number`) or doesn't exist.
    fn get_block_hash(&self, number: u64, current_number: u64) -> Option<Hash>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MockStateAccess {
        balances: RefCell<HashMap<Address, U256>>,
    }

    impl StateAccess for MockStateAccess {
        fn get_balance(&self, address: Address) -> Result<U256, StateError> {
            Ok(self.balances.borrow().get(&address).copied().unwrap_or_default())
        }

        fn get_nonce(&self, _address: Address) -> Result<u64, StateError> {
            Ok(5)
        }

        fn get_code_hash(&self, _address: Address) -> Result<Hash, StateError> {
            Ok(Hash::ZERO)
        }

        fn get_code(&self, _address: Address) -> Result<Bytes, StateError> {
            Ok(Bytes::new())
        }

        fn get_storage(&self, _address: Address, _key: StorageKey) -> Result<StorageValue, StateError> {
            Ok(StorageValue::ZERO)
        }

        fn set_storage(&self, _address: Address, _key: StorageKey, _value: StorageValue) -> Result<(), StateError> {
            Ok(())
        }

        fn account_exists(&self, _address: Address) -> Result<bool, StateError> {
            Ok(true)
        }
    }

    #[test]
    fn test_mock_state_access() {
        let mut balances = HashMap::new();
        let addr = Address::new([1u8; 20]);
        balances.insert(addr, U256::from(1000));
        let state = MockStateAccess { balances: RefCell::new(balances) };

        assert_eq!(state.get_balance(addr).unwrap(), U256::from(1000));
        assert_eq!(state.get_nonce(addr).unwrap(), 5);
    }
}
