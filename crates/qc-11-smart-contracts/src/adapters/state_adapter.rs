//! # State Adapter
//!
//! Bridges the VM's [`StateAccess`] port to `qc-04-state-management`'s typed
//! account and storage tries. Each account's storage lives in its own
//! [`ContractStorage`] trie rooted at `Account::storage_root`; contract code
//! is kept in a flat, content-addressed table keyed by `code_hash` — the
//! same addressing scheme [`NodeStore`] already uses for trie nodes, just
//! without the trie structure on top, since code bytes are opaque blobs
//! with nothing to traverse.

use crate::domain::services::keccak256 as vm_keccak256;
use crate::domain::value_objects::{Address, Bytes, Hash, StorageKey, StorageValue, U256};
use crate::ports::outbound::StateAccess;
use qc_04_state_management::{AccountStore, ContractStorage, NodeStore, StateError};
use std::collections::HashMap;
use std::sync::RwLock;

fn shared_address(address: Address) -> shared_types::Address {
    *address.as_bytes()
}

fn shared_hash(hash: Hash) -> shared_types::Hash {
    *hash.as_bytes()
}

fn vm_hash(hash: shared_types::Hash) -> Hash {
    Hash::new(hash)
}

/// Bridges a VM execution frame to world state backed by a [`NodeStore`].
///
/// `accounts` is a single shared trie; each account's own storage trie is
/// opened lazily and cached in `storages`, keyed by address rather than by
/// storage root, so repeated `SLOAD`/`SSTORE` calls within one frame reuse
/// the same open trie instead of reopening it from `Account::storage_root`
/// on every access.
pub struct StateAdapter<S: NodeStore + Clone> {
    store: S,
    accounts: RwLock<AccountStore<S>>,
    storages: RwLock<HashMap<Address, ContractStorage<S>>>,
    code: RwLock<HashMap<Hash, Bytes>>,
}

impl<S: NodeStore + Clone> StateAdapter<S> {
    /// Opens world state at a previously-committed root, backed by `store`.
    #[must_use]
    pub fn new(store: S, root: Hash) -> Self {
        Self {
            accounts: RwLock::new(AccountStore::with_root(store.clone(), shared_hash(root))),
            store,
            storages: RwLock::new(HashMap::new()),
            code: RwLock::new(HashMap::new()),
        }
    }

    /// A fresh adapter over an empty world state.
    #[must_use]
    pub fn empty(store: S) -> Self {
        Self {
            accounts: RwLock::new(AccountStore::new(store.clone())),
            store,
            storages: RwLock::new(HashMap::new()),
            code: RwLock::new(HashMap::new()),
        }
    }

    /// The current world-state root.
    #[must_use]
    pub fn root_hash(&self) -> Hash {
        vm_hash(self.accounts.read().unwrap().root_hash())
    }

    /// Deploys `code` under `address`, updating its account's `code_hash`
    /// and populating the flat code table.
    pub fn set_code(&self, address: Address, code: Bytes) -> Result<(), StateError> {
        let hash = if code.is_empty() {
            Hash::new(shared_types::EMPTY_CODE_HASH)
        } else {
            vm_keccak256(code.as_slice())
        };

        let mut accounts = self.accounts.write().unwrap();
        let shared_addr = shared_address(address);
        let mut account = accounts
            .get_account(&shared_addr)?
            .unwrap_or_default();
        account.code_hash = shared_hash(hash);
        accounts.put_account(&shared_addr, &account)?;

        self.code.write().unwrap().insert(hash, code);
        Ok(())
    }

    /// Credits `address` with `amount` wei, creating the account if absent.
    pub fn credit(&self, address: Address, amount: U256) -> Result<(), StateError> {
        self.accounts
            .write()
            .unwrap()
            .credit(&shared_address(address), amount)
    }

    /// Debits `address` by `amount` wei.
    ///
    /// # Errors
    ///
    /// Returns `StateError::InsufficientBalance` if the account's balance
    /// is less than `amount`.
    pub fn debit(&self, address: Address, amount: U256) -> Result<(), StateError> {
        self.accounts
            .write()
            .unwrap()
            .debit(&shared_address(address), amount)
    }

    /// Increments `address`'s nonce by exactly 1.
    pub fn increment_nonce(&self, address: Address) -> Result<(), StateError> {
        self.accounts
            .write()
            .unwrap()
            .increment_nonce(&shared_address(address))
    }

    /// Removes an account's storage trie and code from the open caches
    /// (called when a `SELFDESTRUCT`-marked account is reaped at the end
    /// of a block). The account entry itself is left for the caller to
    /// zero out via `put_account`.
    pub fn forget(&self, address: Address) {
        self.storages.write().unwrap().remove(&address);
    }

    /// Wipes an account's code and storage after `SELFDESTRUCT`, resetting
    /// it to a freshly-created empty account. Callers apply any pending
    /// `BalanceTransfer` to the beneficiary first; this only clears what's
    /// left behind.
    pub fn destroy(&self, address: Address) -> Result<(), StateError> {
        self.forget(address);
        self.accounts
            .write()
            .unwrap()
            .put_account(&shared_address(address), &shared_types::Account::default())
    }

    fn with_storage<R>(
        &self,
        address: Address,
        f: impl FnOnce(&mut ContractStorage<S>) -> Result<R, StateError>,
    ) -> Result<R, StateError> {
        let mut storages = self.storages.write().unwrap();
        if !storages.contains_key(&address) {
            let root = self
                .accounts
                .read()
                .unwrap()
                .get_account(&shared_address(address))?
                .map(|a| a.storage_root)
                .unwrap_or(shared_types::EMPTY_TRIE_ROOT);
            storages.insert(address, ContractStorage::with_root(self.store.clone(), root));
        }
        f(storages.get_mut(&address).expect("just inserted"))
    }
}

impl<S: NodeStore + Clone> StateAccess for StateAdapter<S> {
    fn get_balance(&self, address: Address) -> Result<U256, StateError> {
        self.accounts.read().unwrap().get_balance(&shared_address(address))
    }

    fn get_nonce(&self, address: Address) -> Result<u64, StateError> {
        self.accounts.read().unwrap().get_nonce(&shared_address(address))
    }

    fn get_code_hash(&self, address: Address) -> Result<Hash, StateError> {
        let account = self
            .accounts
            .read()
            .unwrap()
            .get_account(&shared_address(address))?;
        Ok(match account {
            Some(account) => vm_hash(account.code_hash),
            None => Hash::new(shared_types::EMPTY_CODE_HASH),
        })
    }

    fn get_code(&self, address: Address) -> Result<Bytes, StateError> {
        let code_hash = self.get_code_hash(address)?;
        Ok(self
            .code
            .read()
            .unwrap()
            .get(&code_hash)
            .cloned()
            .unwrap_or_default())
    }

    fn get_storage(&self, address: Address, key: StorageKey) -> Result<StorageValue, StateError> {
        self.with_storage(address, |storage| {
            storage.load(key.as_bytes()).map(StorageValue::from_u256)
        })
    }

    fn set_storage(&self, address: Address, key: StorageKey, value: StorageValue) -> Result<(), StateError> {
        self.with_storage(address, |storage| storage.store(key.as_bytes(), value.to_u256()))?;

        let root = self
            .storages
            .read()
            .unwrap()
            .get(&address)
            .expect("with_storage just opened it")
            .root_hash();

        let mut accounts = self.accounts.write().unwrap();
        let shared_addr = shared_address(address);
        let mut account = accounts.get_account(&shared_addr)?.unwrap_or_default();
        account.storage_root = root;
        accounts.put_account(&shared_addr, &account)
    }

    fn account_exists(&self, address: Address) -> Result<bool, StateError> {
        let account = self
            .accounts
            .read()
            .unwrap()
            .get_account(&shared_address(address))?;
        Ok(match account {
            None => false,
            Some(account) => {
                !account.balance.is_zero()
                    || account.nonce != 0
                    || account.code_hash != shared_types::EMPTY_CODE_HASH
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_04_state_management::InMemoryNodeStore;
    use std::sync::Arc;

    fn adapter() -> StateAdapter<Arc<InMemoryNodeStore>> {
        StateAdapter::empty(Arc::new(InMemoryNodeStore::new()))
    }

    #[test]
    fn credit_then_get_balance() {
        let state = adapter();
        let addr = Address::new([1u8; 20]);

        assert!(state.get_balance(addr).unwrap().is_zero());

        state.credit(addr, U256::from(1000)).unwrap();
        assert_eq!(state.get_balance(addr).unwrap(), U256::from(1000));
    }

    #[test]
    fn debit_below_balance_fails() {
        let state = adapter();
        let addr = Address::new([1u8; 20]);
        state.credit(addr, U256::from(100)).unwrap();

        assert!(state.debit(addr, U256::from(200)).is_err());
        assert_eq!(state.get_balance(addr).unwrap(), U256::from(100));
    }

    #[test]
    fn storage_round_trips() {
        let state = adapter();
        let addr = Address::new([1u8; 20]);
        let key = StorageKey::from_u256(U256::from(7));

        assert!(state.get_storage(addr, key).unwrap().is_zero());

        state
            .set_storage(addr, key, StorageValue::from_u256(U256::from(42)))
            .unwrap();
        assert_eq!(state.get_storage(addr, key).unwrap().to_u256(), U256::from(42));
    }

    #[test]
    fn set_code_updates_hash_and_bytes() {
        let state = adapter();
        let addr = Address::new([2u8; 20]);
        let code = Bytes::from_slice(&[0x60, 0x00, 0x60, 0x00, 0xF3]);

        state.set_code(addr, code.clone()).unwrap();

        let retrieved = state.get_code(addr).unwrap();
        assert_eq!(retrieved.as_slice(), code.as_slice());
        assert_ne!(state.get_code_hash(addr).unwrap(), Hash::new(shared_types::EMPTY_CODE_HASH));
    }

    #[test]
    fn account_exists_tracks_balance_nonce_and_code() {
        let state = adapter();
        let addr = Address::new([3u8; 20]);

        assert!(!state.account_exists(addr).unwrap());

        state.credit(addr, U256::from(1)).unwrap();
        assert!(state.account_exists(addr).unwrap());
    }

    #[test]
    fn destroy_wipes_code_and_storage() {
        let state = adapter();
        let addr = Address::new([4u8; 20]);
        let key = StorageKey::from_u256(U256::from(1));

        state.set_code(addr, Bytes::from_slice(&[0x60, 0x00])).unwrap();
        state
            .set_storage(addr, key, StorageValue::from_u256(U256::from(99)))
            .unwrap();

        state.destroy(addr).unwrap();

        assert_eq!(state.get_code(addr).unwrap().len(), 0);
        assert_eq!(state.get_code_hash(addr).unwrap(), Hash::new(shared_types::EMPTY_CODE_HASH));
        assert!(state.get_storage(addr, key).unwrap().is_zero());
    }
}
