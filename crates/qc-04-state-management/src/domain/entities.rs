//! Account store: a typed view over a [`Trie`] keyed by raw account
//! addresses (40 nibbles, no forced hashing — see `DESIGN.md`).

use super::errors::StateError;
use super::trie::Trie;
use crate::ports::NodeStore;
use primitive_types::U256;
use shared_types::{Account, Address, Hash};

/// A 32-byte contract storage slot key.
pub type StorageKey = [u8; 32];

/// World state: account balances, nonces, code hashes and storage roots,
/// addressed by raw 20-byte address.
pub struct AccountStore<S: NodeStore> {
    trie: Trie<S>,
}

impl<S: NodeStore> AccountStore<S> {
    /// A fresh, empty world state.
    pub fn new(store: S) -> Self {
        Self {
            trie: Trie::new(store),
        }
    }

    /// Reopen world state at a previously-committed root.
    pub fn with_root(store: S, root: Hash) -> Self {
        Self {
            trie: Trie::with_root(store, root),
        }
    }

    /// The current state root.
    #[must_use]
    pub fn root_hash(&self) -> Hash {
        self.trie.root_hash()
    }

    /// Fetch an account, or `None` if it has never been written.
    pub fn get_account(&self, address: &Address) -> Result<Option<Account>, StateError> {
        match self.trie.get(address)? {
            Some(bytes) => Ok(Some(
                Account::rlp_decode(&bytes)
                    .map_err(|e| StateError::DatabaseError(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Write (or overwrite) an account.
    pub fn put_account(&mut self, address: &Address, account: &Account) -> Result<(), StateError> {
        self.trie.insert(address, account.rlp_encode())
    }

    /// Balance of `address`, or zero if the account doesn't exist.
    pub fn get_balance(&self, address: &Address) -> Result<U256, StateError> {
        Ok(self
            .get_account(address)?
            .map(|a| a.balance)
            .unwrap_or_default())
    }

    /// Nonce of `address`, or zero if the account doesn't exist.
    pub fn get_nonce(&self, address: &Address) -> Result<u64, StateError> {
        Ok(self.get_account(address)?.map(|a| a.nonce).unwrap_or(0))
    }

    /// Credit `address` by `amount` wei, creating the account if absent.
    pub fn credit(&mut self, address: &Address, amount: U256) -> Result<(), StateError> {
        let mut account = self.get_account(address)?.unwrap_or_default();
        account.balance = account.balance.saturating_add(amount);
        self.put_account(address, &account)
    }

    /// Debit `address` by `amount` wei. Fails with
    /// [`StateError::InsufficientBalance`] rather than letting balance go
    /// negative.
    pub fn debit(&mut self, address: &Address, amount: U256) -> Result<(), StateError> {
        let mut account = self.get_account(address)?.unwrap_or_default();
        if account.balance < amount {
            return Err(StateError::InsufficientBalance {
                required: amount,
                available: account.balance,
            });
        }
        account.balance -= amount;
        self.put_account(address, &account)
    }

    /// Increment `address`'s nonce by exactly 1.
    pub fn increment_nonce(&mut self, address: &Address) -> Result<(), StateError> {
        let mut account = self.get_account(address)?.unwrap_or_default();
        account.nonce += 1;
        self.put_account(address, &account)
    }

    /// All `(address, account)` pairs currently committed, via the
    /// trie's DFS enumeration.
    pub fn entries(&self) -> Result<Vec<(Address, Account)>, StateError> {
        let mut out = Vec::new();
        for (key, value) in self.trie.entries()? {
            let mut address = [0u8; 20];
            address.copy_from_slice(&key);
            let account = Account::rlp_decode(&value)
                .map_err(|e| StateError::DatabaseError(e.to_string()))?;
            out.push((address, account));
        }
        Ok(out)
    }
}

/// Per-contract storage trie, addressed by raw 32-byte storage key.
pub struct ContractStorage<S: NodeStore> {
    trie: Trie<S>,
}

impl<S: NodeStore> ContractStorage<S> {
    /// A fresh, empty storage trie.
    pub fn new(store: S) -> Self {
        Self {
            trie: Trie::new(store),
        }
    }

    /// Reopen a contract's storage trie at its last-committed root.
    pub fn with_root(store: S, root: Hash) -> Self {
        Self {
            trie: Trie::with_root(store, root),
        }
    }

    /// The current storage root, to be written back into the owning
    /// [`Account::storage_root`].
    #[must_use]
    pub fn root_hash(&self) -> Hash {
        self.trie.root_hash()
    }

    /// `SLOAD`: read a 32-byte word, zero if never written.
    ///
    /// Storage values are stored as plain 32-byte big-endian binaries, not
    /// RLP-framed — there's no outer list to unframe them from, unlike an
    /// account's fields.
    pub fn load(&self, key: &StorageKey) -> Result<U256, StateError> {
        match self.trie.get(key)? {
            Some(bytes) => Ok(U256::from_big_endian(&bytes)),
            None => Ok(U256::zero()),
        }
    }

    /// `SSTORE`: write a 32-byte word.
    pub fn store(&mut self, key: &StorageKey, value: U256) -> Result<(), StateError> {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        self.trie.insert(key, bytes.to_vec())
    }

    /// All `(key, value)` pairs currently committed, via the trie's DFS
    /// enumeration.
    pub fn entries(&self) -> Result<Vec<(StorageKey, U256)>, StateError> {
        let mut out = Vec::new();
        for (key, value) in self.trie.entries()? {
            let mut storage_key = [0u8; 32];
            storage_key.copy_from_slice(&key);
            out.push((storage_key, U256::from_big_endian(&value)));
        }
        Ok(out)
    }
}
