use crate::domain::{Hash, StateError};
use std::sync::Arc;

/// The key/value backend a trie commits its nodes to.
///
/// Keys are 32-byte keccak hashes of the RLP-encoded node they address.
/// No deletion is required: old nodes remain addressable forever, which is
/// what makes snapshotting between transactions free — a prior root is
/// just a hash that still resolves.
pub trait NodeStore: Send + Sync {
    /// Look up a previously-stored node by its hash.
    fn get(&self, key: &Hash) -> Result<Option<Vec<u8>>, StateError>;

    /// Store a node under its hash.
    fn put(&self, key: Hash, value: Vec<u8>) -> Result<(), StateError>;
}

/// An `Arc`-wrapped store delegates to the store it wraps, so several
/// tries (e.g. one `AccountStore` and many per-contract `ContractStorage`
/// tries) can share a single backing store by cloning the `Arc` rather
/// than each owning a disjoint copy.
impl<T: NodeStore + ?Sized> NodeStore for Arc<T> {
    fn get(&self, key: &Hash) -> Result<Option<Vec<u8>>, StateError> {
        (**self).get(key)
    }

    fn put(&self, key: Hash, value: Vec<u8>) -> Result<(), StateError> {
        (**self).put(key, value)
    }
}
