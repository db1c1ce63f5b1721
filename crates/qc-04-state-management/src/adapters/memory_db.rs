use crate::domain::{Hash, StateError};
use crate::ports::NodeStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory [`NodeStore`], the backend used by tests and by a
/// short-lived node.
#[derive(Default)]
pub struct InMemoryNodeStore {
    nodes: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl InMemoryNodeStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeStore for InMemoryNodeStore {
    fn get(&self, key: &Hash) -> Result<Option<Vec<u8>>, StateError> {
        let nodes = self.nodes.read().map_err(|_| StateError::LockPoisoned)?;
        Ok(nodes.get(key).cloned())
    }

    fn put(&self, key: Hash, value: Vec<u8>) -> Result<(), StateError> {
        let mut nodes = self.nodes.write().map_err(|_| StateError::LockPoisoned)?;
        nodes.insert(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let db = InMemoryNodeStore::new();
        let hash = [0xab; 32];
        let data = vec![1, 2, 3, 4];

        db.put(hash, data.clone()).unwrap();
        assert_eq!(db.get(&hash).unwrap(), Some(data));
    }

    #[test]
    fn missing_key_is_none() {
        let db = InMemoryNodeStore::new();
        assert_eq!(db.get(&[0u8; 32]).unwrap(), None);
    }
}
