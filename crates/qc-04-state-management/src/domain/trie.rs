//! Modified Merkle-Patricia Trie.
//!
//! Four node types — Empty, Leaf, Extension, Branch — per Ethereum Yellow
//! Paper Appendix D. Keys are walked nibble-by-nibble with no forced
//! hashing of the key itself: callers that want address-grinding
//! resistance hash their own keys before calling [`Trie::insert`].
//!
//! A child reference below 32 bytes of RLP is embedded directly in its
//! parent's encoding rather than hashed-and-stored — the same rule real
//! Ethereum clients use to avoid a `NodeStore` round trip for the many
//! tiny nodes near the bottom of a trie. The root is always persisted
//! regardless of size, so a trie can be reopened from just its root hash.

use super::errors::StateError;
use crate::ports::NodeStore;
use hex_prefix::Nibbles;
use rlp::RlpItem;
use shared_types::{keccak256, Hash, EMPTY_TRIE_ROOT};

/// A reference to a child node: either embedded inline (its RLP encoding
/// is under 32 bytes) or addressed by its Keccak256 hash in the backing
/// [`NodeStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
enum NodeRef {
    Embedded(Box<TrieNode>),
    Hashed(Hash),
}

impl NodeRef {
    fn from_node<S: NodeStore>(node: TrieNode, store: &S) -> Result<Self, StateError> {
        let bytes = rlp::encode(&node.to_rlp_item());
        if bytes.len() < 32 {
            Ok(NodeRef::Embedded(Box::new(node)))
        } else {
            let hash = keccak256(&bytes);
            store.put(hash, bytes)?;
            Ok(NodeRef::Hashed(hash))
        }
    }

    fn resolve<S: NodeStore>(&self, store: &S) -> Result<TrieNode, StateError> {
        match self {
            NodeRef::Embedded(node) => Ok((**node).clone()),
            NodeRef::Hashed(hash) => {
                let bytes = store.get(hash)?.ok_or(StateError::KeyNotFound(*hash))?;
                TrieNode::from_rlp(&bytes)
            }
        }
    }

    fn to_rlp_item(&self) -> RlpItem {
        match self {
            NodeRef::Embedded(node) => node.to_rlp_item(),
            NodeRef::Hashed(hash) => RlpItem::String(hash.to_vec()),
        }
    }

    fn from_item(item: &RlpItem) -> Result<Self, StateError> {
        match item {
            RlpItem::String(bytes) if bytes.len() == 32 => {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(bytes);
                Ok(NodeRef::Hashed(hash))
            }
            other => Ok(NodeRef::Embedded(Box::new(TrieNode::from_item(other)?))),
        }
    }
}

/// One of the four Patricia trie node types.
#[derive(Clone, Debug, PartialEq, Eq)]
enum TrieNode {
    Empty,
    Leaf {
        path: Nibbles,
        value: Vec<u8>,
    },
    Extension {
        path: Nibbles,
        child: NodeRef,
    },
    Branch {
        children: Box<[Option<NodeRef>; 16]>,
        value: Option<Vec<u8>>,
    },
}

fn empty_children() -> Box<[Option<NodeRef>; 16]> {
    Box::new(std::array::from_fn(|_| None))
}

impl TrieNode {
    fn to_rlp_item(&self) -> RlpItem {
        match self {
            TrieNode::Empty => RlpItem::empty_string(),
            TrieNode::Leaf { path, value } => RlpItem::List(vec![
                RlpItem::String(path.encode_hex_prefix(true)),
                RlpItem::String(value.clone()),
            ]),
            TrieNode::Extension { path, child } => RlpItem::List(vec![
                RlpItem::String(path.encode_hex_prefix(false)),
                child.to_rlp_item(),
            ]),
            TrieNode::Branch { children, value } => {
                let mut items: Vec<RlpItem> = children
                    .iter()
                    .map(|c| match c {
                        Some(r) => r.to_rlp_item(),
                        None => RlpItem::empty_string(),
                    })
                    .collect();
                items.push(match value {
                    Some(v) => RlpItem::String(v.clone()),
                    None => RlpItem::empty_string(),
                });
                RlpItem::List(items)
            }
        }
    }

    fn from_rlp(bytes: &[u8]) -> Result<Self, StateError> {
        let (item, _) =
            rlp::decode(bytes).map_err(|e| StateError::DatabaseError(e.to_string()))?;
        Self::from_item(&item)
    }

    fn from_item(item: &RlpItem) -> Result<Self, StateError> {
        match item {
            RlpItem::String(bytes) if bytes.is_empty() => Ok(TrieNode::Empty),
            RlpItem::String(_) => Err(StateError::DatabaseError(
                "malformed trie node: bare non-empty string".to_string(),
            )),
            RlpItem::List(items) if items.len() == 2 => {
                let path_bytes = items[0]
                    .as_string()
                    .ok_or_else(|| StateError::DatabaseError("malformed node path".to_string()))?;
                let (path, is_leaf) = Nibbles::decode_hex_prefix(path_bytes);
                if is_leaf {
                    let value = items[1]
                        .as_string()
                        .ok_or_else(|| {
                            StateError::DatabaseError("malformed leaf value".to_string())
                        })?
                        .to_vec();
                    Ok(TrieNode::Leaf { path, value })
                } else {
                    let child = NodeRef::from_item(&items[1])?;
                    Ok(TrieNode::Extension { path, child })
                }
            }
            RlpItem::List(items) if items.len() == 17 => {
                let mut children = empty_children();
                for (i, slot) in items.iter().take(16).enumerate() {
                    if let RlpItem::String(bytes) = slot {
                        if bytes.is_empty() {
                            continue;
                        }
                    }
                    children[i] = Some(NodeRef::from_item(slot)?);
                }
                let value = match &items[16] {
                    RlpItem::String(bytes) if bytes.is_empty() => None,
                    RlpItem::String(bytes) => Some(bytes.clone()),
                    RlpItem::List(_) => {
                        return Err(StateError::DatabaseError(
                            "malformed branch value".to_string(),
                        ))
                    }
                };
                Ok(TrieNode::Branch { children, value })
            }
            RlpItem::List(_) => Err(StateError::DatabaseError(
                "malformed trie node: wrong arity".to_string(),
            )),
        }
    }
}

/// A Modified Merkle-Patricia Trie backed by a [`NodeStore`].
pub struct Trie<S: NodeStore> {
    store: S,
    root: NodeRef,
}

impl<S: NodeStore> Trie<S> {
    /// A fresh, empty trie.
    pub fn new(store: S) -> Self {
        Self {
            store,
            root: NodeRef::Embedded(Box::new(TrieNode::Empty)),
        }
    }

    /// Reopen a trie at a previously-committed root.
    pub fn with_root(store: S, root: Hash) -> Self {
        let root = if root == EMPTY_TRIE_ROOT {
            NodeRef::Embedded(Box::new(TrieNode::Empty))
        } else {
            NodeRef::Hashed(root)
        };
        Self { store, root }
    }

    /// The current root hash. [`shared_types::EMPTY_TRIE_ROOT`] for an
    /// empty trie.
    #[must_use]
    pub fn root_hash(&self) -> Hash {
        match &self.root {
            NodeRef::Embedded(node) if matches!(**node, TrieNode::Empty) => EMPTY_TRIE_ROOT,
            NodeRef::Embedded(node) => keccak256(&rlp::encode(&node.to_rlp_item())),
            NodeRef::Hashed(hash) => *hash,
        }
    }

    /// Look up the value stored at `key`, if any.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let path = Nibbles::from_bytes(key);
        let node = self.root.resolve(&self.store)?;
        self.get_at(&node, &path)
    }

    fn get_at(&self, node: &TrieNode, path: &Nibbles) -> Result<Option<Vec<u8>>, StateError> {
        match node {
            TrieNode::Empty => Ok(None),
            TrieNode::Leaf {
                path: leaf_path,
                value,
            } => Ok(if leaf_path == path {
                Some(value.clone())
            } else {
                None
            }),
            TrieNode::Extension {
                path: ext_path,
                child,
            } => {
                if path.len() >= ext_path.len() && path.slice_range(0, ext_path.len()) == *ext_path
                {
                    let child_node = child.resolve(&self.store)?;
                    self.get_at(&child_node, &path.slice(ext_path.len()))
                } else {
                    Ok(None)
                }
            }
            TrieNode::Branch { children, value } => {
                if path.is_empty() {
                    Ok(value.clone())
                } else {
                    match &children[path.at(0) as usize] {
                        Some(child) => {
                            let child_node = child.resolve(&self.store)?;
                            self.get_at(&child_node, &path.slice(1))
                        }
                        None => Ok(None),
                    }
                }
            }
        }
    }

    /// Insert or overwrite the value at `key`, committing a new root.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StateError> {
        let path = Nibbles::from_bytes(key);
        let current = self.root.resolve(&self.store)?;
        let updated = self.insert_at(current, &path, value)?;
        self.commit(updated)
    }

    fn commit(&mut self, node: TrieNode) -> Result<(), StateError> {
        if matches!(node, TrieNode::Empty) {
            self.root = NodeRef::Embedded(Box::new(TrieNode::Empty));
            return Ok(());
        }
        let bytes = rlp::encode(&node.to_rlp_item());
        let hash = keccak256(&bytes);
        self.store.put(hash, bytes)?;
        self.root = NodeRef::Hashed(hash);
        Ok(())
    }

    fn insert_at(
        &self,
        node: TrieNode,
        path: &Nibbles,
        value: Vec<u8>,
    ) -> Result<TrieNode, StateError> {
        match node {
            TrieNode::Empty => Ok(TrieNode::Leaf {
                path: path.clone(),
                value,
            }),

            TrieNode::Leaf {
                path: leaf_path,
                value: leaf_value,
            } => {
                let common = path.common_prefix_len(&leaf_path);
                if common == leaf_path.len() && common == path.len() {
                    return Ok(TrieNode::Leaf {
                        path: leaf_path,
                        value,
                    });
                }

                let mut children = empty_children();
                let mut branch_value = None;

                if leaf_path.len() == common {
                    branch_value = Some(leaf_value);
                } else {
                    let nib = leaf_path.at(common);
                    let rest = leaf_path.slice(common + 1);
                    let leaf = TrieNode::Leaf {
                        path: rest,
                        value: leaf_value,
                    };
                    children[nib as usize] = Some(NodeRef::from_node(leaf, &self.store)?);
                }

                if path.len() == common {
                    branch_value = Some(value);
                } else {
                    let nib = path.at(common);
                    let rest = path.slice(common + 1);
                    let leaf = TrieNode::Leaf { path: rest, value };
                    children[nib as usize] = Some(NodeRef::from_node(leaf, &self.store)?);
                }

                let branch = TrieNode::Branch {
                    children,
                    value: branch_value,
                };
                self.wrap_with_prefix(branch, path, common)
            }

            TrieNode::Extension {
                path: ext_path,
                child,
            } => {
                let common = path.common_prefix_len(&ext_path);

                if common == ext_path.len() {
                    let child_node = child.resolve(&self.store)?;
                    let updated_child =
                        self.insert_at(child_node, &path.slice(common), value)?;
                    let updated_ref = NodeRef::from_node(updated_child, &self.store)?;
                    return Ok(TrieNode::Extension {
                        path: ext_path,
                        child: updated_ref,
                    });
                }

                let mut children = empty_children();
                let mut branch_value = None;

                let ext_nib = ext_path.at(common);
                let ext_rest = ext_path.slice(common + 1);
                let existing_ref = if ext_rest.is_empty() {
                    child
                } else {
                    let ext = TrieNode::Extension {
                        path: ext_rest,
                        child,
                    };
                    NodeRef::from_node(ext, &self.store)?
                };
                children[ext_nib as usize] = Some(existing_ref);

                if path.len() == common {
                    branch_value = Some(value);
                } else {
                    let nib = path.at(common);
                    let rest = path.slice(common + 1);
                    let leaf = TrieNode::Leaf { path: rest, value };
                    children[nib as usize] = Some(NodeRef::from_node(leaf, &self.store)?);
                }

                let branch = TrieNode::Branch {
                    children,
                    value: branch_value,
                };
                self.wrap_with_prefix(branch, path, common)
            }

            TrieNode::Branch {
                mut children,
                value: branch_value,
            } => {
                if path.is_empty() {
                    return Ok(TrieNode::Branch {
                        children,
                        value: Some(value),
                    });
                }
                let nib = path.at(0) as usize;
                let rest = path.slice(1);
                let existing = match &children[nib] {
                    Some(existing) => existing.resolve(&self.store)?,
                    None => TrieNode::Empty,
                };
                let updated = self.insert_at(existing, &rest, value)?;
                children[nib] = Some(NodeRef::from_node(updated, &self.store)?);
                Ok(TrieNode::Branch {
                    children,
                    value: branch_value,
                })
            }
        }
    }

    /// Wrap a freshly-built branch in an `Extension` over the shared
    /// prefix, unless the two paths diverged immediately (`common == 0`).
    fn wrap_with_prefix(
        &self,
        branch: TrieNode,
        path: &Nibbles,
        common: usize,
    ) -> Result<TrieNode, StateError> {
        if common == 0 {
            return Ok(branch);
        }
        let prefix = path.slice_range(0, common);
        let branch_ref = NodeRef::from_node(branch, &self.store)?;
        Ok(TrieNode::Extension {
            path: prefix,
            child: branch_ref,
        })
    }

    /// Depth-first enumeration of every `(key, value)` pair in the trie.
    /// Keys are reassembled from nibble paths, so only ever used with
    /// even-length byte keys (addresses, 32-byte storage/state keys).
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        let mut out = Vec::new();
        let node = self.root.resolve(&self.store)?;
        self.collect(&node, Nibbles::empty(), &mut out)?;
        Ok(out)
    }

    fn collect(
        &self,
        node: &TrieNode,
        prefix: Nibbles,
        out: &mut Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<(), StateError> {
        match node {
            TrieNode::Empty => {}
            TrieNode::Leaf { path, value } => {
                let mut full = prefix.0.clone();
                full.extend_from_slice(&path.0);
                out.push((Nibbles(full).to_bytes(), value.clone()));
            }
            TrieNode::Extension { path, child } => {
                let mut full = prefix.0.clone();
                full.extend_from_slice(&path.0);
                let child_node = child.resolve(&self.store)?;
                self.collect(&child_node, Nibbles(full), out)?;
            }
            TrieNode::Branch { children, value } => {
                if let Some(v) = value {
                    out.push((prefix.to_bytes(), v.clone()));
                }
                for (i, child) in children.iter().enumerate() {
                    if let Some(child) = child {
                        let mut full = prefix.0.clone();
                        full.push(i as u8);
                        let child_node = child.resolve(&self.store)?;
                        self.collect(&child_node, Nibbles(full), out)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryNodeStore;

    fn trie() -> Trie<InMemoryNodeStore> {
        Trie::new(InMemoryNodeStore::new())
    }

    #[test]
    fn empty_trie_has_canonical_root() {
        assert_eq!(trie().root_hash(), EMPTY_TRIE_ROOT);
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut t = trie();
        t.insert(&[0xab; 20], vec![1, 2, 3]).unwrap();
        assert_eq!(t.get(&[0xab; 20]).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn missing_key_is_none() {
        let t = trie();
        assert_eq!(t.get(&[0x00; 20]).unwrap(), None);
    }

    #[test]
    fn overwrite_replaces_value() {
        let mut t = trie();
        t.insert(&[0x01; 20], vec![1]).unwrap();
        t.insert(&[0x01; 20], vec![2]).unwrap();
        assert_eq!(t.get(&[0x01; 20]).unwrap(), Some(vec![2]));
    }

    #[test]
    fn two_keys_sharing_no_prefix_both_resolve() {
        let mut t = trie();
        let mut a = [0u8; 20];
        a[0] = 0x00;
        let mut b = [0u8; 20];
        b[0] = 0xf0;
        t.insert(&a, vec![1]).unwrap();
        t.insert(&b, vec![2]).unwrap();
        assert_eq!(t.get(&a).unwrap(), Some(vec![1]));
        assert_eq!(t.get(&b).unwrap(), Some(vec![2]));
    }

    #[test]
    fn two_keys_sharing_a_prefix_split_into_extension_and_branch() {
        let mut t = trie();
        let a = [0xab; 20];
        let mut b = a;
        b[19] = 0xac;
        t.insert(&a, vec![1]).unwrap();
        t.insert(&b, vec![2]).unwrap();
        assert_eq!(t.get(&a).unwrap(), Some(vec![1]));
        assert_eq!(t.get(&b).unwrap(), Some(vec![2]));
    }

    #[test]
    fn one_key_is_prefix_of_another() {
        let mut t = trie();
        t.insert(&[0x12, 0x34], vec![1]).unwrap();
        t.insert(&[0x12, 0x34, 0x56], vec![2]).unwrap();
        assert_eq!(t.get(&[0x12, 0x34]).unwrap(), Some(vec![1]));
        assert_eq!(t.get(&[0x12, 0x34, 0x56]).unwrap(), Some(vec![2]));
    }

    #[test]
    fn root_is_deterministic_regardless_of_insertion_order() {
        let mut t1 = trie();
        let mut t2 = trie();
        let keys: Vec<[u8; 20]> = vec![[1; 20], [2; 20], [3; 20]];

        for k in &keys {
            t1.insert(k, vec![0xff]).unwrap();
        }
        for k in keys.iter().rev() {
            t2.insert(k, vec![0xff]).unwrap();
        }

        assert_eq!(t1.root_hash(), t2.root_hash());
    }

    #[test]
    fn different_values_produce_different_roots() {
        let mut t1 = trie();
        let mut t2 = trie();
        t1.insert(&[1; 20], vec![1]).unwrap();
        t2.insert(&[1; 20], vec![2]).unwrap();
        assert_ne!(t1.root_hash(), t2.root_hash());
    }

    #[test]
    fn entries_enumerates_all_inserted_keys() {
        let mut t = trie();
        t.insert(&[1; 20], vec![10]).unwrap();
        t.insert(&[2; 20], vec![20]).unwrap();
        t.insert(&[3; 20], vec![30]).unwrap();

        let mut entries = t.entries().unwrap();
        entries.sort();
        let mut expected = vec![
            ([1u8; 20].to_vec(), vec![10]),
            ([2u8; 20].to_vec(), vec![20]),
            ([3u8; 20].to_vec(), vec![30]),
        ];
        expected.sort();
        assert_eq!(entries, expected);
    }

    #[test]
    fn reopening_by_root_hash_reads_committed_state() {
        let mut t1 = trie();
        t1.insert(&[9; 20], vec![7]).unwrap();
        let root = t1.root_hash();

        let mut t2 = trie();
        t2.insert(&[9; 20], vec![7]).unwrap();
        assert_eq!(t2.root_hash(), root);
    }
}
