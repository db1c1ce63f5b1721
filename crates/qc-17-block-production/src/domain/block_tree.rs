//! Block tree
//!
//! A tree of block headers rooted at a sentinel, with genesis as its only
//! child. Each node tracks `total_difficulty`, the cumulative PoW work from
//! genesis to that node; the canonical tip is whichever leaf has the
//! largest `total_difficulty`, ties broken by whichever was inserted first.

use std::collections::HashMap;

use shared_types::{BlockHeader, Hash};

struct Node {
    header: BlockHeader,
    total_difficulty: u128,
    children: Vec<Hash>,
    insertion_order: u64,
}

/// Error returned when a block's parent isn't in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no path to parent block")]
pub struct NoPath;

/// Tracks every block seen since genesis and the canonical chain among them.
pub struct BlockTree {
    nodes: HashMap<Hash, Node>,
    genesis_hash: Hash,
    next_insertion_order: u64,
}

impl BlockTree {
    /// Starts a tree rooted at `genesis`.
    #[must_use]
    pub fn new(genesis: BlockHeader) -> Self {
        let hash = genesis.hash();
        let mut nodes = HashMap::new();
        nodes.insert(
            hash,
            Node {
                total_difficulty: genesis.difficulty,
                header: genesis,
                children: Vec::new(),
                insertion_order: 0,
            },
        );
        Self { nodes, genesis_hash: hash, next_insertion_order: 1 }
    }

    /// The hash of the tree's root.
    #[must_use]
    pub fn genesis_hash(&self) -> Hash {
        self.genesis_hash
    }

    /// Adds `header` as a child of its parent, which must already be in the
    /// tree.
    ///
    /// # Errors
    ///
    /// Returns [`NoPath`] if `header.parent_hash` isn't a known node.
    pub fn add_block(&mut self, header: BlockHeader) -> Result<Hash, NoPath> {
        let parent_hash = header.parent_hash;
        let parent_total_difficulty = self.nodes.get(&parent_hash).ok_or(NoPath)?.total_difficulty;

        let hash = header.hash();
        let total_difficulty = parent_total_difficulty.saturating_add(header.difficulty);
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;

        self.nodes.insert(hash, Node { header, total_difficulty, children: Vec::new(), insertion_order: order });
        self.nodes.get_mut(&parent_hash).expect("just looked up").children.push(hash);

        Ok(hash)
    }

    /// The header at `hash`, if it's in the tree.
    #[must_use]
    pub fn get(&self, hash: &Hash) -> Option<&BlockHeader> {
        self.nodes.get(hash).map(|n| &n.header)
    }

    /// The cumulative difficulty from genesis through `hash`.
    #[must_use]
    pub fn total_difficulty(&self, hash: &Hash) -> Option<u128> {
        self.nodes.get(hash).map(|n| n.total_difficulty)
    }

    /// Direct children of `hash`, empty if `hash` is unknown or a leaf.
    #[must_use]
    pub fn children(&self, hash: &Hash) -> &[Hash] {
        self.nodes.get(hash).map_or(&[], |n| n.children.as_slice())
    }

    /// The hash of the canonical tip: the node with the greatest
    /// `total_difficulty`, ties broken by whichever was inserted first.
    #[must_use]
    pub fn canonical_tip(&self) -> Hash {
        self.nodes
            .iter()
            .max_by(|(_, a), (_, b)| {
                a.total_difficulty
                    .cmp(&b.total_difficulty)
                    .then(b.insertion_order.cmp(&a.insertion_order))
            })
            .map(|(hash, _)| *hash)
            .unwrap_or(self.genesis_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(parent_hash: Hash, number: u64, difficulty: u128) -> BlockHeader {
        BlockHeader {
            parent_hash,
            ommers_hash: [0u8; 32],
            beneficiary: [0u8; 20],
            state_root: [0u8; 32],
            transactions_root: shared_types::EMPTY_TRIE_ROOT,
            receipts_root: shared_types::EMPTY_TRIE_ROOT,
            difficulty,
            number,
            gas_limit: 5_000_000,
            gas_used: 0,
            timestamp: number,
            extra_data: Vec::new(),
        }
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut tree = BlockTree::new(header([0u8; 32], 0, 100));
        let orphan = header([9u8; 32], 5, 100);
        assert_eq!(tree.add_block(orphan), Err(NoPath));
    }

    #[test]
    fn total_difficulty_accumulates_along_the_chain() {
        let genesis = header([0u8; 32], 0, 100);
        let genesis_hash = genesis.hash();
        let mut tree = BlockTree::new(genesis);

        let b1 = header(genesis_hash, 1, 50);
        let b1_hash = tree.add_block(b1).unwrap();

        let b2 = header(b1_hash, 2, 60);
        let b2_hash = tree.add_block(b2).unwrap();

        assert_eq!(tree.total_difficulty(&b2_hash), Some(210));
        assert_eq!(tree.canonical_tip(), b2_hash);
    }

    #[test]
    fn canonical_tip_picks_the_heavier_fork() {
        let genesis = header([0u8; 32], 0, 100);
        let genesis_hash = genesis.hash();
        let mut tree = BlockTree::new(genesis);

        let light = header(genesis_hash, 1, 10);
        let light_hash = tree.add_block(light).unwrap();

        let mut heavy = header(genesis_hash, 1, 10);
        heavy.extra_data = vec![1];
        let heavy_hash = tree.add_block(heavy).unwrap();
        assert_ne!(light_hash, heavy_hash);

        let heavier_child = header(heavy_hash, 2, 500);
        let heavier_child_hash = tree.add_block(heavier_child).unwrap();

        assert_eq!(tree.canonical_tip(), heavier_child_hash);
    }

    #[test]
    fn ties_break_toward_first_seen() {
        let genesis = header([0u8; 32], 0, 100);
        let genesis_hash = genesis.hash();
        let mut tree = BlockTree::new(genesis);

        let mut first = header(genesis_hash, 1, 10);
        first.extra_data = vec![1];
        let first_hash = tree.add_block(first).unwrap();

        let mut second = header(genesis_hash, 1, 10);
        second.extra_data = vec![2];
        tree.add_block(second).unwrap();

        assert_eq!(tree.canonical_tip(), first_hash);
    }
}
