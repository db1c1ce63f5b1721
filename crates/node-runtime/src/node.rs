//! The synchronous chain: world state, the block tree, and the glue that
//! turns a parent block plus a set of transactions into a child block.

use primitive_types::U256;
use qc_04_state_management::NodeStore;
use qc_11_smart_contracts::adapters::state_adapter::StateAdapter;
use qc_11_smart_contracts::domain::value_objects::Address as VmAddress;
use qc_11_smart_contracts::ports::outbound::BlockHashOracle;
use shared_types::{keccak256, Address, Block, BlockHeader, Hash, Receipt, Transaction};
use thiserror::Error;
use tracing::info;

use qc_17_block_production::domain::block_assembly::add_transactions_to_block;
use qc_17_block_production::domain::block_tree::{BlockTree, NoPath};
use qc_17_block_production::domain::difficulty::{BlockInfo, DifficultyAdjuster, DifficultyConfig};
use qc_17_block_production::domain::genesis::{create_genesis_block, GenesisConfig};

/// Errors produced while driving the chain.
#[derive(Debug, Error)]
pub enum NodeError {
    /// `produce_block` was given a parent hash not present in the tree.
    #[error("unknown parent block")]
    UnknownParent,
    /// Block assembly (execution, trie roots) failed.
    #[error("block assembly failed: {0}")]
    Assembly(#[from] qc_17_block_production::BlockProductionError),
}

impl From<NoPath> for NodeError {
    fn from(_: NoPath) -> Self {
        Self::UnknownParent
    }
}

/// Resolves `BLOCKHASH` lookups by walking the parent-hash chain backwards
/// from `tip` through a [`BlockTree`]. Stops at 256 blocks back, matching
/// the historical window the `BLOCKHASH` opcode is specified to expose.
pub struct ChainHashOracle<'a> {
    tree: &'a BlockTree,
    tip: Hash,
}

impl<'a> ChainHashOracle<'a> {
    /// Builds an oracle that answers `BLOCKHASH` queries relative to `tip`.
    #[must_use]
    pub fn new(tree: &'a BlockTree, tip: Hash) -> Self {
        Self { tree, tip }
    }
}

impl<'a> BlockHashOracle for ChainHashOracle<'a> {
    fn get_block_hash(
        &self,
        number: u64,
        current_number: u64,
    ) -> Option<qc_11_smart_contracts::domain::value_objects::Hash> {
        if number >= current_number || current_number - number > 256 {
            return None;
        }

        let mut cursor = self.tip;
        loop {
            let header = self.tree.get(&cursor)?;
            if header.number == number {
                return Some(qc_11_smart_contracts::domain::value_objects::Hash::new(cursor));
            }
            if header.number < number {
                return None;
            }
            cursor = header.parent_hash;
        }
    }
}

fn empty_list_hash() -> Hash {
    keccak256(&rlp::encode(&rlp::RlpItem::List(Vec::new())))
}

/// A running chain: world state plus the block tree built on top of it.
pub struct Node<S: NodeStore + Clone + Send + Sync> {
    state: StateAdapter<S>,
    tree: BlockTree,
    difficulty: DifficultyAdjuster,
}

impl<S: NodeStore + Clone + Send + Sync> Node<S> {
    /// Builds a fresh chain: an empty world state seeded with
    /// `config.allocations`, and a block tree rooted at the resulting
    /// genesis block.
    pub fn genesis(store: S, config: GenesisConfig) -> Result<Self, NodeError> {
        let state = StateAdapter::empty(store);
        for allocation in &config.allocations {
            state
                .credit(VmAddress::new(allocation.address), allocation.balance)
                .map_err(|e| NodeError::Assembly(e.into()))?;
        }

        let state_root = *state.root_hash().as_bytes();
        let genesis_block = create_genesis_block(&config, state_root);
        info!(
            number = genesis_block.header.number,
            difficulty = genesis_block.header.difficulty,
            "genesis block created"
        );

        let tree = BlockTree::new(genesis_block.header);
        Ok(Self { state, tree, difficulty: DifficultyAdjuster::new(DifficultyConfig::default()) })
    }

    /// The tree of every block seen since genesis.
    #[must_use]
    pub fn tree(&self) -> &BlockTree {
        &self.tree
    }

    /// The hash of the canonical tip.
    #[must_use]
    pub fn canonical_tip(&self) -> Hash {
        self.tree.canonical_tip()
    }

    /// Assembles and commits a child of `parent_hash`: derives its
    /// difficulty from the parent, executes `transactions` against world
    /// state, and adds the resulting block to the tree.
    pub fn produce_block(
        &mut self,
        parent_hash: Hash,
        beneficiary: Address,
        timestamp: u64,
        extra_data: Vec<u8>,
        transactions: Vec<Transaction>,
    ) -> Result<(Block, Vec<Receipt>), NodeError> {
        let parent = self.tree.get(&parent_hash).cloned().ok_or(NodeError::UnknownParent)?;

        let parent_info = BlockInfo {
            height: parent.number,
            timestamp: parent.timestamp,
            difficulty: U256::from(parent.difficulty),
        };
        let difficulty = self.difficulty.calculate_next_difficulty(&parent_info, timestamp);

        let mut header = BlockHeader {
            parent_hash,
            ommers_hash: empty_list_hash(),
            beneficiary,
            state_root: [0u8; 32],
            transactions_root: shared_types::EMPTY_TRIE_ROOT,
            receipts_root: shared_types::EMPTY_TRIE_ROOT,
            difficulty: difficulty.as_u128(),
            number: parent.number + 1,
            gas_limit: parent.gas_limit,
            gas_used: 0,
            timestamp,
            extra_data,
        };

        let oracle = ChainHashOracle::new(&self.tree, parent_hash);
        let receipts = add_transactions_to_block(&mut header, &transactions, &self.state, &oracle)?;

        self.tree.add_block(header.clone())?;
        info!(number = header.number, transactions = transactions.len(), "block produced");

        Ok((Block { header, transactions }, receipts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_04_state_management::InMemoryNodeStore;
    use qc_17_block_production::domain::genesis::GenesisAllocation;
    use shared_crypto::Secp256k1KeyPair;
    use std::sync::Arc;

    fn node_with_faucet(faucet: [u8; 20], balance: U256) -> Node<Arc<InMemoryNodeStore>> {
        let config = GenesisConfig {
            allocations: vec![GenesisAllocation { address: faucet, balance }],
            ..GenesisConfig::default()
        };
        Node::genesis(Arc::new(InMemoryNodeStore::new()), config).unwrap()
    }

    fn signed_transfer(keypair: &Secp256k1KeyPair, to: [u8; 20], nonce: u64, value: U256) -> Transaction {
        let mut tx = Transaction {
            nonce,
            gas_price: U256::from(1u64),
            gas_limit: 21_000,
            to: Some(to),
            value,
            data: Vec::new(),
            v: 0,
            r: U256::zero(),
            s: U256::zero(),
        };
        let hash = keccak256(&tx.rlp_encode_unsigned());
        let (signature, recovery_byte) = keypair.sign_recoverable(&hash);
        let bytes = signature.as_bytes();
        tx.v = u64::from(recovery_byte) + 27;
        tx.r = U256::from_big_endian(&bytes[..32]);
        tx.s = U256::from_big_endian(&bytes[32..]);
        tx
    }

    #[test]
    fn genesis_has_height_zero_and_is_the_canonical_tip() {
        let node = node_with_faucet([1u8; 20], U256::from(1u64));
        let tip = node.canonical_tip();
        assert_eq!(node.tree().get(&tip).unwrap().number, 0);
    }

    #[test]
    fn producing_a_block_extends_the_canonical_chain() {
        let sender = Secp256k1KeyPair::generate();
        let mut node = node_with_faucet(sender.address(), U256::from(10_000_000u64));
        let genesis_hash = node.canonical_tip();

        let tx = signed_transfer(&sender, [9u8; 20], 0, U256::from(1_000u64));
        let (block, receipts) = node
            .produce_block(genesis_hash, [2u8; 20], 15, Vec::new(), vec![tx])
            .unwrap();

        assert_eq!(block.header.number, 1);
        assert_eq!(block.header.parent_hash, genesis_hash);
        assert!(receipts[0].success);
        assert_eq!(node.canonical_tip(), block.header.hash());
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut node = node_with_faucet([1u8; 20], U256::from(1u64));
        let result = node.produce_block([0xffu8; 32], [2u8; 20], 15, Vec::new(), Vec::new());
        assert!(matches!(result, Err(NodeError::UnknownParent)));
    }
}
