//! Genesis block construction
//!
//! Builds block 0: no parent, no transactions, an empty state unless initial
//! allocations are supplied, and the configured starting difficulty.

use shared_types::{Block, BlockHeader, EMPTY_TRIE_ROOT};

use crate::domain::difficulty::DifficultyConfig;

/// An account balance to seed into the empty world state before genesis.
#[derive(Clone, Debug)]
pub struct GenesisAllocation {
    /// Address to credit.
    pub address: shared_types::Address,
    /// Opening balance, in wei.
    pub balance: primitive_types::U256,
}

/// Genesis block configuration.
#[derive(Clone, Debug)]
pub struct GenesisConfig {
    /// Genesis timestamp (Unix epoch seconds).
    pub timestamp: u64,
    /// Starting gas limit.
    pub gas_limit: u64,
    /// Extra data recorded in the header (client banner, fork marker).
    pub extra_data: Vec<u8>,
    /// Initial balances. The caller is responsible for crediting these in
    /// the backing state store before executing block 1; genesis itself
    /// carries no transactions.
    pub allocations: Vec<GenesisAllocation>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            timestamp: 0,
            gas_limit: 5_000_000,
            extra_data: Vec::new(),
            allocations: Vec::new(),
        }
    }
}

/// Builds the genesis block. The state root is [`EMPTY_TRIE_ROOT`] unless
/// the caller has already credited `config.allocations` into the backing
/// store and passes the resulting root in separately — genesis has no
/// transactions to derive one from.
#[must_use]
pub fn create_genesis_block(config: &GenesisConfig, state_root: shared_types::Hash) -> Block {
    let header = BlockHeader {
        parent_hash: [0u8; 32],
        ommers_hash: shared_types::keccak256(&rlp::encode(&rlp::RlpItem::List(vec![]))),
        beneficiary: [0u8; 20],
        state_root,
        transactions_root: EMPTY_TRIE_ROOT,
        receipts_root: EMPTY_TRIE_ROOT,
        difficulty: DifficultyConfig::default().genesis_difficulty.as_u128(),
        number: 0,
        gas_limit: config.gas_limit,
        gas_used: 0,
        timestamp: config.timestamp,
        extra_data: config.extra_data.clone(),
    };

    Block { header, transactions: Vec::new() }
}
