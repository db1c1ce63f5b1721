//! Core chain types shared by the state trie, the VM, block production and
//! the node runtime: addresses, hashes, accounts, transactions and blocks.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// A 32-byte Keccak256 hash.
pub type Hash = [u8; 32];

/// A 20-byte account address.
pub type Address = [u8; 20];

/// Keccak256 of an empty byte string. The `code_hash` of an externally
/// owned account.
pub const EMPTY_CODE_HASH: Hash = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// `keccak256(rlp::encode(&RlpItem::empty_string()))`: the root hash of a
/// trie with no entries.
pub const EMPTY_TRIE_ROOT: Hash = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
];

/// Keccak256 of a byte slice.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn to_hash(bytes: &[u8]) -> Hash {
    let mut hash = [0u8; 32];
    let start = 32usize.saturating_sub(bytes.len());
    hash[start..].copy_from_slice(bytes);
    hash
}

/// Account state as stored in the world-state trie.
///
/// RLP order: `[nonce, balance, storage_root, code_hash]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Number of transactions sent from this account.
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Root of this account's per-contract storage trie.
    pub storage_root: Hash,
    /// Keccak256 of the account's code. [`EMPTY_CODE_HASH`] for EOAs.
    pub code_hash: Hash,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            storage_root: EMPTY_TRIE_ROOT,
            code_hash: EMPTY_CODE_HASH,
        }
    }
}

impl Account {
    /// RLP-encode this account for trie storage/hashing.
    #[must_use]
    pub fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode(&rlp::RlpItem::List(vec![
            rlp::RlpItem::String(rlp::uint_bytes(self.nonce)),
            rlp::RlpItem::String(rlp::u256_bytes(&self.balance)),
            rlp::RlpItem::String(self.storage_root.to_vec()),
            rlp::RlpItem::String(self.code_hash.to_vec()),
        ]))
    }

    /// Decode an account from its RLP encoding.
    pub fn rlp_decode(data: &[u8]) -> Result<Self, rlp::RlpError> {
        let (item, _) = rlp::decode(data)?;
        let fields = item.as_list().ok_or(rlp::RlpError::EmptyInput)?;
        let nonce = rlp::decode_uint(fields[0].as_string().ok_or(rlp::RlpError::EmptyInput)?);
        let balance = rlp::decode_u256(fields[1].as_string().ok_or(rlp::RlpError::EmptyInput)?);
        let storage_root = to_hash(fields[2].as_string().ok_or(rlp::RlpError::EmptyInput)?);
        let code_hash = to_hash(fields[3].as_string().ok_or(rlp::RlpError::EmptyInput)?);
        Ok(Self {
            nonce,
            balance,
            storage_root,
            code_hash,
        })
    }
}

/// An ECDSA-signed, Homestead-era transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's account nonce at the time of signing.
    pub nonce: u64,
    /// Price per unit of gas, in wei.
    pub gas_price: U256,
    /// Maximum gas this transaction may consume.
    pub gas_limit: u64,
    /// `None` for contract creation, `Some(address)` for a call.
    pub to: Option<Address>,
    /// Wei transferred to `to` (or endowed to the new contract).
    pub value: U256,
    /// Call data, or init code for contract creation.
    pub data: Vec<u8>,
    /// Recovery id (27 or 28, pre-EIP-155).
    pub v: u64,
    /// Signature `r` component.
    pub r: U256,
    /// Signature `s` component.
    pub s: U256,
}

impl Transaction {
    /// RLP-encode the 6 signed fields, used as the ECDSA signing preimage
    /// (as `keccak256` of this encoding).
    #[must_use]
    pub fn rlp_encode_unsigned(&self) -> Vec<u8> {
        rlp::encode(&rlp::RlpItem::List(vec![
            rlp::RlpItem::String(rlp::uint_bytes(self.nonce)),
            rlp::RlpItem::String(rlp::u256_bytes(&self.gas_price)),
            rlp::RlpItem::String(rlp::uint_bytes(self.gas_limit)),
            match self.to {
                Some(addr) => rlp::RlpItem::String(addr.to_vec()),
                None => rlp::RlpItem::empty_string(),
            },
            rlp::RlpItem::String(rlp::u256_bytes(&self.value)),
            rlp::RlpItem::String(self.data.clone()),
        ]))
    }

    /// RLP-encode the full 9-field signed transaction.
    #[must_use]
    pub fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode(&rlp::RlpItem::List(vec![
            rlp::RlpItem::String(rlp::uint_bytes(self.nonce)),
            rlp::RlpItem::String(rlp::u256_bytes(&self.gas_price)),
            rlp::RlpItem::String(rlp::uint_bytes(self.gas_limit)),
            match self.to {
                Some(addr) => rlp::RlpItem::String(addr.to_vec()),
                None => rlp::RlpItem::empty_string(),
            },
            rlp::RlpItem::String(rlp::u256_bytes(&self.value)),
            rlp::RlpItem::String(self.data.clone()),
            rlp::RlpItem::String(rlp::uint_bytes(self.v)),
            rlp::RlpItem::String(rlp::u256_bytes(&self.r)),
            rlp::RlpItem::String(rlp::u256_bytes(&self.s)),
        ]))
    }

    /// The hash used to identify this transaction (Keccak256 of its full
    /// RLP encoding).
    #[must_use]
    pub fn hash(&self) -> Hash {
        keccak256(&self.rlp_encode())
    }

    /// `true` if `to` is absent: this transaction deploys a contract.
    #[must_use]
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

/// A single log entry emitted by `LOG0`-`LOG4`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Contract address that emitted the log.
    pub address: Address,
    /// Indexed topics (0 to 4 entries).
    pub topics: Vec<Hash>,
    /// Unindexed data.
    pub data: Vec<u8>,
}

/// Result of executing a single transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Whether execution completed without a top-level revert.
    pub success: bool,
    /// Total gas consumed after refunds.
    pub gas_used: u64,
    /// Logs emitted during execution.
    pub logs: Vec<Log>,
    /// Address of the newly created contract, if this was a `CREATE` transaction.
    pub contract_address: Option<Address>,
}

/// Block header. Field order matches the RLP wire encoding in full.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hash of the parent block's header.
    pub parent_hash: Hash,
    /// Keccak256 of the RLP-encoded list of uncle headers (empty list
    /// here: this engine doesn't validate uncles, see Non-goals).
    pub ommers_hash: Hash,
    /// Address that receives the block reward and transaction fees.
    pub beneficiary: Address,
    /// Root of the world-state trie after executing this block's
    /// transactions.
    pub state_root: Hash,
    /// Root of the trie built from this block's transactions.
    pub transactions_root: Hash,
    /// Root of the trie built from this block's receipts.
    pub receipts_root: Hash,
    /// Mining difficulty target.
    pub difficulty: u128,
    /// Height of this block; genesis is 0.
    pub number: u64,
    /// Gas limit admissible by the parent's gas limit and the ±1/1024 rule.
    pub gas_limit: u64,
    /// Sum of `gas_used` across all transactions in this block.
    pub gas_used: u64,
    /// Unix timestamp, strictly greater than the parent's.
    pub timestamp: u64,
    /// Arbitrary extra data, limited to 32 bytes.
    pub extra_data: Vec<u8>,
}

impl BlockHeader {
    /// RLP-encode this header for hashing and wire transfer.
    #[must_use]
    pub fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode(&rlp::RlpItem::List(vec![
            rlp::RlpItem::String(self.parent_hash.to_vec()),
            rlp::RlpItem::String(self.ommers_hash.to_vec()),
            rlp::RlpItem::String(self.beneficiary.to_vec()),
            rlp::RlpItem::String(self.state_root.to_vec()),
            rlp::RlpItem::String(self.transactions_root.to_vec()),
            rlp::RlpItem::String(self.receipts_root.to_vec()),
            rlp::RlpItem::String(rlp::u128_bytes(self.difficulty)),
            rlp::RlpItem::String(rlp::uint_bytes(self.number)),
            rlp::RlpItem::String(rlp::uint_bytes(self.gas_limit)),
            rlp::RlpItem::String(rlp::uint_bytes(self.gas_used)),
            rlp::RlpItem::String(rlp::uint_bytes(self.timestamp)),
            rlp::RlpItem::String(self.extra_data.clone()),
        ]))
    }

    /// Keccak256 of this header's RLP encoding: the block hash.
    #[must_use]
    pub fn hash(&self) -> Hash {
        keccak256(&self.rlp_encode())
    }
}

/// A block: header plus the transactions it contains.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Transactions included in this block, in execution order.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// This block's hash (its header's hash).
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}
