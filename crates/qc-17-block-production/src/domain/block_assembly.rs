//! Block assembly
//!
//! `add_transactions_to_block` applies a block's transactions sequentially
//! against world state, threading each transaction's post-state into the
//! next, and fills in the header fields that only exist once execution has
//! run: the state root, the transactions/receipts trie roots, and the
//! cumulative gas used.

use primitive_types::U256;
use qc_04_state_management::adapters::InMemoryNodeStore;
use qc_04_state_management::domain::Trie;
use qc_04_state_management::NodeStore;
use qc_11_smart_contracts::adapters::state_adapter::StateAdapter;
use qc_11_smart_contracts::domain::entities::BlockContext;
use qc_11_smart_contracts::domain::value_objects::{Address as VmAddress, Bytes as VmBytes, Hash as VmHash};
use qc_11_smart_contracts::executor::Executor;
use qc_11_smart_contracts::ports::inbound::{BatchExecutor, SignedTransaction, SmartContractApi};
use qc_11_smart_contracts::ports::outbound::BlockHashOracle;
use shared_types::{BlockHeader, Log, Receipt, Transaction};
use tracing::debug;

use crate::error::{BlockProductionError, Result};

fn recover_sender(tx: &Transaction) -> Result<shared_types::Address> {
    let hash = shared_types::keccak256(&tx.rlp_encode_unsigned());
    let mut r = [0u8; 32];
    tx.r.to_big_endian(&mut r);
    let mut s = [0u8; 32];
    tx.s.to_big_endian(&mut s);

    shared_crypto::ecdsa_recover(&hash, tx.v as u8, &r, &s)
        .map_err(|_| BlockProductionError::InvalidSignature)
}

fn to_signed_transaction(tx: &Transaction) -> Result<SignedTransaction> {
    let from = recover_sender(tx)?;
    Ok(SignedTransaction {
        from: VmAddress::new(from),
        to: tx.to.map(VmAddress::new),
        value: tx.value,
        nonce: tx.nonce,
        gas_price: tx.gas_price,
        gas_limit: tx.gas_limit,
        data: VmBytes::from_slice(&tx.data),
        hash: VmHash::new(tx.hash()),
    })
}

fn to_shared_log(log: &qc_11_smart_contracts::domain::entities::Log) -> Log {
    Log {
        address: *log.address.as_bytes(),
        topics: log.topics.iter().map(|h| *h.as_bytes()).collect(),
        data: log.data.as_slice().to_vec(),
    }
}

/// Applies `transactions` against `state` in order, filling in `header`'s
/// derived fields as it goes. Returns one receipt per transaction.
///
/// `header.difficulty`/`gas_limit`/`number`/`timestamp`/`beneficiary` must
/// already be set by the caller (see [`crate::domain::difficulty`]); this
/// only fills in what execution itself produces.
pub fn add_transactions_to_block<S: NodeStore + Clone + Send + Sync>(
    header: &mut BlockHeader,
    transactions: &[Transaction],
    state: &StateAdapter<S>,
    block_hashes: &dyn BlockHashOracle,
) -> Result<Vec<Receipt>> {
    let block_context = BlockContext {
        number: header.number,
        timestamp: header.timestamp,
        coinbase: VmAddress::new(header.beneficiary),
        difficulty: U256::from(header.difficulty),
        gas_limit: header.gas_limit,
    };

    let executor = Executor::new(state, block_hashes);
    let signed: Vec<SignedTransaction> = transactions
        .iter()
        .map(to_signed_transaction)
        .collect::<Result<_>>()?;

    let tx_store = InMemoryNodeStore::new();
    let mut tx_trie = Trie::new(tx_store);
    let receipt_store = InMemoryNodeStore::new();
    let mut receipt_trie = Trie::new(receipt_store);

    let receipts = executor.execute_batch(&signed, &block_context)?;
    let mut shared_receipts = Vec::with_capacity(receipts.len());

    for (index, (tx, receipt)) in transactions.iter().zip(receipts.iter()).enumerate() {
        let shared_receipt = Receipt {
            success: receipt.success,
            gas_used: receipt.gas_used,
            logs: receipt.logs.iter().map(to_shared_log).collect(),
            contract_address: receipt.contract_address.map(|a| *a.as_bytes()),
        };

        let key = rlp::encode_uint(index as u64);
        tx_trie.insert(&key, tx.rlp_encode())?;
        receipt_trie.insert(&key, encode_receipt(&shared_receipt))?;

        shared_receipts.push(shared_receipt);
    }

    header.transactions_root = tx_trie.root_hash();
    header.receipts_root = receipt_trie.root_hash();
    header.gas_used = receipts.last().map_or(0, |r| r.cumulative_gas_used);
    header.state_root = *state.root_hash().as_bytes();

    debug!(
        number = header.number,
        transactions = transactions.len(),
        gas_used = header.gas_used,
        "block assembled"
    );

    Ok(shared_receipts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_04_state_management::InMemoryNodeStore;
    use qc_11_smart_contracts::ports::outbound::StateAccess;
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::EMPTY_TRIE_ROOT;
    use std::sync::Arc;

    struct NoHistory;
    impl BlockHashOracle for NoHistory {
        fn get_block_hash(
            &self,
            _number: u64,
            _current_number: u64,
        ) -> Option<qc_11_smart_contracts::domain::value_objects::Hash> {
            None
        }
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

        let hash = shared_types::keccak256(&tx.rlp_encode_unsigned());
        let (signature, recovery_byte) = keypair.sign_recoverable(&hash);
        let bytes = signature.as_bytes();
        tx.v = u64::from(recovery_byte) + 27;
        tx.r = U256::from_big_endian(&bytes[..32]);
        tx.s = U256::from_big_endian(&bytes[32..]);
        tx
    }

    fn header(number: u64) -> BlockHeader {
        BlockHeader {
            parent_hash: [0u8; 32],
            ommers_hash: [0u8; 32],
            beneficiary: [7u8; 20],
            state_root: EMPTY_TRIE_ROOT,
            transactions_root: EMPTY_TRIE_ROOT,
            receipts_root: EMPTY_TRIE_ROOT,
            difficulty: 131_072,
            number,
            gas_limit: 5_000_000,
            gas_used: 0,
            timestamp: 100,
            extra_data: Vec::new(),
        }
    }

    #[test]
    fn applies_a_value_transfer_and_fills_in_derived_fields() {
        let sender = Secp256k1KeyPair::generate();
        let recipient = [9u8; 20];

        let state = StateAdapter::empty(Arc::new(InMemoryNodeStore::new()));
        state
            .credit(VmAddress::new(sender.address()), U256::from(1_000_000u64))
            .unwrap();

        let tx = signed_transfer(&sender, recipient, 0, U256::from(1_000u64));
        let mut head = header(1);
        let oracle = NoHistory;

        let receipts = add_transactions_to_block(&mut head, &[tx], &state, &oracle).unwrap();

        assert_eq!(receipts.len(), 1);
        assert!(receipts[0].success);
        assert_ne!(head.transactions_root, EMPTY_TRIE_ROOT);
        assert_ne!(head.receipts_root, EMPTY_TRIE_ROOT);
        assert_eq!(head.gas_used, receipts[0].gas_used);
        assert_eq!(
            state.get_balance(VmAddress::new(recipient)).unwrap(),
            U256::from(1_000u64)
        );
    }

    #[test]
    fn empty_transaction_list_leaves_empty_roots() {
        let state = StateAdapter::empty(Arc::new(InMemoryNodeStore::new()));
        let mut head = header(1);
        let oracle = NoHistory;

        let receipts = add_transactions_to_block(&mut head, &[], &state, &oracle).unwrap();

        assert!(receipts.is_empty());
        assert_eq!(head.transactions_root, EMPTY_TRIE_ROOT);
        assert_eq!(head.receipts_root, EMPTY_TRIE_ROOT);
        assert_eq!(head.gas_used, 0);
    }
}

fn encode_receipt(receipt: &Receipt) -> Vec<u8> {
    rlp::encode(&rlp::RlpItem::List(vec![
        rlp::RlpItem::String(vec![u8::from(receipt.success)]),
        rlp::RlpItem::String(rlp::uint_bytes(receipt.gas_used)),
        rlp::RlpItem::List(
            receipt
                .logs
                .iter()
                .map(|log| {
                    rlp::RlpItem::List(vec![
                        rlp::RlpItem::String(log.address.to_vec()),
                        rlp::RlpItem::List(
                            log.topics.iter().map(|t| rlp::RlpItem::String(t.to_vec())).collect(),
                        ),
                        rlp::RlpItem::String(log.data.clone()),
                    ])
                })
                .collect(),
        ),
        match receipt.contract_address {
            Some(addr) => rlp::RlpItem::String(addr.to_vec()),
            None => rlp::RlpItem::empty_string(),
        },
    ]))
}
