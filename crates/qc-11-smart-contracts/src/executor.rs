//! # Transaction Executor
//!
//! Drives a single [`SignedTransaction`] or a block's worth of them through
//! the [`Interpreter`], applying the intrinsic-gas/value/fee accounting that
//! sits outside a call frame: gas prepayment, the sender/contract value
//! transfer, code deposit for contract creation, the gas refund, and the
//! miner fee. The interpreter itself only ever sees a single frame's gas
//! budget; everything transaction-shaped happens here.

use crate::adapters::state_adapter::StateAdapter;
use crate::domain::entities::{BlockContext, ExecutionContext, ExecutionResult, StateChange};
use crate::domain::invariants::{check_all_invariants, InvariantCheckResult};
use crate::domain::services::{compute_contract_address, estimate_base_gas};
use crate::domain::value_objects::{Address, Bytes, StorageValue, U256};
use crate::errors::VmError;
use crate::evm::gas::{self, costs};
use crate::evm::Interpreter;
use crate::ports::inbound::{BatchExecutor, SignedTransaction, SmartContractApi, TransactionReceipt};
use crate::ports::outbound::{BlockHashOracle, StateAccess};
use qc_04_state_management::NodeStore;
use tracing::{debug, instrument, warn};

/// Runs a single call frame, translating an ordinary (non-fatal) `VmError`
/// into a failed `ExecutionResult` rather than letting it propagate.
///
/// This mirrors exactly how the interpreter's own `CALL`/`CREATE` handlers
/// treat a child frame's error: only `VmError::StateFault` is a real fault
/// worth aborting the caller over, everything else is just how untrusted
/// bytecode fails.
fn run_frame<S: StateAccess>(
    context: ExecutionContext,
    code: &[u8],
    state: &S,
    block_hashes: &dyn BlockHashOracle,
) -> Result<ExecutionResult, VmError> {
    let gas_limit = context.gas_limit;
    let mut interpreter = Interpreter::new(context, code, state, block_hashes);
    match interpreter.execute() {
        Ok(result) => Ok(result),
        Err(VmError::StateFault(msg)) => Err(VmError::StateFault(msg)),
        Err(e) => Ok(ExecutionResult::failure(e.to_string(), gas_limit)),
    }
}

/// Applies one queued state change to world state. Called only once the
/// frame that produced it (and every frame above it, up to the transaction)
/// has succeeded.
fn apply_state_change<S: NodeStore + Clone>(
    state: &StateAdapter<S>,
    change: &StateChange,
) -> Result<(), VmError> {
    let fault = |e: qc_04_state_management::StateError| VmError::StateFault(e.to_string());
    match change {
        StateChange::BalanceTransfer { from, to, amount } => {
            state.debit(*from, *amount).map_err(fault)?;
            state.credit(*to, *amount).map_err(fault)?;
        }
        StateChange::StorageWrite { address, key, value } => {
            state.set_storage(*address, *key, *value).map_err(fault)?;
        }
        StateChange::StorageDelete { address, key } => {
            state
                .set_storage(*address, *key, StorageValue::from_u256(U256::zero()))
                .map_err(fault)?;
        }
        StateChange::ContractCreate { address, code } => {
            state.set_code(*address, code.clone()).map_err(fault)?;
        }
        StateChange::ContractDestroy { address, .. } => {
            state.destroy(*address).map_err(fault)?;
        }
        StateChange::NonceIncrement { address } => {
            state.increment_nonce(*address).map_err(fault)?;
        }
    }
    Ok(())
}

/// Executes a signed transaction against `state`, committing its effects on
/// success: gas is prepaid up front, the sender's nonce is incremented
/// unconditionally, and on success the queued state changes (plus the
/// top-level value transfer and, for a contract creation, the deployed
/// code) are applied and the unused gas and refund are paid back.
#[instrument(skip(state, block_hashes, tx, block), fields(tx_hash = ?tx.hash))]
pub fn execute_transaction<S: NodeStore + Clone>(
    state: &StateAdapter<S>,
    block_hashes: &dyn BlockHashOracle,
    tx: &SignedTransaction,
    block: &BlockContext,
) -> Result<ExecutionResult, VmError> {
    let is_creation = tx.is_contract_creation();
    let intrinsic_gas = estimate_base_gas(tx.data.as_slice(), is_creation);

    if intrinsic_gas > tx.gas_limit {
        return Ok(ExecutionResult::failure("intrinsic gas exceeds gas limit", tx.gas_limit));
    }

    let fault = |e: qc_04_state_management::StateError| VmError::StateFault(e.to_string());

    let account_nonce = state.get_nonce(tx.sender()).map_err(fault)?;
    if tx.nonce != account_nonce {
        return Ok(ExecutionResult::failure(
            format!("nonce mismatch: tx has {}, account has {account_nonce}", tx.nonce),
            0,
        ));
    }

    let upfront_cost = tx.gas_price.saturating_mul(U256::from(tx.gas_limit));
    if state.debit(tx.sender(), upfront_cost).is_err() {
        return Ok(ExecutionResult::failure("insufficient balance for gas", 0));
    }
    state.increment_nonce(tx.sender()).map_err(fault)?;

    let sender_balance = state.get_balance(tx.sender()).map_err(fault)?;
    if tx.value > sender_balance {
        state.credit(tx.sender(), upfront_cost).map_err(fault)?;
        return Ok(ExecutionResult::failure("insufficient balance for value", intrinsic_gas));
    }

    let target = if is_creation {
        let creator_nonce = state.get_nonce(tx.sender()).map_err(fault)? - 1;
        compute_contract_address(tx.sender(), creator_nonce)
    } else {
        tx.to.expect("is_contract_creation() checked above")
    };

    let code = if is_creation {
        tx.data.clone()
    } else {
        state.get_code(target).map_err(fault)?
    };
    let input = if is_creation { Bytes::new() } else { tx.data.clone() };
    let gas_for_execution = tx.gas_limit - intrinsic_gas;

    let context = ExecutionContext::new_transaction(
        tx.sender(),
        target,
        tx.value,
        input,
        gas_for_execution,
        tx.gas_price,
        block.clone(),
    );

    let vm_config = crate::domain::entities::VmConfig::default();
    let mut result = run_frame(context.clone(), code.as_slice(), state, block_hashes)?;

    if let InvariantCheckResult::Invalid(violations) = check_all_invariants(&context, &result, &vm_config) {
        warn!(?violations, "execution invariant violated");
    }

    let mut total_gas_used = intrinsic_gas + result.gas_used;

    if result.success && is_creation {
        let deposit_cost = costs::CODEDEPOSIT * result.output.len() as u64;
        if total_gas_used + deposit_cost > tx.gas_limit {
            result = ExecutionResult::out_of_gas(tx.gas_limit);
            total_gas_used = tx.gas_limit;
        } else {
            total_gas_used += deposit_cost;
        }
    }

    if result.success {
        let mut changes = std::mem::take(&mut result.state_changes);
        if !tx.value.is_zero() {
            changes.insert(
                0,
                StateChange::BalanceTransfer {
                    from: tx.sender(),
                    to: target,
                    amount: tx.value,
                },
            );
        }
        if is_creation {
            changes.push(StateChange::ContractCreate {
                address: target,
                code: result.output.clone(),
            });
        }
        for change in &changes {
            apply_state_change(state, change)?;
        }
        result.state_changes = changes;
    }

    let refund = gas::calculate_refund(total_gas_used, result.gas_refund);
    let actual_gas_used = total_gas_used - refund;
    let gas_to_return = tx.gas_limit - actual_gas_used;

    state.credit(tx.sender(), tx.gas_price.saturating_mul(U256::from(gas_to_return))).map_err(fault)?;
    state
        .credit(block.coinbase, tx.gas_price.saturating_mul(U256::from(actual_gas_used)))
        .map_err(fault)?;

    debug!(gas_used = actual_gas_used, success = result.success, "transaction executed");
    result.gas_used = actual_gas_used;
    Ok(result)
}

/// Facade over a [`StateAdapter`] implementing the subsystem's driving ports.
pub struct Executor<'a, S: NodeStore + Clone> {
    state: &'a StateAdapter<S>,
    block_hashes: &'a dyn BlockHashOracle,
}

impl<'a, S: NodeStore + Clone> Executor<'a, S> {
    /// Creates a new executor over `state`, resolving `BLOCKHASH` via `block_hashes`.
    #[must_use]
    pub fn new(state: &'a StateAdapter<S>, block_hashes: &'a dyn BlockHashOracle) -> Self {
        Self { state, block_hashes }
    }
}

impl<'a, S: NodeStore + Clone + Send + Sync> SmartContractApi for Executor<'a, S> {
    fn execute(&self, context: ExecutionContext, code: &[u8]) -> Result<ExecutionResult, VmError> {
        run_frame(context, code, self.state, self.block_hashes)
    }

    fn execute_transaction(
        &self,
        tx: &SignedTransaction,
        block: &BlockContext,
    ) -> Result<ExecutionResult, VmError> {
        execute_transaction(self.state, self.block_hashes, tx, block)
    }

    fn estimate_gas(&self, context: ExecutionContext, code: &[u8]) -> Result<u64, VmError> {
        let mut ctx = context;
        ctx.gas_limit = crate::domain::entities::VmConfig::BLOCK_GAS_LIMIT;

        let result = self.execute(ctx, code)?;
        Ok(result.gas_used + result.gas_used / 10)
    }

    fn call(&self, context: ExecutionContext, code: &[u8]) -> Result<Bytes, VmError> {
        let result = self.execute(context, code)?;
        if result.success {
            Ok(result.output)
        } else {
            Err(VmError::Reverted(result.revert_reason))
        }
    }
}

impl<'a, S: NodeStore + Clone + Send + Sync> BatchExecutor for Executor<'a, S> {
    fn execute_batch(
        &self,
        transactions: &[SignedTransaction],
        block: &BlockContext,
    ) -> Result<Vec<TransactionReceipt>, VmError> {
        let mut receipts = Vec::with_capacity(transactions.len());
        let mut cumulative_gas_used = 0u64;

        for tx in transactions {
            let result = self.execute_transaction(tx, block)?;
            cumulative_gas_used += result.gas_used;

            let contract_address = if tx.is_contract_creation() && result.success {
                result
                    .state_changes
                    .iter()
                    .find_map(|c| match c {
                        StateChange::ContractCreate { address, .. } => Some(*address),
                        _ => None,
                    })
            } else {
                None
            };

            receipts.push(TransactionReceipt {
                tx_hash: tx.hash(),
                success: result.success,
                gas_used: result.gas_used,
                cumulative_gas_used,
                output: result.output,
                logs: result.logs,
                contract_address,
            });
        }

        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::state_adapter::StateAdapter;
    use crate::domain::value_objects::Hash;
    use qc_04_state_management::InMemoryNodeStore;
    use std::sync::Arc;

    struct NoHistory;
    impl BlockHashOracle for NoHistory {
        fn get_block_hash(&self, _number: u64, _current_number: u64) -> Option<Hash> {
            None
        }
    }

    fn state() -> StateAdapter<Arc<InMemoryNodeStore>> {
        StateAdapter::empty(Arc::new(InMemoryNodeStore::new()))
    }

    fn plain_transfer(from: Address, to: Address, value: U256) -> SignedTransaction {
        SignedTransaction {
            from,
            to: Some(to),
            value,
            nonce: 0,
            gas_price: U256::from(1u64),
            gas_limit: 21_000,
            data: Bytes::new(),
            hash: Hash::ZERO,
        }
    }

    #[test]
    fn plain_value_transfer_moves_balance_and_pays_miner() {
        let state = state();
        let sender = Address::new([1u8; 20]);
        let recipient = Address::new([2u8; 20]);
        let block = BlockContext { coinbase: Address::new([9u8; 20]), ..BlockContext::default() };

        state.credit(sender, U256::from(100_000u64)).unwrap();

        let tx = plain_transfer(sender, recipient, U256::from(1_000u64));
        let result = execute_transaction(&state, &NoHistory, &tx, &block).unwrap();

        assert!(result.success);
        assert_eq!(state.get_balance(recipient).unwrap(), U256::from(1_000u64));
        assert_eq!(state.get_nonce(sender).unwrap(), 1);
        assert!(state.get_balance(block.coinbase).unwrap() > U256::zero());
    }

    #[test]
    fn insufficient_balance_for_gas_fails_without_nonce_bump() {
        let state = state();
        let sender = Address::new([1u8; 20]);
        let recipient = Address::new([2u8; 20]);
        let block = BlockContext::default();

        let tx = plain_transfer(sender, recipient, U256::zero());
        let result = execute_transaction(&state, &NoHistory, &tx, &block).unwrap();

        assert!(!result.success);
        assert_eq!(state.get_nonce(sender).unwrap(), 0);
    }

    #[test]
    fn contract_creation_deploys_code_and_charges_deposit() {
        let state = state();
        let sender = Address::new([3u8; 20]);
        let block = BlockContext::default();

        state.credit(sender, U256::from(1_000_000u64)).unwrap();

        // PUSH1 0x00 PUSH1 0x00 RETURN: deploys empty code, trivially.
        let init_code = Bytes::from_slice(&[0x60, 0x00, 0x60, 0x00, 0xF3]);
        let tx = SignedTransaction {
            from: sender,
            to: None,
            value: U256::zero(),
            nonce: 0,
            gas_price: U256::from(1u64),
            gas_limit: 200_000,
            data: init_code,
            hash: Hash::ZERO,
        };

        let result = execute_transaction(&state, &NoHistory, &tx, &block).unwrap();
        assert!(result.success);

        let expected_address = compute_contract_address(sender, 0);
        assert_eq!(state.get_code(expected_address).unwrap().len(), 0);
    }

    #[test]
    fn batch_executor_tracks_cumulative_gas() {
        let state = state();
        let executor = Executor::new(&state, &NoHistory);
        let sender = Address::new([5u8; 20]);
        let recipient = Address::new([6u8; 20]);
        state.credit(sender, U256::from(1_000_000u64)).unwrap();

        let mut tx1 = plain_transfer(sender, recipient, U256::from(10u64));
        tx1.nonce = 0;
        let mut tx2 = plain_transfer(sender, recipient, U256::from(20u64));
        tx2.nonce = 1;

        let receipts = executor.execute_batch(&[tx1, tx2], &BlockContext::default()).unwrap();

        assert_eq!(receipts.len(), 2);
        assert!(receipts[1].cumulative_gas_used > receipts[0].cumulative_gas_used);
    }
}
