//! # EVM Interpreter
//!
//! The main execution engine for EVM bytecode. A frame runs synchronously to
//! completion (or to a gas-exhaustion/protocol error) and returns an
//! `ExecutionResult`; nothing here suspends or yields mid-instruction.

use crate::domain::entities::{ExecutionContext, ExecutionResult, Log, StateChange};
use crate::domain::invariants::limits;
use crate::domain::services::{compute_contract_address, keccak256};
use crate::domain::value_objects::{Address, Bytes, Hash, StorageKey, StorageValue, U256};
use crate::errors::{PrecompileError, VmError};
use crate::evm::gas::{self, costs, CallGasParams, OPCODE_GAS};
use crate::evm::memory::Memory;
use crate::evm::opcodes::Opcode;
use crate::evm::precompiles::execute_precompile;
use crate::evm::stack::Stack;
use crate::ports::outbound::{BlockHashOracle, StateAccess};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Pending storage writes not yet committed to `StateAccess`, shared by a
/// top-level frame and every child frame it calls into. `SLOAD`/`SSTORE`
/// consult this before falling back to live state, so a write takes effect
/// for the rest of the transaction's call tree immediately, the way the real
/// trie would see it once `apply_state_change` runs — without committing
/// anything before the transaction as a whole succeeds.
pub type StorageOverlay = Rc<RefCell<HashMap<(Address, StorageKey), StorageValue>>>;

/// EVM Interpreter state for a single call frame.
pub struct Interpreter<'a, S: StateAccess> {
    /// Execution context.
    pub context: ExecutionContext,
    /// Contract bytecode.
    pub code: &'a [u8],
    /// Program counter.
    pub pc: usize,
    /// EVM stack.
    pub stack: Stack,
    /// EVM memory.
    pub memory: Memory,
    /// Return data from the last sub-call made by this frame.
    pub return_data: Bytes,
    /// State changes accumulated (including those bubbled up from successful sub-calls).
    pub state_changes: Vec<StateChange>,
    /// Logs emitted (including those bubbled up from successful sub-calls).
    pub logs: Vec<Log>,
    /// Gas remaining.
    pub gas_remaining: u64,
    /// Gas refund accumulated.
    pub gas_refund: u64,
    /// State access interface.
    pub state: &'a S,
    /// Historical block hash lookup, for `BLOCKHASH`.
    pub block_hashes: &'a dyn BlockHashOracle,
    /// Valid jump destinations (cached).
    pub jump_dests: HashSet<usize>,
    /// Execution stopped flag.
    pub stopped: bool,
    /// Execution reverted flag.
    pub reverted: bool,
    /// Storage writes pending for this transaction's whole call tree, not
    /// yet applied to `state`. Shared with every child frame.
    pub storage_overlay: StorageOverlay,
}

impl<'a, S: StateAccess> Interpreter<'a, S> {
    /// Create a new interpreter for the top-level frame of a transaction,
    /// with a fresh, empty storage overlay.
    pub fn new(
        context: ExecutionContext,
        code: &'a [u8],
        state: &'a S,
        block_hashes: &'a dyn BlockHashOracle,
    ) -> Self {
        Self::with_overlay(context, code, state, block_hashes, Rc::new(RefCell::new(HashMap::new())))
    }

    /// Create a new interpreter sharing an existing storage overlay, for a
    /// child frame spawned by `CALL`/`CREATE` within the same transaction.
    pub fn with_overlay(
        context: ExecutionContext,
        code: &'a [u8],
        state: &'a S,
        block_hashes: &'a dyn BlockHashOracle,
        storage_overlay: StorageOverlay,
    ) -> Self {
        let gas_remaining = context.gas_limit;
        let jump_dests = analyze_jump_dests(code);

        Self {
            context,
            code,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            return_data: Bytes::new(),
            state_changes: Vec::new(),
            logs: Vec::new(),
            gas_remaining,
            gas_refund: 0,
            state,
            block_hashes,
            jump_dests,
            stopped: false,
            reverted: false,
            storage_overlay,
        }
    }

    /// The value `SLOAD`/`SSTORE` see for `key`: the most recent write in
    /// this transaction's call tree if there is one, otherwise live state.
    fn current_storage(&self, key: StorageKey) -> Result<StorageValue, VmError> {
        if let Some(value) = self.storage_overlay.borrow().get(&(self.context.address, key)) {
            return Ok(*value);
        }
        self.state
            .get_storage(self.context.address, key)
            .map_err(|e| VmError::StateFault(e.to_string()))
    }

    /// Execute the bytecode and return the result. Bounded by gas alone: a
    /// frame that never runs out of gas and never hits `STOP`/`RETURN`/
    /// `SELFDESTRUCT` simply keeps running until the code runs off the end.
    pub fn execute(&mut self) -> Result<ExecutionResult, VmError> {
        while !self.stopped && self.pc < self.code.len() {
            let opcode_byte = self.code[self.pc];
            let opcode = Opcode::from_byte(opcode_byte).ok_or(VmError::InvalidInstruction(opcode_byte))?;

            let base_gas = OPCODE_GAS[opcode_byte as usize];
            self.consume_gas(base_gas)?;

            self.execute_opcode(opcode)?;
        }

        let gas_used = self.context.gas_limit - self.gas_remaining;

        if self.reverted {
            Ok(ExecutionResult {
                success: false,
                output: self.return_data.clone(),
                gas_used,
                gas_refund: 0,
                state_changes: Vec::new(),
                logs: Vec::new(),
                revert_reason: None,
            })
        } else {
            Ok(ExecutionResult {
                success: true,
                output: self.return_data.clone(),
                gas_used,
                gas_refund: self.gas_refund,
                state_changes: std::mem::take(&mut self.state_changes),
                logs: std::mem::take(&mut self.logs),
                revert_reason: None,
            })
        }
    }

    /// Consume gas, returning `InsufficientGas` if the remaining balance can't cover it.
    fn consume_gas(&mut self, amount: u64) -> Result<(), VmError> {
        if amount > self.gas_remaining {
            self.gas_remaining = 0;
            Err(VmError::InsufficientGas)
        } else {
            self.gas_remaining -= amount;
            Ok(())
        }
    }

    /// Memory expansion for the region `[offset, offset+size)`, charging the
    /// incremental quadratic cost against the running gas balance.
    fn expand_memory(&mut self, offset: usize, size: usize) -> Result<(), VmError> {
        if size == 0 {
            return Ok(());
        }
        let old_words = self.memory.word_size();
        self.memory.expand(offset + size)?;
        let new_words = self.memory.word_size();
        self.consume_gas(gas::memory_expansion_cost(old_words as u64, new_words as u64))
    }

    /// Execute a single opcode.
    fn execute_opcode(&mut self, opcode: Opcode) -> Result<(), VmError> {
        self.pc += 1;

        match opcode {
            // =================================================================
            // STOP & ARITHMETIC
            // =================================================================
            Opcode::Stop => {
                self.stopped = true;
            }

            Opcode::Add => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a.overflowing_add(b).0)?;
            }

            Opcode::Mul => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a.overflowing_mul(b).0)?;
            }

            Opcode::Sub => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a.overflowing_sub(b).0)?;
            }

            Opcode::Div => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if b.is_zero() { U256::zero() } else { a / b };
                self.stack.push(result)?;
            }

            Opcode::SDiv => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if b.is_zero() {
                    U256::zero()
                } else {
                    signed_div(a, b)
                };
                self.stack.push(result)?;
            }

            Opcode::Mod => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if b.is_zero() { U256::zero() } else { a % b };
                self.stack.push(result)?;
            }

            Opcode::SMod => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if b.is_zero() {
                    U256::zero()
                } else {
                    signed_mod(a, b)
                };
                self.stack.push(result)?;
            }

            Opcode::AddMod => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let n = self.stack.pop()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    let sum = u256_to_u512(a) + u256_to_u512(b);
                    u512_to_u256(sum % u256_to_u512(n))
                };
                self.stack.push(result)?;
            }

            Opcode::MulMod => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let n = self.stack.pop()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    let prod = u256_to_u512(a) * u256_to_u512(b);
                    u512_to_u256(prod % u256_to_u512(n))
                };
                self.stack.push(result)?;
            }

            Opcode::Exp => {
                let base = self.stack.pop()?;
                let exp = self.stack.pop()?;

                let exp_gas = gas::exp_gas_cost(exp) - costs::EXP;
                self.consume_gas(exp_gas)?;

                self.stack.push(exp_by_squaring(base, exp))?;
            }

            Opcode::SignExtend => {
                let k = self.stack.pop()?;
                let x = self.stack.pop()?;

                let result = if k < U256::from(32) {
                    let k = k.as_usize();
                    let bit_index = 8 * k + 7;
                    let bit = x.bit(bit_index);
                    let mask = (U256::one() << (bit_index + 1)) - 1;
                    if bit {
                        x | !mask
                    } else {
                        x & mask
                    }
                } else {
                    x
                };
                self.stack.push(result)?;
            }

            // =================================================================
            // COMPARISON & BITWISE
            // =================================================================
            Opcode::Lt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack
                    .push(if a < b { U256::one() } else { U256::zero() })?;
            }

            Opcode::Gt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack
                    .push(if a > b { U256::one() } else { U256::zero() })?;
            }

            Opcode::SLt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if signed_lt(a, b) { U256::one() } else { U256::zero() };
                self.stack.push(result)?;
            }

            Opcode::SGt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let result = if signed_lt(b, a) { U256::one() } else { U256::zero() };
                self.stack.push(result)?;
            }

            Opcode::Eq => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack
                    .push(if a == b { U256::one() } else { U256::zero() })?;
            }

            Opcode::IsZero => {
                let a = self.stack.pop()?;
                self.stack
                    .push(if a.is_zero() { U256::one() } else { U256::zero() })?;
            }

            Opcode::And => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a & b)?;
            }

            Opcode::Or => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a | b)?;
            }

            Opcode::Xor => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a ^ b)?;
            }

            Opcode::Not => {
                let a = self.stack.pop()?;
                self.stack.push(!a)?;
            }

            Opcode::Byte => {
                let i = self.stack.pop()?;
                let x = self.stack.pop()?;
                let result = if i < U256::from(32) {
                    let byte_index = 31 - i.as_usize();
                    let mut bytes = [0u8; 32];
                    x.to_big_endian(&mut bytes);
                    U256::from(bytes[byte_index])
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }

            // =================================================================
            // KECCAK256
            // =================================================================
            Opcode::Keccak256 => {
                let offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                self.expand_memory(offset, size)?;

                let hash_gas = gas::keccak256_gas_cost(size) - costs::KECCAK256;
                self.consume_gas(hash_gas)?;

                let data = self.memory.read_bytes(offset, size);
                let hash = keccak256(&data);
                self.stack.push(U256::from_big_endian(hash.as_bytes()))?;
            }

            // =================================================================
            // ENVIRONMENTAL INFORMATION
            // =================================================================
            Opcode::Address => {
                self.stack.push(address_to_u256(self.context.address))?;
            }

            Opcode::Balance => {
                let addr = u256_to_address(self.stack.pop()?);
                let balance = self
                    .state
                    .get_balance(addr)
                    .map_err(|e| VmError::StateFault(e.to_string()))?;
                self.stack.push(balance)?;
            }

            Opcode::Origin => {
                self.stack.push(address_to_u256(self.context.origin))?;
            }

            Opcode::Caller => {
                self.stack.push(address_to_u256(self.context.caller))?;
            }

            Opcode::CallValue => {
                self.stack.push(self.context.value)?;
            }

            Opcode::CallDataLoad => {
                let offset = self.stack.pop()?.as_usize();
                let data = &self.context.data;
                let mut result = [0u8; 32];

                for (i, byte) in result.iter_mut().enumerate() {
                    let pos = offset.saturating_add(i);
                    if pos < data.len() {
                        *byte = data.as_slice()[pos];
                    }
                }

                self.stack.push(U256::from_big_endian(&result))?;
            }

            Opcode::CallDataSize => {
                self.stack.push(U256::from(self.context.data.len()))?;
            }

            Opcode::CallDataCopy => {
                let dest_offset = self.stack.pop()?.as_usize();
                let data_offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                self.expand_memory(dest_offset, size)?;
                self.consume_gas(gas::copy_gas_cost(size))?;

                let data = &self.context.data;
                for i in 0..size {
                    let byte = if data_offset + i < data.len() {
                        data.as_slice()[data_offset + i]
                    } else {
                        0
                    };
                    self.memory.write_byte(dest_offset + i, byte)?;
                }
            }

            Opcode::CodeSize => {
                self.stack.push(U256::from(self.code.len()))?;
            }

            Opcode::CodeCopy => {
                let dest_offset = self.stack.pop()?.as_usize();
                let code_offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                self.expand_memory(dest_offset, size)?;
                self.consume_gas(gas::copy_gas_cost(size))?;

                for i in 0..size {
                    let byte = if code_offset + i < self.code.len() {
                        self.code[code_offset + i]
                    } else {
                        0
                    };
                    self.memory.write_byte(dest_offset + i, byte)?;
                }
            }

            Opcode::GasPrice => {
                self.stack.push(self.context.gas_price)?;
            }

            Opcode::ExtCodeSize => {
                let addr = u256_to_address(self.stack.pop()?);
                let size = self
                    .state
                    .get_code_size(addr)
                    .map_err(|e| VmError::StateFault(e.to_string()))?;
                self.stack.push(U256::from(size))?;
            }

            Opcode::ExtCodeCopy => {
                let addr = u256_to_address(self.stack.pop()?);
                let dest_offset = self.stack.pop()?.as_usize();
                let code_offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                self.expand_memory(dest_offset, size)?;
                self.consume_gas(gas::copy_gas_cost(size))?;

                let code = self
                    .state
                    .get_code(addr)
                    .map_err(|e| VmError::StateFault(e.to_string()))?;
                for i in 0..size {
                    let byte = if code_offset + i < code.len() {
                        code.as_slice()[code_offset + i]
                    } else {
                        0
                    };
                    self.memory.write_byte(dest_offset + i, byte)?;
                }
            }

            // =================================================================
            // BLOCK INFORMATION
            // =================================================================
            Opcode::BlockHash => {
                let number = self.stack.pop()?;
                let current = self.context.block.number;
                let result = if number >= U256::from(current) {
                    U256::zero()
                } else {
                    let number = u256_to_u64_saturating(number);
                    match self.block_hashes.get_block_hash(number, current) {
                        Some(hash) => U256::from_big_endian(hash.as_bytes()),
                        None => U256::zero(),
                    }
                };
                self.stack.push(result)?;
            }

            Opcode::Coinbase => {
                self.stack.push(address_to_u256(self.context.block.coinbase))?;
            }

            Opcode::Timestamp => {
                self.stack.push(U256::from(self.context.block.timestamp))?;
            }

            Opcode::Number => {
                self.stack.push(U256::from(self.context.block.number))?;
            }

            Opcode::Difficulty => {
                self.stack.push(self.context.block.difficulty)?;
            }

            Opcode::GasLimit => {
                self.stack.push(U256::from(self.context.block.gas_limit))?;
            }

            // =================================================================
            // STACK, MEMORY, STORAGE
            // =================================================================
            Opcode::Pop => {
                self.stack.pop()?;
            }

            Opcode::MLoad => {
                let offset = self.stack.pop()?.as_usize();
                self.expand_memory(offset, 32)?;
                let value = self.memory.read_word(offset);
                self.stack.push(U256::from_big_endian(&value))?;
            }

            Opcode::MStore => {
                let offset = self.stack.pop()?.as_usize();
                let value = self.stack.pop()?;
                self.expand_memory(offset, 32)?;
                let mut bytes = [0u8; 32];
                value.to_big_endian(&mut bytes);
                self.memory.write_word(offset, &bytes)?;
            }

            Opcode::MStore8 => {
                let offset = self.stack.pop()?.as_usize();
                let value = self.stack.pop()?;
                self.expand_memory(offset, 1)?;
                self.memory.write_byte(offset, value.byte(0))?;
            }

            Opcode::SLoad => {
                let key = self.stack.pop()?;
                let storage_key = StorageKey::from_u256(key);
                let value = self.current_storage(storage_key)?;
                self.stack.push(value.to_u256())?;
            }

            Opcode::SStore => {
                let key = self.stack.pop()?;
                let value = self.stack.pop()?;
                let storage_key = StorageKey::from_u256(key);
                let storage_value = StorageValue::from_u256(value);

                let current = self.current_storage(storage_key)?;

                if current.is_zero() && !storage_value.is_zero() {
                    self.consume_gas(costs::SSTORE_SET)?;
                } else {
                    self.consume_gas(costs::SSTORE_RESET)?;
                }

                if !current.is_zero() && storage_value.is_zero() {
                    self.gas_refund += costs::SSTORE_CLEAR_REFUND;
                }

                self.storage_overlay
                    .borrow_mut()
                    .insert((self.context.address, storage_key), storage_value);

                self.state_changes.push(StateChange::StorageWrite {
                    address: self.context.address,
                    key: storage_key,
                    value: storage_value,
                });
            }

            Opcode::Jump => {
                let dest = self.stack.pop()?.as_usize();
                if !self.jump_dests.contains(&dest) {
                    return Err(VmError::InvalidJumpDestination(dest));
                }
                self.pc = dest;
            }

            Opcode::JumpI => {
                let dest = self.stack.pop()?.as_usize();
                let condition = self.stack.pop()?;
                if !condition.is_zero() {
                    if !self.jump_dests.contains(&dest) {
                        return Err(VmError::InvalidJumpDestination(dest));
                    }
                    self.pc = dest;
                }
            }

            Opcode::Pc => {
                self.stack.push(U256::from(self.pc - 1))?;
            }

            Opcode::MSize => {
                self.stack.push(U256::from(self.memory.len()))?;
            }

            Opcode::Gas => {
                self.stack.push(U256::from(self.gas_remaining))?;
            }

            Opcode::JumpDest => {
                // No-op marker.
            }

            // =================================================================
            // PUSH OPERATIONS
            // =================================================================
            Opcode::Push1
            | Opcode::Push2
            | Opcode::Push3
            | Opcode::Push4
            | Opcode::Push5
            | Opcode::Push6
            | Opcode::Push7
            | Opcode::Push8
            | Opcode::Push9
            | Opcode::Push10
            | Opcode::Push11
            | Opcode::Push12
            | Opcode::Push13
            | Opcode::Push14
            | Opcode::Push15
            | Opcode::Push16
            | Opcode::Push17
            | Opcode::Push18
            | Opcode::Push19
            | Opcode::Push20
            | Opcode::Push21
            | Opcode::Push22
            | Opcode::Push23
            | Opcode::Push24
            | Opcode::Push25
            | Opcode::Push26
            | Opcode::Push27
            | Opcode::Push28
            | Opcode::Push29
            | Opcode::Push30
            | Opcode::Push31
            | Opcode::Push32 => {
                let size = opcode.push_size().unwrap_or(0);
                let mut bytes = [0u8; 32];
                let end = (self.pc + size).min(self.code.len());
                let data_len = end - self.pc;
                if data_len > 0 {
                    bytes[32 - size..32 - size + data_len]
                        .copy_from_slice(&self.code[self.pc..end]);
                }
                self.stack.push(U256::from_big_endian(&bytes))?;
                self.pc += size;
            }

            // =================================================================
            // DUP OPERATIONS
            // =================================================================
            Opcode::Dup1 => self.stack.dup(0)?,
            Opcode::Dup2 => self.stack.dup(1)?,
            Opcode::Dup3 => self.stack.dup(2)?,
            Opcode::Dup4 => self.stack.dup(3)?,
            Opcode::Dup5 => self.stack.dup(4)?,
            Opcode::Dup6 => self.stack.dup(5)?,
            Opcode::Dup7 => self.stack.dup(6)?,
            Opcode::Dup8 => self.stack.dup(7)?,
            Opcode::Dup9 => self.stack.dup(8)?,
            Opcode::Dup10 => self.stack.dup(9)?,
            Opcode::Dup11 => self.stack.dup(10)?,
            Opcode::Dup12 => self.stack.dup(11)?,
            Opcode::Dup13 => self.stack.dup(12)?,
            Opcode::Dup14 => self.stack.dup(13)?,
            Opcode::Dup15 => self.stack.dup(14)?,
            Opcode::Dup16 => self.stack.dup(15)?,

            // =================================================================
            // SWAP OPERATIONS
            // =================================================================
            Opcode::Swap1 => self.stack.swap(1)?,
            Opcode::Swap2 => self.stack.swap(2)?,
            Opcode::Swap3 => self.stack.swap(3)?,
            Opcode::Swap4 => self.stack.swap(4)?,
            Opcode::Swap5 => self.stack.swap(5)?,
            Opcode::Swap6 => self.stack.swap(6)?,
            Opcode::Swap7 => self.stack.swap(7)?,
            Opcode::Swap8 => self.stack.swap(8)?,
            Opcode::Swap9 => self.stack.swap(9)?,
            Opcode::Swap10 => self.stack.swap(10)?,
            Opcode::Swap11 => self.stack.swap(11)?,
            Opcode::Swap12 => self.stack.swap(12)?,
            Opcode::Swap13 => self.stack.swap(13)?,
            Opcode::Swap14 => self.stack.swap(14)?,
            Opcode::Swap15 => self.stack.swap(15)?,
            Opcode::Swap16 => self.stack.swap(16)?,

            // =================================================================
            // LOG OPERATIONS
            // =================================================================
            Opcode::Log0 | Opcode::Log1 | Opcode::Log2 | Opcode::Log3 | Opcode::Log4 => {
                let topic_count = match opcode {
                    Opcode::Log0 => 0,
                    Opcode::Log1 => 1,
                    Opcode::Log2 => 2,
                    Opcode::Log3 => 3,
                    Opcode::Log4 => 4,
                    _ => unreachable!(),
                };

                let offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                let mut topics = Vec::with_capacity(topic_count);
                for _ in 0..topic_count {
                    let topic = self.stack.pop()?;
                    let mut bytes = [0u8; 32];
                    topic.to_big_endian(&mut bytes);
                    topics.push(Hash::new(bytes));
                }

                self.expand_memory(offset, size)?;

                let log_gas = gas::log_gas_cost(topic_count as u64, size) - costs::LOG;
                self.consume_gas(log_gas)?;

                let data = self.memory.read_bytes(offset, size);
                self.logs.push(Log::new(self.context.address, topics, Bytes::from_vec(data)));
            }

            // =================================================================
            // SYSTEM OPERATIONS
            // =================================================================
            Opcode::Return => {
                let offset = self.stack.pop()?.as_usize();
                let size = self.stack.pop()?.as_usize();

                self.expand_memory(offset, size)?;

                self.return_data = Bytes::from_vec(self.memory.read_bytes(offset, size));
                self.stopped = true;
            }

            Opcode::Create => self.exec_create()?,
            Opcode::Call => self.exec_call(CallKind::Call)?,
            Opcode::CallCode => self.exec_call(CallKind::CallCode)?,
            Opcode::DelegateCall => self.exec_call(CallKind::DelegateCall)?,
            Opcode::SelfDestruct => self.exec_selfdestruct()?,
        }

        Ok(())
    }

    /// `CREATE`: deploys a new contract from init code held in memory.
    fn exec_create(&mut self) -> Result<(), VmError> {
        let value = self.stack.pop()?;
        let offset = self.stack.pop()?.as_usize();
        let size = self.stack.pop()?.as_usize();

        self.expand_memory(offset, size)?;

        if self.context.depth + 1 > limits::MAX_CALL_DEPTH {
            self.stack.push(U256::zero())?;
            return Ok(());
        }

        let balance = self
            .state
            .get_balance(self.context.address)
            .map_err(|e| VmError::StateFault(e.to_string()))?;
        if value > balance {
            self.stack.push(U256::zero())?;
            return Ok(());
        }

        let nonce = self
            .state
            .get_nonce(self.context.address)
            .map_err(|e| VmError::StateFault(e.to_string()))?;
        let new_address = compute_contract_address(self.context.address, nonce);
        let init_code = self.memory.read_bytes(offset, size);

        let forwarded_gas = self.gas_remaining;
        let child_ctx = self.context.child_call(
            self.context.address,
            new_address,
            value,
            Bytes::new(),
            forwarded_gas,
        );

        let mut child = Interpreter::with_overlay(
            child_ctx,
            &init_code,
            self.state,
            self.block_hashes,
            Rc::clone(&self.storage_overlay),
        );
        let result = child.execute();

        match result {
            Err(VmError::StateFault(msg)) => return Err(VmError::StateFault(msg)),
            Err(_) => {
                self.stack.push(U256::zero())?;
                return Ok(());
            }
            Ok(result) if !result.success => {
                self.gas_remaining += forwarded_gas.saturating_sub(result.gas_used);
                self.stack.push(U256::zero())?;
            }
            Ok(result) => {
                self.gas_remaining += forwarded_gas.saturating_sub(result.gas_used);

                let deposit_cost = costs::CODEDEPOSIT * result.output.len() as u64;
                if self.consume_gas(deposit_cost).is_err() {
                    self.stack.push(U256::zero())?;
                    return Ok(());
                }

                self.gas_refund += result.gas_refund;
                self.state_changes.extend(result.state_changes);
                self.logs.extend(result.logs);
                self.state_changes.push(StateChange::ContractCreate {
                    address: new_address,
                    code: result.output,
                });
                if !value.is_zero() {
                    self.state_changes.push(StateChange::BalanceTransfer {
                        from: self.context.address,
                        to: new_address,
                        amount: value,
                    });
                }
                self.state_changes.push(StateChange::NonceIncrement {
                    address: self.context.address,
                });
                self.stack.push(address_to_u256(new_address))?;
            }
        }

        Ok(())
    }

    /// `CALL`/`CALLCODE`/`DELEGATECALL`: dispatches to a precompile, a
    /// contract, or treats a codeless target as a plain value transfer.
    fn exec_call(&mut self, kind: CallKind) -> Result<(), VmError> {
        let gas_requested = u256_to_u64_saturating(self.stack.pop()?);
        let addr = u256_to_address(self.stack.pop()?);
        let value = if kind.has_value_arg() {
            self.stack.pop()?
        } else {
            U256::zero()
        };
        let args_offset = self.stack.pop()?.as_usize();
        let args_size = self.stack.pop()?.as_usize();
        let ret_offset = self.stack.pop()?.as_usize();
        let ret_size = self.stack.pop()?.as_usize();

        let args_end = args_offset + args_size;
        let ret_end = ret_offset + ret_size;
        self.expand_memory(0, args_end.max(ret_end))?;

        let transfers_value = !value.is_zero();
        let target_is_new_account = kind == CallKind::Call
            && !self
                .state
                .account_exists(addr)
                .map_err(|e| VmError::StateFault(e.to_string()))?;

        let extra_static = gas::call_gas_cost(CallGasParams {
            transfers_value: kind.charges_call_value() && transfers_value,
            target_is_new_account,
        }) - costs::CALL;
        self.consume_gas(extra_static)?;

        if self.context.depth + 1 > limits::MAX_CALL_DEPTH {
            self.stack.push(U256::zero())?;
            return Ok(());
        }

        if kind != CallKind::DelegateCall && !value.is_zero() {
            let balance = self
                .state
                .get_balance(self.context.address)
                .map_err(|e| VmError::StateFault(e.to_string()))?;
            if value > balance {
                self.stack.push(U256::zero())?;
                return Ok(());
            }
        }

        let forwarded_gas =
            gas::calculate_call_gas(self.gas_remaining, gas_requested, kind.charges_call_value() && transfers_value);
        let input = Bytes::from_vec(self.memory.read_bytes(args_offset, args_size));

        if addr.is_precompile() {
            self.return_data = Bytes::new();
            match execute_precompile(addr, input.as_slice(), forwarded_gas) {
                Some(Ok(output)) => {
                    self.gas_remaining += forwarded_gas.saturating_sub(output.gas_used);
                    self.memory
                        .write_bytes(ret_offset, &truncate_or_pad(output.output.as_slice(), ret_size))?;
                    self.return_data = output.output;
                    self.stack.push(U256::one())?;
                }
                Some(Err(PrecompileError::OutOfGas)) | Some(Err(_)) => {
                    self.stack.push(U256::zero())?;
                }
                None => unreachable!("is_precompile() implies execute_precompile returns Some"),
            }
            return Ok(());
        }

        let code = self
            .state
            .get_code(addr)
            .map_err(|e| VmError::StateFault(e.to_string()))?;

        if code.is_empty() {
            self.gas_remaining += forwarded_gas;
            if kind == CallKind::Call && !value.is_zero() {
                self.state_changes.push(StateChange::BalanceTransfer {
                    from: self.context.address,
                    to: addr,
                    amount: value,
                });
            }
            self.return_data = Bytes::new();
            self.stack.push(U256::one())?;
            return Ok(());
        }

        let child_ctx = match kind {
            CallKind::Call => {
                self.context.child_call(self.context.address, addr, value, input, forwarded_gas)
            }
            CallKind::CallCode => self.context.child_callcode(value, input, forwarded_gas),
            CallKind::DelegateCall => self.context.child_delegatecall(addr, input, forwarded_gas),
        };

        let mut child = Interpreter::with_overlay(
            child_ctx,
            code.as_slice(),
            self.state,
            self.block_hashes,
            Rc::clone(&self.storage_overlay),
        );
        let result = child.execute();

        match result {
            Err(VmError::StateFault(msg)) => return Err(VmError::StateFault(msg)),
            Err(_) => {
                self.return_data = Bytes::new();
                self.stack.push(U256::zero())?;
            }
            Ok(result) if !result.success => {
                self.gas_remaining += forwarded_gas.saturating_sub(result.gas_used);
                self.return_data = result.output;
                self.stack.push(U256::zero())?;
            }
            Ok(result) => {
                self.gas_remaining += forwarded_gas.saturating_sub(result.gas_used);
                self.gas_refund += result.gas_refund;
                self.state_changes.extend(result.state_changes);
                self.logs.extend(result.logs);
                if kind == CallKind::Call && !value.is_zero() {
                    self.state_changes.push(StateChange::BalanceTransfer {
                        from: self.context.address,
                        to: addr,
                        amount: value,
                    });
                }
                self.memory
                    .write_bytes(ret_offset, &truncate_or_pad(result.output.as_slice(), ret_size))?;
                self.return_data = result.output;
                self.stack.push(U256::one())?;
            }
        }

        Ok(())
    }

    /// `SELFDESTRUCT`: schedules the current contract for destruction and
    /// pays its entire balance out to `beneficiary`.
    fn exec_selfdestruct(&mut self) -> Result<(), VmError> {
        let beneficiary = u256_to_address(self.stack.pop()?);

        let balance = self
            .state
            .get_balance(self.context.address)
            .map_err(|e| VmError::StateFault(e.to_string()))?;

        if !balance.is_zero() {
            let beneficiary_exists = self
                .state
                .account_exists(beneficiary)
                .map_err(|e| VmError::StateFault(e.to_string()))?;
            if !beneficiary_exists {
                self.consume_gas(costs::SELFDESTRUCT_NEW_ACCOUNT)?;
            }
            self.state_changes.push(StateChange::BalanceTransfer {
                from: self.context.address,
                to: beneficiary,
                amount: balance,
            });
        }

        self.state_changes.push(StateChange::ContractDestroy {
            address: self.context.address,
            beneficiary,
        });
        self.gas_refund += costs::SELFDESTRUCT_REFUND;
        self.stopped = true;

        Ok(())
    }
}

/// Distinguishes the three `CALL`-family opcodes: what identity they execute
/// under and whether they carry their own value argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CallKind {
    Call,
    CallCode,
    DelegateCall,
}

impl CallKind {
    fn has_value_arg(self) -> bool {
        matches!(self, Self::Call | Self::CallCode)
    }

    /// Whether a non-zero value on this call incurs the `CALL_VALUE` surcharge.
    /// `DELEGATECALL` carries no value argument of its own, so it never does.
    fn charges_call_value(self) -> bool {
        matches!(self, Self::Call | Self::CallCode)
    }
}

/// Truncates or zero-pads `data` to exactly `len` bytes.
fn truncate_or_pad(data: &[u8], len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let copy_len = data.len().min(len);
    out[..copy_len].copy_from_slice(&data[..copy_len]);
    out
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Analyze bytecode to find valid JUMPDEST locations.
fn analyze_jump_dests(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut i = 0;

    while i < code.len() {
        let op = code[i];
        if op == 0x5B {
            dests.insert(i);
        }
        if (0x60..=0x7F).contains(&op) {
            let size = (op - 0x5F) as usize;
            i += size;
        }
        i += 1;
    }

    dests
}

/// Convert U256 to address (take lower 20 bytes).
fn u256_to_address(value: U256) -> Address {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&bytes[12..32]);
    Address::new(addr)
}

/// Left-pads an address into a 256-bit stack word.
fn address_to_u256(address: Address) -> U256 {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(address.as_bytes());
    U256::from_big_endian(&bytes)
}

/// Converts a U256 popped off the stack (e.g. a `CALL` gas argument or a
/// `BLOCKHASH` block number) to a `u64`, saturating instead of panicking.
fn u256_to_u64_saturating(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

/// Signed less than comparison.
fn signed_lt(a: U256, b: U256) -> bool {
    let a_neg = a.bit(255);
    let b_neg = b.bit(255);
    match (a_neg, b_neg) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// Signed division.
fn signed_div(a: U256, b: U256) -> U256 {
    let a_neg = a.bit(255);
    let b_neg = b.bit(255);
    let a_abs = if a_neg { (!a).overflowing_add(U256::one()).0 } else { a };
    let b_abs = if b_neg { (!b).overflowing_add(U256::one()).0 } else { b };
    let result = a_abs / b_abs;
    if a_neg == b_neg {
        result
    } else {
        (!result).overflowing_add(U256::one()).0
    }
}

/// Signed modulo.
fn signed_mod(a: U256, b: U256) -> U256 {
    let a_neg = a.bit(255);
    let a_abs = if a_neg { (!a).overflowing_add(U256::one()).0 } else { a };
    let b_abs = if b.bit(255) { (!b).overflowing_add(U256::one()).0 } else { b };
    let result = a_abs % b_abs;
    if a_neg {
        (!result).overflowing_add(U256::one()).0
    } else {
        result
    }
}

/// Exponentiation by squaring.
fn exp_by_squaring(base: U256, mut exp: U256) -> U256 {
    if exp.is_zero() {
        return U256::one();
    }

    let mut result = U256::one();
    let mut base = base;

    while !exp.is_zero() {
        if exp.bit(0) {
            result = result.overflowing_mul(base).0;
        }
        exp >>= 1;
        base = base.overflowing_mul(base).0;
    }

    result
}

/// Convert U256 to U512 for addmod/mulmod.
fn u256_to_u512(value: U256) -> primitive_types::U512 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes[32..]);
    primitive_types::U512::from_big_endian(&bytes)
}

/// Convert U512 back to U256.
fn u512_to_u256(value: primitive_types::U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_jump_dests() {
        // Code: PUSH1 0x04 JUMP JUMPDEST STOP
        let code = vec![0x60, 0x04, 0x56, 0x5B, 0x00];
        let dests = analyze_jump_dests(&code);
        assert!(dests.contains(&3));
        assert!(!dests.contains(&0));
    }

    #[test]
    fn test_u256_to_address() {
        let value = U256::from(0x1234u64);
        let addr = u256_to_address(value);
        assert_eq!(addr.as_bytes()[19], 0x34);
        assert_eq!(addr.as_bytes()[18], 0x12);
    }

    #[test]
    fn test_address_to_u256_roundtrip() {
        let addr = Address::new([0xAB; 20]);
        let value = address_to_u256(addr);
        assert_eq!(u256_to_address(value), addr);
    }

    #[test]
    fn test_exp_by_squaring() {
        assert_eq!(exp_by_squaring(U256::from(2), U256::from(0)), U256::one());
        assert_eq!(exp_by_squaring(U256::from(2), U256::from(1)), U256::from(2));
        assert_eq!(exp_by_squaring(U256::from(2), U256::from(10)), U256::from(1024));
        assert_eq!(exp_by_squaring(U256::from(3), U256::from(3)), U256::from(27));
    }

    #[test]
    fn test_signed_lt() {
        let neg_one = !U256::zero();
        let one = U256::one();

        assert!(signed_lt(neg_one, one));
        assert!(!signed_lt(one, neg_one));
        assert!(!signed_lt(one, one));
    }

    #[test]
    fn test_u256_to_u64_saturating() {
        assert_eq!(u256_to_u64_saturating(U256::from(42)), 42);
        assert_eq!(u256_to_u64_saturating(U256::MAX), u64::MAX);
    }

    #[test]
    fn test_truncate_or_pad() {
        assert_eq!(truncate_or_pad(&[1, 2, 3], 5), vec![1, 2, 3, 0, 0]);
        assert_eq!(truncate_or_pad(&[1, 2, 3, 4, 5], 2), vec![1, 2]);
    }
}
