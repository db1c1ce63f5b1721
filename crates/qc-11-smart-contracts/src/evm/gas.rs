//! # Gas Metering
//!
//! The classical Homestead/Frontier fee schedule: flat per-opcode costs,
//! no access-list warm/cold distinction, no EIP-150 63/64 call-gas cap.

use super::opcodes::Opcode;

/// Flat per-opcode gas costs and transaction-level constants.
pub mod costs {
    /// Cost tier for `STOP`/`RETURN`/`SELFDESTRUCT` opcodes that do no work of their own.
    pub const ZERO: u64 = 0;
    /// `ADDRESS`, `ORIGIN`, `CALLER`, `CALLVALUE`, `CALLDATASIZE`, `CODESIZE`,
    /// `GASPRICE`, `COINBASE`, `TIMESTAMP`, `NUMBER`, `DIFFICULTY`, `GASLIMIT`,
    /// `POP`, `PC`, `MSIZE`, `GAS`.
    pub const BASE: u64 = 2;
    /// `ADD`, `SUB`, `LT`, `GT`, `SLT`, `SGT`, `EQ`, `ISZERO`, `AND`, `OR`, `XOR`,
    /// `NOT`, `BYTE`, `CALLDATALOAD`, `PUSH*`, `DUP*`, `SWAP*`.
    pub const VERY_LOW: u64 = 3;
    /// `MUL`, `DIV`, `SDIV`, `MOD`, `SMOD`, `SIGNEXTEND`.
    pub const LOW: u64 = 5;
    /// `ADDMOD`, `MULMOD`, `JUMP`.
    pub const MID: u64 = 8;
    /// `JUMPI`.
    pub const HIGH: u64 = 10;
    /// Cost of the `JUMPDEST` marker itself.
    pub const JUMPDEST: u64 = 1;

    /// Intrinsic cost of every transaction.
    pub const TX_BASE: u64 = 21_000;
    /// Additional intrinsic cost when the transaction creates a contract.
    pub const TX_CREATE: u64 = 32_000;
    /// Cost per non-zero byte of transaction data.
    pub const TX_DATA_NON_ZERO: u64 = 68;
    /// Cost per zero byte of transaction data.
    pub const TX_DATA_ZERO: u64 = 4;

    /// Cost per word copied by `CALLDATACOPY`/`CODECOPY`/`EXTCODECOPY`.
    pub const COPY: u64 = 3;

    /// Flat cost of `SLOAD` (no warm/cold distinction).
    pub const SLOAD: u64 = 50;
    /// `SSTORE` cost when a zero slot becomes non-zero.
    pub const SSTORE_SET: u64 = 20_000;
    /// `SSTORE` cost for any other value transition.
    pub const SSTORE_RESET: u64 = 5_000;
    /// Refund granted when `SSTORE` clears a non-zero slot to zero.
    pub const SSTORE_CLEAR_REFUND: u64 = 15_000;

    /// Base cost of `CALL`/`CALLCODE`/`DELEGATECALL`.
    pub const CALL: u64 = 40;
    /// Extra cost when a `CALL` transfers non-zero value.
    pub const CALL_VALUE: u64 = 9_000;
    /// Extra cost when a `CALL` creates a previously non-existent account.
    pub const CALL_NEW_ACCOUNT: u64 = 25_000;
    /// Gas stipend forwarded to the callee on a value-bearing `CALL`, free of the caller's budget.
    pub const CALL_STIPEND: u64 = 2_300;

    /// Base cost of `CREATE`.
    pub const CREATE: u64 = 32_000;
    /// Cost per byte of code deposited by a successful `CREATE`.
    pub const CODEDEPOSIT: u64 = 200;
    /// Flat cost of `KECCAK256` before the per-word charge.
    pub const KECCAK256: u64 = 30;
    /// Cost per word hashed by `KECCAK256`.
    pub const KECCAK256_WORD: u64 = 6;

    /// Flat cost of a `LOG` opcode before topic/data charges.
    pub const LOG: u64 = 375;
    /// Additional cost per topic on a `LOG` opcode.
    pub const LOG_TOPIC: u64 = 375;
    /// Additional cost per byte of `LOG` data.
    pub const LOG_DATA: u64 = 8;

    /// Flat cost of `EXP` before the per-byte-of-exponent charge.
    pub const EXP: u64 = 10;
    /// Additional cost per significant byte of the exponent in `EXP`.
    pub const EXP_BYTE: u64 = 10;

    /// Refund granted on `SELFDESTRUCT` of an account not already scheduled for deletion.
    pub const SELFDESTRUCT_REFUND: u64 = 24_000;
    /// Extra cost when `SELFDESTRUCT` pays out to a previously non-existent account.
    pub const SELFDESTRUCT_NEW_ACCOUNT: u64 = 25_000;

    /// Flat cost of `BALANCE`.
    pub const BALANCE: u64 = 20;
    /// Flat cost of `EXTCODESIZE`.
    pub const EXTCODESIZE: u64 = 20;
    /// Flat cost of `EXTCODECOPY` before the per-word copy charge.
    pub const EXTCODECOPY: u64 = 20;
    /// Flat cost of `BLOCKHASH`.
    pub const BLOCKHASH: u64 = 20;
    /// Cost per 32-byte word of memory expansion.
    pub const MEMORY: u64 = 3;
}

/// Cost of memory expansion from `old_words` to `new_words` (32-byte words),
/// quadratic in the word count per the yellow-paper `Cmem` function.
#[must_use]
pub fn memory_expansion_cost(old_words: u64, new_words: u64) -> u64 {
    if new_words <= old_words {
        return 0;
    }
    let cost = |words: u64| -> u64 { costs::MEMORY * words + words * words / 512 };
    cost(new_words).saturating_sub(cost(old_words))
}

/// `EXP` gas cost: flat base plus a per-byte charge for the exponent's
/// minimal big-endian encoding.
#[must_use]
pub fn exp_gas_cost(exponent: primitive_types::U256) -> u64 {
    if exponent.is_zero() {
        return costs::EXP;
    }
    let exponent_bytes = (exponent.bits() + 7) / 8;
    costs::EXP + costs::EXP_BYTE * exponent_bytes as u64
}

/// `KECCAK256` gas cost for hashing `len` bytes.
#[must_use]
pub fn keccak256_gas_cost(len: usize) -> u64 {
    let words = (len as u64 + 31) / 32;
    costs::KECCAK256 + costs::KECCAK256_WORD * words
}

/// `LOG0`..`LOG4` gas cost for `topic_count` topics and `data_len` bytes of data.
#[must_use]
pub fn log_gas_cost(topic_count: u64, data_len: usize) -> u64 {
    costs::LOG + costs::LOG_TOPIC * topic_count + costs::LOG_DATA * data_len as u64
}

/// Gas cost of copying `len` bytes via `CALLDATACOPY`/`CODECOPY`/`EXTCODECOPY`.
#[must_use]
pub fn copy_gas_cost(len: usize) -> u64 {
    let words = (len as u64 + 31) / 32;
    costs::COPY * words
}

/// `CREATE` gas cost (flat; the init-code execution itself is metered separately).
#[must_use]
pub fn create_gas_cost() -> u64 {
    costs::CREATE
}

/// Inputs to a `CALL`/`CALLCODE`/`DELEGATECALL` static gas computation.
#[derive(Debug, Clone, Copy)]
pub struct CallGasParams {
    /// Whether this call transfers non-zero value.
    pub transfers_value: bool,
    /// Whether the target account does not yet exist (only relevant to `CALL`).
    pub target_is_new_account: bool,
}

/// Static portion of a call's gas cost (excludes the amount forwarded to the callee).
#[must_use]
pub fn call_gas_cost(params: CallGasParams) -> u64 {
    let mut cost = costs::CALL;
    if params.transfers_value {
        cost += costs::CALL_VALUE;
    }
    if params.target_is_new_account {
        cost += costs::CALL_NEW_ACCOUNT;
    }
    cost
}

/// Gas forwarded to a callee. Under the original, pre-EIP-150 scheme the
/// caller may forward all of its remaining gas (capped by whatever amount it
/// requested); a value-bearing call additionally grants the callee a free
/// stipend on top of whatever was forwarded, so an empty-gas call can still
/// run a trivial receive handler.
#[must_use]
pub fn calculate_call_gas(available_gas: u64, requested_gas: u64, transfers_value: bool) -> u64 {
    let forwarded = requested_gas.min(available_gas);
    if transfers_value {
        forwarded + costs::CALL_STIPEND
    } else {
        forwarded
    }
}

/// Refund is capped at half the gas actually used.
pub const MAX_REFUND_DIVISOR: u64 = 2;

/// Computes the final refund given the gas actually used and the substate's
/// accumulated refund counter: `min(gas_used / 2, refund_counter)`.
#[must_use]
pub fn calculate_refund(gas_used: u64, refund_counter: u64) -> u64 {
    refund_counter.min(gas_used / MAX_REFUND_DIVISOR)
}

/// Flat per-opcode gas cost table, indexed by raw opcode byte. Entries for
/// bytes with no mapped `Opcode` (undefined in Homestead) are left at `0`;
/// the interpreter never looks them up because decoding fails first.
/// `SSTORE` is listed at `0` here because its true cost is dynamic (depends
/// on the zero/non-zero transition of the slot) and computed by the
/// interpreter rather than read from this table.
pub const OPCODE_GAS: [u64; 256] = build_opcode_gas_table();

const fn build_opcode_gas_table() -> [u64; 256] {
    let mut table = [0u64; 256];

    table[Opcode::Stop as usize] = costs::ZERO;
    table[Opcode::Add as usize] = costs::VERY_LOW;
    table[Opcode::Mul as usize] = costs::LOW;
    table[Opcode::Sub as usize] = costs::VERY_LOW;
    table[Opcode::Div as usize] = costs::LOW;
    table[Opcode::SDiv as usize] = costs::LOW;
    table[Opcode::Mod as usize] = costs::LOW;
    table[Opcode::SMod as usize] = costs::LOW;
    table[Opcode::AddMod as usize] = costs::MID;
    table[Opcode::MulMod as usize] = costs::MID;
    table[Opcode::Exp as usize] = costs::EXP;
    table[Opcode::SignExtend as usize] = costs::LOW;

    table[Opcode::Lt as usize] = costs::VERY_LOW;
    table[Opcode::Gt as usize] = costs::VERY_LOW;
    table[Opcode::SLt as usize] = costs::VERY_LOW;
    table[Opcode::SGt as usize] = costs::VERY_LOW;
    table[Opcode::Eq as usize] = costs::VERY_LOW;
    table[Opcode::IsZero as usize] = costs::VERY_LOW;
    table[Opcode::And as usize] = costs::VERY_LOW;
    table[Opcode::Or as usize] = costs::VERY_LOW;
    table[Opcode::Xor as usize] = costs::VERY_LOW;
    table[Opcode::Not as usize] = costs::VERY_LOW;
    table[Opcode::Byte as usize] = costs::VERY_LOW;

    table[Opcode::Keccak256 as usize] = costs::KECCAK256;

    table[Opcode::Address as usize] = costs::BASE;
    table[Opcode::Balance as usize] = costs::BALANCE;
    table[Opcode::Origin as usize] = costs::BASE;
    table[Opcode::Caller as usize] = costs::BASE;
    table[Opcode::CallValue as usize] = costs::BASE;
    table[Opcode::CallDataLoad as usize] = costs::VERY_LOW;
    table[Opcode::CallDataSize as usize] = costs::BASE;
    table[Opcode::CallDataCopy as usize] = costs::VERY_LOW;
    table[Opcode::CodeSize as usize] = costs::BASE;
    table[Opcode::CodeCopy as usize] = costs::VERY_LOW;
    table[Opcode::GasPrice as usize] = costs::BASE;
    table[Opcode::ExtCodeSize as usize] = costs::EXTCODESIZE;
    table[Opcode::ExtCodeCopy as usize] = costs::EXTCODECOPY;

    table[Opcode::BlockHash as usize] = costs::BLOCKHASH;
    table[Opcode::Coinbase as usize] = costs::BASE;
    table[Opcode::Timestamp as usize] = costs::BASE;
    table[Opcode::Number as usize] = costs::BASE;
    table[Opcode::Difficulty as usize] = costs::BASE;
    table[Opcode::GasLimit as usize] = costs::BASE;

    table[Opcode::Pop as usize] = costs::BASE;
    table[Opcode::MLoad as usize] = costs::VERY_LOW;
    table[Opcode::MStore as usize] = costs::VERY_LOW;
    table[Opcode::MStore8 as usize] = costs::VERY_LOW;
    table[Opcode::SLoad as usize] = costs::SLOAD;
    table[Opcode::SStore as usize] = costs::ZERO;
    table[Opcode::Jump as usize] = costs::MID;
    table[Opcode::JumpI as usize] = costs::HIGH;
    table[Opcode::Pc as usize] = costs::BASE;
    table[Opcode::MSize as usize] = costs::BASE;
    table[Opcode::Gas as usize] = costs::BASE;
    table[Opcode::JumpDest as usize] = costs::JUMPDEST;

    let mut push = Opcode::Push1 as usize;
    while push <= Opcode::Push32 as usize {
        table[push] = costs::VERY_LOW;
        push += 1;
    }
    let mut dup = Opcode::Dup1 as usize;
    while dup <= Opcode::Dup16 as usize {
        table[dup] = costs::VERY_LOW;
        dup += 1;
    }
    let mut swap = Opcode::Swap1 as usize;
    while swap <= Opcode::Swap16 as usize {
        table[swap] = costs::VERY_LOW;
        swap += 1;
    }

    table[Opcode::Log0 as usize] = costs::LOG;
    table[Opcode::Log1 as usize] = costs::LOG;
    table[Opcode::Log2 as usize] = costs::LOG;
    table[Opcode::Log3 as usize] = costs::LOG;
    table[Opcode::Log4 as usize] = costs::LOG;

    table[Opcode::Create as usize] = costs::CREATE;
    table[Opcode::Call as usize] = costs::CALL;
    table[Opcode::CallCode as usize] = costs::CALL;
    table[Opcode::Return as usize] = costs::ZERO;
    table[Opcode::DelegateCall as usize] = costs::CALL;
    table[Opcode::SelfDestruct as usize] = costs::ZERO;

    table
}
