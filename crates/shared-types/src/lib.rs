//! # Shared Types Crate
//!
//! Chain primitives shared by the state trie, the VM, block production and
//! the node runtime: `Address`, `Hash`, `Account`, `Transaction`, `Block`,
//! `BlockHeader`, `Log`, `Receipt`, and the block/transaction error types
//! that span crate boundaries.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
