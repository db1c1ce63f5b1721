//! # qc-04-state-management
//!
//! The persistent, cryptographically-authenticated world state: a
//! Merkle-Patricia Trie backing account balances/nonces/code and
//! per-contract storage.
//!
//! ## Patricia Merkle Trie
//!
//! Follows Ethereum Yellow Paper Appendix D:
//!
//! - **Node types**: Empty, Leaf, Extension, Branch.
//! - **Path encoding**: hex-prefix (HP) nibble encoding (`hex-prefix` crate).
//! - **Hash function**: Keccak256.
//! - **Serialization**: RLP (`rlp` crate).
//!
//! A mutation never overwrites existing nodes — it RLP-encodes the touched
//! path and commits new nodes to the backing [`ports::NodeStore`], leaving
//! every prior root still resolvable. Child references below 32 bytes of
//! RLP are inlined rather than hashed-and-stored.

#![warn(missing_docs)]
#![allow(missing_docs)]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::*;
pub use domain::*;
pub use ports::*;
