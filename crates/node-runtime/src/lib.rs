//! # node-runtime
//!
//! Wires the execution-core crates into a single synchronous chain: a
//! world state backed by `qc-04-state-management`, transaction execution
//! via `qc-11-smart-contracts`, and block assembly/tree-tracking via
//! `qc-17-block-production`.
//!
//! There is no networking, mempool, or consensus here — blocks are handed
//! to [`Node::produce_block`] already assembled from whatever transaction
//! source the caller chooses; this crate only turns them into committed
//! state and a growing [`BlockTree`].

mod node;

pub use node::{ChainHashOracle, Node};
