//! # Adapters Layer (Outer Hexagon)
//!
//! Adapters connect the Smart Contract subsystem to external systems.
//! Adapters implement domain ports; no direct subsystem-to-subsystem calls.

pub mod state_adapter;

pub use state_adapter::*;
