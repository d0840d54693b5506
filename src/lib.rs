//! Timelock Admin - timelock-mediated administration of reward contracts
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Timelock Core
//! - [`abi`] - Timelock bindings and signature-driven call encoding
//! - [`timelock`] - Transaction descriptors, identities and lifecycle state
//! - [`submission`] - Signing, broadcasting and confirming timelock transitions
//!
//! ## Ledger
//! - [`ledger`] - Ledger trait and the in-memory timelock ledger
//! - [`signer`] - Signing identities bound to a role
//! - [`crypto`] - Keccak hashing, addresses and secp256k1 keys
//!
//! ## Administration
//! - [`admin`] - MasterChef and vesting façades, operator prompts
//! - [`contracts`] - Target contracts and interface metadata
//! - [`units`] - Token amount conversions
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`telemetry`] - Logging setup

#![forbid(unsafe_code)]

// ============================================================================
// Timelock Core
// ============================================================================
pub mod abi;
pub mod submission;
pub mod timelock;

// ============================================================================
// Ledger
// ============================================================================
pub mod crypto;
pub mod ledger;
pub mod signer;

// ============================================================================
// Administration
// ============================================================================
pub mod admin;
pub mod contracts;
pub mod units;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod telemetry;

pub use error::{Result, TimelockError};
