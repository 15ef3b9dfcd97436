//! ChainCore - consensus and execution core of a proof-of-work blockchain node
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Blockchain
//! - [`blockchain`] - Block structure, chain linkage and proof-of-work checks
//! - [`transaction`] - Transaction records, signing and admission checks
//! - [`executor`] - Ordered application of transactions to the ledger
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work search
//!
//! ## Cryptography & Encoding
//! - [`crypto`] - Hashing and signatures (secp256k1)
//! - [`encoding`] - Deterministic byte layout for hashing and signing
//! - [`codec`] - Record codecs for storage and the wire
//!
//! ## Collaborators
//! - [`ledger`] - Account balances and events
//! - [`vm`] - Script executor interface
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Flow
//!
//! A producer signs [`transaction::TransactionRecord`]s, filters them through
//! [`transaction::Validator`], and assembles a [`blockchain::BlockTemplate`].
//! The [`miner::Miner`] turns the template into a [`blockchain::Block`], and
//! [`blockchain::Blockchain::accept_block`] checks it and applies its records
//! one after another through the [`executor::Executor`].

#![forbid(unsafe_code)]

// ============================================================================
// Core Blockchain
// ============================================================================
pub mod blockchain;
pub mod executor;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography & Encoding
// ============================================================================
pub mod codec;
pub mod crypto;
pub mod encoding;

// ============================================================================
// Collaborators
// ============================================================================
pub mod ledger;
pub mod vm;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
