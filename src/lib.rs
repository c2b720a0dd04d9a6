// SPDX-License-Identifier: CC0-1.0

//! # Rust Classic2 Library
//!
//! This is a library that implements the consensus-critical proof-of-work
//! difficulty engine of the Classic2 blockchain: compact target arithmetic,
//! the legacy and windowed retarget algorithms, the height-gated dispatcher
//! between them, transition validation, and proof-of-work verification.
//!
//! It also ships the two non-consensus policy helpers that ride along with
//! the engine in the node: the fast-block relay throttling policy and the
//! chain-stability monitor.
//!
//! The engine is pure: every function is a deterministic computation over its
//! immutable inputs. Block index access goes through the read-only
//! [`chain::BlockIndex`] view; wall-clock time and relay configuration are
//! injected by the caller.
//!
//! ## Available feature flags
//!
//! * `serde` - Implements `serde`-based serialization and deserialization for
//!   the wire-adjacent types ([`CompactTarget`], [`Network`]).
//!

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
// Coding conventions.
#![warn(missing_docs)]
// Exclude lints we don't think are valuable.
#![allow(clippy::manual_range_contains)] // More readable than clippy's format.

/// Re-export of the `serde` crate.
#[cfg(feature = "serde")]
pub extern crate actual_serde as serde;

/// Re-export of the `bitcoin_hashes` crate.
pub extern crate hashes;

pub mod chain;
pub mod consensus;
pub mod hash_types;
pub mod network;
pub mod policy;
pub mod pow;

pub use crate::chain::{BlockIndex, BlockNode};
pub use crate::consensus::params::Params;
pub use crate::hash_types::BlockHash;
pub use crate::network::Network;
pub use crate::pow::{CompactTarget, Target};
