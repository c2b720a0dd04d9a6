// SPDX-License-Identifier: CC0-1.0

//! Classic2 hash types.
//!
//! This module defines the hash type the work verifier consumes. The engine
//! never computes hashes itself; headers arrive already hashed and are only
//! compared against decoded targets.
//!

use hashes::{hash_newtype, sha256d};

hash_newtype! {
    /// A classic2 block hash.
    pub struct BlockHash(sha256d::Hash);
}
