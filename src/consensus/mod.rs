// SPDX-License-Identifier: CC0-1.0

//! Classic2 consensus.
//!
//! This module defines the consensus parameter bundle consumed by the
//! proof-of-work engine.
//!

pub mod params;

pub use self::params::Params;
