// SPDX-License-Identifier: CC0-1.0

//! Non-consensus node policy.
//!
//! These helpers share the block-index view and target arithmetic with the
//! consensus engine but never influence block validity: a node may tune or
//! disable them freely without risking a fork.
//!

pub mod fastblock;
pub mod stability;
