// SPDX-License-Identifier: CC0-1.0

//! Fast block detection and relay throttling (non-consensus).
//!
//! Blocks arriving faster than a configured minimum spacing get a
//! discouragement score; sufficiently fast blocks are held back from
//! immediate relay. This is network-level policy only and plays no part in
//! block validation.
//!

use crate::chain::BlockIndex;

/// Default minimum inter-block spacing the relay policy discourages going
/// under, in seconds.
pub const DEFAULT_MIN_BLOCK_SPACING: i64 = 120;

/// Scores above this threshold hold a block back from immediate relay.
const RELAY_SCORE_THRESHOLD: i64 = 75;

/// Longest relay delay handed out for a fast block, in seconds.
const MAX_RELAY_DELAY: i64 = 30;

/// Node-local knobs for the fast-block policy.
///
/// These mirror the `-minblockspacing` and `-respectblockspacing` options;
/// callers resolve their configuration and inject it here.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Blocks spaced closer than this many seconds count as fast. Zero or
    /// negative disables the policy.
    pub min_block_spacing: i64,
    /// Advisory flag for the mining side: when set, the template builder
    /// delays its own block timestamps to honor the spacing. Not consulted
    /// by the relay scoring itself.
    pub respect_block_spacing: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        RelayOptions { min_block_spacing: DEFAULT_MIN_BLOCK_SPACING, respect_block_spacing: false }
    }
}

/// Returns true if the block came too quickly after its predecessor.
pub fn is_fast_block<N: BlockIndex>(
    block_time: i64,
    prev: Option<&N>,
    options: &RelayOptions,
) -> bool {
    let prev = match prev {
        Some(prev) => prev,
        None => return false,
    };
    if options.min_block_spacing <= 0 {
        return false;
    }
    block_time - prev.time() < options.min_block_spacing
}

/// Calculates a discouragement score for a block.
///
/// Returns 0 for normally-spaced blocks and up to 100 for blocks arriving
/// just after their predecessor; a non-increasing timestamp scores 1000.
pub fn fast_block_score<N: BlockIndex>(
    block_time: i64,
    prev: Option<&N>,
    options: &RelayOptions,
) -> i64 {
    if !is_fast_block(block_time, prev, options) {
        return 0;
    }
    let prev = match prev {
        Some(prev) => prev,
        None => return 0,
    };

    let gap = block_time - prev.time();
    if gap <= 0 {
        // Timestamp going backwards or standing still.
        return 1000;
    }

    let score = (options.min_block_spacing - gap) * 100 / options.min_block_spacing;
    score.min(100)
}

/// Returns true if the block should be relayed without delay.
pub fn should_relay<N: BlockIndex>(
    block_time: i64,
    prev: Option<&N>,
    options: &RelayOptions,
) -> bool {
    fast_block_score(block_time, prev, options) <= RELAY_SCORE_THRESHOLD
}

/// Returns how many seconds to hold the block back before relaying it.
pub fn relay_delay<N: BlockIndex>(
    block_time: i64,
    prev: Option<&N>,
    options: &RelayOptions,
) -> i64 {
    fast_block_score(block_time, prev, options) * MAX_RELAY_DELAY / 100
}
