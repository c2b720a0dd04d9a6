// SPDX-License-Identifier: CC0-1.0

//! Chain stability monitoring (non-consensus).
//!
//! Health signals derived from the recent chain: whether block production
//! has stalled, whether recent timing looks like private mining ahead of a
//! reorg, a rough hash-rate estimate, and whether the emergency difficulty
//! rules are about to be needed. The caller supplies the wall clock so the
//! signals stay pure functions of their inputs.
//!

use crate::chain::BlockIndex;
use crate::consensus::params::Params;
use crate::pow::Target;

/// Number of trailing blocks the logged hash-rate estimate covers.
pub const DEFAULT_HASH_RATE_WINDOW: i32 = 120;

/// How many trailing blocks the reorg heuristic inspects.
const REORG_SCAN_DEPTH: usize = 20;

/// Returns the target spacing active at the tip's height, in seconds.
fn active_target_spacing<N: BlockIndex>(tip: &N, params: &Params) -> i64 {
    if tip.height() >= params.new_pow_diff_height {
        params.post_blossom_pow_target_spacing
    } else {
        params.pow_target_spacing as i64
    }
}

/// Returns true if block production looks stalled.
///
/// Stalled means the tip is older than four target spacings under the legacy
/// regime, or three under the windowed regime.
pub fn is_chain_stuck<N: BlockIndex>(tip: &N, now: i64, params: &Params) -> bool {
    let age = now - tip.time();
    if tip.height() < params.new_pow_diff_height {
        age > params.pow_target_spacing as i64 * 4
    } else {
        age > params.post_blossom_pow_target_spacing * 3
    }
}

/// Returns true if the tip is stale enough that the windowed regime's
/// emergency relaxation will apply to the next block.
pub fn emergency_difficulty_needed<N: BlockIndex>(tip: &N, now: i64, params: &Params) -> bool {
    if tip.height() < params.new_pow_diff_height {
        return false;
    }
    now - tip.time() > params.post_blossom_pow_target_spacing * 6
}

/// Returns true if recent block timing shows a suspicious burst.
///
/// Walks up to twenty trailing blocks and counts inter-block gaps shorter
/// than a third of the target spacing; a run where more than 30% of the
/// blocks came that quickly hints at a privately mined chain segment being
/// released.
pub fn suspicious_reorg_pattern<N: BlockIndex>(tip: &N, params: &Params) -> bool {
    if tip.height() < 100 {
        return false;
    }

    let spacing = active_target_spacing(tip, params);
    let mut visited = 1_usize;
    let mut rapid = 0_usize;
    let mut cursor = tip;
    while visited < REORG_SCAN_DEPTH {
        let prev = match cursor.prev() {
            Some(prev) => prev,
            None => break,
        };
        if cursor.time() - prev.time() < spacing / 3 {
            rapid += 1;
        }
        visited += 1;
        cursor = prev;
    }

    if visited < 10 {
        return false;
    }

    rapid > visited * 3 / 10
}

/// Estimates the network hash rate over the trailing `blocks` blocks, in
/// hashes per second.
///
/// Accumulates the decoded targets of the visited blocks as a work proxy and
/// divides by the elapsed time. Returns 0 when the chain is shorter than the
/// requested window or the elapsed time is not positive.
pub fn estimate_hash_rate<N: BlockIndex>(tip: &N, blocks: i32) -> f64 {
    if blocks <= 0 || tip.height() < blocks {
        return 0.0;
    }

    let mut total = Target::ZERO;
    let mut cursor = tip;
    let mut walked = 0;
    while walked < blocks {
        let prev = match cursor.prev() {
            Some(prev) => prev,
            None => break,
        };
        total = total.saturating_add(Target::from_compact(cursor.bits()));
        cursor = prev;
        walked += 1;
    }

    let elapsed = tip.time() - cursor.time();
    if elapsed <= 0 {
        return 0.0;
    }

    total.to_f64() / elapsed as f64
}

/// Emits one structured log event with the current stability signals.
///
/// Purely advisory; consensus never reads anything back from here.
pub fn log_stability_metrics<N: BlockIndex>(tip: &N, now: i64, params: &Params) {
    let stuck = is_chain_stuck(tip, now, params);
    let suspicious = suspicious_reorg_pattern(tip, params);
    let hash_rate = estimate_hash_rate(tip, DEFAULT_HASH_RATE_WINDOW);
    let emergency = emergency_difficulty_needed(tip, now, params);

    tracing::info!(
        height = tip.height(),
        tip_age_secs = now - tip.time(),
        target_spacing = active_target_spacing(tip, params),
        hash_rate,
        stuck,
        suspicious_reorg = suspicious,
        emergency_needed = emergency,
        "chain stability metrics"
    );
}
