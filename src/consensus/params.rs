// SPDX-License-Identifier: CC0-1.0

//! Classic2 consensus parameters.
//!
//! This module provides a predefined set of parameters for the different
//! Classic2 chains (such as mainnet, testnet).
//!

use crate::network::Network;
use crate::pow::Target;

/// Parameters that influence chain consensus.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Params {
    /// Network for which parameters are valid.
    pub network: Network,
    /// Proof of work limit value. It contains the lowest possible difficulty.
    ///
    /// Note that this value differs from a node's powLimit field in that this value is
    /// attainable, but a node's is not. Specifically, because targets are always
    /// rounded to the nearest float expressible in "compact form", not all targets are
    /// attainable. Still, this should not affect consensus as the only place where the
    /// non-compact form of this is used in the consensus algorithm is in comparison and
    /// there are no compact-expressible values between the two.
    pub pow_limit: Target,
    /// Floor target handed out by the emergency and defensive fallbacks.
    ///
    /// Grandfathered height ranges and the pre-activation emergency rule reset the
    /// required work to this target rather than to `pow_limit`.
    pub pow_new_limit: Target,
    /// Ceiling target used by the strongest relaxation step of the graduated
    /// emergency ladder.
    pub pow_max_limit: Target,
    /// Expected amount of time to mine one block under the legacy regime.
    pub pow_target_spacing: u64,
    /// Legacy difficulty recalculation interval.
    pub pow_target_timespan: u64,
    /// Expected amount of time to mine one block under the windowed regime.
    pub post_blossom_pow_target_spacing: i64,
    /// Count of blocks averaged by the windowed retarget.
    pub pow_averaging_window: i64,
    /// Maximum per-step difficulty increase of the windowed retarget, percent.
    pub pow_max_adjust_up: i64,
    /// Maximum per-step difficulty decrease of the windowed retarget, percent.
    pub pow_max_adjust_down: i64,
    /// Height at which the windowed retarget replaces the legacy epoch retarget.
    pub new_pow_diff_height: i32,
    /// Determines whether minimal difficulty may be used for blocks or not.
    pub allow_min_difficulty_blocks: bool,
    /// Determines whether retargeting is disabled for this network or not.
    pub no_pow_retargeting: bool,
}

impl Params {
    /// Creates parameters set for the given network.
    pub fn new(network: Network) -> Self {
        match network {
            Network::Mainnet => Params {
                network: Network::Mainnet,
                pow_limit: Target::MAX_ATTAINABLE_MAINNET,
                pow_new_limit: Target::EMERGENCY_FLOOR_MAINNET,
                pow_max_limit: Target::MAX_ATTAINABLE_MAINNET,
                pow_target_spacing: 10 * 60,            // 10 minutes
                pow_target_timespan: 14 * 24 * 60 * 60, // 2 weeks
                post_blossom_pow_target_spacing: 60,    // 1 minute
                pow_averaging_window: 17,
                pow_max_adjust_up: 16,
                pow_max_adjust_down: 32,
                new_pow_diff_height: 122_291,
                allow_min_difficulty_blocks: false,
                no_pow_retargeting: false,
            },
            Network::Testnet => Params {
                network: Network::Testnet,
                pow_limit: Target::MAX_ATTAINABLE_TESTNET,
                pow_new_limit: Target::EMERGENCY_FLOOR_TESTNET,
                pow_max_limit: Target::MAX_ATTAINABLE_TESTNET,
                pow_target_spacing: 10 * 60,
                pow_target_timespan: 14 * 24 * 60 * 60,
                post_blossom_pow_target_spacing: 60,
                pow_averaging_window: 17,
                pow_max_adjust_up: 16,
                pow_max_adjust_down: 32,
                new_pow_diff_height: 2_016,
                allow_min_difficulty_blocks: true,
                no_pow_retargeting: false,
            },
            Network::Regtest => Params {
                network: Network::Regtest,
                pow_limit: Target::MAX_ATTAINABLE_REGTEST,
                pow_new_limit: Target::MAX_ATTAINABLE_REGTEST,
                pow_max_limit: Target::MAX_ATTAINABLE_REGTEST,
                pow_target_spacing: 10 * 60,
                pow_target_timespan: 14 * 24 * 60 * 60,
                post_blossom_pow_target_spacing: 60,
                pow_averaging_window: 17,
                pow_max_adjust_up: 16,
                pow_max_adjust_down: 32,
                new_pow_diff_height: 0,
                allow_min_difficulty_blocks: true,
                no_pow_retargeting: true,
            },
        }
    }

    /// Calculates the number of blocks between legacy difficulty adjustments.
    pub fn difficulty_adjustment_interval(&self) -> u64 {
        self.pow_target_timespan / self.pow_target_spacing
    }

    /// The ideal timespan covered by one averaging window, in seconds.
    pub fn averaging_window_timespan(&self) -> i64 {
        self.pow_averaging_window * self.post_blossom_pow_target_spacing
    }

    /// Smallest dampened timespan the windowed retarget will accept.
    pub fn min_actual_timespan(&self) -> i64 {
        self.averaging_window_timespan() * (100 - self.pow_max_adjust_up) / 100
    }

    /// Largest dampened timespan the windowed retarget will accept.
    pub fn max_actual_timespan(&self) -> i64 {
        self.averaging_window_timespan() * (100 + self.pow_max_adjust_down) / 100
    }
}
