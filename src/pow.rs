// SPDX-License-Identifier: CC0-1.0

//! Proof of work related types and consensus rules.
//!
//! This module provides the 256-bit target arithmetic with its compact
//! (`nBits`) encoding, the legacy epoch retarget, the windowed retarget with
//! its emergency relaxation ladder, the height-gated dispatcher between the
//! two regimes, the difficulty transition validator and the proof-of-work
//! check itself.
//!
//! All functions are pure: they read the borrowed [`BlockIndex`] view and the
//! [`Params`] bundle and return values. Invalid inputs map to deterministic
//! fallback targets, never to panics or errors (the one exception being the
//! checked compact decode, which the work verifier uses to reject malformed
//! headers).
//!

use core::fmt;

use hashes::Hash as _;
use hex::DisplayHex;

use crate::chain::BlockIndex;
use crate::consensus::params::Params;
use crate::hash_types::BlockHash;

/// Height at which the graduated emergency ladder replaces the single-step
/// emergency rule of the windowed regime.
const GRADUATED_EMERGENCY_HEIGHT: i32 = 126_800;

/// The target a [`DifficultyAnchor`] resets the required work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnchorTarget {
    /// Reset to the proof-of-work limit.
    Limit,
    /// Reset to the emergency floor target.
    Floor,
}

/// A height range over which consensus pins the required target instead of
/// running a retarget.
///
/// These entries are permanent chain history accommodating past network
/// incidents; they must never be edited.
#[derive(Debug, Clone, Copy)]
struct DifficultyAnchor {
    start: i32,
    end: i32,
    reset_to: AnchorTarget,
}

/// Anchors consulted before the regime switch.
const PRE_DISPATCH_ANCHORS: &[DifficultyAnchor] =
    &[DifficultyAnchor { start: 122_291, end: 122_310, reset_to: AnchorTarget::Floor }];

/// Anchors consulted on the legacy code path only.
const LEGACY_ANCHORS: &[DifficultyAnchor] = &[
    DifficultyAnchor { start: 112_266, end: 112_300, reset_to: AnchorTarget::Limit },
    DifficultyAnchor { start: 112_301, end: 112_401, reset_to: AnchorTarget::Floor },
];

fn anchored_bits(height: i32, table: &[DifficultyAnchor], params: &Params) -> Option<CompactTarget> {
    for anchor in table {
        if height >= anchor.start && height <= anchor.end {
            let target = match anchor.reset_to {
                AnchorTarget::Limit => params.pow_limit,
                AnchorTarget::Floor => params.pow_new_limit,
            };
            return Some(target.to_compact_lossy());
        }
    }
    None
}

/// Encoded form of a 256-bit target as a 32-bit float-like value.
///
/// The top byte is an exponent (a byte count) and the lower 23 bits are a
/// mantissa; bit 24 of the mantissa field is a sign marker. The decoded value
/// is `mantissa * 256^(exponent - 3)`. The encoding is not a bijection:
/// distinct 256-bit values round to the same compact form, so equality of two
/// `CompactTarget`s must never stand in for equality of the targets they
/// decode to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(crate = "actual_serde"))]
pub struct CompactTarget(u32);

impl CompactTarget {
    /// Creates a `CompactTarget` from a consensus encoded `u32`.
    pub fn from_consensus(bits: u32) -> Self { CompactTarget(bits) }

    /// Returns the consensus encoded `u32` representation of this target.
    pub fn to_consensus(self) -> u32 { self.0 }
}

impl fmt::LowerHex for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { fmt::LowerHex::fmt(&self.0, f) }
}

impl fmt::UpperHex for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { fmt::UpperHex::fmt(&self.0, f) }
}

/// Error returned when a compact target does not describe a valid 256-bit
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompactTargetError {
    /// The mantissa has its sign bit set.
    Negative,
    /// The decoded value does not fit in 256 bits.
    Overflow,
}

impl fmt::Display for CompactTargetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CompactTargetError::Negative => {
                write!(f, "compact target mantissa has the sign bit set")
            }
            CompactTargetError::Overflow => write!(f, "compact target exceeds 256 bits"),
        }
    }
}

impl std::error::Error for CompactTargetError {}

/// A 256-bit target threshold a block hash must not exceed.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target(U256);

impl Target {
    /// The zero target, met by no hash.
    pub const ZERO: Target = Target(U256::ZERO);

    /// The maximum possible attainable value.
    pub const MAX: Target = Target(U256::MAX);

    /// The proof of work limit on mainnet (compact `0x1d00ffff`).
    pub const MAX_ATTAINABLE_MAINNET: Target =
        Target(U256(0x0000_0000_ffff_0000_0000_0000_0000_0000, 0));

    /// The proof of work limit on testnet (compact `0x1d00ffff`).
    pub const MAX_ATTAINABLE_TESTNET: Target =
        Target(U256(0x0000_0000_ffff_0000_0000_0000_0000_0000, 0));

    /// The proof of work limit on regtest (compact `0x207fffff`).
    pub const MAX_ATTAINABLE_REGTEST: Target =
        Target(U256(0x7fff_ff00_0000_0000_0000_0000_0000_0000, 0));

    /// Mainnet floor target for emergency and defensive fallbacks (compact
    /// `0x1c7fffff`).
    pub const EMERGENCY_FLOOR_MAINNET: Target =
        Target(U256(0x0000_0000_7fff_ff00_0000_0000_0000_0000, 0));

    /// Testnet floor target for emergency and defensive fallbacks.
    pub const EMERGENCY_FLOOR_TESTNET: Target =
        Target(U256(0x0000_0000_7fff_ff00_0000_0000_0000_0000, 0));

    /// Decodes a compact target, ignoring the sign and overflow markers.
    ///
    /// This mirrors how consensus code reads targets it already trusts: an
    /// out-of-range encoding wraps deterministically. Use
    /// [`Target::from_compact_checked`] for untrusted input.
    pub fn from_compact(c: CompactTarget) -> Target {
        let bits = c.to_consensus();
        let size = bits >> 24;
        let word = bits & 0x007f_ffff;
        if size <= 3 {
            Target(U256::from_u64((word >> (8 * (3 - size))) as u64))
        } else {
            Target(U256::from_u64(word as u64).wrapping_shl(8 * (size - 3)))
        }
    }

    /// Decodes a compact target, rejecting encodings whose mantissa carries
    /// the sign bit or whose value does not fit in 256 bits.
    pub fn from_compact_checked(c: CompactTarget) -> Result<Target, CompactTargetError> {
        let bits = c.to_consensus();
        let size = bits >> 24;
        let word = bits & 0x007f_ffff;
        if word != 0 && bits & 0x0080_0000 != 0 {
            return Err(CompactTargetError::Negative);
        }
        if word != 0 && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32)) {
            return Err(CompactTargetError::Overflow);
        }
        Ok(Target::from_compact(c))
    }

    /// Encodes this target to compact form, rounding the mantissa to 23 bits.
    ///
    /// Lossy: values that differ only below the kept mantissa bits encode to
    /// the same compact form. `Target::from_compact` is the identity inverse
    /// only for values already representable in a 23-bit mantissa.
    pub fn to_compact_lossy(self) -> CompactTarget {
        let mut size = (self.0.bits() + 7) / 8;
        let mut compact = if size <= 3 {
            (self.0.low_u64() << (8 * (3 - size))) as u32
        } else {
            self.0.wrapping_shr(8 * (size - 3)).low_u64() as u32
        };
        // The mantissa sign bit must stay clear; shift a byte into the
        // exponent instead.
        if compact & 0x0080_0000 != 0 {
            compact >>= 8;
            size += 1;
        }
        CompactTarget(compact | (size << 24))
    }

    /// Returns true if the target is zero.
    pub fn is_zero(&self) -> bool { self.0.is_zero() }

    /// Returns true if the given hash satisfies this target.
    ///
    /// The hash byte array carries the integer little-endian, so the final
    /// comparison happens on the numeric values.
    pub fn is_met_by(self, hash: BlockHash) -> bool {
        let hash = U256::from_le_bytes(hash.to_byte_array());
        hash <= self.0
    }

    /// Converts a 32-byte big-endian array to a target.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Target { Target(U256::from_be_bytes(bytes)) }

    /// Multiplies the target by a scalar, saturating at the 256-bit maximum.
    ///
    /// The retarget rules clamp their timespan operands before multiplying;
    /// saturation only fires on adversarial inputs and is absorbed by the
    /// subsequent `pow_limit` clamp.
    pub(crate) fn saturating_mul_u64(self, rhs: u64) -> Target {
        Target(self.0.saturating_mul_u64(rhs))
    }

    /// Divides the target by a scalar. The divisor must be non-zero; callers
    /// validate parameters before dividing.
    pub(crate) fn div_u64(self, rhs: u64) -> Target { Target(self.0.div_u64(rhs)) }

    /// Adds two targets, saturating at the 256-bit maximum.
    pub(crate) fn saturating_add(self, rhs: Target) -> Target {
        Target(self.0.saturating_add(rhs.0))
    }

    /// Approximates the target as a floating point number.
    pub(crate) fn to_f64(self) -> f64 { self.0.to_f64() }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "Target(0x{:x})", self) }
}

impl fmt::LowerHex for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        fmt::LowerHex::fmt(&(&bytes[..]).as_hex(), f)
    }
}

impl fmt::UpperHex for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        fmt::UpperHex::fmt(&(&bytes[..]).as_hex(), f)
    }
}

/// Computes the required compact target for the block following `last`. (The
/// next-work dispatcher.)
///
/// `header_time` is the timestamp of the candidate block header, when one is
/// available; the windowed regime's emergency ladder and the testnet
/// min-difficulty rule consult it. A missing tip yields the `pow_limit`
/// encoding.
pub fn next_work_required<N: BlockIndex>(
    last: Option<&N>,
    header_time: Option<i64>,
    params: &Params,
) -> CompactTarget {
    let pow_limit = params.pow_limit.to_compact_lossy();

    if let Some(tip) = last {
        // Anchored heights take precedence over the regime switch.
        if let Some(bits) = anchored_bits(tip.height(), PRE_DISPATCH_ANCHORS, params) {
            return bits;
        }
        if tip.height() >= params.new_pow_diff_height {
            return windowed_next_work_required(last, header_time, params);
        }
    }

    // Genesis block.
    let tip = match last {
        Some(tip) => tip,
        None => return pow_limit,
    };

    if let Some(bits) = anchored_bits(tip.height(), LEGACY_ANCHORS, params) {
        return bits;
    }

    let interval = params.difficulty_adjustment_interval() as i64;

    // Only change once per difficulty adjustment interval.
    if (i64::from(tip.height()) + 1) % interval != 0 {
        if params.allow_min_difficulty_blocks {
            // Special difficulty rule for testnet: if the new block's
            // timestamp is more than twice the target spacing ahead of the
            // tip, a min-difficulty block may be mined.
            match header_time {
                Some(t) if t > tip.time() + 2 * params.pow_target_spacing as i64 => {
                    return pow_limit
                }
                _ => {
                    // Return the last non-min-difficulty-rules block.
                    let mut cursor = tip;
                    while let Some(prev) = cursor.prev() {
                        if i64::from(cursor.height()) % interval == 0 || cursor.bits() != pow_limit
                        {
                            break;
                        }
                        cursor = prev;
                    }
                    return cursor.bits();
                }
            }
        }
        return tip.bits();
    }

    // Go back to the first block of the epoch.
    let first_height = tip.height() - (interval as i32 - 1);
    let first = match tip.ancestor(first_height) {
        Some(first) => first,
        None => return pow_limit,
    };

    calculate_next_work_required(tip, first.time(), params)
}

/// Computes the legacy epoch retarget given the tip and the timestamp of the
/// first block of the current epoch.
pub fn calculate_next_work_required<N: BlockIndex>(
    last: &N,
    first_block_time: i64,
    params: &Params,
) -> CompactTarget {
    if params.no_pow_retargeting {
        return last.bits();
    }

    // Limit adjustment step.
    let timespan = params.pow_target_timespan as i64;
    let mut actual_timespan = last.time() - first_block_time;
    if actual_timespan < timespan / 4 {
        actual_timespan = timespan / 4;
    }
    if actual_timespan > timespan * 4 {
        actual_timespan = timespan * 4;
    }

    // Retarget. The operand order is consensus: multiply by the clamped
    // timespan before dividing by the ideal one.
    let mut target = Target::from_compact(last.bits())
        .saturating_mul_u64(actual_timespan as u64)
        .div_u64(timespan as u64);
    if target > params.pow_limit {
        target = params.pow_limit;
    }

    target.to_compact_lossy()
}

/// Computes the required compact target under the windowed regime.
///
/// When `header_time` is present the emergency relaxation rules run first;
/// otherwise the trailing-window average retarget is computed.
pub fn windowed_next_work_required<N: BlockIndex>(
    last: Option<&N>,
    header_time: Option<i64>,
    params: &Params,
) -> CompactTarget {
    let pow_limit = params.pow_limit.to_compact_lossy();
    let emergency_floor = params.pow_new_limit.to_compact_lossy();

    // Genesis block.
    let tip = match last {
        Some(tip) => tip,
        None => return pow_limit,
    };

    // Regtest.
    if params.no_pow_retargeting {
        return tip.bits();
    }

    // Degenerate window parameters would divide by zero below.
    if params.pow_averaging_window <= 0 || params.post_blossom_pow_target_spacing <= 0 {
        return emergency_floor;
    }

    let spacing = params.post_blossom_pow_target_spacing;

    if tip.height() < GRADUATED_EMERGENCY_HEIGHT {
        // Single-step emergency rule of the early windowed era.
        if let Some(t) = header_time {
            if t > tip.time() + spacing * 6 {
                return emergency_floor;
            }
        }
    } else if let Some(t) = header_time {
        // Graduated emergency ladder.
        let gap = t - tip.time();
        let ceiling = Target::from_compact(params.pow_max_limit.to_compact_lossy());
        let relaxed = if gap > spacing * 8 {
            return params.pow_max_limit.to_compact_lossy();
        } else if gap > spacing * 6 {
            Target::from_compact(tip.bits()).saturating_mul_u64(100).div_u64(35)
        } else if gap > spacing * 3 {
            Target::from_compact(tip.bits()).saturating_mul_u64(100).div_u64(50)
        } else {
            // A well-timed candidate keeps the tip's bits; the window
            // retarget below only runs when no candidate header was given.
            // TODO: confirm with the protocol owners that freezing here,
            // rather than falling through to the window retarget, is wanted.
            return tip.bits();
        };
        if relaxed > ceiling {
            return params.pow_max_limit.to_compact_lossy();
        }
        return relaxed.to_compact_lossy();
    }

    // Sum the targets over the trailing window.
    let window = params.pow_averaging_window;
    let mut total = Target::ZERO;
    let mut cursor = Some(tip);
    for _ in 0..window {
        match cursor {
            Some(node) => {
                total = total.saturating_add(Target::from_compact(node.bits()));
                cursor = node.prev();
            }
            None => break,
        }
    }

    // The node one past the window supplies the reference timestamp; a chain
    // shorter than the window cannot retarget.
    let first = match cursor {
        Some(node) => node,
        None => return emergency_floor,
    };

    let average = total.div_u64(window as u64);
    calculate_windowed_work_required(average, first.time(), tip.time(), params)
}

/// Computes the windowed retarget step from an already-averaged target and
/// the window's boundary timestamps.
pub fn calculate_windowed_work_required(
    average_target: Target,
    first_block_time: i64,
    last_block_time: i64,
    params: &Params,
) -> CompactTarget {
    let window_timespan = params.averaging_window_timespan();
    if window_timespan <= 0 {
        return params.pow_new_limit.to_compact_lossy();
    }

    // Dampen the observed timespan toward the ideal one, then clamp.
    let mut actual_timespan = last_block_time - first_block_time;
    actual_timespan = window_timespan + (actual_timespan - window_timespan) / 4;
    if actual_timespan < params.min_actual_timespan() {
        actual_timespan = params.min_actual_timespan();
    }
    if actual_timespan > params.max_actual_timespan() {
        actual_timespan = params.max_actual_timespan();
    }

    // Retarget. Dividing before multiplying keeps the intermediate inside
    // 256 bits.
    let mut target = average_target
        .div_u64(window_timespan as u64)
        .saturating_mul_u64(actual_timespan as u64);
    if target > params.pow_limit {
        target = params.pow_limit;
    }

    target.to_compact_lossy()
}

/// Checks that a transition between the compact targets of two consecutive
/// blocks is legal under the regime active at `height`.
pub fn permitted_difficulty_transition(
    params: &Params,
    height: i64,
    old_bits: CompactTarget,
    new_bits: CompactTarget,
) -> bool {
    if params.allow_min_difficulty_blocks {
        return true;
    }

    if height >= i64::from(params.new_pow_diff_height) {
        let observed = Target::from_compact(new_bits);
        let old = Target::from_compact(old_bits);

        let mut max_target =
            old.saturating_mul_u64((100 + params.pow_max_adjust_down) as u64).div_u64(100);
        if max_target > params.pow_limit {
            max_target = params.pow_limit;
        }

        // An adjust-up of 100% or more would zero the scale factor.
        let min_target = if params.pow_max_adjust_up >= 100 {
            old.div_u64(100)
        } else {
            old.saturating_mul_u64((100 - params.pow_max_adjust_up) as u64).div_u64(100)
        };

        observed >= min_target && observed <= max_target
    } else if height % params.difficulty_adjustment_interval() as i64 == 0 {
        let observed = Target::from_compact(new_bits);
        let timespan = params.pow_target_timespan;
        let old = Target::from_compact(old_bits);

        let mut largest = old.saturating_mul_u64(timespan * 4).div_u64(timespan);
        if largest > params.pow_limit {
            largest = params.pow_limit;
        }
        // Compare at compact granularity; the raw bound is generally not
        // compact-representable.
        if observed > Target::from_compact(largest.to_compact_lossy()) {
            return false;
        }

        let mut smallest = old.saturating_mul_u64(timespan / 4).div_u64(timespan);
        if smallest > params.pow_limit {
            smallest = params.pow_limit;
        }
        observed >= Target::from_compact(smallest.to_compact_lossy())
    } else {
        old_bits == new_bits
    }
}

/// Checks that the given hash satisfies the claimed compact target.
///
/// Rejects targets that decode negative, zero or overflowed, and targets
/// easier than the chain's proof-of-work limit.
pub fn check_proof_of_work(hash: BlockHash, bits: CompactTarget, params: &Params) -> bool {
    let target = match Target::from_compact_checked(bits) {
        Ok(target) => target,
        Err(_) => return false,
    };
    if target.is_zero() || target > params.pow_limit {
        return false;
    }
    target.is_met_by(hash)
}

/// Big-endian 256-bit unsigned integer: `U256(high, low)` holds the value
/// `high * 2^128 + low`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct U256(u128, u128);

impl U256 {
    const ZERO: U256 = U256(0, 0);

    const MAX: U256 = U256(u128::MAX, u128::MAX);

    fn from_u64(n: u64) -> U256 { U256(0, n as u128) }

    fn is_zero(&self) -> bool { self.0 == 0 && self.1 == 0 }

    /// Returns the number of significant bits.
    fn bits(&self) -> u32 {
        if self.0 != 0 {
            256 - self.0.leading_zeros()
        } else {
            128 - self.1.leading_zeros()
        }
    }

    fn low_u64(&self) -> u64 { self.1 as u64 }

    fn from_be_bytes(bytes: [u8; 32]) -> U256 {
        let mut high = [0u8; 16];
        let mut low = [0u8; 16];
        high.copy_from_slice(&bytes[..16]);
        low.copy_from_slice(&bytes[16..]);
        U256(u128::from_be_bytes(high), u128::from_be_bytes(low))
    }

    fn from_le_bytes(bytes: [u8; 32]) -> U256 {
        let mut low = [0u8; 16];
        let mut high = [0u8; 16];
        low.copy_from_slice(&bytes[..16]);
        high.copy_from_slice(&bytes[16..]);
        U256(u128::from_le_bytes(high), u128::from_le_bytes(low))
    }

    fn to_be_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[..16].copy_from_slice(&self.0.to_be_bytes());
        out[16..].copy_from_slice(&self.1.to_be_bytes());
        out
    }

    fn to_limbs(self) -> [u64; 4] {
        [self.1 as u64, (self.1 >> 64) as u64, self.0 as u64, (self.0 >> 64) as u64]
    }

    fn from_limbs(limbs: [u64; 4]) -> U256 {
        U256(
            ((limbs[3] as u128) << 64) | limbs[2] as u128,
            ((limbs[1] as u128) << 64) | limbs[0] as u128,
        )
    }

    fn overflowing_add(self, rhs: U256) -> (U256, bool) {
        let (low, carry) = self.1.overflowing_add(rhs.1);
        let (high, overflow_1) = self.0.overflowing_add(rhs.0);
        let (high, overflow_2) = high.overflowing_add(carry as u128);
        (U256(high, low), overflow_1 | overflow_2)
    }

    fn saturating_add(self, rhs: U256) -> U256 {
        let (sum, overflow) = self.overflowing_add(rhs);
        if overflow {
            U256::MAX
        } else {
            sum
        }
    }

    fn mul_u64(self, rhs: u64) -> (U256, bool) {
        let mut limbs = self.to_limbs();
        let mut carry: u128 = 0;
        for limb in limbs.iter_mut() {
            let product = (*limb as u128) * (rhs as u128) + carry;
            *limb = product as u64;
            carry = product >> 64;
        }
        (U256::from_limbs(limbs), carry != 0)
    }

    fn saturating_mul_u64(self, rhs: u64) -> U256 {
        let (product, overflow) = self.mul_u64(rhs);
        if overflow {
            U256::MAX
        } else {
            product
        }
    }

    /// Long division by a 64-bit divisor. The divisor must be non-zero.
    fn div_u64(self, rhs: u64) -> U256 {
        let mut limbs = self.to_limbs();
        let mut rem: u64 = 0;
        for i in (0..4).rev() {
            let cur = ((rem as u128) << 64) | limbs[i] as u128;
            limbs[i] = (cur / rhs as u128) as u64;
            rem = (cur % rhs as u128) as u64;
        }
        U256::from_limbs(limbs)
    }

    /// Left shift discarding bits shifted past the width.
    fn wrapping_shl(self, n: u32) -> U256 {
        if n >= 256 {
            U256::ZERO
        } else if n >= 128 {
            U256(self.1 << (n - 128), 0)
        } else if n == 0 {
            self
        } else {
            U256((self.0 << n) | (self.1 >> (128 - n)), self.1 << n)
        }
    }

    /// Right shift discarding bits shifted past the width.
    fn wrapping_shr(self, n: u32) -> U256 {
        if n >= 256 {
            U256::ZERO
        } else if n >= 128 {
            U256(0, self.0 >> (n - 128))
        } else if n == 0 {
            self
        } else {
            U256(self.0 >> n, (self.1 >> n) | (self.0 << (128 - n)))
        }
    }

    fn to_f64(self) -> f64 { (self.0 as f64) * 340_282_366_920_938_463_463_374_607_431_768_211_456.0 + self.1 as f64 }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.to_be_bytes();
        write!(f, "0x")?;
        fmt::LowerHex::fmt(&(&bytes[..]).as_hex(), f)
    }
}
