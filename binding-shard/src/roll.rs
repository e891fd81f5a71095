//! Drop chance roll in fixed-point hundredths of a percent.
use rand::{Rng, RngCore};

use crate::constants::{BASIS_POINTS_PER_PERCENT, CHANCE_MAX_PCT, CHANCE_MIN_PCT, ROLL_SCALE};
use crate::numbers::round_f64_to_u32;

/// Number of winning buckets out of [`ROLL_SCALE`] for a percentage.
#[must_use]
pub fn chance_threshold(chance_pct: f64) -> u32 {
    round_f64_to_u32(chance_pct * BASIS_POINTS_PER_PERCENT).min(ROLL_SCALE)
}

/// Decide whether a drop happens at `chance_pct` percent.
///
/// `<= 0` never succeeds and `>= 100` always succeeds, both without drawing.
/// Otherwise draws uniformly from `1..=10000` and succeeds when the draw is at
/// most `round(chance_pct * 100)`.
pub fn roll_succeeds<R: RngCore>(chance_pct: f64, rng: &mut R) -> bool {
    if chance_pct.is_nan() || chance_pct <= CHANCE_MIN_PCT {
        return false;
    }
    if chance_pct >= CHANCE_MAX_PCT {
        return true;
    }
    let need = chance_threshold(chance_pct);
    let draw = rng.gen_range(1..=ROLL_SCALE);
    draw <= need
}
