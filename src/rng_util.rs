use crate::range::ScalarRange;
use crate::types::Scale;

/// Generate a random `f64` in the range `[low, high)`.
#[inline]
pub(crate) fn f64_range(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// Draw from `[low, high)` uniformly, or log-uniformly on a log scale.
///
/// Log draws are kept strictly inside `(low, high)`, absorbing both the
/// closed lower end of the draw and rounding in `exp(ln(x))`.
pub(crate) fn scaled_f64(rng: &mut fastrand::Rng, low: f64, high: f64, scale: Scale) -> f64 {
    match scale {
        Scale::Linear => f64_range(rng, low, high),
        Scale::Log => strictly_inside(f64_range(rng, low.ln(), high.ln()).exp(), low, high),
    }
}

/// Move a log-scale value into the open interval `(low, high)`.
///
/// Both bounds are positive, so stepping the bit pattern by one gives the
/// adjacent representable value. A range with no representable interior
/// (including `low == high`) yields `low`.
pub(crate) fn strictly_inside(value: f64, low: f64, high: f64) -> f64 {
    debug_assert!(low > 0.0, "log scale requires positive low bound");
    let above = f64::from_bits(low.to_bits() + 1);
    let below = f64::from_bits(high.to_bits() - 1);
    if above > below {
        return low;
    }
    value.clamp(above, below)
}

/// Draw a float parameter from its full range.
pub(crate) fn sample_f64(rng: &mut fastrand::Rng, range: &ScalarRange<f64>) -> f64 {
    scaled_f64(rng, range.min, range.max, range.scale)
}

/// Draw an integer parameter from its inclusive range.
///
/// On a log scale the draw is taken from `[ln min, ln(max + 1))` and floored,
/// so every integer in the range stays reachable.
pub(crate) fn sample_u32(rng: &mut fastrand::Rng, range: &ScalarRange<u32>) -> u32 {
    match range.scale {
        Scale::Linear => rng.u32(range.min..=range.max),
        Scale::Log => {
            let value = scaled_f64(
                rng,
                f64::from(range.min),
                f64::from(range.max) + 1.0,
                Scale::Log,
            );
            floor_u32(value, range.min, range.max)
        }
    }
}

/// Floor a float into an integer range, clamping at both ends.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn floor_u32(value: f64, min: u32, max: u32) -> u32 {
    let floored = value.floor().max(0.0);
    if floored >= f64::from(max) {
        max
    } else {
        (floored as u32).max(min)
    }
}
