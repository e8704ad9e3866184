//! Deterministic per-region blending across a season boundary.
//!
//! During the last few days of a season a growing, stable subset of regions
//! already shows the next season's target. Membership is a pure function of
//! the region key, so the subset only ever grows as the factor rises.

use solstice_world::RegionKey;

/// Fraction of regions that should show the next season, in `[0, 1]`.
///
/// The window covers the last `min(window_days, season_length)` days and
/// reaches exactly 1.0 on the final day.
pub fn blend_factor(day_in_season: u32, season_length: u32, window_days: u32) -> f64 {
    let len = season_length.max(1);
    let window = window_days.min(len);
    if window == 0 {
        return 0.0;
    }
    let day = day_in_season.clamp(1, len);
    let start = len - window + 1;
    if day < start {
        return 0.0;
    }
    (f64::from(day - start + 1) / f64::from(window)).clamp(0.0, 1.0)
}

/// 16-bit bucket derived from the region key with a fixed LCG step.
///
/// The key is multiplied and folded first: the LCG's low bits only see the
/// key's low bits, which hold region z alone.
#[inline]
pub fn blend_bucket(key: RegionKey) -> u16 {
    let mut k = key.raw().wrapping_mul(0x9E37_79B9_7F4A_7C15);
    k ^= k >> 32;
    let mut h = k.wrapping_mul(1_103_515_245).wrapping_add(12_345);
    h ^= h >> 16;
    (h & 0xFFFF) as u16
}

pub fn choose_blended<T: Copy + PartialEq>(key: RegionKey, current: T, next: T, factor: f64) -> T {
    if factor <= 0.0 || current == next {
        return current;
    }
    if factor >= 1.0 {
        return next;
    }
    if f64::from(blend_bucket(key)) < factor * 65_536.0 {
        next
    } else {
        current
    }
}
