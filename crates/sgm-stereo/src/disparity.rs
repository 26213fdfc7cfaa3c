use rayon::prelude::*;

use crate::{CensusSize, INVALID_DISPARITY};

/// Selection parameters for winner-take-all extraction.
#[derive(Clone, Copy, Debug)]
pub struct Selection {
    pub min_disparity: i32,
    pub uniqueness_ratio: f32,
    pub census: CensusSize,
}

/// Vertex offset of the parabola through three costs around a minimum,
/// clamped to `(-1, 1)`. Negative means the true minimum lies toward the
/// lower disparity.
pub fn subpixel_offset(before: u16, best: u16, after: u16) -> f32 {
    let (c0, c1, c2) = (f32::from(before), f32::from(best), f32::from(after));
    let denom = 2.0 * (c0 - 2.0 * c1 + c2);
    if denom == 0.0 {
        return 0.0;
    }
    let delta = (c0 - c2) / denom;
    delta.clamp(-1.0 + f32::EPSILON, 1.0 - f32::EPSILON)
}

/// Pick the disparity for one pixel from its aggregated costs.
pub fn select_disparity(costs: &[u16], min_disparity: i32, uniqueness_ratio: f32) -> f32 {
    if costs.is_empty() {
        return INVALID_DISPARITY;
    }
    let mut min_cost = u16::MAX;
    let mut sec_cost = u16::MAX;
    let mut best = 0usize;
    for (i, &c) in costs.iter().enumerate() {
        if c < min_cost {
            sec_cost = min_cost;
            min_cost = c;
            best = i;
        } else if c < sec_cost {
            sec_cost = c;
        }
    }

    let margin = f32::from(sec_cost) - f32::from(min_cost);
    if margin <= uniqueness_ratio * f32::from(min_cost) {
        return INVALID_DISPARITY;
    }

    let base = (i64::from(min_disparity) + best as i64) as f32;
    if best == 0 || best + 1 == costs.len() {
        return base;
    }
    base + subpixel_offset(costs[best - 1], costs[best], costs[best + 1])
}

/// Reduce the aggregated volume to a disparity map. Returns the number of
/// valid pixels written.
pub fn compute_disparity(
    aggregated: &[u16],
    out: &mut [f32],
    width: usize,
    height: usize,
    range: usize,
    sel: Selection,
) -> usize {
    debug_assert_eq!(out.len(), width * height);
    debug_assert_eq!(aggregated.len(), width * height * range);

    out.par_chunks_mut(width)
        .enumerate()
        .map(|(y, out_row)| {
            let mut valid = 0usize;
            for (x, disp) in out_row.iter_mut().enumerate() {
                *disp = if sel.census.fits(x, y, width, height) {
                    let base = (y * width + x) * range;
                    select_disparity(
                        &aggregated[base..base + range],
                        sel.min_disparity,
                        sel.uniqueness_ratio,
                    )
                } else {
                    INVALID_DISPARITY
                };
                if *disp != INVALID_DISPARITY {
                    valid += 1;
                }
            }
            valid
        })
        .sum()
}
