//! Path-wise cost aggregation (Hirschmüller recurrence).
//!
//! Each direction is a full independent sweep writing its own `u8` volume.
//! Horizontal sweeps run rows in parallel; vertical and diagonal sweeps walk
//! rows in travel order and run the pixels of a row in parallel, since every
//! predecessor then sits in the previously finished row.

use rayon::prelude::*;

use crate::PathCount;

/// Direction of travel of one aggregation path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathDirection {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
    TopLeftToBottomRight,
    BottomRightToTopLeft,
    TopRightToBottomLeft,
    BottomLeftToTopRight,
}

const AXES: [PathDirection; 4] = [
    PathDirection::LeftToRight,
    PathDirection::RightToLeft,
    PathDirection::TopToBottom,
    PathDirection::BottomToTop,
];

const ALL: [PathDirection; 8] = [
    PathDirection::LeftToRight,
    PathDirection::RightToLeft,
    PathDirection::TopToBottom,
    PathDirection::BottomToTop,
    PathDirection::TopLeftToBottomRight,
    PathDirection::BottomRightToTopLeft,
    PathDirection::TopRightToBottomLeft,
    PathDirection::BottomLeftToTopRight,
];

impl PathDirection {
    pub fn for_count(count: PathCount) -> &'static [PathDirection] {
        match count {
            PathCount::Four => &AXES,
            PathCount::Eight => &ALL,
        }
    }

    /// Step `(dx, dy)` from the previous pixel to the current one.
    pub fn step(self) -> (isize, isize) {
        match self {
            PathDirection::LeftToRight => (1, 0),
            PathDirection::RightToLeft => (-1, 0),
            PathDirection::TopToBottom => (0, 1),
            PathDirection::BottomToTop => (0, -1),
            PathDirection::TopLeftToBottomRight => (1, 1),
            PathDirection::BottomRightToTopLeft => (-1, -1),
            PathDirection::TopRightToBottomLeft => (-1, 1),
            PathDirection::BottomLeftToTopRight => (1, -1),
        }
    }
}

/// Penalties shared by every step of a sweep.
#[derive(Clone, Copy, Debug)]
pub struct Penalties {
    pub p1: u32,
    pub p2_init: u32,
}

impl Penalties {
    /// Discontinuity penalty across a step from intensity `prev` to `cur`.
    #[inline]
    pub fn p2(&self, cur: u8, prev: u8) -> u32 {
        let grad = u32::from(cur.abs_diff(prev)).max(1);
        self.p2_init / grad
    }
}

/// One recurrence step: `out[d] = C(d) + min(...) - min_k prev[k]`, saturated
/// to `u8`.
#[inline]
pub fn path_step(prev: &[u8], cost: &[u8], out: &mut [u8], p1: u32, p2: u32) {
    let range = cost.len();
    let min_prev = prev.iter().copied().min().map_or(0, u32::from);
    let jump = min_prev + p2;
    for d in 0..range {
        let same = u32::from(prev[d]);
        let lower = if d > 0 {
            u32::from(prev[d - 1]) + p1
        } else {
            u32::MAX
        };
        let upper = if d + 1 < range {
            u32::from(prev[d + 1]) + p1
        } else {
            u32::MAX
        };
        let best = same.min(lower).min(upper).min(jump);
        let l = u32::from(cost[d]) + best - min_prev;
        out[d] = l.min(u32::from(u8::MAX)) as u8;
    }
}

/// Run one directional sweep over the whole image into `out`.
#[allow(clippy::too_many_arguments)]
pub fn aggregate_path(
    gray: &[u8],
    cost: &[u8],
    out: &mut [u8],
    width: usize,
    height: usize,
    range: usize,
    direction: PathDirection,
    penalties: Penalties,
) {
    debug_assert_eq!(gray.len(), width * height);
    debug_assert_eq!(cost.len(), width * height * range);
    debug_assert_eq!(out.len(), cost.len());

    let (dx, dy) = direction.step();
    if dy == 0 {
        sweep_rows(gray, cost, out, width, range, dx > 0, penalties);
    } else {
        sweep_wavefront(gray, cost, out, width, height, range, dx, dy, penalties);
    }
}

fn sweep_rows(
    gray: &[u8],
    cost: &[u8],
    out: &mut [u8],
    width: usize,
    range: usize,
    forward: bool,
    penalties: Penalties,
) {
    let row_len = width * range;
    out.par_chunks_mut(row_len)
        .zip(cost.par_chunks(row_len))
        .zip(gray.par_chunks(width))
        .for_each(|((out_row, cost_row), gray_row)| {
            let first = if forward { 0 } else { width - 1 };
            out_row[first * range..(first + 1) * range]
                .copy_from_slice(&cost_row[first * range..(first + 1) * range]);

            for i in 1..width {
                let x = if forward { i } else { width - 1 - i };
                let xp = if forward { x - 1 } else { x + 1 };
                let p2 = penalties.p2(gray_row[x], gray_row[xp]);
                let c = &cost_row[x * range..(x + 1) * range];
                if forward {
                    let (done, rest) = out_row.split_at_mut(x * range);
                    path_step(&done[xp * range..], c, &mut rest[..range], penalties.p1, p2);
                } else {
                    let (rest, done) = out_row.split_at_mut(xp * range);
                    path_step(&done[..range], c, &mut rest[x * range..], penalties.p1, p2);
                }
            }
        });
}

#[allow(clippy::too_many_arguments)]
fn sweep_wavefront(
    gray: &[u8],
    cost: &[u8],
    out: &mut [u8],
    width: usize,
    height: usize,
    range: usize,
    dx: isize,
    dy: isize,
    penalties: Penalties,
) {
    let row_len = width * range;
    let forward = dy > 0;
    let first = if forward { 0 } else { height - 1 };
    out[first * row_len..(first + 1) * row_len]
        .copy_from_slice(&cost[first * row_len..(first + 1) * row_len]);

    for i in 1..height {
        let y = if forward { i } else { height - 1 - i };
        let yp = if forward { y - 1 } else { y + 1 };
        let (prev_row, cur_row) = if forward {
            let (done, rest) = out.split_at_mut(y * row_len);
            (&done[yp * row_len..], &mut rest[..row_len])
        } else {
            let (rest, done) = out.split_at_mut(yp * row_len);
            (&done[..row_len], &mut rest[y * row_len..])
        };
        let cost_row = &cost[y * row_len..(y + 1) * row_len];
        let gray_row = &gray[y * width..(y + 1) * width];
        let gray_prev = &gray[yp * width..(yp + 1) * width];

        cur_row
            .par_chunks_mut(range)
            .enumerate()
            .for_each(|(x, cell)| {
                let c = &cost_row[x * range..(x + 1) * range];
                let xp = x as isize - dx;
                if xp < 0 || xp >= width as isize {
                    cell.copy_from_slice(c);
                    return;
                }
                let xp = xp as usize;
                let p2 = penalties.p2(gray_row[x], gray_prev[xp]);
                path_step(
                    &prev_row[xp * range..(xp + 1) * range],
                    c,
                    cell,
                    penalties.p1,
                    p2,
                );
            });
    }
}

/// Sum the directional volumes into the 16-bit aggregated volume.
pub fn sum_paths(paths: &[Vec<u8>], aggregated: &mut [u16]) {
    aggregated
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, acc)| {
            *acc = paths.iter().map(|p| u16::from(p[i])).sum();
        });
}
