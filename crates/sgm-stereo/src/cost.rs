use rayon::prelude::*;

/// Cost of a candidate whose right-image column falls outside the image.
pub const MAX_COST: u8 = u8::MAX;

#[inline]
pub fn hamming(a: u64, b: u64) -> u8 {
    (a ^ b).count_ones().min(u32::from(MAX_COST)) as u8
}

/// Fill the initial `width * height * range` cost volume from the two census
/// images. Cell `(y * width + x) * range + i` holds the cost of disparity
/// `min_disparity + i`, matching left column `x` with right column `x - d`.
pub fn compute_cost(
    census_left: &[u64],
    census_right: &[u64],
    cost: &mut [u8],
    width: usize,
    min_disparity: i32,
    range: usize,
) {
    debug_assert_eq!(census_left.len(), census_right.len());
    debug_assert_eq!(cost.len(), census_left.len() * range);

    cost.par_chunks_mut(width * range)
        .enumerate()
        .for_each(|(y, cost_row)| {
            let left_row = &census_left[y * width..(y + 1) * width];
            let right_row = &census_right[y * width..(y + 1) * width];
            for (x, cells) in cost_row.chunks_exact_mut(range).enumerate() {
                let code_l = left_row[x];
                for (i, cell) in cells.iter_mut().enumerate() {
                    let d = i64::from(min_disparity) + i as i64;
                    let xr = x as i64 - d;
                    *cell = if xr < 0 || xr >= width as i64 {
                        MAX_COST
                    } else {
                        hamming(code_l, right_row[xr as usize])
                    };
                }
            }
        });
}
