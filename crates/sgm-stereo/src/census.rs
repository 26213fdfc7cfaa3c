//! Census transform: one bit per window neighbour, set when the neighbour is
//! at least as bright as the center.

use rayon::prelude::*;

use crate::CensusSize;

/// Write one census code per pixel of `img` into `out`.
///
/// Pixels whose window leaves the image get code 0. Bits are packed in raster
/// order of the window, first neighbour in the most significant used bit.
pub fn census_transform(
    img: &[u8],
    out: &mut [u64],
    width: usize,
    height: usize,
    size: CensusSize,
) {
    debug_assert_eq!(img.len(), width * height);
    debug_assert_eq!(out.len(), width * height);
    let (hx, hy) = size.half_extents();

    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            if y < hy || y + hy >= height {
                out_row.fill(0);
                return;
            }
            for (x, code_out) in out_row.iter_mut().enumerate() {
                if x < hx || x + hx >= width {
                    *code_out = 0;
                    continue;
                }
                let center = img[y * width + x];
                let mut code = 0u64;
                for wy in y - hy..=y + hy {
                    let row = &img[wy * width..(wy + 1) * width];
                    for (wx, &v) in row.iter().enumerate().take(x + hx + 1).skip(x - hx) {
                        if wx == x && wy == y {
                            continue;
                        }
                        code = (code << 1) | u64::from(v >= center);
                    }
                }
                *code_out = code;
            }
        });
}
