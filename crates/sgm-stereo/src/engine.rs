//! Matching engine: owns every intermediate volume and runs the four stages.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate_path, sum_paths, PathDirection, Penalties};
use crate::census::census_transform;
use crate::cost::compute_cost;
use crate::disparity::{compute_disparity, Selection};
use crate::{Error, MatchStats, Result, SgmOptions};

/// Buffers sized for one `(width, height, options)` triple. Volumes are
/// indexed `(y * width + x) * range + d`.
struct Volumes {
    census_left: Vec<u64>,
    census_right: Vec<u64>,
    cost_init: Vec<u8>,
    cost_paths: Vec<Vec<u8>>,
    cost_aggr: Vec<u16>,
}

impl Volumes {
    fn allocate(pixels: usize, range: usize, paths: usize) -> Result<Self> {
        let cells = pixels
            .checked_mul(range)
            .ok_or(Error::Allocation { bytes: usize::MAX })?;
        let mut cost_paths = Vec::with_capacity(paths);
        for _ in 0..paths {
            cost_paths.push(zeroed::<u8>(cells)?);
        }
        Ok(Self {
            census_left: zeroed(pixels)?,
            census_right: zeroed(pixels)?,
            cost_init: zeroed(cells)?,
            cost_paths,
            cost_aggr: zeroed(cells)?,
        })
    }

    fn bytes(&self) -> usize {
        let paths: usize = self.cost_paths.iter().map(Vec::len).sum();
        (self.census_left.len() + self.census_right.len()) * std::mem::size_of::<u64>()
            + self.cost_init.len()
            + paths
            + self.cost_aggr.len() * std::mem::size_of::<u16>()
    }
}

fn zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>> {
    let bytes = len.saturating_mul(std::mem::size_of::<T>());
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| Error::Allocation { bytes })?;
    v.resize(len, T::default());
    Ok(v)
}

/// Semi-Global Matching engine for one fixed image size.
///
/// Call [`initialize`](Self::initialize) once, then
/// [`match_pair`](Self::match_pair) for each pair of that size. One engine
/// runs one match at a time; use separate engines for concurrent matches.
#[derive(Default)]
pub struct SemiGlobalMatcher {
    width: usize,
    height: usize,
    options: SgmOptions,
    volumes: Option<Volumes>,
}

impl SemiGlobalMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.volumes.is_some()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn options(&self) -> &SgmOptions {
        &self.options
    }

    /// Validate the configuration and allocate all volumes. On failure the
    /// engine is left not-ready.
    pub fn initialize(&mut self, width: usize, height: usize, options: SgmOptions) -> Result<()> {
        self.release();
        if width == 0 || height == 0 {
            warn!(width, height, "rejecting empty image size");
            return Err(Error::InvalidDimensions { width, height });
        }
        options.validate().inspect_err(|e| warn!(error = %e, "rejecting options"))?;

        let pixels = width
            .checked_mul(height)
            .ok_or(Error::InvalidDimensions { width, height })?;
        let range = options.disparity_range();
        let volumes = Volumes::allocate(pixels, range, options.num_paths.get())?;
        info!(
            width,
            height,
            range,
            paths = options.num_paths.get(),
            bytes = volumes.bytes(),
            "sgm volumes allocated"
        );

        self.width = width;
        self.height = height;
        self.options = options;
        self.volumes = Some(volumes);
        Ok(())
    }

    /// Release the current volumes and initialize again.
    pub fn reset(&mut self, width: usize, height: usize, options: SgmOptions) -> Result<()> {
        self.release();
        self.initialize(width, height, options)
    }

    /// Free every owned volume. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.volumes.take().is_some() {
            debug!("sgm volumes released");
        }
    }

    /// Match a rectified pair and write the left disparity map into `out`.
    ///
    /// `left`, `right` and `out` must all hold `width * height` elements.
    /// On error `out` is left untouched.
    pub fn match_pair(
        &mut self,
        left: &[u8],
        right: &[u8],
        out: &mut [f32],
    ) -> Result<MatchStats> {
        let (width, height, opts) = (self.width, self.height, self.options);
        let Some(vol) = self.volumes.as_mut() else {
            warn!("match requested before initialization");
            return Err(Error::NotInitialized);
        };
        let pixels = width * height;
        let sizes = [
            ("left image", left.len()),
            ("right image", right.len()),
            ("disparity", out.len()),
        ];
        for (what, len) in sizes {
            if len != pixels {
                warn!(what, expected = pixels, actual = len, "buffer size mismatch");
                return Err(Error::SizeMismatch {
                    what,
                    expected: pixels,
                    actual: len,
                });
            }
        }
        let range = opts.disparity_range();
        let mut stats = MatchStats {
            total_pixels: pixels,
            ..MatchStats::default()
        };

        let t = Instant::now();
        let Volumes {
            census_left,
            census_right,
            cost_init,
            cost_paths,
            cost_aggr,
        } = vol;
        rayon::join(
            || census_transform(left, census_left, width, height, opts.census),
            || census_transform(right, census_right, width, height, opts.census),
        );
        stats.census_ms = elapsed_ms(t);
        debug!(ms = stats.census_ms, "census transform");

        let t = Instant::now();
        compute_cost(census_left, census_right, cost_init, width, opts.min_disparity, range);
        stats.cost_ms = elapsed_ms(t);
        debug!(ms = stats.cost_ms, "cost initialization");

        let t = Instant::now();
        let penalties = Penalties {
            p1: opts.p1.unsigned_abs(),
            p2_init: opts.p2_init.unsigned_abs(),
        };
        let directions = PathDirection::for_count(opts.num_paths);
        let cost_init: &[u8] = cost_init;
        cost_paths
            .par_iter_mut()
            .zip(directions.par_iter())
            .for_each(|(buf, &dir)| {
                aggregate_path(left, cost_init, buf, width, height, range, dir, penalties);
            });
        sum_paths(cost_paths, cost_aggr);
        stats.aggregation_ms = elapsed_ms(t);
        debug!(ms = stats.aggregation_ms, paths = directions.len(), "cost aggregation");

        let t = Instant::now();
        let sel = Selection {
            min_disparity: opts.min_disparity,
            uniqueness_ratio: opts.uniqueness_ratio,
            census: opts.census,
        };
        stats.valid_pixels = compute_disparity(cost_aggr, out, width, height, range, sel);
        stats.disparity_ms = elapsed_ms(t);
        debug!(
            ms = stats.disparity_ms,
            valid = stats.valid_pixels,
            total = pixels,
            "disparity selection"
        );
        Ok(stats)
    }

    /// Read-only view of the aggregated volume from the last match.
    pub fn aggregated_costs(&self) -> Option<&[u16]> {
        self.volumes.as_ref().map(|v| v.cost_aggr.as_slice())
    }

    /// Read-only view of the initial cost volume from the last match.
    pub fn initial_costs(&self) -> Option<&[u8]> {
        self.volumes.as_ref().map(|v| v.cost_init.as_slice())
    }
}

fn elapsed_ms(t: Instant) -> f64 {
    t.elapsed().as_secs_f64() * 1e3
}
