//! sgm-stereo: census-based Semi-Global Matching for rectified stereo pairs
//!
//! The [`SemiGlobalMatcher`] owns every intermediate volume and runs the
//! pipeline census transform -> cost initialization -> path aggregation ->
//! disparity selection. Inputs are row-major 8-bit gray buffers; the output is
//! a caller-provided `f32` map holding a disparity or [`INVALID_DISPARITY`].

mod types;
pub use types::{
    CensusSize, MatchStats, PathCount, SgmOptions, StereoPair, INVALID_DISPARITY,
};

mod error;
pub use error::{Error, Result};

mod traits;
pub use traits::StereoSource;

pub mod aggregate;
pub mod census;
pub mod config;
pub mod cost;
pub mod disparity;

mod engine;
pub use engine::SemiGlobalMatcher;

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::MockStereo;

#[cfg(feature = "io")]
pub mod io;
#[cfg(feature = "io")]
pub use io::FileStereo;
