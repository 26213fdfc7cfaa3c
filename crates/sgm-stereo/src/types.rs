use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result};

/// Value written for pixels without a trustworthy disparity.
pub const INVALID_DISPARITY: f32 = f32::INFINITY;

/// Number of aggregation paths.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PathCount {
    Four,
    Eight,
}

impl PathCount {
    pub fn get(self) -> usize {
        match self {
            PathCount::Four => 4,
            PathCount::Eight => 8,
        }
    }
}

impl TryFrom<u8> for PathCount {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            4 => Ok(PathCount::Four),
            8 => Ok(PathCount::Eight),
            other => Err(Error::InvalidOptions(format!(
                "num_paths must be 4 or 8, got {other}"
            ))),
        }
    }
}

impl From<PathCount> for u8 {
    fn from(value: PathCount) -> Self {
        value.get() as u8
    }
}

/// Census comparison window. Codes are always stored as `u64`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CensusSize {
    #[serde(rename = "5x5")]
    Window5x5,
    #[serde(rename = "9x7")]
    Window9x7,
}

impl CensusSize {
    /// Half extents `(x, y)` of the window.
    pub fn half_extents(self) -> (usize, usize) {
        match self {
            CensusSize::Window5x5 => (2, 2),
            CensusSize::Window9x7 => (4, 3),
        }
    }

    /// Number of comparison bits (window area minus the center).
    pub fn bits(self) -> u32 {
        let (hx, hy) = self.half_extents();
        ((2 * hx + 1) * (2 * hy + 1) - 1) as u32
    }

    /// True if the window centered at `(x, y)` lies fully inside the image.
    pub fn fits(self, x: usize, y: usize, width: usize, height: usize) -> bool {
        let (hx, hy) = self.half_extents();
        x >= hx && y >= hy && x + hx < width && y + hy < height
    }
}

impl std::str::FromStr for CensusSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "5x5" => Ok(CensusSize::Window5x5),
            "9x7" => Ok(CensusSize::Window9x7),
            other => Err(Error::InvalidOptions(format!(
                "census window must be 5x5 or 9x7, got {other}"
            ))),
        }
    }
}

/// Parameters of one matching run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SgmOptions {
    pub num_paths: PathCount,
    pub min_disparity: i32,
    /// Exclusive upper bound of the search range.
    pub max_disparity: i32,
    /// A pixel is kept when `(second - best) > uniqueness_ratio * best`.
    pub uniqueness_ratio: f32,
    pub p1: i32,
    /// Base value of the adaptive penalty `P2 = p2_init / max(1, |dI|)`.
    pub p2_init: i32,
    #[serde(default = "default_census")]
    pub census: CensusSize,
}

fn default_census() -> CensusSize {
    CensusSize::Window9x7
}

impl Default for SgmOptions {
    fn default() -> Self {
        Self {
            num_paths: PathCount::Eight,
            min_disparity: 0,
            max_disparity: 64,
            uniqueness_ratio: 0.95,
            p1: 10,
            p2_init: 150,
            census: default_census(),
        }
    }
}

impl SgmOptions {
    /// Size of the disparity search range, `max_disparity - min_disparity`.
    pub fn disparity_range(&self) -> usize {
        (i64::from(self.max_disparity) - i64::from(self.min_disparity)).max(0) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_disparity >= self.max_disparity {
            return Err(Error::InvalidOptions(format!(
                "min_disparity ({}) must be less than max_disparity ({})",
                self.min_disparity, self.max_disparity
            )));
        }
        if self.disparity_range() > usize::from(u16::MAX) {
            return Err(Error::InvalidOptions(format!(
                "disparity range {} exceeds {}",
                self.disparity_range(),
                u16::MAX
            )));
        }
        if !(self.uniqueness_ratio > 0.0 && self.uniqueness_ratio <= 1.0) {
            return Err(Error::InvalidOptions(format!(
                "uniqueness_ratio must be in (0, 1], got {}",
                self.uniqueness_ratio
            )));
        }
        if self.p1 <= 0 {
            return Err(Error::InvalidOptions(format!(
                "p1 must be positive, got {}",
                self.p1
            )));
        }
        if self.p2_init <= 0 {
            return Err(Error::InvalidOptions(format!(
                "p2_init must be positive, got {}",
                self.p2_init
            )));
        }
        Ok(())
    }
}

/// A rectified grayscale stereo pair, row-major, no padding.
#[derive(Clone, Debug)]
pub struct StereoPair {
    pub width: u32,
    pub height: u32,
    pub left: Vec<u8>,
    pub right: Vec<u8>,
    pub ts: Option<OffsetDateTime>,
}

/// Timing and yield of one `match_pair` call.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct MatchStats {
    pub census_ms: f64,
    pub cost_ms: f64,
    pub aggregation_ms: f64,
    pub disparity_ms: f64,
    pub valid_pixels: usize,
    pub total_pixels: usize,
}

impl MatchStats {
    pub fn total_ms(&self) -> f64 {
        self.census_ms + self.cost_ms + self.aggregation_ms + self.disparity_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        let opts = SgmOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.disparity_range(), 64);
        assert_eq!(opts.num_paths.get(), 8);
    }

    #[test]
    fn test_invalid_range_rejected() {
        let opts = SgmOptions {
            min_disparity: 10,
            max_disparity: 10,
            ..SgmOptions::default()
        };
        assert!(matches!(opts.validate(), Err(Error::InvalidOptions(_))));

        let opts = SgmOptions {
            min_disparity: 12,
            max_disparity: 4,
            ..SgmOptions::default()
        };
        assert!(opts.validate().is_err());
        assert_eq!(opts.disparity_range(), 0);
    }

    #[test]
    fn test_negative_min_disparity_allowed() {
        let opts = SgmOptions {
            min_disparity: -8,
            max_disparity: 8,
            ..SgmOptions::default()
        };
        assert!(opts.validate().is_ok());
        assert_eq!(opts.disparity_range(), 16);
    }

    #[test]
    fn test_uniqueness_and_penalties_checked() {
        for ratio in [0.0, -0.5, 1.5, f32::NAN] {
            let opts = SgmOptions {
                uniqueness_ratio: ratio,
                ..SgmOptions::default()
            };
            assert!(opts.validate().is_err(), "ratio {ratio} accepted");
        }
        let opts = SgmOptions {
            uniqueness_ratio: 1.0,
            ..SgmOptions::default()
        };
        assert!(opts.validate().is_ok());

        let opts = SgmOptions {
            p1: 0,
            ..SgmOptions::default()
        };
        assert!(opts.validate().is_err());
        let opts = SgmOptions {
            p2_init: -1,
            ..SgmOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_path_count_conversion() {
        assert_eq!(PathCount::try_from(4).ok(), Some(PathCount::Four));
        assert_eq!(PathCount::try_from(8).ok(), Some(PathCount::Eight));
        assert!(PathCount::try_from(6).is_err());
        assert_eq!(u8::from(PathCount::Four), 4);
    }

    #[test]
    fn test_census_geometry() {
        assert_eq!(CensusSize::Window9x7.bits(), 62);
        assert_eq!(CensusSize::Window5x5.bits(), 24);
        let c = CensusSize::Window9x7;
        assert!(c.fits(4, 3, 9, 7));
        assert!(!c.fits(3, 3, 9, 7));
        assert!(!c.fits(4, 3, 8, 7));
        assert!(!c.fits(1, 1, 4, 4));
        assert_eq!("5x5".parse::<CensusSize>().ok(), Some(CensusSize::Window5x5));
        assert!("7x7".parse::<CensusSize>().is_err());
    }
}
