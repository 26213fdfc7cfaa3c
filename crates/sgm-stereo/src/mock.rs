use crate::{Error, Result, StereoPair, StereoSource};
use time::OffsetDateTime;

/// Synthetic textured pair whose right image is the left image shifted by a
/// known disparity. Spec is `"WxH@shift"`; empty means `"64x48@4"`.
pub struct MockStereo {
    width: u32,
    height: u32,
    shift: u32,
    counter: u64,
}

impl MockStereo {
    pub fn new(width: u32, height: u32, shift: u32) -> Self {
        Self {
            width,
            height,
            shift,
            counter: 0,
        }
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Number of pairs produced so far.
    pub fn pairs_read(&self) -> u64 {
        self.counter
    }

    /// Deterministic per-pixel texture, defined for any column.
    pub fn texture(x: u32, y: u32) -> u8 {
        let mut h = ((u64::from(x) << 32) | u64::from(y)).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        h ^= h >> 29;
        h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h ^= h >> 32;
        (h & 0xFF) as u8
    }
}

fn parse_spec(spec: &str) -> Option<(u32, u32, u32)> {
    let (size, shift) = spec.split_once('@')?;
    let (w, h) = size.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?, shift.trim().parse().ok()?))
}

/// Pixels in a `w x h` image; zero or `u32`-overflowing sizes are rejected.
fn pixel_count(w: u32, h: u32) -> Result<usize> {
    let invalid = || Error::InvalidDimensions {
        width: w as usize,
        height: h as usize,
    };
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    w.checked_mul(h).map(|n| n as usize).ok_or_else(invalid)
}

impl StereoSource for MockStereo {
    fn open(spec: &str) -> Result<Self> {
        if spec.trim().is_empty() {
            return Ok(Self::new(64, 48, 4));
        }
        let (w, h, shift) = parse_spec(spec).ok_or_else(|| {
            Error::Config(format!("mock spec must look like WxH@shift, got {spec:?}"))
        })?;
        pixel_count(w, h)?;
        if shift >= w {
            return Err(Error::Config(format!(
                "mock shift {shift} must be smaller than width {w}"
            )));
        }
        Ok(Self::new(w, h, shift))
    }

    fn read_pair(&mut self) -> Result<StereoPair> {
        let (w, h) = (self.width, self.height);
        let n = pixel_count(w, h)?;
        self.counter += 1;
        let mut left = Vec::with_capacity(n);
        let mut right = Vec::with_capacity(n);
        for y in 0..h {
            for x in 0..w {
                left.push(Self::texture(x, y));
                right.push(Self::texture(x.saturating_add(self.shift), y));
            }
        }
        Ok(StereoPair {
            width: w,
            height: h,
            left,
            right,
            ts: Some(OffsetDateTime::now_utc()),
        })
    }
}
