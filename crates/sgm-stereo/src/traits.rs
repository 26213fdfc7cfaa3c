use crate::{Result, StereoPair};

pub trait StereoSource {
    /// Open a stereo source from a backend-specific spec string.
    fn open(spec: &str) -> Result<Self>
    where
        Self: Sized;

    /// Read one rectified pair.
    fn read_pair(&mut self) -> Result<StereoPair>;
}
