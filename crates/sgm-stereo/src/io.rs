use crate::{Error, Result, StereoPair, StereoSource, INVALID_DISPARITY};
use image::GrayImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Read an image from disk and return grayscale bytes (row-major), width, height.
pub fn read_gray8(path: impl AsRef<Path>) -> Result<(Vec<u8>, usize, usize)> {
    let path = path.as_ref();
    let img = image::open(path)
        .map_err(|e| Error::Io(format!("reading {}: {e}", path.display())))?
        .to_luma8();
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(Error::InvalidDimensions {
            width: w as usize,
            height: h as usize,
        });
    }
    Ok((img.into_raw(), w as usize, h as usize))
}

/// Map disparities to a viewable 8-bit image: invalid pixels become 0,
/// valid ones `scale * disparity` saturated to `[0, 255]`.
pub fn disparity_to_gray8(disp: &[f32], scale: f32) -> Vec<u8> {
    disp.iter()
        .map(|&d| {
            if d == INVALID_DISPARITY || !d.is_finite() {
                0
            } else {
                (d * scale).round().clamp(0.0, 255.0) as u8
            }
        })
        .collect()
}

pub fn write_disparity_png(
    path: impl AsRef<Path>,
    disp: &[f32],
    width: usize,
    height: usize,
    scale: f32,
) -> Result<()> {
    let path = path.as_ref();
    if disp.len() != width * height {
        return Err(Error::SizeMismatch {
            what: "disparity",
            expected: width * height,
            actual: disp.len(),
        });
    }
    let img = GrayImage::from_raw(width as u32, height as u32, disparity_to_gray8(disp, scale))
        .ok_or_else(|| Error::Io("failed to build disparity image".to_string()))?;
    img.save(path)
        .map_err(|e| Error::Io(format!("writing {}: {e}", path.display())))
}

/// Write a text point cloud, one `row col disparity g g g` line per valid pixel.
/// Returns the number of points written.
pub fn write_point_cloud(
    path: impl AsRef<Path>,
    disp: &[f32],
    gray: &[u8],
    width: usize,
) -> Result<usize> {
    let path = path.as_ref();
    if width == 0 || disp.len() % width != 0 {
        return Err(Error::InvalidDimensions {
            width,
            height: if width == 0 { 0 } else { disp.len() / width },
        });
    }
    if disp.len() != gray.len() {
        return Err(Error::SizeMismatch {
            what: "point cloud intensity",
            expected: disp.len(),
            actual: gray.len(),
        });
    }
    let io_err = |e: std::io::Error| Error::Io(format!("writing {}: {e}", path.display()));
    let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
    let mut count = 0usize;
    for (i, (&d, &g)) in disp.iter().zip(gray).enumerate() {
        if d == INVALID_DISPARITY {
            continue;
        }
        let (row, col) = (i / width, i % width);
        writeln!(out, "{:.6} {:.6} {:.6} {g} {g} {g}", row as f32, col as f32, d)
            .map_err(io_err)?;
        count += 1;
    }
    out.flush().map_err(io_err)?;
    Ok(count)
}

/// Stereo pair loaded from two image files. Spec is `"left_path,right_path"`.
pub struct FileStereo {
    left: String,
    right: String,
}

impl FileStereo {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

impl StereoSource for FileStereo {
    fn open(spec: &str) -> Result<Self> {
        let (l, r) = spec
            .split_once(',')
            .ok_or_else(|| Error::Config(format!("expected \"left,right\", got {spec:?}")))?;
        Ok(Self::new(l.trim(), r.trim()))
    }

    fn read_pair(&mut self) -> Result<StereoPair> {
        let (left, wl, hl) = read_gray8(&self.left)?;
        let (right, wr, hr) = read_gray8(&self.right)?;
        if (wl, hl) != (wr, hr) {
            return Err(Error::Io(format!(
                "image sizes differ: {} is {wl}x{hl}, {} is {wr}x{hr}",
                self.left, self.right
            )));
        }
        Ok(StereoPair {
            width: wl as u32,
            height: hl as u32,
            left,
            right,
            ts: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disparity_visualization() {
        let disp = [INVALID_DISPARITY, 0.0, 10.0, 200.0, -3.0];
        assert_eq!(disparity_to_gray8(&disp, 2.5), vec![0, 0, 25, 255, 0]);
    }

    #[test]
    fn test_png_round_trip_through_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disp.png");
        let disp = vec![1.0f32, 2.0, INVALID_DISPARITY, 4.0, 5.0, 6.0];
        write_disparity_png(&path, &disp, 3, 2, 10.0).unwrap();
        let (gray, w, h) = read_gray8(&path).unwrap();
        assert_eq!((w, h), (3, 2));
        assert_eq!(gray, vec![10, 20, 0, 40, 50, 60]);
    }

    #[test]
    fn test_png_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disp.png");
        assert!(matches!(
            write_disparity_png(&path, &[0.0; 5], 3, 2, 1.0),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_point_cloud_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.txt");
        let disp = [INVALID_DISPARITY, 2.5, 3.0, INVALID_DISPARITY];
        let gray = [9u8, 10, 11, 12];
        let n = write_point_cloud(&path, &disp, &gray, 2).unwrap();
        assert_eq!(n, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "0.000000 1.000000 2.500000 10 10 10");
        assert_eq!(lines[1], "1.000000 0.000000 3.000000 11 11 11");
    }

    #[test]
    fn test_point_cloud_rejects_bad_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.txt");
        assert!(matches!(
            write_point_cloud(&path, &[1.0], &[5], 0),
            Err(Error::InvalidDimensions { width: 0, .. })
        ));
        assert!(matches!(
            write_point_cloud(&path, &[1.0; 5], &[5; 5], 2),
            Err(Error::InvalidDimensions { width: 2, .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_file_stereo_reports_both_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let left = dir.path().join("l.png");
        let right = dir.path().join("r.png");
        write_disparity_png(&left, &[0.0; 32], 4, 8, 1.0).unwrap();
        write_disparity_png(&right, &[0.0; 32], 8, 4, 1.0).unwrap();
        let mut src = FileStereo::new(left.to_string_lossy(), right.to_string_lossy());
        match src.read_pair() {
            Err(Error::Io(msg)) => {
                assert!(msg.contains("4x8"), "{msg}");
                assert!(msg.contains("8x4"), "{msg}");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_file_stereo_spec() {
        assert!(FileStereo::open("only-one.png").is_err());
        let mut src = FileStereo::open("/nonexistent/l.png, /nonexistent/r.png").unwrap();
        assert!(matches!(src.read_pair(), Err(Error::Io(_))));
    }
}
