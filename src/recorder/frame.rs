use anyhow::{bail, Result};
use image::GrayImage;

use crate::camera::FrameSize;

/// One low-resolution luminance capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame(GrayImage);

impl Frame {
    /// Interpret the leading `width * height` bytes of a capture buffer as a row-major
    /// luma grid. Trailing bytes (chroma planes, padding) are dropped.
    pub fn from_buffer(buffer: &[u8], size: FrameSize) -> Result<Self> {
        let pixels = size.pixel_count();
        if buffer.len() < pixels {
            bail!(
                "capture buffer has {} bytes, need at least {} for a {} frame",
                buffer.len(),
                pixels,
                size.to_ffmpeg_arg()
            );
        }

        match GrayImage::from_raw(size.width, size.height, buffer[..pixels].to_vec()) {
            Some(image) => Ok(Self(image)),
            None => bail!("cannot build a {} frame", size.to_ffmpeg_arg()),
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.0.width(), self.0.height())
    }

    pub fn samples(&self) -> &[u8] {
        self.0.as_raw()
    }
}

/// Mean of squared per-pixel differences between two frames of the same size.
pub fn mean_squared_difference(current: &Frame, previous: &Frame) -> Result<f64> {
    if current.size() != previous.size() {
        bail!(
            "frame size changed from {} to {}",
            previous.size().to_ffmpeg_arg(),
            current.size().to_ffmpeg_arg()
        );
    }

    let samples = current.samples();
    if samples.is_empty() {
        return Ok(0.0);
    }

    let sum: u64 = samples
        .iter()
        .zip(previous.samples())
        .map(|(&a, &b)| {
            let diff = i32::from(a) - i32::from(b);
            (diff * diff) as u64
        })
        .sum();

    Ok(sum as f64 / samples.len() as f64)
}
