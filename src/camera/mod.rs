//! # Camera capabilities
//!
//! The recorder only needs four things from a camera: a one-off configuration step, a
//! stream of low-resolution frames for motion detection, and the ability to start and
//! stop encoding the high-resolution stream into a file. [`Camera`] captures exactly
//! that, so the detection loop can be driven by [`FfmpegCamera`] in production and by
//! scripted fakes in tests.

pub mod commands;
pub mod ffmpeg;

pub use ffmpeg::FfmpegCamera;

use std::{future::Future, path::Path};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Width and height of a video stream, in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of luma samples in one frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of one chroma plane in a YUV 4:2:0 frame, rounded up on odd dimensions.
    pub fn chroma_size(&self) -> FrameSize {
        FrameSize::new(self.width.div_ceil(2), self.height.div_ceil(2))
    }

    /// Byte length of a planar YUV 4:2:0 frame.
    pub fn yuv420_len(&self) -> usize {
        self.pixel_count() + 2 * self.chroma_size().pixel_count()
    }

    /// `WIDTHxHEIGHT`, the form ffmpeg expects for `-video_size`.
    pub fn to_ffmpeg_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Stream configuration applied to the camera once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamConfig {
    /// Resolution that gets encoded into recordings.
    pub high_res: FrameSize,
    /// Resolution of the frames used for motion detection.
    pub low_res: FrameSize,
    pub framerate: u32,
    /// Target encoder bitrate, bits per second.
    pub bitrate: u32,
    pub device: String,
    pub input_format: String,
    pub codec: String,
    /// ffmpeg executable used for capture and encoding.
    pub ffmpeg_path: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            high_res: FrameSize::new(1280, 720),
            low_res: FrameSize::new(320, 180),
            framerate: 30,
            bitrate: 1_000_000,
            device: "/dev/video0".into(),
            input_format: "v4l2".into(),
            codec: "libx264".into(),
            ffmpeg_path: "ffmpeg".into(),
        }
    }
}

/// Capture and encoding collaborator driven by the recorder loop.
pub trait Camera: Send {
    /// Apply the stream configuration. Called once before the first capture.
    fn configure(&mut self, config: &StreamConfig) -> impl Future<Output = Result<()>> + Send;

    /// Block until the next low-resolution frame is available and return its raw buffer.
    ///
    /// The buffer is at least `low_res.pixel_count()` bytes long and starts with the
    /// row-major luma plane. Anything after it (chroma planes, padding) is ignored by the
    /// detector.
    fn capture_low_res(&mut self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Start encoding the high-resolution stream into `output`.
    fn start_encoding(&mut self, output: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Stop the active encoder and finalize its file. A no-op when nothing is encoding.
    fn stop_encoding(&mut self) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuv420_len_rounds_chroma_up() {
        assert_eq!(FrameSize::new(320, 180).yuv420_len(), 320 * 180 * 3 / 2);
        // 3x3 luma, 2x2 chroma planes
        assert_eq!(FrameSize::new(3, 3).yuv420_len(), 9 + 2 * 4);
    }

    #[test]
    fn stream_config_fills_missing_keys() {
        let config: StreamConfig =
            serde_json::from_str(r#"{ "device": "/dev/video2", "lowRes": { "width": 160, "height": 90 } }"#)
                .unwrap();

        assert_eq!(config.device, "/dev/video2");
        assert_eq!(config.low_res, FrameSize::new(160, 90));
        assert_eq!(config.high_res, FrameSize::new(1280, 720));
        assert_eq!(config.bitrate, 1_000_000);
    }
}
