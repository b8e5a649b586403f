//! ffmpeg argument builders for the capture and encoder processes.

use std::path::{Path, PathBuf};

use super::FrameSize;

/// Arguments for the long-running capture process, which writes raw `yuv420p` frames
/// to stdout.
#[derive(Debug, Clone)]
pub struct CaptureCommandBuilder {
    input_format: String,
    device: String,
    framerate: u32,
    size: FrameSize,
}

impl CaptureCommandBuilder {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            input_format: "v4l2".to_string(),
            device: device.into(),
            framerate: 30,
            size: FrameSize::new(1280, 720),
        }
    }

    pub fn with_input_format(mut self, input_format: impl Into<String>) -> Self {
        self.input_format = input_format.into();
        self
    }

    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_size(mut self, size: FrameSize) -> Self {
        self.size = size;
        self
    }

    pub fn build(&self) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(), "error".to_string(),
            "-f".to_string(), self.input_format.clone(),
            "-framerate".to_string(), self.framerate.to_string(),
            "-video_size".to_string(), self.size.to_ffmpeg_arg(),
            "-i".to_string(), self.device.clone(),
            "-f".to_string(), "rawvideo".to_string(),
            "-pix_fmt".to_string(), "yuv420p".to_string(),
            "pipe:1".to_string(),
        ]
    }
}

/// Arguments for one recording: raw `yuv420p` frames in on stdin, an encoded file out.
#[derive(Debug, Clone)]
pub struct EncoderCommandBuilder {
    output_path: PathBuf,
    size: FrameSize,
    framerate: u32,
    video_codec: String,
    bitrate: u32,
    preset: String,
}

impl EncoderCommandBuilder {
    pub fn new(output_path: &Path) -> Self {
        Self {
            output_path: output_path.to_path_buf(),
            size: FrameSize::new(1280, 720),
            framerate: 30,
            video_codec: "libx264".to_string(),
            bitrate: 1_000_000,
            preset: "veryfast".to_string(),
        }
    }

    pub fn with_size(mut self, size: FrameSize) -> Self {
        self.size = size;
        self
    }

    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = codec.into();
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn build(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(), "error".to_string(),
            "-y".to_string(),
            "-f".to_string(), "rawvideo".to_string(),
            "-pix_fmt".to_string(), "yuv420p".to_string(),
            "-video_size".to_string(), self.size.to_ffmpeg_arg(),
            "-framerate".to_string(), self.framerate.to_string(),
            "-i".to_string(), "pipe:0".to_string(),
            "-c:v".to_string(), self.video_codec.clone(),
            "-b:v".to_string(), self.bitrate.to_string(),
        ];

        // Hardware encoders reject x264 presets.
        if self.video_codec.starts_with("libx26") {
            args.push("-preset".to_string());
            args.push(self.preset.clone());
        }

        args.extend(vec![
            "-pix_fmt".to_string(), "yuv420p".to_string(),
            self.output_path.to_string_lossy().to_string(),
        ]);

        args
    }
}
