use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use image::{imageops, imageops::FilterType, GrayImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::commands::{CaptureCommandBuilder, EncoderCommandBuilder};
use super::{Camera, FrameSize, StreamConfig};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

struct CaptureProcess {
    child: Child,
    stdout: ChildStdout,
}

struct EncoderProcess {
    child: Child,
    stdin: ChildStdin,
    output: PathBuf,
}

/// Camera backed by two ffmpeg children.
///
/// A capture process streams raw high-resolution `yuv420p` frames from the device. Each
/// capture call reads one of them, feeds it to the encoder process while a recording is
/// active, and downsamples it for the detector. The encoder process lives exactly as long
/// as one recording.
pub struct FfmpegCamera {
    config: Option<StreamConfig>,
    capture: Option<CaptureProcess>,
    encoder: Option<EncoderProcess>,
    /// Why the encoder was dropped mid-recording, handed back by the next stop.
    encoder_error: Option<anyhow::Error>,
    frame: Vec<u8>,
}

impl FfmpegCamera {
    pub fn new() -> Self {
        Self {
            config: None,
            capture: None,
            encoder: None,
            encoder_error: None,
            frame: Vec::new(),
        }
    }

    fn config(&self) -> Result<&StreamConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| anyhow!("camera used before configure"))
    }

    /// Push the current high-res frame into the encoder. A broken pipe ends the recording
    /// but leaves capture running; the error is kept for the next `stop_encoding`.
    async fn feed_encoder(&mut self) {
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };

        let Err(err) = encoder.stdin.write_all(&self.frame).await else {
            return;
        };

        let output = encoder.output.display().to_string();
        log_error!("encoder for {output} stopped accepting frames: {err}");

        let mut error = anyhow::Error::new(err)
            .context(format!("encoder for {output} stopped accepting frames"));
        if let Some(mut encoder) = self.encoder.take() {
            if let Err(kill_err) = encoder.child.kill().await {
                log_warn!("failed to kill encoder for {output}: {kill_err}");
                error = error.context(format!("encoder may still be running: {kill_err}"));
            }
        }
        self.encoder_error = Some(error);
    }
}

impl Default for FfmpegCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for FfmpegCamera {
    async fn configure(&mut self, config: &StreamConfig) -> Result<()> {
        if self.capture.is_some() {
            bail!("camera already configured");
        }

        let args = CaptureCommandBuilder::new(config.device.clone())
            .with_input_format(config.input_format.clone())
            .with_framerate(config.framerate)
            .with_size(config.high_res)
            .build();

        log_info!("Spawning capture process: {} {:?}", config.ffmpeg_path, args);

        let mut child = Command::new(&config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn capture process `{}`", config.ffmpeg_path))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("capture process has no stdout"))?;

        self.frame = vec![0; config.high_res.yuv420_len()];
        self.capture = Some(CaptureProcess { child, stdout });
        self.config = Some(config.clone());
        Ok(())
    }

    async fn capture_low_res(&mut self) -> Result<Vec<u8>> {
        let (high_res, low_res) = {
            let config = self.config()?;
            (config.high_res, config.low_res)
        };

        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| anyhow!("capture process not running"))?;

        if let Err(err) = capture.stdout.read_exact(&mut self.frame).await {
            let status = capture.child.try_wait().ok().flatten();
            return Err(err).with_context(|| match status {
                Some(status) => format!("capture process exited ({status})"),
                None => "failed to read frame from capture process".to_string(),
            });
        }

        self.feed_encoder().await;

        downscale_yuv420(&self.frame, high_res, low_res)
    }

    async fn start_encoding(&mut self, output: &Path) -> Result<()> {
        if let Some(encoder) = &self.encoder {
            bail!("encoder already writing {}", encoder.output.display());
        }

        self.encoder_error = None;

        let config = self.config()?;
        let args = EncoderCommandBuilder::new(output)
            .with_size(config.high_res)
            .with_framerate(config.framerate)
            .with_video_codec(config.codec.clone())
            .with_bitrate(config.bitrate)
            .build();

        let mut child = Command::new(&config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn encoder for {}", output.display()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("encoder process has no stdin"))?;

        self.encoder = Some(EncoderProcess {
            child,
            stdin,
            output: output.to_path_buf(),
        });
        Ok(())
    }

    async fn stop_encoding(&mut self) -> Result<()> {
        let Some(EncoderProcess {
            mut child,
            mut stdin,
            output,
        }) = self.encoder.take()
        else {
            return match self.encoder_error.take() {
                Some(err) => Err(err),
                None => Ok(()),
            };
        };

        // EOF on stdin makes ffmpeg flush and write the moov atom. Dropping the handle
        // closes the pipe even if the flush failed, so the child still gets to finish.
        if let Err(err) = stdin.shutdown().await {
            log_warn!("failed to close encoder input for {}: {err}", output.display());
        }
        drop(stdin);

        let status = child
            .wait()
            .await
            .with_context(|| format!("failed to wait for encoder of {}", output.display()))?;

        if !status.success() {
            bail!("encoder for {} exited with {status}", output.display());
        }

        log_info!("Finalized {}", output.display());
        Ok(())
    }
}

/// Downsample a planar YUV 4:2:0 frame plane by plane.
///
/// The result keeps the same layout: the luma plane of `to` first, then both chroma planes.
pub fn downscale_yuv420(frame: &[u8], from: FrameSize, to: FrameSize) -> Result<Vec<u8>> {
    if frame.len() < from.yuv420_len() {
        bail!(
            "frame has {} bytes, expected {} for {}",
            frame.len(),
            from.yuv420_len(),
            from.to_ffmpeg_arg()
        );
    }

    let luma_len = from.pixel_count();
    let chroma_len = from.chroma_size().pixel_count();
    let planes = [
        (&frame[..luma_len], from, to),
        (
            &frame[luma_len..luma_len + chroma_len],
            from.chroma_size(),
            to.chroma_size(),
        ),
        (
            &frame[luma_len + chroma_len..luma_len + 2 * chroma_len],
            from.chroma_size(),
            to.chroma_size(),
        ),
    ];

    let mut out = Vec::with_capacity(to.yuv420_len());
    for (plane, src, dst) in planes {
        let image = GrayImage::from_raw(src.width, src.height, plane.to_vec())
            .ok_or_else(|| anyhow!("plane does not fit {}", src.to_ffmpeg_arg()))?;
        let scaled = if src == dst {
            image
        } else {
            imageops::resize(&image, dst.width, dst.height, FilterType::Triangle)
        };
        out.extend_from_slice(scaled.as_raw());
    }

    Ok(out)
}
