//! Video decoding through the ffmpeg CLI
//!
//! ffmpeg scales every frame to the working resolution and streams raw RGB24
//! over stdout; frames are read one at a time and only sampled ones are kept.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{Frame, FrameSampler, MediaError, FRAME_SIZE};

/// Decodes a video file into sampled frames
#[async_trait]
pub trait VideoDecoder: Send + Sync {
    async fn decode(&self, path: &Path, sampler: &FrameSampler) -> Result<Vec<Frame>, MediaError>;
}

/// ffmpeg/ffprobe backed decoder
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoder {
    /// Explicit ffmpeg binary; looked up in PATH when unset
    ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary; looked up in PATH when unset
    ffprobe_path: Option<PathBuf>,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg_path: Option<PathBuf>, ffprobe_path: Option<PathBuf>) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }

    fn ffmpeg(&self) -> Result<PathBuf, MediaError> {
        match &self.ffmpeg_path {
            Some(path) => Ok(path.clone()),
            None => which::which("ffmpeg")
                .map_err(|e| MediaError::DecoderUnavailable(format!("ffmpeg not found: {}", e))),
        }
    }

    fn ffprobe(&self) -> Option<PathBuf> {
        self.ffprobe_path
            .clone()
            .or_else(|| which::which("ffprobe").ok())
    }

    /// Probe the average frame rate of the first video stream
    pub async fn probe_frame_rate(&self, path: &Path) -> Option<f64> {
        let ffprobe = self.ffprobe()?;
        let output = Command::new(ffprobe)
            .args(probe_args(path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            debug!("ffprobe exited with {}", output.status);
            return None;
        }
        parse_frame_rate(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn decode(&self, path: &Path, sampler: &FrameSampler) -> Result<Vec<Frame>, MediaError> {
        let ffmpeg = self.ffmpeg()?;
        let fps = self.probe_frame_rate(path).await;
        debug!("Decoding {} (fps: {:?})", path.display(), fps);

        // kill_on_drop releases the decoder on every early return below
        let mut child = Command::new(ffmpeg)
            .args(raw_frame_args(path, FRAME_SIZE))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::DecoderUnavailable(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::Decode("ffmpeg stdout not captured".into()))?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        let (frames, total) = read_sampled_frames(stdout, FRAME_SIZE, sampler, fps).await?;
        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            if total == 0 {
                return Err(MediaError::Decode(format!(
                    "ffmpeg exited with {}: {}",
                    status,
                    stderr.trim()
                )));
            }
            warn!(
                "ffmpeg exited with {} after {} frames, keeping decoded frames: {}",
                status,
                total,
                stderr.trim()
            );
        }

        info!(
            "Decoded {} frames, sampled {} (skip {})",
            total,
            frames.len(),
            sampler.skip()
        );
        Ok(frames)
    }
}

/// Read raw RGB24 frames from `reader`, keeping those the sampler selects.
///
/// Returns the kept frames and the total number of complete frames read. A
/// trailing partial frame is discarded.
pub async fn read_sampled_frames<R>(
    mut reader: R,
    size: u32,
    sampler: &FrameSampler,
    fps: Option<f64>,
) -> Result<(Vec<Frame>, u32), MediaError>
where
    R: AsyncRead + Unpin,
{
    let frame_len = (size * size * 3) as usize;
    let mut buf = vec![0u8; frame_len];
    let mut frames = Vec::new();
    let mut position: u32 = 0;

    loop {
        match reader.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        if sampler.keeps(position) {
            let timestamp_ms = fps
                .filter(|fps| *fps > 0.0)
                .map(|fps| (position as f64 * 1000.0 / fps) as u64)
                .unwrap_or(0);
            frames.push(Frame::new(buf.clone(), size, size, position, timestamp_ms));
        }
        position += 1;
    }

    Ok((frames, position))
}

/// Arguments streaming scaled RGB24 frames to stdout
pub fn raw_frame_args(input: &Path, size: u32) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-nostdin".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-an".to_string(),
        "-vf".to_string(),
        format!("scale={}:{}", size, size),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "pipe:1".to_string(),
    ]
}

fn probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v:0".to_string(),
        "-show_entries".to_string(),
        "stream=avg_frame_rate".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        input.to_string_lossy().to_string(),
    ]
}

/// Parse ffprobe rates such as `30000/1001` or `25`
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.lines().next()?.trim();
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}
