//! FFmpeg frame source.
//!
//! Decodes the media URL with an `ffmpeg` child process that writes sampled,
//! scaled frames to stdout as raw RGB24. A reader task drains the pipe and
//! keeps only the newest frame, so a slow consumer never falls behind the live
//! edge. When the child exits (network hiccup, playlist refresh failure) the
//! next read respawns it.

use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use stream_resolver::MediaUrl;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Frame, FrameError, FrameOpener, FrameSource};

const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// FFmpeg decoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Binary to run. Falls back to `FFMPEG_PATH`, then `ffmpeg` on `PATH`.
    pub binary_path: Option<String>,
    /// Frames decoded per second of stream time.
    pub sample_fps: f64,
    /// Output frame width; the picture is scaled and padded to fit.
    pub width: u32,
    /// Output frame height.
    pub height: u32,
    /// Consecutive respawns without a frame before the stream counts as gone.
    pub max_restarts: u32,
    /// Extra arguments placed before `-i`.
    pub input_args: Vec<String>,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            sample_fps: 1.0,
            width: 640,
            height: 640,
            max_restarts: 30,
            input_args: Vec::new(),
        }
    }
}

impl FfmpegConfig {
    fn binary_path(&self) -> String {
        self.binary_path
            .clone()
            .or_else(|| std::env::var("FFMPEG_PATH").ok())
            .unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string())
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        if !self.sample_fps.is_finite() || self.sample_fps <= 0.0 {
            return Err(FrameError::InvalidConfig(format!(
                "sample_fps must be a positive number, got {}",
                self.sample_fps
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::InvalidConfig(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Build ffmpeg command arguments.
    fn build_args(&self, media: &MediaUrl) -> Vec<String> {
        let (w, h) = (self.width, self.height);
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-loglevel", "error"]
            .into_iter()
            .map(String::from)
            .collect();

        args.extend(self.input_args.iter().cloned());

        let mut header_lines = String::new();
        for (key, value) in &media.headers {
            if key.eq_ignore_ascii_case("user-agent") {
                args.extend(["-user_agent".to_string(), value.clone()]);
            } else {
                header_lines.push_str(&format!("{key}: {value}\r\n"));
            }
        }
        if !header_lines.is_empty() {
            args.extend(["-headers".to_string(), header_lines]);
        }

        args.extend(["-i".to_string(), media.url.clone()]);
        args.extend(["-an", "-sn", "-dn"].map(String::from));
        args.extend([
            "-vf".to_string(),
            format!(
                "fps={},scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
                self.sample_fps
            ),
        ]);
        args.extend(["-pix_fmt", "rgb24", "-f", "rawvideo", "pipe:1"].map(String::from));
        args
    }
}

/// Opens [`FfmpegFrameSource`]s.
#[derive(Debug, Clone, Default)]
pub struct FfmpegOpener {
    config: FfmpegConfig,
}

impl FfmpegOpener {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Version line of the configured binary, if it runs.
    pub fn version(&self) -> Option<String> {
        process_utils::probe_version(self.config.binary_path(), "-version")
    }
}

#[async_trait]
impl FrameOpener for FfmpegOpener {
    async fn open(&self, media: &MediaUrl) -> Result<Box<dyn FrameSource>, FrameError> {
        self.config.validate()?;
        let mut source = FfmpegFrameSource::new(self.config.clone(), media.clone());
        source.spawn()?;
        Ok(Box::new(source))
    }
}

/// Raw RGB24 frames read from an ffmpeg child's stdout.
pub struct FfmpegFrameSource {
    config: FfmpegConfig,
    media: MediaUrl,
    child: Option<Child>,
    latest: Option<watch::Receiver<Option<Frame>>>,
    reader: Option<JoinHandle<std::io::Error>>,
    last_stderr: Option<watch::Receiver<String>>,
    next_index: u64,
    spawns_without_frame: u32,
    last_error: String,
}

impl FfmpegFrameSource {
    fn new(config: FfmpegConfig, media: MediaUrl) -> Self {
        Self {
            config,
            media,
            child: None,
            latest: None,
            reader: None,
            last_stderr: None,
            next_index: 0,
            spawns_without_frame: 0,
            last_error: String::new(),
        }
    }

    fn spawn(&mut self) -> Result<(), FrameError> {
        let program = self.config.binary_path();
        let args = self.config.build_args(&self.media);
        debug!(program = %program, ?args, "spawning ffmpeg");

        let mut child = process_utils::tokio_command(&program)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FrameError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            let (tx, rx) = watch::channel(None);
            self.latest = Some(rx);
            self.reader = Some(tokio::spawn(read_frames(
                stdout,
                self.config.width,
                self.config.height,
                self.next_index,
                tx,
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            let (tx, rx) = watch::channel(String::new());
            self.last_stderr = Some(rx);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.trim().is_empty() {
                        continue;
                    }
                    debug!("ffmpeg: {}", line);
                    tx.send_replace(line);
                }
            });
        }

        self.child = Some(child);
        self.spawns_without_frame += 1;
        info!(
            width = self.config.width,
            height = self.config.height,
            fps = self.config.sample_fps,
            "decoder started"
        );
        Ok(())
    }

    async fn shutdown_child(&mut self) {
        self.latest = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("ffmpeg already exited: {}", e);
            }
            match child.wait().await {
                Ok(status) => debug!("ffmpeg exited with {}", status),
                Err(e) => warn!("Error waiting for ffmpeg: {}", e),
            }
        }
    }

    fn note_failure(&mut self, err: &std::io::Error) {
        let stderr = self
            .last_stderr
            .as_ref()
            .map(|rx| rx.borrow().clone())
            .unwrap_or_default();
        self.last_error = if stderr.is_empty() {
            err.to_string()
        } else {
            format!("{err}: {stderr}")
        };
    }
}

/// Read whole frames until the pipe fails, publishing only the newest.
async fn read_frames(
    mut stdout: ChildStdout,
    width: u32,
    height: u32,
    mut index: u64,
    tx: watch::Sender<Option<Frame>>,
) -> std::io::Error {
    let frame_len = Frame::rgb24_len(width, height);
    loop {
        let mut buf = vec![0u8; frame_len];
        if let Err(e) = stdout.read_exact(&mut buf).await {
            return e;
        }
        let frame = Frame::new(index, width, height, Bytes::from(buf));
        if tx.send(Some(frame)).is_err() {
            return std::io::Error::other("frame consumer went away");
        }
        index += 1;
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn read_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.latest.is_none() {
            if self.spawns_without_frame > self.config.max_restarts {
                return Err(FrameError::StreamEnded {
                    restarts: self.spawns_without_frame.saturating_sub(1),
                    last_error: self.last_error.clone(),
                });
            }
            self.spawn()?;
        }

        let Some(latest) = self.latest.as_mut() else {
            return Ok(None);
        };
        // An unseen frame is still delivered after the reader has exited.
        if latest.changed().await.is_ok() {
            let frame = latest.borrow_and_update().clone();
            if let Some(frame) = frame {
                self.next_index = frame.index + 1;
                self.spawns_without_frame = 0;
                return Ok(Some(frame));
            }
        }

        let err = match self.reader.take() {
            Some(reader) => reader.await.unwrap_or_else(std::io::Error::other),
            None => std::io::Error::other("frame reader missing"),
        };
        self.note_failure(&err);
        debug!(error = %self.last_error, "frame read failed, decoder will restart");
        self.shutdown_child().await;
        Ok(None)
    }

    async fn close(&mut self) {
        self.shutdown_child().await;
        self.last_stderr = None;
    }
}
