//! Application configuration.
//!
//! Values are layered: built-in defaults, then the TOML file, then whatever
//! the command line (or its environment fallbacks) sets explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stream_resolver::YtDlpConfig;
use tracing::{debug, info};

use crate::detector::YoloParams;
#[cfg(feature = "onnx")]
use crate::detector::OnnxDetectorConfig;
use crate::frames::FfmpegConfig;
use crate::monitor::MonitorConfig;
use crate::notification::{ChannelConfig, PushbulletConfig, TwilioConfig};
use crate::{Error, Result};

const CONFIG_DIR_NAME: &str = "zoowatch";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Channel handle or stream URL.
    pub stream: String,
    pub target_class: String,
    pub min_confidence: f32,
    pub alert_cooldown_secs: u64,
    pub poll_interval_ms: u64,
    pub retry_interval_ms: u64,
    /// Progress log cadence in frames; `0` disables it.
    pub progress_every: u64,
    pub model: ModelConfig,
    pub frames: FramesConfig,
    pub resolver: ResolverConfig,
    pub alert: ChannelConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stream: "ZoodioThailand".to_string(),
            target_class: "hippopotamus".to_string(),
            min_confidence: 0.65,
            alert_cooldown_secs: 300,
            poll_interval_ms: 1000,
            retry_interval_ms: 1000,
            progress_every: 10,
            model: ModelConfig::default(),
            frames: FramesConfig::default(),
            resolver: ResolverConfig::default(),
            alert: ChannelConfig::default(),
        }
    }
}

/// `[model]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX export of a YOLO detection model.
    pub path: PathBuf,
    /// Labels file, one per line. The model's embedded names are used otherwise.
    pub labels: Option<PathBuf>,
    pub input_size: u32,
    pub score_floor: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// `0` lets the runtime pick.
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let params = YoloParams::default();
        Self {
            path: PathBuf::from("yolov8x-oiv7.onnx"),
            labels: None,
            input_size: params.input_size,
            score_floor: params.score_floor,
            iou_threshold: params.iou_threshold,
            max_detections: params.max_detections,
            intra_threads: 0,
        }
    }
}

impl ModelConfig {
    pub fn yolo_params(&self) -> YoloParams {
        YoloParams {
            input_size: self.input_size,
            score_floor: self.score_floor,
            iou_threshold: self.iou_threshold,
            max_detections: self.max_detections,
        }
    }
}

/// `[frames]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramesConfig {
    #[serde(alias = "binary_path")]
    pub ffmpeg_path: Option<String>,
    pub sample_fps: f64,
    pub max_restarts: u32,
    pub input_args: Vec<String>,
}

impl Default for FramesConfig {
    fn default() -> Self {
        let ffmpeg = FfmpegConfig::default();
        Self {
            ffmpeg_path: None,
            sample_fps: ffmpeg.sample_fps,
            max_restarts: ffmpeg.max_restarts,
            input_args: Vec::new(),
        }
    }
}

/// `[resolver]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub binary_path: Option<String>,
    pub format: Option<String>,
    pub extra_args: Vec<String>,
}

/// Alert channel kind as chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AlertKind {
    Log,
    Sms,
    Push,
}

/// Alert credentials from one source.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    pub twilio_to_number: Option<String>,
    pub pushbullet_api_key: Option<String>,
}

/// Values from the command line.
///
/// Credentials passed as flags replace the config file's. Credentials from
/// environment variables only fill fields the file leaves empty.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub stream: Option<String>,
    pub target_class: Option<String>,
    pub min_confidence: Option<f32>,
    pub alert_cooldown_secs: Option<u64>,
    pub alert_type: Option<AlertKind>,
    pub credentials: Credentials,
    pub env_credentials: Credentials,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
}

impl AppConfig {
    /// Default config file location, `<config_dir>/zoowatch/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// read when present and built-in defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.is_file() => {
                return Err(Error::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        let Some(path) = path else {
            debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Layer command-line values over the loaded ones.
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(stream) = overrides.stream {
            self.stream = stream;
        }
        if let Some(target_class) = overrides.target_class {
            self.target_class = target_class;
        }
        if let Some(min_confidence) = overrides.min_confidence {
            self.min_confidence = min_confidence;
        }
        if let Some(secs) = overrides.alert_cooldown_secs {
            self.alert_cooldown_secs = secs;
        }
        if let Some(path) = overrides.model_path {
            self.model.path = path;
        }
        if let Some(path) = overrides.labels_path {
            self.model.labels = Some(path);
        }

        let kind = overrides.alert_type.unwrap_or(match self.alert {
            ChannelConfig::Log => AlertKind::Log,
            ChannelConfig::Sms(_) => AlertKind::Sms,
            ChannelConfig::Push(_) => AlertKind::Push,
        });

        self.alert = match kind {
            AlertKind::Log => ChannelConfig::Log,
            AlertKind::Sms => {
                let mut twilio = match &self.alert {
                    ChannelConfig::Sms(c) => c.clone(),
                    _ => TwilioConfig::default(),
                };
                let (flags, env) = (overrides.credentials, overrides.env_credentials);
                fill_empty(&mut twilio.account_sid, env.twilio_account_sid);
                fill_empty(&mut twilio.auth_token, env.twilio_auth_token);
                fill_empty(&mut twilio.from_number, env.twilio_from_number);
                fill_empty(&mut twilio.to_number, env.twilio_to_number);
                overlay(&mut twilio.account_sid, flags.twilio_account_sid);
                overlay(&mut twilio.auth_token, flags.twilio_auth_token);
                overlay(&mut twilio.from_number, flags.twilio_from_number);
                overlay(&mut twilio.to_number, flags.twilio_to_number);
                ChannelConfig::Sms(twilio)
            }
            AlertKind::Push => {
                let mut push = match &self.alert {
                    ChannelConfig::Push(c) => c.clone(),
                    _ => PushbulletConfig::default(),
                };
                fill_empty(&mut push.api_key, overrides.env_credentials.pushbullet_api_key);
                overlay(&mut push.api_key, overrides.credentials.pushbullet_api_key);
                ChannelConfig::Push(push)
            }
        };
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.stream.trim().is_empty() {
            return Err(Error::config("stream must not be empty"));
        }
        if self.target_class.trim().is_empty() {
            return Err(Error::config("target_class must not be empty"));
        }
        check_unit_interval("min_confidence", self.min_confidence)?;
        check_unit_interval("model.score_floor", self.model.score_floor)?;
        check_unit_interval("model.iou_threshold", self.model.iou_threshold)?;
        if self.model.input_size == 0 {
            return Err(Error::config("model.input_size must be greater than 0"));
        }
        if !self.frames.sample_fps.is_finite() || self.frames.sample_fps <= 0.0 {
            return Err(Error::config(format!(
                "frames.sample_fps must be greater than 0, got {}",
                self.frames.sample_fps
            )));
        }
        self.alert.validate()
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            stream_identifier: self.stream.trim().to_string(),
            target_class: self.target_class.trim().to_string(),
            min_confidence: self.min_confidence,
            alert_cooldown: Duration::from_secs(self.alert_cooldown_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            progress_every: self.progress_every,
            near_miss_floor: self.model.score_floor,
        }
    }

    #[cfg(feature = "onnx")]
    pub fn detector_config(&self) -> OnnxDetectorConfig {
        OnnxDetectorConfig {
            model_path: self.model.path.clone(),
            labels_path: self.model.labels.clone(),
            params: self.model.yolo_params(),
            intra_threads: self.model.intra_threads,
        }
    }

    /// Frames are decoded straight to the model's input size.
    pub fn ffmpeg_config(&self) -> FfmpegConfig {
        FfmpegConfig {
            binary_path: self.frames.ffmpeg_path.clone(),
            sample_fps: self.frames.sample_fps,
            width: self.model.input_size,
            height: self.model.input_size,
            max_restarts: self.frames.max_restarts,
            input_args: self.frames.input_args.clone(),
        }
    }

    pub fn resolver_config(&self) -> YtDlpConfig {
        YtDlpConfig {
            binary_path: self.resolver.binary_path.clone(),
            format: self.resolver.format.clone(),
            extra_args: self.resolver.extra_args.clone(),
        }
    }
}

fn overlay(slot: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn fill_empty(slot: &mut String, value: Option<String>) {
    if slot.trim().is_empty() {
        overlay(slot, value);
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{name} must be between 0 and 1, got {value}"
        )))
    }
}
