//! Monitor loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use stream_resolver::{Resolution, StreamResolver};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::gate::AlertGate;
use crate::detector::{Detection, DetectionModel, resolve_target_label};
use crate::frames::{Frame, FrameOpener, FrameSource};
use crate::notification::AlertChannel;
use crate::{Error, Result};

/// Immutable settings for one monitor run.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Channel handle or URL handed to the resolver.
    pub stream_identifier: String,
    /// Class label that triggers alerts.
    pub target_class: String,
    /// Inclusive confidence threshold for alerting.
    pub min_confidence: f32,
    /// Minimum time between two alerts.
    pub alert_cooldown: Duration,
    /// Pause after each processed frame.
    pub poll_interval: Duration,
    /// Pause after a frame read that produced nothing.
    pub retry_interval: Duration,
    /// Log a progress line every this many frames; `0` disables it.
    pub progress_every: u64,
    /// Target detections at or above this but under `min_confidence` are logged.
    pub near_miss_floor: f32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stream_identifier: "ZoodioThailand".to_string(),
            target_class: "hippopotamus".to_string(),
            min_confidence: 0.65,
            alert_cooldown: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
            retry_interval: Duration::from_secs(1),
            progress_every: 10,
            near_miss_floor: 0.10,
        }
    }
}

/// Lifecycle of a monitor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Starting,
    Connecting,
    Watching,
    Stopped,
    Failed,
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Connecting => "connecting",
            Self::Watching => "watching",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub frames_checked: u64,
    pub transient_failures: u64,
    pub alerts_sent: u64,
    pub delivery_failures: u64,
}

/// How a run ended, when it ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Stopped on request.
    Stopped(MonitorStats),
    /// Nothing was broadcasting; try again later.
    NotLive,
}

/// Build the alert text for a detection.
pub fn format_alert_message(label: &str, confidence: f32, at: DateTime<Local>) -> String {
    format!(
        "{label} detected at {}! (Confidence: {confidence:.2})",
        at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Watches one stream and alerts on the target class.
pub struct Monitor {
    config: MonitorConfig,
    /// Target class as spelled by the model.
    target_label: String,
    channel: Arc<dyn AlertChannel>,
    resolver: Arc<dyn StreamResolver>,
    model: Box<dyn DetectionModel>,
    opener: Arc<dyn FrameOpener>,
    gate: AlertGate,
    phase: MonitorPhase,
    stats: MonitorStats,
}

impl Monitor {
    /// Create a monitor.
    ///
    /// Fails with a model error when the target class is not in the model's
    /// label set; nothing is resolved or read in that case.
    pub fn new(
        config: MonitorConfig,
        channel: Arc<dyn AlertChannel>,
        resolver: Arc<dyn StreamResolver>,
        model: Box<dyn DetectionModel>,
        opener: Arc<dyn FrameOpener>,
    ) -> Result<Self> {
        let target_label = resolve_target_label(model.labels(), &config.target_class)?;
        info!(target = %target_label, "target class found in model labels");

        Ok(Self {
            gate: AlertGate::new(config.alert_cooldown),
            config,
            target_label,
            channel,
            resolver,
            model,
            opener,
            phase: MonitorPhase::Starting,
            stats: MonitorStats::default(),
        })
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    fn set_phase(&mut self, phase: MonitorPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "monitor phase change");
            self.phase = phase;
        }
    }

    /// Resolve the stream and watch it until `cancel` fires or a fatal error.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<MonitorOutcome> {
        self.set_phase(MonitorPhase::Connecting);
        info!(stream = %self.config.stream_identifier, resolver = self.resolver.name(), "connecting to stream");

        let resolver = Arc::clone(&self.resolver);
        let identifier = self.config.stream_identifier.clone();
        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            resolved = resolver.resolve(&identifier) => Some(resolved),
        };

        let media = match resolved {
            None => {
                self.set_phase(MonitorPhase::Stopped);
                return Ok(MonitorOutcome::Stopped(self.stats.clone()));
            }
            Some(Ok(Resolution::Live(media))) => media,
            Some(Ok(Resolution::NotLive)) => {
                info!(stream = %identifier, "no live stream available");
                self.set_phase(MonitorPhase::Stopped);
                return Ok(MonitorOutcome::NotLive);
            }
            Some(Err(e)) => {
                error!(stream = %identifier, error = %e, "failed to resolve stream");
                self.set_phase(MonitorPhase::Failed);
                return Err(Error::StreamUnavailable(e));
            }
        };

        let mut source = match self.opener.open(&media).await {
            Ok(source) => source,
            Err(e) => {
                self.set_phase(MonitorPhase::Failed);
                return Err(e.into());
            }
        };

        self.set_phase(MonitorPhase::Watching);
        info!(
            title = %media.display_title(),
            target = %self.target_label,
            "connected, watching stream"
        );

        let result = self.watch(source.as_mut(), &cancel).await;
        source.close().await;

        match result {
            Ok(()) => {
                self.set_phase(MonitorPhase::Stopped);
                info!(
                    frames = self.stats.frames_checked,
                    alerts = self.stats.alerts_sent,
                    "monitor stopped"
                );
                Ok(MonitorOutcome::Stopped(self.stats.clone()))
            }
            Err(e) => {
                self.set_phase(MonitorPhase::Failed);
                Err(e)
            }
        }
    }

    async fn watch(
        &mut self,
        source: &mut dyn FrameSource,
        cancel: &CancellationToken,
    ) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                read = source.read_frame() => read?,
            };

            let Some(frame) = read else {
                self.stats.transient_failures += 1;
                debug!(
                    failures = self.stats.transient_failures,
                    "failed to grab frame, retrying"
                );
                if !sleep_or_cancel(self.config.retry_interval, cancel).await {
                    return Ok(());
                }
                continue;
            };

            self.process_frame(&frame).await?;

            if !sleep_or_cancel(self.config.poll_interval, cancel).await {
                return Ok(());
            }
        }
    }

    async fn process_frame(&mut self, frame: &Frame) -> Result<()> {
        self.stats.frames_checked += 1;
        let checks = self.stats.frames_checked;
        if self.config.progress_every > 0 && checks % self.config.progress_every == 0 {
            info!(check = checks, "looking for {}", self.target_label);
        }

        let now = Instant::now();
        let detections = self.model.detect(frame)?;

        for detection in &detections {
            if detection.class_label != self.target_label {
                continue;
            }
            if detection.confidence < self.config.min_confidence {
                if detection.confidence >= self.config.near_miss_floor {
                    debug!(
                        confidence = detection.confidence,
                        "possible {}", self.target_label
                    );
                }
                continue;
            }
            if self.gate.try_acquire(now) {
                self.dispatch(detection).await;
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, detection: &Detection) {
        let message =
            format_alert_message(&detection.class_label, detection.confidence, Local::now());

        match self.channel.notify(&message).await {
            Ok(()) => {
                self.stats.alerts_sent += 1;
                info!(
                    channel = self.channel.channel_type(),
                    confidence = detection.confidence,
                    "alert sent"
                );
            }
            Err(e) => {
                self.stats.delivery_failures += 1;
                warn!(
                    channel = self.channel.channel_type(),
                    error = %e,
                    "alert delivery failed"
                );
            }
        }
    }
}

/// Sleep for `duration`; `false` if `cancel` fired first.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
