use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use stream_resolver::{MediaUrl, Resolution, ResolveError, StreamResolver};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use zoowatch::Error;
use zoowatch::detector::{Detection, DetectionModel, ModelError};
use zoowatch::frames::{Frame, FrameError, FrameOpener, FrameSource};
use zoowatch::monitor::{Monitor, MonitorConfig, MonitorOutcome, MonitorPhase};
use zoowatch::notification::{AlertChannel, DeliveryError};

#[derive(Clone, Copy)]
enum ResolverMode {
    Live,
    NotLive,
    Fail,
}

struct FakeResolver {
    mode: ResolverMode,
    calls: AtomicUsize,
}

impl FakeResolver {
    fn new(mode: ResolverMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl StreamResolver for FakeResolver {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn resolve(&self, identifier: &str) -> Result<Resolution, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            ResolverMode::Live => Ok(Resolution::Live(
                MediaUrl::new(
                    "https://cdn.example.com/live.m3u8",
                    format!("https://www.youtube.com/@{identifier}/live"),
                )
                .with_title("Zoo cam"),
            )),
            ResolverMode::NotLive => Ok(Resolution::NotLive),
            ResolverMode::Fail => Err(ResolveError::Network("connection refused".to_string())),
        }
    }
}

enum Step {
    Frame,
    Miss,
    Fail,
}

/// Plays back `steps`, then cancels `done` and waits forever.
struct ScriptedSource {
    steps: VecDeque<Step>,
    next_index: u64,
    done: CancellationToken,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn read_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        match self.steps.pop_front() {
            Some(Step::Frame) => {
                let frame = Frame::new(self.next_index, 2, 2, Bytes::from(vec![0u8; 12]));
                self.next_index += 1;
                Ok(Some(frame))
            }
            Some(Step::Miss) => Ok(None),
            Some(Step::Fail) => Err(FrameError::StreamEnded {
                restarts: 30,
                last_error: "HTTP error 403 Forbidden".to_string(),
            }),
            None => {
                self.done.cancel();
                std::future::pending().await
            }
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct FakeOpener {
    source: Mutex<Option<ScriptedSource>>,
    opened: AtomicUsize,
    closed: Arc<AtomicBool>,
}

impl FakeOpener {
    fn new(steps: impl IntoIterator<Item = Step>, done: CancellationToken) -> Arc<Self> {
        let closed = Arc::new(AtomicBool::new(false));
        Arc::new(Self {
            source: Mutex::new(Some(ScriptedSource {
                steps: steps.into_iter().collect(),
                next_index: 0,
                done,
                closed: closed.clone(),
            })),
            opened: AtomicUsize::new(0),
            closed,
        })
    }

    fn frames(count: usize, done: CancellationToken) -> Arc<Self> {
        Self::new((0..count).map(|_| Step::Frame), done)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameOpener for FakeOpener {
    async fn open(&self, _media: &MediaUrl) -> Result<Box<dyn FrameSource>, FrameError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let source = self
            .source
            .lock()
            .unwrap()
            .take()
            .expect("opened more than once");
        Ok(Box::new(source))
    }
}

type Script = Box<dyn FnMut(&Frame) -> Vec<Detection> + Send>;

struct FakeModel {
    labels: Vec<String>,
    script: Script,
}

impl FakeModel {
    fn new(script: impl FnMut(&Frame) -> Vec<Detection> + Send + 'static) -> Box<Self> {
        Box::new(Self {
            labels: vec![
                "Person".to_string(),
                "Hippopotamus".to_string(),
                "Zebra".to_string(),
            ],
            script: Box::new(script),
        })
    }

    /// Same detections on every frame.
    fn constant(detections: Vec<Detection>) -> Box<Self> {
        Self::new(move |_| detections.clone())
    }
}

impl DetectionModel for FakeModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, ModelError> {
        Ok((self.script)(frame))
    }
}

#[derive(Default)]
struct RecordingChannel {
    fail: bool,
    attempts: Mutex<Vec<(Instant, String)>>,
}

impl RecordingChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    fn messages(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn instants(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl AlertChannel for RecordingChannel {
    fn channel_type(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, message: &str) -> Result<(), DeliveryError> {
        self.attempts
            .lock()
            .unwrap()
            .push((Instant::now(), message.to_string()));
        if self.fail {
            Err(DeliveryError::Rejected {
                channel: "recording",
                status: 401,
                body: "unauthorized".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn hippo(confidence: f32) -> Detection {
    Detection::new("Hippopotamus", confidence)
}

fn config() -> MonitorConfig {
    MonitorConfig::default()
}

fn monitor(
    config: MonitorConfig,
    channel: Arc<RecordingChannel>,
    resolver: Arc<FakeResolver>,
    model: Box<FakeModel>,
    opener: Arc<FakeOpener>,
) -> Monitor {
    Monitor::new(config, channel, resolver, model, opener).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_alerts_respect_cooldown_over_long_run() {
    let cancel = CancellationToken::new();
    let channel = RecordingChannel::new();
    let opener = FakeOpener::frames(605, cancel.clone());
    let mut monitor = monitor(
        config(),
        channel.clone(),
        FakeResolver::new(ResolverMode::Live),
        FakeModel::constant(vec![hippo(0.9)]),
        opener.clone(),
    );

    let outcome = monitor.run(cancel).await.unwrap();

    let MonitorOutcome::Stopped(stats) = outcome else {
        panic!("expected Stopped, got {outcome:?}");
    };
    assert_eq!(stats.frames_checked, 605);
    assert_eq!(stats.alerts_sent, 3);

    // Alerts at t=0, t=301 and t=602: each one the first frame strictly past the cooldown.
    let instants = channel.instants();
    assert_eq!(instants.len(), 3);
    assert_eq!(instants[1] - instants[0], Duration::from_secs(301));
    assert_eq!(instants[2] - instants[1], Duration::from_secs(301));

    assert!(opener.is_closed());
    assert_eq!(monitor.phase(), MonitorPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_confidence_at_threshold_alerts() {
    let cancel = CancellationToken::new();
    let channel = RecordingChannel::new();
    let mut monitor = monitor(
        config(),
        channel.clone(),
        FakeResolver::new(ResolverMode::Live),
        FakeModel::constant(vec![hippo(0.65)]),
        FakeOpener::frames(1, cancel.clone()),
    );

    monitor.run(cancel).await.unwrap();

    let messages = channel.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Hippopotamus detected at "));
    assert!(messages[0].ends_with("! (Confidence: 0.65)"));
}

#[tokio::test(start_paused = true)]
async fn test_below_threshold_and_other_classes_never_alert() {
    let cancel = CancellationToken::new();
    let channel = RecordingChannel::new();
    let mut monitor = monitor(
        config(),
        channel.clone(),
        FakeResolver::new(ResolverMode::Live),
        FakeModel::constant(vec![
            hippo(0.64),
            Detection::new("Zebra", 0.99),
            Detection::new("Person", 0.95),
        ]),
        FakeOpener::frames(20, cancel.clone()),
    );

    let outcome = monitor.run(cancel).await.unwrap();

    assert!(channel.messages().is_empty());
    match outcome {
        MonitorOutcome::Stopped(stats) => {
            assert_eq!(stats.frames_checked, 20);
            assert_eq!(stats.alerts_sent, 0);
        }
        other => panic!("expected Stopped, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_one_alert_per_frame() {
    let cancel = CancellationToken::new();
    let channel = RecordingChannel::new();
    let mut monitor = monitor(
        config(),
        channel.clone(),
        FakeResolver::new(ResolverMode::Live),
        FakeModel::constant(vec![hippo(0.91), hippo(0.80), hippo(0.70)]),
        FakeOpener::frames(1, cancel.clone()),
    );

    monitor.run(cancel).await.unwrap();

    let messages = channel.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Confidence: 0.91"));
}

#[tokio::test(start_paused = true)]
async fn test_zero_cooldown_alerts_every_frame_once() {
    let cancel = CancellationToken::new();
    let channel = RecordingChannel::new();
    let config = MonitorConfig {
        alert_cooldown: Duration::ZERO,
        ..config()
    };
    let mut monitor = monitor(
        config,
        channel.clone(),
        FakeResolver::new(ResolverMode::Live),
        FakeModel::constant(vec![hippo(0.9), hippo(0.8)]),
        FakeOpener::frames(3, cancel.clone()),
    );

    monitor.run(cancel).await.unwrap();

    assert_eq!(channel.messages().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_alert_only_when_target_appears() {
    let cancel = CancellationToken::new();
    let channel = RecordingChannel::new();
    // The target shows up on the fifth frame only.
    let model = FakeModel::new(|frame: &Frame| {
        if frame.index == 4 {
            vec![hippo(0.88)]
        } else {
            vec![Detection::new("Zebra", 0.9)]
        }
    });
    let mut monitor = monitor(
        config(),
        channel.clone(),
        FakeResolver::new(ResolverMode::Live),
        model,
        FakeOpener::frames(8, cancel.clone()),
    );
    let start = Instant::now();

    monitor.run(cancel).await.unwrap();

    let instants = channel.instants();
    assert_eq!(instants.len(), 1);
    assert_eq!(instants[0] - start, Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let cancel = CancellationToken::new();
    let channel = RecordingChannel::new();
    let steps = [
        Step::Miss,
        Step::Miss,
        Step::Miss,
        Step::Frame,
        Step::Miss,
        Step::Frame,
    ];
    let opener = FakeOpener::new(steps, cancel.clone());
    let mut monitor = monitor(
        config(),
        channel.clone(),
        FakeResolver::new(ResolverMode::Live),
        FakeModel::constant(vec![hippo(0.9)]),
        opener.clone(),
    );

    let outcome = monitor.run(cancel).await.unwrap();

    match outcome {
        MonitorOutcome::Stopped(stats) => {
            assert_eq!(stats.transient_failures, 4);
            assert_eq!(stats.frames_checked, 2);
            assert_eq!(stats.alerts_sent, 1);
        }
        other => panic!("expected Stopped, got {other:?}"),
    }
    assert_eq!(opener.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_not_live_never_opens_a_source() {
    let cancel = CancellationToken::new();
    let channel = RecordingChannel::new();
    let opener = FakeOpener::frames(1, cancel.clone());
    let mut monitor = monitor(
        config(),
        channel.clone(),
        FakeResolver::new(ResolverMode::NotLive),
        FakeModel::constant(vec![hippo(0.9)]),
        opener.clone(),
    );

    let outcome = monitor.run(cancel).await.unwrap();

    assert_eq!(outcome, MonitorOutcome::NotLive);
    assert_eq!(opener.opened.load(Ordering::SeqCst), 0);
    assert!(channel.messages().is_empty());
    assert_eq!(monitor.phase(), MonitorPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_resolution_error_is_fatal() {
    let cancel = CancellationToken::new();
    let opener = FakeOpener::frames(1, cancel.clone());
    let mut monitor = monitor(
        config(),
        RecordingChannel::new(),
        FakeResolver::new(ResolverMode::Fail),
        FakeModel::constant(vec![]),
        opener.clone(),
    );

    let err = monitor.run(cancel).await.unwrap_err();

    assert!(matches!(err, Error::StreamUnavailable(ResolveError::Network(_))));
    assert_eq!(opener.opened.load(Ordering::SeqCst), 0);
    assert_eq!(monitor.phase(), MonitorPhase::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_missing_target_label_fails_before_io() {
    let cancel = CancellationToken::new();
    let resolver = FakeResolver::new(ResolverMode::Live);
    let config = MonitorConfig {
        target_class: "pygmy hippopotamus".to_string(),
        ..config()
    };

    let result = Monitor::new(
        config,
        RecordingChannel::new(),
        resolver.clone(),
        FakeModel::constant(vec![]),
        FakeOpener::frames(1, cancel),
    );

    assert!(matches!(
        result,
        Err(Error::Model(ModelError::MissingLabel { .. }))
    ));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_target_label_matches_case_insensitively() {
    let cancel = CancellationToken::new();
    let config = MonitorConfig {
        target_class: "HIPPOPOTAMUS".to_string(),
        ..config()
    };
    let monitor = monitor(
        config,
        RecordingChannel::new(),
        FakeResolver::new(ResolverMode::Live),
        FakeModel::constant(vec![]),
        FakeOpener::frames(0, cancel),
    );

    assert_eq!(monitor.target_label(), "Hippopotamus");
}

#[tokio::test(start_paused = true)]
async fn test_fatal_read_error_closes_source() {
    let cancel = CancellationToken::new();
    let channel = RecordingChannel::new();
    let opener = FakeOpener::new([Step::Frame, Step::Fail, Step::Frame], cancel.clone());
    let mut monitor = monitor(
        config(),
        channel.clone(),
        FakeResolver::new(ResolverMode::Live),
        FakeModel::constant(vec![hippo(0.9)]),
        opener.clone(),
    );

    let err = monitor.run(cancel).await.unwrap_err();

    assert!(matches!(err, Error::Frame(FrameError::StreamEnded { .. })));
    assert!(opener.is_closed());
    assert_eq!(monitor.phase(), MonitorPhase::Failed);
    assert_eq!(monitor.stats().frames_checked, 1);
    assert_eq!(channel.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_and_closes() {
    let done = CancellationToken::new();
    let cancel = CancellationToken::new();
    let opener = FakeOpener::frames(1_000, done);
    let mut monitor = monitor(
        config(),
        RecordingChannel::new(),
        FakeResolver::new(ResolverMode::Live),
        FakeModel::constant(vec![]),
        opener.clone(),
    );

    let stopper = cancel.clone();
    let (outcome, ()) = tokio::join!(monitor.run(cancel), async move {
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        stopper.cancel();
    });

    match outcome.unwrap() {
        // Frames at t=0..=10; cancelled while sleeping before the twelfth.
        MonitorOutcome::Stopped(stats) => assert_eq!(stats.frames_checked, 11),
        other => panic!("expected Stopped, got {other:?}"),
    }
    assert!(opener.is_closed());
    assert_eq!(monitor.phase(), MonitorPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let resolver = FakeResolver::new(ResolverMode::Live);
    let opener = FakeOpener::frames(1, CancellationToken::new());
    let mut monitor = monitor(
        config(),
        RecordingChannel::new(),
        resolver.clone(),
        FakeModel::constant(vec![]),
        opener.clone(),
    );

    let outcome = monitor.run(cancel).await.unwrap();

    assert!(matches!(outcome, MonitorOutcome::Stopped(ref s) if s.frames_checked == 0));
    assert_eq!(opener.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delivery_failure_keeps_watching() {
    let cancel = CancellationToken::new();
    let channel = RecordingChannel::failing();
    let mut monitor = monitor(
        config(),
        channel.clone(),
        FakeResolver::new(ResolverMode::Live),
        FakeModel::constant(vec![hippo(0.9)]),
        FakeOpener::frames(5, cancel.clone()),
    );

    let outcome = monitor.run(cancel).await.unwrap();

    match outcome {
        MonitorOutcome::Stopped(stats) => {
            assert_eq!(stats.frames_checked, 5);
            assert_eq!(stats.alerts_sent, 0);
            assert_eq!(stats.delivery_failures, 1);
        }
        other => panic!("expected Stopped, got {other:?}"),
    }
    // The failed attempt still started the cooldown.
    assert_eq!(channel.messages().len(), 1);
}
