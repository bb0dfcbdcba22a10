mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgMatches, CommandFactory, FromArgMatches};
use stream_resolver::YtDlpResolver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zoowatch::config::AppConfig;
use zoowatch::detector::DetectionModel;
use zoowatch::frames::FfmpegOpener;
use zoowatch::logging::{Verbosity, init_logging};
use zoowatch::monitor::{Monitor, MonitorOutcome};
use zoowatch::notification::build_channel;

use crate::cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let _log_guard = match init_logging(
        Verbosity::from_flags(args.debug, args.quiet),
        args.log_dir.as_deref(),
    ) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(args, &matches).await {
        Ok(MonitorOutcome::Stopped(stats)) => {
            info!(
                frames = stats.frames_checked,
                alerts = stats.alerts_sent,
                failed_alerts = stats.delivery_failures,
                "Stopped monitoring"
            );
            ExitCode::SUCCESS
        }
        Ok(MonitorOutcome::NotLive) => {
            eprintln!("No live stream available. Try again later or specify a URL with --url");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Application error: {:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, matches: &ArgMatches) -> anyhow::Result<MonitorOutcome> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_overrides(args.overrides(matches));
    config.validate()?;

    let channel = build_channel(&config.alert)?;
    info!(channel = channel.channel_type(), "Alert channel ready");

    let model = load_model(&config)?;

    let resolver = YtDlpResolver::new(config.resolver_config());
    match resolver.version() {
        Some(version) => debug!(%version, "Found yt-dlp"),
        None => warn!("yt-dlp did not respond to --version; stream resolution will likely fail"),
    }

    let opener = FfmpegOpener::new(config.ffmpeg_config());
    match opener.version() {
        Some(version) => debug!(%version, "Found ffmpeg"),
        None => warn!("ffmpeg did not respond to -version; frame capture will likely fail"),
    }

    let mut monitor = Monitor::new(
        config.monitor_config(),
        channel,
        Arc::new(resolver),
        model,
        Arc::new(opener),
    )?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping");
            signal_token.cancel();
        }
    });

    Ok(monitor.run(cancel).await?)
}

#[cfg(feature = "onnx")]
fn load_model(config: &AppConfig) -> anyhow::Result<Box<dyn DetectionModel>> {
    use zoowatch::detector::OnnxDetector;

    let detector = OnnxDetector::load(&config.detector_config()).with_context(|| {
        format!(
            "failed to load detection model {}",
            config.model.path.display()
        )
    })?;
    Ok(Box::new(detector))
}

#[cfg(not(feature = "onnx"))]
fn load_model(_config: &AppConfig) -> anyhow::Result<Box<dyn DetectionModel>> {
    anyhow::bail!("built without the `onnx` feature; no detection backend is available")
}
