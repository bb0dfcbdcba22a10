//! `yt-dlp` backed resolver.
//!
//! Runs `yt-dlp --dump-single-json` against the watch page and reads the
//! selected format's direct URL out of the JSON document.

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ResolveError;
use crate::media::{MediaUrl, Resolution};
use crate::resolver::{StreamResolver, StreamTarget};

static DEFAULT_YTDLP_PATH: &str = "yt-dlp";
static DEFAULT_YTDLP_FORMAT: &str = "best[ext=mp4]/best";

/// `live_status` values that mean nothing is broadcasting now.
const OFFLINE_LIVE_STATUSES: &[&str] = &["not_live", "was_live", "is_upcoming", "post_live"];

/// yt-dlp resolver configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YtDlpConfig {
    /// Binary to run. Falls back to `YTDLP_PATH`, then `yt-dlp` on `PATH`.
    pub binary_path: Option<String>,
    /// yt-dlp format selector.
    pub format: Option<String>,
    /// Extra arguments appended after the built-in ones.
    pub extra_args: Vec<String>,
}

impl YtDlpConfig {
    fn binary_path(&self) -> String {
        self.binary_path
            .clone()
            .or_else(|| std::env::var("YTDLP_PATH").ok())
            .unwrap_or_else(|| DEFAULT_YTDLP_PATH.to_string())
    }

    fn format(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_YTDLP_FORMAT)
    }
}

#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    config: YtDlpConfig,
}

impl YtDlpResolver {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    /// Version string of the configured binary, if it runs.
    pub fn version(&self) -> Option<String> {
        process_utils::probe_version(self.config.binary_path(), "--version")
    }

    fn build_args(&self, page_url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "-f".to_string(),
            self.config.format().to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args.push(page_url.to_string());
        args
    }

    async fn run_ytdlp_json(&self, page_url: &str) -> Result<Option<YtDlpInfo>, ResolveError> {
        let binary_path = self.config.binary_path();
        let args = self.build_args(page_url);
        debug!(binary = %binary_path, ?args, "running yt-dlp");

        let out = process_utils::tokio_command(&binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !out.status.success() {
            let stderr = process_utils::stderr_summary(&out.stderr);
            return match map_ytdlp_error(&stderr) {
                Some(err) => Err(err),
                None => Ok(None),
            };
        }

        let info: YtDlpInfo = serde_json::from_slice(&out.stdout)?;
        Ok(Some(info))
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new(YtDlpConfig::default())
    }
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn resolve(&self, identifier: &str) -> Result<Resolution, ResolveError> {
        let target = StreamTarget::parse(identifier)?;
        let page_url = target.page_url();
        info!(page = %page_url, "looking for live stream");

        let Some(info) = self.run_ytdlp_json(&page_url).await? else {
            info!(page = %page_url, "no live stream currently active");
            return Ok(Resolution::NotLive);
        };

        let resolution = info.into_resolution(&target, page_url)?;
        if let Resolution::Live(media) = &resolution {
            info!(title = %media.display_title(), "found live stream");
        }
        Ok(resolution)
    }
}

/// Classify yt-dlp failure text.
///
/// `None` means the page exists but nothing is broadcasting.
fn map_ytdlp_error(msg: &str) -> Option<ResolveError> {
    let lower = msg.to_lowercase();
    if lower.contains("not currently live")
        || lower.contains("live event will begin")
        || lower.contains("premieres in")
        || lower.contains("is offline")
    {
        return None;
    }
    if lower.contains("http error 404") || lower.contains("does not exist") {
        return Some(ResolveError::NotFound(msg.to_string()));
    }
    if lower.contains("unable to download")
        || lower.contains("timed out")
        || lower.contains("name or service not known")
        || lower.contains("temporary failure in name resolution")
        || lower.contains("getaddrinfo failed")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("network is unreachable")
    {
        return Some(ResolveError::Network(msg.to_string()));
    }
    Some(ResolveError::Other(msg.to_string()))
}

#[derive(Debug, Clone, Default, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    is_live: Option<bool>,
    #[serde(default)]
    live_status: Option<String>,
    #[serde(default)]
    http_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    requested_formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct YtDlpFormat {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    http_headers: Option<HashMap<String, String>>,
}

impl YtDlpInfo {
    fn is_offline(&self) -> bool {
        if self.is_live == Some(false) {
            return true;
        }
        self.live_status
            .as_deref()
            .is_some_and(|status| OFFLINE_LIVE_STATUSES.contains(&status))
    }

    fn into_resolution(
        self,
        target: &StreamTarget,
        fallback_page: String,
    ) -> Result<Resolution, ResolveError> {
        if target.requires_live() && self.is_offline() {
            debug!(
                id = ?self.id,
                live_status = ?self.live_status,
                "channel page resolved to a broadcast that is not live"
            );
            return Ok(Resolution::NotLive);
        }

        // Merged formats carry no top-level url; take the video-bearing part.
        let (url, format_headers) = match self.url {
            Some(url) => (url, None),
            None => self
                .requested_formats
                .into_iter()
                .filter(|f| f.vcodec.as_deref() != Some("none"))
                .find_map(|f| f.url.map(|url| (url, f.http_headers)))
                .ok_or(ResolveError::NoMediaUrl)?,
        };

        let page_url = match (self.webpage_url, &self.id) {
            (Some(page), _) => page,
            (None, Some(id)) => format!("https://www.youtube.com/watch?v={id}"),
            (None, None) => fallback_page,
        };

        Ok(Resolution::Live(MediaUrl {
            url,
            page_url,
            title: self.title,
            is_live: self.is_live,
            headers: format_headers.or(self.http_headers).unwrap_or_default(),
        }))
    }
}
