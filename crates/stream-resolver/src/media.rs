use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A directly fetchable media URL for a live broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaUrl {
    /// URL the decoder opens.
    pub url: String,
    /// Watch page the media URL was extracted from.
    pub page_url: String,
    /// Broadcast title, when the platform reports one.
    pub title: Option<String>,
    /// Live flag as reported by the platform.
    pub is_live: Option<bool>,
    /// HTTP headers the media host expects (user agent, referer, ...).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl MediaUrl {
    pub fn new(url: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page_url: page_url.into(),
            title: None,
            is_live: None,
            headers: HashMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title for log lines, falling back to the watch page.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.page_url)
    }
}

/// Outcome of a successful resolver run.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The target is broadcasting.
    Live(MediaUrl),
    /// Nothing is broadcasting right now; try again later.
    NotLive,
}

impl Resolution {
    pub fn is_live(&self) -> bool {
        matches!(self, Resolution::Live(_))
    }

    pub fn into_media(self) -> Option<MediaUrl> {
        match self {
            Resolution::Live(media) => Some(media),
            Resolution::NotLive => None,
        }
    }
}
