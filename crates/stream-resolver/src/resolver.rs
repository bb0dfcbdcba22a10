use async_trait::async_trait;
use url::Url;

use crate::error::ResolveError;
use crate::media::Resolution;

/// Base URL used to expand bare channel handles.
const CHANNEL_BASE_URL: &str = "https://www.youtube.com";

/// Resolves a channel identifier into a live media URL.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Short resolver name for logs.
    fn name(&self) -> &'static str;

    /// Resolve `identifier` (channel handle or URL).
    ///
    /// `Ok(Resolution::NotLive)` means the target exists but is not broadcasting.
    async fn resolve(&self, identifier: &str) -> Result<Resolution, ResolveError>;
}

/// What an identifier points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// A channel handle; only a broadcast that is live right now counts.
    Channel(String),
    /// An explicit page or media URL, used as-is.
    Url(String),
}

impl StreamTarget {
    pub fn parse(identifier: &str) -> Result<Self, ResolveError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ResolveError::InvalidIdentifier(
                "identifier is empty".to_string(),
            ));
        }

        if identifier.starts_with("http://") || identifier.starts_with("https://") {
            let url = Url::parse(identifier)
                .map_err(|e| ResolveError::InvalidIdentifier(format!("{identifier}: {e}")))?;
            return Ok(Self::Url(url.to_string()));
        }

        let handle = identifier.trim_start_matches('@');
        if handle.is_empty() || handle.contains(char::is_whitespace) || handle.contains('/') {
            return Err(ResolveError::InvalidIdentifier(identifier.to_string()));
        }
        Ok(Self::Channel(handle.to_string()))
    }

    /// URL handed to the extraction tool.
    pub fn page_url(&self) -> String {
        match self {
            Self::Channel(handle) => format!("{CHANNEL_BASE_URL}/@{handle}/live"),
            Self::Url(url) => url.clone(),
        }
    }

    pub fn requires_live(&self) -> bool {
        matches!(self, Self::Channel(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handle_strips_at() {
        let target = StreamTarget::parse("@ZoodioThailand").unwrap();
        assert_eq!(target, StreamTarget::Channel("ZoodioThailand".to_string()));
        assert_eq!(
            target.page_url(),
            "https://www.youtube.com/@ZoodioThailand/live"
        );
        assert!(target.requires_live());
    }

    #[test]
    fn test_parse_url_kept() {
        let target = StreamTarget::parse("https://www.youtube.com/watch?v=abc123").unwrap();
        assert_eq!(
            target,
            StreamTarget::Url("https://www.youtube.com/watch?v=abc123".to_string())
        );
        assert!(!target.requires_live());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(StreamTarget::parse("").is_err());
        assert!(StreamTarget::parse("  ").is_err());
        assert!(StreamTarget::parse("@").is_err());
        assert!(StreamTarget::parse("two words").is_err());
        assert!(StreamTarget::parse("https://").is_err());
    }
}
