use std::{sync::OnceLock, time::Duration};

use tracing::debug;

/// Default timeout for alert delivery requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed a provider first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the HTTP client shared by network alert channels.
pub fn build_alert_client(timeout: Duration) -> reqwest::Client {
    install_rustls_provider();

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("zoowatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}
