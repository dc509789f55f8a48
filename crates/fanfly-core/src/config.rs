// ── Runtime hub configuration ──
//
// Describes which backend to talk to and how often to poll. Never read
// from disk here: `fanfly-config` (or a test) builds a `HubConfig` and
// hands it in. Credentials are not part of it.

use std::time::Duration;

use url::Url;

/// Configuration for a [`FanHub`](crate::FanHub).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Use the in-process simulated backend instead of the vendor API.
    pub mock_mode: bool,
    /// Vendor API base URL (ignored in mock mode).
    pub base_url: Url,
    /// Per-request timeout for the live backend.
    pub timeout: Duration,
    /// State poll period for the selected device.
    pub poll_interval: Duration,
    /// Artificial delay added to every simulated request.
    pub simulated_latency: Duration,
}

impl HubConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Live-backend config pointed at `base_url`.
    pub fn live(base_url: Url) -> Self {
        Self {
            mock_mode: false,
            base_url,
            ..Self::default()
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mock_mode: true,
            base_url: default_base_url(),
            timeout: Self::DEFAULT_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            simulated_latency: Duration::ZERO,
        }
    }
}

fn default_base_url() -> Url {
    Url::parse(fanfly_api::DEFAULT_BASE_URL).expect("default base URL is valid")
}
