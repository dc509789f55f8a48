// ── Backend selection ──
//
// One enum over the live HTTP client and the simulated backend. Every
// other component talks to `Backend`, so both variants surface the same
// `fanfly_api::Error` taxonomy.

use std::sync::Arc;

use fanfly_api::{
    AccessToken, AddDeviceRequest, CommandRequest, CommandResponse, Credentials, DeviceRecord,
    DeviceStateResponse, FanClient, SimulatedBackend, TransportConfig,
};
use secrecy::SecretString;

use crate::config::HubConfig;
use crate::error::CoreError;

/// The vendor API, real or simulated.
#[derive(Debug, Clone)]
pub enum Backend {
    Live(FanClient),
    Simulated(Arc<SimulatedBackend>),
}

impl Backend {
    /// Pick the backend `config.mock_mode` asks for.
    pub fn from_config(config: &HubConfig) -> Result<Self, CoreError> {
        if config.mock_mode {
            let sim = SimulatedBackend::default().with_latency(config.simulated_latency);
            return Ok(Self::Simulated(Arc::new(sim)));
        }

        let transport = TransportConfig::default().with_timeout(config.timeout);
        let client = FanClient::new(config.base_url.as_str(), &transport).map_err(|e| {
            CoreError::Config {
                message: format!("cannot build HTTP client: {e}"),
            }
        })?;
        Ok(Self::Live(client))
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated(_))
    }

    // ── Endpoints ────────────────────────────────────────────────────

    pub async fn get_access_token(
        &self,
        credentials: &Credentials,
    ) -> Result<AccessToken, fanfly_api::Error> {
        match self {
            Self::Live(c) => c.get_access_token(credentials).await,
            Self::Simulated(s) => s.get_access_token(credentials).await,
        }
    }

    pub async fn get_devices(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
    ) -> Result<Vec<DeviceRecord>, fanfly_api::Error> {
        match self {
            Self::Live(c) => c.get_devices(api_key, token).await,
            Self::Simulated(s) => s.get_devices(api_key, token).await,
        }
    }

    pub async fn get_device_state(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
        device_id: &str,
    ) -> Result<DeviceStateResponse, fanfly_api::Error> {
        match self {
            Self::Live(c) => c.get_device_state(api_key, token, device_id).await,
            Self::Simulated(s) => s.get_device_state(api_key, token, device_id).await,
        }
    }

    pub async fn send_command(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
        request: &CommandRequest,
    ) -> Result<CommandResponse, fanfly_api::Error> {
        match self {
            Self::Live(c) => c.send_command(api_key, token, request).await,
            Self::Simulated(s) => s.send_command(api_key, token, request).await,
        }
    }

    pub async fn add_device(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
        request: &AddDeviceRequest,
    ) -> Result<DeviceRecord, fanfly_api::Error> {
        match self {
            Self::Live(c) => c.add_device(api_key, token, request).await,
            Self::Simulated(s) => s.add_device(api_key, token, request).await,
        }
    }

    pub async fn remove_device(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
        device_id: &str,
    ) -> Result<bool, fanfly_api::Error> {
        match self {
            Self::Live(c) => c.remove_device(api_key, token, device_id).await,
            Self::Simulated(s) => s.remove_device(api_key, token, device_id).await,
        }
    }
}
