// Async HTTP client for the smart-fan vendor REST API.
//
// Auth: `x-api-key` header plus `Authorization: Bearer <token>`, where the
// token is the refresh token for the exchange endpoint and the access
// token everywhere else.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::{AccessToken, Credentials};
use crate::error::Error;
use crate::models::{
    AccessTokenResponse, AddDeviceRequest, CommandRequest, CommandResponse, DeviceListResponse,
    DeviceRecord, DeviceStateResponse, ErrorBody, RemoveDeviceRequest, RemoveDeviceResponse,
};
use crate::transport::TransportConfig;

/// Production vendor endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.atomberg-iot.com";

const API_KEY_HEADER: &str = "x-api-key";

/// Raw HTTP client for the vendor API.
///
/// Stateless with respect to credentials: every call takes the secrets it
/// needs, so one client survives any number of login/logout cycles.
#[derive(Debug, Clone)]
pub struct FanClient {
    http: reqwest::Client,
    base_url: Url,
    /// Reported in [`Error::Timeout`]; enforced by `http` itself.
    timeout: Duration,
}

impl FanClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a base URL string and transport config.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout: transport.timeout,
        })
    }

    /// Wrap an existing `reqwest::Client`, assumed to use the default
    /// transport timeout.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout: TransportConfig::default().timeout,
        }
    }

    /// The vendor base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Exchange a refresh token for an access token.
    ///
    /// `POST /api/get-access-token`. Any non-2xx becomes
    /// [`Error::Authentication`] carrying the backend's message verbatim,
    /// or `"authentication failed"` when the body has none.
    pub async fn get_access_token(&self, credentials: &Credentials) -> Result<AccessToken, Error> {
        let url = self.api_url("get-access-token")?;
        debug!("POST {url}");

        let builder = self.authorize(
            self.http.post(url),
            &credentials.api_key,
            &credentials.refresh_token,
        )?;
        let resp = self.send(builder).await?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&raw)
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "authentication failed".into());
            return Err(Error::Authentication { message });
        }

        let body: AccessTokenResponse = decode(resp).await?;
        Ok(AccessToken::new(body.access_token, body.expires_in))
    }

    /// List all fans on the account, in backend order.
    ///
    /// `GET /api/get-devices`
    pub async fn get_devices(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
    ) -> Result<Vec<DeviceRecord>, Error> {
        let url = self.api_url("get-devices")?;
        debug!("GET {url}");

        let builder = self.authorize(self.http.get(url), api_key, &token.secret)?;
        let resp = self.send(builder).await?;
        let body: DeviceListResponse = handle_response(resp).await?;
        Ok(body.devices)
    }

    /// Read the current state of one fan.
    ///
    /// `GET /api/get-device-state?device_id=<id>`
    pub async fn get_device_state(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
        device_id: &str,
    ) -> Result<DeviceStateResponse, Error> {
        let url = self.api_url("get-device-state")?;
        debug!(device_id, "GET {url}");

        let builder = self.authorize(
            self.http.get(url).query(&[("device_id", device_id)]),
            api_key,
            &token.secret,
        )?;
        let resp = self.send(builder).await?;
        handle_response(resp).await
    }

    /// Send a control command.
    ///
    /// `POST /api/send-command` with `{device_id, command, value?}`
    pub async fn send_command(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
        request: &CommandRequest,
    ) -> Result<CommandResponse, Error> {
        self.post("send-command", api_key, token, request).await
    }

    /// Register a new fan on the account.
    ///
    /// `POST /api/add-device` with `{name, device_type}`
    pub async fn add_device(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
        request: &AddDeviceRequest,
    ) -> Result<DeviceRecord, Error> {
        self.post("add-device", api_key, token, request).await
    }

    /// Remove a fan from the account. Returns whether anything was removed.
    ///
    /// `POST /api/remove-device` with `{device_id}`
    pub async fn remove_device(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
        device_id: &str,
    ) -> Result<bool, Error> {
        let request = RemoveDeviceRequest {
            device_id: device_id.to_owned(),
        };
        let resp: RemoveDeviceResponse = self.post("remove-device", api_key, token, &request).await?;
        Ok(resp.removed)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Build `{base}/api/{path}`, tolerating a trailing slash on the base.
    fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    /// Send a request, reporting a timed-out request as [`Error::Timeout`].
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                Error::Transport(e)
            }
        })
    }

    /// Attach the API key and bearer token as sensitive headers.
    fn authorize(
        &self,
        builder: reqwest::RequestBuilder,
        api_key: &SecretString,
        bearer: &SecretString,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let mut key_value = HeaderValue::from_str(api_key.expose_secret()).map_err(|e| {
            Error::Authentication {
                message: format!("invalid API key header value: {e}"),
            }
        })?;
        key_value.set_sensitive(true);

        let mut bearer_value = HeaderValue::from_str(&format!("Bearer {}", bearer.expose_secret()))
            .map_err(|e| Error::Authentication {
                message: format!("invalid bearer token header value: {e}"),
            })?;
        bearer_value.set_sensitive(true);

        Ok(builder
            .header(API_KEY_HEADER, key_value)
            .header(AUTHORIZATION, bearer_value))
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        api_key: &SecretString,
        token: &AccessToken,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("POST {url}");

        let builder = self.authorize(self.http.post(url).json(body), api_key, &token.secret)?;
        let resp = self.send(builder).await?;
        handle_response(resp).await
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    if status.is_success() {
        decode(resp).await
    } else {
        Err(parse_error(status, resp).await)
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

/// Turn a non-2xx response into an [`Error`], preferring the `{message}` body.
async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
    let raw = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&raw)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map_or_else(|| status.to_string(), str::to_owned)
        });

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        Error::Authentication { message }
    } else {
        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}
