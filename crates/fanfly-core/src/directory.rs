// ── Device directory client ──
//
// Token exchange, device listing, and add/remove. Successful mutations
// are mirrored into the DataStore under the caller's session generation.

use std::sync::Arc;

use fanfly_api::{AccessToken, AddDeviceRequest, Credentials};
use secrecy::SecretString;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::CoreError;
use crate::model::{Device, DeviceId, DeviceType};
use crate::session::SessionTicket;
use crate::store::DataStore;

/// Directory operations against the active backend.
#[derive(Clone)]
pub struct Directory {
    backend: Backend,
    store: Arc<DataStore>,
}

impl Directory {
    pub fn new(backend: Backend, store: Arc<DataStore>) -> Self {
        Self { backend, store }
    }

    /// Exchange a refresh token for an access token.
    pub async fn exchange_token(&self, credentials: &Credentials) -> Result<AccessToken, CoreError> {
        let token = self
            .backend
            .get_access_token(credentials)
            .await
            .map_err(|e| CoreError::authentication(&e))?;
        if token.is_empty() {
            return Err(CoreError::AuthenticationFailed {
                message: "authentication failed".into(),
            });
        }
        debug!("access token obtained");
        Ok(token)
    }

    /// List devices in backend order. An empty list is not an error here.
    pub async fn list_devices(
        &self,
        api_key: &SecretString,
        token: &AccessToken,
    ) -> Result<Vec<Device>, CoreError> {
        let records = self
            .backend
            .get_devices(api_key, token)
            .await
            .map_err(|e| CoreError::Fetch {
                message: e.to_string(),
            })?;
        Ok(records.into_iter().map(Device::from).collect())
    }

    /// Register a new fan and seed its zeroed state.
    pub async fn add_device(
        &self,
        ticket: &SessionTicket,
        name: &str,
        device_type: &DeviceType,
    ) -> Result<Device, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation {
                message: "Please enter a fan name".into(),
            });
        }

        let request = AddDeviceRequest {
            name: name.to_owned(),
            device_type: device_type.as_wire().to_owned(),
        };
        let device = Device::from(
            self.backend
                .add_device(&ticket.api_key, &ticket.token, &request)
                .await
                .map_err(|e| CoreError::directory_update(&e))?,
        );

        self.store
            .scoped(ticket.generation, |s| s.insert_device(device.clone()))
            .ok_or(CoreError::SessionEnded)?;
        info!(device_id = %device.id, "device added");
        Ok(device)
    }

    /// Remove a fan everywhere. Returns whether anything was removed.
    pub async fn remove_device(
        &self,
        ticket: &SessionTicket,
        device_id: &DeviceId,
    ) -> Result<bool, CoreError> {
        let remote = self
            .backend
            .remove_device(&ticket.api_key, &ticket.token, device_id.as_str())
            .await
            .map_err(|e| CoreError::directory_update(&e))?;

        let local = self
            .store
            .scoped(ticket.generation, |s| s.remove_device(device_id))
            .ok_or(CoreError::SessionEnded)?;

        let removed = remote || local;
        if removed {
            info!(%device_id, "device removed");
        }
        Ok(removed)
    }

    /// Re-list devices and apply them by upsert-then-prune.
    pub async fn refresh_devices(
        &self,
        ticket: &SessionTicket,
    ) -> Result<Arc<Vec<Arc<Device>>>, CoreError> {
        let devices = self.list_devices(&ticket.api_key, &ticket.token).await?;
        let count = devices.len();
        self.store
            .scoped(ticket.generation, |s| s.apply_device_list(devices))
            .ok_or(CoreError::SessionEnded)?;
        debug!(count, "device list refreshed");
        Ok(self.store.devices_snapshot())
    }
}
