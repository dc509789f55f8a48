// ── Credential / session store ──
//
// Owns the credentials and access token of the current login. A login
// either fully succeeds (token plus a non-empty device list, installed
// together under a new session generation) or changes nothing.

use std::sync::{Arc, PoisonError, RwLock};

use fanfly_api::{AccessToken, Credentials};
use secrecy::SecretString;
use tracing::info;

use crate::directory::Directory;
use crate::error::CoreError;
use crate::model::Device;
use crate::store::DataStore;

/// Snapshot of the credentials a network operation runs under.
///
/// Results are written back only while `generation` is still current.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub(crate) api_key: SecretString,
    pub(crate) token: AccessToken,
    pub(crate) generation: u64,
}

impl SessionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct ActiveSession {
    credentials: Credentials,
    token: AccessToken,
    generation: u64,
}

/// Login state for one user.
pub struct Session {
    active: RwLock<Option<ActiveSession>>,
    store: Arc<DataStore>,
    directory: Directory,
}

impl Session {
    pub fn new(store: Arc<DataStore>, directory: Directory) -> Self {
        Self {
            active: RwLock::new(None),
            store,
            directory,
        }
    }

    /// Exchange the refresh token, list devices, and open a session.
    pub async fn login(&self, api_key: &str, refresh_token: &str) -> Result<(), CoreError> {
        // Secrets go to the backend exactly as entered; only the blank
        // check ignores whitespace.
        let credentials = Credentials::new(api_key, refresh_token);
        if credentials.is_incomplete() {
            return Err(CoreError::Validation {
                message: "Please enter both API Key and Refresh Token".into(),
            });
        }

        let token = self.directory.exchange_token(&credentials).await?;
        let devices = self
            .directory
            .list_devices(&credentials.api_key, &token)
            .await?;
        if devices.is_empty() {
            return Err(CoreError::NoDevices);
        }

        let count = devices.len();
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let generation = self.store.begin_session(devices);
        *active = Some(ActiveSession {
            credentials,
            token,
            generation,
        });
        drop(active);

        info!(devices = count, generation, "logged in");
        Ok(())
    }

    /// Forget credentials, devices and cached state. Never fails.
    pub fn logout(&self) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let was_active = active.take().is_some();
        self.store.end_session();
        drop(active);

        if was_active {
            info!("logged out");
        }
    }

    /// Credentials for one network operation.
    pub fn ticket(&self) -> Result<SessionTicket, CoreError> {
        let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
        let session = active.as_ref().ok_or(CoreError::NotAuthenticated)?;
        Ok(SessionTicket {
            api_key: session.credentials.api_key.clone(),
            token: session.token.clone(),
            generation: session.generation,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Devices of the current session, in backend order. Empty when
    /// logged out.
    pub fn devices(&self) -> Arc<Vec<Arc<Device>>> {
        self.store.devices_snapshot()
    }
}
