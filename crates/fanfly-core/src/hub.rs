// ── FanHub facade ──
//
// The single application-state object a UI holds. Wires the session,
// directory, synchronizer and dispatcher around one DataStore, and owns
// the poll loop of the currently selected fan.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::backend::Backend;
use crate::command::CommandReceipt;
use crate::config::HubConfig;
use crate::directory::Directory;
use crate::dispatch::Dispatcher;
use crate::error::CoreError;
use crate::model::{CachedState, Device, DeviceId, DeviceState, DeviceType};
use crate::session::Session;
use crate::store::DataStore;
use crate::stream::EntityStream;
use crate::sync::{PollHandle, PollStatus, Synchronizer};

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<HubInner>`. Construct once and pass by
/// reference; `logout()` tears everything down.
#[derive(Clone)]
pub struct FanHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    backend: Backend,
    store: Arc<DataStore>,
    session: Session,
    directory: Directory,
    sync: Synchronizer,
    dispatcher: Dispatcher,
    /// Poll loop of the selected device, if any.
    selection: Mutex<Option<PollHandle>>,
}

impl FanHub {
    /// Build from configuration, choosing the backend by `mock_mode`.
    pub fn new(config: HubConfig) -> Result<Self, CoreError> {
        let backend = Backend::from_config(&config)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Build around an explicit backend.
    pub fn with_backend(config: HubConfig, backend: Backend) -> Self {
        let store = Arc::new(DataStore::new());
        let directory = Directory::new(backend.clone(), Arc::clone(&store));
        let session = Session::new(Arc::clone(&store), directory.clone());
        let sync = Synchronizer::new(backend.clone(), Arc::clone(&store));
        let dispatcher = Dispatcher::new(backend.clone(), Arc::clone(&store), sync.clone());

        Self {
            inner: Arc::new(HubInner {
                config,
                backend,
                store,
                session,
                directory,
                sync,
                dispatcher,
                selection: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Log in. On success any selection from a previous session is dropped.
    pub async fn login(&self, api_key: &str, refresh_token: &str) -> Result<(), CoreError> {
        self.inner.session.login(api_key, refresh_token).await?;
        self.deselect();
        Ok(())
    }

    /// Stop polling and forget the session.
    pub fn logout(&self) {
        self.deselect();
        self.inner.session.logout();
        self.inner.sync.prune_gates();
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    pub fn devices(&self) -> Arc<Vec<Arc<Device>>> {
        self.inner.session.devices()
    }

    pub fn device(&self, device_id: &DeviceId) -> Option<Arc<Device>> {
        self.inner.store.device(device_id)
    }

    // ── Selection ────────────────────────────────────────────────────

    /// Poll `device_id` at the configured interval, replacing any
    /// previous selection.
    pub fn select_device(&self, device_id: &DeviceId) -> Result<(), CoreError> {
        let ticket = self.inner.session.ticket()?;
        if self.inner.store.device(device_id).is_none() {
            return Err(CoreError::Validation {
                message: format!("Device {device_id} not found"),
            });
        }

        let mut selection = self.lock_selection();
        if let Some(previous) = selection.take() {
            previous.cancel();
        }
        *selection = Some(self.inner.sync.start_polling(
            ticket,
            device_id.clone(),
            self.inner.config.poll_interval,
        ));
        Ok(())
    }

    /// Stop polling the selected device, if any.
    pub fn deselect(&self) {
        if let Some(handle) = self.lock_selection().take() {
            debug!(device_id = %handle.device_id(), "deselected");
            handle.cancel();
        }
    }

    pub fn selected_device(&self) -> Option<DeviceId> {
        self.lock_selection().as_ref().map(|h| h.device_id().clone())
    }

    /// Health of the selected device's poll loop.
    pub fn poll_status(&self) -> Option<watch::Receiver<PollStatus>> {
        self.lock_selection().as_ref().map(PollHandle::status)
    }

    // ── State ────────────────────────────────────────────────────────

    pub async fn fetch_state(&self, device_id: &DeviceId) -> Result<DeviceState, CoreError> {
        let ticket = self.inner.session.ticket()?;
        self.inner.sync.fetch_state(&ticket, device_id).await
    }

    pub async fn refresh(&self, device_id: &DeviceId) -> Result<DeviceState, CoreError> {
        let ticket = self.inner.session.ticket()?;
        self.inner.sync.refresh(&ticket, device_id).await
    }

    pub fn state(&self, device_id: &DeviceId) -> Option<DeviceState> {
        self.inner.store.state(device_id)
    }

    pub fn cached(&self, device_id: &DeviceId) -> Option<Arc<CachedState>> {
        self.inner.store.cached(device_id)
    }

    /// Number of fans currently running, per the cache.
    pub fn powered_count(&self) -> usize {
        self.inner.store.powered_count()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn send_command(
        &self,
        device_id: &DeviceId,
        command: &str,
        value: Option<Value>,
    ) -> Result<CommandReceipt, CoreError> {
        let ticket = self.inner.session.ticket()?;
        self.inner
            .dispatcher
            .send_command(&ticket, device_id, command, value.as_ref())
            .await
    }

    pub fn is_busy(&self, device_id: &DeviceId) -> bool {
        self.inner.dispatcher.is_busy(device_id)
    }

    // ── Directory ────────────────────────────────────────────────────

    pub async fn add_device(
        &self,
        name: &str,
        device_type: &DeviceType,
    ) -> Result<Device, CoreError> {
        let ticket = self.inner.session.ticket()?;
        self.inner.directory.add_device(&ticket, name, device_type).await
    }

    /// Remove a fan. If it was the selected one, polling stops once the
    /// removal has succeeded.
    pub async fn remove_device(&self, device_id: &DeviceId) -> Result<bool, CoreError> {
        let ticket = self.inner.session.ticket()?;
        let removed = self.inner.directory.remove_device(&ticket, device_id).await?;
        if removed {
            let deselected = self
                .lock_selection()
                .take_if(|h| h.device_id() == device_id);
            if let Some(handle) = deselected {
                debug!(%device_id, "removed device deselected");
                handle.cancel();
            }
            self.inner.sync.prune_gates();
        }
        Ok(removed)
    }

    pub async fn refresh_devices(&self) -> Result<Arc<Vec<Arc<Device>>>, CoreError> {
        let ticket = self.inner.session.ticket()?;
        self.inner.directory.refresh_devices(&ticket).await
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn devices_stream(&self) -> EntityStream<Device> {
        self.inner.store.subscribe_devices()
    }

    pub fn states_stream(&self) -> EntityStream<CachedState> {
        self.inner.store.subscribe_states()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock_selection(&self) -> std::sync::MutexGuard<'_, Option<PollHandle>> {
        self.inner
            .selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
