// ── Central reactive data store ──
//
// Holds the device directory and the per-device state cache for the
// current session. Mutations are broadcast to subscribers via `watch`
// channels. Every session-scoped write runs under the generation read
// lock, so nothing from an ended session can land after logout.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::command::FanCommand;
use crate::model::{CachedState, Device, DeviceId, DeviceState};
use crate::stream::EntityStream;

/// Central reactive store for fans and their last-known state.
pub struct DataStore {
    pub(crate) devices: EntityCollection<Device>,
    pub(crate) states: EntityCollection<CachedState>,
    /// Session generation. Bumped under the write lock on login and logout.
    generation: RwLock<u64>,
    pub(crate) last_device_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (last_device_refresh, _) = watch::channel(None);

        Self {
            devices: EntityCollection::new(),
            states: EntityCollection::new(),
            generation: RwLock::new(0),
            last_device_refresh,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.devices.snapshot()
    }

    pub fn states_snapshot(&self) -> Arc<Vec<Arc<CachedState>>> {
        self.states.snapshot()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.devices.get(id)
    }

    pub fn cached(&self, id: &DeviceId) -> Option<Arc<CachedState>> {
        self.states.get(id)
    }

    pub fn state(&self, id: &DeviceId) -> Option<DeviceState> {
        self.states.get(id).map(|c| c.state.clone())
    }

    // ── Count accessors ──────────────────────────────────────────────

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Fans whose last-known state is powered on.
    pub fn powered_count(&self) -> usize {
        self.states
            .snapshot()
            .iter()
            .filter(|c| c.state.is_powered)
            .count()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_devices(&self) -> EntityStream<Device> {
        EntityStream::new(self.devices.subscribe())
    }

    pub fn subscribe_states(&self) -> EntityStream<CachedState> {
        EntityStream::new(self.states.subscribe())
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_device_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_device_refresh.borrow()
    }

    /// How long ago the directory was last listed, or `None` if never.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_device_refresh().map(|t| Utc::now() - t)
    }

    pub fn generation(&self) -> u64 {
        *self.generation.read().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Start a new generation holding `devices` and an empty state cache.
    pub(crate) fn begin_session(&self, devices: Vec<Device>) -> u64 {
        let mut generation = self.generation.write().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        self.states.clear();
        self.apply_device_list(devices);
        *generation
    }

    /// End the current generation and drop everything it held.
    pub(crate) fn end_session(&self) {
        let mut generation = self.generation.write().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        self.states.clear();
        self.devices.clear();
        self.last_device_refresh.send_modify(|t| *t = None);
    }

    /// Run `f` only if `generation` is still current, holding off any
    /// session change until it returns.
    pub(crate) fn scoped<R>(&self, generation: u64, f: impl FnOnce(&Self) -> R) -> Option<R> {
        let current = self.generation.read().unwrap_or_else(PoisonError::into_inner);
        (*current == generation).then(|| f(self))
    }

    // ── Session-scoped writes (call inside `scoped`) ─────────────────

    /// Replace a device's cache entry with a server read. Unknown devices
    /// are not cached; returns whether the write happened.
    pub(crate) fn put_server_state(&self, id: &DeviceId, state: DeviceState) -> bool {
        if !self.devices.contains(id) {
            return false;
        }
        self.states.upsert(id.clone(), CachedState::server(id.clone(), state));
        true
    }

    /// Apply `command` on top of the cached state (or a default one) and
    /// mark the entry optimistic. Returns the new state.
    pub(crate) fn put_optimistic(&self, id: &DeviceId, command: FanCommand) -> Option<DeviceState> {
        if !self.devices.contains(id) {
            return None;
        }
        let mut state = self.state(id).unwrap_or_default();
        command.apply(&mut state);
        self.states
            .upsert(id.clone(), CachedState::optimistic(id.clone(), state.clone()));
        Some(state)
    }

    /// Append a device with a zeroed state entry.
    pub(crate) fn insert_device(&self, device: Device) {
        let id = device.id.clone();
        self.devices.upsert(id.clone(), device);
        self.states
            .upsert(id.clone(), CachedState::server(id, DeviceState::zeroed()));
    }

    /// Drop a device and its state entry. Returns whether it was present.
    pub(crate) fn remove_device(&self, id: &DeviceId) -> bool {
        self.states.remove(id);
        self.devices.remove(id).is_some()
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
