// ── Generic reactive entity collection ──
//
// Ordered keyed storage with push-based change notification via `watch`
// channels. Insertion order is preserved so the UI lists fans in the
// order the backend reported them.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::DeviceId;

/// A reactive collection for a single entity type, keyed by device.
///
/// Every mutation bumps a version counter and rebuilds the snapshot that
/// subscribers receive.
pub(crate) struct EntityCollection<T: Clone + Send + Sync + 'static> {
    /// Primary storage in display order.
    by_id: RwLock<IndexMap<DeviceId, Arc<T>>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: RwLock::new(IndexMap::new()),
            version,
            snapshot,
        }
    }

    /// Insert or update an entity. Returns `true` if the id was new.
    /// An existing id keeps its position.
    pub(crate) fn upsert(&self, id: DeviceId, entity: T) -> bool {
        let mut map = self.write();
        let is_new = map.insert(id, Arc::new(entity)).is_none();
        self.publish(&map);
        is_new
    }

    /// Remove an entity by id. Returns the removed entity if it existed.
    pub(crate) fn remove(&self, id: &DeviceId) -> Option<Arc<T>> {
        let mut map = self.write();
        let removed = map.shift_remove(id);
        if removed.is_some() {
            self.publish(&map);
        }
        removed
    }

    /// Drop every id not in `order`, then arrange the rest to match it.
    /// Returns the ids that were dropped.
    pub(crate) fn retain_ordered(&self, order: &[DeviceId]) -> Vec<DeviceId> {
        let mut map = self.write();
        let dropped: Vec<DeviceId> = map
            .keys()
            .filter(|k| !order.contains(k))
            .cloned()
            .collect();
        map.retain(|k, _| order.contains(k));
        let rank = |k: &DeviceId| order.iter().position(|o| o == k);
        map.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));
        self.publish(&map);
        dropped
    }

    pub(crate) fn get(&self, id: &DeviceId) -> Option<Arc<T>> {
        self.read().get(id).cloned()
    }

    pub(crate) fn contains(&self, id: &DeviceId) -> bool {
        self.read().contains_key(id)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    /// Remove all entities.
    pub(crate) fn clear(&self) {
        let mut map = self.write();
        map.clear();
        self.publish(&map);
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All current ids, in order.
    pub(crate) fn keys(&self) -> Vec<DeviceId> {
        self.read().keys().cloned().collect()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<DeviceId, Arc<T>>> {
        self.by_id.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<DeviceId, Arc<T>>> {
        self.by_id.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild the snapshot from `map`, broadcast it, and bump the version.
    /// Callers hold the write guard, so snapshots go out in mutation order.
    fn publish(&self, map: &IndexMap<DeviceId, Arc<T>>) {
        let values: Vec<Arc<T>> = map.values().cloned().collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}
