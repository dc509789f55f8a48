// ── Directory refresh application logic ──
//
// Applies a full device listing to the DataStore. The backend's list is
// authoritative for membership and order; state entries of devices that
// disappeared are dropped with them.

use chrono::Utc;
use tracing::debug;

use super::DataStore;
use super::collection::EntityCollection;
use crate::model::{Device, DeviceId};

/// Upsert all incoming entities, then prune (and reorder) to match the
/// incoming list. Avoids the brief empty state that `clear()` causes.
/// Returns the ids that were pruned.
fn upsert_and_prune<T: Clone + Send + Sync + 'static>(
    collection: &EntityCollection<T>,
    items: Vec<(DeviceId, T)>,
) -> Vec<DeviceId> {
    let order: Vec<DeviceId> = items.iter().map(|(id, _)| id.clone()).collect();
    for (id, entity) in items {
        collection.upsert(id, entity);
    }
    collection.retain_ordered(&order)
}

impl DataStore {
    /// Replace the directory with `devices`, keeping cached state for
    /// devices that are still listed.
    pub(crate) fn apply_device_list(&self, devices: Vec<Device>) {
        let pruned = upsert_and_prune(
            &self.devices,
            devices.into_iter().map(|d| (d.id.clone(), d)).collect(),
        );

        for id in &pruned {
            self.states.remove(id);
        }
        if !pruned.is_empty() {
            debug!(count = pruned.len(), "pruned devices no longer reported");
        }

        self.last_device_refresh
            .send_modify(|t| *t = Some(Utc::now()));
    }
}
