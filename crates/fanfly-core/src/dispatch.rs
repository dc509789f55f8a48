// ── Command dispatcher ──
//
// Validates a command, writes it optimistically to the cache, sends it,
// then reconciles with one server read, all under the device's gate so
// commands to one fan apply in the order they were issued.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::command::{CommandReceipt, FanCommand};
use crate::convert::command_request;
use crate::error::CoreError;
use crate::model::DeviceId;
use crate::session::SessionTicket;
use crate::store::DataStore;
use crate::sync::Synchronizer;

/// Sends control commands to fans.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Backend,
    store: Arc<DataStore>,
    sync: Synchronizer,
    /// Commands queued or running, per device.
    in_flight: Arc<DashMap<DeviceId, usize>>,
}

impl Dispatcher {
    pub fn new(backend: Backend, store: Arc<DataStore>, sync: Synchronizer) -> Self {
        Self {
            backend,
            store,
            sync,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Send `command` with `value` to one fan.
    ///
    /// The optimistic write is not rolled back if the backend refuses the
    /// command; the next poll or reconcile replaces it.
    ///
    /// If the session ends while the command is in flight, the outcome is
    /// discarded and `SessionEnded` is returned even when the backend
    /// accepted it.
    pub async fn send_command(
        &self,
        ticket: &SessionTicket,
        device_id: &DeviceId,
        command: &str,
        value: Option<&Value>,
    ) -> Result<CommandReceipt, CoreError> {
        let online = self.store.device(device_id).is_some_and(|d| d.is_online);
        if !online {
            return Err(CoreError::DeviceOffline {
                device_id: device_id.to_string(),
            });
        }
        let command = FanCommand::parse(command, value)?;

        let _busy = BusyGuard::enter(&self.in_flight, device_id);
        let gate = self.sync.gate(device_id);
        let _turn = gate.lock().await;

        self.store
            .scoped(ticket.generation, |s| s.put_optimistic(device_id, command))
            .ok_or(CoreError::SessionEnded)?;
        debug!(%device_id, ?command, "optimistic write applied");

        let request = command_request(device_id, command);
        let response = self
            .backend
            .send_command(&ticket.api_key, &ticket.token, &request)
            .await
            .map_err(|e| {
                warn!(%device_id, command = %request.command, error = %e, "command rejected");
                CoreError::command_failed(&e)
            })?;
        info!(%device_id, command = %request.command, "command sent");
        if self.store.generation() != ticket.generation {
            debug!(%device_id, "session ended while command was in flight");
            return Err(CoreError::SessionEnded);
        }

        let reconciled = match self.sync.read_state(ticket, device_id).await {
            Ok(state) => {
                self.sync.apply_state(ticket, device_id, &state)?;
                true
            }
            Err(_) if self.store.generation() != ticket.generation => {
                return Err(CoreError::SessionEnded);
            }
            Err(e) => {
                warn!(%device_id, error = %e, "reconcile failed; next poll will correct");
                false
            }
        };

        Ok(CommandReceipt {
            device_id: device_id.clone(),
            command,
            message: response.message,
            reconciled,
        })
    }

    /// Whether any command for `device_id` is queued or running.
    pub fn is_busy(&self, device_id: &DeviceId) -> bool {
        self.in_flight.get(device_id).is_some_and(|n| *n > 0)
    }
}

/// Counts a command as in flight until dropped.
struct BusyGuard<'a> {
    map: &'a DashMap<DeviceId, usize>,
    device_id: DeviceId,
}

impl<'a> BusyGuard<'a> {
    fn enter(map: &'a DashMap<DeviceId, usize>, device_id: &DeviceId) -> Self {
        *map.entry(device_id.clone()).or_insert(0) += 1;
        Self {
            map,
            device_id: device_id.clone(),
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.map.remove_if_mut(&self.device_id, |_, n| {
            *n = n.saturating_sub(1);
            *n == 0
        });
    }
}
