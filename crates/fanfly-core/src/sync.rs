// ── Device state synchronizer ──
//
// Polls the selected fan's state on a fixed period and serves on-demand
// refreshes. Every read of one device goes through that device's gate,
// a fair async mutex shared with the command dispatcher, so cache writes
// for a device never interleave.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::CoreError;
use crate::model::{DeviceId, DeviceState};
use crate::session::SessionTicket;
use crate::store::DataStore;

// ── PollHandle ───────────────────────────────────────────────────────

/// Health of one polling loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStatus {
    pub polls: u64,
    pub last_success: Option<DateTime<Utc>>,
    /// Message of the most recent failure; cleared by the next success.
    pub last_error: Option<String>,
}

struct PollShared {
    token: CancellationToken,
    /// Held while a fetched result is written, and by `cancel()`.
    apply_lock: StdMutex<()>,
}

/// Handle to a running poll loop. Dropping it stops the loop.
pub struct PollHandle {
    device_id: DeviceId,
    shared: Arc<PollShared>,
    status: watch::Receiver<PollStatus>,
}

impl PollHandle {
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Stop polling. Idempotent. Once this returns, no fetch started by
    /// this handle can write to the cache.
    pub fn cancel(&self) {
        let _apply = self
            .shared
            .apply_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.shared.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    pub fn status(&self) -> watch::Receiver<PollStatus> {
        self.status.clone()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollHandle")
            .field("device_id", &self.device_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ── Synchronizer ─────────────────────────────────────────────────────

/// Reads device state from the backend into the DataStore.
///
/// Cheaply cloneable; clones share gates.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    backend: Backend,
    store: Arc<DataStore>,
    gates: DashMap<DeviceId, Arc<Mutex<()>>>,
}

impl Synchronizer {
    pub fn new(backend: Backend, store: Arc<DataStore>) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                backend,
                store,
                gates: DashMap::new(),
            }),
        }
    }

    /// Start polling `device_id` every `period`, first fetch immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_polling(
        &self,
        ticket: SessionTicket,
        device_id: DeviceId,
        period: Duration,
    ) -> PollHandle {
        let shared = Arc::new(PollShared {
            token: CancellationToken::new(),
            apply_lock: StdMutex::new(()),
        });
        let (status_tx, status_rx) = watch::channel(PollStatus::default());

        tokio::spawn(poll_task(
            self.clone(),
            ticket,
            device_id.clone(),
            period,
            Arc::clone(&shared),
            status_tx,
        ));
        debug!(%device_id, ?period, "polling started");

        PollHandle {
            device_id,
            shared,
            status: status_rx,
        }
    }

    /// Fetch one device's state and replace its cache entry.
    ///
    /// On failure the cache is untouched, so the last-known state stays.
    pub async fn fetch_state(
        &self,
        ticket: &SessionTicket,
        device_id: &DeviceId,
    ) -> Result<DeviceState, CoreError> {
        let result = {
            let gate = self.gate(device_id);
            let _turn = gate.lock().await;
            self.read_state(ticket, device_id)
                .await
                .and_then(|state| self.apply_state(ticket, device_id, &state).map(|()| state))
        };
        if self.inner.store.device(device_id).is_none() {
            self.prune_gates();
        }
        result
    }

    /// On-demand fetch; same as [`fetch_state`](Self::fetch_state).
    pub async fn refresh(
        &self,
        ticket: &SessionTicket,
        device_id: &DeviceId,
    ) -> Result<DeviceState, CoreError> {
        self.fetch_state(ticket, device_id).await
    }

    // ── Crate-internal ───────────────────────────────────────────────

    /// The FIFO gate serializing reads and commands for one device.
    pub(crate) fn gate(&self, device_id: &DeviceId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.inner
                .gates
                .entry(device_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Drop idle gates of devices that are no longer listed.
    pub(crate) fn prune_gates(&self) {
        let store = &self.inner.store;
        self.inner
            .gates
            .retain(|id, gate| Arc::strong_count(gate) > 1 || store.device(id).is_some());
    }

    /// Network half of a fetch. Caller holds the gate.
    pub(crate) async fn read_state(
        &self,
        ticket: &SessionTicket,
        device_id: &DeviceId,
    ) -> Result<DeviceState, CoreError> {
        let resp = self
            .inner
            .backend
            .get_device_state(&ticket.api_key, &ticket.token, device_id.as_str())
            .await
            .map_err(|e| CoreError::Fetch {
                message: e.to_string(),
            })?;
        Ok(DeviceState::from(resp.state))
    }

    /// Cache half of a fetch. Fails with `SessionEnded` for a stale ticket.
    pub(crate) fn apply_state(
        &self,
        ticket: &SessionTicket,
        device_id: &DeviceId,
        state: &DeviceState,
    ) -> Result<(), CoreError> {
        let cached = self
            .inner
            .store
            .scoped(ticket.generation, |s| {
                s.put_server_state(device_id, state.clone())
            })
            .ok_or(CoreError::SessionEnded)?;
        if !cached {
            debug!(%device_id, "state for unlisted device not cached");
        }
        Ok(())
    }

    /// One poll tick. `Ok(None)` means the handle was cancelled mid-fetch.
    async fn poll_once(
        &self,
        ticket: &SessionTicket,
        device_id: &DeviceId,
        shared: &PollShared,
    ) -> Result<Option<DeviceState>, CoreError> {
        let gate = self.gate(device_id);
        let _turn = gate.lock().await;
        let state = self.read_state(ticket, device_id).await?;

        let _apply = shared
            .apply_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if shared.token.is_cancelled() {
            return Ok(None);
        }
        self.apply_state(ticket, device_id, &state)?;
        Ok(Some(state))
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Poll loop for one device. Ticks never overlap; a slow fetch delays
/// the next tick instead of bunching them.
async fn poll_task(
    sync: Synchronizer,
    ticket: SessionTicket,
    device_id: DeviceId,
    period: Duration,
    shared: Arc<PollShared>,
    status: watch::Sender<PollStatus>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shared.token.cancelled() => break,
            _ = interval.tick() => {
                debug!(%device_id, "poll tick");
                let outcome = tokio::select! {
                    biased;
                    () = shared.token.cancelled() => break,
                    r = sync.poll_once(&ticket, &device_id, &shared) => r,
                };
                if record(&status, &device_id, outcome).is_break() {
                    break;
                }
            }
        }
    }
    debug!(%device_id, "polling stopped");
}

fn record(
    status: &watch::Sender<PollStatus>,
    device_id: &DeviceId,
    outcome: Result<Option<DeviceState>, CoreError>,
) -> ControlFlow<()> {
    match outcome {
        Ok(Some(_)) => {
            status.send_modify(|s| {
                s.polls += 1;
                s.last_success = Some(Utc::now());
                s.last_error = None;
            });
            ControlFlow::Continue(())
        }
        Ok(None) => ControlFlow::Break(()),
        Err(CoreError::SessionEnded) => {
            debug!(%device_id, "session ended, polling stops");
            ControlFlow::Break(())
        }
        Err(e) => {
            warn!(%device_id, error = %e, "poll failed");
            let message = e.to_string();
            status.send_modify(|s| {
                s.polls += 1;
                s.last_error = Some(message);
            });
            ControlFlow::Continue(())
        }
    }
}
