// ── Device state types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::device_id::DeviceId;

/// Last-known operating state of one fan.
///
/// Only `is_powered` is always present. Other keys appear when the fan
/// reports them; anything unrecognised is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub is_powered: bool,
    pub speed: Option<u8>,
    pub brightness: Option<u8>,
    /// Minutes remaining; `None` when no timer is set.
    pub timer: Option<u32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl DeviceState {
    /// Freshly added fan: off, speed 0, brightness 0, no timer.
    pub fn zeroed() -> Self {
        Self {
            is_powered: false,
            speed: Some(0),
            brightness: Some(0),
            timer: None,
            extra: Map::new(),
        }
    }
}

/// Where a cached state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StateOrigin {
    /// Last successful poll or reconcile.
    Server,
    /// Local write not yet confirmed by a server read.
    Optimistic,
}

/// One state-cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedState {
    pub device_id: DeviceId,
    pub state: DeviceState,
    pub origin: StateOrigin,
    pub updated_at: DateTime<Utc>,
}

impl CachedState {
    pub(crate) fn server(device_id: DeviceId, state: DeviceState) -> Self {
        Self {
            device_id,
            state,
            origin: StateOrigin::Server,
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn optimistic(device_id: DeviceId, state: DeviceState) -> Self {
        Self {
            device_id,
            state,
            origin: StateOrigin::Optimistic,
            updated_at: Utc::now(),
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.origin == StateOrigin::Optimistic
    }
}
