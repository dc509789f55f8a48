// In-process simulated vendor backend
//
// Reproduces the REST contract's validation and error semantics without a
// network. Storage is an explicit `DeviceTable` handed in at construction,
// so every test or demo run owns an isolated instance.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::auth::{AccessToken, Credentials};
use crate::error::Error;
use crate::models::{
    AddDeviceRequest, CommandRequest, CommandResponse, DeviceRecord, DeviceStateResponse,
};

/// The only credentials the simulator accepts (both fields).
pub const DEMO_CREDENTIAL: &str = "abc";

const TOKEN_PREFIX: &str = "mock_";
const CEILING_FAN: &str = "ceiling_fan";
const TABLE_FAN: &str = "table_fan";

// ── Storage ──────────────────────────────────────────────────────────

/// Server-side state of one simulated fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoredState {
    pub is_powered: bool,
    pub speed: u8,
    pub brightness: u8,
    pub timer: Option<u64>,
}

impl StoredState {
    fn to_wire(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("is_powered".into(), Value::Bool(self.is_powered));
        map.insert("speed".into(), Value::from(self.speed));
        map.insert("brightness".into(), Value::from(self.brightness));
        map.insert(
            "timer".into(),
            self.timer.map_or(Value::Null, Value::from),
        );
        map
    }
}

/// Device directory plus per-device state, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DeviceTable {
    devices: Vec<DeviceRecord>,
    states: HashMap<String, StoredState>,
}

impl DeviceTable {
    /// An account with no fans.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The four demo fans, all online and powered off.
    pub fn seeded() -> Self {
        let mut table = Self::empty();
        for (id, name, device_type) in [
            ("DEV001", "Bedroom Fan", CEILING_FAN),
            ("DEV002", "Living Room Fan", CEILING_FAN),
            ("DEV003", "Kitchen Fan", CEILING_FAN),
            ("DEV004", "Hall Fan", TABLE_FAN),
        ] {
            table.insert(
                DeviceRecord {
                    device_id: id.into(),
                    name: name.into(),
                    device_type: device_type.into(),
                    is_online: true,
                },
                StoredState::default(),
            );
        }
        table
    }

    /// Add or replace a device and its state.
    pub fn insert(&mut self, device: DeviceRecord, state: StoredState) {
        self.states.insert(device.device_id.clone(), state);
        if let Some(existing) = self
            .devices
            .iter_mut()
            .find(|d| d.device_id == device.device_id)
        {
            *existing = device;
        } else {
            self.devices.push(device);
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn contains(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d.device_id == device_id)
    }

    /// `DEV{n:03}` where `n` starts at size + 1 and skips ids already taken.
    fn next_device_id(&self) -> String {
        let mut n = self.devices.len() + 1;
        loop {
            let candidate = format!("DEV{n:03}");
            if !self.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

// ── Backend ──────────────────────────────────────────────────────────

/// Simulated vendor backend with the same async surface as
/// [`FanClient`](crate::FanClient).
#[derive(Debug)]
pub struct SimulatedBackend {
    table: Mutex<DeviceTable>,
    latency: Duration,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(DeviceTable::seeded())
    }
}

impl SimulatedBackend {
    pub fn new(table: DeviceTable) -> Self {
        Self {
            table: Mutex::new(table),
            latency: Duration::ZERO,
        }
    }

    /// Delay every request by `latency` before it touches storage.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    // ── Endpoints ────────────────────────────────────────────────────

    pub async fn get_access_token(&self, credentials: &Credentials) -> Result<AccessToken, Error> {
        self.simulate_delay().await;

        if credentials.api_key.expose_secret() != DEMO_CREDENTIAL
            || credentials.refresh_token.expose_secret() != DEMO_CREDENTIAL
        {
            return Err(Error::Authentication {
                message: "Invalid credentials. Demo mode requires: API Key: abc, Refresh Token: abc"
                    .into(),
            });
        }

        let token = format!("{TOKEN_PREFIX}access_token_{}", Uuid::new_v4().simple());
        debug!("simulated token exchange succeeded");
        Ok(AccessToken::new(token, Some(86_400)))
    }

    pub async fn get_devices(
        &self,
        _api_key: &SecretString,
        token: &AccessToken,
    ) -> Result<Vec<DeviceRecord>, Error> {
        self.simulate_delay().await;
        check_token(token)?;
        Ok(self.lock().devices.clone())
    }

    pub async fn get_device_state(
        &self,
        _api_key: &SecretString,
        token: &AccessToken,
        device_id: &str,
    ) -> Result<DeviceStateResponse, Error> {
        self.simulate_delay().await;
        check_token(token)?;

        let table = self.lock();
        let state = table
            .states
            .get(device_id)
            .ok_or_else(|| not_found(device_id))?;
        Ok(DeviceStateResponse {
            device_id: device_id.to_owned(),
            state: state.to_wire(),
        })
    }

    pub async fn send_command(
        &self,
        _api_key: &SecretString,
        token: &AccessToken,
        request: &CommandRequest,
    ) -> Result<CommandResponse, Error> {
        self.simulate_delay().await;
        check_token(token)?;

        let mut table = self.lock();
        let online = table
            .devices
            .iter()
            .find(|d| d.device_id == request.device_id)
            .map(|d| d.is_online);
        let state = table
            .states
            .get_mut(&request.device_id)
            .ok_or_else(|| not_found(&request.device_id))?;
        if online == Some(false) {
            return Err(Error::Api {
                status: 409,
                message: "Device is offline".into(),
            });
        }

        let message = apply_command(state, &request.command, request.value.as_ref())?;
        debug!(device_id = %request.device_id, command = %request.command, "simulated command applied");
        Ok(CommandResponse {
            success: Some(true),
            message: Some(message),
            extra: Map::new(),
        })
    }

    pub async fn add_device(
        &self,
        _api_key: &SecretString,
        token: &AccessToken,
        request: &AddDeviceRequest,
    ) -> Result<DeviceRecord, Error> {
        self.simulate_delay().await;
        check_token(token)?;

        if request.name.trim().is_empty() {
            return Err(bad_request("Device name must not be empty".into()));
        }
        if request.device_type != CEILING_FAN && request.device_type != TABLE_FAN {
            return Err(bad_request(format!(
                "Unknown device type: {}",
                request.device_type
            )));
        }

        let mut table = self.lock();
        let device = DeviceRecord {
            device_id: table.next_device_id(),
            name: request.name.clone(),
            device_type: request.device_type.clone(),
            is_online: true,
        };
        table.insert(device.clone(), StoredState::default());
        debug!(device_id = %device.device_id, "simulated device added");
        Ok(device)
    }

    pub async fn remove_device(
        &self,
        _api_key: &SecretString,
        token: &AccessToken,
        device_id: &str,
    ) -> Result<bool, Error> {
        self.simulate_delay().await;
        check_token(token)?;

        let mut table = self.lock();
        let Some(index) = table.devices.iter().position(|d| d.device_id == device_id) else {
            return Ok(false);
        };
        table.devices.remove(index);
        table.states.remove(device_id);
        debug!(device_id, "simulated device removed");
        Ok(true)
    }

    // ── Inspection / fault injection ─────────────────────────────────

    /// Flip a device's online flag. Returns `false` if the device is unknown.
    pub fn set_online(&self, device_id: &str, online: bool) -> bool {
        let mut table = self.lock();
        match table.devices.iter_mut().find(|d| d.device_id == device_id) {
            Some(device) => {
                device.is_online = online;
                true
            }
            None => false,
        }
    }

    /// The state as the server currently holds it.
    pub fn stored_state(&self, device_id: &str) -> Option<StoredState> {
        self.lock().states.get(device_id).copied()
    }

    /// Current directory contents, in order.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.lock().devices.clone()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, DeviceTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

/// Validate and apply one command, returning the success message.
fn apply_command(
    state: &mut StoredState,
    command: &str,
    value: Option<&Value>,
) -> Result<String, Error> {
    match command {
        "power" | "is_powered" => {
            state.is_powered = is_truthy(value);
            Ok(format!(
                "Fan turned {}",
                if state.is_powered { "on" } else { "off" }
            ))
        }
        "speed" => {
            let speed = integer_in(value, 1, 5)
                .ok_or_else(|| bad_request("Speed must be between 1 and 5".into()))?;
            state.speed = speed;
            Ok(format!("Speed set to {speed}"))
        }
        "brightness" => {
            let brightness = integer_in(value, 0, 100)
                .ok_or_else(|| bad_request("Brightness must be between 0 and 100".into()))?;
            state.brightness = brightness;
            Ok(format!("Brightness set to {brightness}%"))
        }
        "timer" => match value {
            None | Some(Value::Null) => {
                state.timer = None;
                Ok("Timer cleared".into())
            }
            Some(v) => {
                let minutes = v.as_u64().ok_or_else(|| {
                    bad_request("Timer must be a whole number of minutes or null".into())
                })?;
                state.timer = Some(minutes);
                Ok(format!("Timer set to {minutes} minutes"))
            }
        },
        other => Err(bad_request(format!("Unknown command: {other}"))),
    }
}

/// `1`, `"on"`, `"true"` and `true` switch a fan on; anything else is off.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s == "on" || s == "true",
        _ => false,
    }
}

fn integer_in(value: Option<&Value>, min: u8, max: u8) -> Option<u8> {
    let n = value?.as_i64()?;
    u8::try_from(n).ok().filter(|v| (min..=max).contains(v))
}

fn check_token(token: &AccessToken) -> Result<(), Error> {
    if token.secret.expose_secret().starts_with(TOKEN_PREFIX) {
        Ok(())
    } else {
        Err(Error::Authentication {
            message: "Invalid access token".into(),
        })
    }
}

fn not_found(device_id: &str) -> Error {
    Error::Api {
        status: 404,
        message: format!("Device {device_id} not found"),
    }
}

fn bad_request(message: String) -> Error {
    Error::Api {
        status: 400,
        message,
    }
}
