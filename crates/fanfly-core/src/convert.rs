// ── API-to-domain type conversions ──
//
// Bridges raw `fanfly_api` wire types into canonical `fanfly_core::model`
// types. State parsing is lenient: a value of the wrong type is treated
// as absent rather than failing the poll.

use serde_json::{Map, Value};

use fanfly_api::{CommandRequest, DeviceRecord};

use crate::command::FanCommand;
use crate::model::{Device, DeviceId, DeviceState, DeviceType};

// ── Device ─────────────────────────────────────────────────────────

impl From<DeviceRecord> for Device {
    fn from(r: DeviceRecord) -> Self {
        Self {
            id: DeviceId::from(r.device_id),
            name: r.name,
            device_type: DeviceType::from(r.device_type),
            is_online: r.is_online,
        }
    }
}

// ── State ──────────────────────────────────────────────────────────

impl From<Map<String, Value>> for DeviceState {
    fn from(mut raw: Map<String, Value>) -> Self {
        let is_powered = raw.remove("is_powered").is_some_and(|v| power_flag(&v));
        let speed = raw.remove("speed").and_then(|v| small_uint(&v));
        let brightness = raw.remove("brightness").and_then(|v| small_uint(&v));
        let timer = raw
            .remove("timer")
            .and_then(|v| v.as_u64())
            .and_then(|m| u32::try_from(m).ok());

        Self {
            is_powered,
            speed,
            brightness,
            timer,
            extra: raw,
        }
    }
}

/// Booleans as-is; integers are on when non-zero.
fn power_flag(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn small_uint(v: &Value) -> Option<u8> {
    v.as_u64().and_then(|n| u8::try_from(n).ok())
}

// ── Commands ───────────────────────────────────────────────────────

pub(crate) fn command_request(device_id: &DeviceId, command: FanCommand) -> CommandRequest {
    CommandRequest {
        device_id: device_id.as_str().to_owned(),
        command: command.wire_command(),
        value: Some(command.wire_value()),
    }
}
