// ── Command API ──
//
// Fan control commands arrive as loose `(command, value)` pairs from the
// UI. They are parsed into a typed `FanCommand` before anything touches
// the cache or the network.

use serde_json::Value;

use crate::error::CoreError;
use crate::model::{DeviceId, DeviceState};

/// Command names accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
enum CommandKind {
    #[strum(to_string = "is_powered", serialize = "power")]
    Power,
    #[strum(to_string = "speed")]
    Speed,
    #[strum(to_string = "brightness")]
    Brightness,
    #[strum(to_string = "timer")]
    Timer,
}

/// A validated fan control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanCommand {
    Power(bool),
    /// Fan speed, `1..=5`.
    Speed(u8),
    /// Light brightness percentage, `0..=100`.
    Brightness(u8),
    /// Sleep timer in minutes; `None` clears it.
    Timer(Option<u32>),
}

impl FanCommand {
    /// Parse and validate a raw command.
    ///
    /// `power` is accepted as an alias of `is_powered`. Power never fails:
    /// anything that isn't `1`, `"on"`, `"true"` or `true` means off.
    pub fn parse(command: &str, value: Option<&Value>) -> Result<Self, CoreError> {
        let kind: CommandKind = command.parse().map_err(|_| CoreError::UnknownCommand {
            command: command.to_owned(),
        })?;

        match kind {
            CommandKind::Power => Ok(Self::Power(is_truthy(value))),
            CommandKind::Speed => integer_in(value, 1, 5)
                .map(Self::Speed)
                .ok_or_else(|| validation("speed must be 1..5")),
            CommandKind::Brightness => integer_in(value, 0, 100)
                .map(Self::Brightness)
                .ok_or_else(|| validation("brightness must be 0..100")),
            CommandKind::Timer => match value {
                None | Some(Value::Null) => Ok(Self::Timer(None)),
                Some(v) => v
                    .as_u64()
                    .and_then(|m| u32::try_from(m).ok())
                    .map(|m| Self::Timer(Some(m)))
                    .ok_or_else(|| validation("timer must be whole minutes or null")),
            },
        }
    }

    fn kind(self) -> CommandKind {
        match self {
            Self::Power(_) => CommandKind::Power,
            Self::Speed(_) => CommandKind::Speed,
            Self::Brightness(_) => CommandKind::Brightness,
            Self::Timer(_) => CommandKind::Timer,
        }
    }

    /// Canonical command name sent to the backend.
    pub fn wire_command(self) -> String {
        self.kind().to_string()
    }

    /// Normalized wire value: power as `1`/`0`, a cleared timer as `null`.
    pub fn wire_value(self) -> Value {
        match self {
            Self::Power(on) => Value::from(u8::from(on)),
            Self::Speed(v) | Self::Brightness(v) => Value::from(v),
            Self::Timer(minutes) => minutes.map_or(Value::Null, Value::from),
        }
    }

    /// Apply this command to a local state copy.
    pub fn apply(self, state: &mut DeviceState) {
        match self {
            Self::Power(on) => state.is_powered = on,
            Self::Speed(v) => state.speed = Some(v),
            Self::Brightness(v) => state.brightness = Some(v),
            Self::Timer(minutes) => state.timer = minutes,
        }
    }
}

/// Outcome of a successful `send_command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReceipt {
    pub device_id: DeviceId,
    pub command: FanCommand,
    /// Backend `message`, if it sent one.
    pub message: Option<String>,
    /// `false` when the follow-up state read failed; the next poll fixes it.
    pub reconciled: bool,
}

// ── Value helpers ────────────────────────────────────────────────────

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

fn validation(message: &str) -> CoreError {
    CoreError::Validation {
        message: message.to_owned(),
    }
}
