// ── Device domain types ──

use serde::{Deserialize, Serialize};

use super::device_id::DeviceId;

/// Fan form factor as reported by the vendor.
///
/// Unrecognised type strings survive as `Other` so one odd device never
/// fails a whole directory listing.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceType {
    CeilingFan,
    TableFan,
    #[strum(default)]
    Other(String),
}

/// Presentation metadata for a device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDisplay {
    pub label: &'static str,
    pub short_label: &'static str,
    pub icon: &'static str,
}

impl DeviceType {
    pub fn display(&self) -> TypeDisplay {
        match self {
            Self::CeilingFan => TypeDisplay {
                label: "Ceiling Fan",
                short_label: "Ceiling",
                icon: "🎪",
            },
            Self::TableFan => TypeDisplay {
                label: "Table Fan",
                short_label: "Table",
                icon: "🪑",
            },
            Self::Other(_) => TypeDisplay {
                label: "Fan",
                short_label: "Fan",
                icon: "🌀",
            },
        }
    }

    /// The wire string (`ceiling_fan`, `table_fan`, or the raw unknown value).
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Other(raw) => raw,
            known => known.as_ref(),
        }
    }
}

impl From<String> for DeviceType {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(Self::Other(_)) | Err(_) => Self::Other(raw),
            Ok(known) => known,
        }
    }
}

impl From<DeviceType> for String {
    fn from(t: DeviceType) -> Self {
        t.as_wire().to_owned()
    }
}

/// A fan in the user's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub device_type: DeviceType,
    /// Authoritative reachability flag; offline fans refuse commands.
    pub is_online: bool,
}
