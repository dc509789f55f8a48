// Wire types for the vendor REST API.
//
// These mirror the JSON bodies exactly. Domain conversion happens in
// `fanfly-core`; nothing here interprets field values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `POST /api/get-access-token` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// A fan as reported by `GET /api/get-devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    pub name: String,
    pub device_type: String,
    pub is_online: bool,
}

/// `GET /api/get-devices` response. A missing `devices` key means none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceListResponse {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

/// `GET /api/get-device-state` response.
///
/// `state` is an open map: not every fan reports every key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStateResponse {
    pub device_id: String,
    #[serde(default)]
    pub state: Map<String, Value>,
}

/// `POST /api/send-command` body. `value` is omitted when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub device_id: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// `POST /api/send-command` response.
///
/// The payload is backend-defined; `success` and `message` are picked out
/// when present and everything else is kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `POST /api/add-device` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDeviceRequest {
    pub name: String,
    pub device_type: String,
}

/// `POST /api/remove-device` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveDeviceRequest {
    pub device_id: String,
}

/// `POST /api/remove-device` response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RemoveDeviceResponse {
    pub removed: bool,
}

/// Error body shape shared by every endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
