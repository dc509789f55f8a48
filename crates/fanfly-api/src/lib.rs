// fanfly-api: Async Rust client for the smart-fan vendor REST API, plus an
// in-process simulated backend speaking the same contract.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod simulated;
pub mod transport;

pub use auth::{AccessToken, Credentials};
pub use client::{DEFAULT_BASE_URL, FanClient};
pub use error::Error;
pub use models::{
    AddDeviceRequest, CommandRequest, CommandResponse, DeviceRecord, DeviceStateResponse,
};
pub use simulated::{DeviceTable, SimulatedBackend, StoredState};
pub use transport::TransportConfig;
