// ── Domain model ──
//
// Canonical fan types consumed by the UI layer. Wire records from
// `fanfly-api` are converted into these in `crate::convert`.

pub mod device;
pub mod device_id;
pub mod state;

// ── Re-exports ──────────────────────────────────────────────────────

pub use device::{Device, DeviceType, TypeDisplay};
pub use device_id::DeviceId;
pub use state::{CachedState, DeviceState, StateOrigin};
