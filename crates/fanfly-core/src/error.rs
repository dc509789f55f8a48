// ── Core error types ──
//
// User-facing errors from fanfly-core. Every message is fit to show in a
// UI. The `From<fanfly_api::Error>` impl gives the read-path reading of a
// transport failure; the command and token paths reclassify explicitly.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    /// Rejected before any network call. The message is shown as-is.
    #[error("{message}")]
    Validation { message: String },

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    // ── Session errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("No devices found in your account. Please add a device in the Atomberg Home app.")]
    NoDevices,

    #[error("Not logged in")]
    NotAuthenticated,

    /// The session this request belonged to was ended (logout or a new
    /// login) while it was in flight. Its result was discarded.
    #[error("Session ended before the request completed")]
    SessionEnded,

    // ── Device errors ────────────────────────────────────────────────
    #[error("Failed to fetch data: {message}")]
    Fetch { message: String },

    #[error("Device {device_id} is offline")]
    DeviceOffline { device_id: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    /// The backend refused to add or remove a fan.
    #[error("Failed to update devices: {message}")]
    DirectoryUpdate { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Token-exchange reading of a backend failure.
    pub(crate) fn authentication(err: &fanfly_api::Error) -> Self {
        Self::AuthenticationFailed {
            message: err.to_string(),
        }
    }

    /// Add/remove reading of a backend failure.
    pub(crate) fn directory_update(err: &fanfly_api::Error) -> Self {
        Self::DirectoryUpdate {
            message: err.to_string(),
        }
    }

    /// Command-path reading of a backend failure.
    pub(crate) fn command_failed(err: &fanfly_api::Error) -> Self {
        Self::CommandFailed {
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fanfly_api::Error> for CoreError {
    fn from(err: fanfly_api::Error) -> Self {
        match err {
            fanfly_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            fanfly_api::Error::Api { message, .. } => CoreError::Fetch { message },
            fanfly_api::Error::Transport(ref e) => CoreError::Fetch {
                message: e.to_string(),
            },
            fanfly_api::Error::Timeout { timeout_secs } => CoreError::Fetch {
                message: format!("request timed out after {timeout_secs}s"),
            },
            fanfly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            fanfly_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
