//! Session and device-state synchronization core for smart-fan dashboards.
//!
//! This crate sits between `fanfly-api` and a UI layer:
//!
//! - **[`FanHub`]**: Central facade. [`login()`](FanHub::login) exchanges
//!   the refresh token and lists devices; [`select_device()`](FanHub::select_device)
//!   starts polling one fan; [`send_command()`](FanHub::send_command)
//!   validates, applies optimistically, sends, and reconciles.
//!
//! - **[`Backend`]**: The live HTTP client or the in-process simulator,
//!   chosen by [`HubConfig::mock_mode`].
//!
//! - **[`DataStore`]**: Reactive storage for the device directory and the
//!   state cache, built on `watch` channels. Writes are scoped to a
//!   session generation so nothing lands after logout.
//!
//! - **[`EntityStream<T>`]**: Subscription handle vended by the store.
//!   Exposes `current()` / `latest()` / `changed()` and converts into a
//!   `Stream`.
//!
//! - **Components**: [`Session`], [`Directory`], [`Synchronizer`] and
//!   [`Dispatcher`] can be used on their own with a [`SessionTicket`].

pub mod backend;
pub mod command;
pub mod config;
pub mod convert;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod model;
pub mod session;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::Backend;
pub use command::{CommandReceipt, FanCommand};
pub use config::HubConfig;
pub use directory::Directory;
pub use dispatch::Dispatcher;
pub use error::CoreError;
pub use hub::FanHub;
pub use session::{Session, SessionTicket};
pub use store::DataStore;
pub use stream::{EntityStream, EntityWatchStream, Snapshot};
pub use sync::{PollHandle, PollStatus, Synchronizer};

// Re-export model types at the crate root for ergonomics.
pub use model::{CachedState, Device, DeviceId, DeviceState, DeviceType, StateOrigin, TypeDisplay};

// Simulator types, for demos and tests that inject their own storage.
pub use fanfly_api::{DeviceTable, SimulatedBackend, StoredState};
