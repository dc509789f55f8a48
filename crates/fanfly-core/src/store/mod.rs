// ── Reactive data store ──
//
// Device directory and state cache with push-based change notification.

mod collection;
mod data_store;
mod refresh;

pub use data_store::DataStore;
