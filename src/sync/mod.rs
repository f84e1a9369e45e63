//! Cache-first synchronization between the local cache and PokéAPI.

mod resync;
mod state;
mod synchronizer;

#[cfg(test)]
pub mod testing;

pub use resync::ResyncWorker;
pub use state::{DataSource, SyncError, SyncState};
pub use synchronizer::{SyncStream, Synchronizer};
