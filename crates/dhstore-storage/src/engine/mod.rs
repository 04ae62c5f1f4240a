//! Backend abstraction for the store.
//!
//! The store consumes a deliberately small slice of what an embedded
//! log-structured database offers; [`LsmBackend`] captures exactly that
//! slice so the facade stays independent of the concrete engine.

mod error;
mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{BackendMetrics, BatchOps, LsmBackend, WriteMode};
