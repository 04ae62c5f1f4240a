//! Concrete backend implementations.

pub mod rocks;

pub use rocks::{RocksBackend, RocksConfig};
