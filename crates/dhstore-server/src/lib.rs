//! dhstore HTTP server
//!
//! The HTTP surface over the store: ingest endpoints for merging and
//! deleting index entries, lookup by multihash, the metadata row
//! operations, and a readiness probe. Byte payloads travel base64-encoded
//! in JSON bodies; multihashes and hashed value keys appear base58-encoded
//! in URL paths.
//!
//! Error mapping is uniform: validation failures are 400s with the error
//! message, absent data is a 404, anything else is a 500. The store treats
//! absent data as a clean empty result; turning that into 404 is this
//! layer's choice.
//!
//! # Modules
//!
//! - [`routes`] - Router construction and request handlers
//! - [`model`] - JSON request and response bodies
//! - [`error`] - HTTP error mapping
//! - [`metrics`] - Prometheus exporter and request latency tracking

pub mod error;
pub mod metrics;
pub mod model;
pub mod routes;

pub use routes::{build_router, AppState};
