//! Configuration for the flightdb telemetry store.
//!
//! Settings live in a TOML file; every field has a default so an absent or
//! partial file is valid. A handful of environment variables override the
//! file after it is loaded.

pub mod schema;

pub use schema::{Config, JournalMode, KnowledgeConfig, StoreConfig};
