#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

//! flightdb: per-session SQL storage for flight telemetry.
//!
//! The engine lives in `flightdb-store`; configuration in `flightdb-config`.
//! This crate re-exports both and carries the command implementations used
//! by the `flightdb` binary.

pub mod commands;

pub use flightdb_config as config;
pub use flightdb_config::Config;
pub use flightdb_store::*;
