//! Telemetry storage engine.
//!
//! Ingests columnar telemetry whose field types are unknown in advance into
//! one SQLite file per session, one table per message type. Column types are
//! inferred once from the first row; [`reconcile`] later repairs tables whose
//! stored values drifted from their declared types.

pub mod catalog;
pub mod describe;
pub mod error;
pub mod infer;
pub mod ingest;
pub mod normalize;
pub mod query;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod types;

pub use catalog::{ColumnInfo, SchemaCatalog, TableSchema};
pub use describe::{DescriptionLookup, KnowledgeBase, NoDescriptions};
pub use error::{ErrorKind, Result, StoreError};
pub use infer::{column_type_for, infer};
pub use ingest::{IngestOptions, IngestReport, MessageOutcome};
pub use normalize::normalize;
pub use query::{QueryResult, ResultColumn};
pub use reconcile::ReconcileReport;
pub use session::{Session, SessionOptions, SessionStore};
pub use store::{FlightStore, TableInfo};
pub use types::{Cell, ColumnType, FieldColumn, MessageBatch, RawValue, Row, TelemetryPayload};
