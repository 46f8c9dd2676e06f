//! `FlightStore`: the public face of the engine. Ingest, query, schema
//! introspection and reconciliation, each addressed by session id.
//!
//! Every call is synchronous and holds its session for its full duration.
//! Calls on one session serialize; calls on different sessions run
//! independently.

use flightdb_config::Config;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::catalog::{read_table_columns, ColumnInfo};
use crate::describe::{DescriptionLookup, KnowledgeBase, NoDescriptions};
use crate::error::Result;
use crate::ingest::{self, IngestOptions, IngestReport};
use crate::query::{self, QueryResult};
use crate::reconcile::{self, ReconcileReport};
use crate::session::{SessionOptions, SessionStore};
use crate::types::TelemetryPayload;

/// Introspected structure of one message table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub description: Option<String>,
    pub columns: Vec<ColumnInfo>,
}

pub struct FlightStore {
    sessions: SessionStore,
    descriptions: Arc<dyn DescriptionLookup>,
    ingest_options: IngestOptions,
}

impl FlightStore {
    /// Store rooted at `base_dir` with default connection settings and no
    /// message descriptions.
    pub fn new(base_dir: &Path) -> Self {
        Self {
            sessions: SessionStore::new(base_dir, SessionOptions::default()),
            descriptions: Arc::new(NoDescriptions),
            ingest_options: IngestOptions::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let descriptions: Arc<dyn DescriptionLookup> = match &config.knowledge.path {
            Some(path) => Arc::new(KnowledgeBase::load(path)),
            None => Arc::new(NoDescriptions),
        };
        tracing::info!(
            "initialized flight data store in {}",
            config.store.base_dir.display()
        );
        Self {
            sessions: SessionStore::new(
                &config.store.base_dir,
                SessionOptions::from(&config.store),
            ),
            descriptions,
            ingest_options: IngestOptions {
                coerce_to_declared_types: config.store.coerce_to_declared_types,
            },
        }
    }

    pub fn with_descriptions(mut self, descriptions: Arc<dyn DescriptionLookup>) -> Self {
        self.descriptions = descriptions;
        self
    }

    pub fn with_ingest_options(mut self, options: IngestOptions) -> Self {
        self.ingest_options = options;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Ingest a columnar payload: `{message: {field: [values...]}}`.
    pub fn store(&self, session_id: &str, payload: &TelemetryPayload) -> Result<IngestReport> {
        let options = self.ingest_options;
        self.sessions
            .with_session(session_id, |session| ingest::ingest(session, payload, options))
    }

    /// Run `statement` verbatim and return its rows column-wise.
    pub fn query(&self, session_id: &str, statement: &str) -> Result<QueryResult> {
        self.sessions.with_session(session_id, |session| {
            query::execute(session.conn(), session.id(), statement)
        })
    }

    /// Columns and description of every known table, sorted by name.
    pub fn database_info(&self, session_id: &str) -> Result<Vec<TableInfo>> {
        self.sessions.with_session(session_id, |session| {
            session
                .catalog()
                .table_names()
                .into_iter()
                .map(|name| {
                    let columns = read_table_columns(session.conn(), session.id(), &name)?;
                    Ok(TableInfo {
                        description: self.descriptions.describe(&name),
                        name,
                        columns,
                    })
                })
                .collect()
        })
    }

    /// Repair type drift in every known table. Only fails when the session
    /// itself cannot be opened.
    pub fn reconcile(&self, session_id: &str) -> Result<ReconcileReport> {
        self.sessions
            .with_session(session_id, |session| Ok(reconcile::reconcile(session)))
    }

    pub fn close(&self, session_id: &str) -> bool {
        self.sessions.close(session_id)
    }

    pub fn close_all(&self) {
        self.sessions.close_all();
    }
}
