//! Session store: one isolated file-backed connection and catalog per session id.

use flightdb_config::{JournalMode, StoreConfig};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::catalog::{self, SchemaCatalog};
use crate::error::{Result, StoreError};
use crate::types::Row;

/// Connection settings shared by every session of a store.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub file_extension: String,
    pub busy_timeout: Duration,
    pub journal_mode: JournalMode,
    pub hydrate_catalog: bool,
}

impl From<&StoreConfig> for SessionOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            file_extension: config.file_extension.clone(),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            journal_mode: config.journal_mode,
            hydrate_catalog: config.hydrate_catalog,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

/// Session ids become file names: non-empty, ASCII alphanumerics plus
/// `-`, `_` and `.`, not starting with a dot.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.is_empty() {
        return Err(StoreError::validation(
            "invalid session_id: must be a non-empty string",
        ));
    }
    let allowed = session_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !allowed || session_id.starts_with('.') {
        return Err(StoreError::validation(format!(
            "invalid session_id '{session_id}': only letters, digits, '-', '_' and '.' are allowed"
        )));
    }
    Ok(())
}

/// One open session: its connection and the tables it knows about.
pub struct Session {
    id: String,
    path: PathBuf,
    conn: Connection,
    catalog: SchemaCatalog,
}

impl Session {
    pub fn open(id: &str, path: PathBuf, options: &SessionOptions) -> Result<Self> {
        let conn = Connection::open(&path)
            .map_err(|e| StoreError::connection(id, format!("opening {}", path.display()), e))?;
        conn.busy_timeout(options.busy_timeout)
            .map_err(|e| StoreError::connection(id, "setting busy timeout", e))?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = {};
             PRAGMA synchronous  = NORMAL;
             PRAGMA temp_store   = MEMORY;",
            options.journal_mode.pragma_value()
        ))
        .map_err(|e| StoreError::connection(id, "configuring connection", e))?;

        let catalog = if options.hydrate_catalog {
            SchemaCatalog::hydrate(&conn, id)?
        } else {
            SchemaCatalog::new()
        };
        debug!(
            session = id,
            tables = catalog.len(),
            "opened session store {}",
            path.display()
        );

        Ok(Self {
            id: id.to_string(),
            path,
            conn,
            catalog,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// See [`catalog::ensure_table`].
    pub fn ensure_table(&mut self, message: &str, fields: &[String], sample: &Row) -> Result<()> {
        catalog::ensure_table(
            &self.conn,
            &mut self.catalog,
            &self.id,
            message,
            fields,
            sample,
        )
    }
}

/// Owns every open session under one base directory.
///
/// The session map is locked only to look up or insert a session; each session
/// then has its own lock, so work on distinct sessions never contends.
pub struct SessionStore {
    base_dir: PathBuf,
    options: SessionOptions,
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new(base_dir: impl Into<PathBuf>, options: SessionOptions) -> Self {
        Self {
            base_dir: base_dir.into(),
            options,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Store file backing `session_id`.
    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{session_id}.{}", self.options.file_extension))
    }

    /// Run `f` against the session, opening it on first access.
    pub fn with_session<T, F>(&self, session_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let session = self.get_or_open(session_id)?;
        let mut guard = session.lock();
        f(&mut guard)
    }

    fn get_or_open(&self, session_id: &str) -> Result<Arc<Mutex<Session>>> {
        validate_session_id(session_id)?;
        if let Some(existing) = self.sessions.lock().get(session_id) {
            return Ok(Arc::clone(existing));
        }

        // Open outside the map lock.
        std::fs::create_dir_all(&self.base_dir).map_err(|e| {
            StoreError::connection(
                session_id,
                format!("creating store directory {}", self.base_dir.display()),
                e,
            )
        })?;
        let opened = Session::open(session_id, self.session_path(session_id), &self.options)?;
        info!(session = session_id, "session opened");

        let mut sessions = self.sessions.lock();
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(opened)));
        Ok(Arc::clone(entry))
    }

    pub fn is_open(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Open session ids, sorted.
    pub fn open_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Release one session's connection. Unknown ids are ignored.
    pub fn close(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().remove(session_id);
        if removed.is_some() {
            debug!(session = session_id, "closed connection");
        }
        removed.is_some()
    }

    pub fn close_all(&self) {
        let drained: Vec<String> = self.sessions.lock().drain().map(|(id, _)| id).collect();
        info!(count = drained.len(), "all session connections closed");
    }

    /// Session ids that have a store file under the base directory.
    pub fn stored_sessions(&self) -> Vec<String> {
        let suffix = format!(".{}", self.options.file_extension);
        let Ok(entries) = std::fs::read_dir(&self.base_dir) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| name.strip_suffix(&suffix).map(str::to_string))
            .filter(|id| validate_session_id(id).is_ok())
            .collect();
        ids.sort();
        ids
    }
}
