use std::fmt;

/// Error category surfaced to callers of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Connection,
    Schema,
    Query,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Connection => write!(f, "connection"),
            Self::Schema => write!(f, "schema"),
            Self::Query => write!(f, "query"),
        }
    }
}

/// Every fallible store operation returns one of these four kinds, carrying
/// enough context (session, table, field) to locate the failing record.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Malformed input: session id, payload shape, unsupported cell value.
    #[error("validation error: {0}")]
    Validation(String),

    /// The store could not be opened or a statement failed at the storage layer.
    #[error("connection error in session '{session}': {context}: {source}")]
    Connection {
        session: String,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Table creation or structure introspection failed.
    #[error("schema error in session '{session}', table '{table}': {reason}")]
    Schema {
        session: String,
        table: String,
        reason: String,
    },

    /// A read statement failed; `diagnostic` is the store's own message.
    #[error("query error in session '{session}': {diagnostic}")]
    Query { session: String, diagnostic: String },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Schema { .. } => ErrorKind::Schema,
            Self::Query { .. } => ErrorKind::Query,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn connection(
        session: &str,
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Connection {
            session: session.to_string(),
            context: context.into(),
            source: source.into(),
        }
    }

    pub(crate) fn schema(session: &str, table: &str, reason: impl Into<String>) -> Self {
        Self::Schema {
            session: session.to_string(),
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
