//! Database driver seam
//!
//! The executor only sees these traits. A [`Connector`] opens one
//! exclusively-owned [`Session`] per call; sessions are never shared or pooled.

pub mod sqlite;

use chrono::NaiveDateTime;
use std::sync::Arc;

use crate::binder::ParamValue;
use crate::config::{ConfigError, DatabaseConfig, DriverKind};

pub use sqlite::SqliteConnector;

/// A cell value as produced by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Exact decimal digits as the backend printed them
    ///
    /// For backends with a native fixed-point type. SQLite stores numerics
    /// as INTEGER, REAL or TEXT and never yields this.
    Decimal(String),
    /// For backends with a native date-time type. SQLite keeps date-times
    /// as TEXT, which passes through unchanged.
    Timestamp(NaiveDateTime),
}

/// Column names plus the fully fetched rows of a result set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// What running a statement produced
///
/// `Rows` whenever the backend reported result columns for the statement,
/// `Affected` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Rows(RowSet),
    Affected(u64),
}

/// A backend failure with its diagnostic chain
#[derive(Debug, Clone, PartialEq)]
pub struct DriverFailure {
    pub message: String,
    /// Backend state code, when the backend has one
    pub code: Option<String>,
    /// Ordered sub-messages supplied with the failure
    pub diagnostics: Vec<String>,
}

impl DriverFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<String>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

impl std::fmt::Display for DriverFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Opens database sessions
pub trait Connector: Send + Sync {
    /// Driver identifier, for logging
    fn name(&self) -> &str;

    /// Open a new session owned by the caller
    fn connect(&self) -> Result<Box<dyn Session>, DriverFailure>;
}

/// One open database connection
pub trait Session: Send {
    /// Start an explicit transaction
    fn begin(&mut self) -> Result<(), DriverFailure>;

    /// Execute `sql`, binding `values` positionally, fetching all rows eagerly
    fn run(&mut self, sql: &str, values: &[ParamValue]) -> Result<ExecutionOutcome, DriverFailure>;

    fn commit(&mut self) -> Result<(), DriverFailure>;

    fn rollback(&mut self) -> Result<(), DriverFailure>;

    /// Human-readable backend version string
    fn server_version(&mut self) -> Result<String, DriverFailure>;

    /// Close the connection
    fn close(self: Box<Self>) -> Result<(), DriverFailure>;
}

/// Build the connector named by the configured driver identifier
pub fn connector_for(config: &DatabaseConfig) -> Result<Arc<dyn Connector>, ConfigError> {
    match config.driver_kind()? {
        DriverKind::Sqlite => Ok(Arc::new(SqliteConnector::from_config(config))),
    }
}
