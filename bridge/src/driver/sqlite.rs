//! SQLite backend
//!
//! Positional `?` binding through rusqlite. The configured database name is
//! the path of an existing database file.

use rusqlite::ffi;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Batch, Connection, OpenFlags, ToSql};
use std::path::PathBuf;
use std::time::Duration;

use super::{Connector, DriverFailure, ExecutionOutcome, RowSet, Session, SqlValue};
use crate::binder::ParamValue;
use crate::config::DatabaseConfig;

/// Opens SQLite sessions against one database file
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(&config.database, config.busy_timeout)
    }
}

impl Connector for SqliteConnector {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn connect(&self) -> Result<Box<dyn Session>, DriverFailure> {
        // No SQLITE_OPEN_CREATE: a wrong path must fail rather than create an empty database
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags).map_err(failure_from)?;
        conn.busy_timeout(self.busy_timeout).map_err(failure_from)?;

        tracing::debug!("Opened SQLite session on {:?}", self.path);
        Ok(Box::new(SqliteSession { conn }))
    }
}

struct SqliteSession {
    conn: Connection,
}

impl Session for SqliteSession {
    fn begin(&mut self) -> Result<(), DriverFailure> {
        self.conn
            .execute_batch("BEGIN DEFERRED")
            .map_err(failure_from)
    }

    fn run(&mut self, sql: &str, values: &[ParamValue]) -> Result<ExecutionOutcome, DriverFailure> {
        let mut batch = Batch::new(&self.conn, sql);

        // Only whitespace and comments
        let Some(mut stmt) = batch.next().map_err(failure_from)? else {
            return Ok(ExecutionOutcome::Affected(0));
        };

        // Every statement after the first is compiled, never run
        if batch.next().map_err(failure_from)?.is_some() {
            return Err(DriverFailure::new(
                "Multiple statements provided; send one statement per request",
            )
            .with_code(state_code(ffi::SQLITE_MISUSE)));
        }

        if stmt.column_count() == 0 {
            let affected = stmt
                .execute(params_from_iter(values.iter()))
                .map_err(failure_from)?;
            return Ok(ExecutionOutcome::Affected(affected as u64));
        }

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();

        let mut rows = stmt
            .query(params_from_iter(values.iter()))
            .map_err(failure_from)?;
        let mut fetched = Vec::new();
        while let Some(row) = rows.next().map_err(failure_from)? {
            let mut cells = Vec::with_capacity(width);
            for idx in 0..width {
                let value: Value = row.get(idx).map_err(failure_from)?;
                cells.push(SqlValue::from(value));
            }
            fetched.push(cells);
        }

        Ok(ExecutionOutcome::Rows(RowSet {
            columns,
            rows: fetched,
        }))
    }

    fn commit(&mut self) -> Result<(), DriverFailure> {
        self.conn.execute_batch("COMMIT").map_err(failure_from)
    }

    fn rollback(&mut self) -> Result<(), DriverFailure> {
        self.conn.execute_batch("ROLLBACK").map_err(failure_from)
    }

    fn server_version(&mut self) -> Result<String, DriverFailure> {
        let version: String = self
            .conn
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))
            .map_err(failure_from)?;
        Ok(format!("SQLite {}", version))
    }

    fn close(self: Box<Self>) -> Result<(), DriverFailure> {
        self.conn.close().map_err(|(_, e)| failure_from(e))
    }
}

impl ToSql for ParamValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ParamValue::Null => ToSqlOutput::Owned(Value::Null),
            ParamValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            ParamValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            ParamValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            ParamValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Integer(i),
            Value::Real(f) => SqlValue::Real(f),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Blob(b),
        }
    }
}

/// Symbolic name for a SQLite result code
fn code_name(code: i32) -> Option<&'static str> {
    let name = match code {
        ffi::SQLITE_CONSTRAINT_UNIQUE => "SQLITE_CONSTRAINT_UNIQUE",
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY => "SQLITE_CONSTRAINT_PRIMARYKEY",
        ffi::SQLITE_CONSTRAINT_NOTNULL => "SQLITE_CONSTRAINT_NOTNULL",
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => "SQLITE_CONSTRAINT_FOREIGNKEY",
        ffi::SQLITE_CONSTRAINT_CHECK => "SQLITE_CONSTRAINT_CHECK",
        ffi::SQLITE_CONSTRAINT_TRIGGER => "SQLITE_CONSTRAINT_TRIGGER",
        ffi::SQLITE_ERROR => "SQLITE_ERROR",
        ffi::SQLITE_INTERNAL => "SQLITE_INTERNAL",
        ffi::SQLITE_PERM => "SQLITE_PERM",
        ffi::SQLITE_ABORT => "SQLITE_ABORT",
        ffi::SQLITE_BUSY => "SQLITE_BUSY",
        ffi::SQLITE_LOCKED => "SQLITE_LOCKED",
        ffi::SQLITE_NOMEM => "SQLITE_NOMEM",
        ffi::SQLITE_READONLY => "SQLITE_READONLY",
        ffi::SQLITE_INTERRUPT => "SQLITE_INTERRUPT",
        ffi::SQLITE_IOERR => "SQLITE_IOERR",
        ffi::SQLITE_CORRUPT => "SQLITE_CORRUPT",
        ffi::SQLITE_FULL => "SQLITE_FULL",
        ffi::SQLITE_CANTOPEN => "SQLITE_CANTOPEN",
        ffi::SQLITE_SCHEMA => "SQLITE_SCHEMA",
        ffi::SQLITE_TOOBIG => "SQLITE_TOOBIG",
        ffi::SQLITE_CONSTRAINT => "SQLITE_CONSTRAINT",
        ffi::SQLITE_MISMATCH => "SQLITE_MISMATCH",
        ffi::SQLITE_MISUSE => "SQLITE_MISUSE",
        ffi::SQLITE_AUTH => "SQLITE_AUTH",
        ffi::SQLITE_RANGE => "SQLITE_RANGE",
        ffi::SQLITE_NOTADB => "SQLITE_NOTADB",
        _ => return None,
    };
    Some(name)
}

/// State code for an extended result code, falling back to its primary code
fn state_code(extended: i32) -> String {
    code_name(extended)
        .or_else(|| code_name(extended & 0xff))
        .map(str::to_string)
        .unwrap_or_else(|| extended.to_string())
}

fn failure_from(err: rusqlite::Error) -> DriverFailure {
    match &err {
        rusqlite::Error::SqliteFailure(code, detail) => {
            let mut diagnostics = Vec::new();
            if let Some(detail) = detail {
                diagnostics.push(detail.clone());
            }
            diagnostics.push(ffi::code_to_str(code.extended_code).to_string());

            DriverFailure::new(err.to_string())
                .with_code(state_code(code.extended_code))
                .with_diagnostics(diagnostics)
        }
        other => DriverFailure::new(other.to_string()),
    }
}
