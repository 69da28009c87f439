//! Shared fixtures for the e2e tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use db_bridge::binder::ParamValue;
use db_bridge::config::DatabaseConfig;
use db_bridge::driver::{Connector, DriverFailure, ExecutionOutcome, Session, SqliteConnector};
use db_bridge::web::{self, state::AppState};
use rusqlite::Connection;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

// ============================================================================
// Database fixture
// ============================================================================

/// A seeded SQLite database in a temporary directory
pub struct TestDb {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("bridge.db");
        let conn = Connection::open(&path).expect("Failed to create database");
        conn.execute_batch(
            r#"
            CREATE TABLE Users (
                Id INTEGER PRIMARY KEY,
                Username TEXT NOT NULL UNIQUE,
                Age INTEGER,
                Active INTEGER NOT NULL DEFAULT 1,
                Avatar BLOB,
                Score REAL
            );
            INSERT INTO Users (Id, Username, Age, Active, Avatar, Score)
                VALUES (1, 'admin', 40, 1, x'CAFE', 9.5);
            INSERT INTO Users (Id, Username, Age, Active, Avatar, Score)
                VALUES (2, 'guest', 25, 0, NULL, NULL);

            CREATE TABLE T (Id INTEGER PRIMARY KEY, X INTEGER NOT NULL);
            INSERT INTO T (Id, X) VALUES (1, 0);
            INSERT INTO T (Id, X) VALUES (2, 0);
            "#,
        )
        .expect("Failed to seed database");

        Self { _dir: dir, path }
    }

    pub fn config(&self) -> DatabaseConfig {
        DatabaseConfig::sqlite(self.path.to_string_lossy().to_string())
    }

    /// Read a single integer with a separate connection
    pub fn scalar(&self, sql: &str) -> i64 {
        let conn = Connection::open(&self.path).expect("Failed to open database");
        conn.query_row(sql, [], |row| row.get(0))
            .expect("Scalar query failed")
    }
}

// ============================================================================
// Counting connector
// ============================================================================

/// Wraps a connector and counts session opens and closes
pub struct CountingConnector {
    inner: Box<dyn Connector>,
    pub attempts: Arc<AtomicUsize>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl CountingConnector {
    pub fn sqlite(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            inner: Box::new(SqliteConnector::new(path, Duration::from_secs(2))),
            attempts: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connector for CountingConnector {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn connect(&self) -> Result<Box<dyn Session>, DriverFailure> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let session = self.inner.connect()?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSession {
            inner: session,
            closed: self.closed.clone(),
        }))
    }
}

struct CountingSession {
    inner: Box<dyn Session>,
    closed: Arc<AtomicUsize>,
}

impl Session for CountingSession {
    fn begin(&mut self) -> Result<(), DriverFailure> {
        self.inner.begin()
    }

    fn run(&mut self, sql: &str, values: &[ParamValue]) -> Result<ExecutionOutcome, DriverFailure> {
        self.inner.run(sql, values)
    }

    fn commit(&mut self) -> Result<(), DriverFailure> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), DriverFailure> {
        self.inner.rollback()
    }

    fn server_version(&mut self) -> Result<String, DriverFailure> {
        self.inner.server_version()
    }

    fn close(self: Box<Self>) -> Result<(), DriverFailure> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close()
    }
}

// ============================================================================
// App and requests
// ============================================================================

/// Build the router around a connector
pub fn app(config: DatabaseConfig, connector: Arc<dyn Connector>) -> Router {
    web::create_router(AppState::new(Arc::new(config), connector))
}

/// Build the router plus a counting connector on the fixture database
pub fn counted_app(db: &TestDb) -> (Router, Arc<CountingConnector>) {
    let connector = CountingConnector::sqlite(&db.path);
    (app(db.config(), connector.clone()), connector)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn post_raw(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .expect("Failed to build request")
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    post_raw(uri, &body.to_string())
}

/// Response status, headers and JSON body
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(app: Router, request: Request<Body>) -> TestResponse {
    let response = app
        .oneshot(request)
        .await
        .expect("Failed to execute request");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    let body = serde_json::from_slice(&bytes).expect("Response body is not JSON");
    TestResponse {
        status,
        headers,
        body,
    }
}
