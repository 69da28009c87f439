//! Configuration for the DB bridge
//!
//! The configuration is resolved once at startup and shared read-only
//! (behind an `Arc`) with every request. Nothing here is read from the
//! environment at request time.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::error::{Redactor, MASK};

/// Errors in the resolved configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The driver identifier does not name a supported backend
    #[error("unsupported database driver '{0}' (supported: sqlite)")]
    UnsupportedDriver(String),

    /// A yes/no flag had some other value
    #[error("invalid flag value '{0}' (expected yes/no, true/false, on/off or 1/0)")]
    InvalidFlag(String),
}

/// Top-level bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address the HTTP server listens on
    pub listen: SocketAddr,
    /// Database connection settings
    pub database: DatabaseConfig,
}

/// Backends the bridge can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Sqlite,
}

impl FromStr for DriverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .trim_start_matches('{')
            .trim_end_matches('}')
            .to_ascii_lowercase();
        match normalized.as_str() {
            "sqlite" | "sqlite3" | "rusqlite" => Ok(Self::Sqlite),
            _ => Err(ConfigError::UnsupportedDriver(s.to_string())),
        }
    }
}

/// Database connection settings
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Driver identifier
    pub driver: String,
    /// Server address (informational for file-based backends)
    pub server: String,
    /// Database name; for SQLite, the database file path
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Use integrated authentication when no credentials are configured
    pub trusted_connection: bool,
    pub trust_server_certificate: bool,
    /// How long a session waits on a locked database before failing
    pub busy_timeout: Duration,
}

/// Username/password pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

fn default_busy_timeout() -> Duration {
    Duration::from_secs(5)
}

impl DatabaseConfig {
    /// Create a config for a SQLite database file
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: "sqlite".to_string(),
            database: path.into(),
            ..Self::default()
        }
    }

    pub fn driver_kind(&self) -> Result<DriverKind, ConfigError> {
        self.driver.parse()
    }

    /// Credentials, only when both username and password are present
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Credentials { username, password })
            }
            _ => None,
        }
    }

    /// Connection string for display, with the password masked
    pub fn connection_string(&self) -> String {
        let trust_cert = yes_no(self.trust_server_certificate);
        match self.credentials() {
            Some(creds) => format!(
                "DRIVER={};SERVER={};DATABASE={};UID={};PWD={};TrustServerCertificate={};",
                self.driver, self.server, self.database, creds.username, MASK, trust_cert
            ),
            None => format!(
                "DRIVER={};SERVER={};DATABASE={};Trusted_Connection={};TrustServerCertificate={};",
                self.driver,
                self.server,
                self.database,
                yes_no(self.trusted_connection),
                trust_cert
            ),
        }
    }

    /// Redactor masking this configuration's password
    pub fn redactor(&self) -> Redactor {
        Redactor::new(self.password.as_deref())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "sqlite".to_string(),
            server: "localhost".to_string(),
            database: "bridge.db".to_string(),
            username: None,
            password: None,
            trusted_connection: true,
            trust_server_certificate: true,
            busy_timeout: default_busy_timeout(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| MASK))
            .field("trusted_connection", &self.trusted_connection)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Parse the yes/no style flags used by the `DB_*` environment variables
pub fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Ok(true),
        "no" | "false" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidFlag(value.to_string())),
    }
}
