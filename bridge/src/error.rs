//! Error taxonomy and normalization
//!
//! Every failure in the bridge is a [`BridgeError`]. Before leaving the
//! process it is turned into a [`ClassifiedError`], which has a stable shape
//! and has been scrubbed of credentials by a [`Redactor`].

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

use crate::driver::DriverFailure;

/// Replacement text for redacted secrets
pub const MASK: &str = "***";

/// Errors produced while serving a request
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Body not parseable, or no statement supplied
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The template references a name the caller did not supply
    #[error("missing parameter '{name}' (expected: {})", .expected.join(", "))]
    MissingParameter {
        /// First referenced name without a value
        name: String,
        /// Every distinct name the template references
        expected: Vec<String>,
    },

    /// A database session could not be established
    #[error("database connection failed: {0}")]
    Connection(DriverFailure),

    /// The backend rejected or failed the statement
    #[error("query execution failed: {failure}")]
    Driver {
        failure: DriverFailure,
        /// Statement template that was being executed
        query: Option<String>,
    },

    /// Anything not covered above
    #[error("{0}")]
    Unknown(String),
}

impl BridgeError {
    /// Wrap an execution-time failure
    pub fn driver(failure: DriverFailure) -> Self {
        Self::Driver {
            failure,
            query: None,
        }
    }

    /// Attach the statement template to a driver failure
    pub fn with_query(self, template: &str) -> Self {
        match self {
            Self::Driver { failure, .. } => Self::Driver {
                failure,
                query: Some(template.to_string()),
            },
            other => other,
        }
    }

    /// The taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedRequest(_) => ErrorKind::MalformedRequest,
            Self::MissingParameter { .. } => ErrorKind::MissingParameter,
            Self::Connection(_) => ErrorKind::ConnectionError,
            Self::Driver { .. } => ErrorKind::DriverError,
            Self::Unknown(_) => ErrorKind::UnknownError,
        }
    }

    /// Normalize into the transport shape, redacting every message
    pub fn classify(&self, redactor: &Redactor) -> ClassifiedError {
        let kind = self.kind();
        let mut classified = ClassifiedError {
            kind,
            message: redactor.redact(&self.to_string()),
            code: None,
            diagnostics: Vec::new(),
            parameter: None,
            expected: Vec::new(),
            query: None,
        };

        match self {
            Self::MalformedRequest(detail) => {
                classified.message = redactor.redact(detail);
            }
            Self::MissingParameter { name, expected } => {
                classified.message = format!("Missing value for parameter '@{}'", name);
                classified.parameter = Some(name.clone());
                classified.expected = expected.clone();
            }
            Self::Connection(failure) => {
                classified.message =
                    redactor.redact(&format!("Database connection failed: {}", failure.message));
                classified.apply_failure(failure, redactor);
            }
            Self::Driver { failure, query } => {
                classified.message =
                    redactor.redact(&format!("Query execution failed: {}", failure.message));
                classified.apply_failure(failure, redactor);
                classified.query = query.as_deref().map(|q| redactor.redact(q));
            }
            Self::Unknown(_) => {}
        }

        classified
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failure classes exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedRequest,
    MissingParameter,
    ConnectionError,
    DriverError,
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedRequest => "malformed_request",
            Self::MissingParameter => "missing_parameter",
            Self::ConnectionError => "connection_error",
            Self::DriverError => "driver_error",
            Self::UnknownError => "unknown_error",
        }
    }

    /// Whether the caller, rather than the backend, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedRequest | Self::MissingParameter)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure in its transport shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    /// Backend-supplied state code
    pub code: Option<String>,
    /// Backend diagnostic chain, only when it has more than one entry
    pub diagnostics: Vec<String>,
    /// Offending name for `MissingParameter`
    pub parameter: Option<String>,
    /// Every name the template expected, for `MissingParameter`
    pub expected: Vec<String>,
    /// Template being executed when a driver error occurred
    pub query: Option<String>,
}

impl ClassifiedError {
    fn apply_failure(&mut self, failure: &DriverFailure, redactor: &Redactor) {
        self.code = failure.code.clone();
        if failure.diagnostics.len() > 1 {
            self.diagnostics = failure
                .diagnostics
                .iter()
                .map(|d| redactor.redact(d))
                .collect();
        }
    }
}

fn credential_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?P<key>PWD|Password)\s*=\s*[^;\s]*")
            .expect("credential pattern is valid")
    })
}

/// Scrubs credentials out of text bound for logs or callers
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secret: Option<String>,
}

impl Redactor {
    /// Build a redactor that also masks the given literal secret
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }

    pub fn redact(&self, text: &str) -> String {
        let masked = match &self.secret {
            Some(secret) => text.replace(secret.as_str(), MASK),
            None => text.to_string(),
        };
        credential_pattern()
            .replace_all(&masked, format!("${{key}}={}", MASK).as_str())
            .into_owned()
    }
}
