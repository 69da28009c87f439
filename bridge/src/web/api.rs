//! REST API handlers

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::Span;
use uuid::Uuid;

use super::state::AppState;
use crate::binder::{self, Params};
use crate::driver::Connector;
use crate::error::{BridgeError, BridgeResult, ClassifiedError, ErrorKind, Redactor};
use crate::executor;
use crate::marshal::{self, Marshaled, RowMap};

/// Response header carrying the affected row count of a DML statement
pub const ROWS_AFFECTED_HEADER: &str = "x-rows-affected";

// ============================================================================
// Request Types
// ============================================================================

/// A parsed `/query` request
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Statement template with `@name` placeholders
    pub text: String,
    pub params: Params,
}

impl QueryRequest {
    /// Parse a raw request body
    ///
    /// Expects `{"query": string, "params"?: {name: scalar}}`. Anything else is
    /// a [`BridgeError::MalformedRequest`].
    pub fn from_body(body: &[u8]) -> BridgeResult<Self> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            BridgeError::MalformedRequest(format!("Request body is not valid JSON: {}", e))
        })?;

        let Value::Object(mut fields) = value else {
            return Err(BridgeError::MalformedRequest(
                "Request body must be a JSON object".to_string(),
            ));
        };

        let text = match fields.remove("query") {
            Some(Value::String(text)) if !text.trim().is_empty() => text,
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(BridgeError::MalformedRequest("No query provided".to_string()))
            }
            Some(_) => {
                return Err(BridgeError::MalformedRequest(
                    "Field 'query' must be a string".to_string(),
                ))
            }
        };

        let params = match fields.remove("params") {
            None | Some(Value::Null) => Params::new(),
            Some(Value::Object(map)) => binder::params_from_json(map)?,
            Some(_) => {
                return Err(BridgeError::MalformedRequest(
                    "Field 'params' must be an object".to_string(),
                ))
            }
        };

        Ok(Self { text, params })
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Liveness response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

/// Connectivity probe response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub success: bool,
    pub message: String,
    pub version: String,
}

/// Successful query response
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub data: Vec<RowMap>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error_type: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlstate: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detailed_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_parameter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expected_parameters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_attempted: Option<String>,
}

impl From<ClassifiedError> for ErrorResponse {
    fn from(err: ClassifiedError) -> Self {
        Self {
            success: false,
            error_type: err.kind,
            message: err.message,
            sqlstate: err.code,
            detailed_errors: err.diagnostics,
            missing_parameter: err.parameter,
            expected_parameters: err.expected,
            query_attempted: err.query,
        }
    }
}

/// HTTP status for each failure class
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MalformedRequest | ErrorKind::MissingParameter => StatusCode::BAD_REQUEST,
        ErrorKind::ConnectionError | ErrorKind::DriverError | ErrorKind::UnknownError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// A classified failure on its way to the caller
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn from_error(err: BridgeError, redactor: &Redactor) -> Self {
        let classified = err.classify(redactor);
        let status = status_for(classified.kind);

        if classified.kind.is_client_error() {
            tracing::warn!(error_type = %classified.kind, "Rejected request: {}", classified.message);
        } else {
            tracing::error!(
                error_type = %classified.kind,
                sqlstate = ?classified.code,
                "Request failed: {}",
                classified.message
            );
        }

        Self {
            status,
            body: ErrorResponse::from(classified),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness probe; never touches the database
pub async fn home() -> Json<StatusResponse> {
    tracing::info!("Home route accessed");
    Json(StatusResponse {
        status: "running".to_string(),
        message: "DB bridge is running".to_string(),
    })
}

/// Connectivity probe: open a session and report the backend version
#[tracing::instrument(name = "test_connection", skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn test_connection(
    State(state): State<AppState>,
) -> Result<Json<VersionResponse>, ApiError> {
    tracing::info!("Test connection route accessed");
    tracing::debug!(
        driver = %state.config.driver,
        "Probing {}",
        state.config.connection_string()
    );

    let connector = state.connector.clone();
    let span = Span::current();
    let version = tokio::task::spawn_blocking(move || {
        span.in_scope(|| executor::probe_version(connector.as_ref()))
    })
    .await
    .map_err(|e| BridgeError::Unknown(format!("Probe worker failed: {}", e)))
    .and_then(|probe| probe)
    .map_err(|e| ApiError::from_error(e, &state.redactor))?;

    tracing::info!("Test connection successful. Version: {}", version);
    Ok(Json(VersionResponse {
        success: true,
        message: "Connection successful".to_string(),
        version,
    }))
}

/// Run a named-parameter statement
#[tracing::instrument(name = "query", skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn execute_query(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    tracing::info!("/query endpoint hit");

    let request =
        QueryRequest::from_body(&body).map_err(|e| ApiError::from_error(e, &state.redactor))?;
    tracing::debug!(
        params = request.params.len(),
        "Received query: {}",
        state.redactor.redact(&request.text)
    );

    let connector = state.connector.clone();
    let span = Span::current();
    let marshaled = tokio::task::spawn_blocking(move || {
        span.in_scope(|| run_query(connector.as_ref(), &request))
    })
    .await
    .map_err(|e| BridgeError::Unknown(format!("Query worker failed: {}", e)))
    .and_then(|run| run)
    .map_err(|e| ApiError::from_error(e, &state.redactor))?;

    Ok(query_response(marshaled))
}

/// Bind, execute and marshal one request
///
/// Binding happens before any session is opened, so a missing parameter
/// never touches the database.
pub fn run_query(connector: &dyn Connector, request: &QueryRequest) -> BridgeResult<Marshaled> {
    let bound = binder::bind(&request.text, &request.params)?;
    tracing::debug!(placeholders = bound.values.len(), "Statement bound");

    let outcome = executor::execute(connector, &bound).map_err(|e| e.with_query(&request.text))?;
    let marshaled = marshal::marshal(outcome);

    match marshaled.rows_affected {
        Some(count) => tracing::info!("Query executed successfully. Rows affected: {}", count),
        None => tracing::info!(
            "Query executed successfully. Rows fetched: {}",
            marshaled.data.len()
        ),
    }

    Ok(marshaled)
}

fn query_response(marshaled: Marshaled) -> Response {
    let Marshaled {
        data,
        rows_affected,
    } = marshaled;

    let mut response = Json(QueryResponse {
        success: true,
        data,
    })
    .into_response();

    if let Some(count) = rows_affected {
        response.headers_mut().insert(
            HeaderName::from_static(ROWS_AFFECTED_HEADER),
            HeaderValue::from(count),
        );
    }

    response
}
