//! Shared application state

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::driver::Connector;
use crate::error::Redactor;

/// Read-only state shared by every request
#[derive(Clone)]
pub struct AppState {
    /// Opens one session per request
    pub connector: Arc<dyn Connector>,
    /// Configuration snapshot resolved at startup
    pub config: Arc<DatabaseConfig>,
    /// Scrubs the configured credentials out of error text
    pub redactor: Arc<Redactor>,
}

impl AppState {
    pub fn new(config: Arc<DatabaseConfig>, connector: Arc<dyn Connector>) -> Self {
        let redactor = Arc::new(config.redactor());
        Self {
            connector,
            config,
            redactor,
        }
    }
}
