//! DB Bridge
//!
//! HTTP bridge between callers that speak named-parameter SQL templates and a
//! database driver that binds positionally.
//!
//! A request flows binder → executor → marshal; any failure is normalized by
//! [`error::BridgeError::classify`] before it reaches the caller.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use db_bridge::{config::DatabaseConfig, driver, web};
//! use std::sync::Arc;
//!
//! let config = Arc::new(DatabaseConfig::sqlite("bridge.db"));
//! let connector = driver::connector_for(&config)?;
//! let router = web::create_router(web::state::AppState::new(config, connector));
//! ```

pub mod binder;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod init;
pub mod marshal;
pub mod web;

// Re-export the types most callers need
pub use binder::{bind, BoundStatement, ParamValue, Params};
pub use config::{BridgeConfig, DatabaseConfig};
pub use driver::{Connector, ExecutionOutcome, Session};
pub use error::{BridgeError, ClassifiedError, ErrorKind};
