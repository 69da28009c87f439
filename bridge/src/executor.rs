//! Query execution
//!
//! Each call opens its own session, runs one bound statement inside an
//! explicit transaction and releases the session before returning. The
//! session is released exactly once on every path, including unwinding.

use crate::binder::BoundStatement;
use crate::driver::{Connector, DriverFailure, ExecutionOutcome, Session};
use crate::error::{BridgeError, BridgeResult};

/// A session that is rolled back and closed when it goes out of scope
pub struct ScopedSession {
    inner: Option<Box<dyn Session>>,
    in_transaction: bool,
}

impl ScopedSession {
    /// Open a session, classifying failure as a connection error
    pub fn open(connector: &dyn Connector) -> BridgeResult<Self> {
        let session = connector.connect().map_err(BridgeError::Connection)?;
        Ok(Self {
            inner: Some(session),
            in_transaction: false,
        })
    }

    fn session(&mut self) -> Result<&mut (dyn Session + 'static), DriverFailure> {
        self.inner
            .as_deref_mut()
            .ok_or_else(|| DriverFailure::new("session already released"))
    }

    pub fn begin(&mut self) -> Result<(), DriverFailure> {
        self.session()?.begin()?;
        self.in_transaction = true;
        Ok(())
    }

    pub fn run(&mut self, bound: &BoundStatement) -> Result<ExecutionOutcome, DriverFailure> {
        self.session()?.run(&bound.rewritten_text, &bound.values)
    }

    pub fn commit(&mut self) -> Result<(), DriverFailure> {
        self.session()?.commit()?;
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back the open transaction, if any
    pub fn rollback(&mut self) -> Result<(), DriverFailure> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.session()?.rollback()
    }

    pub fn server_version(&mut self) -> Result<String, DriverFailure> {
        self.session()?.server_version()
    }

    /// Roll back anything still open and close the session
    pub fn release(mut self) -> Result<(), DriverFailure> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), DriverFailure> {
        let Some(mut session) = self.inner.take() else {
            return Ok(());
        };

        if self.in_transaction {
            self.in_transaction = false;
            if let Err(e) = session.rollback() {
                tracing::warn!(code = ?e.code, "Rollback on release failed");
            }
        }

        session.close()
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if self.inner.is_some() {
            tracing::warn!("Session dropped without release, closing");
        }
        if let Err(e) = self.finish() {
            tracing::warn!(code = ?e.code, "Failed to close session");
        }
    }
}

fn run_in_transaction(
    session: &mut ScopedSession,
    bound: &BoundStatement,
) -> Result<ExecutionOutcome, DriverFailure> {
    session.begin()?;
    let outcome = session.run(bound)?;

    match &outcome {
        ExecutionOutcome::Rows(set) => {
            tracing::debug!(rows = set.rows.len(), "Fetched result set");
        }
        ExecutionOutcome::Affected(count) => {
            session.commit()?;
            tracing::debug!(rows_affected = count, "Committed");
        }
    }

    Ok(outcome)
}

/// Execute a bound statement on a fresh session
///
/// Row-returning statements are never committed: their transaction is
/// rolled back when the session is released. Statements without result
/// columns are committed. On any failure the transaction is rolled back
/// before the session is released and the failure is returned as
/// [`BridgeError::Driver`].
pub fn execute(connector: &dyn Connector, bound: &BoundStatement) -> BridgeResult<ExecutionOutcome> {
    let mut session = ScopedSession::open(connector)?;

    match run_in_transaction(&mut session, bound) {
        Ok(outcome) => {
            if let Err(e) = session.release() {
                tracing::warn!(code = ?e.code, "Failed to release session after success");
            }
            Ok(outcome)
        }
        Err(failure) => {
            match session.rollback() {
                Ok(()) => tracing::warn!(code = ?failure.code, "Statement failed, transaction rolled back"),
                Err(e) => tracing::warn!(code = ?e.code, "Statement failed and rollback failed"),
            }
            if let Err(e) = session.release() {
                tracing::warn!(code = ?e.code, "Failed to release session after failure");
            }
            Err(BridgeError::driver(failure))
        }
    }
}

/// Report the backend version string, releasing the session regardless
pub fn probe_version(connector: &dyn Connector) -> BridgeResult<String> {
    let mut session = ScopedSession::open(connector)?;
    let version = session.server_version();
    if let Err(e) = session.release() {
        tracing::warn!(code = ?e.code, "Failed to release probe session");
    }
    version.map_err(BridgeError::driver)
}
