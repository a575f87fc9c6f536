//! Database layer for Paper Curator
//!
//! Provides:
//! - SeaORM entity models
//! - The shared [`Database`] handle built once at startup
//! - Request-scoped [`DbSession`]s that are released on every exit path
//! - The paper repository

pub mod models;
mod repository;

pub use repository::PaperRepository;

use crate::config::Settings;
use crate::errors::{AppError, Result};
use crate::metrics;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database as SeaDatabase, DatabaseConnection,
    DatabaseTransaction, TransactionTrait,
};
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared database handle
///
/// Cloning is cheap and every clone refers to the same pool and the same
/// session counter.
#[derive(Clone)]
pub struct Database {
    conn: Arc<DatabaseConnection>,
    active_sessions: Arc<AtomicUsize>,
}

impl Database {
    /// Connect to PostgreSQL using the pool settings
    pub async fn connect(settings: &Settings) -> Result<Self> {
        info!(
            max_connections = settings.database_max_connections(),
            echo_sql = settings.postgres_echo_sql,
            "Connecting to database..."
        );

        let mut opts = ConnectOptions::new(&settings.postgres_database_url);
        opts
            .max_connections(settings.database_max_connections())
            .connect_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .sqlx_logging(settings.postgres_echo_sql);

        let conn = SeaDatabase::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self::from_connection(conn))
    }

    /// Wrap an already established connection
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self {
            conn: Arc::new(conn),
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The underlying pooled connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }

    /// Open a session (a database transaction)
    ///
    /// The session is rolled back and released when dropped unless it was
    /// committed first. Errors from the pool are returned unchanged.
    pub async fn session(&self) -> Result<DbSession> {
        let txn = self.conn.begin().await?;

        let id = Uuid::new_v4();
        let active = self.active_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_sessions(active, true);
        debug!(session_id = %id, active, "Database session opened");

        Ok(DbSession {
            id,
            txn,
            _lease: SessionLease {
                session_id: id,
                active: self.active_sessions.clone(),
            },
        })
    }

    /// Run `f` inside a session: commit on `Ok`, roll back on `Err`
    pub async fn with_session<F, T>(&self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c DbSession) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'c>>
            + Send,
        T: Send,
    {
        let session = self.session().await?;

        match f(&session).await {
            Ok(value) => {
                session.commit().await?;
                Ok(value)
            }
            Err(e) => {
                let session_id = session.id();
                if let Err(rollback_err) = session.rollback().await {
                    warn!(%session_id, error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Number of sessions currently open
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Close the pool
    ///
    /// Only the last handle closes it. While other clones are alive the pool
    /// stays open and is closed when the final clone is dropped.
    pub async fn teardown(self) -> Result<()> {
        let open = self.active_sessions();
        if open > 0 {
            warn!(open, "Closing database with sessions still open");
        }
        match Arc::try_unwrap(self.conn) {
            Ok(conn) => {
                conn.close().await?;
                info!("Database connections closed");
            }
            Err(shared) => {
                warn!(
                    handles = Arc::strong_count(&shared),
                    "Database handle still shared, pool closes when the last clone drops"
                );
            }
        }
        Ok(())
    }
}

/// A unit of work owned by a single request
pub struct DbSession {
    id: Uuid,
    txn: DatabaseTransaction,
    // Declared last so the transaction is dropped (rolled back) first.
    _lease: SessionLease,
}

impl DbSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The transaction to run queries on
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commit the session's work and release it
    pub async fn commit(self) -> Result<()> {
        let DbSession { id, txn, _lease } = self;
        txn.commit().await.map_err(|e| AppError::Transaction {
            message: format!("Commit of session {} failed: {}", id, e),
        })
    }

    /// Discard the session's work and release it
    pub async fn rollback(self) -> Result<()> {
        let DbSession { id, txn, _lease } = self;
        txn.rollback().await.map_err(|e| AppError::Transaction {
            message: format!("Rollback of session {} failed: {}", id, e),
        })
    }
}

impl Deref for DbSession {
    type Target = DatabaseTransaction;

    fn deref(&self) -> &Self::Target {
        &self.txn
    }
}

impl std::fmt::Debug for DbSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbSession").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Decrements the open-session count exactly once, when dropped
struct SessionLease {
    session_id: Uuid,
    active: Arc<AtomicUsize>,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let remaining = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_sessions(remaining, false);
        debug!(session_id = %self.session_id, active = remaining, "Database session released");
    }
}
