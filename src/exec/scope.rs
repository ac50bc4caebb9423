//! Pooled connection scope and single-owner transactions.

use std::sync::Arc;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::NoTls;
use tracing::{debug, warn};

use crate::error::{GridError, GridResult, SqlError};
use crate::exec::connection::ConnectionConfig;
use crate::sql::dialect::{PostgresDialect, SqlDialect};

/// Shared handle to one database: a connection pool plus the dialect that
/// generates SQL for it. Cheap to clone, safe to share across tasks.
#[derive(Clone)]
pub struct DbScope {
    pool: Pool,
    dialect: Arc<dyn SqlDialect>,
    label: String,
}

impl DbScope {
    pub fn connect(config: &ConnectionConfig) -> GridResult<Self> {
        Self::with_dialect(config, Arc::new(PostgresDialect))
    }

    pub fn with_dialect(
        config: &ConnectionConfig,
        dialect: Arc<dyn SqlDialect>,
    ) -> GridResult<Self> {
        let pg_config: tokio_postgres::Config = config
            .connection_string()
            .parse()
            .map_err(|e| GridError::Config(format!("invalid connection parameters: {e}")))?;
        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = match config.tls()? {
            Some(tls) => Manager::from_config(pg_config, tls, manager_config),
            None => Manager::from_config(pg_config, NoTls, manager_config),
        };
        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| GridError::Config(format!("cannot build connection pool: {e}")))?;
        Ok(Self {
            pool,
            dialect,
            label: config.display_string(),
        })
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        &*self.dialect
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Acquire a pooled connection, waiting if the pool is exhausted.
    pub async fn connection(&self) -> GridResult<Object> {
        self.pool.get().await.map_err(|e| {
            GridError::from(SqlError::connection(format!(
                "cannot acquire connection to {}: {e}",
                self.label
            )))
        })
    }

    /// Begin a transaction on a dedicated connection. The transaction must
    /// be explicitly committed or rolled back.
    pub async fn transaction(&self) -> GridResult<ScopedTransaction> {
        let conn = self.connection().await?;
        conn.batch_execute("BEGIN")
            .await
            .map_err(|e| SqlError::from_pg(e, Some("BEGIN")))?;
        debug!(scope = %self.label, "transaction started");
        Ok(ScopedTransaction {
            conn: Some(conn),
            open: true,
            on_commit: Vec::new(),
            on_rollback: Vec::new(),
        })
    }
}

impl std::fmt::Debug for DbScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbScope").field("label", &self.label).finish()
    }
}

/// A transaction owning its connection for its whole lifetime.
///
/// Post-commit and post-rollback hooks run exactly once, after the database
/// has acknowledged the outcome. Dropping an open transaction rolls it back
/// on a background task and runs the rollback hooks.
pub struct ScopedTransaction {
    conn: Option<Object>,
    open: bool,
    on_commit: Vec<Box<dyn FnOnce() + Send>>,
    on_rollback: Vec<Box<dyn FnOnce() + Send>>,
}

impl ScopedTransaction {
    pub fn client(&self) -> &tokio_postgres::Client {
        match &self.conn {
            Some(conn) => conn,
            // conn is only taken by commit/rollback, which consume self
            None => unreachable!("transaction already finished"),
        }
    }

    pub fn on_commit(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.on_commit.push(Box::new(hook));
    }

    pub fn on_rollback(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.on_rollback.push(Box::new(hook));
    }

    pub async fn commit(mut self) -> GridResult<()> {
        self.open = false;
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.batch_execute("COMMIT").await {
                // A failed COMMIT leaves the transaction aborted server-side.
                for hook in self.on_rollback.drain(..) {
                    hook();
                }
                return Err(SqlError::from_pg(e, Some("COMMIT")).into());
            }
        }
        for hook in self.on_commit.drain(..) {
            hook();
        }
        Ok(())
    }

    pub async fn rollback(mut self) -> GridResult<()> {
        self.open = false;
        if let Some(conn) = self.conn.take() {
            conn.batch_execute("ROLLBACK")
                .await
                .map_err(|e| SqlError::from_pg(e, Some("ROLLBACK")))?;
        }
        for hook in self.on_rollback.drain(..) {
            hook();
        }
        Ok(())
    }
}

impl Drop for ScopedTransaction {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        warn!("transaction dropped without commit, rolling back");
        for hook in self.on_rollback.drain(..) {
            hook();
        }
        if let Some(conn) = self.conn.take() {
            tokio::spawn(async move {
                if let Err(e) = conn.batch_execute("ROLLBACK").await {
                    warn!(error = %e, "rollback of abandoned transaction failed");
                }
            });
        }
    }
}
