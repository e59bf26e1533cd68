//! Connection pool service.
//!
//! [`Database`] owns the process-wide pool. It is created once by the composition
//! root and handed to repositories; there is no global instance. Establishing the
//! pool retries a bounded number of times, since the database container often
//! comes up after the service.

use crate::config::{DatabaseConfig, parse_dsn};
use crate::db::executor::{Executor, PgExecutor};
use crate::db::unit_of_work::{AmbientTransaction, TransactionSlot, UnitOfWork};
use crate::error::{DbError, DbResult};
use crate::sql::SqlValue;
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Connection, PgConnection, PgPool, Postgres};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    statement_timeout: Duration,
}

impl Database {
    /// Connect to the database, retrying per the configured policy.
    ///
    /// Configuration problems (unsupported driver, malformed DSN, invalid pool
    /// options) fail immediately. Every other failure is retried until the attempt
    /// ceiling is reached.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        config.validate()?;

        let retry = config.retry;
        info!(
            dsn = %config.redacted_dsn(),
            max_attempts = retry.attempts,
            "Connecting to database"
        );

        let mut last_error = None;
        for attempt in 1..=retry.attempts {
            if attempt > 1 {
                tokio::time::sleep(retry.delay).await;
            }

            match create_pool(config).await {
                Ok(pool) => {
                    info!(attempt = attempt, "Connected successfully");
                    return Ok(Self {
                        pool,
                        statement_timeout: config.statement_timeout,
                    });
                }
                Err(e) => {
                    warn!(
                        attempt = attempt,
                        max_attempts = retry.attempts,
                        error = %e,
                        "Connection attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        let source = last_error.unwrap_or_else(|| DbError::internal("no connection attempt made"));
        Err(DbError::ConnectExhausted {
            attempts: retry.attempts,
            source: Box::new(source),
        })
    }

    /// Wrap a pool the caller already owns.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: Duration::from_secs(crate::config::DEFAULT_STATEMENT_TIMEOUT_SECS),
        }
    }

    pub fn with_statement_timeout(mut self, statement_timeout: Duration) -> Self {
        self.statement_timeout = statement_timeout;
        self
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// Lease an executor for one unit of work.
    ///
    /// Inside a transaction the lease takes exclusive use of the ambient transaction
    /// and releasing it leaves the transaction open. A transaction that is already
    /// leased, for example by an enclosing [`with_executor`](crate::db::with_executor)
    /// call, is a [`DbError::Transaction`]; reuse the lease you hold instead.
    /// Otherwise one pooled connection is leased, bounded by the pool's acquire timeout.
    pub async fn get_executor(&self, uow: &UnitOfWork) -> DbResult<ExecutorLease> {
        let source = match uow {
            UnitOfWork::Transaction(tx) => {
                let slot = tx.try_lock()?;
                if slot.is_none() {
                    return Err(DbError::transaction(
                        "Transaction is no longer active",
                        tx.id(),
                    ));
                }
                LeaseSource::Ambient {
                    slot,
                    transaction_id: tx.id().to_string(),
                }
            }
            UnitOfWork::Detached => {
                if self.pool.is_closed() {
                    return Err(DbError::connection(
                        "Connection pool is closed",
                        "Reconnect to the database",
                    ));
                }
                LeaseSource::Pooled(self.pool.acquire().await.map_err(DbError::from)?)
            }
        };

        Ok(ExecutorLease {
            source,
            statement_timeout: self.statement_timeout,
            released: false,
        })
    }

    /// Open an ambient transaction.
    pub async fn begin(&self) -> DbResult<UnitOfWork> {
        let tx = self.pool.begin().await.map_err(DbError::from)?;
        let tx = AmbientTransaction::new(tx);

        info!(transaction_id = %tx.id(), "Transaction started");
        Ok(UnitOfWork::Transaction(tx))
    }

    /// Run `f` inside a fresh transaction, committing on `Ok` and rolling back on `Err`.
    pub async fn transaction<T, F>(&self, f: F) -> DbResult<T>
    where
        F: AsyncFnOnce(&UnitOfWork) -> DbResult<T>,
    {
        let uow = self.begin().await?;
        match f(&uow).await {
            Ok(value) => {
                uow.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(
                        transaction_id = ?uow.transaction_id(),
                        error = %rollback_err,
                        "Rollback after failure did not complete"
                    );
                }
                Err(e)
            }
        }
    }

    /// Close the pool. Calling it again has no effect.
    pub async fn disconnect(&self) {
        if self.pool.is_closed() {
            return;
        }
        self.pool.close().await;
        info!("Database connection closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Create a pool for the given configuration and verify it answers.
async fn create_pool(config: &DatabaseConfig) -> DbResult<PgPool> {
    let options = parse_dsn(&config.dsn())?;
    let pool_opts = &config.pool_options;

    let pool = PgPoolOptions::new()
        .min_connections(pool_opts.min_connections)
        .max_connections(pool_opts.max_connections)
        .acquire_timeout(pool_opts.acquire_timeout())
        .idle_timeout(Some(pool_opts.idle_timeout()))
        .connect_with(options)
        .await
        .map_err(|e| {
            DbError::connection(format!("Failed to connect: {}", e), connection_suggestion(&e))
        })?;

    let ping = async {
        let mut conn = pool.acquire().await?;
        conn.ping().await
    };
    if let Err(e) = ping.await {
        pool.close().await;
        return Err(DbError::connection(
            format!("Failed to ping database: {}", e),
            connection_suggestion(&e),
        ));
    }

    Ok(pool)
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("timed out") {
        return "Check that the PostgreSQL server is running and accessible".to_string();
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify DB_USER and DB_PASSWORD".to_string();
    }

    if error_str.contains("does not exist") {
        return "Check that the database named by DB_NAME exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or set sslmode=disable".to_string();
    }

    "Verify the DSN format: user=<u> password=<p> dbname=<d> host=<h> port=<p> sslmode=<m>"
        .to_string()
}

enum LeaseSource {
    Pooled(PoolConnection<Postgres>),
    Ambient {
        slot: TransactionSlot,
        transaction_id: String,
    },
}

/// Scoped use of one executor.
///
/// A pooled lease returns its connection to the pool on release; an ambient lease
/// only gives up its turn on the shared transaction. [`release`](Self::release)
/// consumes the lease, so it cannot happen twice. Dropping an unreleased lease
/// releases it as well.
pub struct ExecutorLease {
    source: LeaseSource,
    statement_timeout: Duration,
    released: bool,
}

impl std::fmt::Debug for ExecutorLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorLease")
            .field("ambient", &self.is_ambient())
            .field("transaction_id", &self.transaction_id())
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl ExecutorLease {
    /// True when the lease runs inside an ambient transaction.
    pub fn is_ambient(&self) -> bool {
        matches!(self.source, LeaseSource::Ambient { .. })
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match &self.source {
            LeaseSource::Ambient { transaction_id, .. } => Some(transaction_id),
            LeaseSource::Pooled(_) => None,
        }
    }

    /// Explicitly release the lease (preferred over relying on Drop).
    pub fn release(mut self) {
        self.released = true;
        debug!(ambient = self.is_ambient(), "Executor released");
    }

    fn executor(&mut self) -> DbResult<PgExecutor<'_>> {
        let statement_timeout = self.statement_timeout;
        let conn: &mut PgConnection = match &mut self.source {
            LeaseSource::Pooled(conn) => &mut **conn,
            LeaseSource::Ambient {
                slot,
                transaction_id,
            } => {
                let tx = slot.as_mut().ok_or_else(|| {
                    DbError::transaction("Transaction is no longer active", transaction_id.as_str())
                })?;
                &mut **tx
            }
        };
        Ok(PgExecutor::new(conn, statement_timeout))
    }
}

impl Drop for ExecutorLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(
            ambient = self.is_ambient(),
            "Executor released via Drop - consider using explicit release()"
        );
    }
}

#[async_trait]
impl Executor for ExecutorLease {
    async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<u64> {
        self.executor()?.execute(sql, args).await
    }

    async fn query_optional(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Option<PgRow>> {
        self.executor()?.query_optional(sql, args).await
    }

    async fn query_many(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Vec<PgRow>> {
        self.executor()?.query_many(sql, args).await
    }

    async fn execute_batch(&mut self, sql: &str, arg_sets: &[Vec<SqlValue>]) -> DbResult<u64> {
        self.executor()?.execute_batch(sql, arg_sets).await
    }
}
