//! Statement execution over a live connection or transaction.
//!
//! [`Executor`] is the capability set every helper relies on. It is implemented by
//! [`PgExecutor`], a thin wrapper over a borrowed `PgConnection` that applies the
//! per-statement timeout, and by the connection lease handed out by
//! [`Database::get_executor`](crate::db::Database::get_executor).

use crate::error::{DbError, DbResult};
use crate::sql::{SqlType, SqlValue};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::PgConnection;
use sqlx::Postgres;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::types::Json;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Run parameterized statements and retrieve rows.
///
/// Implementations do not know whether they are backed by a pooled connection or
/// by a transaction.
#[async_trait]
pub trait Executor: Send {
    /// Run a statement that returns no rows; yields the number of rows affected.
    async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<u64>;

    /// Fetch at most one row.
    async fn query_optional(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Option<PgRow>>;

    /// Fetch every row in engine order.
    async fn query_many(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Vec<PgRow>>;

    /// Run one template once per argument set, stopping at the first failure.
    async fn execute_batch(&mut self, sql: &str, arg_sets: &[Vec<SqlValue>]) -> DbResult<u64>;

    /// Fetch exactly one row; zero rows is [`DbError::NoRows`].
    async fn query_one(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<PgRow> {
        self.query_optional(sql, args).await?.ok_or(DbError::NoRows)
    }
}

/// [`Executor`] over a borrowed Postgres connection.
pub struct PgExecutor<'c> {
    conn: &'c mut PgConnection,
    statement_timeout: Duration,
}

impl<'c> PgExecutor<'c> {
    pub fn new(conn: &'c mut PgConnection, statement_timeout: Duration) -> Self {
        Self {
            conn,
            statement_timeout,
        }
    }
}

#[async_trait]
impl Executor for PgExecutor<'_> {
    async fn execute(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<u64> {
        debug!(sql = %sql, params = args.len(), "Executing statement");

        let result = if args.is_empty() {
            // Raw SQL so DDL and multi-statement scripts go through the simple protocol
            use sqlx::Executor as _;
            timeout(self.statement_timeout, (&mut *self.conn).execute(sql)).await
        } else {
            timeout(
                self.statement_timeout,
                bind_values(sqlx::query(sql), args).execute(&mut *self.conn),
            )
            .await
        };

        match result {
            Ok(Ok(r)) => {
                debug!(rows_affected = r.rows_affected(), "Statement executed");
                Ok(r.rows_affected())
            }
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("statement execution", self.statement_timeout)),
        }
    }

    async fn query_optional(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Option<PgRow>> {
        debug!(sql = %sql, params = args.len(), "Querying single row");

        let query = bind_values(sqlx::query(sql), args);
        match timeout(self.statement_timeout, query.fetch_optional(&mut *self.conn)).await {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(timeout_error("query execution", self.statement_timeout)),
        }
    }

    async fn query_many(&mut self, sql: &str, args: &[SqlValue]) -> DbResult<Vec<PgRow>> {
        debug!(sql = %sql, params = args.len(), "Querying rows");

        let query = bind_values(sqlx::query(sql), args);
        let rows_future = query.fetch(&mut *self.conn).try_collect::<Vec<_>>();
        match timeout(self.statement_timeout, rows_future).await {
            Ok(Ok(rows)) => {
                debug!(row_count = rows.len(), "Rows fetched");
                Ok(rows)
            }
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("query execution", self.statement_timeout)),
        }
    }

    async fn execute_batch(&mut self, sql: &str, arg_sets: &[Vec<SqlValue>]) -> DbResult<u64> {
        debug!(sql = %sql, statements = arg_sets.len(), "Executing batch");

        let total = arg_sets.len();
        let mut rows_affected = 0;
        for (index, args) in arg_sets.iter().enumerate() {
            let query = bind_values(sqlx::query(sql), args);
            let result = match timeout(self.statement_timeout, query.execute(&mut *self.conn)).await
            {
                Ok(Ok(r)) => r.rows_affected(),
                Ok(Err(e)) => return Err(DbError::batch(index, total, DbError::from(e))),
                Err(_) => {
                    return Err(DbError::batch(
                        index,
                        total,
                        timeout_error("batch statement", self.statement_timeout),
                    ));
                }
            };
            rows_affected += result;
        }

        debug!(rows_affected = rows_affected, "Batch executed");
        Ok(rows_affected)
    }
}

/// Bind a value to a PostgreSQL query.
///
/// A `Null` binds as `None` of its column type so Postgres accepts it for that column.
pub(crate) fn bind_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &'q SqlValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null(sql_type) => bind_null(query, *sql_type),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Json(v) => query.bind(Json(v)),
    }
}

fn bind_null<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    sql_type: SqlType,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match sql_type {
        SqlType::Bool => query.bind(None::<bool>),
        SqlType::Int => query.bind(None::<i64>),
        SqlType::Float => query.bind(None::<f64>),
        SqlType::Uuid => query.bind(None::<uuid::Uuid>),
        SqlType::Timestamp => query.bind(None::<chrono::DateTime<chrono::Utc>>),
        SqlType::Text => query.bind(None::<String>),
        SqlType::Bytes => query.bind(None::<Vec<u8>>),
        SqlType::Json => query.bind(None::<Json<serde_json::Value>>),
    }
}

/// Bind every value in order.
pub(crate) fn bind_values<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    values: &'q [SqlValue],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for value in values {
        query = bind_value(query, value);
    }
    query
}

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs())
}
