//! Execution helpers.
//!
//! Each helper leases an executor for the given unit of work, runs one statement
//! (or one batch), releases the lease on every path and adds call-site context to
//! errors. Row mapping is delegated to a caller-supplied scanner.

use crate::db::connection::{Database, ExecutorLease};
use crate::db::executor::Executor;
use crate::db::scanner::RowScanner;
use crate::db::unit_of_work::UnitOfWork;
use crate::error::{DbError, DbResult, ResultExt};
use crate::sql::{QueryBuilder, SqlValue};
use sqlx::postgres::PgRow;
use tracing::warn;

/// Lease an executor, run `f` with it and release it whatever the outcome.
///
/// Use this to run several statements on one executor. Inside an ambient
/// transaction `f` holds the transaction: run nested work through the lease it
/// receives, since helper calls with the same unit of work fail until `f` returns.
pub async fn with_executor<T, F>(db: &Database, uow: &UnitOfWork, f: F) -> DbResult<T>
where
    F: AsyncFnOnce(&mut ExecutorLease) -> DbResult<T>,
{
    let mut lease = acquire(db, uow).await?;
    let result = f(&mut lease).await;
    lease.release();
    result
}

/// Run a statement that returns no rows; yields the number of rows affected.
pub async fn execute(
    db: &Database,
    uow: &UnitOfWork,
    sql: &str,
    args: &[SqlValue],
) -> DbResult<u64> {
    if sql.trim().is_empty() {
        return Err(DbError::invalid_input("invalid arguments to execute script"));
    }

    let mut lease = acquire(db, uow).await?;
    let result = lease.execute(sql, args).await;
    lease.release();
    result.context("failed to execute command")
}

/// Fetch exactly one row and scan it.
///
/// Zero rows yields an error for which [`DbError::is_no_rows`] holds.
pub async fn query_one<T, F>(
    db: &Database,
    uow: &UnitOfWork,
    sql: &str,
    args: &[SqlValue],
    scan: F,
) -> DbResult<T>
where
    F: Fn(&PgRow) -> DbResult<T>,
{
    query_optional(db, uow, sql, args, scan)
        .await?
        .ok_or_else(|| DbError::NoRows.with_context("failed to query single result"))
}

/// Fetch at most one row and scan it.
pub async fn query_optional<T, F>(
    db: &Database,
    uow: &UnitOfWork,
    sql: &str,
    args: &[SqlValue],
    scan: F,
) -> DbResult<Option<T>>
where
    F: Fn(&PgRow) -> DbResult<T>,
{
    if sql.trim().is_empty() {
        return Err(DbError::invalid_input(
            "invalid arguments to query single result",
        ));
    }

    let mut lease = acquire(db, uow).await?;
    let row = lease.query_optional(sql, args).await;
    lease.release();

    match row.context("failed to query single result")? {
        Some(row) => scan(&row).context("failed to scan row").map(Some),
        None => Ok(None),
    }
}

/// Fetch every row and scan each one, preserving engine order.
pub async fn query_many<T, F>(
    db: &Database,
    uow: &UnitOfWork,
    sql: &str,
    args: &[SqlValue],
    scan: F,
) -> DbResult<Vec<T>>
where
    F: Fn(&PgRow) -> DbResult<T>,
{
    if sql.trim().is_empty() {
        return Err(DbError::invalid_input(
            "invalid arguments to query multiple results",
        ));
    }

    let mut lease = acquire(db, uow).await?;
    let rows = lease.query_many(sql, args).await;
    lease.release();

    rows.context("failed to execute command")?
        .iter()
        .map(|row| scan(row).context("failed to scan row"))
        .collect()
}

/// Run one template once per argument set on a single executor.
///
/// Stops at the first failing set. Sets that already ran stay applied unless `uow`
/// is a transaction the caller rolls back; see [`batch_atomic`] for all-or-nothing.
pub async fn batch(
    db: &Database,
    uow: &UnitOfWork,
    sql: &str,
    arg_sets: &[Vec<SqlValue>],
) -> DbResult<u64> {
    if sql.trim().is_empty() || arg_sets.is_empty() {
        return Err(DbError::invalid_input("invalid arguments to execute batch"));
    }

    let mut lease = acquire(db, uow).await?;
    let result = lease.execute_batch(sql, arg_sets).await;
    lease.release();
    result.context("failed to execute batch")
}

/// Like [`batch`], but all-or-nothing.
///
/// Joins the caller's transaction when there is one; otherwise opens, commits or
/// rolls back a transaction of its own.
pub async fn batch_atomic(
    db: &Database,
    uow: &UnitOfWork,
    sql: &str,
    arg_sets: &[Vec<SqlValue>],
) -> DbResult<u64> {
    if uow.is_transaction() {
        return batch(db, uow, sql, arg_sets).await;
    }
    if sql.trim().is_empty() || arg_sets.is_empty() {
        return Err(DbError::invalid_input("invalid arguments to execute batch"));
    }

    let tx = db.begin().await.context("failed to begin batch transaction")?;
    match batch(db, &tx, sql, arg_sets).await {
        Ok(rows_affected) => {
            tx.commit().await.context("failed to commit batch")?;
            Ok(rows_affected)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    transaction_id = ?tx.transaction_id(),
                    error = %rollback_err,
                    "Rollback of failed batch did not complete"
                );
            }
            Err(e)
        }
    }
}

/// Count rows of `table` matching `field = value` for every pair.
pub async fn count<S: AsRef<str>>(
    db: &Database,
    uow: &UnitOfWork,
    table: &str,
    fields: &[S],
    values: &[SqlValue],
) -> DbResult<i64> {
    if table.trim().is_empty() || fields.len() != values.len() {
        return Err(DbError::invalid_input("invalid arguments to count rows"));
    }

    let (sql, args) = count_query(table, fields, values);
    let mut lease = acquire(db, uow).await?;
    let row = lease.query_one(&sql, &args).await;
    lease.release();

    row.and_then(|row| row.scan::<i64>(0))
        .context("failed to count rows")
}

fn count_query<S: AsRef<str>>(
    table: &str,
    fields: &[S],
    values: &[SqlValue],
) -> (String, Vec<SqlValue>) {
    fields
        .iter()
        .zip(values)
        .fold(QueryBuilder::new().count().from(table), |qb, (field, value)| {
            qb.where_eq(field.as_ref(), value.clone())
        })
        .build()
}

async fn acquire(db: &Database, uow: &UnitOfWork) -> DbResult<ExecutorLease> {
    db.get_executor(uow)
        .await
        .context("failed to acquire executor")
}
