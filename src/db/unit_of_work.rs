//! Ambient transaction propagation.
//!
//! Every helper and repository call takes a `&UnitOfWork`. A detached unit of work
//! leases a pooled connection per call; a transactional one routes every call to the
//! same open transaction, so independently written repositories can join one atomic
//! operation without knowing about each other.

use crate::error::{DbError, DbResult};
use sqlx::{Postgres, Transaction};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

/// An open Postgres transaction that owns its connection.
pub type PgTransaction = Transaction<'static, Postgres>;

/// The slot a transaction lives in; `None` once committed or rolled back.
pub(crate) type TransactionSlot = OwnedMutexGuard<Option<PgTransaction>>;

/// Shared handle to an open transaction.
///
/// Clones refer to the same transaction. Only one executor lease may hold it at a
/// time; a second lease, including one requested from inside a running
/// `with_executor` closure, fails with [`DbError::Transaction`] instead of waiting.
/// Whoever called [`Database::begin`](crate::db::Database::begin) is expected to
/// commit or roll back.
#[derive(Clone)]
pub struct AmbientTransaction {
    id: Arc<str>,
    inner: Arc<Mutex<Option<PgTransaction>>>,
}

impl AmbientTransaction {
    pub(crate) fn new(tx: PgTransaction) -> Self {
        Self {
            id: generate_transaction_id().into(),
            inner: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Unique transaction identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when both handles point at the same transaction.
    pub fn same_as(&self, other: &AmbientTransaction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// True until commit or rollback. A leased transaction is still active.
    pub fn is_active(&self) -> bool {
        self.inner
            .try_lock()
            .map(|slot| slot.is_some())
            .unwrap_or(true)
    }

    /// Take exclusive use of the transaction without waiting.
    pub(crate) fn try_lock(&self) -> DbResult<TransactionSlot> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .map_err(|_| self.already_leased())
    }

    fn already_leased(&self) -> DbError {
        DbError::transaction("transaction already leased by this unit of work", self.id())
    }

    /// Commit the transaction.
    pub async fn commit(&self) -> DbResult<()> {
        let tx = self.take().await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(transaction_id = %self.id, "Transaction committed");
        Ok(())
    }

    /// Rollback the transaction.
    pub async fn rollback(&self) -> DbResult<()> {
        let tx = self.take().await?;
        tx.rollback().await.map_err(DbError::from)?;

        info!(transaction_id = %self.id, "Transaction rolled back");
        Ok(())
    }

    async fn take(&self) -> DbResult<PgTransaction> {
        self.try_lock()?
            .take()
            .ok_or_else(|| DbError::transaction("Transaction is no longer active", self.id()))
    }

    #[cfg(test)]
    pub(crate) fn finished() -> Self {
        Self {
            id: generate_transaction_id().into(),
            inner: Arc::new(Mutex::new(None)),
        }
    }
}

impl fmt::Debug for AmbientTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbientTransaction")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for AmbientTransaction {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) != 1 {
            return;
        }

        // sqlx rolls back when the connection returns to the pool
        let abandoned = self
            .inner
            .try_lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        if abandoned {
            warn!(
                transaction_id = %self.id,
                "Transaction dropped without commit or rollback, rolling back"
            );
        }
    }
}

/// Where a data-access call runs.
#[derive(Debug, Clone, Default)]
pub enum UnitOfWork {
    /// Each call leases its own pooled connection.
    #[default]
    Detached,
    /// Every call joins this transaction.
    Transaction(AmbientTransaction),
}

impl UnitOfWork {
    pub fn detached() -> Self {
        Self::Detached
    }

    /// The ambient transaction, if any.
    pub fn transaction(&self) -> Option<&AmbientTransaction> {
        match self {
            Self::Detached => None,
            Self::Transaction(tx) => Some(tx),
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction().map(AmbientTransaction::id)
    }

    /// Commit the ambient transaction; fails when detached.
    pub async fn commit(&self) -> DbResult<()> {
        match self {
            Self::Transaction(tx) => tx.commit().await,
            Self::Detached => Err(DbError::invalid_input(
                "cannot commit a detached unit of work",
            )),
        }
    }

    /// Rollback the ambient transaction; fails when detached.
    pub async fn rollback(&self) -> DbResult<()> {
        match self {
            Self::Transaction(tx) => tx.rollback().await,
            Self::Detached => Err(DbError::invalid_input(
                "cannot roll back a detached unit of work",
            )),
        }
    }
}

impl From<AmbientTransaction> for UnitOfWork {
    fn from(tx: AmbientTransaction) -> Self {
        Self::Transaction(tx)
    }
}

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}
