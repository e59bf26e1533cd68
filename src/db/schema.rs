//! Schema registry.
//!
//! Entity modules implement [`DomainSchema`] and register it with [`Schemas`] at
//! startup. Tables are created in registration order and dropped in reverse, so
//! registering referenced tables before their dependents keeps foreign keys
//! satisfied in both directions.

use crate::db::connection::Database;
use crate::db::executor::Executor;
use crate::db::unit_of_work::UnitOfWork;
use crate::error::{DbResult, ResultExt};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Table lifecycle of one entity module.
#[async_trait]
pub trait DomainSchema: Send + Sync {
    /// Name used in logs and error context, usually the table name.
    fn name(&self) -> &str;

    /// Create the module's tables. Must be idempotent.
    async fn create_table(&self, executor: &mut dyn Executor) -> DbResult<()>;

    /// Drop the module's tables.
    async fn drop_table(&self, executor: &mut dyn Executor) -> DbResult<()>;
}

#[derive(Clone)]
pub struct Schemas {
    database: Database,
    schemas: Vec<Arc<dyn DomainSchema>>,
}

impl std::fmt::Debug for Schemas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schemas")
            .field("schemas", &self.names())
            .finish_non_exhaustive()
    }
}

impl Schemas {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            schemas: Vec::new(),
        }
    }

    /// Register a schema; referenced tables must be registered before dependents.
    pub fn add_schema(mut self, schema: impl DomainSchema + 'static) -> Self {
        self.schemas.push(Arc::new(schema));
        self
    }

    /// Registered schema names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Create every registered table on one executor.
    pub async fn create_all_tables(&self, uow: &UnitOfWork) -> DbResult<()> {
        let mut lease = self
            .database
            .get_executor(uow)
            .await
            .context("failed to get executor")?;
        let result = self.create_all_tables_with(&mut lease).await;
        lease.release();
        result
    }

    /// Drop every registered table on one executor, newest registration first.
    pub async fn drop_all_tables(&self, uow: &UnitOfWork) -> DbResult<()> {
        let mut lease = self
            .database
            .get_executor(uow)
            .await
            .context("failed to get executor")?;
        let result = self.drop_all_tables_with(&mut lease).await;
        lease.release();
        result
    }

    /// Create every registered table using `executor`, stopping at the first failure.
    pub async fn create_all_tables_with(&self, executor: &mut dyn Executor) -> DbResult<()> {
        for schema in &self.schemas {
            debug!(schema = %schema.name(), "Creating table");
            schema
                .create_table(executor)
                .await
                .context(&format!("failed to create tables for {}", schema.name()))?;
        }

        info!(count = self.schemas.len(), "Tables created");
        Ok(())
    }

    /// Drop every registered table using `executor`, in reverse registration order.
    pub async fn drop_all_tables_with(&self, executor: &mut dyn Executor) -> DbResult<()> {
        for schema in self.schemas.iter().rev() {
            debug!(schema = %schema.name(), "Dropping table");
            schema
                .drop_table(executor)
                .await
                .context(&format!("failed to drop tables for {}", schema.name()))?;
        }

        info!(count = self.schemas.len(), "Tables dropped");
        Ok(())
    }
}
