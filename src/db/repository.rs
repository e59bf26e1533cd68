//! Read and write contract shared by entity repositories.

use crate::db::connection::Database;
use crate::db::execute;
use crate::db::scanner::ScannerFn;
use crate::db::unit_of_work::UnitOfWork;
use crate::error::DbResult;
use crate::sql::SqlValue;
use async_trait::async_trait;

/// Bulk writes and scanned reads for one entity type.
///
/// Every write accepts any number of entities and returns the number of rows
/// affected; an empty slice is a no-op returning `0`. Pass a transactional
/// [`UnitOfWork`] to combine calls across repositories atomically.
#[async_trait]
pub trait Repository<T: Send + Sync + 'static>: Send + Sync {
    /// The database the repository runs against.
    fn database(&self) -> &Database;

    async fn create(&self, uow: &UnitOfWork, entities: &[T]) -> DbResult<u64>;

    async fn update(&self, uow: &UnitOfWork, entities: &[T]) -> DbResult<u64>;

    async fn upsert(&self, uow: &UnitOfWork, entities: &[T]) -> DbResult<u64>;

    async fn delete(&self, uow: &UnitOfWork, entities: &[T]) -> DbResult<u64>;

    /// Run `sql` and scan its single row; zero rows is a no-rows error.
    async fn read_one(
        &self,
        uow: &UnitOfWork,
        sql: &str,
        args: &[SqlValue],
        scan: ScannerFn<T>,
    ) -> DbResult<T> {
        execute::query_one(self.database(), uow, sql, args, scan).await
    }

    /// Run `sql` and scan every row in engine order.
    async fn read_many(
        &self,
        uow: &UnitOfWork,
        sql: &str,
        args: &[SqlValue],
        scan: ScannerFn<T>,
    ) -> DbResult<Vec<T>> {
        execute::query_many(self.database(), uow, sql, args, scan).await
    }
}
