//! Database access layer.
//!
//! This module provides:
//! - The pooled connection service and executor leases
//! - Ambient transactions carried by an explicit unit of work
//! - Execution helpers that scan rows into typed values
//! - The schema registry used at bootstrap

pub mod connection;
pub mod execute;
pub mod executor;
pub mod repository;
pub mod scanner;
pub mod schema;
pub mod unit_of_work;

pub use connection::{Database, ExecutorLease};
pub use execute::{
    batch, batch_atomic, count, execute, query_many, query_one, query_optional, with_executor,
};
pub use executor::{Executor, PgExecutor};
pub use repository::Repository;
pub use scanner::{Columns, RowScanner, ScannerFn};
pub use schema::{DomainSchema, Schemas};
pub use unit_of_work::{AmbientTransaction, PgTransaction, UnitOfWork};
