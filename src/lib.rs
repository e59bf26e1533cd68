//! Game Data Library
//!
//! Data-access layer for the game backend: a parameterized SQL statement builder,
//! a pooled Postgres connection service with ambient transactions, generic
//! execution helpers and the schema registry used at bootstrap.

pub mod config;
pub mod db;
pub mod domains;
pub mod error;
pub mod sql;

pub use config::{Config, DatabaseConfig};
pub use db::{Database, UnitOfWork};
pub use error::{DbError, DbResult};
pub use sql::{QueryBuilder, SqlValue};
