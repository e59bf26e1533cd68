//! SQL text construction.
//!
//! Pure, I/O-free helpers that produce Postgres-style statements with numbered
//! placeholders (`$1, $2, ...`):
//! - `QueryBuilder` for fluent, per-call statements
//! - `statements` for fixed templates built from identifier lists
//! - `SqlValue` for the arguments that accompany them

pub mod builder;
pub mod field;
pub mod statements;
pub mod value;

pub use builder::QueryBuilder;
pub use field::QueryField;
pub use value::{HasSqlType, SqlType, SqlValue};
