//! Row scanning.
//!
//! Scanners turn one result row into a typed value. They only read columns through
//! [`RowScanner`], so they stay independent of how the row was fetched.

use crate::error::{DbError, DbResult};
use sqlx::postgres::PgRow;
use sqlx::{Decode, FromRow, Postgres, Row, Type};

/// Read-only column access on a fetched row.
pub trait RowScanner {
    /// Decode the column at `index`.
    fn scan<'r, T>(&'r self, index: usize) -> DbResult<T>
    where
        T: Decode<'r, Postgres> + Type<Postgres>;

    /// Number of columns in the row.
    fn column_count(&self) -> usize;

    /// Sequential access, left to right.
    fn columns(&self) -> Columns<'_, Self> {
        Columns {
            row: self,
            index: 0,
        }
    }
}

impl RowScanner for PgRow {
    fn scan<'r, T>(&'r self, index: usize) -> DbResult<T>
    where
        T: Decode<'r, Postgres> + Type<Postgres>,
    {
        self.try_get(index).map_err(DbError::from)
    }

    fn column_count(&self) -> usize {
        self.len()
    }
}

/// Cursor over the columns of one row, in select-list order.
pub struct Columns<'r, R: RowScanner + ?Sized> {
    row: &'r R,
    index: usize,
}

impl<'r, R: RowScanner + ?Sized> Columns<'r, R> {
    /// Decode the next column.
    pub fn next_column<T>(&mut self) -> DbResult<T>
    where
        T: Decode<'r, Postgres> + Type<Postgres>,
    {
        if self.index >= self.row.column_count() {
            return Err(DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                self.index,
                self.row.column_count()
            )));
        }
        let value = self.row.scan(self.index)?;
        self.index += 1;
        Ok(value)
    }

    /// Columns not read yet.
    pub fn remaining(&self) -> usize {
        self.row.column_count().saturating_sub(self.index)
    }
}

/// A function mapping one row to a `T`.
pub type ScannerFn<T> = fn(&PgRow) -> DbResult<T>;

/// Scanner for any type with a `FromRow` implementation.
pub fn from_row<T>(row: &PgRow) -> DbResult<T>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(DbError::from)
}

/// Scanner for a single-column row.
pub fn scalar<T>(row: &PgRow) -> DbResult<T>
where
    T: for<'r> Decode<'r, Postgres> + Type<Postgres>,
{
    row.scan(0)
}
