//! Fluent SQL statement builder.
//!
//! [`QueryBuilder`] assembles one parameterized statement per relational verb.
//! Caller values never reach the SQL text: each value is pushed onto the argument
//! list and replaced by the next `$N` placeholder.
//!
//! # Modes
//!
//! - **Single**: `build()` returns the SQL and one argument list. The number of
//!   placeholders in the text always equals the number of arguments.
//! - **Batch**: `batch_values` / `batch_sets` / `batch_upsert` emit one placeholder
//!   template sized to the field list and keep the caller's per-row argument sets.
//!   `build_batch()` returns the template and one argument set per row, ready to be
//!   replayed against the same prepared statement.
//!
//! # Looseness
//!
//! Methods never fail. Calling clauses in a nonsensical order (for example
//! `where_eq` before any `from`) produces SQL that the engine rejects at execution
//! time; the builder does not guard against it.
//!
//! # Example
//!
//! ```
//! use game_data::sql::QueryBuilder;
//!
//! let (sql, args) = QueryBuilder::new()
//!     .select(&["id", "name"])
//!     .from("units")
//!     .where_eq("faction", "north")
//!     .where_in("level", [1, 2])
//!     .build();
//!
//! assert_eq!(sql, "SELECT id, name FROM units WHERE faction = $1 AND level IN ($2, $3)");
//! assert_eq!(args.len(), 3);
//! ```

use crate::sql::field::QueryField;
use crate::sql::value::SqlValue;

/// Where a batch placeholder takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchSlot {
    /// Next value of the current row.
    Row,
    /// A value shared by every row, stored in `args` at this index.
    Shared(usize),
}

/// Stateful, single-use SQL builder.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: String,
    args: Vec<SqlValue>,
    batch_args: Vec<Vec<SqlValue>>,
    /// Placeholder order once batch mode started; `None` in single mode.
    batch_layout: Option<Vec<BatchSlot>>,
    param_index: usize,
    has_where: bool,
    has_set: bool,
    insert_fields: Vec<String>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    /// Create an empty builder whose first placeholder is `$1`.
    pub fn new() -> Self {
        Self {
            query: String::new(),
            args: Vec::new(),
            batch_args: Vec::new(),
            batch_layout: None,
            param_index: 1,
            has_where: false,
            has_set: false,
            insert_fields: Vec::new(),
        }
    }

    /// The SQL text accumulated so far.
    pub fn sql(&self) -> &str {
        &self.query
    }

    /// The single-mode arguments accumulated so far.
    pub fn args(&self) -> &[SqlValue] {
        &self.args
    }

    /// Number of the next placeholder to be emitted.
    pub fn next_placeholder(&self) -> usize {
        self.param_index
    }

    /// Finish the statement and return the SQL with its arguments.
    pub fn build(self) -> (String, Vec<SqlValue>) {
        (self.query, self.args)
    }

    /// Finish a batch statement and return the template with one argument set per row.
    ///
    /// When the only placeholders come from the batch clause, the row sets are
    /// returned exactly as supplied. Values added with `where_eq` / `where_in` after
    /// batch mode started are shared by every row and spliced into each set at their
    /// placeholder position.
    pub fn build_batch(self) -> (String, Vec<Vec<SqlValue>>) {
        let layout = match self.batch_layout {
            Some(layout) if layout.iter().any(|s| matches!(s, BatchSlot::Shared(_))) => layout,
            _ => return (self.query, self.batch_args),
        };

        let args = self.args;
        let rows = self
            .batch_args
            .into_iter()
            .map(|row| {
                let mut row_values = row.into_iter();
                let mut out = Vec::with_capacity(layout.len());
                for slot in &layout {
                    match slot {
                        BatchSlot::Row => {
                            if let Some(value) = row_values.next() {
                                out.push(value);
                            }
                        }
                        BatchSlot::Shared(i) => out.push(args[*i].clone()),
                    }
                }
                out.extend(row_values);
                out
            })
            .collect();

        (self.query, rows)
    }

    // =========================================================================
    // SELECT
    // =========================================================================

    /// `SELECT f1, f2, ...`
    pub fn select<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.query.push_str("SELECT ");
        self.query.push_str(&join(fields));
        self
    }

    /// `SELECT` with typed fields, e.g. `created_at::timestamptz`.
    pub fn select_fields(mut self, fields: &[QueryField]) -> Self {
        let rendered: Vec<String> = fields.iter().map(ToString::to_string).collect();
        self.query.push_str("SELECT ");
        self.query.push_str(&rendered.join(", "));
        self
    }

    /// `SELECT COUNT(*)`
    pub fn count(mut self) -> Self {
        self.query.push_str("SELECT COUNT(*)");
        self
    }

    /// ` FROM table`
    pub fn from(mut self, table: &str) -> Self {
        self.query.push_str(" FROM ");
        self.query.push_str(table);
        self
    }

    // =========================================================================
    // WHERE
    // =========================================================================

    /// `field = $N`, joined with `WHERE` on first use and `AND` afterwards.
    pub fn where_eq(mut self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.open_predicate();
        self.query.push_str(field);
        self.query.push_str(" = ");
        self.push_arg(value.into());
        self
    }

    /// `field IN ($N, $N+1, ...)`. No-op when `values` is empty.
    pub fn where_in<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return self;
        }

        self.open_predicate();
        self.query.push_str(field);
        self.query.push_str(" IN (");
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.query.push_str(", ");
            }
            self.push_arg(value);
        }
        self.query.push(')');
        self
    }

    /// Composite-key membership: `(f1, f2) IN (($1, $2), ($3, $4))`.
    ///
    /// No-op when either `tuples` or `fields` is empty.
    pub fn where_tuple_in<S: AsRef<str>>(mut self, tuples: Vec<Vec<SqlValue>>, fields: &[S]) -> Self {
        if tuples.is_empty() || fields.is_empty() {
            return self;
        }

        self.open_predicate();
        self.query.push('(');
        self.query.push_str(&join(fields));
        self.query.push_str(") IN (");
        for (i, tuple) in tuples.into_iter().enumerate() {
            if i > 0 {
                self.query.push_str(", ");
            }
            self.query.push('(');
            for (j, value) in tuple.into_iter().enumerate() {
                if j > 0 {
                    self.query.push_str(", ");
                }
                self.push_arg(value);
            }
            self.query.push(')');
        }
        self.query.push(')');
        self
    }

    /// `field = $N` whose value is supplied by each batch row instead of the builder.
    ///
    /// Used for keyed batch updates: the key is the last value of every row set.
    pub fn batch_where(mut self, field: &str) -> Self {
        self.open_predicate();
        self.query.push_str(field);
        self.query.push_str(" = ");
        self.push_row_placeholder();
        self
    }

    // =========================================================================
    // INSERT
    // =========================================================================

    /// `INSERT INTO table`
    pub fn insert_into(mut self, table: &str) -> Self {
        self.query.push_str("INSERT INTO ");
        self.query.push_str(table);
        self
    }

    /// Field names used by `values`, `batch_values` and `batch_upsert`.
    pub fn insert_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.insert_fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// ` (fields) VALUES ($N, ...)` with one placeholder per value.
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.push_insert_columns();
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.query.push_str(", ");
            }
            self.push_arg(value.into());
        }
        self.query.push(')');
        self
    }

    /// ` (fields) VALUES ($1, ..., $n)` template for a batch insert.
    ///
    /// The template arity is the number of insert fields regardless of how many
    /// rows are supplied; numbering restarts at `$1` because every row is executed
    /// as its own instance of the statement. No-op when `argument_sets` is empty.
    pub fn batch_values(mut self, argument_sets: Vec<Vec<SqlValue>>) -> Self {
        if argument_sets.is_empty() {
            return self;
        }

        self.batch_args = argument_sets;
        self.param_index = 1;
        self.push_insert_columns();
        for i in 0..self.insert_fields.len() {
            if i > 0 {
                self.query.push_str(", ");
            }
            self.push_row_placeholder();
        }
        self.query.push(')');
        self
    }

    // =========================================================================
    // UPDATE
    // =========================================================================

    /// `UPDATE table`
    pub fn update(mut self, table: &str) -> Self {
        self.query.push_str("UPDATE ");
        self.query.push_str(table);
        self
    }

    /// `SET field = $N`, comma-joined on subsequent calls.
    ///
    /// Numbering continues from the running cursor so a trailing `where_eq`
    /// gets the placeholders after the SET clause.
    pub fn set(mut self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.open_assignment();
        self.query.push_str(field);
        self.query.push_str(" = ");
        self.push_arg(value.into());
        self
    }

    /// `SET f1 = $N, f2 = $N+1` template for a batch update.
    ///
    /// No-op when either `argument_sets` or `set_fields` is empty.
    pub fn batch_sets<S: AsRef<str>>(
        mut self,
        argument_sets: Vec<Vec<SqlValue>>,
        set_fields: &[S],
    ) -> Self {
        if argument_sets.is_empty() || set_fields.is_empty() {
            return self;
        }

        self.batch_args = argument_sets;
        for field in set_fields {
            self.open_assignment();
            self.query.push_str(field.as_ref());
            self.query.push_str(" = ");
            self.push_row_placeholder();
        }
        self
    }

    // =========================================================================
    // UPSERT
    // =========================================================================

    /// ` ON CONFLICT (k1, k2)`
    pub fn on_conflict<S: AsRef<str>>(mut self, key_fields: &[S]) -> Self {
        self.query.push_str(" ON CONFLICT (");
        self.query.push_str(&join(key_fields));
        self.query.push(')');
        self
    }

    /// ` DO NOTHING`
    pub fn do_nothing(mut self) -> Self {
        self.query.push_str(" DO NOTHING");
        self
    }

    /// ` DO UPDATE SET f = EXCLUDED.f, ...` in input order.
    ///
    /// Falls back to ` DO NOTHING` when no fields are given.
    pub fn do_update<S: AsRef<str>>(mut self, update_fields: &[S]) -> Self {
        if update_fields.is_empty() {
            return self.do_nothing();
        }

        let clauses: Vec<String> = update_fields
            .iter()
            .map(|f| format!("{0} = EXCLUDED.{0}", f.as_ref()))
            .collect();
        self.query.push_str(" DO UPDATE SET ");
        self.query.push_str(&clauses.join(", "));
        self
    }

    /// Batch insert template followed by the conflict clause.
    ///
    /// `DO NOTHING` when `update_fields` is empty. No-op when `argument_sets` is empty.
    pub fn batch_upsert<K: AsRef<str>, U: AsRef<str>>(
        self,
        argument_sets: Vec<Vec<SqlValue>>,
        key_fields: &[K],
        update_fields: &[U],
    ) -> Self {
        if argument_sets.is_empty() {
            return self;
        }

        self.batch_values(argument_sets)
            .on_conflict(key_fields)
            .do_update(update_fields)
    }

    // =========================================================================
    // DELETE / common
    // =========================================================================

    /// `DELETE FROM table`
    pub fn delete_from(mut self, table: &str) -> Self {
        self.query.push_str("DELETE FROM ");
        self.query.push_str(table);
        self
    }

    /// ` RETURNING f1, f2`
    pub fn returning<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.query.push_str(" RETURNING ");
        self.query.push_str(&join(fields));
        self
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn open_predicate(&mut self) {
        if self.has_where {
            self.query.push_str(" AND ");
        } else {
            self.query.push_str(" WHERE ");
            self.has_where = true;
        }
    }

    fn open_assignment(&mut self) {
        if self.has_set {
            self.query.push_str(", ");
        } else {
            self.query.push_str(" SET ");
            self.has_set = true;
        }
    }

    fn push_insert_columns(&mut self) {
        self.query.push_str(" (");
        self.query.push_str(&self.insert_fields.join(", "));
        self.query.push_str(") VALUES (");
    }

    /// Emit the next placeholder bound to `value`.
    fn push_arg(&mut self, value: SqlValue) {
        if let Some(layout) = self.batch_layout.as_mut() {
            layout.push(BatchSlot::Shared(self.args.len()));
        }
        self.push_placeholder();
        self.args.push(value);
    }

    /// Emit the next placeholder bound to a per-row value.
    fn push_row_placeholder(&mut self) {
        self.batch_layout
            .get_or_insert_with(Vec::new)
            .push(BatchSlot::Row);
        self.push_placeholder();
    }

    fn push_placeholder(&mut self) {
        self.query.push('$');
        self.query.push_str(&self.param_index.to_string());
        self.param_index += 1;
    }
}

fn join<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(", ")
}
