//! One-shot statement construction.
//!
//! These functions render whole statements from identifier lists for repositories
//! that replay a fixed template through [`batch`](crate::db::batch). Placeholders
//! always start at the index the caller passes (or `$1`), so an UPDATE can place
//! its WHERE placeholders after the SET placeholders.

fn join<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(", ")
}

fn join_and(clauses: &[String]) -> String {
    clauses.join(" AND ")
}

/// `["$start", "$start+1", ...]`, one per field.
pub fn dollar_holders<S>(start_index: usize, fields: &[S]) -> Vec<String> {
    (0..fields.len())
        .map(|i| format!("${}", start_index + i))
        .collect()
}

/// `["f1 = $start", "f2 = $start+1", ...]`
pub fn dollar_clause<S: AsRef<str>>(start_index: usize, fields: &[S]) -> Vec<String> {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| format!("{} = ${}", field.as_ref(), start_index + i))
        .collect()
}

/// `["target.f = source.f", ...]`; unqualified on the left when `target_table` is empty.
pub fn named_clause<S: AsRef<str>>(
    fields: &[S],
    target_table: &str,
    source_table: &str,
) -> Vec<String> {
    fields
        .iter()
        .map(|field| {
            let field = field.as_ref();
            if target_table.is_empty() {
                format!("{field} = {source_table}.{field}")
            } else {
                format!("{target_table}.{field} = {source_table}.{field}")
            }
        })
        .collect()
}

/// `(c1, c2) IN (($start, $start+1), ...)` for `tuple_count` tuples.
pub fn tuple_in_clause<S: AsRef<str>>(
    column_names: &[S],
    tuple_count: usize,
    start_index: usize,
) -> String {
    let mut arg_index = start_index;
    let tuples: Vec<String> = (0..tuple_count)
        .map(|_| {
            let holders: Vec<String> = column_names
                .iter()
                .map(|_| {
                    let holder = format!("${arg_index}");
                    arg_index += 1;
                    holder
                })
                .collect();
            format!("({})", holders.join(", "))
        })
        .collect();
    format!("({}) IN ({})", join(column_names), tuples.join(", "))
}

/// Unique name for a scratch table derived from `base_table_name`.
pub fn temp_table_name(base_table_name: &str) -> String {
    format!("{}_temp_{}", base_table_name, uuid::Uuid::new_v4().simple())
}

/// `CREATE TEMPORARY TABLE tmp AS SELECT cols FROM target WHERE 1=0`
pub fn build_temp_table_query<S: AsRef<str>>(
    temp_table_name: &str,
    target_table_name: &str,
    columns: &[S],
) -> String {
    format!(
        "CREATE TEMPORARY TABLE {} AS SELECT {} FROM {} WHERE 1=0",
        temp_table_name,
        join(columns),
        target_table_name
    )
}

/// `DROP TABLE IF EXISTS table CASCADE`
pub fn build_drop_table_query(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table} CASCADE")
}

/// `SELECT COUNT(*) FROM table [WHERE c1 AND c2]`
pub fn build_count_query(table: &str, where_clauses: &[String]) -> String {
    if where_clauses.is_empty() {
        return format!("SELECT COUNT(*) FROM {table}");
    }
    format!("SELECT COUNT(*) FROM {} WHERE {}", table, join_and(where_clauses))
}

/// `INSERT INTO table (f1, f2) VALUES ($1, $2)`
pub fn build_insert_query<S: AsRef<str>>(table: &str, fields: &[S]) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        join(fields),
        dollar_holders(1, fields).join(", ")
    )
}

/// INSERT followed by ` RETURNING r1, r2`.
pub fn build_insert_returning_query<S: AsRef<str>, R: AsRef<str>>(
    table: &str,
    insert_fields: &[S],
    return_fields: &[R],
) -> String {
    format!(
        "{} RETURNING {}",
        build_insert_query(table, insert_fields),
        join(return_fields)
    )
}

/// `SELECT f1, f2 FROM table [WHERE c1 AND c2]`
pub fn build_select_query<S: AsRef<str>>(
    table: &str,
    fields: &[S],
    where_clauses: &[String],
) -> String {
    let query = format!("SELECT {} FROM {}", join(fields), table);
    if where_clauses.is_empty() {
        return query;
    }
    format!("{} WHERE {}", query, join_and(where_clauses))
}

/// `UPDATE table SET s1, s2 WHERE c1 AND c2`
pub fn build_update_query(table: &str, set_clauses: &[String], where_clauses: &[String]) -> String {
    format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        set_clauses.join(", "),
        join_and(where_clauses)
    )
}

/// UPDATE followed by ` RETURNING r1, r2`.
pub fn build_update_returning_query<R: AsRef<str>>(
    table: &str,
    set_clauses: &[String],
    where_clauses: &[String],
    return_fields: &[R],
) -> String {
    format!(
        "{} RETURNING {}",
        build_update_query(table, set_clauses, where_clauses),
        join(return_fields)
    )
}

/// `DELETE FROM table WHERE c1 AND c2`
pub fn build_delete_query(table: &str, where_clauses: &[String]) -> String {
    format!("DELETE FROM {} WHERE {}", table, join_and(where_clauses))
}

/// DELETE followed by ` RETURNING r1, r2`.
pub fn build_delete_returning_query<R: AsRef<str>>(
    table: &str,
    where_clauses: &[String],
    return_fields: &[R],
) -> String {
    format!(
        "{} RETURNING {}",
        build_delete_query(table, where_clauses),
        join(return_fields)
    )
}

/// `SELECT fields FROM target WHERE EXISTS (SELECT 1 FROM source WHERE ...)`
pub fn build_select_exists_query<S: AsRef<str>>(
    target_table: &str,
    source_table: &str,
    fields: &[S],
    where_clauses: &[String],
) -> String {
    format!(
        "SELECT {} FROM {} WHERE EXISTS (SELECT 1 FROM {} WHERE {})",
        join(fields),
        target_table,
        source_table,
        join_and(where_clauses)
    )
}

/// `UPDATE target SET ... FROM source WHERE ...`
pub fn build_update_from_query(
    target_table: &str,
    source_table: &str,
    set_clauses: &[String],
    where_clauses: &[String],
) -> String {
    format!(
        "UPDATE {} SET {} FROM {} WHERE {}",
        target_table,
        set_clauses.join(", "),
        source_table,
        join_and(where_clauses)
    )
}

/// `DELETE FROM target WHERE EXISTS (SELECT 1 FROM source WHERE ...)`
pub fn build_delete_exists_query(
    target_table: &str,
    source_table: &str,
    where_clauses: &[String],
) -> String {
    format!(
        "DELETE FROM {} WHERE EXISTS (SELECT 1 FROM {} WHERE {})",
        target_table,
        source_table,
        join_and(where_clauses)
    )
}

/// INSERT with `ON CONFLICT (keys)`; `DO NOTHING` when `update_fields` is empty,
/// otherwise `DO UPDATE SET f = EXCLUDED.f` for each update field in order.
pub fn build_upsert_query<S: AsRef<str>, K: AsRef<str>, U: AsRef<str>>(
    table: &str,
    insert_fields: &[S],
    key_fields: &[K],
    update_fields: &[U],
) -> String {
    let insert = build_insert_query(table, insert_fields);
    if update_fields.is_empty() {
        return format!("{} ON CONFLICT ({}) DO NOTHING", insert, join(key_fields));
    }

    let set_clauses: Vec<String> = update_fields
        .iter()
        .map(|f| format!("{0} = EXCLUDED.{0}", f.as_ref()))
        .collect();
    format!(
        "{} ON CONFLICT ({}) DO UPDATE SET {}",
        insert,
        join(key_fields),
        set_clauses.join(", ")
    )
}

/// Upsert followed by ` RETURNING r1, r2`.
pub fn build_upsert_returning_query<S: AsRef<str>, K: AsRef<str>, U: AsRef<str>, R: AsRef<str>>(
    table: &str,
    insert_fields: &[S],
    key_fields: &[K],
    update_fields: &[U],
    return_fields: &[R],
) -> String {
    format!(
        "{} RETURNING {}",
        build_upsert_query(table, insert_fields, key_fields, update_fields),
        join(return_fields)
    )
}
