//! Black-box tests for SQL generation.
//!
//! Every statement shape the repositories rely on is parsed with a Postgres
//! dialect parser, so a malformed template fails here rather than at runtime.

use game_data::domains::{character_unit, unit};
use game_data::sql::statements::{
    build_count_query, build_delete_exists_query, build_delete_query,
    build_delete_returning_query, build_drop_table_query, build_insert_query,
    build_insert_returning_query, build_select_exists_query, build_select_query,
    build_temp_table_query, build_update_from_query, build_update_query,
    build_update_returning_query, build_upsert_query, build_upsert_returning_query,
    dollar_clause, named_clause, temp_table_name, tuple_in_clause,
};
use game_data::sql::{QueryBuilder, QueryField};
use game_data::{SqlValue, sql_args};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn assert_parses(sql: &str) {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .unwrap_or_else(|e| panic!("failed to parse {sql:?}: {e}"));
    assert_eq!(statements.len(), 1, "expected one statement in {sql:?}");
}

fn placeholder_count(sql: &str) -> usize {
    let mut count = 0;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            count += 1;
        }
    }
    count
}

// =============================================================================
// Builder properties
// =============================================================================

#[test]
fn test_where_eq_sequence_numbers_placeholders() {
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let n = rng.gen_range(1..=20);
        let pairs: Vec<(String, i64)> = (0..n)
            .map(|i| (format!("f{}_{}", i, random_string(4)), rng.r#gen()))
            .collect();

        let qb = pairs.iter().fold(
            QueryBuilder::new().select(&["id"]).from("t"),
            |qb, (field, value)| qb.where_eq(field, *value),
        );
        let (sql, args) = qb.build();

        assert_eq!(args.len(), n);
        assert_eq!(placeholder_count(&sql), n);
        for (k, (field, value)) in pairs.iter().enumerate() {
            assert!(sql.contains(&format!("{} = ${}", field, k + 1)));
            assert_eq!(args[k], SqlValue::Int(*value));
        }
        assert_parses(&sql);
    }
}

#[test]
fn test_where_in_with_no_values_changes_nothing() {
    let (sql, args) = QueryBuilder::new()
        .select(&["id"])
        .from("t")
        .where_in("id", Vec::<i64>::new())
        .build();
    assert_eq!(sql, "SELECT id FROM t");
    assert!(args.is_empty());
}

#[test]
fn test_where_tuple_in() {
    let (sql, args) = QueryBuilder::new()
        .select(&["x", "y"])
        .from("t")
        .where_tuple_in(vec![sql_args!["a", "b"], sql_args!["c", "d"]], &["x", "y"])
        .build();
    assert_eq!(sql, "SELECT x, y FROM t WHERE (x, y) IN (($1, $2), ($3, $4))");
    assert_eq!(args, sql_args!["a", "b", "c", "d"]);
    assert_parses(&sql);
}

#[test]
fn test_batch_values_template_ignores_row_count() {
    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let rows = rng.gen_range(1..=50);
        let sets: Vec<Vec<SqlValue>> = (0..rows)
            .map(|i| sql_args![random_string(8), i as i64, true])
            .collect();

        let (sql, out) = QueryBuilder::new()
            .insert_into("units")
            .insert_fields(&["id", "level", "active"])
            .batch_values(sets.clone())
            .build_batch();

        assert_eq!(sql, "INSERT INTO units (id, level, active) VALUES ($1, $2, $3)");
        assert_eq!(out, sets);
    }
}

#[test]
fn test_batch_update_splices_shared_where_args() {
    let (sql, sets) = QueryBuilder::new()
        .update("users")
        .batch_sets(
            vec![sql_args!["ann", "a@x"], sql_args!["bob", "b@x"]],
            &["name", "email"],
        )
        .where_eq("active", true)
        .build_batch();

    assert_eq!(sql, "UPDATE users SET name = $1, email = $2 WHERE active = $3");
    assert_eq!(
        sets,
        vec![
            sql_args!["ann", "a@x", true],
            sql_args!["bob", "b@x", true]
        ]
    );
    assert_parses(&sql);
}

#[test]
fn test_batch_upsert() {
    let (sql, sets) = QueryBuilder::new()
        .insert_into("units")
        .insert_fields(&["id", "name"])
        .batch_upsert(vec![sql_args!["u1", "a"]], &["id"], &["name"])
        .build_batch();
    assert_eq!(
        sql,
        "INSERT INTO units (id, name) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"
    );
    assert_eq!(sets.len(), 1);
    assert_parses(&sql);
}

#[test]
fn test_values_never_reach_sql_text() {
    for hostile in [
        "'; DROP TABLE users--",
        "1' UNION SELECT NULL, NULL--",
        "$1",
    ] {
        let (sql, args) = QueryBuilder::new()
            .select(&["id"])
            .from("units")
            .where_eq("name", hostile)
            .build();
        assert_eq!(sql, "SELECT id FROM units WHERE name = $1");
        assert_eq!(args, sql_args![hostile]);
    }
}

#[test]
fn test_select_fields_with_casts() {
    let (sql, _) = QueryBuilder::new()
        .select_fields(&[
            QueryField::new("id"),
            QueryField::with_suffix("created_at", "::timestamptz"),
        ])
        .from("units")
        .where_eq("id", "u1")
        .build();
    assert_eq!(sql, "SELECT id, created_at::timestamptz FROM units WHERE id = $1");
    assert_parses(&sql);
}

// =============================================================================
// One-shot statements
// =============================================================================

#[test]
fn test_upsert_query_conflict_actions() {
    assert!(
        build_upsert_query("t", &["id", "name"], &["id"], &[] as &[&str])
            .ends_with("ON CONFLICT (id) DO NOTHING")
    );
    assert!(
        build_upsert_query("t", &["id", "name"], &["id"], &["name"])
            .ends_with("DO UPDATE SET name = EXCLUDED.name")
    );
}

#[test]
fn test_generated_statements_parse() {
    let where_id = dollar_clause(1, &["id"]);
    let set = dollar_clause(1, &["name", "level"]);
    let where_after_set = dollar_clause(3, &["id"]);
    let tmp = temp_table_name("units");
    let joined = named_clause(&["id"], "units", &tmp);

    let statements = vec![
        build_insert_query("units", &["id", "name"]),
        build_insert_returning_query("units", &["id", "name"], &["created_at"]),
        build_select_query("units", &["id", "name"], &where_id),
        build_select_query("units", &["id"], &[]),
        build_update_query("units", &set, &where_after_set),
        build_update_returning_query("units", &set, &where_after_set, &["updated_at"]),
        build_delete_query("units", &where_id),
        build_delete_query("units", &[tuple_in_clause(&["a", "b"], 3, 1)]),
        build_delete_returning_query("units", &where_id, &["id"]),
        build_upsert_query("units", &["id", "name"], &["id"], &["name"]),
        build_upsert_returning_query("units", &["id", "name"], &["id"], &["name"], &["id"]),
        build_count_query("units", &[]),
        build_count_query("units", &where_id),
        build_drop_table_query("units"),
        build_select_exists_query("units", &tmp, &["id"], &joined),
        build_update_from_query("units", &tmp, &named_clause(&["name"], "", &tmp), &joined),
        build_delete_exists_query("units", &tmp, &joined),
        build_temp_table_query(&tmp, "units", &["id", "name"]),
    ];

    for sql in &statements {
        assert_parses(sql);
    }
}

#[test]
fn test_domain_ddl_parses() {
    assert_parses(unit::CREATE_TABLE_QUERY);
    assert_parses(character_unit::CREATE_TABLE_QUERY);
    assert_parses(&build_drop_table_query(unit::TABLE_NAME));
}

#[test]
fn test_placeholders_match_args_in_single_mode() {
    let (sql, args) = QueryBuilder::new()
        .update("units")
        .set("name", "a")
        .set("level", 3)
        .where_eq("id", "u1")
        .where_in("faction", ["x", "y"])
        .returning(&["id"])
        .build();
    assert_eq!(placeholder_count(&sql), args.len());
    assert_eq!(
        sql,
        "UPDATE units SET name = $1, level = $2 WHERE id = $3 AND faction IN ($4, $5) RETURNING id"
    );
    assert_parses(&sql);
}
