//! Units: the single-key `units` table.

use crate::db::execute::{self, batch};
use crate::db::{Database, DomainSchema, Executor, Repository, RowScanner, UnitOfWork};
use crate::error::{DbResult, ResultExt};
use crate::sql::statements::{
    build_delete_query, build_drop_table_query, build_insert_query, build_select_query,
    build_upsert_query, dollar_clause, tuple_in_clause,
};
use crate::sql::{QueryBuilder, SqlValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;

pub const TABLE_NAME: &str = "units";

pub const FIELD_ID: &str = "id";
pub const FIELD_VOCATION: &str = "vocation";
pub const FIELD_FACTION: &str = "faction";
pub const FIELD_NAME: &str = "name";
pub const FIELD_LEVEL: &str = "level";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_UPDATED_AT: &str = "updated_at";

/// Columns read back by every select, in scan order.
const SELECT_FIELDS: [&str; 7] = [
    FIELD_ID,
    FIELD_VOCATION,
    FIELD_FACTION,
    FIELD_NAME,
    FIELD_LEVEL,
    FIELD_CREATED_AT,
    FIELD_UPDATED_AT,
];

const INSERT_FIELDS: [&str; 5] = [FIELD_ID, FIELD_VOCATION, FIELD_FACTION, FIELD_NAME, FIELD_LEVEL];

const UPDATE_FIELDS: [&str; 4] = [FIELD_VOCATION, FIELD_FACTION, FIELD_NAME, FIELD_LEVEL];

pub const CREATE_TABLE_QUERY: &str = "CREATE TABLE IF NOT EXISTS units (
    id VARCHAR(255) PRIMARY KEY,
    vocation VARCHAR(255) NOT NULL,
    faction VARCHAR(255) NOT NULL,
    name VARCHAR(255) NOT NULL,
    level VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEntity {
    pub id: String,
    pub vocation: String,
    pub faction: String,
    pub name: String,
    pub level: String,
    /// Set by the database; ignored on write.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UnitEntity {
    pub fn new(
        id: impl Into<String>,
        vocation: impl Into<String>,
        faction: impl Into<String>,
        name: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            vocation: vocation.into(),
            faction: faction.into(),
            name: name.into(),
            level: level.into(),
            created_at: None,
            updated_at: None,
        }
    }

    fn insert_args(&self) -> Vec<SqlValue> {
        crate::sql_args![
            &self.id,
            &self.vocation,
            &self.faction,
            &self.name,
            &self.level
        ]
    }

    /// Update values followed by the key.
    fn update_args(&self) -> Vec<SqlValue> {
        crate::sql_args![
            &self.vocation,
            &self.faction,
            &self.name,
            &self.level,
            &self.id
        ]
    }
}

/// Scan a row selected with the unit column list.
pub fn scan_unit<R: RowScanner + ?Sized>(row: &R) -> DbResult<UnitEntity> {
    let scan = || -> DbResult<UnitEntity> {
        let mut columns = row.columns();
        Ok(UnitEntity {
            id: columns.next_column()?,
            vocation: columns.next_column()?,
            faction: columns.next_column()?,
            name: columns.next_column()?,
            level: columns.next_column()?,
            created_at: columns.next_column()?,
            updated_at: columns.next_column()?,
        })
    };
    scan().context("failed to scan unit entity")
}

/// Table lifecycle for `units`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitSchema;

#[async_trait]
impl DomainSchema for UnitSchema {
    fn name(&self) -> &str {
        TABLE_NAME
    }

    async fn create_table(&self, executor: &mut dyn Executor) -> DbResult<()> {
        executor.execute(CREATE_TABLE_QUERY, &[]).await?;
        Ok(())
    }

    async fn drop_table(&self, executor: &mut dyn Executor) -> DbResult<()> {
        let query = build_drop_table_query(TABLE_NAME);
        executor.execute(&query, &[]).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UnitRepository {
    database: Database,
}

impl UnitRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Retrieve a unit by its ID.
    pub async fn get_by_id(&self, uow: &UnitOfWork, id: &str) -> DbResult<UnitEntity> {
        let query = build_select_query(TABLE_NAME, &SELECT_FIELDS, &dollar_clause(1, &[FIELD_ID]));
        self.read_one(uow, &query, &[SqlValue::from(id)], scan_unit::<PgRow>)
            .await
    }

    /// Units of one faction, ordered by name.
    pub async fn get_by_faction(&self, uow: &UnitOfWork, faction: &str) -> DbResult<Vec<UnitEntity>> {
        let (mut query, args) = QueryBuilder::new()
            .select(&SELECT_FIELDS)
            .from(TABLE_NAME)
            .where_eq(FIELD_FACTION, faction)
            .build();
        query.push_str(" ORDER BY name");
        self.read_many(uow, &query, &args, scan_unit::<PgRow>).await
    }

    /// Number of units, optionally restricted to one faction.
    pub async fn count(&self, uow: &UnitOfWork, faction: Option<&str>) -> DbResult<i64> {
        match faction {
            Some(faction) => {
                execute::count(
                    &self.database,
                    uow,
                    TABLE_NAME,
                    &[FIELD_FACTION],
                    &[SqlValue::from(faction)],
                )
                .await
            }
            None => execute::count::<&str>(&self.database, uow, TABLE_NAME, &[], &[]).await,
        }
    }
}

#[async_trait]
impl Repository<UnitEntity> for UnitRepository {
    fn database(&self) -> &Database {
        &self.database
    }

    async fn create(&self, uow: &UnitOfWork, entities: &[UnitEntity]) -> DbResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }

        let query = build_insert_query(TABLE_NAME, &INSERT_FIELDS);
        let argument_sets: Vec<Vec<SqlValue>> =
            entities.iter().map(UnitEntity::insert_args).collect();
        batch(&self.database, uow, &query, &argument_sets).await
    }

    async fn update(&self, uow: &UnitOfWork, entities: &[UnitEntity]) -> DbResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }

        let (query, argument_sets) = QueryBuilder::new()
            .update(TABLE_NAME)
            .batch_sets(
                entities.iter().map(UnitEntity::update_args).collect(),
                &UPDATE_FIELDS,
            )
            .batch_where(FIELD_ID)
            .build_batch();
        batch(&self.database, uow, &query, &argument_sets).await
    }

    async fn upsert(&self, uow: &UnitOfWork, entities: &[UnitEntity]) -> DbResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }

        let query = build_upsert_query(TABLE_NAME, &INSERT_FIELDS, &[FIELD_ID], &UPDATE_FIELDS);
        let argument_sets: Vec<Vec<SqlValue>> =
            entities.iter().map(UnitEntity::insert_args).collect();
        batch(&self.database, uow, &query, &argument_sets).await
    }

    async fn delete(&self, uow: &UnitOfWork, entities: &[UnitEntity]) -> DbResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }

        let in_clause = tuple_in_clause(&[FIELD_ID], entities.len(), 1);
        let query = build_delete_query(TABLE_NAME, &[in_clause]);
        let values: Vec<SqlValue> = entities.iter().map(|e| SqlValue::from(&e.id)).collect();
        execute::execute(&self.database, uow, &query, &values).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_args_follow_insert_fields() {
        let unit = UnitEntity::new("u1", "Mage", "Horde", "Jaina", "12");
        assert_eq!(
            unit.insert_args(),
            vec![
                SqlValue::from("u1"),
                SqlValue::from("Mage"),
                SqlValue::from("Horde"),
                SqlValue::from("Jaina"),
                SqlValue::from("12"),
            ]
        );
        assert_eq!(unit.insert_args().len(), INSERT_FIELDS.len());
    }

    #[test]
    fn test_update_args_end_with_key() {
        let unit = UnitEntity::new("u1", "Mage", "Horde", "Jaina", "12");
        let args = unit.update_args();
        assert_eq!(args.len(), UPDATE_FIELDS.len() + 1);
        assert_eq!(args.last(), Some(&SqlValue::from("u1")));
    }

    #[test]
    fn test_keyed_update_template() {
        let unit = UnitEntity::new("u1", "Mage", "Horde", "Jaina", "12");
        let (query, sets) = QueryBuilder::new()
            .update(TABLE_NAME)
            .batch_sets(vec![unit.update_args()], &UPDATE_FIELDS)
            .batch_where(FIELD_ID)
            .build_batch();
        assert_eq!(
            query,
            "UPDATE units SET vocation = $1, faction = $2, name = $3, level = $4 WHERE id = $5"
        );
        assert_eq!(sets, vec![unit.update_args()]);
    }

    #[test]
    fn test_upsert_template() {
        let query = build_upsert_query(TABLE_NAME, &INSERT_FIELDS, &[FIELD_ID], &UPDATE_FIELDS);
        assert!(query.starts_with(
            "INSERT INTO units (id, vocation, faction, name, level) VALUES ($1, $2, $3, $4, $5)"
        ));
        assert!(query.ends_with("ON CONFLICT (id) DO UPDATE SET vocation = EXCLUDED.vocation, faction = EXCLUDED.faction, name = EXCLUDED.name, level = EXCLUDED.level"));
    }

    #[test]
    fn test_schema_name() {
        assert_eq!(UnitSchema.name(), "units");
        assert!(CREATE_TABLE_QUERY.starts_with("CREATE TABLE IF NOT EXISTS units"));
    }
}
