//! Character-unit associations: the `character_units` table keyed by both columns.

use crate::db::execute::{batch, execute};
use crate::db::{Database, DomainSchema, Executor, Repository, RowScanner, UnitOfWork};
use crate::error::{DbError, DbResult, ResultExt};
use crate::sql::statements::{build_drop_table_query, build_select_query, dollar_clause};
use crate::sql::{QueryBuilder, SqlValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;

pub const TABLE_NAME: &str = "character_units";

pub const FIELD_CHARACTER_ID: &str = "character_id";
pub const FIELD_UNIT_ID: &str = "unit_id";

const FIELDS: [&str; 2] = [FIELD_CHARACTER_ID, FIELD_UNIT_ID];

/// References `units`, so the unit schema must be registered first.
pub const CREATE_TABLE_QUERY: &str = "CREATE TABLE IF NOT EXISTS character_units (
    character_id VARCHAR(255) NOT NULL,
    unit_id VARCHAR(255) NOT NULL,
    PRIMARY KEY (character_id, unit_id),
    CONSTRAINT fk_unit FOREIGN KEY (unit_id) REFERENCES units(id) ON DELETE CASCADE
)";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterUnitEntity {
    pub character_id: String,
    pub unit_id: String,
}

impl CharacterUnitEntity {
    pub fn new(character_id: impl Into<String>, unit_id: impl Into<String>) -> Self {
        Self {
            character_id: character_id.into(),
            unit_id: unit_id.into(),
        }
    }

    fn args(&self) -> Vec<SqlValue> {
        crate::sql_args![&self.character_id, &self.unit_id]
    }
}

pub fn scan_character_unit<R: RowScanner + ?Sized>(row: &R) -> DbResult<CharacterUnitEntity> {
    let mut columns = row.columns();
    let character_id = columns
        .next_column()
        .context("failed to scan character unit entity")?;
    let unit_id = columns
        .next_column()
        .context("failed to scan character unit entity")?;
    Ok(CharacterUnitEntity {
        character_id,
        unit_id,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CharacterUnitSchema;

#[async_trait]
impl DomainSchema for CharacterUnitSchema {
    fn name(&self) -> &str {
        TABLE_NAME
    }

    async fn create_table(&self, executor: &mut dyn Executor) -> DbResult<()> {
        executor.execute(CREATE_TABLE_QUERY, &[]).await?;
        Ok(())
    }

    async fn drop_table(&self, executor: &mut dyn Executor) -> DbResult<()> {
        executor
            .execute(&build_drop_table_query(TABLE_NAME), &[])
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CharacterUnitRepository {
    database: Database,
}

impl CharacterUnitRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Associations owned by one character.
    pub async fn get_by_character_id(
        &self,
        uow: &UnitOfWork,
        character_id: &str,
    ) -> DbResult<Vec<CharacterUnitEntity>> {
        self.get_by(uow, FIELD_CHARACTER_ID, character_id).await
    }

    /// Associations that reference one unit.
    pub async fn get_by_unit_id(
        &self,
        uow: &UnitOfWork,
        unit_id: &str,
    ) -> DbResult<Vec<CharacterUnitEntity>> {
        self.get_by(uow, FIELD_UNIT_ID, unit_id).await
    }

    async fn get_by(
        &self,
        uow: &UnitOfWork,
        field: &str,
        value: &str,
    ) -> DbResult<Vec<CharacterUnitEntity>> {
        let query = build_select_query(TABLE_NAME, &FIELDS, &dollar_clause(1, &[field]));
        self.read_many(
            uow,
            &query,
            &[SqlValue::from(value)],
            scan_character_unit::<PgRow>,
        )
        .await
    }
}

#[async_trait]
impl Repository<CharacterUnitEntity> for CharacterUnitRepository {
    fn database(&self) -> &Database {
        &self.database
    }

    async fn create(&self, uow: &UnitOfWork, entities: &[CharacterUnitEntity]) -> DbResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }

        let (query, argument_sets) = QueryBuilder::new()
            .insert_into(TABLE_NAME)
            .insert_fields(&FIELDS)
            .batch_values(entities.iter().map(CharacterUnitEntity::args).collect())
            .build_batch();
        batch(&self.database, uow, &query, &argument_sets).await
    }

    async fn update(&self, _uow: &UnitOfWork, _entities: &[CharacterUnitEntity]) -> DbResult<u64> {
        Err(DbError::unsupported(
            "update for character-unit associations",
        ))
    }

    async fn upsert(&self, _uow: &UnitOfWork, _entities: &[CharacterUnitEntity]) -> DbResult<u64> {
        Err(DbError::unsupported(
            "upsert for character-unit associations",
        ))
    }

    async fn delete(&self, uow: &UnitOfWork, entities: &[CharacterUnitEntity]) -> DbResult<u64> {
        if entities.is_empty() {
            return Ok(0);
        }

        let (query, args) = QueryBuilder::new()
            .delete_from(TABLE_NAME)
            .where_tuple_in(entities.iter().map(CharacterUnitEntity::args).collect(), &FIELDS)
            .build();
        execute(&self.database, uow, &query, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn test_delete_uses_tuple_in() {
        let entities = [
            CharacterUnitEntity::new("c1", "u1"),
            CharacterUnitEntity::new("c1", "u2"),
        ];
        let (query, args) = QueryBuilder::new()
            .delete_from(TABLE_NAME)
            .where_tuple_in(entities.iter().map(CharacterUnitEntity::args).collect(), &FIELDS)
            .build();
        assert_eq!(
            query,
            "DELETE FROM character_units WHERE (character_id, unit_id) IN (($1, $2), ($3, $4))"
        );
        assert_eq!(args, crate::sql_args!["c1", "u1", "c1", "u2"]);
    }

    #[test]
    fn test_create_template() {
        let (query, sets) = QueryBuilder::new()
            .insert_into(TABLE_NAME)
            .insert_fields(&FIELDS)
            .batch_values(vec![CharacterUnitEntity::new("c1", "u1").args()])
            .build_batch();
        assert_eq!(
            query,
            "INSERT INTO character_units (character_id, unit_id) VALUES ($1, $2)"
        );
        assert_eq!(sets.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_upsert_unsupported() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://game@127.0.0.1:1/game")
            .unwrap();
        let repo = CharacterUnitRepository::new(Database::from_pool(pool));
        let entities = [CharacterUnitEntity::new("c1", "u1")];

        let err = repo
            .update(&UnitOfWork::Detached, &entities)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Unsupported { .. }));
        let err = repo
            .upsert(&UnitOfWork::Detached, &entities)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_empty_writes_are_noops() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://game@127.0.0.1:1/game")
            .unwrap();
        let repo = CharacterUnitRepository::new(Database::from_pool(pool));
        assert_eq!(repo.create(&UnitOfWork::Detached, &[]).await.unwrap(), 0);
        assert_eq!(repo.delete(&UnitOfWork::Detached, &[]).await.unwrap(), 0);
    }
}
