//! Entity modules built on the data-access core.
//!
//! Register schemas in dependency order: `unit` before `character_unit`.

pub mod character_unit;
pub mod unit;

pub use character_unit::{CharacterUnitEntity, CharacterUnitRepository, CharacterUnitSchema};
pub use unit::{UnitEntity, UnitRepository, UnitSchema};
