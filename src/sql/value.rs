//! Argument values carried by built statements.
//!
//! Builders never interpolate caller values into SQL text; every value becomes a
//! [`SqlValue`] in the argument list and is bound to its `$N` placeholder by the
//! executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Column type of a NULL argument.
///
/// Postgres needs a type for every bind parameter, so a NULL carries the type it
/// stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Bool,
    Int,
    Float,
    Uuid,
    Timestamp,
    Text,
    Bytes,
    Json,
}

/// A single bound argument.
///
/// Serialized adjacently tagged (`{"type": "int", "value": 3}`) so every variant
/// reads back as itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    /// NULL of the given column type
    Null(SqlType),
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// UUID value
    Uuid(Uuid),
    /// Timestamp with time zone
    Timestamp(DateTime<Utc>),
    /// String value
    Text(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// JSON document, bound as `jsonb`
    Json(JsonValue),
}

impl SqlValue {
    /// A NULL standing in for a value of type `sql_type`.
    pub fn null(sql_type: SqlType) -> Self {
        Self::Null(sql_type)
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// The column type this value binds as.
    pub fn sql_type(&self) -> SqlType {
        match self {
            Self::Null(sql_type) => *sql_type,
            Self::Bool(_) => SqlType::Bool,
            Self::Int(_) => SqlType::Int,
            Self::Float(_) => SqlType::Float,
            Self::Uuid(_) => SqlType::Uuid,
            Self::Timestamp(_) => SqlType::Timestamp,
            Self::Text(_) => SqlType::Text,
            Self::Bytes(_) => SqlType::Bytes,
            Self::Json(_) => SqlType::Json,
        }
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null(_) => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }
}

/// Rust types with a fixed column type, so `None` can bind as a typed NULL.
pub trait HasSqlType {
    const SQL_TYPE: SqlType;
}

macro_rules! impl_has_sql_type {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(impl HasSqlType for $ty {
            const SQL_TYPE: SqlType = SqlType::$kind;
        })+
    };
}

impl_has_sql_type!(
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    &str => Text,
    String => Text,
    &String => Text,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    JsonValue => Json,
);

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        Self::Int(v.into())
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<SqlValue> + HasSqlType> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null(T::SQL_TYPE), Into::into)
    }
}

/// Build a `Vec<SqlValue>` from heterogeneous values.
///
/// ```
/// use game_data::{sql_args, SqlValue};
///
/// let args = sql_args!["u-1", 3, true];
/// assert_eq!(args[1], SqlValue::Int(3));
/// ```
#[macro_export]
macro_rules! sql_args {
    () => {
        ::std::vec::Vec::<$crate::sql::SqlValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::sql::SqlValue::from($value)),+]
    };
}
