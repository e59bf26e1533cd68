//! Column references with an optional type-cast suffix.

use std::fmt;

/// A selected column, optionally followed by a cast such as `::timestamptz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryField {
    pub name: String,
    pub suffix: Option<String>,
}

impl QueryField {
    /// A plain column reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suffix: None,
        }
    }

    /// A column reference with a suffix appended verbatim.
    pub fn with_suffix(name: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suffix: Some(suffix.into()).filter(|s: &String| !s.is_empty()),
        }
    }
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suffix {
            Some(suffix) => write!(f, "{}{}", self.name, suffix),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for QueryField {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
