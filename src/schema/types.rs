//! Logical table and column model
//!
//! Storage types (immutable once a column exists):
//! - integer: 32-bit signed integer
//! - double: 64-bit floating point
//! - boolean
//! - date, datetime, time
//! - varchar: UTF-8 text with a size that may only grow

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::design::TenantId;

/// Largest representable text size. Terminal: an unbounded column never changes size again.
pub const UNBOUNDED_SIZE: u32 = i32::MAX as u32;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Integer,
    Double,
    Boolean,
    Date,
    DateTime,
    Time,
    Varchar,
}

impl StorageType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            StorageType::Integer => "integer",
            StorageType::Double => "double",
            StorageType::Boolean => "boolean",
            StorageType::Date => "date",
            StorageType::DateTime => "datetime",
            StorageType::Time => "time",
            StorageType::Varchar => "varchar",
        }
    }

    /// Only strings carry a size.
    pub fn is_string(&self) -> bool {
        matches!(self, StorageType::Varchar)
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub storage_type: StorageType,
    /// Text size; `None` for non-string columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ColumnSpec {
    /// Create a nullable column of a non-string type
    pub fn new(name: impl Into<String>, storage_type: StorageType) -> Self {
        Self {
            name: name.into(),
            storage_type,
            size: None,
            nullable: true,
            label: None,
            description: None,
        }
    }

    /// Create a nullable varchar column
    pub fn varchar(name: impl Into<String>, size: u32) -> Self {
        Self {
            size: Some(size),
            ..Self::new(name, StorageType::Varchar)
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.size == Some(UNBOUNDED_SIZE)
    }

    /// Name used for case-insensitive lookups.
    pub fn folded_name(&self) -> String {
        fold_name(&self.name)
    }
}

/// A tenant-owned table: a primary key plus an unordered set of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTable {
    pub tenant: TenantId,
    pub name: String,
    pub primary_key: ColumnSpec,
    /// Non-key columns indexed by folded name
    columns: BTreeMap<String, ColumnSpec>,
}

impl SchemaTable {
    pub fn new(tenant: TenantId, name: impl Into<String>, primary_key: ColumnSpec) -> Self {
        Self {
            tenant,
            name: name.into(),
            primary_key: primary_key.required(),
            columns: BTreeMap::new(),
        }
    }

    /// Looks up a column by name, case-insensitively. Includes the primary key.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        let folded = fold_name(name);
        if self.primary_key.folded_name() == folded {
            return Some(&self.primary_key);
        }
        self.columns.get(&folded)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Adds a column. Returns false, leaving the table untouched, if the name is taken.
    pub fn insert_column(&mut self, column: ColumnSpec) -> bool {
        if self.has_column(&column.name) {
            return false;
        }
        self.columns.insert(column.folded_name(), column);
        true
    }

    /// Sets a string column's size. Returns false if the column does not exist.
    pub fn set_column_size(&mut self, name: &str, size: u32) -> bool {
        let folded = fold_name(name);
        if self.primary_key.folded_name() == folded {
            self.primary_key.size = Some(size);
            return true;
        }
        match self.columns.get_mut(&folded) {
            Some(column) => {
                column.size = Some(size);
                true
            }
            None => false,
        }
    }

    /// Non-key columns in name order.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.values()
    }

    /// Number of non-key columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// All column names, primary key first.
    pub fn column_names(&self) -> Vec<&str> {
        std::iter::once(self.primary_key.name.as_str())
            .chain(self.columns.values().map(|c| c.name.as_str()))
            .collect()
    }
}

/// Lookup key for table and column names, which compare case-insensitively.
pub(crate) fn fold_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey_table() -> SchemaTable {
        SchemaTable::new(
            TenantId::new("T1"),
            "Survey",
            ColumnSpec::new("Key", StorageType::Integer),
        )
    }

    #[test]
    fn test_primary_key_is_required() {
        let table = survey_table();
        assert!(!table.primary_key.nullable);
        assert_eq!(table.column_names(), vec!["Key"]);
        assert_eq!(table.column_count(), 0);
    }

    #[test]
    fn test_column_lookup_case_insensitive() {
        let mut table = survey_table();
        assert!(table.insert_column(ColumnSpec::new("Mood", StorageType::Integer)));
        assert!(table.has_column("mood"));
        assert!(table.has_column("KEY"));
        assert_eq!(table.column("MOOD").unwrap().name, "Mood");
    }

    #[test]
    fn test_insert_rejects_taken_name() {
        let mut table = survey_table();
        assert!(table.insert_column(ColumnSpec::varchar("Note", 10)));
        assert!(!table.insert_column(ColumnSpec::varchar("NOTE", 99)));
        assert!(!table.insert_column(ColumnSpec::new("key", StorageType::Integer)));
        assert_eq!(table.column("note").unwrap().size, Some(10));
    }

    #[test]
    fn test_column_names_order() {
        let mut table = survey_table();
        table.insert_column(ColumnSpec::new("ParticipantId", StorageType::Integer));
        table.insert_column(ColumnSpec::new("Mood", StorageType::Integer));
        assert_eq!(table.column_names(), vec!["Key", "Mood", "ParticipantId"]);
    }

    #[test]
    fn test_set_column_size() {
        let mut table = survey_table();
        table.insert_column(ColumnSpec::varchar("Note", 10));
        assert!(table.set_column_size("note", UNBOUNDED_SIZE));
        assert!(table.column("Note").unwrap().is_unbounded());
        assert!(!table.set_column_size("Missing", 5));
    }

    #[test]
    fn test_storage_type_names() {
        assert_eq!(StorageType::DateTime.type_name(), "datetime");
        assert!(StorageType::Varchar.is_string());
        assert!(!StorageType::Integer.is_string());
    }

    #[test]
    fn test_table_serde_shape() {
        let mut table = survey_table();
        table.insert_column(ColumnSpec::new("Mood", StorageType::Integer));
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["name"], "Survey");
        assert_eq!(json["primary_key"]["storage_type"], "integer");
        assert!(json["columns"]["mood"]["size"].is_null());
        let back: SchemaTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }
}
