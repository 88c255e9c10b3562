//! Typed schema records and the assembled schema document
//!
//! Records decode from rows by column label, accepting the label variants
//! the supported dialects produce (`table_name`, `tablename`,
//! `Tables_in_<db>`, `Field`...). Serialization keeps the snake_case keys
//! tool callers expect.

use dbscope_core::{Row, Value};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Decoding of one record from a result row
pub(crate) trait FromRow: Sized {
    fn from_row(row: &Row) -> Option<Self>;
}

/// Decode every row, skipping rows that lack the record's key columns
pub(crate) fn decode_rows<T: FromRow>(rows: &[Row], operation: &str) -> Vec<T> {
    let records: Vec<T> = rows.iter().filter_map(T::from_row).collect();
    if records.len() < rows.len() {
        tracing::warn!(
            operation = %operation,
            skipped = rows.len() - records.len(),
            "skipped rows missing required columns"
        );
    }
    records
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_null(row: &Row, name: &str) -> Option<Value> {
    row.get(name).filter(|value| !value.is_null()).cloned()
}

/// A table name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub table_name: String,
}

impl FromRow for TableInfo {
    fn from_row(row: &Row) -> Option<Self> {
        let table_name = row
            .text_any(&["table_name", "tablename", "relname"])
            .or_else(|| {
                // SHOW TABLES labels its only column `Tables_in_<database>`
                let position = row
                    .columns()
                    .iter()
                    .position(|c| c.starts_with("Tables_in_"))
                    .or((row.len() == 1).then_some(0))?;
                row.get_index(position).and_then(Value::to_text)
            })?;
        Some(Self { table_name })
    }
}

/// One column of a table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udt_name: Option<String>,
    /// `YES` or `NO`
    pub is_nullable: String,
    pub column_default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_type: Option<String>,
}

impl FromRow for ColumnInfo {
    fn from_row(row: &Row) -> Option<Self> {
        let column_name = row.text_any(&["column_name", "Field"])?;
        let is_nullable = row
            .text_any(&["is_nullable", "Null"])
            .map(|v| v.trim().to_ascii_uppercase())
            .filter(|v| v == "NO")
            .unwrap_or_else(|| "YES".to_string());
        Some(Self {
            column_name,
            data_type: row.text_any(&["data_type", "Type"]).unwrap_or_default(),
            udt_name: row.text("udt_name"),
            is_nullable,
            column_default: row.text_any(&["column_default", "Default"]),
            enum_values: None,
            enum_type: None,
        })
    }
}

/// One column of a foreign-key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub table_schema: Option<String>,
    pub constraint_name: String,
    pub table_name: String,
    pub column_name: String,
    pub foreign_table_schema: Option<String>,
    pub foreign_table_name: String,
    pub foreign_column_name: String,
}

impl FromRow for ForeignKey {
    fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            table_schema: row.text("table_schema"),
            constraint_name: row.text("constraint_name").unwrap_or_default(),
            table_name: row.text("table_name")?,
            column_name: row.text("column_name").unwrap_or_default(),
            foreign_table_schema: row.text("foreign_table_schema"),
            foreign_table_name: row.text("foreign_table_name").unwrap_or_default(),
            foreign_column_name: row.text("foreign_column_name").unwrap_or_default(),
        })
    }
}

/// One column of a primary key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKey {
    pub table_name: String,
    pub column_name: String,
    pub constraint_name: String,
}

impl FromRow for PrimaryKey {
    fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            table_name: row.text("table_name").unwrap_or_default(),
            column_name: row.text("column_name")?,
            constraint_name: row.text("constraint_name").unwrap_or_default(),
        })
    }
}

/// An index and its columns, in index order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub table_name: String,
    pub index_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub column_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_unique: Option<bool>,
}

impl FromRow for IndexInfo {
    fn from_row(row: &Row) -> Option<Self> {
        let index_definition = row.text("indexdef");
        let is_unique = row
            .get("non_unique")
            .and_then(Value::as_i64)
            .map(|non_unique| non_unique == 0)
            .or_else(|| {
                index_definition
                    .as_deref()
                    .map(|def| def.to_ascii_uppercase().contains("UNIQUE INDEX"))
            });
        let column_names = row
            .text("column_names")
            .map(|names| split_list(&names))
            .or_else(|| row.text("column_name").map(|name| vec![name]))
            .unwrap_or_default();
        Some(Self {
            table_name: row.text_any(&["table_name", "tablename"]).unwrap_or_default(),
            index_name: row.text_any(&["index_name", "indexname"])?,
            column_names,
            index_definition,
            is_unique,
        })
    }
}

/// A UNIQUE or PRIMARY KEY constraint and its columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueConstraint {
    pub table_name: String,
    pub constraint_name: String,
    pub constraint_type: String,
    pub column_names: Vec<String>,
}

impl FromRow for UniqueConstraint {
    fn from_row(row: &Row) -> Option<Self> {
        let column_names = row
            .text("column_names")
            .map(|names| split_list(&names))
            .or_else(|| row.text("column_name").map(|name| vec![name]))
            .unwrap_or_default();
        Some(Self {
            table_name: row.text("table_name").unwrap_or_default(),
            constraint_name: row.text("constraint_name")?,
            constraint_type: row.text("constraint_type").unwrap_or_default(),
            column_names,
        })
    }
}

/// Fold per-column index rows (one row per column) into one entry per index
pub(crate) fn merge_index_columns(indexes: Vec<IndexInfo>) -> Vec<IndexInfo> {
    let mut merged: Vec<IndexInfo> = Vec::with_capacity(indexes.len());
    for index in indexes {
        match merged.last_mut() {
            Some(last) if last.table_name == index.table_name && last.index_name == index.index_name => {
                last.column_names.extend(index.column_names);
            }
            _ => merged.push(index),
        }
    }
    merged
}

/// Fold per-column constraint rows into one entry per constraint
pub(crate) fn merge_constraint_columns(constraints: Vec<UniqueConstraint>) -> Vec<UniqueConstraint> {
    let mut merged: Vec<UniqueConstraint> = Vec::with_capacity(constraints.len());
    for constraint in constraints {
        match merged.last_mut() {
            Some(last)
                if last.table_name == constraint.table_name
                    && last.constraint_name == constraint.constraint_name =>
            {
                last.column_names.extend(constraint.column_names);
            }
            _ => merged.push(constraint),
        }
    }
    merged
}

/// Approximate table statistics.
///
/// PostgreSQL fills the tuple and maintenance fields, MySQL the size and
/// time fields. The default value serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableStats {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count_estimate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_tuples: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_vacuum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_autovacuum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_analyze: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_autoanalyze: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_free: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<Value>,
}

impl FromRow for TableStats {
    fn from_row(row: &Row) -> Option<Self> {
        let number = |name: &str| row.get(name).and_then(Value::as_i64);
        Some(Self {
            table_name: row.text_any(&["table_name", "relname"])?,
            schema_name: row.text_any(&["schemaname", "table_schema"]),
            row_count_estimate: number("row_count_estimate"),
            dead_tuples: number("dead_tuples"),
            last_vacuum: non_null(row, "last_vacuum"),
            last_autovacuum: non_null(row, "last_autovacuum"),
            last_analyze: non_null(row, "last_analyze"),
            last_autoanalyze: non_null(row, "last_autoanalyze"),
            data_length: number("data_length"),
            index_length: number("index_length"),
            data_free: number("data_free"),
            create_time: non_null(row, "create_time"),
            update_time: non_null(row, "update_time"),
        })
    }
}

/// One row of the enum-values facet.
///
/// PostgreSQL yields one record per label (`enum_value`); MySQL yields one
/// record per enum column with the full `enum_definition`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumRecord {
    pub enum_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<f64>,
}

impl FromRow for EnumRecord {
    fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            enum_name: row.text("enum_name")?,
            schema_name: row.text("schema_name"),
            table_name: row.text("table_name"),
            enum_value: row.text("enum_value"),
            enum_definition: row.text("enum_definition"),
            sort_order: row.get("sort_order").and_then(Value::as_f64),
        })
    }
}

/// Enum type name to its labels, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EnumCatalog(BTreeMap<String, Vec<String>>);

impl EnumCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the catalog from enum-values records.
    ///
    /// Label records append to their type; MySQL definitions are parsed and
    /// stored under `table.column`.
    pub fn from_records(records: &[EnumRecord]) -> Self {
        let mut catalog = Self::new();
        for record in records {
            if let Some(label) = &record.enum_value {
                catalog
                    .0
                    .entry(record.enum_name.clone())
                    .or_default()
                    .push(label.clone());
            } else if let Some(definition) = &record.enum_definition {
                let key = match &record.table_name {
                    Some(table) => format!("{}.{}", table, record.enum_name),
                    None => record.enum_name.clone(),
                };
                catalog.0.insert(key, parse_enum_definition(definition));
            }
        }
        catalog
    }

    pub fn insert(&mut self, name: impl Into<String>, labels: Vec<String>) {
        self.0.insert(name.into(), labels);
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(name, labels)| (name.as_str(), labels.as_slice()))
    }
}

/// Parse the labels of a MySQL `enum('a','b')` column type.
///
/// Quotes are doubled (`''`) or backslash-escaped inside labels.
pub fn parse_enum_definition(definition: &str) -> Vec<String> {
    let trimmed = definition.trim();
    let body = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("enum(") => {
            let rest = &trimmed[5..];
            rest.strip_suffix(')').unwrap_or(rest)
        }
        _ => trimmed,
    };

    let mut labels = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut label = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\'' if chars.peek() == Some(&'\'') => {
                    chars.next();
                    label.push('\'');
                }
                '\'' => break,
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        label.push(escaped);
                    }
                }
                other => label.push(other),
            }
        }
        labels.push(label);
    }
    labels
}

/// Everything known about one table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnInfo>,
    pub primary_keys: Vec<PrimaryKey>,
    pub indexes: Vec<IndexInfo>,
    pub unique_constraints: Vec<UniqueConstraint>,
    pub statistics: TableStats,
    pub foreign_keys: Vec<ForeignKey>,
}

/// The assembled schema of one database.
///
/// Every table in `tables` is listed even when its details could not be
/// read; `detailed_schema` holds only tables whose columns were read, in
/// table-list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDocument {
    pub tables: Vec<TableInfo>,
    pub detailed_schema: IndexMap<String, TableSchema>,
    pub foreign_keys: Vec<ForeignKey>,
    pub enum_types: EnumCatalog,
    pub enum_values: Vec<EnumRecord>,
}

impl SchemaDocument {
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.table_name.as_str())
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.detailed_schema.get(name)
    }
}
