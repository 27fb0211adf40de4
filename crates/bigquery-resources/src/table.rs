use std::collections::HashMap;

use super::TableReference;
use crate::builders::Unset;
use crate::builders::table_field_schema::TableFieldSchemaBuilder;
use crate::util;

#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_reference: Option<TableReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<TableSchema>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "util::int64::optional"
    )]
    pub num_rows: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "util::int64::optional"
    )]
    pub creation_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub ty: Option<TableType>,
}

impl Table {
    /// The table's columns, or an empty slice if the table was returned without a schema.
    pub fn fields(&self) -> &[TableFieldSchema] {
        match self.schema {
            Some(ref schema) => &schema.fields,
            None => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableType {
    Table,
    View,
    External,
    MaterializedView,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default)]
    pub mode: FieldMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nested columns, only present for [`FieldType::Record`] fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TableFieldSchema>,
}

impl TableFieldSchema {
    pub fn builder(name: impl Into<String>) -> TableFieldSchemaBuilder<Unset> {
        TableFieldSchemaBuilder::new(name.into())
    }

    pub fn new(name: impl Into<String>, ty: FieldType, mode: FieldMode) -> Self {
        Self {
            name: name.into(),
            ty,
            mode,
            description: None,
            fields: Vec::new(),
        }
    }
}

/// Omitted modes are treated as nullable by BigQuery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Repeated,
    Required,
}

impl FieldMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nullable => "NULLABLE",
            Self::Repeated => "REPEATED",
            Self::Required => "REQUIRED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Bytes,
    #[serde(alias = "INT64")]
    Integer,
    #[serde(alias = "FLOAT64")]
    Float,
    #[serde(rename = "BOOLEAN", alias = "BOOL")]
    Bool,
    Timestamp,
    Date,
    Time,
    DateTime,
    Geography,
    Numeric,
    BigNumeric,
    Json,
    #[serde(alias = "STRUCT")]
    Record,
    Range,
    Interval,
}

impl FieldType {
    /// The GoogleSQL type name, as used in query parameter types.
    pub const fn as_sql_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Bytes => "BYTES",
            Self::Integer => "INT64",
            Self::Float => "FLOAT64",
            Self::Bool => "BOOL",
            Self::Timestamp => "TIMESTAMP",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "DATETIME",
            Self::Geography => "GEOGRAPHY",
            Self::Numeric => "NUMERIC",
            Self::BigNumeric => "BIGNUMERIC",
            Self::Json => "JSON",
            Self::Record => "STRUCT",
            Self::Range => "RANGE",
            Self::Interval => "INTERVAL",
        }
    }
}

/// Body of a `tables.patch` request that only touches labels.
///
/// BigQuery merges the label map, so a label is removed by sending it with a `null` value.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LabelsPatch {
    pub labels: HashMap<String, Option<String>>,
}

impl LabelsPatch {
    /// Builds a patch that leaves the table with exactly `new` as its labels.
    pub fn replacing(current: &HashMap<String, String>, new: &HashMap<String, String>) -> Self {
        let mut labels: HashMap<String, Option<String>> = current
            .keys()
            .filter(|key| !new.contains_key(*key))
            .map(|key| (key.clone(), None))
            .collect();

        labels.extend(new.iter().map(|(k, v)| (k.clone(), Some(v.clone()))));

        Self { labels }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableList {
    #[serde(default)]
    pub tables: Vec<TableListEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default, with = "util::int64::optional")]
    pub total_items: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableListEntry {
    pub table_reference: TableReference,
    #[serde(default, rename = "type")]
    pub ty: Option<TableType>,
}
