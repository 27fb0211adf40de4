use serde_json::{Map, Value};

use crate::row::TableRow;
use crate::{ErrorProto, util};

/// Body of a `tabledata.insertAll` (streaming insert) request.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllRequest {
    #[serde(default, skip_serializing_if = "util::is_false")]
    pub skip_invalid_rows: bool,
    #[serde(default, skip_serializing_if = "util::is_false")]
    pub ignore_unknown_values: bool,
    pub rows: Vec<InsertAllRow>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllRow {
    /// Best effort de-duplication key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<String>,
    pub json: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_errors: Vec<RowInsertErrors>,
}

impl InsertAllResponse {
    pub fn is_ok(&self) -> bool {
        self.insert_errors.is_empty()
    }
}

/// Errors for a single rejected row, `index` points into [`InsertAllRequest::rows`].
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowInsertErrors {
    #[serde(with = "util::int64")]
    pub index: i64,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

/// A page of `tabledata.list`.
#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDataList {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "util::int64::optional"
    )]
    pub total_rows: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<TableRow>,
}
