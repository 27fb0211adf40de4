//! Serde models for the subset of the BigQuery REST v2 resources used by the facade.
use std::fmt;

pub mod builders;
pub mod dataset;
pub mod query;
pub mod row;
pub mod table;
pub mod table_data;
mod util;

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableReference {
    #[inline]
    pub fn dataset_reference(&self) -> DatasetReference {
        DatasetReference {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
        }
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub project_id: String,
    pub dataset_id: String,
}

impl DatasetReference {
    #[inline]
    pub fn into_table(self, table_id: impl Into<String>) -> TableReference {
        TableReference {
            project_id: self.project_id,
            dataset_id: self.dataset_id,
            table_id: table_id.into(),
        }
    }
}

/// A single error, as reported in error responses, job statuses and insert errors.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for ErrorProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.reason, &self.location) {
            (Some(reason), Some(location)) => write!(f, "{} ({reason} at {location})", self.message),
            (Some(reason), None) => write!(f, "{} ({reason})", self.message),
            (None, Some(location)) => write!(f, "{} (at {location})", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ErrorProto {}

impl ErrorProto {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            reason: None,
            location: None,
            debug_info: None,
            message: message.into(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.reason.as_deref() == Some("notFound")
    }
}

/// The envelope every non-2xx JSON response is wrapped in:
/// `{"error": {"code": 404, "message": "...", "errors": [...], "status": "NOT_FOUND"}}`
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStatus {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ErrorStatus {
    /// Returns the first detailed error, falling back to the top level message.
    pub fn main_error(&self) -> ErrorProto {
        match self.errors.first() {
            Some(first) => first.clone(),
            None => {
                let proto = ErrorProto::new(self.message.clone());
                match self.status {
                    Some(ref status) => proto.with_reason(status.clone()),
                    None => proto,
                }
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code == 404 || self.errors.iter().any(ErrorProto::is_not_found)
    }
}
