use std::fmt;

use bigquery_resources::ErrorProto;
use bigquery_resources::row::DecodeError;
use bigquery_resources::table_data::RowInsertErrors;

/// Errors returned by [`BigQuery`](crate::BigQuery) and the record operations.
///
/// Every variant except [`Error::NotInitialized`] is raised at an operation boundary and
/// carries the underlying [`ClientError`] as its source.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<ClientError>,
    },
    #[error("failed to initialize the BigQuery client")]
    Initialization(#[source] ClientError),
    #[error("BigQuery client not initialized")]
    NotInitialized,
    #[error("failed to look up {target}")]
    Lookup {
        target: String,
        #[source]
        source: ClientError,
    },
    #[error("failed to query {target}")]
    Query {
        target: String,
        #[source]
        source: ClientError,
    },
    #[error("failed to insert rows into table {table}")]
    Insert {
        table: String,
        #[source]
        source: ClientError,
    },
    #[error("failed to update {target}")]
    Update {
        target: String,
        #[source]
        source: ClientError,
    },
    #[error("failed to delete {target}")]
    Delete {
        target: String,
        #[source]
        source: ClientError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Initialization,
    NotInitialized,
    Lookup,
    Query,
    Insert,
    Update,
    Delete,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Initialization(_) => ErrorKind::Initialization,
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::Lookup { .. } => ErrorKind::Lookup,
            Self::Query { .. } => ErrorKind::Query,
            Self::Insert { .. } => ErrorKind::Insert,
            Self::Update { .. } => ErrorKind::Update,
            Self::Delete { .. } => ErrorKind::Delete,
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn lookup(target: impl fmt::Display, source: ClientError) -> Self {
        Self::Lookup {
            target: target.to_string(),
            source,
        }
    }

    pub(crate) fn query(target: impl fmt::Display, source: ClientError) -> Self {
        Self::Query {
            target: target.to_string(),
            source,
        }
    }

    pub(crate) fn update(target: impl fmt::Display, source: ClientError) -> Self {
        Self::Update {
            target: target.to_string(),
            source,
        }
    }

    pub(crate) fn delete(target: impl fmt::Display, source: ClientError) -> Self {
        Self::Delete {
            target: target.to_string(),
            source,
        }
    }

    /// The underlying cause, if any.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::NotInitialized => None,
            Self::Configuration { source, .. } => source.as_ref(),
            Self::Initialization(source) => Some(source),
            Self::Lookup { source, .. }
            | Self::Query { source, .. }
            | Self::Insert { source, .. }
            | Self::Update { source, .. }
            | Self::Delete { source, .. } => Some(source),
        }
    }

    /// The per-row errors reported by a streaming insert, if this error came from one.
    pub fn row_errors(&self) -> Option<&[RowInsertErrors]> {
        match self.client_error()? {
            ClientError::RowErrors(RowErrors(errors)) => Some(errors),
            _ => None,
        }
    }
}

/// The cause of a failed operation.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Auth(#[from] gcp_auth::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("BigQuery returned {status}: {error}")]
    Api {
        status: u16,
        #[source]
        error: ErrorProto,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    RowErrors(RowErrors),
    #[error("response missing expected field '{0}'")]
    MissingField(&'static str),
    #[error("{0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { status, error } => *status == 404 || error.is_not_found(),
            _ => false,
        }
    }

    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

/// Rows rejected by `tabledata.insertAll`, exactly as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct RowErrors(pub Vec<RowInsertErrors>);

impl fmt::Display for RowErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row(s) rejected", self.0.len())?;

        for row in self.0.iter() {
            write!(f, "; row {}: ", row.index)?;

            for (i, error) in row.errors.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt::Display::fmt(error, f)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for RowErrors {}
