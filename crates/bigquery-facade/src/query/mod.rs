use std::fmt;

use bigquery_resources::query::{QueryRequest, QueryResponse};
use bigquery_resources::row::decode_row;
use bigquery_resources::table::TableFieldSchema;

use crate::client::Connection;
use crate::error::ClientError;
use crate::{BigQuery, Error, Record};

mod statement;

pub use statement::{ParamValue, Statement, quote_identifier, quote_table};

/// The fully materialized result of a statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub job_id: Option<String>,
    pub schema: Vec<TableFieldSchema>,
    pub rows: Vec<Record>,
    /// Only set for DML statements.
    pub affected_rows: Option<u64>,
}

impl ResultSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows touched by a DML statement, `0` for anything else.
    #[inline]
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows.unwrap_or(0)
    }

    pub fn first(&self) -> Option<&Record> {
        self.rows.first()
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    /// Deserializes every row into `T`.
    pub fn deserialize_rows<T>(&self) -> Result<Vec<T>, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        self.rows
            .iter()
            .map(|row| serde_json::from_value(serde_json::Value::Object(row.clone())))
            .collect()
    }
}

impl BigQuery {
    /// Runs `statement`, waiting for the job to complete and collecting every page of results.
    pub async fn run_query(&self, statement: Statement) -> crate::Result<ResultSet> {
        let target = format!("statement `{}`", statement.sql());
        self.query_for(target, statement).await
    }

    /// Runs `statement`, reporting failures as a query of `target`.
    pub(crate) async fn query_for(
        &self,
        target: impl fmt::Display,
        statement: Statement,
    ) -> crate::Result<ResultSet> {
        let conn = self.connection()?;

        debug!(message = "running query", %target, sql = statement.sql());

        execute(conn, statement).await.map_err(|error| {
            error!(message = "query failed", %target, ?error);
            Error::query(target, error)
        })
    }
}

pub(crate) async fn execute(conn: &Connection, statement: Statement) -> Result<ResultSet, ClientError> {
    let options = conn.options();
    let (sql, parameters) = statement.into_parts();

    let mut request = QueryRequest::new(sql);
    request.timeout_ms = Some(options.query_timeout_ms());
    request.max_results = Some(options.page_size);
    request.location = options.location.clone();
    request.request_id = Some(uuid::Uuid::new_v4().to_string());

    if !parameters.is_empty() {
        request = parameters
            .into_iter()
            .fold(request, QueryRequest::with_parameter);
    }

    let resp = conn.post(conn.make_url(["queries"]), &request).await?;
    let mut response: QueryResponse = crate::client::deserialize_json(resp).await?;

    let Some(job_id) = response.job_reference.as_ref().map(|job_ref| job_ref.job_id.clone()) else {
        // dry runs and some cached results never create a job
        if response.job_complete && response.page_token.is_none() {
            return collect_results(None, response, Vec::new());
        }
        return Err(ClientError::MissingField("jobReference"));
    };

    let location = response
        .job_reference
        .as_ref()
        .and_then(|job_ref| job_ref.location.clone())
        .or_else(|| options.location.clone());

    while !response.job_complete {
        debug!(message = "query job not complete yet, polling", %job_id);
        response = get_query_results(conn, &job_id, location.as_deref(), None).await?;
    }

    let mut pages = Vec::new();

    while let Some(page_token) = response.page_token.take().filter(|token| !token.is_empty()) {
        let next = get_query_results(conn, &job_id, location.as_deref(), Some(&page_token)).await?;
        pages.push(std::mem::replace(&mut response, next));
    }

    collect_results(Some(job_id), response, pages)
}

/// Merges the first page (which carries the schema and DML stats) with any later pages,
/// decoding every row along the way.
fn collect_results(
    job_id: Option<String>,
    last: QueryResponse,
    mut pages: Vec<QueryResponse>,
) -> Result<ResultSet, ClientError> {
    pages.push(last);

    let first = &pages[0];

    for error in first.errors.iter() {
        warn!(message = "query reported a non-fatal error", %error);
    }

    let schema = first
        .schema
        .as_ref()
        .map(|schema| schema.fields.clone())
        .unwrap_or_default();

    let affected_rows = first
        .num_dml_affected_rows
        .map(|count| count.max(0) as u64);

    let mut rows = Vec::with_capacity(pages.iter().map(|page| page.rows.len()).sum());

    for page in pages.iter() {
        for row in page.rows.iter() {
            rows.push(decode_row(&schema, row)?);
        }
    }

    Ok(ResultSet {
        job_id,
        schema,
        rows,
        affected_rows,
    })
}

async fn get_query_results(
    conn: &Connection,
    job_id: &str,
    location: Option<&str>,
    page_token: Option<&str>,
) -> Result<QueryResponse, ClientError> {
    let options = conn.options();

    let mut builder = conn
        .request(reqwest::Method::GET, conn.make_url(["queries", job_id]))
        .await?
        .query(&[("timeoutMs", options.query_timeout_ms())])
        .query(&[("maxResults", options.page_size)]);

    if let Some(location) = location {
        builder = builder.query(&[("location", location)]);
    }

    if let Some(page_token) = page_token {
        builder = builder.query(&[("pageToken", page_token)]);
    }

    crate::client::deserialize_json(Connection::send(builder).await?).await
}
