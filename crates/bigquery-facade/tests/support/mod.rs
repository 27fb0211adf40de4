//! An in-process stand-in for the BigQuery REST API, just large enough to drive the facade.
//!
//! Every table shares the orders schema. Only the statement shapes the facade emits are
//! understood, anything else is answered with a 400 `invalidQuery` error.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bigquery_facade::resources::query::{JobReference, QueryParameter, QueryRequest, QueryResponse};
use bigquery_facade::resources::row::{TableCell, TableRow, encode_row};
use bigquery_facade::resources::table::{Table, TableFieldSchema, TableSchema};
use bigquery_facade::resources::table_data::{
    InsertAllRequest, InsertAllResponse, RowInsertErrors, TableDataList,
};
use bigquery_facade::resources::{ErrorProto, ErrorResponse, ErrorStatus, TableReference};
use bigquery_facade::sample::orders_schema;
use bigquery_facade::{BigQuery, FacadeOptions, Record, TableRef};
use regex::Regex;
use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use tokio::net::TcpListener;

pub const PROJECT_ID: &str = "demo-project";
pub const DATASET_ID: &str = "TesteBigQuery";
pub const TABLE_ID: &str = "VendasLBC";

pub fn orders_table() -> TableRef {
    TableRef::new(DATASET_ID, TABLE_ID)
}

/// A running fake, along with a credential file that points the facade at it.
pub struct FakeBigQuery {
    pub addr: SocketAddr,
    pub state: Arc<FakeState>,
    credentials: tempfile::NamedTempFile,
    server: tokio::task::JoinHandle<()>,
}

#[derive(Default)]
pub struct FakeState {
    requests: AtomicUsize,
    job_counter: AtomicUsize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    /// dataset -> table -> rows, in insertion order.
    datasets: BTreeMap<String, BTreeMap<String, Vec<Record>>>,
    jobs: HashMap<String, Job>,
    /// How many `jobComplete: false` answers each new query job gets before completing.
    incomplete_polls: usize,
    labels: HashMap<String, String>,
}

struct Job {
    polls_left: usize,
    result: QueryResponse,
}

impl FakeState {
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn set_incomplete_polls(&self, polls: usize) {
        self.inner.lock().unwrap().incomplete_polls = polls;
    }

    pub fn create_table(&self, dataset_id: &str, table_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .datasets
            .entry(dataset_id.to_owned())
            .or_default()
            .entry(table_id.to_owned())
            .or_default();
    }

    pub fn rows(&self, dataset_id: &str, table_id: &str) -> Vec<Record> {
        self.inner
            .lock()
            .unwrap()
            .datasets
            .get(dataset_id)
            .and_then(|tables| tables.get(table_id))
            .cloned()
            .unwrap_or_default()
    }

    fn hit(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeBigQuery {
    /// Starts the fake with an empty orders table.
    pub async fn start() -> Self {
        init_tracing();

        let state = Arc::new(FakeState::default());
        state.create_table(DATASET_ID, TABLE_ID);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let router = router(Arc::clone(&state));
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let mut credentials = tempfile::NamedTempFile::new().unwrap();
        write!(
            credentials,
            r#"{{"type": "service_account", "project_id": "{PROJECT_ID}"}}"#
        )
        .unwrap();

        Self {
            addr,
            state,
            credentials,
            server,
        }
    }

    pub fn options(&self) -> FacadeOptions {
        FacadeOptions::builder()
            .emulator_host(self.addr.to_string())
            .page_size(4)
            .build()
    }

    pub fn facade(&self) -> BigQuery {
        BigQuery::with_options(self.credentials.path(), self.options()).unwrap()
    }

    pub async fn initialized_facade(&self) -> BigQuery {
        let mut bq = self.facade();
        bq.initialize(None).await.unwrap();
        bq
    }
}

impl Drop for FakeBigQuery {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn init_tracing() {
    static INIT: LazyLock<()> = LazyLock::new(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });

    LazyLock::force(&INIT);
}

fn router(state: Arc<FakeState>) -> Router {
    const ROOT: &str = "/bigquery/v2/projects/{project}";

    Router::new()
        .route(&format!("{ROOT}/datasets"), get(list_datasets))
        .route(&format!("{ROOT}/datasets/{{dataset}}"), get(get_dataset))
        .route(&format!("{ROOT}/datasets/{{dataset}}/tables"), get(list_tables))
        .route(
            &format!("{ROOT}/datasets/{{dataset}}/tables/{{table}}"),
            get(get_table).patch(patch_table).delete(delete_table),
        )
        .route(
            &format!("{ROOT}/datasets/{{dataset}}/tables/{{table}}/insertAll"),
            post(insert_all),
        )
        .route(
            &format!("{ROOT}/datasets/{{dataset}}/tables/{{table}}/data"),
            get(list_data),
        )
        .route(&format!("{ROOT}/queries"), post(query))
        .route(&format!("{ROOT}/queries/{{job_id}}"), get(get_query_results))
        .with_state(state)
}

fn error_response(status: StatusCode, reason: &str, message: impl Into<String>) -> Response {
    let message = message.into();

    let body = ErrorResponse {
        error: ErrorStatus {
            code: status.as_u16(),
            message: message.clone(),
            errors: vec![ErrorProto::new(message).with_reason(reason)],
            status: None,
        },
    };

    (status, Json(body)).into_response()
}

fn not_found(what: impl std::fmt::Display) -> Response {
    error_response(StatusCode::NOT_FOUND, "notFound", format!("Not found: {what}"))
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageParams {
    max_results: Option<usize>,
    page_token: Option<String>,
}

impl PageParams {
    fn window(&self, len: usize) -> (usize, usize, Option<String>) {
        let start = self
            .page_token
            .as_deref()
            .and_then(|token| token.parse().ok())
            .unwrap_or(0usize)
            .min(len);
        let end = start
            .saturating_add(self.max_results.unwrap_or(usize::MAX))
            .min(len);
        let next = (end < len).then(|| end.to_string());
        (start, end, next)
    }
}

async fn list_datasets(State(state): State<Arc<FakeState>>, Path(project): Path<String>) -> Response {
    state.hit();
    let inner = state.inner.lock().unwrap();

    let datasets: Vec<_> = inner
        .datasets
        .keys()
        .map(|dataset_id| {
            json!({ "datasetReference": { "projectId": project, "datasetId": dataset_id } })
        })
        .collect();

    Json(json!({ "datasets": datasets })).into_response()
}

async fn get_dataset(
    State(state): State<Arc<FakeState>>,
    Path((project, dataset)): Path<(String, String)>,
) -> Response {
    state.hit();
    let inner = state.inner.lock().unwrap();

    if !inner.datasets.contains_key(&dataset) {
        return not_found(format_args!("Dataset {project}:{dataset}"));
    }

    Json(json!({
        "id": format!("{project}:{dataset}"),
        "datasetReference": {"projectId": project, "datasetId": dataset},
        "location": "US",
    }))
    .into_response()
}

async fn list_tables(
    State(state): State<Arc<FakeState>>,
    Path((project, dataset)): Path<(String, String)>,
) -> Response {
    state.hit();
    let inner = state.inner.lock().unwrap();

    let Some(tables) = inner.datasets.get(&dataset) else {
        return not_found(format_args!("Dataset {project}:{dataset}"));
    };

    let tables: Vec<_> = tables
        .keys()
        .map(|table_id| {
            json!({
                "tableReference": {"projectId": project, "datasetId": dataset, "tableId": table_id},
                "type": "TABLE",
            })
        })
        .collect();

    Json(json!({ "tables": tables, "totalItems": tables.len() })).into_response()
}

fn table_resource(project: &str, dataset: &str, table: &str, rows: usize, labels: &HashMap<String, String>) -> Table {
    Table {
        id: Some(format!("{project}:{dataset}.{table}")),
        table_reference: Some(TableReference {
            project_id: project.to_owned(),
            dataset_id: dataset.to_owned(),
            table_id: table.to_owned(),
        }),
        labels: labels.clone(),
        schema: Some(TableSchema {
            fields: orders_schema(),
        }),
        num_rows: Some(rows as i64),
        ..Default::default()
    }
}

async fn get_table(
    State(state): State<Arc<FakeState>>,
    Path((project, dataset, table)): Path<(String, String, String)>,
) -> Response {
    state.hit();
    let inner = state.inner.lock().unwrap();

    match inner.datasets.get(&dataset).and_then(|tables| tables.get(&table)) {
        Some(rows) => Json(table_resource(&project, &dataset, &table, rows.len(), &inner.labels))
            .into_response(),
        None => not_found(format_args!("Table {project}:{dataset}.{table}")),
    }
}

#[derive(serde::Deserialize)]
struct PatchBody {
    labels: HashMap<String, Option<String>>,
}

async fn patch_table(
    State(state): State<Arc<FakeState>>,
    Path((project, dataset, table)): Path<(String, String, String)>,
    Json(patch): Json<PatchBody>,
) -> Response {
    state.hit();
    let mut inner = state.inner.lock().unwrap();

    let Some(rows) = inner
        .datasets
        .get(&dataset)
        .and_then(|tables| tables.get(&table))
        .map(Vec::len)
    else {
        return not_found(format_args!("Table {project}:{dataset}.{table}"));
    };

    for (key, value) in patch.labels {
        match value {
            Some(value) => inner.labels.insert(key, value),
            None => inner.labels.remove(&key),
        };
    }

    Json(table_resource(&project, &dataset, &table, rows, &inner.labels)).into_response()
}

async fn delete_table(
    State(state): State<Arc<FakeState>>,
    Path((project, dataset, table)): Path<(String, String, String)>,
) -> Response {
    state.hit();
    let mut inner = state.inner.lock().unwrap();

    match inner.datasets.get_mut(&dataset).and_then(|tables| tables.remove(&table)) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(format_args!("Table {project}:{dataset}.{table}")),
    }
}

async fn insert_all(
    State(state): State<Arc<FakeState>>,
    Path((project, dataset, table)): Path<(String, String, String)>,
    Json(request): Json<InsertAllRequest>,
) -> Response {
    state.hit();
    let mut inner = state.inner.lock().unwrap();

    let Some(rows) = inner
        .datasets
        .get_mut(&dataset)
        .and_then(|tables| tables.get_mut(&table))
    else {
        return not_found(format_args!("Table {project}:{dataset}.{table}"));
    };

    let schema = orders_schema();
    let mut insert_errors = Vec::new();
    let mut accepted = Vec::with_capacity(request.rows.len());

    for (index, row) in request.rows.into_iter().enumerate() {
        let unknown = row
            .json
            .keys()
            .find(|key| !schema.iter().any(|field| &field.name == *key));

        match unknown {
            Some(key) if !request.ignore_unknown_values => {
                let mut error = ErrorProto::new(format!("no such field: {key}.")).with_reason("invalid");
                error.location = Some(key.clone());

                insert_errors.push(RowInsertErrors {
                    index: index as i64,
                    errors: vec![error],
                });
            }
            _ => accepted.push(row.json),
        }
    }

    if insert_errors.is_empty() || request.skip_invalid_rows {
        rows.extend(accepted);
    }

    Json(InsertAllResponse { insert_errors }).into_response()
}

async fn list_data(
    State(state): State<Arc<FakeState>>,
    Path((project, dataset, table)): Path<(String, String, String)>,
    Query(params): Query<PageParams>,
) -> Response {
    state.hit();
    let inner = state.inner.lock().unwrap();

    let Some(rows) = inner.datasets.get(&dataset).and_then(|tables| tables.get(&table)) else {
        return not_found(format_args!("Table {project}:{dataset}.{table}"));
    };

    let schema = orders_schema();
    let (start, end, page_token) = params.window(rows.len());

    Json(TableDataList {
        total_rows: Some(rows.len() as i64),
        page_token,
        rows: rows[start..end].iter().map(|row| encode_row(&schema, row)).collect(),
    })
    .into_response()
}

static DELETE_WHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^DELETE FROM `([^`]+)` WHERE (.+)$").unwrap());
static UPDATE_WHERE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^UPDATE `([^`]+)` SET (\w+) = @(\w+) WHERE (.+)$").unwrap()
});
static SELECT_WHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SELECT \* FROM `([^`]+)` WHERE (.+)$").unwrap());
static SELECT_ORDERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^SELECT (\*|\w+(?:, \w+)*) FROM `([^`]+)` ORDER BY (\w+)$").unwrap()
});
static SELECT_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SELECT \* FROM `([^`]+)` LIMIT (\d+)$").unwrap());
static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SELECT COUNT\(\*\) AS total FROM `([^`]+)`$").unwrap());
static SELECT_UNNESTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^SELECT (\w+)\.\w+(?:, \w+\.\w+)* FROM `([^`]+)`, UNNEST\((\w+)\) AS \w+ WHERE (.+)$",
    )
    .unwrap()
});

static EQUALS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+) = @(\w+)").unwrap());
static DATE_EQUALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^DATE\((\w+)\) = @(\w+)").unwrap());
static BETWEEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+) BETWEEN @(\w+) AND @(\w+)").unwrap());
static AT_LEAST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+) >= @(\w+)").unwrap());
static CONTAINS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^EXISTS \(SELECT 1 FROM UNNEST\((\w+)\) AS (\w+) WHERE (\w+)\.(\w+) = @(\w+)\)")
        .unwrap()
});
static TOTAL_AT_LEAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\(SELECT SUM\(\w+\.price \* \w+\.quantity\) FROM UNNEST\((\w+)\) AS \w+\) >= @(\w+)",
    )
    .unwrap()
});

/// Outcome of evaluating a statement against the stored rows.
enum Evaluated {
    Rows(Vec<TableFieldSchema>, Vec<TableRow>),
    Dml(usize),
}

fn invalid_query(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "invalidQuery", message)
}

fn param<'a>(request: &'a QueryRequest, name: &str) -> Result<&'a str, Response> {
    request
        .parameter(name)
        .and_then(QueryParameter::scalar_value)
        .ok_or_else(|| invalid_query(format!("Query parameter '{name}' not found")))
}

fn timestamp(value: &str) -> Result<OffsetDateTime, Response> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|error| invalid_query(format!("Invalid timestamp '{value}': {error}")))
}

fn matches(row: &Record, column: &str, value: &str) -> bool {
    row.get(column).and_then(Value::as_str) == Some(value)
}

fn row_timestamp(row: &Record, column: &str) -> Option<OffsetDateTime> {
    row.get(column)
        .and_then(Value::as_str)
        .and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok())
}

fn elements<'a>(row: &'a Record, column: &str) -> impl Iterator<Item = &'a Record> {
    row.get(column)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn order_total(row: &Record, column: &str) -> f64 {
    elements(row, column)
        .map(|product| {
            let price = product.get("price").and_then(Value::as_f64).unwrap_or(0.0);
            let quantity = product.get("quantity").and_then(Value::as_f64).unwrap_or(0.0);
            price * quantity
        })
        .sum()
}

/// A single `WHERE` predicate, with its parameters already resolved.
enum Predicate {
    Equals(String, String),
    DateEquals(String, Date),
    Between(String, OffsetDateTime, OffsetDateTime),
    AtLeast(String, OffsetDateTime),
    Contains { column: String, field: String, value: String },
    TotalAtLeast(String, f64),
}

impl Predicate {
    fn test(&self, row: &Record) -> bool {
        match self {
            Self::Equals(column, value) => matches(row, column, value),
            Self::DateEquals(column, date) => {
                row_timestamp(row, column).is_some_and(|ts| ts.date() == *date)
            }
            Self::Between(column, start, end) => {
                row_timestamp(row, column).is_some_and(|ts| *start <= ts && ts <= *end)
            }
            Self::AtLeast(column, min) => row_timestamp(row, column).is_some_and(|ts| ts >= *min),
            Self::Contains { column, field, value } => {
                elements(row, column).any(|element| matches(element, field, value))
            }
            Self::TotalAtLeast(column, min) => order_total(row, column) >= *min,
        }
    }
}

/// Parses `AND`-joined predicates. Anything unrecognized is an `invalidQuery` error.
fn parse_where(request: &QueryRequest, clause: &str) -> Result<Vec<Predicate>, Response> {
    let unsupported = || invalid_query(format!("Unsupported predicate: {clause}"));

    let mut predicates = Vec::new();
    let mut rest = clause;

    loop {
        let (predicate, len) = if let Some(caps) = CONTAINS.captures(rest) {
            if caps[2] != caps[3] {
                return Err(unsupported());
            }
            let predicate = Predicate::Contains {
                column: caps[1].to_owned(),
                field: caps[4].to_owned(),
                value: param(request, &caps[5])?.to_owned(),
            };
            (predicate, caps[0].len())
        } else if let Some(caps) = TOTAL_AT_LEAST.captures(rest) {
            let min = param(request, &caps[2])?
                .parse()
                .map_err(|_| invalid_query("Invalid FLOAT64 parameter"))?;
            (Predicate::TotalAtLeast(caps[1].to_owned(), min), caps[0].len())
        } else if let Some(caps) = DATE_EQUALS.captures(rest) {
            let day = param(request, &caps[2])?;
            let date = timestamp(&format!("{day}T00:00:00Z"))?.date();
            (Predicate::DateEquals(caps[1].to_owned(), date), caps[0].len())
        } else if let Some(caps) = BETWEEN.captures(rest) {
            let start = timestamp(param(request, &caps[2])?)?;
            let end = timestamp(param(request, &caps[3])?)?;
            (Predicate::Between(caps[1].to_owned(), start, end), caps[0].len())
        } else if let Some(caps) = AT_LEAST.captures(rest) {
            let min = timestamp(param(request, &caps[2])?)?;
            (Predicate::AtLeast(caps[1].to_owned(), min), caps[0].len())
        } else if let Some(caps) = EQUALS.captures(rest) {
            let value = param(request, &caps[2])?.to_owned();
            (Predicate::Equals(caps[1].to_owned(), value), caps[0].len())
        } else {
            return Err(unsupported());
        };

        predicates.push(predicate);
        rest = &rest[len..];

        if rest.is_empty() {
            return Ok(predicates);
        }

        rest = rest.strip_prefix(" AND ").ok_or_else(unsupported)?;
    }
}

fn table_rows<'a>(inner: &'a mut Inner, path: &str) -> Result<&'a mut Vec<Record>, Response> {
    let mut parts = path.splitn(3, '.');
    let (Some(project), Some(dataset), Some(table)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid_query(format!("Invalid table path '{path}'")));
    };

    inner
        .datasets
        .get_mut(dataset)
        .and_then(|tables| tables.get_mut(table))
        .ok_or_else(|| not_found(format_args!("Table {project}:{dataset}.{table}")))
}

/// The schema fields named by a select list, or every field for `*`.
fn projection(schema: &[TableFieldSchema], columns: &str) -> Result<Vec<TableFieldSchema>, Response> {
    if columns == "*" {
        return Ok(schema.to_vec());
    }

    columns
        .split(", ")
        .map(|name| {
            schema
                .iter()
                .find(|field| field.name == name)
                .cloned()
                .ok_or_else(|| invalid_query(format!("Unrecognized name: {name}")))
        })
        .collect()
}

fn evaluate(inner: &mut Inner, request: &QueryRequest) -> Result<Evaluated, Response> {
    let sql = request.query.as_str();

    let schema = orders_schema();

    if let Some(caps) = DELETE_WHERE.captures(sql) {
        let predicates = parse_where(request, &caps[2])?;
        let rows = table_rows(inner, &caps[1])?;
        let before = rows.len();
        rows.retain(|row| !predicates.iter().all(|predicate| predicate.test(row)));
        return Ok(Evaluated::Dml(before - rows.len()));
    }

    if let Some(caps) = UPDATE_WHERE.captures(sql) {
        let new_value = param(request, &caps[3])?.to_owned();
        let predicates = parse_where(request, &caps[4])?;
        let rows = table_rows(inner, &caps[1])?;

        let mut updated = 0;
        for row in rows
            .iter_mut()
            .filter(|row| predicates.iter().all(|predicate| predicate.test(row)))
        {
            row.insert(caps[2].to_owned(), Value::String(new_value.clone()));
            updated += 1;
        }
        return Ok(Evaluated::Dml(updated));
    }

    if let Some(caps) = SELECT_UNNESTED.captures(sql) {
        let predicates = parse_where(request, &caps[4])?;
        let column = &caps[3];

        let Some(element_fields) = schema
            .iter()
            .find(|field| field.name == column)
            .map(|field| field.fields.clone())
        else {
            return Err(invalid_query(format!("Unrecognized name: {column}")));
        };

        let rows = table_rows(inner, &caps[2])?;
        let found = rows
            .iter()
            .filter(|row| predicates.iter().all(|predicate| predicate.test(row)))
            .flat_map(|row| elements(row, column))
            .map(|element| encode_row(&element_fields, element))
            .collect();
        return Ok(Evaluated::Rows(element_fields, found));
    }

    if let Some(caps) = SELECT_WHERE.captures(sql) {
        let predicates = parse_where(request, &caps[2])?;
        let rows = table_rows(inner, &caps[1])?;
        let found = rows
            .iter()
            .filter(|row| predicates.iter().all(|predicate| predicate.test(row)))
            .map(|row| encode_row(&schema, row))
            .collect();
        return Ok(Evaluated::Rows(schema, found));
    }

    if let Some(caps) = SELECT_ORDERED.captures(sql) {
        let fields = projection(&schema, &caps[1])?;
        let mut rows = table_rows(inner, &caps[2])?.clone();
        // RFC 3339 timestamps in UTC sort lexicographically
        rows.sort_by(|a, b| {
            let key = |row: &Record| row.get(&caps[3]).map(Value::to_string);
            key(a).cmp(&key(b))
        });
        let encoded = rows.iter().map(|row| encode_row(&fields, row)).collect();
        return Ok(Evaluated::Rows(fields, encoded));
    }

    if let Some(caps) = SELECT_LIMIT.captures(sql) {
        let limit: usize = caps[2].parse().unwrap_or(usize::MAX);
        let rows = table_rows(inner, &caps[1])?;
        let encoded = rows.iter().take(limit).map(|row| encode_row(&schema, row)).collect();
        return Ok(Evaluated::Rows(schema, encoded));
    }

    if let Some(caps) = COUNT.captures(sql) {
        let total = table_rows(inner, &caps[1])?.len();
        return Ok(Evaluated::Rows(
            vec![TableFieldSchema::builder("total").int().required()],
            vec![TableRow {
                f: vec![TableCell {
                    v: json!(total.to_string()),
                }],
            }],
        ));
    }

    Err(invalid_query(format!("Unsupported statement: {sql}")))
}

async fn query(
    State(state): State<Arc<FakeState>>,
    Path(project): Path<String>,
    Json(request): Json<QueryRequest>,
) -> Response {
    state.hit();
    let mut inner = state.inner.lock().unwrap();

    let evaluated = match evaluate(&mut inner, &request) {
        Ok(evaluated) => evaluated,
        Err(response) => return response,
    };

    let job_id = format!("job_{}", state.job_counter.fetch_add(1, Ordering::SeqCst));
    let job_reference = JobReference {
        project_id: project,
        job_id: job_id.clone(),
        location: Some("US".to_owned()),
    };

    let result = match evaluated {
        Evaluated::Rows(fields, rows) => QueryResponse {
            job_reference: Some(job_reference.clone()),
            schema: Some(TableSchema { fields }),
            total_rows: Some(rows.len() as i64),
            rows,
            job_complete: true,
            ..Default::default()
        },
        Evaluated::Dml(affected) => QueryResponse {
            job_reference: Some(job_reference.clone()),
            schema: Some(TableSchema::default()),
            total_rows: Some(0),
            job_complete: true,
            num_dml_affected_rows: Some(affected as i64),
            ..Default::default()
        },
    };

    let incomplete = inner.incomplete_polls;
    let polls_left = incomplete.saturating_sub(1);
    inner.jobs.insert(job_id, Job { polls_left, result });

    if incomplete > 0 {
        return Json(QueryResponse {
            job_reference: Some(job_reference),
            job_complete: false,
            ..Default::default()
        })
        .into_response();
    }

    let page = PageParams {
        max_results: request.max_results.map(|max| max as usize),
        page_token: None,
    };

    Json(result_page(&inner.jobs[&job_reference.job_id].result, &page)).into_response()
}

async fn get_query_results(
    State(state): State<Arc<FakeState>>,
    Path((project, job_id)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> Response {
    state.hit();
    let mut inner = state.inner.lock().unwrap();

    let Some(job) = inner.jobs.get_mut(&job_id) else {
        return not_found(format_args!("Job {project}:{job_id}"));
    };

    if job.polls_left > 0 {
        job.polls_left -= 1;
        return Json(QueryResponse {
            job_reference: job.result.job_reference.clone(),
            job_complete: false,
            ..Default::default()
        })
        .into_response();
    }

    Json(result_page(&job.result, &params)).into_response()
}

fn result_page(result: &QueryResponse, params: &PageParams) -> QueryResponse {
    let (start, end, page_token) = params.window(result.rows.len());

    QueryResponse {
        rows: result.rows[start..end].to_vec(),
        page_token,
        ..result.clone()
    }
}
