//! A thin facade over the BigQuery REST API.
//!
//! [`BigQuery`] owns the connection lifecycle, while the record operations (lookups,
//! streaming inserts, queries, filtered deletes and updates) are methods on it that take the
//! target [`TableRef`] explicitly.
//!
//! ```no_run
//! use bigquery_facade::{BigQuery, TableRef};
//!
//! # async fn run() -> bigquery_facade::Result<()> {
//! let mut bq = BigQuery::new("service-account.json")?;
//! bq.initialize(None).await?;
//!
//! let orders = TableRef::new("TesteBigQuery", "VendasLBC");
//! let deleted = bq.delete_by_id(&orders, "5").await?;
//! println!("deleted {deleted} order(s)");
//!
//! bq.terminate();
//! # Ok(())
//! # }
//! ```
#[macro_use]
extern crate tracing;

mod auth;
mod client;
mod config;
mod dataset;
mod error;
mod facade;
pub mod orders;
pub mod query;
pub mod sample;
pub mod table;
mod util;

pub use bigquery_resources as resources;
pub use client::Connection;
pub use config::{EMULATOR_HOST_ENV, FacadeOptions};
pub use dataset::ConnectionReport;
pub use error::{ClientError, Error, ErrorKind, RowErrors};
pub use facade::BigQuery;
pub use query::{ParamValue, ResultSet, Statement};
pub use table::{RecordStream, TableRef};

/// A row, keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Type alias to [`core::result::Result<T, Error>`].
pub type Result<T> = core::result::Result<T, Error>;
