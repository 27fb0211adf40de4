use std::collections::HashMap;
use std::fmt;

use bigquery_resources::table::{LabelsPatch, Table, TableFieldSchema};
use bigquery_resources::table_data::InsertAllResponse;

use crate::error::{ClientError, RowErrors};
use crate::{BigQuery, Error};

mod insert_rows;
mod stream;

pub use insert_rows::InsertRowOptions;
pub use stream::RecordStream;

/// A table within the connection's project, identified by `(dataset_id, table_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    dataset_id: String,
    table_id: String,
}

impl TableRef {
    pub fn new(dataset_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }

    #[inline]
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    #[inline]
    pub fn table_id(&self) -> &str {
        &self.table_id
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset_id, self.table_id)
    }
}

impl BigQuery {
    pub async fn get_table(&self, dataset_id: &str, table_id: &str) -> crate::Result<Table> {
        let table = TableRef::new(dataset_id, table_id);
        let conn = self.connection()?;

        conn.get_json(conn.table_url(&table, None::<&str>))
            .await
            .map_err(|error| {
                Error::lookup(
                    format_args!("table '{table_id}' in dataset '{dataset_id}'"),
                    error,
                )
            })
    }

    /// The table's columns, in order.
    ///
    /// A failed lookup is logged and reported as an empty schema, only a missing connection
    /// is an error.
    pub async fn get_schema(&self, table: &TableRef) -> crate::Result<Vec<TableFieldSchema>> {
        self.connection()?;

        match self.get_table(table.dataset_id(), table.table_id()).await {
            Ok(meta) => {
                let fields = meta.schema.map(|schema| schema.fields).unwrap_or_default();

                for field in fields.iter() {
                    debug!(
                        message = "schema field",
                        %table,
                        name = %field.name,
                        ty = field.ty.as_sql_str(),
                        mode = field.mode.as_str(),
                    );
                }

                Ok(fields)
            }
            Err(error) => {
                warn!(message = "failed to get table schema", %table, ?error);
                Ok(Vec::new())
            }
        }
    }

    /// Streams `rows` into the table, preserving their order.
    ///
    /// An empty slice is a no-op that never reaches the network. Rows the service rejects
    /// are returned, exactly as reported, through [`Error::row_errors`].
    pub async fn insert_records<R>(&self, table: &TableRef, rows: &[R]) -> crate::Result<()>
    where
        R: serde::Serialize,
    {
        self.insert_records_opt(table, rows, InsertRowOptions::default())
            .await
    }

    pub async fn insert_records_opt<R>(
        &self,
        table: &TableRef,
        rows: &[R],
        options: InsertRowOptions,
    ) -> crate::Result<()>
    where
        R: serde::Serialize,
    {
        let conn = self.connection()?;

        if rows.is_empty() {
            debug!(message = "no rows to insert", %table);
            return Ok(());
        }

        let insert = async {
            let payload = insert_rows::InsertRows::new(options, rows);
            let resp = conn.post(conn.table_url(table, ["insertAll"]), &payload).await?;
            let resp: InsertAllResponse = crate::client::deserialize_json(resp).await?;

            if resp.is_ok() {
                Ok(())
            } else {
                Err(ClientError::RowErrors(RowErrors(resp.insert_errors)))
            }
        };

        match insert.await {
            Ok(()) => {
                info!(message = "inserted rows", %table, rows = rows.len());
                Ok(())
            }
            Err(error) => {
                error!(message = "failed to insert rows", %table, ?error);
                Err(Error::Insert {
                    table: table.to_string(),
                    source: error,
                })
            }
        }
    }

    /// Lazily streams every row in the table, see [`RecordStream`].
    pub fn list_records(&self, table: &TableRef) -> crate::Result<RecordStream> {
        let conn = self.connection()?;
        Ok(RecordStream::new(conn.clone(), table.clone()))
    }

    /// Replaces the table's labels with `labels`. Existing labels missing from `labels` are
    /// removed.
    pub async fn update_labels(
        &self,
        table: &TableRef,
        labels: &HashMap<String, String>,
    ) -> crate::Result<Table> {
        let conn = self.connection()?;
        let url = conn.table_url(table, None::<&str>);

        let update = async {
            let current: Table = conn.get_json(url.clone()).await?;
            let patch = LabelsPatch::replacing(&current.labels, labels);
            crate::client::deserialize_json(conn.patch(url, &patch).await?).await
        };

        update
            .await
            .map_err(|error| Error::update(format_args!("labels of table '{table}'"), error))
    }

    /// Drops the table, along with all of its data.
    pub async fn delete_table(&self, table: &TableRef) -> crate::Result<()> {
        let conn = self.connection()?;

        conn.delete(conn.table_url(table, None::<&str>))
            .await
            .map_err(|error| Error::delete(format_args!("table '{table}'"), error))?;

        info!(message = "deleted table", %table);
        Ok(())
    }
}
