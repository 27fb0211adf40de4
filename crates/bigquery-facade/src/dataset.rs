use bigquery_resources::dataset::{Dataset, DatasetList, DatasetListEntry};
use bigquery_resources::table::{TableList, TableListEntry};

use crate::client::Connection;
use crate::error::ClientError;
use crate::{BigQuery, Error};

impl BigQuery {
    pub async fn get_dataset(&self, dataset_id: &str) -> crate::Result<Dataset> {
        let conn = self.connection()?;

        conn.get_json(conn.make_url(["datasets", dataset_id]))
            .await
            .map_err(|error| Error::lookup(format_args!("dataset '{dataset_id}'"), error))
    }

    /// Every dataset in the connection's project.
    pub async fn list_datasets(&self) -> crate::Result<Vec<DatasetListEntry>> {
        let conn = self.connection()?;

        fetch_datasets(conn).await.map_err(|error| {
            Error::lookup(format_args!("datasets in project '{}'", conn.project_id()), error)
        })
    }

    pub async fn list_tables(&self, dataset_id: &str) -> crate::Result<Vec<TableListEntry>> {
        let conn = self.connection()?;

        fetch_tables(conn, dataset_id)
            .await
            .map_err(|error| Error::lookup(format_args!("tables in dataset '{dataset_id}'"), error))
    }

    /// Checks the connection by listing the project's datasets, then fetching `dataset_id`
    /// and listing its tables.
    ///
    /// Failures of any step are reported in the returned [`ConnectionReport`] instead of
    /// being returned as errors, only a missing connection is an error.
    pub async fn test_connection(&self, dataset_id: &str) -> crate::Result<ConnectionReport> {
        let conn = self.connection()?;

        let mut report = ConnectionReport {
            project_id: conn.project_id().to_owned(),
            datasets: Vec::new(),
            location: None,
            tables: Vec::new(),
            error: None,
        };

        match self.list_datasets().await {
            Ok(datasets) => {
                info!(message = "connection OK", datasets = datasets.len());
                report.datasets = datasets
                    .into_iter()
                    .map(|entry| entry.dataset_reference.dataset_id)
                    .collect();
            }
            Err(error) => {
                error!(message = "connection test failed", ?error);
                report.error = Some(error);
                return Ok(report);
            }
        }

        match self.get_dataset(dataset_id).await {
            Ok(dataset) => report.location = dataset.location,
            Err(error) => {
                error!(message = "failed to get dataset", dataset_id, ?error);
                report.error = Some(error);
                return Ok(report);
            }
        }

        match self.list_tables(dataset_id).await {
            Ok(tables) => {
                info!(message = "dataset accessible", dataset_id, tables = tables.len());
                report.tables = tables
                    .into_iter()
                    .map(|entry| entry.table_reference.table_id)
                    .collect();
            }
            Err(error) => {
                error!(message = "failed to access dataset", dataset_id, ?error);
                report.error = Some(error);
            }
        }

        Ok(report)
    }
}

/// Outcome of [`BigQuery::test_connection`].
#[derive(Debug)]
pub struct ConnectionReport {
    pub project_id: String,
    pub datasets: Vec<String>,
    /// Location of the checked dataset.
    pub location: Option<String>,
    pub tables: Vec<String>,
    /// The first step that failed, if any.
    pub error: Option<Error>,
}

impl ConnectionReport {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

async fn fetch_datasets(conn: &Connection) -> Result<Vec<DatasetListEntry>, ClientError> {
    let page_size = conn.options().page_size;

    crate::util::collect_pages(|page_token| async move {
        let mut builder = conn
            .request(reqwest::Method::GET, conn.make_url(["datasets"]))
            .await?
            .query(&[("maxResults", page_size)]);

        if let Some(token) = page_token {
            builder = builder.query(&[("pageToken", token)]);
        }

        let list: DatasetList = crate::client::deserialize_json(Connection::send(builder).await?).await?;
        Ok((list.datasets, list.next_page_token))
    })
    .await
}

async fn fetch_tables(conn: &Connection, dataset_id: &str) -> Result<Vec<TableListEntry>, ClientError> {
    let page_size = conn.options().page_size;

    crate::util::collect_pages(|page_token| async move {
        let mut builder = conn
            .request(reqwest::Method::GET, conn.make_url(["datasets", dataset_id, "tables"]))
            .await?
            .query(&[("maxResults", page_size)]);

        if let Some(token) = page_token {
            builder = builder.query(&[("pageToken", token)]);
        }

        let list: TableList = crate::client::deserialize_json(Connection::send(builder).await?).await?;
        Ok((list.tables, list.next_page_token))
    })
    .await
}
