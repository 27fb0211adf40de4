use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bigquery_resources::row::{TableRow, decode_row};
use bigquery_resources::table::{Table, TableFieldSchema};
use bigquery_resources::table_data::TableDataList;
use tokio_util::sync::ReusableBoxFuture;

use super::TableRef;
use crate::client::Connection;
use crate::{Error, Record};

pin_project_lite::pin_project! {
    /// Lazily pages through every row of a table via `tabledata.list`, in server order.
    ///
    /// Nothing is requested until the stream is first polled. The table's schema is fetched
    /// with the first page, since rows can't be decoded without it. The stream is finite
    /// and ends after the first error.
    ///
    /// The stream is tied to the connection it was created on. Once the facade terminates
    /// or re-initializes, the next page request fails with [`Error::NotInitialized`].
    #[project = RecordStreamProjection]
    pub struct RecordStream {
        conn: Connection,
        table: TableRef,
        schema: Option<Arc<[TableFieldSchema]>>,
        buf: VecDeque<TableRow>,
        done: bool,
        request_fut: ReusableBoxFuture<'static, crate::Result<Page>>,
    }
}

struct Page {
    schema: Option<Arc<[TableFieldSchema]>>,
    data: TableDataList,
}

impl RecordStream {
    pub(super) fn new(conn: Connection, table: TableRef) -> Self {
        let request_fut = ReusableBoxFuture::new(first_page(conn.clone(), table.clone()));

        Self {
            conn,
            table,
            schema: None,
            buf: VecDeque::new(),
            done: false,
            request_fut,
        }
    }

    #[inline]
    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

fn ensure_open(conn: &Connection) -> crate::Result<()> {
    if conn.is_closed() {
        Err(Error::NotInitialized)
    } else {
        Ok(())
    }
}

async fn first_page(conn: Connection, table: TableRef) -> crate::Result<Page> {
    ensure_open(&conn)?;

    let meta: Table = conn
        .get_json(conn.table_url(&table, None::<&str>))
        .await
        .map_err(|error| Error::lookup(format_args!("table '{table}'"), error))?;

    let schema = Arc::from(meta.fields());
    let data = list_page(&conn, &table, None).await?;

    Ok(Page {
        schema: Some(schema),
        data,
    })
}

async fn next_page(conn: Connection, table: TableRef, token: String) -> crate::Result<Page> {
    ensure_open(&conn)?;

    let data = list_page(&conn, &table, Some(token)).await?;
    Ok(Page { schema: None, data })
}

async fn list_page(
    conn: &Connection,
    table: &TableRef,
    token: Option<String>,
) -> crate::Result<TableDataList> {
    let fut = async {
        let mut builder = conn
            .request(reqwest::Method::GET, conn.table_url(table, ["data"]))
            .await?
            .query(&[("maxResults", conn.options().page_size)]);

        if let Some(token) = token {
            builder = builder.query(&[("pageToken", token)]);
        }

        crate::client::deserialize_json(Connection::send(builder).await?).await
    };

    fut.await
        .map_err(|error| Error::query(format_args!("rows of table '{table}'"), error))
}

impl RecordStreamProjection<'_> {
    fn poll_drive(&mut self, cx: &mut Context<'_>) -> Poll<crate::Result<()>> {
        let Page { schema, data } = std::task::ready!(self.request_fut.poll(cx))?;

        if schema.is_some() {
            *self.schema = schema;
        }

        debug!(
            message = "received table data page",
            table = %self.table,
            rows = data.rows.len(),
            total_rows = data.total_rows,
        );

        self.buf.extend(data.rows);

        match data.page_token {
            Some(token) if !token.is_empty() => {
                self.request_fut
                    .set(next_page(self.conn.clone(), self.table.clone(), token));
            }
            _ => *self.done = true,
        }

        Poll::Ready(Ok(()))
    }

    fn decode(&self, row: &TableRow) -> crate::Result<Record> {
        let fields = self.schema.as_deref().unwrap_or(&[]);
        decode_row(fields, row).map_err(|error| {
            Error::query(format_args!("rows of table '{}'", self.table), error.into())
        })
    }
}

impl futures::Stream for RecordStream {
    type Item = crate::Result<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(row) = this.buf.pop_front() {
                let result = this.decode(&row);
                if result.is_err() {
                    *this.done = true;
                    this.buf.clear();
                }
                return Poll::Ready(Some(result));
            }

            if *this.done {
                return Poll::Ready(None);
            }

            if let Err(error) = std::task::ready!(this.poll_drive(cx)) {
                *this.done = true;
                return Poll::Ready(Some(Err(error)));
            }
        }
    }
}

impl RecordStream {
    /// Drives the stream to completion, collecting every record.
    pub async fn collect_all(self) -> crate::Result<Vec<Record>> {
        use futures::TryStreamExt;

        self.try_collect().await
    }
}
