//! Filtered deletes, updates and lookups over a customer orders table
//! (`_id`, `name`, `created_at`, repeated `products` records).
//!
//! Every value is bound as a named parameter, only the quoted table path is ever
//! formatted into the SQL text.
use time::{Date, OffsetDateTime, Time};

use crate::query::{ParamValue, Statement, quote_table};
use crate::sample::Product;
use crate::table::TableRef;
use crate::{BigQuery, Error, Record};

/// Predicates for [`BigQuery::delete_by_conditions`]. Set predicates are combined with `AND`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteConditions {
    pub customer: Option<String>,
    pub created_from: Option<OffsetDateTime>,
    /// Minimum order total, `SUM(price * quantity)` over the order's products.
    pub min_total: Option<f64>,
}

impl DeleteConditions {
    pub fn is_empty(&self) -> bool {
        self.customer.is_none() && self.created_from.is_none() && self.min_total.is_none()
    }
}

/// An order without its line items, as read by [`BigQuery::list_summaries`].
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct OrderSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// The line items of a single order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderProducts {
    pub products: Vec<Product>,
    /// `Σ price × quantity`, computed client side.
    pub total: f64,
}

impl BigQuery {
    fn table_path(&self, table: &TableRef) -> crate::Result<String> {
        Ok(quote_table(self.connection()?.project_id(), table))
    }

    /// Runs a DML statement, mapping failures with `on_error`.
    async fn run_dml(
        &self,
        statement: Statement,
        on_error: impl FnOnce(crate::error::ClientError) -> Error,
    ) -> crate::Result<u64> {
        let conn = self.connection()?;

        info!(message = "executing statement", sql = statement.sql());

        let results = crate::query::execute(conn, statement).await.map_err(|error| {
            error!(message = "statement failed", ?error);
            on_error(error)
        })?;

        let affected = results.affected_rows();
        info!(message = "statement complete", affected_rows = affected);
        Ok(affected)
    }

    async fn run_delete(&self, target: String, statement: Statement) -> crate::Result<u64> {
        self.run_dml(statement, |error| Error::delete(target, error))
            .await
    }

    pub async fn delete_by_id(&self, table: &TableRef, id: &str) -> crate::Result<u64> {
        let sql = format!("DELETE FROM {} WHERE _id = @id", self.table_path(table)?);

        self.run_delete(
            format!("order '{id}' from '{table}'"),
            Statement::new(sql).bind("id", id),
        )
        .await
    }

    pub async fn delete_by_customer(&self, table: &TableRef, customer: &str) -> crate::Result<u64> {
        let sql = format!("DELETE FROM {} WHERE name = @name", self.table_path(table)?);

        self.run_delete(
            format!("orders of customer '{customer}' from '{table}'"),
            Statement::new(sql).bind("name", customer),
        )
        .await
    }

    /// Without `end`, deletes the orders created on the `start` day (UTC). With `end`,
    /// deletes orders created between midnight UTC of `start` and midnight UTC of `end`,
    /// both inclusive.
    pub async fn delete_by_date_range(
        &self,
        table: &TableRef,
        start: Date,
        end: Option<Date>,
    ) -> crate::Result<u64> {
        let statement = date_range_statement(&self.table_path(table)?, start, end);

        let target = match end {
            None => format!("orders created on {start} from '{table}'"),
            Some(end) => format!("orders created between {start} and {end} from '{table}'"),
        };

        self.run_delete(target, statement).await
    }

    /// Deletes every order containing a product named `product`, in a single statement.
    pub async fn delete_by_product(&self, table: &TableRef, product: &str) -> crate::Result<u64> {
        let statement = product_statement(&self.table_path(table)?, product);

        self.run_delete(format!("orders containing '{product}' from '{table}'"), statement)
            .await
    }

    /// Deletes the orders matching every set predicate in `conditions`.
    ///
    /// Fails without contacting the service if no predicate is set, rather than deleting
    /// the whole table.
    pub async fn delete_by_conditions(
        &self,
        table: &TableRef,
        conditions: &DeleteConditions,
    ) -> crate::Result<u64> {
        let path = self.table_path(table)?;
        let target = format!("orders matching conditions from '{table}'");

        let Some(statement) = conditions_statement(&path, conditions) else {
            return Err(Error::delete(
                target,
                crate::error::ClientError::invalid_request("no delete conditions given"),
            ));
        };

        self.run_delete(target, statement).await
    }

    pub async fn update_name_by_id(
        &self,
        table: &TableRef,
        id: &str,
        new_name: &str,
    ) -> crate::Result<u64> {
        let sql = format!("UPDATE {} SET name = @name WHERE _id = @id", self.table_path(table)?);
        let statement = Statement::new(sql).bind("name", new_name).bind("id", id);

        self.run_dml(statement, |error| {
            Error::update(format_args!("name of order '{id}' in '{table}'"), error)
        })
        .await
    }

    pub async fn find_by_id(&self, table: &TableRef, id: &str) -> crate::Result<Option<Record>> {
        let sql = format!("SELECT * FROM {} WHERE _id = @id", self.table_path(table)?);

        let results = self
            .query_for(
                format!("order '{id}' in '{table}'"),
                Statement::new(sql).bind("id", id),
            )
            .await?;

        Ok(results.into_rows().into_iter().next())
    }

    /// Every order, oldest first.
    pub async fn list_ordered(&self, table: &TableRef) -> crate::Result<Vec<Record>> {
        let sql = format!("SELECT * FROM {} ORDER BY created_at", self.table_path(table)?);

        let results = self
            .query_for(format!("orders in '{table}'"), Statement::new(sql))
            .await?;

        Ok(results.into_rows())
    }

    /// Every order projected to its id, customer and creation time, oldest first.
    pub async fn list_summaries(&self, table: &TableRef) -> crate::Result<Vec<OrderSummary>> {
        let sql = format!(
            "SELECT _id, name, created_at FROM {} ORDER BY created_at",
            self.table_path(table)?
        );
        let target = format!("order summaries in '{table}'");

        let results = self.query_for(&target, Statement::new(sql)).await?;

        results
            .deserialize_rows()
            .map_err(|error| Error::query(target, error.into()))
    }

    /// An arbitrary single order, if the table has any.
    pub async fn first_record(&self, table: &TableRef) -> crate::Result<Option<Record>> {
        let sql = format!("SELECT * FROM {} LIMIT 1", self.table_path(table)?);

        let results = self
            .query_for(format!("first order in '{table}'"), Statement::new(sql))
            .await?;

        Ok(results.into_rows().into_iter().next())
    }

    pub async fn count_records(&self, table: &TableRef) -> crate::Result<u64> {
        let sql = format!("SELECT COUNT(*) AS total FROM {}", self.table_path(table)?);
        let target = format!("order count of '{table}'");

        let results = self.query_for(&target, Statement::new(sql)).await?;

        results
            .first()
            .and_then(|row| row.get("total"))
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| Error::query(target, crate::error::ClientError::MissingField("total")))
    }

    pub async fn products_of_order(&self, table: &TableRef, id: &str) -> crate::Result<OrderProducts> {
        let sql = format!(
            "SELECT product.name, product.sku, product.price, product.quantity \
             FROM {}, UNNEST(products) AS product WHERE _id = @id",
            self.table_path(table)?
        );

        let target = format!("products of order '{id}' in '{table}'");

        let results = self
            .query_for(&target, Statement::new(sql).bind("id", id))
            .await?;
        let products: Vec<Product> = results
            .deserialize_rows()
            .map_err(|error| Error::query(target, error.into()))?;

        let total = products.iter().map(Product::subtotal).sum();
        Ok(OrderProducts { products, total })
    }
}

fn midnight_utc(date: Date) -> OffsetDateTime {
    date.with_time(Time::MIDNIGHT).assume_utc()
}

fn date_range_statement(table_path: &str, start: Date, end: Option<Date>) -> Statement {
    match end {
        None => Statement::new(format!(
            "DELETE FROM {table_path} WHERE DATE(created_at) = @start"
        ))
        .bind("start", start),
        Some(end) => Statement::new(format!(
            "DELETE FROM {table_path} WHERE created_at BETWEEN @start AND @end"
        ))
        .bind("start", midnight_utc(start))
        .bind("end", midnight_utc(end)),
    }
}

fn product_statement(table_path: &str, product: &str) -> Statement {
    Statement::new(format!(
        "DELETE FROM {table_path} WHERE EXISTS \
         (SELECT 1 FROM UNNEST(products) AS product WHERE product.name = @product)"
    ))
    .bind("product", product)
}

fn conditions_statement(table_path: &str, conditions: &DeleteConditions) -> Option<Statement> {
    if conditions.is_empty() {
        return None;
    }

    let mut predicates = Vec::with_capacity(3);
    let mut params: Vec<(&str, ParamValue)> = Vec::with_capacity(3);

    if let Some(ref customer) = conditions.customer {
        predicates.push("name = @customer");
        params.push(("customer", customer.as_str().into()));
    }

    if let Some(created_from) = conditions.created_from {
        predicates.push("created_at >= @created_from");
        params.push(("created_from", created_from.into()));
    }

    if let Some(min_total) = conditions.min_total {
        predicates.push(
            "(SELECT SUM(product.price * product.quantity) FROM UNNEST(products) AS product) \
             >= @min_total",
        );
        params.push(("min_total", min_total.into()));
    }

    let sql = format!("DELETE FROM {table_path} WHERE {}", predicates.join(" AND "));

    Some(
        params
            .into_iter()
            .fold(Statement::new(sql), |statement, (name, value)| statement.bind(name, value)),
    )
}
