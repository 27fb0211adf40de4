//! Walks through every record operation against the sample orders table: insert, read,
//! filtered deletes and an update.
//!
//! Configured through the environment:
//! - `GOOGLE_APPLICATION_CREDENTIALS`: service account key (required)
//! - `BIGQUERY_PROJECT_ID`: overrides the key's project
//! - `BIGQUERY_DATASET` / `BIGQUERY_TABLE`: the target table
//! - `BIGQUERY_EMULATOR_HOST`: run against a local emulator instead
use anyhow::Context;
use bigquery_facade::orders::DeleteConditions;
use bigquery_facade::sample::{Order, sample_orders};
use bigquery_facade::{BigQuery, Record, TableRef};
use time::macros::{date, datetime};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_DATASET: &str = "TesteBigQuery";
const DEFAULT_TABLE: &str = "VendasLBC";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn print_order(record: &Record) {
    match Order::from_record(record) {
        Ok(order) => println!(
            "  {:>3} | {:<16} | {} | {} item(s) | total {:.2}",
            order.id,
            order.name,
            order.created_at,
            order.products.len(),
            order.total()
        ),
        Err(error) => println!("  unreadable order ({error}): {record:?}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let credentials = std::env::var("GOOGLE_APPLICATION_CREDENTIALS")
        .context("GOOGLE_APPLICATION_CREDENTIALS must point at a service account key")?;
    let project_id = std::env::var("BIGQUERY_PROJECT_ID").ok();
    let table = TableRef::new(
        env_or("BIGQUERY_DATASET", DEFAULT_DATASET),
        env_or("BIGQUERY_TABLE", DEFAULT_TABLE),
    );

    let mut bq = BigQuery::new(&credentials)?;
    bq.initialize(project_id.as_deref()).await?;

    let report = bq.test_connection(table.dataset_id()).await?;
    if let Some(error) = report.error {
        return Err(error).context("connection test failed");
    }
    info!(
        message = "connected",
        project_id = %report.project_id,
        datasets = report.datasets.len(),
        location = ?report.location,
        tables = ?report.tables,
    );

    for field in bq.get_schema(&table).await? {
        println!("column {} {} {}", field.name, field.ty.as_sql_str(), field.mode.as_str());
    }

    let orders = sample_orders();
    bq.insert_records(&table, &orders).await?;
    println!("inserted {} orders", orders.len());

    println!("orders by creation date:");
    for record in bq.list_ordered(&table).await? {
        print_order(&record);
    }

    println!("order summaries:");
    for summary in bq.list_summaries(&table).await? {
        println!(
            "  {:>3} | {:<16} | {}",
            summary.id,
            summary.name.as_deref().unwrap_or("-"),
            summary
                .created_at
                .map(|created_at| created_at.to_string())
                .unwrap_or_default()
        );
    }

    if let Some(record) = bq.first_record(&table).await? {
        println!("first order:");
        print_order(&record);
    }

    println!("order count: {}", bq.count_records(&table).await?);

    match bq.find_by_id(&table, "1").await? {
        Some(record) => {
            println!("order 1:");
            print_order(&record);
        }
        None => println!("order 1 not found"),
    }

    let items = bq.products_of_order(&table, "1").await?;
    for product in items.products.iter() {
        println!(
            "  {} ({}) {} x {:.2} = {:.2}",
            product.name,
            product.sku,
            product.quantity,
            product.price,
            product.subtotal()
        );
    }
    println!("order 1 total: {:.2}", items.total);

    let deleted = bq.delete_by_id(&table, "5").await?;
    println!("deleted order 5: {deleted} row(s)");

    let deleted = bq.delete_by_customer(&table, "Carlos Lima").await?;
    println!("deleted orders of Carlos Lima: {deleted} row(s)");

    let deleted = bq
        .delete_by_date_range(&table, date!(2025-06-28), None)
        .await?;
    println!("deleted orders from 2025-06-28: {deleted} row(s)");

    let deleted = bq
        .delete_by_date_range(&table, date!(2025-07-01), Some(date!(2025-07-04)))
        .await?;
    println!("deleted orders from 2025-07-01 to 2025-07-04: {deleted} row(s)");

    let deleted = bq.delete_by_product(&table, "Esfiha de Carne").await?;
    println!("deleted orders with Esfiha de Carne: {deleted} row(s)");

    let conditions = DeleteConditions {
        customer: Some("João Silva".to_owned()),
        created_from: Some(datetime!(2025-07-01 0:00 UTC)),
        min_total: Some(15.0),
    };
    let deleted = bq.delete_by_conditions(&table, &conditions).await?;
    println!("deleted orders matching {conditions:?}: {deleted} row(s)");

    let updated = bq.update_name_by_id(&table, "1", "João S. Silva").await?;
    println!("renamed customer of order 1: {updated} row(s)");

    println!("remaining orders:");
    for record in bq.list_ordered(&table).await? {
        print_order(&record);
    }

    bq.terminate();
    Ok(())
}
