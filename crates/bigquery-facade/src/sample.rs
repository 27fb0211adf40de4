//! The customer order model used by the demonstration program, along with its sample data.
use bigquery_resources::table::TableFieldSchema;
use time::OffsetDateTime;
use time::macros::datetime;

use crate::Record;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    /// The customer's name.
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Product {
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub quantity: i64,
}

impl Product {
    fn new(name: &str, sku: &str, price: f64, quantity: i64) -> Self {
        Self {
            name: name.to_owned(),
            sku: sku.to_owned(),
            price,
            quantity,
        }
    }

    #[inline]
    pub fn subtotal(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

impl Order {
    pub fn total(&self) -> f64 {
        self.products.iter().map(Product::subtotal).sum()
    }

    pub fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(record.clone()))
    }

    pub fn to_record(&self) -> Result<Record, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(record) => Ok(record),
            _ => unreachable!("orders always serialize to objects"),
        }
    }
}

/// Columns of the orders table.
pub fn orders_schema() -> Vec<TableFieldSchema> {
    vec![
        TableFieldSchema::builder("_id").string().required(),
        TableFieldSchema::builder("name").string().nullable(),
        TableFieldSchema::builder("created_at").timestamp().nullable(),
        TableFieldSchema::builder("products")
            .record([
                TableFieldSchema::builder("name").string().nullable(),
                TableFieldSchema::builder("sku").string().nullable(),
                TableFieldSchema::builder("price").float().nullable(),
                TableFieldSchema::builder("quantity").int().nullable(),
            ])
            .repeated(),
    ]
}

/// The ten sample orders, ids `"1"` through `"10"`.
pub fn sample_orders() -> Vec<Order> {
    let coxinha = |quantity| Product::new("Coxinha", "CX-001", 6.0, quantity);
    let guarana = |quantity| Product::new("Guaraná 1L", "GUA-1L", 6.5, quantity);
    let pao_de_queijo = |quantity| Product::new("Pão de Queijo", "PQ-001", 5.0, quantity);
    let coca_cola = |quantity| Product::new("Coca-Cola 2L", "CC-2L", 8.5, quantity);
    let suco = |quantity| Product::new("Suco Natural", "SN-001", 7.0, quantity);
    let esfiha = |quantity| Product::new("Esfiha de Carne", "EF-001", 4.5, quantity);

    let order = |id: &str, name: &str, created_at, products| Order {
        id: id.to_owned(),
        name: name.to_owned(),
        created_at,
        products,
    };

    vec![
        order("1", "João Silva", datetime!(2025-06-20 11:15 UTC), vec![coxinha(2), guarana(1)]),
        order("2", "Maria Oliveira", datetime!(2025-06-22 13:30 UTC), vec![pao_de_queijo(5), coca_cola(1)]),
        order("3", "Carlos Lima", datetime!(2025-06-25 18:00 UTC), vec![coxinha(3)]),
        order("4", "Ana Souza", datetime!(2025-06-28 09:45 UTC), vec![suco(2), esfiha(1)]),
        order("5", "João Silva", datetime!(2025-06-30 17:30 UTC), vec![coca_cola(1), pao_de_queijo(2)]),
        order("6", "Bruna Rocha", datetime!(2025-07-01 15:00 UTC), vec![coxinha(2), suco(1)]),
        order("7", "Maria Oliveira", datetime!(2025-07-03 08:40 UTC), vec![esfiha(3), guarana(1)]),
        order("8", "Carlos Lima", datetime!(2025-07-04 12:20 UTC), vec![pao_de_queijo(1), coxinha(1)]),
        order("9", "João Silva", datetime!(2025-07-05 18:10 UTC), vec![coxinha(1), guarana(2)]),
        order("10", "Bruna Rocha", datetime!(2025-07-06 10:00 UTC), vec![esfiha(2), suco(1)]),
    ]
}
