//! SQLite order store backed by an `sqlx` connection pool.
//!
//! Money is stored as decimal text, ids as hyphenated UUID text and
//! timestamps as Unix milliseconds. The pool connects lazily, so the factory
//! stays synchronous; when `create_schema` is set the bundled schema runs
//! once before the first statement.

use crate::{OrderStore, OrderStoreError, OrderStoreFactory, OrderStoreRegistry};
use async_trait::async_trait;
use checkout_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Order, OrderItem, OrderStatus,
	OwnerKey, Schema, ValidationError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

const ITEM_COLUMNS: &str =
	"id, order_id, product_id, name, price, quantity, size, image, subtotal";

/// SQLite order store implementation.
pub struct SqliteOrderStore {
	pool: SqlitePool,
	create_schema: bool,
	schema_ready: OnceCell<()>,
}

impl SqliteOrderStore {
	/// Creates a store over an existing pool.
	pub fn new(pool: SqlitePool, create_schema: bool) -> Self {
		Self {
			pool,
			create_schema,
			schema_ready: OnceCell::new(),
		}
	}

	/// Returns the pool, applying the schema first if configured to.
	async fn pool(&self) -> Result<&SqlitePool, OrderStoreError> {
		if self.create_schema {
			let pool = &self.pool;
			self.schema_ready
				.get_or_try_init(|| async move {
					sqlx::raw_sql(SCHEMA_SQL)
						.execute(pool)
						.await
						.map_err(backend)?;
					tracing::debug!("Order schema applied");
					Ok::<(), OrderStoreError>(())
				})
				.await?;
		}
		Ok(&self.pool)
	}
}

fn backend(e: sqlx::Error) -> OrderStoreError {
	match e {
		sqlx::Error::RowNotFound => OrderStoreError::NotFound,
		e => OrderStoreError::Backend(e.to_string()),
	}
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, OrderStoreError>
where
	T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
	row.try_get(name)
		.map_err(|e| OrderStoreError::Serialization(format!("column {}: {}", name, e)))
}

fn uuid_column(row: &SqliteRow, name: &str) -> Result<Uuid, OrderStoreError> {
	let raw: String = column(row, name)?;
	Uuid::parse_str(&raw)
		.map_err(|e| OrderStoreError::Serialization(format!("column {}: {}", name, e)))
}

fn decimal_column(row: &SqliteRow, name: &str) -> Result<Decimal, OrderStoreError> {
	let raw: String = column(row, name)?;
	Decimal::from_str(&raw)
		.map_err(|e| OrderStoreError::Serialization(format!("column {}: {}", name, e)))
}

fn timestamp_column(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, OrderStoreError> {
	let millis: i64 = column(row, name)?;
	DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
		OrderStoreError::Serialization(format!("column {}: timestamp {} out of range", name, millis))
	})
}

fn order_from_row(row: &SqliteRow) -> Result<Order, OrderStoreError> {
	let status: String = column(row, "status")?;
	let owner: String = column(row, "owner_key")?;
	Ok(Order {
		id: uuid_column(row, "id")?,
		owner: OwnerKey::new(owner),
		total: decimal_column(row, "total")?,
		status: status
			.parse::<OrderStatus>()
			.map_err(|e| OrderStoreError::Serialization(e.to_string()))?,
		items: Vec::new(),
		created_at: timestamp_column(row, "created_at")?,
		updated_at: timestamp_column(row, "updated_at")?,
	})
}

fn item_from_row(row: &SqliteRow) -> Result<OrderItem, OrderStoreError> {
	let quantity: i64 = column(row, "quantity")?;
	Ok(OrderItem {
		id: uuid_column(row, "id")?,
		order_id: uuid_column(row, "order_id")?,
		product_id: column(row, "product_id")?,
		name: column(row, "name")?,
		price: decimal_column(row, "price")?,
		quantity: u32::try_from(quantity).map_err(|_| {
			OrderStoreError::Serialization(format!("column quantity: {} out of range", quantity))
		})?,
		size: column(row, "size")?,
		image: column(row, "image")?,
		subtotal: decimal_column(row, "subtotal")?,
	})
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SqliteOrderStoreSchema)
	}

	async fn create_order(
		&self,
		order: &Order,
		items: &[OrderItem],
	) -> Result<(), OrderStoreError> {
		let mut tx = self.pool().await?.begin().await.map_err(backend)?;

		sqlx::query(
			"INSERT INTO orders (id, owner_key, total, status, created_at, updated_at) \
			 VALUES (?, ?, ?, ?, ?, ?)",
		)
		.bind(order.id.to_string())
		.bind(order.owner.as_str())
		.bind(order.total.to_string())
		.bind(order.status.as_str())
		.bind(order.created_at.timestamp_millis())
		.bind(order.updated_at.timestamp_millis())
		.execute(&mut *tx)
		.await
		.map_err(backend)?;

		for (position, item) in items.iter().enumerate() {
			sqlx::query(
				"INSERT INTO order_items \
				 (id, order_id, position, product_id, name, price, quantity, size, image, subtotal) \
				 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
			)
			.bind(item.id.to_string())
			.bind(item.order_id.to_string())
			.bind(position as i64)
			.bind(&item.product_id)
			.bind(&item.name)
			.bind(item.price.to_string())
			.bind(i64::from(item.quantity))
			.bind(item.size.as_deref())
			.bind(item.image.as_deref())
			.bind(item.subtotal.to_string())
			.execute(&mut *tx)
			.await
			.map_err(backend)?;
		}

		// Dropping `tx` on an early return rolls back
		tx.commit().await.map_err(backend)?;
		tracing::debug!(order_id = %order.id, items = items.len(), "Inserted order");
		Ok(())
	}

	async fn get_order(&self, id: Uuid) -> Result<Order, OrderStoreError> {
		let mut tx = self.pool().await?.begin().await.map_err(backend)?;

		let row = sqlx::query(
			"SELECT id, owner_key, total, status, created_at, updated_at FROM orders WHERE id = ?",
		)
		.bind(id.to_string())
		.fetch_optional(&mut *tx)
		.await
		.map_err(backend)?
		.ok_or(OrderStoreError::NotFound)?;
		let mut order = order_from_row(&row)?;

		let item_rows = sqlx::query(&format!(
			"SELECT {} FROM order_items WHERE order_id = ? ORDER BY position",
			ITEM_COLUMNS
		))
		.bind(id.to_string())
		.fetch_all(&mut *tx)
		.await
		.map_err(backend)?;
		tx.commit().await.map_err(backend)?;

		order.items = item_rows
			.iter()
			.map(item_from_row)
			.collect::<Result<_, _>>()?;
		Ok(order)
	}

	async fn list_orders_by_owner(&self, owner: &OwnerKey) -> Result<Vec<Order>, OrderStoreError> {
		let mut tx = self.pool().await?.begin().await.map_err(backend)?;

		let order_rows = sqlx::query(
			"SELECT id, owner_key, total, status, created_at, updated_at FROM orders \
			 WHERE owner_key = ? ORDER BY created_at DESC, rowid DESC",
		)
		.bind(owner.as_str())
		.fetch_all(&mut *tx)
		.await
		.map_err(backend)?;

		let item_rows = sqlx::query(&format!(
			"SELECT {} FROM order_items \
			 WHERE order_id IN (SELECT id FROM orders WHERE owner_key = ?) \
			 ORDER BY order_id, position",
			ITEM_COLUMNS
		))
		.bind(owner.as_str())
		.fetch_all(&mut *tx)
		.await
		.map_err(backend)?;
		tx.commit().await.map_err(backend)?;

		let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
		for row in &item_rows {
			let item = item_from_row(row)?;
			items_by_order.entry(item.order_id).or_default().push(item);
		}

		order_rows
			.iter()
			.map(|row| {
				let mut order = order_from_row(row)?;
				order.items = items_by_order.remove(&order.id).unwrap_or_default();
				Ok(order)
			})
			.collect()
	}

	async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), OrderStoreError> {
		let result = sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
			.bind(status.as_str())
			.bind(Utc::now().timestamp_millis())
			.bind(id.to_string())
			.execute(self.pool().await?)
			.await
			.map_err(backend)?;

		if result.rows_affected() == 0 {
			return Err(OrderStoreError::NotFound);
		}
		Ok(())
	}

	async fn delete_order(&self, id: Uuid) -> Result<(), OrderStoreError> {
		let mut tx = self.pool().await?.begin().await.map_err(backend)?;

		sqlx::query("DELETE FROM order_items WHERE order_id = ?")
			.bind(id.to_string())
			.execute(&mut *tx)
			.await
			.map_err(backend)?;

		let result = sqlx::query("DELETE FROM orders WHERE id = ?")
			.bind(id.to_string())
			.execute(&mut *tx)
			.await
			.map_err(backend)?;

		if result.rows_affected() == 0 {
			return Err(OrderStoreError::NotFound);
		}

		tx.commit().await.map_err(backend)?;
		Ok(())
	}
}

/// Configuration schema for SqliteOrderStore.
pub struct SqliteOrderStoreSchema;

impl ConfigSchema for SqliteOrderStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("database_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("sqlite:") => Ok(()),
					_ => Err("database_url must start with 'sqlite:'".to_string()),
				}
			})],
			vec![
				Field::new(
					"max_connections",
					FieldType::Integer {
						min: Some(1),
						max: Some(100),
					},
				),
				Field::new(
					"busy_timeout_ms",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new("create_schema", FieldType::Boolean),
			],
		);

		schema.validate(config)
	}
}

/// Factory function to create a sqlite order store from configuration.
///
/// Configuration parameters:
/// - `database_url`: sqlx connection string, e.g. `sqlite://orders.db` or
///   `sqlite::memory:` (required)
/// - `max_connections`: pool size, forced to 1 for in-memory databases
///   (default: 5)
/// - `busy_timeout_ms`: how long a writer waits on a locked database
///   (default: 5000)
/// - `create_schema`: run the bundled schema on first use (default: false)
pub fn create_order_store(config: &toml::Value) -> Result<Box<dyn OrderStore>, OrderStoreError> {
	SqliteOrderStoreSchema
		.validate(config)
		.map_err(|e| OrderStoreError::Configuration(e.to_string()))?;

	let database_url = config
		.get("database_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| OrderStoreError::Configuration("database_url is required".into()))?;

	// Each connection to `:memory:` opens a separate database
	let in_memory = database_url.contains(":memory:");
	let max_connections = if in_memory {
		1
	} else {
		config
			.get("max_connections")
			.and_then(|v| v.as_integer())
			.map(|v| v as u32)
			.unwrap_or(DEFAULT_MAX_CONNECTIONS)
	};
	let busy_timeout_ms = config
		.get("busy_timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);
	let create_schema = config
		.get("create_schema")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);

	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| OrderStoreError::Configuration(format!("Invalid database_url: {}", e)))?
		.create_if_missing(true)
		.foreign_keys(true)
		.busy_timeout(Duration::from_millis(busy_timeout_ms));

	let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
	if in_memory {
		// Closing the only connection would discard the database
		pool_options = pool_options.idle_timeout(None).max_lifetime(None);
	}
	let pool = pool_options.connect_lazy_with(options);

	tracing::info!(max_connections, create_schema, "SQLite order store configured");
	Ok(Box::new(SqliteOrderStore::new(pool, create_schema)))
}

/// Registry for the sqlite order store implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "sqlite";
	type Factory = OrderStoreFactory;

	fn factory() -> Self::Factory {
		create_order_store
	}
}

impl OrderStoreRegistry for Registry {}
