//! Relational order storage for the checkout system.
//!
//! Orders are stored as a header row plus one row per line item. Creating an
//! order writes the header and every item inside one transaction, so readers
//! observe either none or all of a new order. Implementations are pluggable
//! and selected by name from configuration.

use async_trait::async_trait;
use checkout_types::{
	ConfigSchema, ImplementationRegistry, Order, OrderItem, OrderStatus, OwnerKey,
};
use thiserror::Error;
use uuid::Uuid;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod sqlite;
}

/// Errors that can occur during order store operations.
#[derive(Debug, Error)]
pub enum OrderStoreError {
	/// No order matched the given identifier.
	#[error("Order not found")]
	NotFound,
	/// A stored value could not be converted to or from its domain type.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Connectivity, constraint or transaction failure in the backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Transactional store for order headers and their line items.
#[async_trait]
pub trait OrderStore: Send + Sync {
	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Inserts the order header and all `items` as one atomic unit.
	///
	/// `order.items` is ignored; the rows written are exactly `items`. On any
	/// failure nothing is persisted.
	async fn create_order(&self, order: &Order, items: &[OrderItem])
		-> Result<(), OrderStoreError>;

	/// Loads an order with its items.
	async fn get_order(&self, id: Uuid) -> Result<Order, OrderStoreError>;

	/// Lists the owner's orders with their items, most recent first.
	async fn list_orders_by_owner(&self, owner: &OwnerKey) -> Result<Vec<Order>, OrderStoreError>;

	/// Sets the status of one order and stamps `updated_at`.
	///
	/// Returns [`OrderStoreError::NotFound`] when no row matched.
	async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), OrderStoreError>;

	/// Deletes an order's items and then its header in one transaction.
	///
	/// Returns [`OrderStoreError::NotFound`] when no header matched.
	async fn delete_order(&self, id: Uuid) -> Result<(), OrderStoreError>;
}

/// Type alias for order store factory functions.
pub type OrderStoreFactory = fn(&toml::Value) -> Result<Box<dyn OrderStore>, OrderStoreError>;

/// Registry trait for order store implementations.
pub trait OrderStoreRegistry: ImplementationRegistry<Factory = OrderStoreFactory> {}

/// Get all registered order store implementations as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, OrderStoreFactory)> {
	use implementations::{memory, sqlite};

	vec![
		(memory::Registry::NAME, memory::Registry::factory()),
		(sqlite::Registry::NAME, sqlite::Registry::factory()),
	]
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use checkout_types::CartItem;
	use chrono::{DateTime, Duration, Utc};
	use rust_decimal::Decimal;

	/// Builds a pending order for `owner` from `(price, quantity)` lines.
	pub fn order_with_items(
		owner: &str,
		created_at: DateTime<Utc>,
		lines: &[(i64, u32)],
	) -> (Order, Vec<OrderItem>) {
		let id = Uuid::new_v4();
		let items: Vec<OrderItem> = lines
			.iter()
			.enumerate()
			.map(|(i, (price, qty))| {
				let line = CartItem::new(
					format!("sku-{}", i),
					format!("Item {}", i),
					Decimal::from(*price),
					*qty,
				);
				OrderItem::from_cart_item(id, &line).unwrap()
			})
			.collect();
		let order = Order {
			id,
			owner: OwnerKey::new(owner),
			total: items.iter().map(|item| item.subtotal).sum(),
			status: OrderStatus::Pending,
			items: Vec::new(),
			created_at,
			updated_at: created_at,
		};
		(order, items)
	}

	pub fn at(offset_secs: i64) -> DateTime<Utc> {
		// Millisecond precision, matching what the sqlite store persists
		let base = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap_or_default();
		base + Duration::seconds(offset_secs)
	}

	/// Shared behavioral checks run against every implementation.
	pub async fn exercise_store(store: &dyn OrderStore) {
		// create + get
		let (order, items) = order_with_items("user:42", at(0), &[(10, 2), (5, 1)]);
		store.create_order(&order, &items).await.unwrap();
		let loaded = store.get_order(order.id).await.unwrap();
		assert_eq!(loaded.total, Decimal::from(25));
		assert_eq!(loaded.status, OrderStatus::Pending);
		assert_eq!(loaded.items, items);
		assert_eq!(loaded.created_at, order.created_at);

		// list ordering, newest first, scoped to owner
		let (newer, newer_items) = order_with_items("user:42", at(60), &[(1, 1)]);
		store.create_order(&newer, &newer_items).await.unwrap();
		let (other, other_items) = order_with_items("user:7", at(30), &[(3, 3)]);
		store.create_order(&other, &other_items).await.unwrap();

		let listed = store
			.list_orders_by_owner(&OwnerKey::new("user:42"))
			.await
			.unwrap();
		let ids: Vec<Uuid> = listed.iter().map(|o| o.id).collect();
		assert_eq!(ids, vec![newer.id, order.id]);
		assert_eq!(listed[1].items.len(), 2);
		assert!(store
			.list_orders_by_owner(&OwnerKey::new("user:nobody"))
			.await
			.unwrap()
			.is_empty());

		// status update
		store
			.update_status(order.id, OrderStatus::Shipped)
			.await
			.unwrap();
		let shipped = store.get_order(order.id).await.unwrap();
		assert_eq!(shipped.status, OrderStatus::Shipped);
		assert!(shipped.updated_at >= order.updated_at);
		assert!(matches!(
			store
				.update_status(Uuid::new_v4(), OrderStatus::Cancelled)
				.await,
			Err(OrderStoreError::NotFound)
		));

		// delete
		store.delete_order(order.id).await.unwrap();
		assert!(matches!(
			store.get_order(order.id).await,
			Err(OrderStoreError::NotFound)
		));
		assert!(matches!(
			store.delete_order(order.id).await,
			Err(OrderStoreError::NotFound)
		));
		// other orders untouched
		assert_eq!(store.get_order(other.id).await.unwrap().items.len(), 1);
	}
}
