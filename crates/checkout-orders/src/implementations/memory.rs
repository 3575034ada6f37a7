//! In-memory order store.
//!
//! Both tables live behind a single lock. Every write is checked in full
//! before anything is mutated, so a rejected `create_order` leaves no trace.

use crate::{OrderStore, OrderStoreError, OrderStoreFactory, OrderStoreRegistry};
use async_trait::async_trait;
use checkout_types::{
	ConfigSchema, ImplementationRegistry, Order, OrderItem, OrderStatus, OwnerKey, Schema,
	ValidationError,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct OrderRow {
	order: Order,
	// Insertion sequence, breaks ties between equal `created_at`
	seq: u64,
}

#[derive(Debug, Default)]
struct Tables {
	orders: HashMap<Uuid, OrderRow>,
	items: HashMap<Uuid, Vec<OrderItem>>,
	item_ids: HashSet<Uuid>,
	next_seq: u64,
}

impl Tables {
	fn assemble(&self, row: &OrderRow) -> Order {
		let mut order = row.order.clone();
		order.items = self.items.get(&order.id).cloned().unwrap_or_default();
		order
	}

	fn check_insert(&self, order: &Order, items: &[OrderItem]) -> Result<(), OrderStoreError> {
		if self.orders.contains_key(&order.id) {
			return Err(OrderStoreError::Backend(format!(
				"duplicate order id {}",
				order.id
			)));
		}
		let mut batch = HashSet::with_capacity(items.len());
		for item in items {
			if item.order_id != order.id {
				return Err(OrderStoreError::Backend(format!(
					"item {} references order {} instead of {}",
					item.id, item.order_id, order.id
				)));
			}
			if self.item_ids.contains(&item.id) || !batch.insert(item.id) {
				return Err(OrderStoreError::Backend(format!(
					"duplicate order item id {}",
					item.id
				)));
			}
		}
		Ok(())
	}
}

/// In-memory order store implementation.
pub struct MemoryOrderStore {
	tables: Arc<RwLock<Tables>>,
}

impl MemoryOrderStore {
	pub fn new() -> Self {
		Self {
			tables: Arc::new(RwLock::new(Tables::default())),
		}
	}
}

impl Default for MemoryOrderStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryOrderStoreSchema)
	}

	async fn create_order(
		&self,
		order: &Order,
		items: &[OrderItem],
	) -> Result<(), OrderStoreError> {
		let mut tables = self.tables.write().await;
		tables.check_insert(order, items)?;

		let seq = tables.next_seq;
		tables.next_seq += 1;
		let mut header = order.clone();
		header.items = Vec::new();
		tables.orders.insert(order.id, OrderRow { order: header, seq });
		tables.item_ids.extend(items.iter().map(|item| item.id));
		tables.items.insert(order.id, items.to_vec());
		Ok(())
	}

	async fn get_order(&self, id: Uuid) -> Result<Order, OrderStoreError> {
		let tables = self.tables.read().await;
		tables
			.orders
			.get(&id)
			.map(|row| tables.assemble(row))
			.ok_or(OrderStoreError::NotFound)
	}

	async fn list_orders_by_owner(&self, owner: &OwnerKey) -> Result<Vec<Order>, OrderStoreError> {
		let tables = self.tables.read().await;
		let mut rows: Vec<&OrderRow> = tables
			.orders
			.values()
			.filter(|row| &row.order.owner == owner)
			.collect();
		rows.sort_by(|a, b| {
			b.order
				.created_at
				.cmp(&a.order.created_at)
				.then(b.seq.cmp(&a.seq))
		});
		Ok(rows.into_iter().map(|row| tables.assemble(row)).collect())
	}

	async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(), OrderStoreError> {
		let mut tables = self.tables.write().await;
		let row = tables.orders.get_mut(&id).ok_or(OrderStoreError::NotFound)?;
		row.order.status = status;
		row.order.updated_at = Utc::now();
		Ok(())
	}

	async fn delete_order(&self, id: Uuid) -> Result<(), OrderStoreError> {
		let mut tables = self.tables.write().await;
		if tables.orders.remove(&id).is_none() {
			return Err(OrderStoreError::NotFound);
		}
		if let Some(items) = tables.items.remove(&id) {
			for item in items {
				tables.item_ids.remove(&item.id);
			}
		}
		Ok(())
	}
}

/// Configuration schema for MemoryOrderStore.
pub struct MemoryOrderStoreSchema;

impl ConfigSchema for MemoryOrderStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory order store from configuration.
pub fn create_order_store(config: &toml::Value) -> Result<Box<dyn OrderStore>, OrderStoreError> {
	MemoryOrderStoreSchema
		.validate(config)
		.map_err(|e| OrderStoreError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryOrderStore::new()))
}

/// Registry for the memory order store implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = OrderStoreFactory;

	fn factory() -> Self::Factory {
		create_order_store
	}
}

impl OrderStoreRegistry for Registry {}
