//! Order status transitions and read paths.
//!
//! Orders start `PENDING`. Owners may cancel their own orders while they are
//! still pending; administrators may move an order to `PENDING`, `SHIPPED`,
//! `DELIVERED` or `CANCELLED`. Once an order reaches a terminal status
//! (`CANCELLED`, `DELIVERED`, `FAILED`, `REFUNDED`) it no longer changes.

use crate::error::{bounded, CheckoutError};
use crate::event_bus::EventBus;
use checkout_orders::OrderStore;
use checkout_types::{truncate_id, CheckoutEvent, Order, OrderStatus, OwnerKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Applies status transitions and exposes order reads.
pub struct OrderLifecycleManager {
	orders: Arc<dyn OrderStore>,
	event_bus: EventBus,
	timeout: Duration,
}

impl OrderLifecycleManager {
	pub fn new(orders: Arc<dyn OrderStore>, event_bus: EventBus, timeout: Duration) -> Self {
		Self {
			orders,
			event_bus,
			timeout,
		}
	}

	/// Loads an order by id.
	///
	/// Reads are not filtered by owner; the requester is only recorded.
	#[instrument(skip_all, fields(order_id = %truncate_id(&id.to_string()), admin = requester_is_admin))]
	pub async fn get_by_id(
		&self,
		id: Uuid,
		requester_is_admin: bool,
		requester_owner: Option<&OwnerKey>,
	) -> Result<Order, CheckoutError> {
		let order = self.load(id).await?;
		if !requester_is_admin && requester_owner != Some(&order.owner) {
			tracing::debug!("Order read by a requester other than its owner");
		}
		Ok(order)
	}

	/// Lists the owner's orders, most recent first.
	pub async fn list_by_owner(&self, owner: &OwnerKey) -> Result<Vec<Order>, CheckoutError> {
		bounded(
			self.timeout,
			"order list",
			self.orders.list_orders_by_owner(owner),
		)
		.await
	}

	/// Cancels an order on behalf of its owner.
	#[instrument(skip_all, fields(order_id = %truncate_id(&id.to_string()), requester = %requester))]
	pub async fn cancel(&self, requester: &OwnerKey, id: Uuid) -> Result<(), CheckoutError> {
		let order = self.load(id).await?;
		if &order.owner != requester {
			tracing::warn!("Cancellation rejected: requester does not own the order");
			return Err(CheckoutError::Unauthorized(
				"order belongs to another owner".into(),
			));
		}
		if order.status != OrderStatus::Pending {
			return Err(CheckoutError::InvalidState(format!(
				"order is {} and can only be cancelled while PENDING",
				order.status
			)));
		}

		self.store_status(id, OrderStatus::Cancelled).await?;
		tracing::info!("Order cancelled");
		self.event_bus
			.publish(CheckoutEvent::OrderCancelled {
				order_id: id,
				owner: order.owner,
			})
			.ok();
		Ok(())
	}

	/// Administrative status update from untrusted text.
	///
	/// The status is parsed before any store access, so an unknown value
	/// fails with `InvalidState` and leaves storage untouched.
	pub async fn set_status(&self, id: Uuid, status: &str) -> Result<(), CheckoutError> {
		let status: OrderStatus = status.parse()?;
		self.transition(id, status).await
	}

	/// Administrative status update. No ownership check is made.
	///
	/// Only statuses for which [`OrderStatus::is_admin_settable`] holds are
	/// accepted.
	#[instrument(skip_all, fields(order_id = %truncate_id(&id.to_string()), to = %status))]
	pub async fn transition(&self, id: Uuid, status: OrderStatus) -> Result<(), CheckoutError> {
		if !status.is_admin_settable() {
			return Err(CheckoutError::InvalidState(format!(
				"status {} cannot be set administratively",
				status
			)));
		}
		let order = self.load(id).await?;
		ensure_mutable(&order)?;

		self.store_status(id, status).await?;
		tracing::info!(from = %order.status, "Order status changed");
		self.event_bus
			.publish(CheckoutEvent::OrderStatusChanged {
				order_id: id,
				from: order.status,
				to: status,
			})
			.ok();
		Ok(())
	}

	/// Administrative hard delete of an order and its items.
	#[instrument(skip_all, fields(order_id = %truncate_id(&id.to_string())))]
	pub async fn remove(&self, id: Uuid) -> Result<(), CheckoutError> {
		bounded(self.timeout, "order delete", self.orders.delete_order(id)).await?;
		tracing::info!("Order removed");
		self.event_bus
			.publish(CheckoutEvent::OrderRemoved { order_id: id })
			.ok();
		Ok(())
	}

	async fn load(&self, id: Uuid) -> Result<Order, CheckoutError> {
		bounded(self.timeout, "order read", self.orders.get_order(id)).await
	}

	async fn store_status(&self, id: Uuid, status: OrderStatus) -> Result<(), CheckoutError> {
		bounded(
			self.timeout,
			"order status update",
			self.orders.update_status(id, status),
		)
		.await
	}
}

fn ensure_mutable(order: &Order) -> Result<(), CheckoutError> {
	if order.status.is_terminal() {
		return Err(CheckoutError::InvalidState(format!(
			"order is {} and can no longer change",
			order.status
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use checkout_orders::implementations::memory::MemoryOrderStore;
	use checkout_types::{CartItem, OrderItem};
	use chrono::Utc;
	use rust_decimal::Decimal;

	fn setup() -> (OrderLifecycleManager, Arc<dyn OrderStore>, EventBus) {
		let orders: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());
		let bus = EventBus::default();
		let manager = OrderLifecycleManager::new(orders.clone(), bus.clone(), Duration::from_secs(1));
		(manager, orders, bus)
	}

	async fn place(orders: &Arc<dyn OrderStore>, owner: &str) -> Uuid {
		let id = Uuid::new_v4();
		let items = vec![OrderItem::from_cart_item(
			id,
			&CartItem::new("A", "A", Decimal::from(10), 2),
		)
		.unwrap()];
		let now = Utc::now();
		let order = Order {
			id,
			owner: OwnerKey::new(owner),
			total: Decimal::from(20),
			status: OrderStatus::Pending,
			items: Vec::new(),
			created_at: now,
			updated_at: now,
		};
		orders.create_order(&order, &items).await.unwrap();
		id
	}

	#[tokio::test]
	async fn test_owner_can_cancel() {
		let (manager, orders, bus) = setup();
		let mut events = bus.subscribe();
		let id = place(&orders, "user:42").await;

		manager.cancel(&OwnerKey::new("user:42"), id).await.unwrap();

		let order = manager.get_by_id(id, false, None).await.unwrap();
		assert_eq!(order.status, OrderStatus::Cancelled);
		assert_eq!(
			events.recv().await.unwrap(),
			CheckoutEvent::OrderCancelled {
				order_id: id,
				owner: OwnerKey::new("user:42"),
			}
		);
	}

	#[tokio::test]
	async fn test_other_owner_cannot_cancel() {
		let (manager, orders, _) = setup();
		let id = place(&orders, "user:42").await;

		let err = manager
			.cancel(&OwnerKey::new("user:7"), id)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Unauthorized);
		assert_eq!(
			orders.get_order(id).await.unwrap().status,
			OrderStatus::Pending
		);
	}

	#[tokio::test]
	async fn test_cancel_unknown_order_is_not_found() {
		let (manager, _, _) = setup();
		let err = manager
			.cancel(&OwnerKey::new("user:42"), Uuid::new_v4())
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
	}

	#[tokio::test]
	async fn test_terminal_orders_do_not_change() {
		let (manager, orders, _) = setup();
		let owner = OwnerKey::new("user:42");
		let id = place(&orders, "user:42").await;
		manager.cancel(&owner, id).await.unwrap();
		let cancelled_at = orders.get_order(id).await.unwrap().updated_at;

		let err = manager.cancel(&owner, id).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::InvalidState);
		let err = manager.set_status(id, "SHIPPED").await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::InvalidState);

		let order = orders.get_order(id).await.unwrap();
		assert_eq!(order.status, OrderStatus::Cancelled);
		assert_eq!(order.updated_at, cancelled_at);
	}

	#[tokio::test]
	async fn test_owner_cannot_cancel_after_pending() {
		let (manager, orders, bus) = setup();
		let owner = OwnerKey::new("user:42");

		for status in [OrderStatus::Shipped, OrderStatus::Paid] {
			let id = place(&orders, "user:42").await;
			orders.update_status(id, status).await.unwrap();
			let before = orders.get_order(id).await.unwrap();
			let mut events = bus.subscribe();

			let err = manager.cancel(&owner, id).await.unwrap_err();
			assert_eq!(err.kind(), ErrorKind::InvalidState);
			assert_eq!(orders.get_order(id).await.unwrap(), before);
			assert!(events.try_recv().is_err());
		}
	}

	#[tokio::test]
	async fn test_admin_cannot_set_flow_statuses() {
		let (manager, orders, _) = setup();
		let id = place(&orders, "user:42").await;
		let before = orders.get_order(id).await.unwrap();

		for status in ["PAID", "failed", "Refunded", "COD_PENDING"] {
			let err = manager.set_status(id, status).await.unwrap_err();
			assert_eq!(err.kind(), ErrorKind::InvalidState);
		}
		let err = manager
			.transition(id, OrderStatus::Paid)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::InvalidState);
		assert_eq!(orders.get_order(id).await.unwrap(), before);

		manager.set_status(id, "DELIVERED").await.unwrap();
		assert_eq!(
			orders.get_order(id).await.unwrap().status,
			OrderStatus::Delivered
		);
	}

	#[tokio::test]
	async fn test_set_status_validates_before_storage() {
		let (manager, orders, _) = setup();
		let id = place(&orders, "user:42").await;
		let before = orders.get_order(id).await.unwrap();

		let err = manager
			.set_status(id, "not-a-real-status")
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::InvalidState);
		assert_eq!(orders.get_order(id).await.unwrap(), before);

		// Unknown status on an unknown id still reports the status problem
		let err = manager
			.set_status(Uuid::new_v4(), "bogus")
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::InvalidState);
	}

	#[tokio::test]
	async fn test_admin_status_updates() {
		let (manager, orders, bus) = setup();
		let mut events = bus.subscribe();
		let id = place(&orders, "guest:s-1:cart").await;

		manager.set_status(id, "shipped").await.unwrap();
		manager.set_status(id, "Delivered").await.unwrap();
		assert_eq!(
			orders.get_order(id).await.unwrap().status,
			OrderStatus::Delivered
		);

		assert_eq!(
			events.recv().await.unwrap(),
			CheckoutEvent::OrderStatusChanged {
				order_id: id,
				from: OrderStatus::Pending,
				to: OrderStatus::Shipped,
			}
		);

		let err = manager
			.transition(Uuid::new_v4(), OrderStatus::Shipped)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
	}

	#[tokio::test]
	async fn test_list_and_remove() {
		let (manager, orders, _) = setup();
		let owner = OwnerKey::new("user:42");
		let first = place(&orders, "user:42").await;
		let second = place(&orders, "user:42").await;
		place(&orders, "user:7").await;

		let listed = manager.list_by_owner(&owner).await.unwrap();
		assert_eq!(listed.len(), 2);
		assert!(listed.iter().all(|o| o.owner == owner));
		assert!(listed.iter().any(|o| o.id == first));

		manager.remove(second).await.unwrap();
		assert_eq!(manager.list_by_owner(&owner).await.unwrap().len(), 1);
		let err = manager.get_by_id(second, true, None).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
		let err = manager.remove(second).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
	}

	#[tokio::test]
	async fn test_reads_are_not_owner_filtered() {
		let (manager, orders, _) = setup();
		let id = place(&orders, "user:42").await;
		let stranger = OwnerKey::new("user:7");

		let order = manager.get_by_id(id, false, Some(&stranger)).await.unwrap();
		assert_eq!(order.id, id);
	}
}
