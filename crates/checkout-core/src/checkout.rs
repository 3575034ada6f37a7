//! Converts a cart into a persisted order.

use crate::error::{bounded, CheckoutError};
use crate::event_bus::EventBus;
use crate::sweeper::CartSweeper;
use checkout_orders::OrderStore;
use checkout_storage::CartStore;
use checkout_types::{truncate_id, Cart, CheckoutEvent, Order, OrderItem, OrderStatus, OwnerKey};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Reads a cart, writes the order and its items in one transaction, then
/// clears the cart on a best-effort basis.
///
/// Two checkouts for the same owner are not serialized. If both read the cart
/// before either clears it, both create an order.
pub struct CheckoutCoordinator {
	carts: CartStore,
	orders: Arc<dyn OrderStore>,
	sweeper: CartSweeper,
	event_bus: EventBus,
	timeout: Duration,
}

impl CheckoutCoordinator {
	pub fn new(
		carts: CartStore,
		orders: Arc<dyn OrderStore>,
		sweeper: CartSweeper,
		event_bus: EventBus,
		timeout: Duration,
	) -> Self {
		Self {
			carts,
			orders,
			sweeper,
			event_bus,
			timeout,
		}
	}

	/// Places an order from the owner's current cart and returns it.
	///
	/// Fails with `InvalidState` when there is no cart or it is empty. A
	/// failure to clear the cart afterwards does not fail the checkout.
	#[instrument(skip_all, fields(owner = %owner))]
	pub async fn checkout(&self, owner: &OwnerKey) -> Result<Order, CheckoutError> {
		let cart = bounded(self.timeout, "cart read", self.carts.get(owner))
			.await?
			.filter(|cart| !cart.is_empty())
			.ok_or_else(|| CheckoutError::InvalidState("no valid cart".into()))?;

		if cart.items.iter().any(|item| item.quantity == 0) {
			return Err(CheckoutError::InvalidState(
				"cart contains a line with zero quantity".into(),
			));
		}

		let (mut order, items) = materialize(owner, &cart)?;
		bounded(
			self.timeout,
			"order create",
			self.orders.create_order(&order, &items),
		)
		.await?;
		order.items = items;

		tracing::info!(
			order_id = %truncate_id(&order.id.to_string()),
			total = %order.total,
			items = order.items.len(),
			"Order placed"
		);
		self.event_bus
			.publish(CheckoutEvent::OrderPlaced {
				order_id: order.id,
				owner: owner.clone(),
				total: order.total,
				item_count: order.items.len(),
			})
			.ok();

		self.clear_cart(owner, &cart).await;
		Ok(order)
	}

	async fn clear_cart(&self, owner: &OwnerKey, cart: &Cart) {
		if let Err(e) = bounded(self.timeout, "cart clear", self.carts.delete(owner)).await {
			tracing::warn!(error = %e, "Failed to clear cart after checkout");
			self.event_bus
				.publish(CheckoutEvent::CartClearFailed {
					owner: owner.clone(),
					error: e.to_string(),
				})
				.ok();
			self.sweeper.enqueue(owner.clone(), cart.updated_at).await;
		}
	}
}

/// Builds a pending order and its items from `cart`, recomputing every
/// subtotal.
fn materialize(
	owner: &OwnerKey,
	cart: &Cart,
) -> Result<(Order, Vec<OrderItem>), CheckoutError> {
	let out_of_range = || CheckoutError::InvalidState("amount out of range".into());

	let id = Uuid::new_v4();
	let items = cart
		.items
		.iter()
		.map(|item| OrderItem::from_cart_item(id, item))
		.collect::<Option<Vec<_>>>()
		.ok_or_else(out_of_range)?;
	let total = items
		.iter()
		.try_fold(Decimal::ZERO, |total, item| total.checked_add(item.subtotal))
		.ok_or_else(out_of_range)?;

	// Stores keep millisecond timestamps
	let now = Utc::now();
	let now = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
	let order = Order {
		id,
		owner: owner.clone(),
		total,
		status: OrderStatus::Pending,
		items: Vec::new(),
		created_at: now,
		updated_at: now,
	};
	Ok((order, items))
}
