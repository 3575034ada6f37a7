//! Event types published by the checkout core.
//!
//! Instrumentation and other observers subscribe to these through the event
//! bus injected into the coordinator and lifecycle manager, instead of
//! reaching for process-wide counters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{OrderStatus, OwnerKey};

/// Events emitted while carts become orders and orders change status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CheckoutEvent {
	/// A cart was converted into a persisted order.
	OrderPlaced {
		order_id: Uuid,
		owner: OwnerKey,
		total: Decimal,
		item_count: usize,
	},
	/// The order was written but clearing the cart afterwards failed.
	CartClearFailed { owner: OwnerKey, error: String },
	/// A previously failed cart clear succeeded on retry.
	CartSwept { owner: OwnerKey },
	/// The owner cancelled an order.
	OrderCancelled { order_id: Uuid, owner: OwnerKey },
	/// An administrative status update was applied.
	OrderStatusChanged {
		order_id: Uuid,
		from: OrderStatus,
		to: OrderStatus,
	},
	/// An order was hard-deleted.
	OrderRemoved { order_id: Uuid },
}
