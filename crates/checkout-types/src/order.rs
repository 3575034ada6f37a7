//! Order types for the checkout system.
//!
//! This module defines the durable order record created at checkout, its
//! write-once line items, and the enumerated status an order moves through
//! after creation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::{CartItem, OwnerKey};

/// A durable order created from a cart.
///
/// Everything except `status` and `updated_at` is fixed at creation. The
/// total is the sum of the item subtotals computed at checkout time and is
/// never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Unique identifier, generated by the checkout rather than the store.
	pub id: Uuid,
	/// Owner key of the cart this order was created from.
	pub owner: OwnerKey,
	/// Sum of item subtotals at creation.
	pub total: Decimal,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Line items in cart order.
	#[serde(default)]
	pub items: Vec<OrderItem>,
	/// Timestamp when this order was created.
	pub created_at: DateTime<Utc>,
	/// Timestamp when this order was last updated.
	pub updated_at: DateTime<Utc>,
}

/// A line item of an order; a copy of the cart line taken at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
	pub id: Uuid,
	pub order_id: Uuid,
	pub product_id: String,
	pub name: String,
	pub price: Decimal,
	pub quantity: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub image: Option<String>,
	pub subtotal: Decimal,
}

impl OrderItem {
	/// Copies a cart line into a new order line, recomputing the subtotal.
	///
	/// Returns `None` when the subtotal overflows.
	pub fn from_cart_item(order_id: Uuid, item: &CartItem) -> Option<Self> {
		Some(Self {
			id: Uuid::new_v4(),
			order_id,
			product_id: item.product_id.clone(),
			name: item.name.clone(),
			price: item.price,
			quantity: item.quantity,
			size: item.size.clone(),
			image: item.image.clone(),
			subtotal: item.subtotal()?,
		})
	}
}

/// Error returned when a status string is outside the fixed enumeration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid order status: {0}")]
pub struct InvalidStatus(pub String);

/// Status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
	/// Initial status of every order.
	Pending,
	Paid,
	Cancelled,
	Shipped,
	Delivered,
	Failed,
	Refunded,
	/// Awaiting cash-on-delivery collection.
	CodPending,
}

impl OrderStatus {
	/// Returns the canonical upper-case representation.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "PENDING",
			OrderStatus::Paid => "PAID",
			OrderStatus::Cancelled => "CANCELLED",
			OrderStatus::Shipped => "SHIPPED",
			OrderStatus::Delivered => "DELIVERED",
			OrderStatus::Failed => "FAILED",
			OrderStatus::Refunded => "REFUNDED",
			OrderStatus::CodPending => "COD_PENDING",
		}
	}

	/// Returns an iterator over all statuses.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::Paid,
			Self::Cancelled,
			Self::Shipped,
			Self::Delivered,
			Self::Failed,
			Self::Refunded,
			Self::CodPending,
		]
		.into_iter()
	}

	/// Terminal statuses accept no further transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			OrderStatus::Cancelled
				| OrderStatus::Delivered
				| OrderStatus::Failed
				| OrderStatus::Refunded
		)
	}

	/// Statuses an administrator may set directly. The rest can be stored and
	/// read but not assigned through an administrative update.
	pub fn is_admin_settable(&self) -> bool {
		matches!(
			self,
			OrderStatus::Pending
				| OrderStatus::Shipped
				| OrderStatus::Delivered
				| OrderStatus::Cancelled
		)
	}
}

impl FromStr for OrderStatus {
	type Err = InvalidStatus;

	/// Parses a status case-insensitively.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| InvalidStatus(s.to_string()))
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_parsing_is_case_insensitive() {
		assert_eq!("pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
		assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
		assert_eq!(
			"cod_pending".parse::<OrderStatus>().unwrap(),
			OrderStatus::CodPending
		);
		assert_eq!(
			"not-a-real-status".parse::<OrderStatus>(),
			Err(InvalidStatus("not-a-real-status".to_string()))
		);
	}

	#[test]
	fn test_status_serde_matches_as_str() {
		for status in OrderStatus::all() {
			let json = serde_json::to_string(&status).unwrap();
			assert_eq!(json, format!("\"{}\"", status.as_str()));
		}
	}

	#[test]
	fn test_terminal_statuses() {
		assert!(OrderStatus::Cancelled.is_terminal());
		assert!(OrderStatus::Delivered.is_terminal());
		assert!(!OrderStatus::Pending.is_terminal());
		assert!(!OrderStatus::Shipped.is_terminal());
	}

	#[test]
	fn test_admin_settable_statuses() {
		let settable: Vec<_> = OrderStatus::all()
			.filter(OrderStatus::is_admin_settable)
			.collect();
		assert_eq!(
			settable,
			vec![
				OrderStatus::Pending,
				OrderStatus::Cancelled,
				OrderStatus::Shipped,
				OrderStatus::Delivered,
			]
		);
	}

	#[test]
	fn test_order_item_copies_cart_line() {
		let order_id = Uuid::new_v4();
		let line = CartItem::new("sku-1", "Shirt", Decimal::new(1250, 2), 3).with_size("M");
		let item = OrderItem::from_cart_item(order_id, &line).unwrap();

		assert_eq!(item.order_id, order_id);
		assert_eq!(item.size.as_deref(), Some("M"));
		assert_eq!(item.subtotal, Decimal::new(3750, 2));
	}
}
