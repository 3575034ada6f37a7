//! Cart types for the checkout system.
//!
//! A cart is an ephemeral, single-owner document holding prospective purchase
//! lines. Prices are snapshots taken when the line was added; subtotals are
//! always derived and never read back from a stored document.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identity that scopes a cart and owns the orders created from it.
///
/// The key is either derived from an authenticated user id or from a guest
/// session id. Ownership checks compare keys for equality and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerKey(String);

/// Error returned when no identity is available to derive an owner key from.
#[derive(Debug, Error)]
#[error("Unable to identify session")]
pub struct MissingIdentity;

impl OwnerKey {
	/// Wraps an already derived key.
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	/// Key for an authenticated user.
	pub fn user(user_id: &str) -> Self {
		Self(format!("user:{}:cart", user_id))
	}

	/// Key for an anonymous guest session.
	pub fn guest(session_id: &str) -> Self {
		Self(format!("guest:{}:cart", session_id))
	}

	/// Derives the key from whatever identity the request carries.
	///
	/// An authenticated user id wins over a guest session id. Empty strings
	/// count as absent.
	pub fn from_identity(
		user_id: Option<&str>,
		session_id: Option<&str>,
	) -> Result<Self, MissingIdentity> {
		match (user_id, session_id) {
			(Some(uid), _) if !uid.is_empty() => Ok(Self::user(uid)),
			(_, Some(sid)) if !sid.is_empty() => Ok(Self::guest(sid)),
			_ => Err(MissingIdentity),
		}
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for OwnerKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// A single line in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
	/// Catalog identifier of the product.
	pub product_id: String,
	/// Display name captured when the line was added.
	pub name: String,
	/// Unit price captured when the line was added.
	pub price: Decimal,
	/// Number of units, at least one.
	pub quantity: u32,
	/// Optional size or variant.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size: Option<String>,
	/// Optional image reference.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub image: Option<String>,
}

impl CartItem {
	pub fn new(
		product_id: impl Into<String>,
		name: impl Into<String>,
		price: Decimal,
		quantity: u32,
	) -> Self {
		Self {
			product_id: product_id.into(),
			name: name.into(),
			price,
			quantity,
			size: None,
			image: None,
		}
	}

	pub fn with_size(mut self, size: impl Into<String>) -> Self {
		self.size = Some(size.into());
		self
	}

	pub fn with_image(mut self, image: impl Into<String>) -> Self {
		self.image = Some(image.into());
		self
	}

	/// Unit price times quantity, `None` when the product overflows.
	pub fn subtotal(&self) -> Option<Decimal> {
		self.price.checked_mul(Decimal::from(self.quantity))
	}

	/// Whether this line and `other` describe the same product and variant.
	pub fn same_variant(&self, other: &CartItem) -> bool {
		self.product_id == other.product_id && self.size == other.size
	}
}

/// The cart document stored under its owner's key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
	pub owner: OwnerKey,
	#[serde(default)]
	pub items: Vec<CartItem>,
	pub updated_at: DateTime<Utc>,
}

impl Cart {
	/// Creates an empty cart for `owner`.
	pub fn new(owner: OwnerKey) -> Self {
		Self {
			owner,
			items: Vec::new(),
			updated_at: Utc::now(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Sum of all line subtotals, `None` when any amount overflows.
	pub fn total(&self) -> Option<Decimal> {
		self.items
			.iter()
			.try_fold(Decimal::ZERO, |total, item| total.checked_add(item.subtotal()?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dec(value: i64) -> Decimal {
		Decimal::from(value)
	}

	#[test]
	fn test_owner_key_prefers_user() {
		let key = OwnerKey::from_identity(Some("42"), Some("abc")).unwrap();
		assert_eq!(key.as_str(), "user:42:cart");

		let key = OwnerKey::from_identity(Some(""), Some("abc")).unwrap();
		assert_eq!(key.as_str(), "guest:abc:cart");

		assert!(OwnerKey::from_identity(None, None).is_err());
		assert!(OwnerKey::from_identity(Some(""), Some("")).is_err());
	}

	#[test]
	fn test_subtotal_and_total() {
		let mut cart = Cart::new(OwnerKey::new("user:1"));
		cart.items.push(CartItem::new("a", "A", dec(10), 2));
		cart.items.push(CartItem::new("b", "B", dec(5), 1));

		assert_eq!(cart.items[0].subtotal(), Some(dec(20)));
		assert_eq!(cart.total(), Some(dec(25)));
	}

	#[test]
	fn test_amount_overflow_is_none() {
		let line = CartItem::new("a", "A", Decimal::MAX, 2);
		assert_eq!(line.subtotal(), None);

		let mut cart = Cart::new(OwnerKey::new("user:1"));
		cart.items.push(CartItem::new("a", "A", Decimal::MAX, 1));
		cart.items.push(CartItem::new("b", "B", Decimal::MAX, 1));
		assert_eq!(cart.total(), None);
	}

	#[test]
	fn test_cart_json_ignores_stored_subtotal() {
		let json = r#"{
			"owner": "user:1",
			"items": [{"productId": "a", "name": "A", "price": "3.50", "quantity": 2, "subtotal": "999"}],
			"updatedAt": "2024-01-01T00:00:00Z"
		}"#;
		let cart: Cart = serde_json::from_str(json).unwrap();
		assert_eq!(cart.items[0].subtotal(), Some(Decimal::new(700, 2)));
		assert_eq!(cart.items[0].size, None);
	}
}
