//! Cart mutation path.
//!
//! Every operation reads the whole cart document, changes it in memory and
//! writes it back. Concurrent requests for the same owner can therefore lose
//! an update; the last write wins.

use crate::error::{bounded, CheckoutError};
use checkout_storage::CartStore;
use checkout_types::{truncate_id, Cart, CartItem, OwnerKey};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::instrument;

#[derive(Clone)]
pub struct CartService {
	carts: CartStore,
	timeout: Duration,
}

impl CartService {
	pub fn new(carts: CartStore, timeout: Duration) -> Self {
		Self { carts, timeout }
	}

	/// Returns the owner's cart, or an empty one when none is stored.
	pub async fn get_cart(&self, owner: &OwnerKey) -> Result<Cart, CheckoutError> {
		let cart = bounded(self.timeout, "cart read", self.carts.get(owner)).await?;
		Ok(cart.unwrap_or_else(|| Cart::new(owner.clone())))
	}

	/// Adds `item`, merging it into an existing line for the same product and
	/// size.
	#[instrument(skip_all, fields(owner = %owner, product = %truncate_id(&item.product_id)))]
	pub async fn add_item(&self, owner: &OwnerKey, item: CartItem) -> Result<Cart, CheckoutError> {
		if item.quantity == 0 {
			return Err(CheckoutError::InvalidState(
				"quantity must be at least 1".into(),
			));
		}
		if item.price < Decimal::ZERO {
			return Err(CheckoutError::InvalidState("price cannot be negative".into()));
		}

		let mut cart = self.get_cart(owner).await?;
		match cart.items.iter_mut().find(|line| line.same_variant(&item)) {
			Some(line) => {
				line.quantity = line.quantity.checked_add(item.quantity).ok_or_else(|| {
					CheckoutError::InvalidState("quantity out of range".into())
				})?;
			},
			None => cart.items.push(item),
		}
		if cart.total().is_none() {
			return Err(CheckoutError::InvalidState("amount out of range".into()));
		}

		bounded(self.timeout, "cart write", self.carts.set(owner, &mut cart)).await?;
		tracing::debug!(lines = cart.items.len(), "Cart updated");
		Ok(cart)
	}

	/// Drops lines for `product_id`; only the given size when `size` is set.
	///
	/// Fails with `NotFound` when the owner has no cart.
	#[instrument(skip_all, fields(owner = %owner, product = %truncate_id(product_id)))]
	pub async fn remove_item(
		&self,
		owner: &OwnerKey,
		product_id: &str,
		size: Option<&str>,
	) -> Result<Cart, CheckoutError> {
		let mut cart = bounded(self.timeout, "cart read", self.carts.get(owner))
			.await?
			.ok_or_else(|| CheckoutError::NotFound("cart not found".into()))?;

		cart.items.retain(|line| {
			let same_product = line.product_id == product_id;
			let same_size = size.is_none_or(|size| line.size.as_deref() == Some(size));
			!(same_product && same_size)
		});

		bounded(self.timeout, "cart write", self.carts.set(owner, &mut cart)).await?;
		Ok(cart)
	}

	/// Deletes the owner's cart. Clearing an absent cart succeeds.
	pub async fn clear(&self, owner: &OwnerKey) -> Result<(), CheckoutError> {
		bounded(self.timeout, "cart clear", self.carts.delete(owner)).await
	}
}
