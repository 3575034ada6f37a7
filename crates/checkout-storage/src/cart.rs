//! Cart store adapter.
//!
//! Exposes whole-document `get`/`set`/`delete` over the key-value
//! [`StorageService`]. There is no partial update and no compare-and-swap:
//! callers read, modify and write back the full cart, and two concurrent
//! writers for the same owner can lose an update.

use crate::{StorageError, StorageService};
use checkout_types::{Cart, OwnerKey, StorageKey};
use chrono::Utc;
use std::sync::Arc;

/// Carts keyed by owner key.
#[derive(Clone)]
pub struct CartStore {
	storage: Arc<StorageService>,
}

impl CartStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Returns the cart for `owner`, or `None` when no cart exists.
	pub async fn get(&self, owner: &OwnerKey) -> Result<Option<Cart>, StorageError> {
		self.storage
			.retrieve_optional(StorageKey::Carts.as_str(), owner.as_str())
			.await
	}

	/// Replaces the cart for `owner`, stamping `updated_at`.
	pub async fn set(&self, owner: &OwnerKey, cart: &mut Cart) -> Result<(), StorageError> {
		cart.updated_at = Utc::now();
		self.storage
			.store(StorageKey::Carts.as_str(), owner.as_str(), cart)
			.await
	}

	/// Deletes the cart for `owner`. Deleting an absent cart succeeds.
	pub async fn delete(&self, owner: &OwnerKey) -> Result<(), StorageError> {
		self.storage
			.remove(StorageKey::Carts.as_str(), owner.as_str())
			.await
	}

	/// Drops carts whose TTL has elapsed.
	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.storage.cleanup_expired().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use checkout_types::CartItem;
	use rust_decimal::Decimal;

	fn store() -> CartStore {
		CartStore::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	#[tokio::test]
	async fn test_get_set_delete() {
		let carts = store();
		let owner = OwnerKey::user("42");

		assert!(carts.get(&owner).await.unwrap().is_none());

		let mut cart = Cart::new(owner.clone());
		let created = cart.updated_at;
		cart.items.push(CartItem::new("sku-1", "Mug", Decimal::from(8), 1));
		carts.set(&owner, &mut cart).await.unwrap();
		assert!(cart.updated_at >= created);

		let loaded = carts.get(&owner).await.unwrap().unwrap();
		assert_eq!(loaded, cart);

		carts.delete(&owner).await.unwrap();
		assert!(carts.get(&owner).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_carts_are_isolated_per_owner() {
		let carts = store();
		let alice = OwnerKey::user("alice");
		let guest = OwnerKey::guest("s-1");

		let mut cart = Cart::new(alice.clone());
		carts.set(&alice, &mut cart).await.unwrap();

		assert!(carts.get(&alice).await.unwrap().is_some());
		assert!(carts.get(&guest).await.unwrap().is_none());
	}
}
