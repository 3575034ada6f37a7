//! Checkout and order lifecycle core.
//!
//! Coordinates two stores with different guarantees: an ephemeral key-value
//! store holding carts, and a transactional relational store holding orders.
//! A checkout writes the order atomically and then clears the cart on a
//! best-effort basis; a cart whose clear failed is retried by the
//! [`CartSweeper`]. Every store call is bounded by the configured timeout.

pub mod builder;
pub mod cart;
pub mod checkout;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod lifecycle;
pub mod sweeper;

pub use builder::{BuilderError, CheckoutBuilder, CheckoutFactories};
pub use cart::CartService;
pub use checkout::CheckoutCoordinator;
pub use engine::{CheckoutEngine, EngineError};
pub use error::{CheckoutError, ErrorKind};
pub use event_bus::EventBus;
pub use lifecycle::OrderLifecycleManager;
pub use sweeper::{CartSweeper, SweepReport};

#[cfg(test)]
pub(crate) mod test_support {
	use async_trait::async_trait;
	use checkout_orders::{OrderStore, OrderStoreError};
	use checkout_storage::implementations::memory::MemoryStorage;
	use checkout_storage::{CartStore, StorageError, StorageInterface, StorageService};
	use checkout_types::{ConfigSchema, Order, OrderItem, OrderStatus, OwnerKey};
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Arc;
	use std::time::Duration;
	use uuid::Uuid;

	pub fn memory_carts() -> CartStore {
		CartStore::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	/// Toggles failures on a [`FlakyStorage`] after it has been boxed.
	#[derive(Clone, Default)]
	pub struct FailureSwitch {
		reads: Arc<AtomicBool>,
		deletes: Arc<AtomicBool>,
	}

	impl FailureSwitch {
		pub fn fail_reads(&self, on: bool) {
			self.reads.store(on, Ordering::SeqCst);
		}

		pub fn fail_deletes(&self, on: bool) {
			self.deletes.store(on, Ordering::SeqCst);
		}
	}

	/// Memory backend whose reads or deletes can be made to fail.
	pub struct FlakyStorage {
		inner: MemoryStorage,
		switch: FailureSwitch,
	}

	impl FlakyStorage {
		pub fn new() -> (Self, FailureSwitch) {
			let switch = FailureSwitch::default();
			let storage = Self {
				inner: MemoryStorage::new(),
				switch: switch.clone(),
			};
			(storage, switch)
		}

		fn unavailable() -> StorageError {
			StorageError::Backend("connection refused".into())
		}
	}

	#[async_trait]
	impl StorageInterface for FlakyStorage {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			if self.switch.reads.load(Ordering::SeqCst) {
				return Err(Self::unavailable());
			}
			self.inner.get_bytes(key).await
		}

		async fn set_bytes(
			&self,
			key: &str,
			value: Vec<u8>,
			ttl: Option<Duration>,
		) -> Result<(), StorageError> {
			self.inner.set_bytes(key, value, ttl).await
		}

		async fn delete(&self, key: &str) -> Result<(), StorageError> {
			if self.switch.deletes.load(Ordering::SeqCst) {
				return Err(Self::unavailable());
			}
			self.inner.delete(key).await
		}

		async fn exists(&self, key: &str) -> Result<bool, StorageError> {
			self.inner.exists(key).await
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}

	/// Order store that never answers.
	pub struct StallingOrderStore;

	impl StallingOrderStore {
		async fn stall<T>() -> Result<T, OrderStoreError> {
			std::future::pending().await
		}
	}

	#[async_trait]
	impl OrderStore for StallingOrderStore {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(checkout_orders::implementations::memory::MemoryOrderStoreSchema)
		}

		async fn create_order(&self, _: &Order, _: &[OrderItem]) -> Result<(), OrderStoreError> {
			Self::stall().await
		}

		async fn get_order(&self, _: Uuid) -> Result<Order, OrderStoreError> {
			Self::stall().await
		}

		async fn list_orders_by_owner(&self, _: &OwnerKey) -> Result<Vec<Order>, OrderStoreError> {
			Self::stall().await
		}

		async fn update_status(&self, _: Uuid, _: OrderStatus) -> Result<(), OrderStoreError> {
			Self::stall().await
		}

		async fn delete_order(&self, _: Uuid) -> Result<(), OrderStoreError> {
			Self::stall().await
		}
	}
}
