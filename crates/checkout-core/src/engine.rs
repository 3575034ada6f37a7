//! Wired checkout components and their background maintenance loop.

use crate::cart::CartService;
use crate::checkout::CheckoutCoordinator;
use crate::event_bus::EventBus;
use crate::lifecycle::OrderLifecycleManager;
use crate::sweeper::CartSweeper;
use checkout_config::Config;
use checkout_orders::OrderStore;
use checkout_storage::{CartStore, StorageService};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Service error: {0}")]
	Service(String),
}

/// Cart service, checkout coordinator, lifecycle manager and sweeper sharing
/// one cart backend, one order store and one event bus.
#[derive(Clone)]
pub struct CheckoutEngine {
	config: Config,
	carts: CartService,
	checkout: Arc<CheckoutCoordinator>,
	lifecycle: Arc<OrderLifecycleManager>,
	sweeper: CartSweeper,
	event_bus: EventBus,
}

impl CheckoutEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		orders: Arc<dyn OrderStore>,
		event_bus: EventBus,
	) -> Self {
		let timeout = Duration::from_millis(config.checkout.store_timeout_ms);
		let cart_store = CartStore::new(storage);
		let sweeper = CartSweeper::new(cart_store.clone(), event_bus.clone(), timeout);

		let checkout = Arc::new(CheckoutCoordinator::new(
			cart_store.clone(),
			orders.clone(),
			sweeper.clone(),
			event_bus.clone(),
			timeout,
		));
		let lifecycle = Arc::new(OrderLifecycleManager::new(
			orders,
			event_bus.clone(),
			timeout,
		));

		Self {
			config,
			carts: CartService::new(cart_store, timeout),
			checkout,
			lifecycle,
			sweeper,
			event_bus,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn carts(&self) -> &CartService {
		&self.carts
	}

	pub fn checkout(&self) -> &CheckoutCoordinator {
		&self.checkout
	}

	pub fn lifecycle(&self) -> &OrderLifecycleManager {
		&self.lifecycle
	}

	pub fn sweeper(&self) -> &CartSweeper {
		&self.sweeper
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Runs cart sweeps and expired-cart cleanup until `shutdown` resolves.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		let mut sweep_interval = tokio::time::interval(Duration::from_secs(
			self.config.checkout.sweep_interval_seconds,
		));
		let mut cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.carts.cleanup_interval_seconds,
		));
		let mut events = self.event_bus.subscribe();
		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				_ = sweep_interval.tick() => {
					self.sweeper.sweep().await;
				}
				_ = cleanup_interval.tick() => {
					match self.sweeper.cleanup_expired().await {
						Ok(count) if count > 0 => {
							tracing::debug!("Cart cleanup: removed {} expired carts", count);
						}
						Err(e) => {
							tracing::warn!("Cart cleanup failed: {}", e);
						}
						_ => {}
					}
				}
				event = events.recv() => match event {
					Ok(event) => tracing::debug!(?event, "Checkout event"),
					Err(RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Event log lagging, events dropped");
					}
					Err(RecvError::Closed) => {
						return Err(EngineError::Service("event bus closed".into()));
					}
				},
				_ = &mut shutdown => {
					tracing::info!("Shutting down checkout engine");
					break;
				}
			}
		}

		Ok(())
	}
}
