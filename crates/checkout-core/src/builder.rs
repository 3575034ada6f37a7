//! Builds a [`CheckoutEngine`] from configuration and backend factories.
//!
//! Every implementation listed in the configuration is constructed, so a
//! misconfigured secondary backend is reported at startup too. The one named
//! `primary` is then used.

use crate::engine::CheckoutEngine;
use crate::event_bus::EventBus;
use checkout_config::Config;
use checkout_orders::{OrderStore, OrderStoreError};
use checkout_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for each pluggable backend, keyed by implementation name.
pub struct CheckoutFactories<CF, OF> {
	pub cart_factories: HashMap<String, CF>,
	pub order_factories: HashMap<String, OF>,
}

pub struct CheckoutBuilder {
	config: Config,
	event_bus: EventBus,
}

impl CheckoutBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			event_bus: EventBus::default(),
		}
	}

	/// Uses an existing event bus, e.g. one a caller already subscribed to.
	pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
		self.event_bus = event_bus;
		self
	}

	pub fn build<CF, OF>(
		self,
		factories: CheckoutFactories<CF, OF>,
	) -> Result<CheckoutEngine, BuilderError>
	where
		CF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		OF: Fn(&toml::Value) -> Result<Box<dyn OrderStore>, OrderStoreError>,
	{
		let cart_backend = select_primary(
			"carts",
			&self.config.carts.primary,
			&self.config.carts.implementations,
			&factories.cart_factories,
		)?;
		let order_store = select_primary(
			"orders",
			&self.config.orders.primary,
			&self.config.orders.implementations,
			&factories.order_factories,
		)?;

		let storage = Arc::new(StorageService::new(cart_backend));
		Ok(CheckoutEngine::new(
			self.config,
			storage,
			Arc::from(order_store),
			self.event_bus,
		))
	}
}

/// Instantiates every configured implementation that has a factory and
/// returns the primary one.
fn select_primary<T: ?Sized, E: Display, F>(
	component: &str,
	primary: &str,
	configs: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<Box<T>, BuilderError>
where
	F: Fn(&toml::Value) -> Result<Box<T>, E>,
{
	let mut loaded = HashMap::new();
	for (name, config) in configs {
		let Some(factory) = factories.get(name) else {
			tracing::warn!(component, implementation = %name, "No factory registered, skipping");
			continue;
		};
		match factory(config) {
			Ok(implementation) => {
				let is_primary = primary == name;
				tracing::info!(component, implementation = %name, enabled = %is_primary, "Loaded");
				loaded.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	if loaded.is_empty() {
		return Err(BuilderError::MissingComponent(format!(
			"no {} implementation available",
			component
		)));
	}

	loaded.remove(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} implementation '{}' failed to load or has no factory",
			component, primary
		))
	})
}
