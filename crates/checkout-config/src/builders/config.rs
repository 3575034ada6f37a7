//! Configuration builder for tests and local development.

use crate::{CartsConfig, CheckoutConfig, Config, OrdersConfig, ServiceConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to in-memory cart and order backends, which need no settings.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	carts_primary: String,
	carts_config: toml::Value,
	cleanup_interval_seconds: u64,
	orders_primary: String,
	orders_config: toml::Value,
	store_timeout_ms: u64,
	sweep_interval_seconds: u64,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let defaults = CheckoutConfig::default();
		Self {
			service_id: "test-checkout".to_string(),
			carts_primary: "memory".to_string(),
			carts_config: empty_table(),
			cleanup_interval_seconds: 60,
			orders_primary: "memory".to_string(),
			orders_config: empty_table(),
			store_timeout_ms: defaults.store_timeout_ms,
			sweep_interval_seconds: defaults.sweep_interval_seconds,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Selects the cart backend and its settings.
	pub fn carts(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.carts_primary = primary.into();
		self.carts_config = config;
		self
	}

	pub fn cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.cleanup_interval_seconds = interval;
		self
	}

	/// Selects the order store and its settings.
	pub fn orders(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.orders_primary = primary.into();
		self.orders_config = config;
		self
	}

	pub fn store_timeout_ms(mut self, timeout: u64) -> Self {
		self.store_timeout_ms = timeout;
		self
	}

	pub fn sweep_interval_seconds(mut self, interval: u64) -> Self {
		self.sweep_interval_seconds = interval;
		self
	}

	pub fn build(self) -> Config {
		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			carts: CartsConfig {
				implementations: HashMap::from([(self.carts_primary.clone(), self.carts_config)]),
				primary: self.carts_primary,
				cleanup_interval_seconds: self.cleanup_interval_seconds,
			},
			orders: OrdersConfig {
				implementations: HashMap::from([(
					self.orders_primary.clone(),
					self.orders_config,
				)]),
				primary: self.orders_primary,
			},
			checkout: CheckoutConfig {
				store_timeout_ms: self.store_timeout_ms,
				sweep_interval_seconds: self.sweep_interval_seconds,
			},
		}
	}
}
