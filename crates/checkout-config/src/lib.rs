//! Configuration for the checkout service.
//!
//! Configuration is TOML. String values may reference environment variables
//! as `${VAR}` or `${VAR:-default}`; these are substituted before parsing.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["carts.toml", "orders.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

pub mod builders;
mod loader;

pub use builders::config::ConfigBuilder;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, not the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration for a checkout service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// Key-value backend holding carts.
	pub carts: CartsConfig,
	/// Relational backend holding orders.
	pub orders: OrdersConfig,
	/// Checkout and sweeper tuning.
	#[serde(default)]
	pub checkout: CheckoutConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Unique identifier for this instance, used in logs.
	pub id: String,
}

/// Configuration for the cart backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CartsConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of cart backend names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for dropping TTL-expired carts.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval_seconds() -> u64 {
	300
}

/// Configuration for the order store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrdersConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of order store names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Tuning for the checkout coordinator and the cart sweeper.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutConfig {
	/// Upper bound for any single store call made during checkout or a
	/// lifecycle operation.
	#[serde(default = "default_store_timeout_ms")]
	pub store_timeout_ms: u64,
	/// How often carts whose post-checkout clear failed are retried.
	#[serde(default = "default_sweep_interval_seconds")]
	pub sweep_interval_seconds: u64,
}

impl Default for CheckoutConfig {
	fn default() -> Self {
		Self {
			store_timeout_ms: default_store_timeout_ms(),
			sweep_interval_seconds: default_sweep_interval_seconds(),
		}
	}
}

fn default_store_timeout_ms() -> u64 {
	5000
}

fn default_sweep_interval_seconds() -> u64 {
	60
}

static ENV_VAR_PATTERN: LazyLock<Result<Regex, regex::Error>> =
	LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}"));

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME`, or with the text after
/// `:-` when the variable is unset. An unset variable without a default is an
/// error. Input is limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = ENV_VAR_PATTERN
		.as_ref()
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)));
			},
		};
		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

fn validate_section(
	name: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			name
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			name
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} implementation '{}' not found in implementations",
			name, primary
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates cross-field constraints that serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		validate_section("carts", &self.carts.primary, &self.carts.implementations)?;
		if self.carts.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Carts cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.carts.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Carts cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		validate_section("orders", &self.orders.primary, &self.orders.implementations)?;

		if self.checkout.store_timeout_ms == 0 {
			return Err(ConfigError::Validation(
				"Checkout store_timeout_ms must be greater than 0".into(),
			));
		}
		if self.checkout.sweep_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Checkout sweep_interval_seconds must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
