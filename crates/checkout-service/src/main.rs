//! Main entry point for the checkout service.
//!
//! Loads configuration, wires the configured cart backend and order store
//! into a checkout engine, and runs its maintenance loop (failed cart clear
//! retries and expired cart cleanup) until interrupted. Request handling
//! lives in the embedding application.

use checkout_config::Config;
use checkout_core::{CheckoutBuilder, CheckoutEngine, CheckoutFactories};
use clap::Parser;
use std::path::PathBuf;

use checkout_orders::implementations::memory::create_order_store as create_memory_orders;
use checkout_orders::implementations::sqlite::create_order_store as create_sqlite_orders;
use checkout_storage::implementations::file::create_storage as create_file_storage;
use checkout_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the checkout service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/checkout.toml", env = "CHECKOUT_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started checkout service");

	let config_path = args
		.config
		.to_str()
		.ok_or("configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = build_engine(config)?;
	engine
		.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!("Failed to listen for shutdown signal: {}", e);
			}
		})
		.await?;

	tracing::info!("Stopped checkout service");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the checkout engine with every available backend.
fn build_engine(config: Config) -> Result<CheckoutEngine, Box<dyn std::error::Error>> {
	let cart_factories = create_factory_map!(
		checkout_storage::StorageInterface,
		checkout_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let order_factories = create_factory_map!(
		checkout_orders::OrderStore,
		checkout_orders::OrderStoreError,
		"memory" => create_memory_orders,
		"sqlite" => create_sqlite_orders,
	);

	let factories = CheckoutFactories {
		cart_factories,
		order_factories,
	};

	Ok(CheckoutBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_build_engine_from_config_file() {
		let temp_dir = TempDir::new().unwrap();
		let carts_dir = temp_dir.path().join("carts");
		let config_content = format!(
			r#"
[service]
id = "checkout-test"

[carts]
primary = "file"
[carts.implementations.file]
storage_path = "{}"

[orders]
primary = "sqlite"
[orders.implementations.sqlite]
database_url = "sqlite::memory:"
create_schema = true
"#,
			carts_dir.display()
		);
		let config_path = temp_dir.path().join("checkout.toml");
		fs::write(&config_path, config_content).unwrap();

		let config = Config::from_file(config_path.to_str().unwrap())
			.await
			.unwrap();
		let engine = build_engine(config).unwrap();
		assert_eq!(engine.config().service.id, "checkout-test");
		assert_eq!(engine.sweeper().pending_count().await, 0);
	}

	#[test]
	fn test_unknown_backend_is_rejected() {
		let config = checkout_config::ConfigBuilder::new()
			.orders("postgres", toml::Value::Table(toml::map::Map::new()))
			.build();
		assert!(build_engine(config).is_err());
	}

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["checkout"]);
		assert_eq!(args.log_level, "info");
		assert_eq!(args.config, PathBuf::from("config/checkout.toml"));
	}
}
