//! Common types for the checkout system.
//!
//! This crate defines the data types shared by every checkout component:
//! carts and their line items, orders and their status machine, storage
//! namespaces, lifecycle events and the configuration validation framework
//! used by pluggable store implementations.

/// Cart documents, cart line items and owner keys.
pub mod cart;
/// Events published while orders move through checkout and their lifecycle.
pub mod events;
/// Orders, order line items and the order status enumeration.
pub mod order;
/// Self-registration trait for pluggable implementations.
pub mod registry;
/// Storage namespaces for the key-value cart store.
pub mod storage;
/// Small helpers shared across crates.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use cart::*;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::truncate_id;
pub use validation::*;
