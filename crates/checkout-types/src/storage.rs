//! Storage-related types for the cart store.

use std::str::FromStr;

/// Namespaces for documents kept in the key-value store.
///
/// Keys are built as `"{namespace}:{id}"`, which lets backends derive
/// per-namespace settings such as TTLs from the key alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Cart documents, keyed by owner key.
	Carts,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Carts => "carts",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Carts].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"carts" => Ok(Self::Carts),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
