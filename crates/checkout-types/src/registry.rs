//! Registry trait for self-registering implementations.
//!
//! Every pluggable backend (cart storage, order storage) exposes a `Registry`
//! type naming itself and handing out its factory function.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. `"memory"` for `[carts.implementations.memory]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
