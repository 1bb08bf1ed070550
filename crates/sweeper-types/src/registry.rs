//! Registry trait for named implementations.
//!
//! Storage backends and order repositories declare the name they are
//! selected by in the service configuration together with a factory.

/// Base trait for implementation registries.
///
/// The name must match the key of the implementation table in TOML, for
/// example `memory` for `[orders.implementations.memory]`.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	const NAME: &'static str;

	/// The factory function type, defined by each implementing crate.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
