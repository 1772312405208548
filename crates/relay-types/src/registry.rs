//! Registry trait for self-registering implementations.
//!
//! Signer, chain and relay-transport implementations each expose a
//! `Registry` type so the service can map a configuration name onto a
//! factory function without a hand-maintained match.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// for example `"local"` for `[account.implementations.local]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory function for this implementation.
	fn factory() -> Self::Factory;
}
