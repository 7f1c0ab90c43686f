//! Registry trait for backends selectable by name in configuration.

/// Declares the configuration name of a backend and how to build it.
///
/// Storage and settlement backends each provide a `Registry` unit struct
/// implementing this trait, so the engine builder can map the name found in
/// `[storage.implementations]` or `[settlement.implementations]` to a
/// factory without hard-coding the list.
pub trait ImplementationRegistry {
	/// Key used in the TOML configuration, e.g. "memory" or "breakdown".
	const NAME: &'static str;

	/// Factory signature for this kind of backend.
	type Factory;

	/// Returns the factory function.
	fn factory() -> Self::Factory;
}
