//! Factory registry for backend implementations.
//!
//! Collects every storage and settlement backend the workspace provides, so
//! configuration can select them by name.

use courier_config::Config;
use courier_core::{EngineBuilder, EngineFactories, FeedbackSink, FulfillmentEngine};
use courier_settlement::SettlementFactory;
use courier_storage::StorageFactory;
use courier_types::OrderRecord;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Registry of implementation factories, keyed by configuration name.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub settlement: HashMap<String, SettlementFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			settlement: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_settlement(&mut self, name: impl Into<String>, factory: SettlementFactory) {
		self.settlement.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the global registry, registering every implementation on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in courier_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in courier_settlement::get_all_implementations() {
			tracing::debug!("Registering settlement implementation: {}", name);
			registry.register_settlement(name, factory);
		}

		registry
	})
}

/// Picks the registered factory for every configured implementation.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the engine from configuration, seeding it with `orders`.
pub async fn build_engine_from_config(
	config: Config,
	orders: Vec<OrderRecord>,
	feedback_sink: Arc<dyn FeedbackSink>,
) -> Result<FulfillmentEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");
	let settlement_factories = build_factories!(
		registry,
		config.settlement.implementations,
		settlement,
		"settlement"
	);

	let engine = EngineBuilder::new(config)
		.with_orders(orders)
		.with_feedback_sink(feedback_sink)
		.build(EngineFactories {
			storage_factories,
			settlement_factories,
		})
		.await?;
	Ok(engine)
}
