//! Builder pattern for constructing fulfillment engines.
//!
//! Composes a [`FulfillmentEngine`] from the storage and settlement backends
//! named in configuration, using factory functions registered by name.
//! The clock, feedback sink and initial orders can be overridden.

use crate::clock::{Clock, SystemClock};
use crate::engine::{event_bus::EventBus, FulfillmentEngine};
use crate::feedback::{FeedbackSink, TracingFeedbackSink};
use crate::orders::{OrderRepository, StorageOrderRepository};
use crate::payouts::PayoutLedger;
use courier_config::Config;
use courier_settlement::{
	SettlementError, SettlementInterface, SettlementService, WithdrawalPolicy,
};
use courier_storage::{StorageError, StorageInterface, StorageService};
use courier_types::OrderRecord;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Failed to seed orders: {0}")]
	Seed(String),
}

/// Factory functions available to the builder, keyed by implementation name.
pub struct EngineFactories<SF, SEF> {
	pub storage_factories: HashMap<String, SF>,
	pub settlement_factories: HashMap<String, SEF>,
}

/// Builder for constructing a FulfillmentEngine with pluggable implementations.
pub struct EngineBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
	feedback_sink: Arc<dyn FeedbackSink>,
	orders: Vec<OrderRecord>,
}

impl EngineBuilder {
	/// Creates a new EngineBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
			feedback_sink: Arc::new(TracingFeedbackSink),
			orders: Vec::new(),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn with_feedback_sink(mut self, sink: Arc<dyn FeedbackSink>) -> Self {
		self.feedback_sink = sink;
		self
	}

	/// Orders stored in the repository before the engine is returned.
	pub fn with_orders(mut self, orders: Vec<OrderRecord>) -> Self {
		self.orders = orders;
		self
	}

	/// Builds the engine using the primary storage and settlement backends.
	pub async fn build<SF, SEF>(
		self,
		factories: EngineFactories<SF, SEF>,
	) -> Result<FulfillmentEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		SEF: Fn(&toml::Value) -> Result<Box<dyn SettlementInterface>, SettlementError>,
	{
		let storage_backend = create_primary(
			"storage",
			&self.config.storage.primary,
			&self.config.storage.implementations,
			&factories.storage_factories,
		)?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let settlement_backend = create_primary(
			"settlement",
			&self.config.settlement.primary,
			&self.config.settlement.implementations,
			&factories.settlement_factories,
		)?;
		let settlement = Arc::new(SettlementService::new(settlement_backend));

		let repository = StorageOrderRepository::new(storage.clone());
		let seeded = repository
			.seed(&self.orders)
			.await
			.map_err(|e| BuilderError::Seed(e.to_string()))?;
		tracing::info!(component = "orders", count = seeded, "Loaded");

		let repository: Arc<dyn OrderRepository> = Arc::new(repository);
		let ledger = Arc::new(PayoutLedger::new(
			storage.clone(),
			WithdrawalPolicy::new(self.config.payout.min_withdrawal),
			self.config.payout.opening_balance,
		));

		Ok(FulfillmentEngine::new(
			self.config,
			storage,
			repository,
			settlement,
			ledger,
			self.feedback_sink,
			self.clock,
			EventBus::default(),
		))
	}
}

/// Instantiates every configured implementation that has a factory and
/// returns the primary one.
fn create_primary<T: ?Sized, E: std::fmt::Display, F>(
	component: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<Box<T>, BuilderError>
where
	F: Fn(&toml::Value) -> Result<Box<T>, E>,
{
	let mut loaded = HashMap::new();
	for (name, config) in implementations {
		let Some(factory) = factories.get(name) else {
			tracing::warn!(component, implementation = %name, "No factory registered");
			continue;
		};
		match factory(config) {
			Ok(implementation) => {
				let is_primary = primary == name;
				tracing::info!(component, implementation = %name, enabled = %is_primary, "Loaded");
				loaded.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	if loaded.is_empty() {
		return Err(BuilderError::Config(format!(
			"No valid {} implementations available",
			component
		)));
	}

	loaded.remove(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} '{}' failed to load or has invalid configuration",
			component, primary
		))
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::orders::demo_orders;

	const CONFIG: &str = r#"
[partner]
id = "partner-042"

[storage]
primary = "memory"
[storage.implementations.memory]

[settlement]
primary = "breakdown"
[settlement.implementations.breakdown]
currency = "INR"
"#;

	fn factories() -> EngineFactories<courier_storage::StorageFactory, courier_settlement::SettlementFactory>
	{
		EngineFactories {
			storage_factories: courier_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			settlement_factories: courier_settlement::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_build_seeds_orders() {
		let config: Config = CONFIG.parse().unwrap();
		let engine = EngineBuilder::new(config)
			.with_orders(demo_orders())
			.build(factories())
			.await
			.unwrap();

		assert_eq!(engine.list_orders().await.unwrap().len(), 4);
		assert_eq!(engine.balance().await.unwrap(), rust_decimal::Decimal::ZERO);
	}

	#[tokio::test]
	async fn test_missing_factory_for_primary() {
		let config: Config = CONFIG.parse().unwrap();
		let mut factories = factories();
		factories.settlement_factories.clear();

		let result = EngineBuilder::new(config).build(factories).await;
		assert!(matches!(
			result,
			Err(BuilderError::Config(msg)) if msg.contains("No valid settlement")
		));
	}

	#[tokio::test]
	async fn test_invalid_backend_config() {
		let config: Config = CONFIG.replace("currency = \"INR\"", "currency = \"\"").parse().unwrap();
		let result = EngineBuilder::new(config).build(factories()).await;
		assert!(matches!(
			result,
			Err(BuilderError::Config(msg)) if msg.contains("'breakdown'")
		));
	}
}
