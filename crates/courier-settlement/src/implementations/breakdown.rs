//! Settlement from the order's earnings breakdown.
//!
//! The payout is the sum of base pay, distance pay, commission and any
//! bonuses carried by the order. A breakdown whose components disagree with
//! its stated total is rejected instead of guessing which one is right.

use crate::{SettlementError, SettlementFactory, SettlementInterface, SettlementRegistry};
use async_trait::async_trait;
use courier_types::{ImplementationRegistry, OrderRecord, OriginStatus, Payout};
use serde::Deserialize;
use uuid::Uuid;

/// Configuration for [`BreakdownSettlement`].
#[derive(Debug, Clone, Deserialize)]
pub struct BreakdownSettlementConfig {
	/// ISO currency code reported on payouts.
	#[serde(default = "default_currency")]
	pub currency: String,
}

fn default_currency() -> String {
	"INR".to_string()
}

impl Default for BreakdownSettlementConfig {
	fn default() -> Self {
		Self {
			currency: default_currency(),
		}
	}
}

/// Settles an order by summing its earnings breakdown.
pub struct BreakdownSettlement {
	config: BreakdownSettlementConfig,
}

impl BreakdownSettlement {
	pub fn new(config: BreakdownSettlementConfig) -> Self {
		Self { config }
	}
}

#[async_trait]
impl SettlementInterface for BreakdownSettlement {
	async fn settle(&self, order: &OrderRecord) -> Result<Payout, SettlementError> {
		if order.status == OriginStatus::Cancelled {
			return Err(SettlementError::NotSettleable(order.id.clone()));
		}

		let computed = order.earnings.component_sum();
		if computed != order.earnings.total {
			return Err(SettlementError::BreakdownMismatch {
				order_id: order.id.clone(),
				computed,
				stated: order.earnings.total,
			});
		}

		Ok(Payout {
			id: Uuid::new_v4(),
			order_id: order.id.clone(),
			amount: computed,
			currency: self.config.currency.clone(),
			breakdown: order.earnings.clone(),
		})
	}
}

/// Factory function to create the breakdown settlement from configuration.
///
/// Configuration parameters:
/// - `currency` (optional, default "INR")
pub fn create_settlement(
	config: &toml::Value,
) -> Result<Box<dyn SettlementInterface>, SettlementError> {
	let config: BreakdownSettlementConfig = config
		.clone()
		.try_into()
		.map_err(|e| SettlementError::Configuration(format!("Invalid breakdown config: {}", e)))?;

	if config.currency.trim().is_empty() {
		return Err(SettlementError::Configuration(
			"currency cannot be empty".into(),
		));
	}

	Ok(Box::new(BreakdownSettlement::new(config)))
}

/// Registry for the breakdown settlement implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "breakdown";
	type Factory = SettlementFactory;

	fn factory() -> Self::Factory {
		create_settlement
	}
}

impl SettlementRegistry for Registry {}
