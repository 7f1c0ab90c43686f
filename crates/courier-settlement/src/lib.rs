//! Earnings settlement for completed orders.
//!
//! Once an order reaches `Complete` the engine asks the settlement service
//! for the partner's payout. Real payment processing is out of scope; the
//! implementations here only compute and report the amount, and the
//! withdrawal policy only decides whether a requested amount is allowed.

use async_trait::async_trait;
use courier_types::{ImplementationRegistry, OrderRecord, Payout};
use rust_decimal::Decimal;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod breakdown;
}

pub mod withdrawal;

pub use withdrawal::{WithdrawalError, WithdrawalPolicy};

/// Errors that can occur during settlement.
#[derive(Debug, Error)]
pub enum SettlementError {
	/// The order is in a state that earns nothing.
	#[error("Order {0} cannot be settled")]
	NotSettleable(String),
	/// The earnings components do not add up to the stated total.
	#[error("Earnings breakdown for {order_id} sums to {computed}, expected {stated}")]
	BreakdownMismatch {
		order_id: String,
		computed: Decimal,
		stated: Decimal,
	},
	/// The backend configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Interface every settlement backend implements.
#[async_trait]
pub trait SettlementInterface: Send + Sync {
	/// Computes the payout for a delivered order.
	async fn settle(&self, order: &OrderRecord) -> Result<Payout, SettlementError>;
}

/// Type alias for settlement factory functions.
pub type SettlementFactory =
	fn(&toml::Value) -> Result<Box<dyn SettlementInterface>, SettlementError>;

/// Registry trait for settlement implementations.
pub trait SettlementRegistry: ImplementationRegistry<Factory = SettlementFactory> {}

/// Returns (name, factory) pairs for every settlement backend.
pub fn get_all_implementations() -> Vec<(&'static str, SettlementFactory)> {
	use implementations::breakdown;

	vec![(breakdown::Registry::NAME, breakdown::Registry::factory())]
}

/// Service wrapping the configured settlement backend.
pub struct SettlementService {
	implementation: Box<dyn SettlementInterface>,
}

impl SettlementService {
	pub fn new(implementation: Box<dyn SettlementInterface>) -> Self {
		Self { implementation }
	}

	/// Settles a delivered order and logs the result.
	pub async fn finalize(&self, order: &OrderRecord) -> Result<Payout, SettlementError> {
		match self.implementation.settle(order).await {
			Ok(payout) => {
				tracing::info!(
					order_id = %order.id,
					amount = %payout.amount,
					currency = %payout.currency,
					"Earnings settled"
				);
				Ok(payout)
			},
			Err(e) => {
				tracing::warn!(order_id = %order.id, error = %e, "Settlement failed");
				Err(e)
			},
		}
	}
}
