//! Order records supplied by the order source.
//!
//! These are read-only descriptive records. The fulfillment flow reads the
//! origin status and identifier from them and never mutates them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::OriginStatus;

/// An order as it is handed to the delivery partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
	/// Unique identifier for this order (e.g. "ORD-001").
	pub id: String,
	/// Who receives the order.
	pub customer: Customer,
	/// Delivery address.
	pub destination: String,
	/// Where the order is collected.
	pub restaurant: Restaurant,
	/// Total trip distance in kilometres.
	pub distance_km: Decimal,
	/// Estimated trip duration in minutes.
	pub estimated_time_mins: u32,
	/// Status reported by the order source.
	pub status: OriginStatus,
	/// Items in the order.
	#[serde(default)]
	pub items: Vec<OrderItem>,
	/// What the partner earns for this order.
	pub earnings: EarningsBreakdown,
}

impl OrderRecord {
	/// Total number of items, counting quantities.
	pub fn item_count(&self) -> u32 {
		self.items.iter().map(|item| item.quantity).sum()
	}
}

/// Customer details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
	pub name: String,
	/// Free-text delivery instructions.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<String>,
}

/// Restaurant details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
	pub name: String,
	pub address: String,
	/// Distance from the partner to the restaurant in kilometres.
	pub distance_km: Decimal,
	/// Travel time to the restaurant in minutes.
	pub time_mins: u32,
}

/// A line item in an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
	pub name: String,
	pub quantity: u32,
	pub price: Decimal,
}

/// Breakdown of the partner's earnings for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsBreakdown {
	pub base_pay: Decimal,
	pub distance_pay: Decimal,
	/// Commission on the order value.
	pub commission: Decimal,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub membership_bonus: Option<Decimal>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub petrol_incentive: Option<Decimal>,
	/// Stated total, expected to equal the sum of the components.
	pub total: Decimal,
}

impl EarningsBreakdown {
	/// Sum of every component, ignoring the stated total.
	pub fn component_sum(&self) -> Decimal {
		self.base_pay
			+ self.distance_pay
			+ self.commission
			+ self.membership_bonus.unwrap_or_default()
			+ self.petrol_incentive.unwrap_or_default()
	}
}
