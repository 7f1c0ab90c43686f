//! Records captured while an order is fulfilled.
//!
//! Confirmation records prove a physical handoff happened, feedback captures
//! the partner's ratings after delivery, and a payout is the settled earnings
//! for a completed order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::EarningsBreakdown;

/// Opaque reference to a captured photo (file handle, URL, upload id).
///
/// Only its presence matters to the fulfillment flow; the content is never
/// inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoRef(pub String);

impl PhotoRef {
	pub fn new(reference: impl Into<String>) -> Self {
		Self(reference.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PhotoRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Data captured at the restaurant handoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupConfirmation {
	/// Code given by the restaurant, stored verbatim.
	pub otp: String,
	/// Photo of the packed order.
	pub photo_ref: PhotoRef,
}

/// Data captured at the customer handoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfirmation {
	/// Code given by the customer, stored verbatim.
	pub otp: String,
}

/// Star ratings and comments left by the partner after delivery.
///
/// A rating of `0` means the partner did not rate that party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
	pub restaurant_rating: u8,
	pub restaurant_comment: String,
	pub customer_rating: u8,
	pub customer_comment: String,
}

impl Feedback {
	/// Highest star rating a party can receive.
	pub const MAX_RATING: u8 = 5;
}

/// Settled earnings for a completed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
	/// Unique identifier for this payout.
	pub id: Uuid,
	/// Order the payout belongs to.
	pub order_id: String,
	/// Amount credited to the partner.
	pub amount: Decimal,
	/// ISO currency code.
	pub currency: String,
	/// Breakdown the amount was computed from.
	pub breakdown: EarningsBreakdown,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_photo_ref_is_transparent() {
		let json = serde_json::to_string(&PhotoRef::new("photo-ref-A")).unwrap();
		assert_eq!(json, "\"photo-ref-A\"");
	}
}
