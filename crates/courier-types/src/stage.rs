//! Fulfillment stage types.
//!
//! Defines the stages an order moves through while a partner fulfils it,
//! the status an order carries when it is handed to the partner, and the
//! actions that drive stage changes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of an order in the fulfillment sequence.
///
/// The five in-flow stages are totally ordered:
/// `Pickup -> AtRestaurant -> PickedUp -> AtCustomer -> Complete`.
/// `Cancelled` sits outside the sequence and is only ever an initial stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderStage {
	/// Heading to the restaurant. Initial stage, never timestamped.
	Pickup,
	/// Arrived at the restaurant, waiting for the handoff.
	AtRestaurant,
	/// Food collected and confirmed with OTP and photo.
	PickedUp,
	/// Arrived at the customer location.
	AtCustomer,
	/// Delivered and confirmed with the customer's OTP.
	Complete,
	/// The order was cancelled before it reached the partner.
	Cancelled,
}

impl OrderStage {
	/// Stages that receive a timestamp when they are entered, in flow order.
	pub const TIMED: [OrderStage; 4] = [
		OrderStage::AtRestaurant,
		OrderStage::PickedUp,
		OrderStage::AtCustomer,
		OrderStage::Complete,
	];

	/// Human readable timeline label.
	pub fn label(&self) -> &'static str {
		match self {
			OrderStage::Pickup => "Heading to Restaurant",
			OrderStage::AtRestaurant => "Arrived at Restaurant",
			OrderStage::PickedUp => "Order Picked Up",
			OrderStage::AtCustomer => "Arrived at Customer Location",
			OrderStage::Complete => "Order Delivered",
			OrderStage::Cancelled => "Order Cancelled",
		}
	}

	fn as_str(&self) -> &'static str {
		match self {
			OrderStage::Pickup => "Pickup",
			OrderStage::AtRestaurant => "AtRestaurant",
			OrderStage::PickedUp => "PickedUp",
			OrderStage::AtCustomer => "AtCustomer",
			OrderStage::Complete => "Complete",
			OrderStage::Cancelled => "Cancelled",
		}
	}
}

impl fmt::Display for OrderStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Status of an order as reported by the order source.
///
/// Only used to pick the initial fulfillment stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OriginStatus {
	/// The order is active and waiting for the partner.
	InProgress,
	/// The order was delivered in an earlier session.
	Delivered,
	/// The order was cancelled upstream.
	Cancelled,
}

impl OriginStatus {
	/// Stage a fresh fulfillment session starts in for this status.
	pub fn initial_stage(&self) -> OrderStage {
		match self {
			OriginStatus::InProgress => OrderStage::Pickup,
			OriginStatus::Delivered => OrderStage::Complete,
			OriginStatus::Cancelled => OrderStage::Cancelled,
		}
	}
}

impl fmt::Display for OriginStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OriginStatus::InProgress => write!(f, "In-progress"),
			OriginStatus::Delivered => write!(f, "Delivered"),
			OriginStatus::Cancelled => write!(f, "Cancelled"),
		}
	}
}

/// Operation a caller attempts on a fulfillment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FulfillmentAction {
	/// Unconditional step (arrive at restaurant, arrive at customer).
	Advance,
	/// Restaurant handoff with OTP and photo.
	ConfirmPickup,
	/// Customer handoff with OTP.
	ConfirmDelivery,
	/// Post-delivery ratings.
	SubmitFeedback,
	/// Close the feedback step without ratings.
	SkipFeedback,
}

impl fmt::Display for FulfillmentAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FulfillmentAction::Advance => write!(f, "advance"),
			FulfillmentAction::ConfirmPickup => write!(f, "confirm pickup"),
			FulfillmentAction::ConfirmDelivery => write!(f, "confirm delivery"),
			FulfillmentAction::SubmitFeedback => write!(f, "submit feedback"),
			FulfillmentAction::SkipFeedback => write!(f, "skip feedback"),
		}
	}
}
