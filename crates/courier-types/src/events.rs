//! Event types for fulfillment progress.
//!
//! Events are published on the engine's event bus whenever a session changes,
//! so views and collaborators can react without polling the session store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Feedback, OrderStage, Payout, Withdrawal};

/// Events emitted while an order is fulfilled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FulfillmentEvent {
	/// A fulfillment session was opened for an order.
	Opened { order_id: String, stage: OrderStage },
	/// The order moved to a new stage.
	StageChanged {
		order_id: String,
		from: OrderStage,
		to: OrderStage,
		at: DateTime<Utc>,
	},
	/// The restaurant handoff was confirmed.
	PickupConfirmed { order_id: String },
	/// The customer handoff was confirmed.
	DeliveryConfirmed { order_id: String },
	/// The partner left feedback.
	FeedbackSubmitted { order_id: String, feedback: Feedback },
	/// The partner skipped the feedback step.
	FeedbackSkipped { order_id: String },
	/// Earnings for the order were settled.
	EarningsFinalized { order_id: String, payout: Payout },
	/// A pending earnings finalization was cancelled.
	FinalizationCancelled { order_id: String },
	/// The session was discarded.
	Closed { order_id: String },
	/// A withdrawal was accepted and is being processed.
	WithdrawalRequested { withdrawal_id: Uuid, amount: Decimal },
	/// A withdrawal was handed to the bank.
	WithdrawalSubmitted { withdrawal: Withdrawal },
	/// A withdrawal was cancelled while processing.
	WithdrawalCancelled { withdrawal_id: Uuid },
}
