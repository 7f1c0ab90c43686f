//! State management for order fulfillment.
//!
//! `flow` holds the pure per-order state machine; `session` persists one
//! state per order and applies transitions to it.

pub mod flow;
pub mod session;

pub use flow::{
	ConfirmationField, FeedbackStep, FulfillmentError, FulfillmentState, RatedParty,
	StageTimestamps,
};
pub use session::{FulfillmentStateError, FulfillmentStateMachine};
