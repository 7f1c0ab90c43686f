//! Order fulfillment flow.
//!
//! A pure state machine for one order: every operation takes the current
//! state by reference and returns either a new state or an error, so a
//! rejected call can never leave a half-applied update behind.
//!
//! ```text
//! Pickup --advance--> AtRestaurant --confirm_pickup--> PickedUp
//!   --advance--> AtCustomer --confirm_delivery--> Complete
//!   --submit_feedback | skip_feedback--> Complete (closed)
//! Cancelled: absorbing, initial only
//! ```

use chrono::{DateTime, Utc};
use courier_types::{
	DeliveryConfirmation, Feedback, FulfillmentAction, OrderStage, OriginStatus, PhotoRef,
	PickupConfirmation,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Confirmation input that was required but not supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationField {
	PickupOtp,
	PickupPhoto,
	DeliveryOtp,
}

impl fmt::Display for ConfirmationField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfirmationField::PickupOtp => write!(f, "restaurant OTP"),
			ConfirmationField::PickupPhoto => write!(f, "photo of packed order"),
			ConfirmationField::DeliveryOtp => write!(f, "customer OTP"),
		}
	}
}

/// Party a rating applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatedParty {
	Restaurant,
	Customer,
}

impl fmt::Display for RatedParty {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RatedParty::Restaurant => write!(f, "restaurant"),
			RatedParty::Customer => write!(f, "customer"),
		}
	}
}

/// Rejections returned by fulfillment operations.
///
/// All of these are usage errors by the caller; none is transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
	#[error("Cannot {action} while order is {stage}")]
	InvalidTransition {
		stage: OrderStage,
		action: FulfillmentAction,
	},
	#[error("Missing confirmation data: {0}")]
	MissingConfirmationData(ConfirmationField),
	#[error("Invalid {party} rating {value}, expected 0 to {max}", max = Feedback::MAX_RATING)]
	InvalidRating { party: RatedParty, value: u8 },
	#[error("Feedback step already closed for this order")]
	DuplicateFeedback,
	#[error("Timestamp for {0} already recorded")]
	TimestampAlreadyRecorded(OrderStage),
}

/// (stage, action) -> stage entered on success.
static TRANSITIONS: Lazy<HashMap<(OrderStage, FulfillmentAction), OrderStage>> = Lazy::new(|| {
	use FulfillmentAction::*;
	use OrderStage::*;

	HashMap::from([
		((Pickup, Advance), AtRestaurant),
		((AtRestaurant, ConfirmPickup), PickedUp),
		((PickedUp, Advance), AtCustomer),
		((AtCustomer, ConfirmDelivery), Complete),
		((Complete, SubmitFeedback), Complete),
		((Complete, SkipFeedback), Complete),
		// Cancelled has no entries: absorbing
	])
});

fn target_stage(
	stage: OrderStage,
	action: FulfillmentAction,
) -> Result<OrderStage, FulfillmentError> {
	TRANSITIONS
		.get(&(stage, action))
		.copied()
		.ok_or(FulfillmentError::InvalidTransition { stage, action })
}

/// Write-once transition times for the timed stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimestamps {
	at_restaurant: Option<DateTime<Utc>>,
	picked_up: Option<DateTime<Utc>>,
	at_customer: Option<DateTime<Utc>>,
	complete: Option<DateTime<Utc>>,
}

impl StageTimestamps {
	/// Time the stage was entered, if recorded.
	pub fn get(&self, stage: OrderStage) -> Option<DateTime<Utc>> {
		match stage {
			OrderStage::AtRestaurant => self.at_restaurant,
			OrderStage::PickedUp => self.picked_up,
			OrderStage::AtCustomer => self.at_customer,
			OrderStage::Complete => self.complete,
			OrderStage::Pickup | OrderStage::Cancelled => None,
		}
	}

	/// Recorded (stage, time) pairs in flow order.
	pub fn recorded(&self) -> Vec<(OrderStage, DateTime<Utc>)> {
		OrderStage::TIMED
			.into_iter()
			.filter_map(|stage| self.get(stage).map(|at| (stage, at)))
			.collect()
	}

	fn record(&mut self, stage: OrderStage, at: DateTime<Utc>) -> Result<(), FulfillmentError> {
		let slot = match stage {
			OrderStage::AtRestaurant => &mut self.at_restaurant,
			OrderStage::PickedUp => &mut self.picked_up,
			OrderStage::AtCustomer => &mut self.at_customer,
			OrderStage::Complete => &mut self.complete,
			// Not timed, nothing to record
			OrderStage::Pickup | OrderStage::Cancelled => return Ok(()),
		};
		if slot.is_some() {
			return Err(FulfillmentError::TimestampAlreadyRecorded(stage));
		}
		*slot = Some(at);
		Ok(())
	}
}

/// Where the post-delivery feedback step stands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackStep {
	/// Not answered yet.
	#[default]
	Pending,
	/// The partner left ratings.
	Submitted(Feedback),
	/// The partner chose not to leave ratings.
	Skipped,
}

/// Fulfillment state of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentState {
	order_id: String,
	stage: OrderStage,
	stage_timestamps: StageTimestamps,
	pickup_confirmation: Option<PickupConfirmation>,
	delivery_confirmation: Option<DeliveryConfirmation>,
	feedback: FeedbackStep,
}

impl FulfillmentState {
	/// Creates the state for an order entering fulfillment.
	///
	/// Cancelled orders start (and stay) `Cancelled`; active orders start at
	/// `Pickup`. Orders delivered in an earlier session open as `Complete`
	/// with the feedback step already closed.
	pub fn new(order_id: impl Into<String>, origin: OriginStatus) -> Self {
		let feedback = match origin {
			OriginStatus::Delivered => FeedbackStep::Skipped,
			OriginStatus::InProgress | OriginStatus::Cancelled => FeedbackStep::Pending,
		};

		Self {
			order_id: order_id.into(),
			stage: origin.initial_stage(),
			stage_timestamps: StageTimestamps::default(),
			pickup_confirmation: None,
			delivery_confirmation: None,
			feedback,
		}
	}

	pub fn order_id(&self) -> &str {
		&self.order_id
	}

	pub fn stage(&self) -> OrderStage {
		self.stage
	}

	pub fn stage_timestamps(&self) -> &StageTimestamps {
		&self.stage_timestamps
	}

	pub fn pickup_confirmation(&self) -> Option<&PickupConfirmation> {
		self.pickup_confirmation.as_ref()
	}

	pub fn delivery_confirmation(&self) -> Option<&DeliveryConfirmation> {
		self.delivery_confirmation.as_ref()
	}

	pub fn feedback_step(&self) -> &FeedbackStep {
		&self.feedback
	}

	/// Submitted feedback, if any.
	pub fn feedback(&self) -> Option<&Feedback> {
		match &self.feedback {
			FeedbackStep::Submitted(feedback) => Some(feedback),
			FeedbackStep::Pending | FeedbackStep::Skipped => None,
		}
	}

	/// True when the order needs nothing more from the partner.
	pub fn is_closed(&self) -> bool {
		match self.stage {
			OrderStage::Cancelled => true,
			OrderStage::Complete => self.feedback != FeedbackStep::Pending,
			_ => false,
		}
	}

	/// The action the partner is expected to take next, if any.
	pub fn next_action(&self) -> Option<FulfillmentAction> {
		match self.stage {
			OrderStage::Pickup | OrderStage::PickedUp => Some(FulfillmentAction::Advance),
			OrderStage::AtRestaurant => Some(FulfillmentAction::ConfirmPickup),
			OrderStage::AtCustomer => Some(FulfillmentAction::ConfirmDelivery),
			OrderStage::Complete if self.feedback == FeedbackStep::Pending => {
				Some(FulfillmentAction::SubmitFeedback)
			},
			OrderStage::Complete | OrderStage::Cancelled => None,
		}
	}

	/// Moves the new state into `to`, stamping the transition time.
	fn entered(&self, to: OrderStage, at: DateTime<Utc>) -> Result<Self, FulfillmentError> {
		let mut next = self.clone();
		next.stage_timestamps.record(to, at)?;
		next.stage = to;
		Ok(next)
	}

	/// Applies the unconditional step from `Pickup` or `PickedUp`.
	pub fn advance(&self, at: DateTime<Utc>) -> Result<Self, FulfillmentError> {
		let to = target_stage(self.stage, FulfillmentAction::Advance)?;
		self.entered(to, at)
	}

	/// Confirms the restaurant handoff.
	///
	/// The OTP must be non-blank and a photo reference must be present; the
	/// values are stored as given.
	pub fn confirm_pickup(
		&self,
		otp: &str,
		photo_ref: Option<PhotoRef>,
		at: DateTime<Utc>,
	) -> Result<Self, FulfillmentError> {
		let to = target_stage(self.stage, FulfillmentAction::ConfirmPickup)?;
		if otp.trim().is_empty() {
			return Err(FulfillmentError::MissingConfirmationData(
				ConfirmationField::PickupOtp,
			));
		}
		let photo_ref = photo_ref.ok_or(FulfillmentError::MissingConfirmationData(
			ConfirmationField::PickupPhoto,
		))?;

		let mut next = self.entered(to, at)?;
		next.pickup_confirmation = Some(PickupConfirmation {
			otp: otp.to_string(),
			photo_ref,
		});
		Ok(next)
	}

	/// Confirms the customer handoff.
	pub fn confirm_delivery(&self, otp: &str, at: DateTime<Utc>) -> Result<Self, FulfillmentError> {
		let to = target_stage(self.stage, FulfillmentAction::ConfirmDelivery)?;
		if otp.trim().is_empty() {
			return Err(FulfillmentError::MissingConfirmationData(
				ConfirmationField::DeliveryOtp,
			));
		}

		let mut next = self.entered(to, at)?;
		next.delivery_confirmation = Some(DeliveryConfirmation {
			otp: otp.to_string(),
		});
		Ok(next)
	}

	fn ensure_feedback_open(&self, action: FulfillmentAction) -> Result<(), FulfillmentError> {
		target_stage(self.stage, action)?;
		if self.feedback != FeedbackStep::Pending {
			return Err(FulfillmentError::DuplicateFeedback);
		}
		Ok(())
	}

	/// Stores the partner's ratings. Never changes the stage.
	///
	/// Ratings run from 1 to 5, with 0 meaning "not rated".
	pub fn submit_feedback(&self, feedback: Feedback) -> Result<Self, FulfillmentError> {
		self.ensure_feedback_open(FulfillmentAction::SubmitFeedback)?;

		for (party, value) in [
			(RatedParty::Restaurant, feedback.restaurant_rating),
			(RatedParty::Customer, feedback.customer_rating),
		] {
			if value > Feedback::MAX_RATING {
				return Err(FulfillmentError::InvalidRating { party, value });
			}
		}

		let mut next = self.clone();
		next.feedback = FeedbackStep::Submitted(feedback);
		Ok(next)
	}

	/// Closes the feedback step without ratings.
	pub fn skip_feedback(&self) -> Result<Self, FulfillmentError> {
		self.ensure_feedback_open(FulfillmentAction::SkipFeedback)?;

		let mut next = self.clone();
		next.feedback = FeedbackStep::Skipped;
		Ok(next)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{Duration, TimeZone};

	fn t(minute: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
	}

	fn photo() -> Option<PhotoRef> {
		Some(PhotoRef::new("photo-ref-A"))
	}

	fn feedback(restaurant: u8, customer: u8) -> Feedback {
		Feedback {
			restaurant_rating: restaurant,
			restaurant_comment: "ok".into(),
			customer_rating: customer,
			customer_comment: String::new(),
		}
	}

	fn fresh() -> FulfillmentState {
		FulfillmentState::new("ORD-001", OriginStatus::InProgress)
	}

	fn at_stage(stage: OrderStage) -> FulfillmentState {
		let mut state = fresh();
		let steps: &[fn(&FulfillmentState) -> Result<FulfillmentState, FulfillmentError>] = &[
			|s| s.advance(t(1)),
			|s| s.confirm_pickup("123456", photo(), t(2)),
			|s| s.advance(t(3)),
			|s| s.confirm_delivery("654321", t(4)),
		];
		for step in steps {
			if state.stage() == stage {
				break;
			}
			state = step(&state).unwrap();
		}
		assert_eq!(state.stage(), stage);
		state
	}

	#[derive(Debug, Clone, Copy)]
	enum Call {
		Advance,
		ConfirmPickup,
		ConfirmDelivery,
	}

	fn apply(state: &FulfillmentState, call: Call) -> Result<FulfillmentState, FulfillmentError> {
		match call {
			Call::Advance => state.advance(t(10)),
			Call::ConfirmPickup => state.confirm_pickup("123456", photo(), t(10)),
			Call::ConfirmDelivery => state.confirm_delivery("654321", t(10)),
		}
	}

	#[test]
	fn test_initial_stage() {
		let state = fresh();
		assert_eq!(state.stage(), OrderStage::Pickup);
		assert_eq!(state.order_id(), "ORD-001");
		assert!(state.stage_timestamps().recorded().is_empty());
		assert_eq!(state.next_action(), Some(FulfillmentAction::Advance));
		assert!(!state.is_closed());

		let cancelled = FulfillmentState::new("ORD-004", OriginStatus::Cancelled);
		assert_eq!(cancelled.stage(), OrderStage::Cancelled);
		assert!(cancelled.is_closed());
		assert_eq!(cancelled.next_action(), None);
	}

	#[test]
	fn test_delivered_order_opens_closed() {
		let state = FulfillmentState::new("ORD-002", OriginStatus::Delivered);
		assert_eq!(state.stage(), OrderStage::Complete);
		assert!(state.is_closed());
		assert_eq!(state.skip_feedback(), Err(FulfillmentError::DuplicateFeedback));
	}

	#[test]
	fn test_canonical_sequence_visits_every_stage() {
		let mut state = fresh();
		let mut visited = vec![state.stage()];
		for call in [
			Call::Advance,
			Call::ConfirmPickup,
			Call::Advance,
			Call::ConfirmDelivery,
		] {
			state = apply(&state, call).unwrap();
			visited.push(state.stage());
		}

		assert_eq!(
			visited,
			vec![
				OrderStage::Pickup,
				OrderStage::AtRestaurant,
				OrderStage::PickedUp,
				OrderStage::AtCustomer,
				OrderStage::Complete,
			]
		);
	}

	#[test]
	fn test_no_other_ordering_completes() {
		let calls = [
			Call::Advance,
			Call::ConfirmPickup,
			Call::Advance,
			Call::ConfirmDelivery,
		];

		let mut successes = 0;
		// Every permutation of the four calls, by index
		for a in 0..4 {
			for b in 0..4 {
				for c in 0..4 {
					for d in 0..4 {
						let order = [a, b, c, d];
						let mut seen = [false; 4];
						if order.iter().any(|&i| std::mem::replace(&mut seen[i], true)) {
							continue;
						}

						let outcome = order
							.iter()
							.try_fold(fresh(), |state, &i| apply(&state, calls[i]));
						if let Ok(state) = outcome {
							assert_eq!(state.stage(), OrderStage::Complete);
							let kinds: Vec<_> =
								order.iter().map(|&i| format!("{:?}", calls[i])).collect();
							assert_eq!(
								kinds,
								vec!["Advance", "ConfirmPickup", "Advance", "ConfirmDelivery"]
							);
							successes += 1;
						}
					}
				}
			}
		}

		// The two Advance calls are interchangeable, so two index orders succeed
		assert_eq!(successes, 2);
	}

	#[test]
	fn test_advance_records_timestamps() {
		let state = fresh().advance(t(1)).unwrap();
		assert_eq!(state.stage(), OrderStage::AtRestaurant);
		assert_eq!(state.stage_timestamps().get(OrderStage::AtRestaurant), Some(t(1)));

		let state = at_stage(OrderStage::PickedUp).advance(t(7)).unwrap();
		assert_eq!(state.stage(), OrderStage::AtCustomer);
		assert_eq!(state.stage_timestamps().get(OrderStage::AtCustomer), Some(t(7)));
	}

	#[test]
	fn test_advance_rejected_where_confirmation_required() {
		for stage in [
			OrderStage::AtRestaurant,
			OrderStage::AtCustomer,
			OrderStage::Complete,
		] {
			let state = at_stage(stage);
			assert_eq!(
				state.advance(t(30)),
				Err(FulfillmentError::InvalidTransition {
					stage,
					action: FulfillmentAction::Advance,
				})
			);
		}
	}

	#[test]
	fn test_confirm_pickup_wrong_stage_leaves_state_unchanged() {
		for stage in [
			OrderStage::Pickup,
			OrderStage::PickedUp,
			OrderStage::AtCustomer,
			OrderStage::Complete,
		] {
			let state = at_stage(stage);
			let before = state.clone();
			let result = state.confirm_pickup("123456", photo(), t(30));
			assert_eq!(
				result,
				Err(FulfillmentError::InvalidTransition {
					stage,
					action: FulfillmentAction::ConfirmPickup,
				})
			);
			assert_eq!(state, before);
		}
	}

	#[test]
	fn test_confirm_pickup_wrong_stage_wins_over_missing_data() {
		let result = fresh().confirm_pickup("", None, t(1));
		assert!(matches!(
			result,
			Err(FulfillmentError::InvalidTransition { .. })
		));
	}

	#[test]
	fn test_confirm_pickup_requires_otp_and_photo() {
		let state = at_stage(OrderStage::AtRestaurant);
		let before = state.clone();

		assert_eq!(
			state.confirm_pickup("", photo(), t(2)),
			Err(FulfillmentError::MissingConfirmationData(
				ConfirmationField::PickupOtp
			))
		);
		assert_eq!(
			state.confirm_pickup("   ", photo(), t(2)),
			Err(FulfillmentError::MissingConfirmationData(
				ConfirmationField::PickupOtp
			))
		);
		assert_eq!(
			state.confirm_pickup("123456", None, t(2)),
			Err(FulfillmentError::MissingConfirmationData(
				ConfirmationField::PickupPhoto
			))
		);
		assert_eq!(state, before);
		assert_eq!(state.stage_timestamps().get(OrderStage::PickedUp), None);
	}

	#[test]
	fn test_confirm_pickup_stores_confirmation() {
		let state = at_stage(OrderStage::AtRestaurant)
			.confirm_pickup("123456", photo(), t(2))
			.unwrap();

		assert_eq!(state.stage(), OrderStage::PickedUp);
		assert_eq!(state.stage_timestamps().get(OrderStage::PickedUp), Some(t(2)));
		assert_eq!(
			state.pickup_confirmation(),
			Some(&PickupConfirmation {
				otp: "123456".into(),
				photo_ref: PhotoRef::new("photo-ref-A"),
			})
		);
	}

	#[test]
	fn test_confirm_delivery_requires_otp() {
		let state = at_stage(OrderStage::AtCustomer);
		let before = state.clone();

		assert_eq!(
			state.confirm_delivery("", t(4)),
			Err(FulfillmentError::MissingConfirmationData(
				ConfirmationField::DeliveryOtp
			))
		);
		assert_eq!(
			state.confirm_delivery(" \t ", t(4)),
			Err(FulfillmentError::MissingConfirmationData(
				ConfirmationField::DeliveryOtp
			))
		);
		assert_eq!(state, before);
		assert_eq!(state.stage_timestamps().get(OrderStage::Complete), None);

		assert_eq!(
			at_stage(OrderStage::PickedUp).confirm_delivery("654321", t(4)),
			Err(FulfillmentError::InvalidTransition {
				stage: OrderStage::PickedUp,
				action: FulfillmentAction::ConfirmDelivery,
			})
		);
	}

	#[test]
	fn test_cancelled_is_absorbing() {
		let state = FulfillmentState::new("ORD-004", OriginStatus::Cancelled);
		let before = state.clone();

		let results = [
			state.advance(t(1)).map(|_| ()),
			state.confirm_pickup("123456", photo(), t(1)).map(|_| ()),
			state.confirm_delivery("654321", t(1)).map(|_| ()),
			state.submit_feedback(feedback(3, 5)).map(|_| ()),
			state.skip_feedback().map(|_| ()),
		];
		for result in results {
			assert!(matches!(
				result,
				Err(FulfillmentError::InvalidTransition {
					stage: OrderStage::Cancelled,
					..
				})
			));
		}
		assert_eq!(state, before);
	}

	#[test]
	fn test_timestamps_written_at_most_once() {
		let mut state = fresh();
		let mut seen: Vec<(OrderStage, DateTime<Utc>)> = Vec::new();
		let base = t(0);

		for (i, call) in [
			Call::Advance,
			Call::ConfirmDelivery,
			Call::ConfirmPickup,
			Call::Advance,
			Call::Advance,
			Call::ConfirmPickup,
			Call::ConfirmDelivery,
			Call::Advance,
		]
		.into_iter()
		.enumerate()
		{
			let at = base + Duration::minutes(i as i64);
			let attempt = match call {
				Call::Advance => state.advance(at),
				Call::ConfirmPickup => state.confirm_pickup("123456", photo(), at),
				Call::ConfirmDelivery => state.confirm_delivery("654321", at),
			};
			if let Ok(next) = attempt {
				state = next;
			}

			let recorded = state.stage_timestamps().recorded();
			// Earlier entries keep their original time
			assert!(recorded.starts_with(&seen));
			seen = recorded;
		}

		assert_eq!(seen.len(), 4);
	}

	#[test]
	fn test_timestamp_slot_rejects_second_write() {
		let mut timestamps = StageTimestamps::default();
		timestamps.record(OrderStage::PickedUp, t(1)).unwrap();
		assert_eq!(
			timestamps.record(OrderStage::PickedUp, t(2)),
			Err(FulfillmentError::TimestampAlreadyRecorded(OrderStage::PickedUp))
		);
		assert_eq!(timestamps.get(OrderStage::PickedUp), Some(t(1)));

		timestamps.record(OrderStage::Pickup, t(3)).unwrap();
		assert_eq!(timestamps.get(OrderStage::Pickup), None);
	}

	#[test]
	fn test_submit_feedback_once() {
		let state = at_stage(OrderStage::Complete);
		assert_eq!(state.next_action(), Some(FulfillmentAction::SubmitFeedback));

		let submitted = state.submit_feedback(feedback(3, 5)).unwrap();
		assert_eq!(submitted.stage(), OrderStage::Complete);
		assert_eq!(
			submitted.feedback(),
			Some(&Feedback {
				restaurant_rating: 3,
				restaurant_comment: "ok".into(),
				customer_rating: 5,
				customer_comment: String::new(),
			})
		);
		assert!(submitted.is_closed());

		assert_eq!(
			submitted.submit_feedback(feedback(1, 1)),
			Err(FulfillmentError::DuplicateFeedback)
		);
		assert_eq!(
			submitted.skip_feedback(),
			Err(FulfillmentError::DuplicateFeedback)
		);
	}

	#[test]
	fn test_unrated_feedback_is_accepted() {
		let state = at_stage(OrderStage::Complete)
			.submit_feedback(feedback(0, 0))
			.unwrap();
		assert_eq!(state.feedback().map(|f| f.restaurant_rating), Some(0));
	}

	#[test]
	fn test_rating_out_of_range() {
		let state = at_stage(OrderStage::Complete);
		assert_eq!(
			state.submit_feedback(feedback(6, 3)),
			Err(FulfillmentError::InvalidRating {
				party: RatedParty::Restaurant,
				value: 6,
			})
		);
		assert_eq!(
			state.submit_feedback(feedback(2, 9)),
			Err(FulfillmentError::InvalidRating {
				party: RatedParty::Customer,
				value: 9,
			})
		);
		assert_eq!(state.feedback_step(), &FeedbackStep::Pending);
	}

	#[test]
	fn test_feedback_before_completion_rejected() {
		let state = at_stage(OrderStage::AtCustomer);
		assert_eq!(
			state.submit_feedback(feedback(3, 5)),
			Err(FulfillmentError::InvalidTransition {
				stage: OrderStage::AtCustomer,
				action: FulfillmentAction::SubmitFeedback,
			})
		);
		assert_eq!(
			state.skip_feedback(),
			Err(FulfillmentError::InvalidTransition {
				stage: OrderStage::AtCustomer,
				action: FulfillmentAction::SkipFeedback,
			})
		);
	}

	#[test]
	fn test_end_to_end_with_skipped_feedback() {
		let state = FulfillmentState::new("ORD-001", OriginStatus::InProgress);
		assert_eq!(state.stage(), OrderStage::Pickup);

		let state = state.advance(t(1)).unwrap();
		assert_eq!(state.stage(), OrderStage::AtRestaurant);
		assert_eq!(state.stage_timestamps().get(OrderStage::AtRestaurant), Some(t(1)));

		let state = state
			.confirm_pickup("123456", Some(PhotoRef::new("photo-ref-A")), t(2))
			.unwrap();
		assert_eq!(state.stage(), OrderStage::PickedUp);
		assert_eq!(state.stage_timestamps().get(OrderStage::PickedUp), Some(t(2)));
		let pickup = state.pickup_confirmation().unwrap();
		assert_eq!(pickup.otp, "123456");
		assert_eq!(pickup.photo_ref.as_str(), "photo-ref-A");

		let state = state.advance(t(3)).unwrap();
		assert_eq!(state.stage(), OrderStage::AtCustomer);

		let state = state.confirm_delivery("654321", t(4)).unwrap();
		assert_eq!(state.stage(), OrderStage::Complete);
		assert_eq!(state.stage_timestamps().get(OrderStage::Complete), Some(t(4)));
		assert_eq!(state.delivery_confirmation().unwrap().otp, "654321");
		assert!(!state.is_closed());

		let state = state.skip_feedback().unwrap();
		assert_eq!(state.stage(), OrderStage::Complete);
		assert_eq!(state.feedback(), None);
		assert_eq!(state.feedback_step(), &FeedbackStep::Skipped);
		assert!(state.is_closed());
		assert_eq!(state.next_action(), None);
	}

	#[test]
	fn test_error_messages() {
		let err = fresh().confirm_delivery("1", t(1)).unwrap_err();
		assert_eq!(err.to_string(), "Cannot confirm delivery while order is Pickup");

		let err = FulfillmentError::InvalidRating {
			party: RatedParty::Customer,
			value: 7,
		};
		assert_eq!(err.to_string(), "Invalid customer rating 7, expected 0 to 5");
	}
}
