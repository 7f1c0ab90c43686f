//! Storage-backed fulfillment sessions.
//!
//! Keeps one [`FulfillmentState`] per order in the `fulfillments` namespace.
//! Every operation loads the session, applies the pure transition and writes
//! the result back only when the transition succeeded.

use super::flow::{FulfillmentError, FulfillmentState};
use chrono::{DateTime, Utc};
use courier_storage::{StorageError, StorageService};
use courier_types::{Feedback, OrderRecord, PhotoRef, StorageKey};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while managing fulfillment sessions.
#[derive(Debug, Error)]
pub enum FulfillmentStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("No fulfillment session for order {0}")]
	SessionNotFound(String),
	#[error(transparent)]
	Rejected(#[from] FulfillmentError),
}

/// Manages fulfillment sessions and their persistence.
pub struct FulfillmentStateMachine {
	storage: Arc<StorageService>,
}

impl FulfillmentStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Opens a session for an order, or returns the existing one unchanged.
	pub async fn open(&self, order: &OrderRecord) -> Result<FulfillmentState, FulfillmentStateError> {
		match self.get(&order.id).await {
			Ok(existing) => return Ok(existing),
			Err(FulfillmentStateError::SessionNotFound(_)) => {},
			Err(e) => return Err(e),
		}

		let state = FulfillmentState::new(order.id.clone(), order.status);
		self.storage
			.store(StorageKey::Fulfillments.as_str(), &order.id, &state)
			.await
			.map_err(|e| FulfillmentStateError::Storage(e.to_string()))?;
		Ok(state)
	}

	/// Gets the session for an order.
	pub async fn get(&self, order_id: &str) -> Result<FulfillmentState, FulfillmentStateError> {
		self.storage
			.retrieve(StorageKey::Fulfillments.as_str(), order_id)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => FulfillmentStateError::SessionNotFound(order_id.to_string()),
				other => FulfillmentStateError::Storage(other.to_string()),
			})
	}

	/// Applies a transition to a stored session and persists the result.
	///
	/// A rejected transition leaves the stored session untouched.
	pub async fn update_with<F>(
		&self,
		order_id: &str,
		transition: F,
	) -> Result<FulfillmentState, FulfillmentStateError>
	where
		F: FnOnce(&FulfillmentState) -> Result<FulfillmentState, FulfillmentError>,
	{
		let current = self.get(order_id).await?;
		let next = transition(&current)?;

		self.storage
			.update(StorageKey::Fulfillments.as_str(), order_id, &next)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => FulfillmentStateError::SessionNotFound(order_id.to_string()),
				other => FulfillmentStateError::Storage(other.to_string()),
			})?;

		Ok(next)
	}

	pub async fn advance(
		&self,
		order_id: &str,
		at: DateTime<Utc>,
	) -> Result<FulfillmentState, FulfillmentStateError> {
		self.update_with(order_id, |state| state.advance(at)).await
	}

	pub async fn confirm_pickup(
		&self,
		order_id: &str,
		otp: &str,
		photo_ref: Option<PhotoRef>,
		at: DateTime<Utc>,
	) -> Result<FulfillmentState, FulfillmentStateError> {
		self.update_with(order_id, |state| state.confirm_pickup(otp, photo_ref, at))
			.await
	}

	pub async fn confirm_delivery(
		&self,
		order_id: &str,
		otp: &str,
		at: DateTime<Utc>,
	) -> Result<FulfillmentState, FulfillmentStateError> {
		self.update_with(order_id, |state| state.confirm_delivery(otp, at))
			.await
	}

	pub async fn submit_feedback(
		&self,
		order_id: &str,
		feedback: Feedback,
	) -> Result<FulfillmentState, FulfillmentStateError> {
		self.update_with(order_id, |state| state.submit_feedback(feedback))
			.await
	}

	pub async fn skip_feedback(
		&self,
		order_id: &str,
	) -> Result<FulfillmentState, FulfillmentStateError> {
		self.update_with(order_id, |state| state.skip_feedback()).await
	}

	/// Removes the session for an order. Missing sessions are not an error.
	pub async fn discard(&self, order_id: &str) -> Result<(), FulfillmentStateError> {
		self.storage
			.remove(StorageKey::Fulfillments.as_str(), order_id)
			.await
			.map_err(|e| FulfillmentStateError::Storage(e.to_string()))
	}

	/// Every stored session, ordered by order id.
	pub async fn list(&self) -> Result<Vec<FulfillmentState>, FulfillmentStateError> {
		self.storage
			.list(StorageKey::Fulfillments.as_str())
			.await
			.map_err(|e| FulfillmentStateError::Storage(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::orders::demo_orders;
	use chrono::TimeZone;
	use courier_storage::implementations::memory::MemoryStorage;
	use courier_types::{FulfillmentAction, OrderStage, OriginStatus};

	fn t(minute: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
	}

	fn machine() -> FulfillmentStateMachine {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		FulfillmentStateMachine::new(storage)
	}

	fn order(status: OriginStatus) -> OrderRecord {
		demo_orders()
			.into_iter()
			.find(|order| order.status == status)
			.unwrap()
	}

	#[tokio::test]
	async fn test_open_is_idempotent() {
		let machine = machine();
		let order = order(OriginStatus::InProgress);

		machine.open(&order).await.unwrap();
		machine.advance(&order.id, t(1)).await.unwrap();

		let reopened = machine.open(&order).await.unwrap();
		assert_eq!(reopened.stage(), OrderStage::AtRestaurant);
	}

	#[tokio::test]
	async fn test_rejected_transition_is_not_persisted() {
		let machine = machine();
		let order = order(OriginStatus::InProgress);
		let opened = machine.open(&order).await.unwrap();

		let result = machine.confirm_delivery(&order.id, "654321", t(1)).await;
		assert!(matches!(
			result,
			Err(FulfillmentStateError::Rejected(
				FulfillmentError::InvalidTransition {
					stage: OrderStage::Pickup,
					action: FulfillmentAction::ConfirmDelivery,
				}
			))
		));
		assert_eq!(machine.get(&order.id).await.unwrap(), opened);
	}

	#[tokio::test]
	async fn test_full_flow_is_persisted() {
		let machine = machine();
		let order = order(OriginStatus::InProgress);
		machine.open(&order).await.unwrap();

		machine.advance(&order.id, t(1)).await.unwrap();
		machine
			.confirm_pickup(&order.id, "123456", Some(PhotoRef::new("photo-ref-A")), t(2))
			.await
			.unwrap();
		machine.advance(&order.id, t(3)).await.unwrap();
		machine
			.confirm_delivery(&order.id, "654321", t(4))
			.await
			.unwrap();
		machine.skip_feedback(&order.id).await.unwrap();

		let stored = machine.get(&order.id).await.unwrap();
		assert_eq!(stored.stage(), OrderStage::Complete);
		assert_eq!(stored.stage_timestamps().recorded().len(), 4);
		assert!(stored.is_closed());
	}

	#[tokio::test]
	async fn test_unknown_session() {
		let machine = machine();
		let result = machine.advance("ORD-404", t(1)).await;
		assert!(matches!(
			result,
			Err(FulfillmentStateError::SessionNotFound(id)) if id == "ORD-404"
		));
	}

	#[tokio::test]
	async fn test_discard_and_list() {
		let machine = machine();
		for order in demo_orders() {
			machine.open(&order).await.unwrap();
		}
		assert_eq!(machine.list().await.unwrap().len(), 4);

		machine.discard("ORD-001").await.unwrap();
		machine.discard("ORD-001").await.unwrap();

		let ids: Vec<_> = machine
			.list()
			.await
			.unwrap()
			.iter()
			.map(|state| state.order_id().to_string())
			.collect();
		assert_eq!(ids, vec!["ORD-002", "ORD-003", "ORD-004"]);
	}

	#[tokio::test]
	async fn test_cancelled_order_session() {
		let machine = machine();
		let order = order(OriginStatus::Cancelled);
		let state = machine.open(&order).await.unwrap();
		assert_eq!(state.stage(), OrderStage::Cancelled);

		assert!(machine.advance(&order.id, t(1)).await.is_err());
		assert_eq!(machine.get(&order.id).await.unwrap(), state);
	}
}
