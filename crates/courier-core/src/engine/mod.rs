//! Fulfillment engine that drives orders from pickup to payout.
//!
//! The engine wires the order repository, the session store, the settlement
//! service and the payout ledger together. Stage changes are applied
//! synchronously; earnings finalization runs as a separate task started on
//! delivery, and withdrawals are processed the same way.

pub mod event_bus;

use crate::clock::Clock;
use crate::feedback::FeedbackSink;
use crate::finalization::{FinalizationHandle, FinalizationOutcome};
use crate::orders::{OrderRepository, RepositoryError};
use crate::payouts::{LedgerError, PayoutLedger};
use crate::state::{FulfillmentError, FulfillmentState, FulfillmentStateError, FulfillmentStateMachine};
use crate::withdrawal::{WithdrawalHandle, WithdrawalOutcome};
use courier_config::Config;
use courier_settlement::{SettlementService, WithdrawalError};
use courier_storage::StorageService;
use courier_types::{
	Feedback, FulfillmentAction, FulfillmentEvent, OrderRecord, Payout, PhotoRef, Withdrawal,
	WithdrawalStatus,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tracing::instrument;
use uuid::Uuid;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	/// The operation is not allowed in the session's current state.
	#[error(transparent)]
	Rejected(#[from] FulfillmentError),
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("No fulfillment session for order {0}")]
	SessionNotFound(String),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Settlement error: {0}")]
	Settlement(String),
	#[error("No earnings finalization pending for order {0}")]
	NoPendingFinalization(String),
	#[error("Earnings finalization for order {0} was cancelled")]
	FinalizationCancelled(String),
	/// The amount is outside the withdrawal limits.
	#[error(transparent)]
	Withdrawal(#[from] WithdrawalError),
	#[error("Unknown bank account: {0}")]
	UnknownAccount(String),
	#[error("Withdrawal not found: {0}")]
	WithdrawalNotFound(Uuid),
	#[error("Withdrawal {0} was cancelled")]
	WithdrawalCancelled(Uuid),
}

impl From<FulfillmentStateError> for EngineError {
	fn from(err: FulfillmentStateError) -> Self {
		match err {
			FulfillmentStateError::Rejected(e) => EngineError::Rejected(e),
			FulfillmentStateError::SessionNotFound(id) => EngineError::SessionNotFound(id),
			FulfillmentStateError::Storage(e) => EngineError::Storage(e),
		}
	}
}

impl From<LedgerError> for EngineError {
	fn from(err: LedgerError) -> Self {
		match err {
			LedgerError::Rejected(e) => EngineError::Withdrawal(e),
			LedgerError::WithdrawalNotFound(id) => EngineError::WithdrawalNotFound(id),
			LedgerError::Storage(e) => EngineError::Storage(e),
		}
	}
}

impl From<RepositoryError> for EngineError {
	fn from(err: RepositoryError) -> Self {
		match err {
			RepositoryError::OrderNotFound(id) => EngineError::OrderNotFound(id),
			other => EngineError::Storage(other.to_string()),
		}
	}
}

/// Main engine coordinating order fulfillment.
#[derive(Clone)]
pub struct FulfillmentEngine {
	/// Service configuration.
	config: Config,
	/// Order source.
	orders: Arc<dyn OrderRepository>,
	/// Per-order fulfillment sessions.
	state_machine: Arc<FulfillmentStateMachine>,
	/// Settlement backend used by finalization tasks.
	settlement: Arc<SettlementService>,
	/// Settled payouts and withdrawals.
	ledger: Arc<PayoutLedger>,
	feedback_sink: Arc<dyn FeedbackSink>,
	clock: Arc<dyn Clock>,
	event_bus: event_bus::EventBus,
	/// Wait before earnings are settled after delivery.
	finalizing_delay: Duration,
	/// Wait before an accepted withdrawal is submitted.
	processing_delay: Duration,
	/// One lock per order, held while its session is read and written.
	order_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
	/// Finalization tasks not yet awaited or cancelled, by order id.
	finalizations: Arc<Mutex<HashMap<String, FinalizationHandle>>>,
	/// Withdrawal tasks not yet awaited or cancelled.
	withdrawals: Arc<Mutex<HashMap<Uuid, WithdrawalHandle>>>,
}

impl FulfillmentEngine {
	/// Creates a new engine with the given services.
	///
	/// Finalization and withdrawal delays are taken from `config`.
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		orders: Arc<dyn OrderRepository>,
		settlement: Arc<SettlementService>,
		ledger: Arc<PayoutLedger>,
		feedback_sink: Arc<dyn FeedbackSink>,
		clock: Arc<dyn Clock>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let finalizing_delay = Duration::from_millis(config.settlement.finalizing_delay_ms);
		let processing_delay = Duration::from_millis(config.payout.processing_delay_ms);
		Self {
			config,
			orders,
			state_machine: Arc::new(FulfillmentStateMachine::new(storage)),
			settlement,
			ledger,
			feedback_sink,
			clock,
			event_bus,
			finalizing_delay,
			processing_delay,
			order_locks: Arc::new(Mutex::new(HashMap::new())),
			finalizations: Arc::new(Mutex::new(HashMap::new())),
			withdrawals: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Subscribes to fulfillment events.
	pub fn subscribe(&self) -> broadcast::Receiver<FulfillmentEvent> {
		self.event_bus.subscribe()
	}

	pub async fn list_orders(&self) -> Result<Vec<OrderRecord>, EngineError> {
		Ok(self.orders.list_orders().await?)
	}

	pub async fn order(&self, order_id: &str) -> Result<OrderRecord, EngineError> {
		Ok(self.orders.get_order(order_id).await?)
	}

	/// Current session for an order.
	pub async fn session(&self, order_id: &str) -> Result<FulfillmentState, EngineError> {
		Ok(self.state_machine.get(order_id).await?)
	}

	/// Opens a fulfillment session for an order.
	///
	/// Opening an order that already has a session returns it unchanged.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn open_order(&self, order_id: &str) -> Result<FulfillmentState, EngineError> {
		let _guard = self.lock_order(order_id).await;
		match self.state_machine.get(order_id).await {
			Ok(existing) => return Ok(existing),
			Err(FulfillmentStateError::SessionNotFound(_)) => {},
			Err(e) => return Err(e.into()),
		}

		let order = self.orders.get_order(order_id).await?;
		let state = self.state_machine.open(&order).await?;
		tracing::info!(origin = %order.status, stage = %state.stage(), "Opened");

		self.event_bus
			.publish(FulfillmentEvent::Opened {
				order_id: order_id.to_string(),
				stage: state.stage(),
			})
			.ok();
		Ok(state)
	}

	/// Arrives at the restaurant or at the customer.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn advance(&self, order_id: &str) -> Result<FulfillmentState, EngineError> {
		let at = self.clock.now();
		self.apply(order_id, FulfillmentAction::Advance, |state| state.advance(at))
			.await
	}

	/// Confirms the restaurant handoff.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn confirm_pickup(
		&self,
		order_id: &str,
		otp: &str,
		photo_ref: Option<PhotoRef>,
	) -> Result<FulfillmentState, EngineError> {
		let at = self.clock.now();
		let state = self
			.apply(order_id, FulfillmentAction::ConfirmPickup, |state| {
				state.confirm_pickup(otp, photo_ref, at)
			})
			.await?;

		self.event_bus
			.publish(FulfillmentEvent::PickupConfirmed {
				order_id: order_id.to_string(),
			})
			.ok();
		Ok(state)
	}

	/// Confirms the customer handoff and starts earnings finalization.
	///
	/// Returns as soon as the stage change is stored; the payout arrives
	/// later through [`FulfillmentEngine::await_payout`] or the event bus.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn confirm_delivery(
		&self,
		order_id: &str,
		otp: &str,
	) -> Result<FulfillmentState, EngineError> {
		let at = self.clock.now();
		let state = self
			.apply(order_id, FulfillmentAction::ConfirmDelivery, |state| {
				state.confirm_delivery(otp, at)
			})
			.await?;

		self.event_bus
			.publish(FulfillmentEvent::DeliveryConfirmed {
				order_id: order_id.to_string(),
			})
			.ok();

		match self.orders.get_order(order_id).await {
			Ok(order) => {
				let handle = FinalizationHandle::spawn(
					order,
					self.finalizing_delay,
					self.settlement.clone(),
					self.ledger.clone(),
					self.event_bus.clone(),
				);
				tracing::debug!(delay_ms = self.finalizing_delay.as_millis() as u64, "Finalizing earnings");

				let mut pending = self.finalizations.lock().await;
				// Finished tasks already recorded their payout in the ledger
				pending.retain(|_, handle| !handle.is_finished());
				pending.insert(order_id.to_string(), handle);
			},
			Err(e) => {
				tracing::error!(error = %e, "Cannot finalize earnings without the order record");
			},
		}

		Ok(state)
	}

	/// Stores the partner's ratings and forwards them to the feedback sink.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn submit_feedback(
		&self,
		order_id: &str,
		feedback: Feedback,
	) -> Result<FulfillmentState, EngineError> {
		let submitted = feedback.clone();
		let state = self
			.apply(order_id, FulfillmentAction::SubmitFeedback, |state| {
				state.submit_feedback(submitted)
			})
			.await?;

		if let Err(e) = self.feedback_sink.record(order_id, &feedback).await {
			tracing::warn!(error = %e, "Feedback stored but not delivered to sink");
		}

		self.event_bus
			.publish(FulfillmentEvent::FeedbackSubmitted {
				order_id: order_id.to_string(),
				feedback,
			})
			.ok();
		Ok(state)
	}

	/// Closes the feedback step without ratings.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn skip_feedback(&self, order_id: &str) -> Result<FulfillmentState, EngineError> {
		let state = self
			.apply(order_id, FulfillmentAction::SkipFeedback, |state| {
				state.skip_feedback()
			})
			.await?;

		tracing::info!("Feedback skipped");
		self.event_bus
			.publish(FulfillmentEvent::FeedbackSkipped {
				order_id: order_id.to_string(),
			})
			.ok();
		Ok(state)
	}

	/// Waits for the earnings finalization of an order.
	///
	/// Once the task has been collected the payout is read back from the
	/// ledger instead.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn await_payout(&self, order_id: &str) -> Result<Payout, EngineError> {
		let pending = self.finalizations.lock().await.remove(order_id);
		let Some(handle) = pending else {
			return self
				.ledger
				.payout_for(order_id)
				.await?
				.ok_or_else(|| EngineError::NoPendingFinalization(order_id.to_string()));
		};

		match handle.wait().await {
			FinalizationOutcome::Settled(payout) => Ok(payout),
			FinalizationOutcome::Cancelled => {
				Err(EngineError::FinalizationCancelled(order_id.to_string()))
			},
			FinalizationOutcome::Failed(e) => Err(EngineError::Settlement(e)),
		}
	}

	/// Cancels any pending finalization and discards the session.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn close_order(&self, order_id: &str) -> Result<(), EngineError> {
		let _guard = self.lock_order(order_id).await;
		let pending = self.finalizations.lock().await.remove(order_id);
		if let Some(mut handle) = pending {
			handle.cancel();
			handle.wait().await;
		}

		self.state_machine.discard(order_id).await?;
		self.order_locks.lock().await.remove(order_id);
		tracing::info!("Closed");

		self.event_bus
			.publish(FulfillmentEvent::Closed {
				order_id: order_id.to_string(),
			})
			.ok();
		Ok(())
	}

	/// Amount currently available for withdrawal.
	pub async fn balance(&self) -> Result<Decimal, EngineError> {
		Ok(self.ledger.balance().await?)
	}

	/// Checks a withdrawal without holding any funds.
	///
	/// Returns the balance the amount was checked against, for showing the
	/// request back to the partner before it is confirmed.
	pub async fn check_withdrawal(
		&self,
		amount: Decimal,
		account_id: &str,
	) -> Result<Decimal, EngineError> {
		self.known_account(account_id)?;
		Ok(self.ledger.check(amount).await?)
	}

	/// Accepts a withdrawal and starts processing it.
	///
	/// The amount is held against the balance immediately. The request is
	/// submitted once the processing delay has passed.
	#[instrument(skip_all, fields(account = %account_id, amount = %amount))]
	pub async fn request_withdrawal(
		&self,
		amount: Decimal,
		account_id: &str,
	) -> Result<Withdrawal, EngineError> {
		self.known_account(account_id)?;
		let withdrawal = match self.ledger.reserve(amount, account_id, self.clock.now()).await {
			Ok(withdrawal) => withdrawal,
			Err(e) => {
				tracing::warn!(error = %e, "Withdrawal rejected");
				return Err(e.into());
			},
		};
		tracing::info!(withdrawal_id = %withdrawal.id, "Withdrawal requested");

		self.event_bus
			.publish(FulfillmentEvent::WithdrawalRequested {
				withdrawal_id: withdrawal.id,
				amount,
			})
			.ok();

		let handle = WithdrawalHandle::spawn(
			withdrawal.clone(),
			self.processing_delay,
			self.ledger.clone(),
			self.event_bus.clone(),
		);
		let mut pending = self.withdrawals.lock().await;
		pending.retain(|_, handle| !handle.is_finished());
		pending.insert(withdrawal.id, handle);

		Ok(withdrawal)
	}

	/// Waits until a withdrawal has been submitted.
	#[instrument(skip_all, fields(withdrawal_id = %id))]
	pub async fn await_withdrawal(&self, id: Uuid) -> Result<Withdrawal, EngineError> {
		let pending = self.withdrawals.lock().await.remove(&id);
		let Some(handle) = pending else {
			let withdrawal = self.ledger.withdrawal(id).await?;
			return match withdrawal.status {
				WithdrawalStatus::Cancelled => Err(EngineError::WithdrawalCancelled(id)),
				_ => Ok(withdrawal),
			};
		};

		match handle.wait().await {
			WithdrawalOutcome::Submitted(withdrawal) => Ok(withdrawal),
			WithdrawalOutcome::Cancelled(_) => Err(EngineError::WithdrawalCancelled(id)),
			WithdrawalOutcome::Failed(e) => Err(EngineError::Storage(e)),
		}
	}

	/// Cancels a withdrawal that is still processing.
	///
	/// Returns the final record: `Cancelled`, or `Submitted` if processing
	/// had already finished.
	#[instrument(skip_all, fields(withdrawal_id = %id))]
	pub async fn cancel_withdrawal(&self, id: Uuid) -> Result<Withdrawal, EngineError> {
		let pending = self.withdrawals.lock().await.remove(&id);
		let Some(mut handle) = pending else {
			return Ok(self.ledger.withdrawal(id).await?);
		};

		handle.cancel();
		match handle.wait().await {
			WithdrawalOutcome::Submitted(withdrawal) | WithdrawalOutcome::Cancelled(withdrawal) => {
				Ok(withdrawal)
			},
			WithdrawalOutcome::Failed(e) => Err(EngineError::Storage(e)),
		}
	}

	fn known_account(&self, account_id: &str) -> Result<(), EngineError> {
		if self
			.config
			.payout
			.accounts
			.iter()
			.any(|account| account.id == account_id)
		{
			Ok(())
		} else {
			Err(EngineError::UnknownAccount(account_id.to_string()))
		}
	}

	async fn lock_order(&self, order_id: &str) -> OwnedMutexGuard<()> {
		let lock = {
			let mut locks = self.order_locks.lock().await;
			Arc::clone(
				locks
					.entry(order_id.to_string())
					.or_insert_with(|| Arc::new(Mutex::new(()))),
			)
		};
		lock.lock_owned().await
	}

	/// Applies a transition, logging the outcome and publishing stage changes.
	async fn apply<F>(
		&self,
		order_id: &str,
		action: FulfillmentAction,
		transition: F,
	) -> Result<FulfillmentState, EngineError>
	where
		F: FnOnce(&FulfillmentState) -> Result<FulfillmentState, FulfillmentError>,
	{
		let _guard = self.lock_order(order_id).await;
		let mut from = None;
		let result = self
			.state_machine
			.update_with(order_id, |current| {
				from = Some(current.stage());
				transition(current)
			})
			.await;

		let state = match result {
			Ok(state) => state,
			Err(e) => {
				tracing::warn!(action = %action, error = %e, "Rejected");
				return Err(e.into());
			},
		};

		let to = state.stage();
		if let (Some(from), Some(at)) = (from, state.stage_timestamps().get(to)) {
			if from != to {
				tracing::info!(from = %from, to = %to, "Stage changed");
				self.event_bus
					.publish(FulfillmentEvent::StageChanged {
						order_id: order_id.to_string(),
						from,
						to,
						at,
					})
					.ok();
			}
		}

		Ok(state)
	}
}
