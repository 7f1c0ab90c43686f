//! Delayed processing of withdrawal requests.
//!
//! An accepted withdrawal holds its amount right away and is handed to the
//! bank once the processing delay has passed. It can be cancelled until then.

use crate::engine::event_bus::EventBus;
use crate::payouts::PayoutLedger;
use courier_types::{FulfillmentEvent, Withdrawal, WithdrawalStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// How a withdrawal task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawalOutcome {
	Submitted(Withdrawal),
	/// Cancelled while processing. The held amount is released.
	Cancelled(Withdrawal),
	/// The ledger could not be updated.
	Failed(String),
}

/// Handle to a withdrawal that is still processing.
pub struct WithdrawalHandle {
	cancel: Option<oneshot::Sender<()>>,
	task: JoinHandle<WithdrawalOutcome>,
}

impl WithdrawalHandle {
	/// Spawns the processing task for a reserved withdrawal.
	pub fn spawn(
		withdrawal: Withdrawal,
		delay: Duration,
		ledger: Arc<PayoutLedger>,
		event_bus: EventBus,
	) -> Self {
		let id = withdrawal.id;
		let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
		let span = tracing::info_span!("process_withdrawal", withdrawal_id = %id);

		let task = tokio::spawn(
			async move {
				tokio::select! {
					biased;

					Ok(()) = &mut cancel_rx => {
						match ledger.set_status(id, WithdrawalStatus::Cancelled).await {
							Ok(cancelled) => {
								tracing::info!(amount = %cancelled.amount, "Withdrawal cancelled");
								event_bus
									.publish(FulfillmentEvent::WithdrawalCancelled { withdrawal_id: id })
									.ok();
								WithdrawalOutcome::Cancelled(cancelled)
							},
							Err(e) => WithdrawalOutcome::Failed(e.to_string()),
						}
					}

					_ = tokio::time::sleep(delay) => {
						match ledger.set_status(id, WithdrawalStatus::Submitted).await {
							Ok(submitted) => {
								tracing::info!(
									amount = %submitted.amount,
									account = %submitted.account_id,
									"Withdrawal submitted"
								);
								event_bus
									.publish(FulfillmentEvent::WithdrawalSubmitted {
										withdrawal: submitted.clone(),
									})
									.ok();
								WithdrawalOutcome::Submitted(submitted)
							},
							Err(e) => {
								tracing::warn!(error = %e, "Withdrawal could not be submitted");
								WithdrawalOutcome::Failed(e.to_string())
							},
						}
					}
				}
			}
			.instrument(span),
		);

		Self {
			cancel: Some(cancel_tx),
			task,
		}
	}

	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Requests cancellation. Has no effect once the delay has passed.
	pub fn cancel(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel.send(()).ok();
		}
	}

	pub async fn wait(self) -> WithdrawalOutcome {
		match self.task.await {
			Ok(outcome) => outcome,
			Err(e) => WithdrawalOutcome::Failed(format!("Withdrawal task failed: {}", e)),
		}
	}
}
