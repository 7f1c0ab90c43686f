//! Delayed earnings finalization.
//!
//! Once an order is delivered its earnings are settled after a short delay.
//! The delay runs in its own task so the stage change that triggered it
//! returns immediately, and the task can be cancelled while it waits.

use crate::engine::event_bus::EventBus;
use crate::payouts::PayoutLedger;
use courier_settlement::SettlementService;
use courier_types::{FulfillmentEvent, OrderRecord, Payout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// How a finalization task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizationOutcome {
	/// Earnings were settled.
	Settled(Payout),
	/// The task was cancelled before settling.
	Cancelled,
	/// Settlement was attempted and failed.
	Failed(String),
}

/// Handle to a pending earnings finalization.
pub struct FinalizationHandle {
	cancel: Option<oneshot::Sender<()>>,
	task: JoinHandle<FinalizationOutcome>,
}

impl FinalizationHandle {
	/// Spawns the finalization task for a delivered order.
	///
	/// After `delay` the order is settled, the payout is recorded in the
	/// ledger and `EarningsFinalized` is published. Cancelling first publishes
	/// `FinalizationCancelled` instead.
	pub fn spawn(
		order: OrderRecord,
		delay: Duration,
		settlement: Arc<SettlementService>,
		ledger: Arc<PayoutLedger>,
		event_bus: EventBus,
	) -> Self {
		let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
		let span = tracing::info_span!("finalize_earnings", order_id = %order.id);

		let task = tokio::spawn(
			async move {
				tokio::select! {
					biased;

					// A dropped handle closes the channel without cancelling
					Ok(()) = &mut cancel_rx => {
						tracing::info!("Earnings finalization cancelled");
						event_bus
							.publish(FulfillmentEvent::FinalizationCancelled {
								order_id: order.id.clone(),
							})
							.ok();
						FinalizationOutcome::Cancelled
					}

					_ = tokio::time::sleep(delay) => {
						match settlement.finalize(&order).await {
							Ok(payout) => match ledger.record_payout(&payout).await {
								Ok(()) => {
									event_bus
										.publish(FulfillmentEvent::EarningsFinalized {
											order_id: order.id.clone(),
											payout: payout.clone(),
										})
										.ok();
									FinalizationOutcome::Settled(payout)
								},
								Err(e) => {
									tracing::error!(error = %e, "Settled payout could not be recorded");
									FinalizationOutcome::Failed(e.to_string())
								},
							},
							Err(e) => FinalizationOutcome::Failed(e.to_string()),
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

	/// True once the task has produced its outcome.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Requests cancellation. Has no effect once settlement has started.
	pub fn cancel(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel.send(()).ok();
		}
	}

	/// Waits for the task to end.
	pub async fn wait(self) -> FinalizationOutcome {
		match self.task.await {
			Ok(outcome) => outcome,
			Err(e) => FinalizationOutcome::Failed(format!("Finalization task failed: {}", e)),
		}
	}
}
