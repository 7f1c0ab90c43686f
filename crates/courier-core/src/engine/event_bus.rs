//! Event bus for fulfillment events.
//!
//! A thin wrapper over a tokio broadcast channel. Every subscriber sees every
//! event published after it subscribed; slow subscribers lag rather than
//! block publishers.

use courier_types::FulfillmentEvent;
use tokio::sync::broadcast;

/// Broadcast bus shared by the engine and its background tasks.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<FulfillmentEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	/// Subscribes to events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<FulfillmentEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Fails only when nobody is subscribed; callers that don't care use `.ok()`.
	pub fn publish(
		&self,
		event: FulfillmentEvent,
	) -> Result<usize, broadcast::error::SendError<FulfillmentEvent>> {
		self.sender.send(event)
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(256)
	}
}
