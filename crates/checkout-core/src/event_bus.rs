//! Broadcast channel for checkout events.
//!
//! Publishing never blocks and succeeds only while at least one subscriber
//! exists; publishers ignore the result. Slow subscribers lose the oldest
//! events once the channel capacity is exceeded.

use checkout_types::CheckoutEvent;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<CheckoutEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<CheckoutEvent> {
		self.sender.subscribe()
	}

	/// Sends `event` to every current subscriber.
	pub fn publish(
		&self,
		event: CheckoutEvent,
	) -> Result<usize, broadcast::error::SendError<CheckoutEvent>> {
		self.sender.send(event)
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}
