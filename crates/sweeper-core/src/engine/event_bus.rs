//! Broadcast channel for sweep events.

use sweeper_types::SweepEvent;
use tokio::sync::broadcast;

/// Fan-out bus for `SweepEvent`s.
///
/// Publishing never blocks. Slow subscribers lag and miss events rather than
/// holding up a sweep.
///
/// The `run` command subscribes a debug logger; embedders can add their own.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<SweepEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	/// Publishes an event. Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: SweepEvent,
	) -> Result<usize, broadcast::error::SendError<SweepEvent>> {
		self.sender.send(event)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SweepEvent> {
		self.sender.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	#[tokio::test]
	async fn test_publish_reaches_every_subscriber() {
		let bus = EventBus::new(8);
		let mut first = bus.subscribe();
		let mut second = bus.subscribe();

		let now = Utc::now();
		bus.publish(SweepEvent::SweepStarted { now }).unwrap();

		assert!(matches!(first.recv().await.unwrap(), SweepEvent::SweepStarted { .. }));
		assert!(matches!(second.recv().await.unwrap(), SweepEvent::SweepStarted { .. }));
	}

	#[test]
	fn test_publish_without_subscribers_is_an_error() {
		let bus = EventBus::new(1);
		assert!(bus
			.publish(SweepEvent::SweepStarted { now: Utc::now() })
			.is_err());
	}
}
