// Fragment change notifications
//
// Events are signals only: the registry always re-reads the full fragment
// set, so a full queue can drop a notification without losing information.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Signals that the fragment set changed in some way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFragmentUpdateEvent {
	reason: Option<String>,
}

impl RuleFragmentUpdateEvent {
	pub fn new() -> Self {
		Self::default()
	}

	/// Attach a free-form reason. Used for logging only.
	pub fn with_reason(reason: impl Into<String>) -> Self {
		Self {
			reason: Some(reason.into()),
		}
	}

	pub fn reason(&self) -> Option<&str> {
		self.reason.as_deref()
	}
}

pub struct FragmentEvents;

impl FragmentEvents {
	/// Create a bounded notification channel
	pub fn channel(capacity: usize) -> (FragmentEventPublisher, FragmentEventSubscriber) {
		let (tx, rx) = mpsc::channel(capacity.max(1));
		(FragmentEventPublisher { tx }, FragmentEventSubscriber { rx })
	}
}

#[derive(Debug, Clone)]
pub struct FragmentEventPublisher {
	tx: mpsc::Sender<RuleFragmentUpdateEvent>,
}

impl FragmentEventPublisher {
	/// Publish without blocking. Returns false once the subscriber is gone.
	pub fn publish(&self, event: RuleFragmentUpdateEvent) -> bool {
		match self.tx.try_send(event) {
			Ok(()) => true,
			Err(TrySendError::Full(event)) => {
				debug!(
					target: "rule_builder",
					reason = event.reason(),
					"reload already pending, coalescing fragment update"
				);
				true
			},
			Err(TrySendError::Closed(_)) => false,
		}
	}

	pub fn notify(&self) -> bool {
		self.publish(RuleFragmentUpdateEvent::new())
	}

	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

#[derive(Debug)]
pub struct FragmentEventSubscriber {
	rx: mpsc::Receiver<RuleFragmentUpdateEvent>,
}

impl FragmentEventSubscriber {
	/// Wait for the next event. None once every publisher is dropped.
	pub async fn recv(&mut self) -> Option<RuleFragmentUpdateEvent> {
		self.rx.recv().await
	}

	/// Discard queued events, returning how many were dropped
	pub fn drain(&mut self) -> usize {
		let mut drained = 0;
		while self.rx.try_recv().is_ok() {
			drained += 1;
		}
		drained
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_publish_coalesces_when_full() {
		let (publisher, mut subscriber) = FragmentEvents::channel(1);
		assert!(publisher.publish(RuleFragmentUpdateEvent::with_reason("first")));
		assert!(publisher.notify());
		assert!(publisher.notify());

		let event = subscriber.recv().await.unwrap();
		assert_eq!(event.reason(), Some("first"));
		assert_eq!(subscriber.drain(), 0);
	}

	#[tokio::test]
	async fn test_drain_and_close() {
		let (publisher, mut subscriber) = FragmentEvents::channel(8);
		for _ in 0..5 {
			publisher.notify();
		}
		assert!(subscriber.recv().await.is_some());
		assert_eq!(subscriber.drain(), 4);

		drop(publisher);
		assert!(subscriber.recv().await.is_none());
	}

	#[test]
	fn test_publish_after_subscriber_dropped() {
		let (publisher, subscriber) = FragmentEvents::channel(1);
		drop(subscriber);
		assert!(publisher.is_closed());
		assert!(!publisher.notify());
	}
}
