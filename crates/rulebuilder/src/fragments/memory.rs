//! In-memory implementation of FragmentService for testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::service::{FragmentService, FragmentStoreError};
use super::types::RuleFragment;

/// In-memory fragment set.
///
/// Mutations only change what the next `all()` call returns; nothing is
/// pushed to the registry. Callers publish an update event themselves, the
/// same way an authoring interface would after writing to a real store.
#[derive(Default)]
pub struct MemoryFragmentService {
	fragments: Mutex<Vec<RuleFragment>>,
	failures: AtomicUsize,
	reads: AtomicUsize,
}

impl MemoryFragmentService {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_fragments(fragments: Vec<RuleFragment>) -> Self {
		Self {
			fragments: Mutex::new(fragments),
			..Default::default()
		}
	}

	/// Replace the whole fragment set
	pub fn replace(&self, fragments: Vec<RuleFragment>) {
		*self.fragments.lock() = fragments;
	}

	/// Insert a fragment, replacing any existing one with the same name
	pub fn upsert(&self, fragment: RuleFragment) {
		let mut fragments = self.fragments.lock();
		match fragments.iter_mut().find(|f| f.name() == fragment.name()) {
			Some(existing) => *existing = fragment,
			None => fragments.push(fragment),
		}
	}

	/// Remove a fragment by name, returning whether it existed
	pub fn remove(&self, name: &str) -> bool {
		let mut fragments = self.fragments.lock();
		let before = fragments.len();
		fragments.retain(|f| f.name() != name);
		fragments.len() != before
	}

	/// Make the next `count` reads fail with `Unavailable`
	pub fn fail_next(&self, count: usize) {
		self.failures.store(count, Ordering::SeqCst);
	}

	/// Number of `all()` calls served so far, failed ones included
	pub fn reads(&self) -> usize {
		self.reads.load(Ordering::SeqCst)
	}

	pub fn len(&self) -> usize {
		self.fragments.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.fragments.lock().is_empty()
	}
}

#[async_trait]
impl FragmentService for MemoryFragmentService {
	async fn all(&self) -> Result<Vec<RuleFragment>, FragmentStoreError> {
		self.reads.fetch_add(1, Ordering::SeqCst);
		let pending_failure = self
			.failures
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok();
		if pending_failure {
			return Err(FragmentStoreError::Unavailable(
				"injected read failure".to_string(),
			));
		}
		Ok(self.fragments.lock().clone())
	}
}
