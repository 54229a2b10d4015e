// In-memory search job cache
//
// Jobs live only on the node that runs them. Entries expire after a period
// without access and the cache is bounded; the least recently used job is
// evicted first.

use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::job::{SearchJob, SearchJobView, SearchUser};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchJobError {
	#[error("user {user} cannot load search job {id} that belongs to different user")]
	Forbidden { user: String, id: String },
}

#[async_trait]
pub trait SearchJobService: Send + Sync {
	/// Register a new running job owned by `owner`
	fn create(
		&self,
		search: Value,
		owner: &str,
		cancel_after_seconds: Option<u32>,
	) -> Arc<SearchJob>;

	/// Current view of a job, or None if it is unknown or expired. Waits
	/// briefly for an in-flight result so fast searches need no polling.
	async fn load(&self, id: &str, user: &SearchUser) -> Result<Option<SearchJobView>, SearchJobError>;

	/// Cancel a job. Ok(false) if it is unknown or expired.
	fn cancel(&self, id: &str, user: &SearchUser) -> Result<bool, SearchJobError>;

	fn is_in_cache(&self, id: &str) -> bool;
}

/// Cache sizing and timing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchJobSettings {
	pub max_size: usize,
	pub expire_after_access_secs: u64,
	pub load_wait_millis: u64,
}

impl Default for SearchJobSettings {
	fn default() -> Self {
		Self {
			max_size: 1000,
			expire_after_access_secs: 300,
			load_wait_millis: 5,
		}
	}
}

impl SearchJobSettings {
	pub fn expire_after_access(&self) -> Duration {
		Duration::from_secs(self.expire_after_access_secs)
	}

	pub fn load_wait(&self) -> Duration {
		Duration::from_millis(self.load_wait_millis)
	}
}

struct CacheEntry {
	job: Arc<SearchJob>,
	last_access: Instant,
}

pub struct InMemorySearchJobService {
	cache: Mutex<LruCache<String, CacheEntry>>,
	node_id: String,
	expire_after_access: Duration,
	load_wait: Duration,
}

impl InMemorySearchJobService {
	pub fn new(node_id: impl Into<String>, settings: &SearchJobSettings) -> Self {
		let capacity = NonZeroUsize::new(settings.max_size).unwrap_or(NonZeroUsize::MIN);
		Self {
			cache: Mutex::new(LruCache::new(capacity)),
			node_id: node_id.into(),
			expire_after_access: settings.expire_after_access(),
			load_wait: settings.load_wait(),
		}
	}

	pub fn node_id(&self) -> &str {
		&self.node_id
	}

	/// Number of cached jobs, expired ones that were not yet evicted included
	pub fn len(&self) -> usize {
		self.cache.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.cache.lock().is_empty()
	}

	/// Fetch a live job and refresh its access time. Expired entries are
	/// evicted and reported as absent.
	pub fn get_from_cache(
		&self,
		id: &str,
		user: &SearchUser,
	) -> Result<Option<Arc<SearchJob>>, SearchJobError> {
		let Some(job) = self.touch(id) else {
			return Ok(None);
		};
		if !user.can_access_job(job.owner()) {
			warn!(
				target: "search_jobs",
				"User {} attempted to access search job {} owned by {}",
				user.username,
				id,
				job.owner()
			);
			return Err(SearchJobError::Forbidden {
				user: user.username.clone(),
				id: id.to_string(),
			});
		}
		Ok(Some(job))
	}

	fn touch(&self, id: &str) -> Option<Arc<SearchJob>> {
		let mut cache = self.cache.lock();
		let expired = cache.get_mut(id)?.last_access.elapsed() >= self.expire_after_access;
		if expired {
			cache.pop(id);
			debug!(target: "search_jobs", "Search job {} expired", id);
			return None;
		}
		let entry = cache.get_mut(id)?;
		entry.last_access = Instant::now();
		Some(Arc::clone(&entry.job))
	}

	fn evict_expired(&self, cache: &mut LruCache<String, CacheEntry>) {
		while cache
			.peek_lru()
			.is_some_and(|(_, entry)| entry.last_access.elapsed() >= self.expire_after_access)
		{
			if let Some((id, _)) = cache.pop_lru() {
				debug!(target: "search_jobs", "Search job {} expired", id);
			}
		}
	}

	fn schedule_cancel(job: &Arc<SearchJob>, after: Duration) {
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			warn!(
				target: "search_jobs",
				"No runtime available, search job {} will not be cancelled automatically",
				job.id()
			);
			return;
		};
		let weak: Weak<SearchJob> = Arc::downgrade(job);
		let token = job.cancellation_token();
		runtime.spawn(async move {
			tokio::select! {
				_ = tokio::time::sleep(after) => {
					if let Some(job) = weak.upgrade()
						&& job.cancel()
					{
						info!(
							target: "search_jobs",
							"Search job {} cancelled after {:?}",
							job.id(),
							after
						);
					}
				},
				_ = token.cancelled() => {},
			}
		});
	}
}

#[async_trait]
impl SearchJobService for InMemorySearchJobService {
	fn create(
		&self,
		search: Value,
		owner: &str,
		cancel_after_seconds: Option<u32>,
	) -> Arc<SearchJob> {
		let job = Arc::new(SearchJob::new(
			new_job_id(),
			search,
			owner,
			self.node_id.as_str(),
			cancel_after_seconds,
		));

		{
			let mut cache = self.cache.lock();
			self.evict_expired(&mut cache);
			let entry = CacheEntry {
				job: Arc::clone(&job),
				last_access: Instant::now(),
			};
			if let Some((evicted, _)) = cache.push(job.id().to_string(), entry)
				&& evicted != job.id()
			{
				debug!(target: "search_jobs", "Search job {} evicted, cache is full", evicted);
			}
		}

		if let Some(seconds) = cancel_after_seconds.filter(|s| *s > 0) {
			Self::schedule_cancel(&job, Duration::from_secs(seconds.into()));
		}
		debug!(target: "search_jobs", "Created search job {} for {}", job.id(), owner);
		job
	}

	async fn load(&self, id: &str, user: &SearchUser) -> Result<Option<SearchJobView>, SearchJobError> {
		let Some(job) = self.get_from_cache(id, user)? else {
			return Ok(None);
		};
		job.wait_for_result(self.load_wait).await;
		Ok(Some(job.view()))
	}

	fn cancel(&self, id: &str, user: &SearchUser) -> Result<bool, SearchJobError> {
		let Some(job) = self.get_from_cache(id, user)? else {
			return Ok(false);
		};
		job.cancel();
		Ok(true)
	}

	fn is_in_cache(&self, id: &str) -> bool {
		self.touch(id).is_some()
	}
}

/// 24 hex characters, the same shape as a database object id
fn new_job_id() -> String {
	let uuid = uuid::Uuid::new_v4();
	hex::encode(&uuid.as_bytes()[..12])
}
