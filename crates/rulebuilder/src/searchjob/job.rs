// Search jobs and their externally visible state

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a search job. Every state except `Running` is final.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
	Running,
	Done(Value),
	Failed(String),
	Cancelled,
}

impl JobStatus {
	pub fn is_finished(&self) -> bool {
		!matches!(self, JobStatus::Running)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::Running => "running",
			JobStatus::Done(_) => "done",
			JobStatus::Failed(_) => "failed",
			JobStatus::Cancelled => "cancelled",
		}
	}
}

/// The user a job is requested on behalf of
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchUser {
	pub username: String,
	#[serde(default)]
	pub is_admin: bool,
}

impl SearchUser {
	pub fn new(username: impl Into<String>) -> Self {
		Self {
			username: username.into(),
			is_admin: false,
		}
	}

	pub fn admin(username: impl Into<String>) -> Self {
		Self {
			username: username.into(),
			is_admin: true,
		}
	}

	pub fn can_access_job(&self, owner: &str) -> bool {
		self.is_admin || self.username == owner
	}
}

/// A search running (or finished) on this node
#[derive(Debug)]
pub struct SearchJob {
	id: String,
	search: Value,
	owner: String,
	executing_node: String,
	cancel_after_seconds: Option<u32>,
	created_at: DateTime<Utc>,
	cancellation: CancellationToken,
	status: watch::Sender<JobStatus>,
}

impl SearchJob {
	pub fn new(
		id: impl Into<String>,
		search: Value,
		owner: impl Into<String>,
		executing_node: impl Into<String>,
		cancel_after_seconds: Option<u32>,
	) -> Self {
		let (status, _) = watch::channel(JobStatus::Running);
		Self {
			id: id.into(),
			search,
			owner: owner.into(),
			executing_node: executing_node.into(),
			cancel_after_seconds,
			created_at: Utc::now(),
			cancellation: CancellationToken::new(),
			status,
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn search(&self) -> &Value {
		&self.search
	}

	pub fn owner(&self) -> &str {
		&self.owner
	}

	pub fn executing_node(&self) -> &str {
		&self.executing_node
	}

	pub fn cancel_after_seconds(&self) -> Option<u32> {
		self.cancel_after_seconds
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	/// Token the executor checks to stop work early
	pub fn cancellation_token(&self) -> CancellationToken {
		self.cancellation.clone()
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancellation.is_cancelled()
	}

	pub fn status(&self) -> JobStatus {
		self.status.borrow().clone()
	}

	pub fn complete(&self, result: Value) -> bool {
		self.finish(JobStatus::Done(result))
	}

	pub fn fail(&self, error: impl Into<String>) -> bool {
		self.finish(JobStatus::Failed(error.into()))
	}

	/// Cancel the job. Returns false if it had already finished.
	pub fn cancel(&self) -> bool {
		let cancelled = self.finish(JobStatus::Cancelled);
		self.cancellation.cancel();
		cancelled
	}

	/// Wait up to `timeout` for the job to finish and return whatever state
	/// it is in afterwards
	pub async fn wait_for_result(&self, timeout: Duration) -> JobStatus {
		let mut rx = self.status.subscribe();
		let finished = async move {
			while !rx.borrow_and_update().is_finished() {
				if rx.changed().await.is_err() {
					break;
				}
			}
		};
		let _ = tokio::time::timeout(timeout, finished).await;
		self.status()
	}

	pub fn view(&self) -> SearchJobView {
		let status = self.status();
		let (result, errors) = match &status {
			JobStatus::Done(result) => (Some(result.clone()), Vec::new()),
			JobStatus::Failed(error) => (None, vec![error.clone()]),
			JobStatus::Running | JobStatus::Cancelled => (None, Vec::new()),
		};
		SearchJobView {
			id: self.id.clone(),
			owner: self.owner.clone(),
			executing_node: self.executing_node.clone(),
			search_id: self
				.search
				.get("id")
				.and_then(Value::as_str)
				.map(str::to_string),
			status: status.as_str().to_string(),
			result,
			errors,
			created_at: self.created_at,
		}
	}

	fn finish(&self, next: JobStatus) -> bool {
		self.status.send_if_modified(|current| {
			if current.is_finished() {
				return false;
			}
			*current = next;
			true
		})
	}
}

/// Serializable view of a job as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchJobView {
	pub id: String,
	pub owner: String,
	pub executing_node: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub search_id: Option<String>,
	pub status: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	pub errors: Vec<String>,
	pub created_at: DateTime<Utc>,
}
