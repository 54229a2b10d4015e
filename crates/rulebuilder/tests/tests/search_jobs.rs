// Integration tests for the search job cache

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use rulebuilder::searchjob::{
	InMemorySearchJobService, JobStatus, SearchJobError, SearchJobService, SearchJobSettings,
	SearchUser,
};
use serde_json::json;

fn service() -> Arc<dyn SearchJobService> {
	Arc::new(InMemorySearchJobService::new(
		"node-a",
		&SearchJobSettings::default(),
	))
}

/// A job finished by a worker shortly after creation is returned complete
#[tokio::test]
async fn test_job_lifecycle() -> anyhow::Result<()> {
	let service = service();
	let alice = SearchUser::new("alice");
	let job = service.create(json!({"id": "dashboard-search", "query": "source:fw"}), "alice", None);

	let worker = Arc::clone(&job);
	let token = worker.cancellation_token();
	tokio::spawn(async move {
		if !token.is_cancelled() {
			worker.complete(json!({"messages": 42}));
		}
	});

	let view = tokio::time::timeout(Duration::from_secs(5), async {
		loop {
			let view = service.load(job.id(), &alice).await?.expect("job is cached");
			if view.status != "running" {
				return anyhow::Ok(view);
			}
		}
	})
	.await??;

	assert_eq!(view.status, "done");
	assert_eq!(view.result, Some(json!({"messages": 42})));
	assert_eq!(view.search_id.as_deref(), Some("dashboard-search"));
	assert_eq!(view.executing_node, "node-a");

	let serialized = serde_json::to_value(&view)?;
	assert_eq!(serialized["owner"], "alice");
	assert_eq!(serialized["searchId"], "dashboard-search");
	Ok(())
}

/// Another user's job is a permission error, an unknown job is just absent
#[tokio::test]
async fn test_access_control() -> anyhow::Result<()> {
	let service = service();
	let job = service.create(json!({}), "alice", None);
	let mallory = SearchUser::new("mallory");

	assert_matches!(
		service.load(job.id(), &mallory).await,
		Err(SearchJobError::Forbidden { user, id }) if user == "mallory" && id == job.id()
	);
	assert_matches!(service.cancel(job.id(), &mallory), Err(SearchJobError::Forbidden { .. }));
	assert_eq!(job.status(), JobStatus::Running);

	assert!(service.load("ffffffffffffffffffffffff", &mallory).await?.is_none());
	assert!(!service.cancel("ffffffffffffffffffffffff", &mallory)?);

	assert!(service.cancel(job.id(), &SearchUser::admin("admin"))?);
	assert_eq!(job.status(), JobStatus::Cancelled);
	Ok(())
}

/// Jobs with a cancel-after deadline are stopped when they overrun it
#[tokio::test(start_paused = true)]
async fn test_cancel_after_deadline() -> anyhow::Result<()> {
	let service = service();
	let slow = service.create(json!({}), "alice", Some(30));
	let fast = service.create(json!({}), "alice", Some(30));
	fast.complete(json!([]));
	tokio::task::yield_now().await;

	tokio::time::advance(Duration::from_secs(31)).await;
	tokio::time::sleep(Duration::from_millis(1)).await;

	assert!(slow.is_cancelled());
	assert_eq!(slow.status(), JobStatus::Cancelled);
	assert_eq!(fast.status(), JobStatus::Done(json!([])));
	Ok(())
}
