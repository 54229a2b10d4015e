// Rule builder registry with hot-reloadable snapshots

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::RegistryError;
use super::events::{FragmentEventPublisher, FragmentEventSubscriber, FragmentEvents};
use super::snapshot::{BuildingBlocks, RuleBuilderSnapshot};
use super::watch::spawn_file_watcher;
use crate::fragments::FragmentService;
use crate::functions::FunctionCatalog;

const EVENT_QUEUE: usize = 16;

/// Shared handle to a registry
pub type RegistryHandle = Arc<RuleBuilderRegistry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
	/// No snapshot has been published yet
	Initializing,
	Ready,
}

/// Serves the current rule builder snapshot and rebuilds it on demand.
///
/// Readers load the published snapshot without locking. Rebuilds are
/// serialized and replace the snapshot with a single atomic store, so a
/// reader sees either the previous or the next snapshot in full.
pub struct RuleBuilderRegistry {
	catalog: Arc<FunctionCatalog>,
	service: Arc<dyn FragmentService>,
	current: ArcSwap<Option<Arc<RuleBuilderSnapshot>>>,
	/// Held for the whole reload; guards the last published generation
	reload_lock: Mutex<u64>,
}

impl fmt::Debug for RuleBuilderRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RuleBuilderRegistry")
			.field("functions", &self.catalog.len())
			.field("state", &self.state())
			.finish_non_exhaustive()
	}
}

impl RuleBuilderRegistry {
	pub fn new(catalog: Arc<FunctionCatalog>, service: Arc<dyn FragmentService>) -> Self {
		Self {
			catalog,
			service,
			current: ArcSwap::new(Arc::new(None)),
			reload_lock: Mutex::new(0),
		}
	}

	pub fn catalog(&self) -> &FunctionCatalog {
		&self.catalog
	}

	/// Build the first snapshot. Fails if the fragment store cannot be read,
	/// leaving the registry in `Initializing`.
	pub async fn initialize(&self) -> Result<(), RegistryError> {
		if self.state() == RegistryState::Ready {
			return Ok(());
		}
		let generation = self.reload().await?;
		info!(
			target: "rule_builder",
			"Rule builder registry initialized with {} functions (generation {})",
			self.catalog.len(),
			generation
		);
		Ok(())
	}

	pub fn state(&self) -> RegistryState {
		if self.current.load().is_some() {
			RegistryState::Ready
		} else {
			RegistryState::Initializing
		}
	}

	/// The published snapshot. Never blocks.
	pub fn snapshot(&self) -> Result<Arc<RuleBuilderSnapshot>, RegistryError> {
		let guard = self.current.load();
		guard.as_ref().as_ref().map(Arc::clone).ok_or(RegistryError::NotInitialized)
	}

	/// Public conditions of the published snapshot
	pub fn conditions(&self) -> Result<Arc<BuildingBlocks>, RegistryError> {
		Ok(self.snapshot()?.shared_conditions())
	}

	/// Public actions of the published snapshot
	pub fn actions(&self) -> Result<Arc<BuildingBlocks>, RegistryError> {
		Ok(self.snapshot()?.shared_actions())
	}

	/// Re-read all fragments and publish a new snapshot, returning its
	/// generation. On a store failure the published snapshot is kept.
	pub async fn reload(&self) -> Result<u64, RegistryError> {
		let mut generation = self.reload_lock.lock().await;

		let fragments = match self.service.all().await {
			Ok(fragments) => fragments,
			Err(e) => {
				warn!(
					target: "rule_builder",
					"Failed to read rule fragments, keeping generation {}: {}",
					*generation,
					e
				);
				return Err(e.into());
			},
		};

		let next = *generation + 1;
		let snapshot = RuleBuilderSnapshot::build(&self.catalog, &fragments, next);
		let errors = snapshot.fragment_errors().len();
		self.current.store(Arc::new(Some(Arc::new(snapshot))));
		*generation = next;

		if errors > 0 {
			warn!(
				target: "rule_builder",
				"Published rule builder generation {} with {} broken fragment templates",
				next,
				errors
			);
		} else {
			info!(
				target: "rule_builder",
				"Published rule builder generation {} ({} fragments)",
				next,
				fragments.len()
			);
		}
		Ok(next)
	}

	/// Consume update notifications on a dedicated task. Queued notifications
	/// are coalesced into one reload; reload errors are logged only. The task
	/// ends once every publisher is dropped.
	pub fn spawn_reload_listener(
		self: Arc<Self>,
		mut subscriber: FragmentEventSubscriber,
	) -> JoinHandle<()> {
		tokio::spawn(async move {
			debug!(target: "rule_builder", "Starting rule fragment reload listener");
			while let Some(event) = subscriber.recv().await {
				let coalesced = subscriber.drain();
				debug!(
					target: "rule_builder",
					reason = event.reason(),
					coalesced,
					"rule fragments updated"
				);
				// Already logged by reload
				let _ = self.reload().await;
			}
			debug!(target: "rule_builder", "Rule fragment reload listener stopped");
		})
	}

	/// Start the reload listener and, when a fragment file is given, a watcher
	/// feeding it. The returned publisher lets other writers request reloads;
	/// the listener stops once it and the watcher are gone.
	pub fn start_background_tasks(
		self: &Arc<Self>,
		watch_path: Option<&Path>,
	) -> Result<(FragmentEventPublisher, Vec<JoinHandle<()>>), RegistryError> {
		let (publisher, subscriber) = FragmentEvents::channel(EVENT_QUEUE);
		let mut handles = Vec::new();
		if let Some(path) = watch_path {
			handles.push(spawn_file_watcher(path, publisher.clone())?);
		}
		handles.push(Arc::clone(self).spawn_reload_listener(subscriber));
		Ok((publisher, handles))
	}
}
