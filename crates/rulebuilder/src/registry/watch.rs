// Fragment file watcher

use std::path::{Path, absolute};
use std::time::Duration;

use notify::{EventKind, RecursiveMode};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::error::RegistryError;
use super::events::{FragmentEventPublisher, RuleFragmentUpdateEvent};

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Watch a fragment file and publish an update event whenever it is written.
///
/// The parent directory is watched so editors that replace the file on save
/// are picked up. The task ends when the subscriber goes away.
pub fn spawn_file_watcher(
	path: impl AsRef<Path>,
	publisher: FragmentEventPublisher,
) -> Result<JoinHandle<()>, RegistryError> {
	let abspath = absolute(path.as_ref())
		.map_err(|e| RegistryError::Watch(format!("failed to get absolute path: {}", e)))?;
	let parent = abspath
		.parent()
		.ok_or_else(|| RegistryError::Watch("failed to get parent directory".into()))?
		.to_path_buf();

	let (tx, mut rx) = tokio::sync::mpsc::channel(1);
	let mut watcher = notify_debouncer_full::new_debouncer(DEBOUNCE, None, move |res| {
		futures::executor::block_on(async {
			let _ = tx.send(res).await;
		})
	})
	.map_err(|e| RegistryError::Watch(format!("failed to create file watcher: {}", e)))?;

	watcher
		.watch(&parent, RecursiveMode::NonRecursive)
		.map_err(|e| RegistryError::Watch(format!("failed to watch {}: {}", parent.display(), e)))?;

	info!(target: "rule_builder", "Watching fragment file: {}", abspath.display());

	Ok(tokio::spawn(async move {
		while let Some(result) = rx.recv().await {
			let events = match result {
				Ok(events) => events,
				Err(errors) => {
					for e in errors {
						warn!(target: "rule_builder", "File watcher error: {}", e);
					}
					continue;
				},
			};
			let changed = events.iter().any(|e| {
				matches!(e.kind, EventKind::Modify(_) | EventKind::Create(_))
					&& e.paths.iter().any(|p| p == &abspath)
			});
			if !changed {
				continue;
			}
			info!(target: "rule_builder", "Fragment file changed, requesting reload");
			let event =
				RuleFragmentUpdateEvent::with_reason(format!("{} changed", abspath.display()));
			if !publisher.publish(event) {
				break;
			}
		}
		drop(watcher);
	}))
}
