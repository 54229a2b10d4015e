// Rule building-block registry
//
// Classifies catalog functions and authored fragments into conditions and
// actions, keeps the sandboxed template set for fragments, and republishes
// everything as one snapshot whenever the fragment set changes.

mod error;
mod events;
mod snapshot;
mod store;
mod watch;

pub use error::{FragmentError, RegistryError};
pub use events::{
	FragmentEventPublisher, FragmentEventSubscriber, FragmentEvents, RuleFragmentUpdateEvent,
};
pub use snapshot::{BuildingBlocks, RuleBuilderSnapshot};
pub use store::{RegistryHandle, RegistryState, RuleBuilderRegistry};
pub use watch::spawn_file_watcher;
