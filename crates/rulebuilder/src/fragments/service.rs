// Fragment store client
//
// Returns the complete current fragment set. The registry always re-reads the
// full set on reload; no deltas are exchanged.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::types::{FragmentFile, RuleFragment};
use crate::functions::Visibility;

/// Errors from reading the fragment set
#[derive(Debug, thiserror::Error)]
pub enum FragmentStoreError {
	#[error("failed to read fragments: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to parse fragments from {path}: {message}")]
	Parse { path: String, message: String },

	#[error("fragment store unavailable: {0}")]
	Unavailable(String),
}

/// Load-all access to fragment definitions
#[async_trait]
pub trait FragmentService: Send + Sync {
	/// Return every fragment definition, in store order
	async fn all(&self) -> Result<Vec<RuleFragment>, FragmentStoreError>;
}

/// Reads fragments from a JSON or YAML file on every call
#[derive(Debug, Clone)]
pub struct FileFragmentService {
	path: PathBuf,
}

impl FileFragmentService {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn is_yaml(&self) -> bool {
		matches!(
			self.path.extension().and_then(|e| e.to_str()),
			Some("yaml" | "yml")
		)
	}

	fn parse(&self, content: &str) -> Result<FragmentFile, FragmentStoreError> {
		let parse_error = |message: String| FragmentStoreError::Parse {
			path: self.path.display().to_string(),
			message,
		};
		if self.is_yaml() {
			serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))
		} else {
			serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))
		}
	}
}

#[async_trait]
impl FragmentService for FileFragmentService {
	async fn all(&self) -> Result<Vec<RuleFragment>, FragmentStoreError> {
		debug!(target: "rule_builder", "Loading fragments from file: {}", self.path.display());
		let content = fs_err::tokio::read_to_string(&self.path).await?;
		let file = self.parse(&content)?;
		for fragment in &file.fragments {
			if fragment.descriptor.visibility == Visibility::Internal {
				warn!(
					target: "rule_builder",
					"Fragment '{}' declares internal visibility, which fragments do not support; it is listed publicly",
					fragment.name()
				);
			}
		}
		info!(
			target: "rule_builder",
			"Loaded {} fragments from {}",
			file.fragments.len(),
			self.path.display()
		);
		Ok(file.fragments)
	}
}

/// Fragment service for deployments without authored fragments
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFragmentService;

#[async_trait]
impl FragmentService for EmptyFragmentService {
	async fn all(&self) -> Result<Vec<RuleFragment>, FragmentStoreError> {
		Ok(Vec::new())
	}
}
