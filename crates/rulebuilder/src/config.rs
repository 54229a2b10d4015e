// Process configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fragments::{EmptyFragmentService, FileFragmentService, FragmentService};
use crate::functions::{CatalogBuilder, FunctionCatalog, FunctionDescriptor, FunctionPlugin, register_builtins};
use crate::registry::RegistryError;
use crate::searchjob::{InMemorySearchJobService, SearchJobService, SearchJobSettings};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to parse config {path}: {message}")]
	Parse { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	pub fragments: FragmentsConfig,
	pub search_jobs: SearchJobSettings,
	/// Identifies this node as the executor of search jobs
	pub node_id: String,
	pub logging: LoggingConfig,
	pub plugins: PluginsConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			fragments: FragmentsConfig::default(),
			search_jobs: SearchJobSettings::default(),
			node_id: "local".to_string(),
			logging: LoggingConfig::default(),
			plugins: PluginsConfig::default(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FragmentsConfig {
	/// JSON or YAML fragment file. Without one the registry only offers
	/// catalog functions.
	pub path: Option<PathBuf>,
	pub watch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
	pub level: String,
	pub format: LogFormat,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			format: LogFormat::Text,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
	#[default]
	Text,
	Json,
}

/// Function descriptors contributed by configuration at boot. Every entry is
/// internal, whatever visibility it declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginsConfig {
	pub internal_functions: Vec<FunctionDescriptor>,
}

impl FunctionPlugin for PluginsConfig {
	fn name(&self) -> &str {
		"config"
	}

	fn functions(&self) -> Vec<FunctionDescriptor> {
		self.internal_functions
			.iter()
			.cloned()
			.map(FunctionDescriptor::internal)
			.collect()
	}
}

impl Config {
	/// Load from a YAML or JSON file. A missing file yields the defaults.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = match fs_err::read_to_string(path) {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!(target: "rule_builder", "No config at {}, using defaults", path.display());
				return Ok(Self::default());
			},
			Err(e) => return Err(e.into()),
		};
		Self::parse(path, &content)
	}

	pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
		let is_json = path.extension().is_some_and(|e| e == "json");
		let result = if is_json {
			serde_json::from_str(content).map_err(|e| e.to_string())
		} else {
			serde_yaml::from_str(content).map_err(|e| e.to_string())
		};
		result.map_err(|message| ConfigError::Parse {
			path: path.display().to_string(),
			message,
		})
	}

	/// Built-in functions plus everything contributed by plugins
	pub fn catalog(&self) -> Result<FunctionCatalog, RegistryError> {
		let mut builder = CatalogBuilder::new();
		register_builtins(&mut builder)?;
		builder.extend(&self.plugins);
		builder.build()
	}

	pub fn fragment_service(&self) -> Arc<dyn FragmentService> {
		match &self.fragments.path {
			Some(path) => Arc::new(FileFragmentService::new(path)),
			None => Arc::new(EmptyFragmentService),
		}
	}

	/// Search job cache for this node, sized from `searchJobs`
	pub fn search_job_service(&self) -> Arc<dyn SearchJobService> {
		Arc::new(InMemorySearchJobService::new(
			self.node_id.as_str(),
			&self.search_jobs,
		))
	}
}
