// Registry error types

use serde::Serialize;
use thiserror::Error;

use crate::fragments::FragmentStoreError;
use crate::template::TemplateError;

/// Errors that can occur during registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
	#[error("duplicate function name: '{0}'")]
	DuplicateFunctionName(String),

	#[error("invalid function descriptor '{name}': {message}")]
	InvalidDescriptor { name: String, message: String },

	#[error("fragment store error: {0}")]
	FragmentStore(#[from] FragmentStoreError),

	#[error("rule builder registry is not initialized")]
	NotInitialized,

	#[error("unknown building block: '{0}'")]
	UnknownBuildingBlock(String),

	#[error("template error: {0}")]
	Template(#[from] TemplateError),

	#[error("file watcher error: {0}")]
	Watch(String),
}

impl RegistryError {
	pub fn invalid_descriptor(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidDescriptor {
			name: name.into(),
			message: message.into(),
		}
	}

	pub fn unknown_block(name: impl Into<String>) -> Self {
		Self::UnknownBuildingBlock(name.into())
	}
}

/// A fragment whose template failed to compile. The fragment stays listed as
/// a building block; only its template is missing from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentError {
	pub name: String,
	#[serde(serialize_with = "display")]
	pub error: TemplateError,
}

fn display<S: serde::Serializer>(error: &TemplateError, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.collect_str(error)
}
