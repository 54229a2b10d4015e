// Rule builder snapshot
//
// An immutable view of every building block the rule builder can offer,
// derived from the function catalog and one read of the fragment store. A new
// snapshot is built for every reload and published as a whole.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{FragmentError, RegistryError};
use crate::fragments::RuleFragment;
use crate::functions::{FunctionCatalog, FunctionDescriptor};
use crate::template::{Template, TemplateEngine, TemplateError};

/// Building blocks keyed by name
pub type BuildingBlocks = IndexMap<String, RuleFragment>;

#[derive(Debug)]
pub struct RuleBuilderSnapshot {
	conditions: Arc<BuildingBlocks>,
	actions: Arc<BuildingBlocks>,
	conditions_with_internal: Arc<BuildingBlocks>,
	actions_with_internal: Arc<BuildingBlocks>,
	templates: TemplateEngine,
	fragment_errors: Vec<FragmentError>,
	generation: u64,
}

impl RuleBuilderSnapshot {
	/// Derive all views from the catalog and the current fragment set.
	///
	/// Functions come first and fragments after them, so a fragment shadows a
	/// function of the same name. Building blocks without the rule builder
	/// flag never appear in any view.
	pub fn build(catalog: &FunctionCatalog, fragments: &[RuleFragment], generation: u64) -> Self {
		let (conditions, actions) = classify(catalog.all(), fragments);
		let (conditions_with_internal, actions_with_internal) =
			classify(catalog.all_with_internal(), fragments);

		let (templates, fragment_errors) =
			compile_templates(&conditions_with_internal, &actions_with_internal);

		debug!(
			target: "rule_builder",
			generation,
			conditions = conditions.len(),
			actions = actions.len(),
			templates = templates.len(),
			errors = fragment_errors.len(),
			"built rule builder snapshot"
		);

		Self {
			conditions: Arc::new(conditions),
			actions: Arc::new(actions),
			conditions_with_internal: Arc::new(conditions_with_internal),
			actions_with_internal: Arc::new(actions_with_internal),
			templates,
			fragment_errors,
			generation,
		}
	}

	/// Public condition building blocks
	pub fn conditions(&self) -> &BuildingBlocks {
		&self.conditions
	}

	/// Public action building blocks
	pub fn actions(&self) -> &BuildingBlocks {
		&self.actions
	}

	/// Conditions including internal functions. Not for end-user display.
	pub fn conditions_with_internal(&self) -> &BuildingBlocks {
		&self.conditions_with_internal
	}

	/// Actions including internal functions. Not for end-user display.
	pub fn actions_with_internal(&self) -> &BuildingBlocks {
		&self.actions_with_internal
	}

	pub(crate) fn shared_conditions(&self) -> Arc<BuildingBlocks> {
		Arc::clone(&self.conditions)
	}

	pub(crate) fn shared_actions(&self) -> Arc<BuildingBlocks> {
		Arc::clone(&self.actions)
	}

	pub fn templates(&self) -> &TemplateEngine {
		&self.templates
	}

	pub fn template(&self, name: &str) -> Option<&Arc<Template>> {
		self.templates.get(name)
	}

	/// Fragments whose template failed to compile in this snapshot
	pub fn fragment_errors(&self) -> &[FragmentError] {
		&self.fragment_errors
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Look up a building block by name across conditions and actions,
	/// internal ones included
	pub fn building_block(&self, name: &str) -> Result<&RuleFragment, RegistryError> {
		self
			.conditions_with_internal
			.get(name)
			.or_else(|| self.actions_with_internal.get(name))
			.ok_or_else(|| RegistryError::unknown_block(name))
	}

	/// Render the template of the named fragment
	pub fn render(&self, name: &str, context: &Value) -> Result<String, RegistryError> {
		if let Some(template) = self.templates.get(name) {
			return Ok(template.render(context)?);
		}
		// Distinguish an unknown name from a block without a usable template
		self.building_block(name)?;
		Err(TemplateError::NotFound(name.to_string()).into())
	}
}

fn classify<'a>(
	functions: impl Iterator<Item = &'a FunctionDescriptor>,
	fragments: &[RuleFragment],
) -> (BuildingBlocks, BuildingBlocks) {
	let mut conditions = BuildingBlocks::new();
	let mut actions = BuildingBlocks::new();

	let blocks = functions
		.map(|descriptor| RuleFragment::from_function(descriptor.clone()))
		.chain(fragments.iter().cloned());

	for block in blocks.filter(RuleFragment::rule_builder_enabled) {
		let (bucket, other) = if block.is_condition {
			(&mut conditions, &mut actions)
		} else {
			(&mut actions, &mut conditions)
		};
		// A name lives in exactly one bucket; the later definition decides which
		other.shift_remove(block.name());
		bucket.insert(block.name().to_string(), block);
	}

	(conditions, actions)
}

fn compile_templates(
	conditions: &BuildingBlocks,
	actions: &BuildingBlocks,
) -> (TemplateEngine, Vec<FragmentError>) {
	let mut merged: IndexMap<&str, &RuleFragment> = IndexMap::new();
	merged.extend(conditions.iter().map(|(name, block)| (name.as_str(), block)));
	merged.extend(actions.iter().map(|(name, block)| (name.as_str(), block)));

	let mut builder = TemplateEngine::builder();
	let mut errors = Vec::new();
	for (name, block) in merged {
		let Some(source) = block.fragment.as_deref() else {
			continue;
		};
		if let Err(error) = builder.add(name, source) {
			warn!(target: "rule_builder", "Skipping fragment '{}': {}", name, error);
			errors.push(FragmentError {
				name: name.to_string(),
				error,
			});
		}
	}

	(builder.build(), errors)
}
