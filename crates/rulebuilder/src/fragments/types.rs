// Rule fragment definitions
//
// A fragment is an authored building block wrapping a snippet of rule source.
// It shares the function descriptor shape so fragments and catalog functions
// can be handled uniformly by name, return type and flags.

use serde::{Deserialize, Serialize};

use crate::functions::FunctionDescriptor;

/// A building block: either a catalog function or an authored fragment.
///
/// Visibility only applies to catalog functions. An authored fragment is
/// always listed publicly, whatever its descriptor declares.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFragment {
	pub descriptor: FunctionDescriptor,

	/// Explicit classification. Fragments never infer this from the return type.
	#[serde(default)]
	pub is_condition: bool,

	/// Template source rendered into rule source. Present only for fragment
	/// templates.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fragment: Option<String>,
}

impl RuleFragment {
	/// Building block for a catalog function. Not a template; classified by its
	/// return type.
	pub fn from_function(descriptor: FunctionDescriptor) -> Self {
		Self {
			is_condition: descriptor.return_type.is_boolean(),
			descriptor,
			fragment: None,
		}
	}

	/// Authored condition fragment carrying a template
	pub fn condition(descriptor: FunctionDescriptor, fragment: impl Into<String>) -> Self {
		Self {
			descriptor,
			is_condition: true,
			fragment: Some(fragment.into()),
		}
	}

	/// Authored action fragment carrying a template
	pub fn action(descriptor: FunctionDescriptor, fragment: impl Into<String>) -> Self {
		Self {
			descriptor,
			is_condition: false,
			fragment: Some(fragment.into()),
		}
	}

	pub fn name(&self) -> &str {
		&self.descriptor.name
	}

	/// Whether this building block carries a renderable template
	pub fn is_fragment(&self) -> bool {
		self.fragment.is_some()
	}

	pub fn rule_builder_enabled(&self) -> bool {
		self.descriptor.rule_builder_enabled
	}
}

/// On-disk document holding the full fragment set
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentFile {
	#[serde(default)]
	pub fragments: Vec<RuleFragment>,
}
