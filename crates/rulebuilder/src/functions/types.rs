// Function descriptor types
//
// A descriptor identifies one built-in or plugin-supplied operation. The
// declared return type is an explicit tag, so classifying an operation as a
// condition or an action is a match over `ReturnType` rather than any kind of
// runtime type inspection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::registry::RegistryError;

/// Semantic type of a value produced or consumed by a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
	Boolean,
	String,
	Long,
	Double,
	Number,
	Object,
	List,
	Map,
	DateTime,
	Duration,
	IpAddress,
	Url,
	Message,
	Void,
}

impl ReturnType {
	/// Boolean-returning functions are conditions, everything else is an action
	pub fn is_boolean(self) -> bool {
		matches!(self, ReturnType::Boolean)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			ReturnType::Boolean => "boolean",
			ReturnType::String => "string",
			ReturnType::Long => "long",
			ReturnType::Double => "double",
			ReturnType::Number => "number",
			ReturnType::Object => "object",
			ReturnType::List => "list",
			ReturnType::Map => "map",
			ReturnType::DateTime => "date_time",
			ReturnType::Duration => "duration",
			ReturnType::IpAddress => "ip_address",
			ReturnType::Url => "url",
			ReturnType::Message => "message",
			ReturnType::Void => "void",
		}
	}
}

impl fmt::Display for ReturnType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ReturnType {
	type Err = RegistryError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let ty = match s {
			"boolean" | "bool" => ReturnType::Boolean,
			"string" => ReturnType::String,
			"long" => ReturnType::Long,
			"double" => ReturnType::Double,
			"number" => ReturnType::Number,
			"object" => ReturnType::Object,
			"list" => ReturnType::List,
			"map" => ReturnType::Map,
			"date_time" | "date" => ReturnType::DateTime,
			"duration" | "period" => ReturnType::Duration,
			"ip_address" | "ip" => ReturnType::IpAddress,
			"url" => ReturnType::Url,
			"message" => ReturnType::Message,
			"void" => ReturnType::Void,
			other => {
				return Err(RegistryError::invalid_descriptor(
					other,
					format!("unknown type '{other}'"),
				));
			},
		};
		Ok(ty)
	}
}

/// Whether a function may be shown to end users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
	#[default]
	Public,
	/// Usable by the system itself (for example inside other fragments), never
	/// listed to users
	Internal,
}

/// A single declared parameter of a function
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
	pub name: String,

	#[serde(rename = "type")]
	pub ty: ReturnType,

	#[serde(default)]
	pub optional: bool,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl ParameterDescriptor {
	pub fn required(name: impl Into<String>, ty: ReturnType) -> Self {
		Self {
			name: name.into(),
			ty,
			optional: false,
			description: None,
		}
	}

	pub fn optional(name: impl Into<String>, ty: ReturnType) -> Self {
		Self {
			optional: true,
			..Self::required(name, ty)
		}
	}
}

/// Describes a function by name, type and rule builder flags
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDescriptor {
	/// Unique, stable identifier
	pub name: String,

	pub return_type: ReturnType,

	/// Whether the visual rule builder may offer this function at all
	#[serde(default)]
	pub rule_builder_enabled: bool,

	#[serde(default)]
	pub visibility: Visibility,

	#[serde(default)]
	pub params: Vec<ParameterDescriptor>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,

	/// Display name in the rule builder (falls back to `name`)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rule_builder_name: Option<String>,

	/// Display title template in the rule builder
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rule_builder_title: Option<String>,
}

impl FunctionDescriptor {
	/// Create a public descriptor that is not enabled for the rule builder
	pub fn new(name: impl Into<String>, return_type: ReturnType) -> Self {
		Self {
			name: name.into(),
			return_type,
			rule_builder_enabled: false,
			visibility: Visibility::Public,
			params: Vec::new(),
			description: None,
			rule_builder_name: None,
			rule_builder_title: None,
		}
	}

	pub fn rule_builder_enabled(mut self) -> Self {
		self.rule_builder_enabled = true;
		self
	}

	pub fn internal(mut self) -> Self {
		self.visibility = Visibility::Internal;
		self
	}

	pub fn with_param(mut self, param: ParameterDescriptor) -> Self {
		self.params.push(param);
		self
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn with_rule_builder_name(mut self, name: impl Into<String>) -> Self {
		self.rule_builder_name = Some(name.into());
		self
	}

	pub fn is_internal(&self) -> bool {
		self.visibility == Visibility::Internal
	}

	/// Name shown in the rule builder
	pub fn display_name(&self) -> &str {
		self.rule_builder_name.as_deref().unwrap_or(&self.name)
	}

	/// Reject descriptors that cannot be registered
	pub fn validate(&self) -> Result<(), RegistryError> {
		if self.name.trim().is_empty() {
			return Err(RegistryError::invalid_descriptor(
				&self.name,
				"function name must not be empty",
			));
		}
		if self.name.chars().any(char::is_whitespace) {
			return Err(RegistryError::invalid_descriptor(
				&self.name,
				"function name must not contain whitespace",
			));
		}
		let mut seen = std::collections::HashSet::new();
		for param in &self.params {
			if !seen.insert(param.name.as_str()) {
				return Err(RegistryError::invalid_descriptor(
					&self.name,
					format!("duplicate parameter '{}'", param.name),
				));
			}
		}
		Ok(())
	}
}
