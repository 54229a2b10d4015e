// Function catalog
//
// Registered once at boot from the built-in set plus plugin contributions and
// immutable afterwards.

use indexmap::IndexMap;
use tracing::debug;

use super::types::{FunctionDescriptor, Visibility};
use crate::registry::RegistryError;

/// Source of additional function descriptors contributed at boot
pub trait FunctionPlugin {
	fn name(&self) -> &str;

	fn functions(&self) -> Vec<FunctionDescriptor>;
}

/// Immutable name -> descriptor lookup, split by visibility
#[derive(Debug, Default)]
pub struct FunctionCatalog {
	public: IndexMap<String, FunctionDescriptor>,
	internal: IndexMap<String, FunctionDescriptor>,
}

impl FunctionCatalog {
	pub fn builder() -> CatalogBuilder {
		CatalogBuilder::default()
	}

	/// Public functions only, in registration order
	pub fn all(&self) -> impl Iterator<Item = &FunctionDescriptor> {
		self.public.values()
	}

	/// Public functions followed by internal ones. Must not be used to build
	/// anything shown to end users.
	pub fn all_with_internal(&self) -> impl Iterator<Item = &FunctionDescriptor> {
		self.public.values().chain(self.internal.values())
	}

	pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
		self.public.get(name).or_else(|| self.internal.get(name))
	}

	pub fn contains(&self, name: &str) -> bool {
		self.public.contains_key(name) || self.internal.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.public.len() + self.internal.len()
	}

	pub fn is_empty(&self) -> bool {
		self.public.is_empty() && self.internal.is_empty()
	}

	pub fn internal_len(&self) -> usize {
		self.internal.len()
	}
}

/// Collects descriptors and validates them into a [`FunctionCatalog`]
#[derive(Debug, Default)]
pub struct CatalogBuilder {
	pending: Vec<FunctionDescriptor>,
}

impl CatalogBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a descriptor under its declared visibility
	pub fn register(&mut self, descriptor: FunctionDescriptor) -> &mut Self {
		self.pending.push(descriptor);
		self
	}

	/// Register a descriptor as internal regardless of its declared visibility
	pub fn register_internal(&mut self, descriptor: FunctionDescriptor) -> &mut Self {
		self.pending.push(descriptor.internal());
		self
	}

	/// Register everything a plugin contributes
	pub fn extend(&mut self, plugin: &dyn FunctionPlugin) -> &mut Self {
		let functions = plugin.functions();
		debug!(
			target: "rule_builder",
			plugin = plugin.name(),
			count = functions.len(),
			"registering plugin functions"
		);
		self.pending.extend(functions);
		self
	}

	/// Validate and freeze the catalog. Duplicate names (across public and
	/// internal functions) and malformed descriptors are fatal.
	pub fn build(self) -> Result<FunctionCatalog, RegistryError> {
		let mut catalog = FunctionCatalog::default();

		for descriptor in self.pending {
			descriptor.validate()?;
			if catalog.contains(&descriptor.name) {
				return Err(RegistryError::DuplicateFunctionName(descriptor.name));
			}
			let bucket = match descriptor.visibility {
				Visibility::Public => &mut catalog.public,
				Visibility::Internal => &mut catalog.internal,
			};
			bucket.insert(descriptor.name.clone(), descriptor);
		}

		Ok(catalog)
	}
}
