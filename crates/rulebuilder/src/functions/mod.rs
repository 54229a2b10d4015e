// Function catalog module
//
// Typed, named message processing operations. The catalog is the leaf input
// of the rule builder: every function carries a semantic return type and the
// flags that decide whether the rule builder may surface it.

mod builtins;
mod catalog;
mod types;

pub use builtins::register_builtins;
pub use catalog::{CatalogBuilder, FunctionCatalog, FunctionPlugin};
pub use types::{FunctionDescriptor, ParameterDescriptor, ReturnType, Visibility};

use crate::registry::RegistryError;

/// Catalog holding only the built-in functions
pub fn builtin_catalog() -> Result<FunctionCatalog, RegistryError> {
	let mut builder = CatalogBuilder::new();
	register_builtins(&mut builder)?;
	builder.build()
}
