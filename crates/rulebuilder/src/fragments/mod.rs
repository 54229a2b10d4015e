//! Rule fragment definitions and the fragment store client.

mod service;
mod types;

pub use service::{EmptyFragmentService, FileFragmentService, FragmentService, FragmentStoreError};
pub use types::{FragmentFile, RuleFragment};

#[cfg(any(test, feature = "testing"))]
pub mod memory;
