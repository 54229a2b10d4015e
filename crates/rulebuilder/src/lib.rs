//! Building blocks for the visual rule builder.
//!
//! The [`registry`] classifies catalog [`functions`] and authored
//! [`fragments`] into conditions and actions, compiles fragment
//! [`template`]s in a sandbox, and republishes an immutable snapshot whenever
//! the fragment set changes. [`searchjob`] holds the per-node search job
//! cache.

pub mod config;
pub mod fragments;
pub mod functions;
pub mod registry;
pub mod searchjob;
pub mod telemetry;
pub mod template;

pub use config::Config;
pub use registry::{RegistryError, RuleBuilderRegistry, RuleBuilderSnapshot};
