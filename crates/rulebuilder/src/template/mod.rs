//! Sandboxed fragment templates.
//!
//! Templates are compiled once per registry snapshot and can only read the
//! context they are rendered with: no includes, no assignments, no built-ins.

mod engine;
mod error;
mod parser;

pub use engine::{Template, TemplateEngine, TemplateEngineBuilder};
pub use error::TemplateError;
