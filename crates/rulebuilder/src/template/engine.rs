use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::error::TemplateError;
use super::parser::{self, Condition, Fallback, Node};

/// A compiled fragment template
#[derive(Debug, Clone)]
pub struct Template {
	name: String,
	source: String,
	nodes: Vec<Node>,
}

impl Template {
	/// Parse and validate a template. Forbidden constructs fail here, never
	/// at render time.
	pub fn compile(name: impl Into<String>, source: impl Into<String>) -> Result<Self, TemplateError> {
		let name = name.into();
		let source = source.into();
		let nodes = parser::parse(&name, &source)?;
		Ok(Self {
			name,
			source,
			nodes,
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// Render against a JSON context. Strings are written raw, other scalars
	/// through their display form, arrays and objects as compact JSON.
	pub fn render(&self, context: &Value) -> Result<String, TemplateError> {
		let mut out = String::with_capacity(self.source.len());
		self.render_nodes(&self.nodes, context, &mut out)?;
		Ok(out)
	}

	fn render_nodes(&self, nodes: &[Node], context: &Value, out: &mut String) -> Result<(), TemplateError> {
		for node in nodes {
			match node {
				Node::Text(text) => out.push_str(text),
				Node::Interpolation(interpolation) => {
					match lookup(context, &interpolation.path).filter(|v| !v.is_null()) {
						Some(value) => write_value(out, value),
						None => match &interpolation.fallback {
							Fallback::Required => {
								return Err(TemplateError::MissingVariable {
									template: self.name.clone(),
									variable: interpolation.path.join("."),
								});
							},
							Fallback::Empty => {},
							Fallback::Literal(default) => out.push_str(default),
						},
					}
				},
				Node::If {
					condition,
					then,
					otherwise,
				} => {
					let branch = if evaluate(condition, context) { then } else { otherwise };
					self.render_nodes(branch, context, out)?;
				},
			}
		}
		Ok(())
	}
}

fn evaluate(condition: &Condition, context: &Value) -> bool {
	let value = lookup(context, &condition.path);
	let result = if condition.exists_only {
		value.is_some_and(|v| !v.is_null())
	} else {
		value.is_some_and(truthy)
	};
	result != condition.negated
}

fn lookup<'v>(context: &'v Value, path: &[String]) -> Option<&'v Value> {
	path.iter().try_fold(context, |current, segment| match current {
		Value::Object(map) => map.get(segment),
		Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
		_ => None,
	})
}

fn truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
		Value::String(s) => !s.is_empty(),
		Value::Array(items) => !items.is_empty(),
		Value::Object(_) => true,
	}
}

fn write_value(out: &mut String, value: &Value) {
	match value {
		Value::String(s) => out.push_str(s),
		other => out.push_str(&other.to_string()),
	}
}

/// Immutable, named set of compiled templates
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
	templates: IndexMap<String, Arc<Template>>,
}

impl TemplateEngine {
	pub fn builder() -> TemplateEngineBuilder {
		TemplateEngineBuilder::default()
	}

	pub fn get(&self, name: &str) -> Option<&Arc<Template>> {
		self.templates.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.templates.contains_key(name)
	}

	pub fn render(&self, name: &str, context: &Value) -> Result<String, TemplateError> {
		self
			.templates
			.get(name)
			.ok_or_else(|| TemplateError::NotFound(name.to_string()))?
			.render(context)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.templates.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.templates.len()
	}

	pub fn is_empty(&self) -> bool {
		self.templates.is_empty()
	}
}

#[derive(Debug, Default)]
pub struct TemplateEngineBuilder {
	templates: IndexMap<String, Arc<Template>>,
}

impl TemplateEngineBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Compile and register a template. A later template with the same name
	/// replaces the earlier one.
	pub fn add(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
		let template = Template::compile(name, source)?;
		self.templates.insert(name.to_string(), Arc::new(template));
		Ok(())
	}

	pub fn build(self) -> TemplateEngine {
		TemplateEngine {
			templates: self.templates,
		}
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;

	#[test]
	fn test_render_interpolation() {
		let template = Template::compile("has", "has_field(\"${field}\")").unwrap();
		let out = template.render(&json!({"field": "source_ip"})).unwrap();
		assert_eq!(out, "has_field(\"source_ip\")");
	}

	#[test]
	fn test_render_nested_paths_and_scalars() {
		let template =
			Template::compile("t", "${field.name} > ${limit} && ${flags.1} ${tags}").unwrap();
		let out = template
			.render(&json!({
				"field": {"name": "bytes"},
				"limit": 1024,
				"flags": [false, true],
				"tags": ["a", "b"]
			}))
			.unwrap();
		assert_eq!(out, "bytes > 1024 && true [\"a\",\"b\"]");
	}

	#[test]
	fn test_missing_variable_fails() {
		let template = Template::compile("t", "x = ${value}").unwrap();
		assert_matches!(
			template.render(&json!({})),
			Err(TemplateError::MissingVariable { variable, .. }) if variable == "value"
		);
		assert_matches!(
			template.render(&json!({"value": null})),
			Err(TemplateError::MissingVariable { .. })
		);
	}

	#[test]
	fn test_fallbacks() {
		let template = Template::compile("t", "[${a!}][${b!\"none\"}]").unwrap();
		assert_eq!(template.render(&json!({})).unwrap(), "[][none]");
		assert_eq!(template.render(&json!({"a": 1, "b": "x"})).unwrap(), "[1][x]");
	}

	#[test]
	fn test_conditionals() {
		let template = Template::compile(
			"t",
			"<#if prefix??>${prefix}_</#if>field<#if !strict> (lenient)<#else> (strict)</#if>",
		)
		.unwrap();
		assert_eq!(
			template.render(&json!({"prefix": "src", "strict": true})).unwrap(),
			"src_field (strict)"
		);
		assert_eq!(template.render(&json!({})).unwrap(), "field (lenient)");
		assert_eq!(
			template.render(&json!({"prefix": null, "strict": ""})).unwrap(),
			"field (lenient)"
		);
	}

	#[test]
	fn test_nested_conditionals() {
		let template =
			Template::compile("t", "<#if a><#if b>ab<#else>a</#if><#else>none</#if>").unwrap();
		assert_eq!(template.render(&json!({"a": 1, "b": [1]})).unwrap(), "ab");
		assert_eq!(template.render(&json!({"a": 1, "b": []})).unwrap(), "a");
		assert_eq!(template.render(&json!({"a": 0})).unwrap(), "none");
	}

	#[test]
	fn test_engine_lookup() {
		let mut builder = TemplateEngine::builder();
		builder.add("one", "1").unwrap();
		builder.add("two", "${x}").unwrap();
		assert_matches!(
			builder.add("bad", "<#include \"x\">"),
			Err(TemplateError::ForbiddenDirective { .. })
		);
		let engine = builder.build();

		assert_eq!(engine.len(), 2);
		assert!(!engine.contains("bad"));
		assert_eq!(engine.names().collect::<Vec<_>>(), vec!["one", "two"]);
		assert_eq!(engine.render("two", &json!({"x": "y"})).unwrap(), "y");
		assert_matches!(
			engine.render("missing", &json!({})),
			Err(TemplateError::NotFound(name)) if name == "missing"
		);
	}
}
