// Fragment template parser
//
// Supported syntax is a FreeMarker subset:
//   ${path}              interpolation, error when missing
//   ${path!}             interpolation, empty when missing
//   ${path!"default"}    interpolation with a literal default
//   <#if path>           also <#if !path> and <#if path??>
//   <#else>, </#if>
//   <#-- comment -->
// Any other directive and any `?builtin` is rejected at compile time, so a
// template can only read from the context it is rendered with.

use std::sync::LazyLock;

use regex::Regex;

use super::error::TemplateError;

const MAX_NESTING: usize = 32;

static SEGMENT: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_]*|[0-9]+)$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
	Text(String),
	Interpolation(Interpolation),
	If {
		condition: Condition,
		then: Vec<Node>,
		otherwise: Vec<Node>,
	},
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Interpolation {
	pub path: Vec<String>,
	pub fallback: Fallback,
}

/// What to render when an interpolated variable is missing or null
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fallback {
	Required,
	Empty,
	Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition {
	pub path: Vec<String>,
	pub negated: bool,
	/// `path??`: only test that the variable is present
	pub exists_only: bool,
}

struct Frame {
	condition: Condition,
	then: Vec<Node>,
	otherwise: Option<Vec<Node>>,
	opened_at: usize,
}

pub(crate) fn parse(name: &str, source: &str) -> Result<Vec<Node>, TemplateError> {
	Parser {
		name,
		source,
		pos: 0,
	}
	.parse()
}

struct Parser<'a> {
	name: &'a str,
	source: &'a str,
	pos: usize,
}

impl<'a> Parser<'a> {
	fn parse(mut self) -> Result<Vec<Node>, TemplateError> {
		let source = self.source;
		let mut root = Vec::new();
		let mut stack: Vec<Frame> = Vec::new();
		let mut text = String::new();

		while let Some(ch) = source[self.pos..].chars().next() {
			let rest = &source[self.pos..];

			if rest.starts_with("${") {
				flush(&mut text, current(&mut root, &mut stack));
				let end = self.closing(rest, 2, '}', "unterminated interpolation")?;
				let interpolation = self.interpolation(&rest[2..end])?;
				current(&mut root, &mut stack).push(Node::Interpolation(interpolation));
				self.pos += end + 1;
			} else if rest.starts_with("<#--") {
				let end = rest
					.find("-->")
					.ok_or_else(|| self.error("unterminated comment"))?;
				self.pos += end + 3;
			} else if rest.starts_with("</#") {
				flush(&mut text, current(&mut root, &mut stack));
				let end = self.closing(rest, 3, '>', "unterminated closing directive")?;
				let directive = rest[3..end].trim();
				if directive != "if" {
					return Err(self.forbidden(directive));
				}
				let frame = stack
					.pop()
					.ok_or_else(|| self.error("</#if> without matching <#if>"))?;
				let node = Node::If {
					condition: frame.condition,
					then: frame.then,
					otherwise: frame.otherwise.unwrap_or_default(),
				};
				current(&mut root, &mut stack).push(node);
				self.pos += end + 1;
			} else if rest.starts_with("<#") {
				flush(&mut text, current(&mut root, &mut stack));
				let end = self.closing(rest, 2, '>', "unterminated directive")?;
				let body = rest[2..end].trim();
				let (directive, args) = match body.split_once(char::is_whitespace) {
					Some((directive, args)) => (directive, args.trim()),
					None => (body, ""),
				};
				match directive {
					"if" => {
						if stack.len() >= MAX_NESTING {
							return Err(self.error("<#if> nested too deeply"));
						}
						let condition = self.condition(args)?;
						stack.push(Frame {
							condition,
							then: Vec::new(),
							otherwise: None,
							opened_at: self.pos,
						});
					},
					"else" => {
						if !args.is_empty() {
							return Err(self.error("<#else> takes no arguments"));
						}
						let line = self.line();
						let frame = stack.last_mut().ok_or_else(|| {
							TemplateError::syntax(self.name, line, "<#else> outside of <#if>")
						})?;
						if frame.otherwise.is_some() {
							return Err(TemplateError::syntax(self.name, line, "duplicate <#else>"));
						}
						frame.otherwise = Some(Vec::new());
					},
					other => return Err(self.forbidden(other)),
				}
				self.pos += end + 1;
			} else {
				text.push(ch);
				self.pos += ch.len_utf8();
			}
		}

		if let Some(frame) = stack.last() {
			self.pos = frame.opened_at;
			return Err(self.error("<#if> is never closed"));
		}
		flush(&mut text, &mut root);
		Ok(root)
	}

	/// Offset of the first `close` in `rest` after `skip`, ignoring quoted text
	fn closing(
		&self,
		rest: &str,
		skip: usize,
		close: char,
		message: &str,
	) -> Result<usize, TemplateError> {
		let mut quote: Option<char> = None;
		let mut escaped = false;
		for (i, c) in rest[skip..].char_indices() {
			if escaped {
				escaped = false;
				continue;
			}
			match (quote, c) {
				(Some(_), '\\') => escaped = true,
				(Some(q), c) if c == q => quote = None,
				(Some(_), _) => {},
				(None, '"' | '\'') => quote = Some(c),
				(None, c) if c == close => return Ok(skip + i),
				(None, _) => {},
			}
		}
		Err(self.error(message))
	}

	fn interpolation(&self, inner: &str) -> Result<Interpolation, TemplateError> {
		let inner = inner.trim();
		self.reject_builtins(inner)?;
		let (path, fallback) = match split_outside_quotes(inner, '!') {
			Some((path, default)) => (path, self.fallback(default.trim())?),
			None => (inner, Fallback::Required),
		};
		Ok(Interpolation {
			path: self.path(path)?,
			fallback,
		})
	}

	fn condition(&self, args: &str) -> Result<Condition, TemplateError> {
		let mut expr = args.trim();
		if expr.is_empty() {
			return Err(self.error("<#if> requires a condition"));
		}
		let negated = match expr.strip_prefix('!') {
			Some(rest) => {
				expr = rest.trim_start();
				true
			},
			None => false,
		};
		let exists_only = match expr.strip_suffix("??") {
			Some(rest) => {
				expr = rest.trim_end();
				true
			},
			None => false,
		};
		self.reject_builtins(expr)?;
		Ok(Condition {
			path: self.path(expr)?,
			negated,
			exists_only,
		})
	}

	fn fallback(&self, default: &str) -> Result<Fallback, TemplateError> {
		if default.is_empty() {
			return Ok(Fallback::Empty);
		}
		let quoted = default.len() >= 2
			&& ((default.starts_with('"') && default.ends_with('"'))
				|| (default.starts_with('\'') && default.ends_with('\'')));
		if !quoted {
			return Err(self.error(format!(
				"default value must be a string literal, got '{default}'"
			)));
		}
		let literal = &default[1..default.len() - 1];
		Ok(Fallback::Literal(unescape(literal)))
	}

	fn path(&self, expr: &str) -> Result<Vec<String>, TemplateError> {
		let expr = expr.trim();
		if expr.is_empty() {
			return Err(self.error("empty expression"));
		}
		let segments: Vec<String> = expr.split('.').map(|s| s.trim().to_string()).collect();
		let valid = segments.iter().all(|s| SEGMENT.is_match(s))
			&& !segments[0].starts_with(|c: char| c.is_ascii_digit());
		if !valid {
			return Err(self.error(format!("invalid variable reference '{expr}'")));
		}
		Ok(segments)
	}

	fn reject_builtins(&self, expr: &str) -> Result<(), TemplateError> {
		if let Some((_, builtin)) = split_outside_quotes(expr, '?') {
			let builtin: String = builtin
				.trim_start_matches('?')
				.chars()
				.take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
				.collect();
			return Err(TemplateError::ForbiddenBuiltin {
				template: self.name.to_string(),
				builtin,
			});
		}
		Ok(())
	}

	fn forbidden(&self, directive: &str) -> TemplateError {
		TemplateError::ForbiddenDirective {
			template: self.name.to_string(),
			directive: directive.to_string(),
		}
	}

	fn error(&self, message: impl Into<String>) -> TemplateError {
		TemplateError::syntax(self.name, self.line(), message)
	}

	fn line(&self) -> usize {
		self.source[..self.pos].matches('\n').count() + 1
	}
}

fn current<'n>(root: &'n mut Vec<Node>, stack: &'n mut [Frame]) -> &'n mut Vec<Node> {
	match stack.last_mut() {
		Some(frame) => match frame.otherwise.as_mut() {
			Some(otherwise) => otherwise,
			None => &mut frame.then,
		},
		None => root,
	}
}

fn flush(text: &mut String, nodes: &mut Vec<Node>) {
	if !text.is_empty() {
		nodes.push(Node::Text(std::mem::take(text)));
	}
}

/// Split at the first `sep` that is not inside a quoted string
fn split_outside_quotes(s: &str, sep: char) -> Option<(&str, &str)> {
	let mut quote: Option<char> = None;
	let mut escaped = false;
	for (i, c) in s.char_indices() {
		if escaped {
			escaped = false;
			continue;
		}
		match (quote, c) {
			(Some(_), '\\') => escaped = true,
			(Some(q), c) if c == q => quote = None,
			(Some(_), _) => {},
			(None, '"' | '\'') => quote = Some(c),
			(None, c) if c == sep => return Some((&s[..i], &s[i + c.len_utf8()..])),
			(None, _) => {},
		}
	}
	None
}

fn unescape(literal: &str) -> String {
	let mut out = String::with_capacity(literal.len());
	let mut chars = literal.chars();
	while let Some(c) = chars.next() {
		if c == '\\' {
			match chars.next() {
				Some('n') => out.push('\n'),
				Some('t') => out.push('\t'),
				Some(other) => out.push(other),
				None => out.push('\\'),
			}
		} else {
			out.push(c);
		}
	}
	out
}
