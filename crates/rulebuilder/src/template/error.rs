use thiserror::Error;

/// Errors raised while compiling or rendering fragment templates
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
	#[error("syntax error in template '{template}' at line {line}: {message}")]
	Syntax {
		template: String,
		line: usize,
		message: String,
	},

	#[error("directive '<#{directive}>' is not allowed in template '{template}'")]
	ForbiddenDirective { template: String, directive: String },

	#[error("built-in '?{builtin}' is not allowed in template '{template}'")]
	ForbiddenBuiltin { template: String, builtin: String },

	#[error("template '{template}' references missing variable '{variable}'")]
	MissingVariable { template: String, variable: String },

	#[error("template '{0}' not found")]
	NotFound(String),
}

impl TemplateError {
	pub fn syntax(template: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
		Self::Syntax {
			template: template.into(),
			line,
			message: message.into(),
		}
	}

	/// Name of the template the error belongs to
	pub fn template(&self) -> &str {
		match self {
			TemplateError::Syntax { template, .. }
			| TemplateError::ForbiddenDirective { template, .. }
			| TemplateError::ForbiddenBuiltin { template, .. }
			| TemplateError::MissingVariable { template, .. } => template,
			TemplateError::NotFound(name) => name,
		}
	}
}
