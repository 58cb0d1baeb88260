//! Error types for template groups and rendering

use thiserror::Error;

use crate::error::{format_errors, ParseError};

/// A group file could not be turned into a template group
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GroupError {
    #[error("failed to parse template group '{name}': {}", join_errors(.errors))]
    Parse {
        name: String,
        source_text: String,
        errors: Vec<ParseError>,
    },

    #[error("template '{template}' is already defined in group '{group}'")]
    Duplicate { group: String, template: String },
}

impl GroupError {
    /// Render the error with source context
    pub fn report(&self) -> String {
        match self {
            GroupError::Parse {
                name,
                source_text,
                errors,
            } => format_errors(errors, source_text, name),
            other => other.to_string(),
        }
    }
}

/// A template failed to compile or render
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    /// Malformed template body; reported when the template is first used
    #[error("template '{template}' has errors: {}", join_errors(.errors))]
    Compile {
        template: String,
        body: String,
        errors: Vec<ParseError>,
    },

    /// Included or applied template missing from the group
    #[error("no such template: {name}")]
    NoSuchTemplate { name: String },

    /// Strict binding of an attribute the template doesn't declare
    #[error("attribute '{attribute}' is not a formal argument of template '{template}'")]
    NoSuchAttribute { template: String, attribute: String },

    #[error("template '{template}' takes {expected} argument(s) but {got} were passed")]
    TooManyArguments {
        template: String,
        expected: usize,
        got: usize,
    },

    #[error("template nesting deeper than {limit} while rendering '{template}'")]
    RecursionLimit { template: String, limit: usize },
}

impl RenderError {
    /// Render the error with source context where there is any
    pub fn report(&self) -> String {
        match self {
            RenderError::Compile {
                template,
                body,
                errors,
            } => format_errors(errors, body, template),
            other => other.to_string(),
        }
    }
}

fn join_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
