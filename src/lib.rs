//! stg-locator - statement templates located by type, path or context
//!
//! Statements live in template group files (`.sql.stg`) next to the code that
//! uses them. A resolver finds the group for a type identity or resource path,
//! loads and parses it once, and renders named statements with the attributes
//! supplied per call.
//!
//! # Example
//!
//! ```rust
//! use stg_locator::render;
//!
//! let sql = render(
//!     r#"find(table) ::= "select * from <table> where id = <id>""#,
//!     "find",
//!     [("table", "users"), ("id", "7")],
//! )
//! .unwrap();
//! assert_eq!(sql, "select * from users where id = 7");
//! ```

pub mod config;
pub mod error;
pub mod locator;
pub mod parser;
pub mod template;

pub use config::{ConfigError, Delimiters, Encoding, LocatorConfig};
pub use error::ParseError;
pub use locator::{
    AttributeBag, GroupCache, GroupResolver, Locator, Locators, PerIdentityResolver,
    ResourceError, StatementContext, StatementResolver, TypeIdentity,
};
pub use template::{Binding, GroupError, RenderError, TemplateGroup, Value};

use std::sync::Arc;

use thiserror::Error;

/// Errors from locating, loading or rendering statements
#[derive(Debug, Error)]
pub enum Error {
    /// Group resource missing or unreadable
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Group file failed to parse
    #[error(transparent)]
    Parse(#[from] GroupError),

    /// Template failed to compile or render
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Check if the error is a missing group resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Resource(ResourceError::NotFound { .. }))
    }

    /// Render the error, with source context for parse and compile errors
    pub fn report(&self) -> String {
        match self {
            Error::Parse(err) => err.report(),
            Error::Render(err) => err.report(),
            other => other.to_string(),
        }
    }
}

/// Render statement `name` from the group in `group_text`
///
/// Uses the default `<` `>` delimiters unless the group declares others.
/// Attributes are bound opportunistically, and a name the group doesn't define
/// is rendered as template text itself.
pub fn render<I, K, V>(group_text: &str, name: &str, attributes: I) -> Result<String, Error>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let group = TemplateGroup::from_source("<inline>", group_text, Delimiters::default())?;
    let ctx = attributes
        .into_iter()
        .fold(StatementContext::new(), |ctx, (k, v)| ctx.with_attribute(k, v));
    GroupResolver::fixed(Arc::new(group)).render(name, &ctx)
}
