//! Template engine for statement groups
//!
//! A group file holds named templates:
//!
//! ```text
//! delimiters "<", ">"
//!
//! insert(table, cols) ::= <<
//! insert into <table> (<cols; separator=", ">)
//! >>
//!
//! add ::= insert
//! ```
//!
//! Bodies support attribute references, `.property` access, includes with
//! dynamic scoping, `:template()` application over lists, the `separator` and
//! `null` options, and `if`/`elseif`/`else`/`endif` blocks.

mod compiler;
mod error;
mod expr;
mod group;
mod instance;
mod value;

pub use compiler::{compile, Element};
pub use error::{GroupError, RenderError};
pub use expr::{parse_tag, Condition, Expr, ExprOptions, ExprToken, Tag};
pub use group::{FormalArg, Template, TemplateGroup};
pub use instance::{Binding, TemplateInstance, MAX_TEMPLATE_DEPTH};
pub use value::Value;
