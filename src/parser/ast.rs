//! Abstract Syntax Tree types for template group files

use crate::config::Delimiters;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Root AST node - a complete group file
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFile {
    /// `delimiters "<", ">"` declaration, if present
    pub delimiters: Option<Spanned<Delimiters>>,
    pub definitions: Vec<Spanned<Definition>>,
}

/// Top-level definition in a group file
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    /// Template: `name(args) ::= <<body>>`
    Template(TemplateDecl),
    /// Alias: `name ::= other`
    Alias {
        name: Spanned<String>,
        target: Spanned<String>,
    },
}

impl Definition {
    /// Name this definition introduces into the group
    pub fn name(&self) -> &Spanned<String> {
        match self {
            Definition::Template(decl) => &decl.name,
            Definition::Alias { name, .. } => name,
        }
    }
}

/// Template declaration
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDecl {
    pub name: Spanned<String>,
    pub formals: Vec<FormalArg>,
    /// Unescaped body text; the span covers the quoted body in the file
    pub body: Spanned<String>,
}

/// Formal argument with an optional default value
#[derive(Debug, Clone, PartialEq)]
pub struct FormalArg {
    pub name: Spanned<String>,
    pub default: Option<String>,
}
