//! Template groups: named templates loaded from one group file

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::config::Delimiters;
use crate::parser::{self, Definition};

use super::compiler::{self, Element};
use super::error::{GroupError, RenderError};
use super::instance::TemplateInstance;

/// Formal argument of a template
#[derive(Debug, Clone, PartialEq)]
pub struct FormalArg {
    pub name: String,
    pub default: Option<String>,
}

impl FormalArg {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }
}

/// A single template definition
///
/// The body is compiled on first use and the result memoized, so a malformed
/// body only fails the templates that are actually rendered.
#[derive(Debug)]
pub struct Template {
    name: String,
    formals: Vec<FormalArg>,
    /// `false` for ad hoc templates, which accept any attribute
    has_formals: bool,
    body: String,
    delimiters: Delimiters,
    compiled: OnceLock<Result<Arc<[Element]>, RenderError>>,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        formals: Vec<FormalArg>,
        body: impl Into<String>,
        delimiters: Delimiters,
    ) -> Self {
        Self {
            name: name.into(),
            formals,
            has_formals: true,
            body: body.into(),
            delimiters,
            compiled: OnceLock::new(),
        }
    }

    /// Ad hoc template whose body is `text`
    pub fn literal(text: impl Into<String>, delimiters: Delimiters) -> Self {
        let body = text.into();
        Self {
            name: body.clone(),
            formals: Vec::new(),
            has_formals: false,
            body,
            delimiters,
            compiled: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formals(&self) -> &[FormalArg] {
        &self.formals
    }

    pub fn has_formals(&self) -> bool {
        self.has_formals
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Check if `attribute` is one of this template's formal arguments
    pub fn declares(&self, attribute: &str) -> bool {
        self.formals.iter().any(|f| f.name == attribute)
    }

    pub(crate) fn elements(&self) -> Result<Arc<[Element]>, RenderError> {
        self.compiled
            .get_or_init(|| {
                compiler::compile(&self.body, self.delimiters)
                    .map(Arc::from)
                    .map_err(|errors| RenderError::Compile {
                        template: self.name.clone(),
                        body: self.body.clone(),
                        errors,
                    })
            })
            .clone()
    }
}

/// An immutable set of named templates
#[derive(Debug)]
pub struct TemplateGroup {
    name: String,
    delimiters: Delimiters,
    templates: HashMap<String, Arc<Template>>,
}

impl TemplateGroup {
    /// Create a group with no templates
    ///
    /// Every lookup misses, so rendering through it treats each statement as
    /// literal template text.
    pub fn empty(delimiters: Delimiters) -> Self {
        Self {
            name: "<empty>".to_string(),
            delimiters,
            templates: HashMap::new(),
        }
    }

    /// Parse group file text
    ///
    /// `delimiters` applies unless the file declares its own.
    pub fn from_source(
        name: impl Into<String>,
        text: &str,
        delimiters: Delimiters,
    ) -> Result<Self, GroupError> {
        let name = name.into();
        let file = parser::parse(text).map_err(|errors| GroupError::Parse {
            name: name.clone(),
            source_text: text.to_string(),
            errors,
        })?;

        let delimiters = file.delimiters.map(|d| d.node).unwrap_or(delimiters);
        let mut templates = HashMap::new();

        for def in &file.definitions {
            if let Definition::Template(decl) = &def.node {
                let formals = decl
                    .formals
                    .iter()
                    .map(|f| FormalArg {
                        name: f.name.node.clone(),
                        default: f.default.clone(),
                    })
                    .collect();
                let template =
                    Template::new(decl.name.node.clone(), formals, decl.body.node.clone(), delimiters);
                templates.insert(decl.name.node.clone(), Arc::new(template));
            }
        }

        // Aliases share their target's template; the parser has checked targets exist
        for def in &file.definitions {
            if let Definition::Alias { name: alias, target } = &def.node {
                if let Some(template) = templates.get(&target.node).cloned() {
                    templates.insert(alias.node.clone(), template);
                }
            }
        }

        tracing::debug!(group = %name, templates = templates.len(), "parsed template group");

        Ok(Self {
            name,
            delimiters,
            templates,
        })
    }

    /// Add a template defined in code
    pub fn define(
        &mut self,
        name: &str,
        formals: &[&str],
        body: &str,
    ) -> Result<&mut Self, GroupError> {
        if self.templates.contains_key(name) {
            return Err(GroupError::Duplicate {
                group: self.name.clone(),
                template: name.to_string(),
            });
        }
        let formals = formals.iter().map(|f| FormalArg::new(*f)).collect();
        let template = Template::new(name, formals, body, self.delimiters);
        self.templates.insert(name.to_string(), Arc::new(template));
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delimiters(&self) -> Delimiters {
        self.delimiters
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// All template names, sorted
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// New instance of the named template, or `None` if the group lacks it
    pub fn instance_of(&self, name: &str) -> Option<TemplateInstance<'_>> {
        self.templates
            .get(name)
            .map(|template| TemplateInstance::new(self, Arc::clone(template)))
    }

    /// Instance of an ad hoc template whose body is `text`
    ///
    /// The template uses this group's delimiters and can include the group's
    /// templates.
    pub fn literal(&self, text: &str) -> TemplateInstance<'_> {
        TemplateInstance::new(self, Arc::new(Template::literal(text, self.delimiters)))
    }
}
