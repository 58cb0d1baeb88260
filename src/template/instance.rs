//! Template instances and the body interpreter

use std::collections::HashMap;
use std::sync::Arc;

use super::compiler::Element;
use super::error::RenderError;
use super::expr::{Condition, Expr, ExprOptions};
use super::group::{Template, TemplateGroup};
use super::value::Value;

/// Maximum depth of nested includes and applications
pub const MAX_TEMPLATE_DEPTH: usize = 100;

/// How [`TemplateInstance::add`] treats attributes the template doesn't declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    /// Reject undeclared attributes
    #[default]
    Strict,
    /// Accept undeclared attributes as if they were declared
    Opportunistic,
}

/// A template with attribute values bound, ready to render
#[derive(Debug, Clone)]
pub struct TemplateInstance<'g> {
    group: &'g TemplateGroup,
    template: Arc<Template>,
    attributes: HashMap<String, Value>,
    binding: Binding,
}

impl<'g> TemplateInstance<'g> {
    pub(crate) fn new(group: &'g TemplateGroup, template: Arc<Template>) -> Self {
        Self {
            group,
            template,
            attributes: HashMap::new(),
            binding: Binding::Strict,
        }
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Bind an attribute value, replacing any earlier value of the same name
    ///
    /// Templates without formal arguments accept any name. Otherwise an
    /// undeclared name is an error under [`Binding::Strict`].
    pub fn add(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, RenderError> {
        let name = name.into();
        if self.template.has_formals() && !self.template.declares(&name) {
            if self.binding == Binding::Strict {
                return Err(RenderError::NoSuchAttribute {
                    template: self.template.name().to_string(),
                    attribute: name,
                });
            }
            tracing::trace!(
                template = self.template.name(),
                attribute = %name,
                "binding undeclared attribute"
            );
        }
        self.attributes.insert(name, value.into());
        Ok(self)
    }

    /// Bind every attribute in `attributes`
    pub fn add_all<'a, I>(&mut self, attributes: I) -> Result<&mut Self, RenderError>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        for (name, value) in attributes {
            self.add(name.clone(), value.clone())?;
        }
        Ok(self)
    }

    /// Render the template to text
    pub fn render(&self) -> Result<String, RenderError> {
        let defaults = defaults_for(&self.template, &self.attributes);
        let outer = Scope {
            attributes: &defaults,
            parent: None,
        };
        let scope = Scope {
            attributes: &self.attributes,
            parent: Some(&outer),
        };

        let mut out = String::new();
        Interpreter { group: self.group }.render_template(&self.template, &scope, 0, &mut out)?;
        Ok(out)
    }
}

/// Default values of formal arguments not bound in `bound`
fn defaults_for(template: &Template, bound: &HashMap<String, Value>) -> HashMap<String, Value> {
    template
        .formals()
        .iter()
        .filter(|f| !bound.contains_key(&f.name))
        .filter_map(|f| {
            f.default
                .as_ref()
                .map(|d| (f.name.clone(), Value::Str(d.clone())))
        })
        .collect()
}

/// Attribute scope; lookups fall through to the including template
struct Scope<'s> {
    attributes: &'s HashMap<String, Value>,
    parent: Option<&'s Scope<'s>>,
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.attributes
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.lookup(name)))
    }
}

struct Interpreter<'g> {
    group: &'g TemplateGroup,
}

impl Interpreter<'_> {
    fn render_template(
        &self,
        template: &Template,
        scope: &Scope<'_>,
        depth: usize,
        out: &mut String,
    ) -> Result<(), RenderError> {
        if depth >= MAX_TEMPLATE_DEPTH {
            return Err(RenderError::RecursionLimit {
                template: template.name().to_string(),
                limit: MAX_TEMPLATE_DEPTH,
            });
        }
        let elements = template.elements()?;
        self.render_elements(&elements, scope, depth, out)
    }

    fn render_elements(
        &self,
        elements: &[Element],
        scope: &Scope<'_>,
        depth: usize,
        out: &mut String,
    ) -> Result<(), RenderError> {
        for element in elements {
            match element {
                Element::Text(text) => out.push_str(text),
                Element::Expr { expr, options } => {
                    let value = self.eval(expr, scope, depth)?;
                    self.write(&value, options, scope, depth, out)?;
                }
                Element::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = None;
                    for (condition, body) in branches {
                        if self.test(condition, scope, depth)? {
                            taken = Some(body);
                            break;
                        }
                    }
                    if let Some(body) = taken.or(otherwise.as_ref()) {
                        self.render_elements(body, scope, depth, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn test(&self, condition: &Condition, scope: &Scope<'_>, depth: usize) -> Result<bool, RenderError> {
        Ok(match condition {
            Condition::Test(expr) => self.eval(expr, scope, depth)?.is_truthy(),
            Condition::Not(inner) => !self.test(inner, scope, depth)?,
            Condition::And(l, r) => self.test(l, scope, depth)? && self.test(r, scope, depth)?,
            Condition::Or(l, r) => self.test(l, scope, depth)? || self.test(r, scope, depth)?,
        })
    }

    fn eval(&self, expr: &Expr, scope: &Scope<'_>, depth: usize) -> Result<Value, RenderError> {
        match expr {
            Expr::Attribute(name) => Ok(scope.lookup(name).cloned().unwrap_or_default()),
            Expr::Literal(text) => Ok(Value::Str(text.clone())),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match self.eval(item, scope, depth)? {
                        Value::List(nested) => values.extend(nested),
                        Value::Null => {}
                        other => values.push(other),
                    }
                }
                Ok(Value::List(values))
            }
            Expr::Property { target, name } => Ok(self
                .eval(target, scope, depth)?
                .property(name)
                .cloned()
                .unwrap_or_default()),
            Expr::Include { template, args } => {
                let args = self.eval_all(args, scope, depth)?;
                self.include(template, args, scope, depth).map(Value::Str)
            }
            Expr::Apply {
                target,
                template,
                args,
            } => {
                let target = self.eval(target, scope, depth)?;
                let extra = self.eval_all(args, scope, depth)?;
                let mut results = Vec::new();
                for item in target.iter() {
                    if item.is_null() {
                        continue;
                    }
                    let mut args = Vec::with_capacity(extra.len() + 1);
                    args.push(item);
                    args.extend(extra.iter().cloned());
                    results.push(Value::Str(self.include(template, args, scope, depth)?));
                }
                Ok(Value::List(results))
            }
        }
    }

    fn eval_all(&self, exprs: &[Expr], scope: &Scope<'_>, depth: usize) -> Result<Vec<Value>, RenderError> {
        exprs.iter().map(|e| self.eval(e, scope, depth)).collect()
    }

    /// Render `name` with positional `args`, nested in `scope`
    fn include(
        &self,
        name: &str,
        args: Vec<Value>,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<String, RenderError> {
        let template = self
            .group
            .get(name)
            .ok_or_else(|| RenderError::NoSuchTemplate {
                name: name.to_string(),
            })?;

        let formals = template.formals();
        if args.len() > formals.len() {
            return Err(RenderError::TooManyArguments {
                template: name.to_string(),
                expected: formals.len(),
                got: args.len(),
            });
        }

        let mut attributes: HashMap<String, Value> = formals
            .iter()
            .map(|f| f.name.clone())
            .zip(args)
            .collect();
        attributes.extend(defaults_for(template, &attributes));

        let inner = Scope {
            attributes: &attributes,
            parent: Some(scope),
        };
        let mut out = String::new();
        self.render_template(template, &inner, depth + 1, &mut out)?;
        Ok(out)
    }

    fn write(
        &self,
        value: &Value,
        options: &ExprOptions,
        scope: &Scope<'_>,
        depth: usize,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let null = match &options.null {
            Some(expr) => Some(self.eval(expr, scope, depth)?.to_string()),
            None => None,
        };

        match value {
            Value::Null => {
                if let Some(null) = &null {
                    out.push_str(null);
                }
            }
            Value::List(_) | Value::Map(_) => {
                let separator = match &options.separator {
                    Some(expr) => self.eval(expr, scope, depth)?.to_string(),
                    None => String::new(),
                };
                let mut first = true;
                for item in value.iter() {
                    let text = match (&item, &null) {
                        (Value::Null, Some(null)) => null.clone(),
                        (Value::Null, None) => continue,
                        _ => item.to_string(),
                    };
                    if !first {
                        out.push_str(&separator);
                    }
                    first = false;
                    out.push_str(&text);
                }
            }
            scalar => out.push_str(&scalar.to_string()),
        }
        Ok(())
    }
}
