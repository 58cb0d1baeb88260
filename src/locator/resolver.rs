//! Rendering statements against a single template group

use std::fmt;
use std::sync::Arc;

use crate::template::{Binding, TemplateGroup};
use crate::Error;

use super::{StatementContext, StatementResolver};

/// Picks a group from the statement context
pub type GroupProvider = dyn Fn(&StatementContext) -> Result<Arc<TemplateGroup>, Error> + Send + Sync;

/// Where a [`GroupResolver`] gets its group from
#[derive(Clone)]
pub enum GroupSource {
    /// The same group for every call
    Fixed(Arc<TemplateGroup>),
    /// A group chosen per call from the context
    Dynamic(Arc<GroupProvider>),
}

impl GroupSource {
    fn resolve(&self, ctx: &StatementContext) -> Result<Arc<TemplateGroup>, Error> {
        match self {
            GroupSource::Fixed(group) => Ok(Arc::clone(group)),
            GroupSource::Dynamic(provider) => provider(ctx),
        }
    }
}

impl fmt::Debug for GroupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupSource::Fixed(group) => f.debug_tuple("Fixed").field(&group.name()).finish(),
            GroupSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Resolves statements against one group
///
/// A name the group doesn't define is rendered as a template of its own, so
/// inline statement text can go through the same call as named statements.
/// Context attributes are bound opportunistically: a template that declares
/// only some of them still renders.
#[derive(Debug, Clone)]
pub struct GroupResolver {
    source: GroupSource,
}

impl GroupResolver {
    pub fn new(source: GroupSource) -> Self {
        Self { source }
    }

    pub fn fixed(group: Arc<TemplateGroup>) -> Self {
        Self::new(GroupSource::Fixed(group))
    }

    pub fn dynamic<F>(provider: F) -> Self
    where
        F: Fn(&StatementContext) -> Result<Arc<TemplateGroup>, Error> + Send + Sync + 'static,
    {
        Self::new(GroupSource::Dynamic(Arc::new(provider)))
    }

    pub fn source(&self) -> &GroupSource {
        &self.source
    }
}

impl StatementResolver for GroupResolver {
    fn render(&self, name: &str, ctx: &StatementContext) -> Result<String, Error> {
        let group = self.source.resolve(ctx)?;

        let instance = match group.instance_of(name) {
            Some(instance) => instance,
            None => {
                tracing::debug!(
                    group = group.name(),
                    statement = name,
                    "no template by this name, rendering it as literal text"
                );
                group.literal(name)
            }
        };

        let mut instance = instance.with_binding(Binding::Opportunistic);
        instance.add_all(ctx.attributes())?;
        let text = instance.render()?;

        tracing::trace!(group = group.name(), statement = name, "rendered statement");
        Ok(text)
    }
}
