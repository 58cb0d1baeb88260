//! Per-identity statement resolution with a shared fallback group

use std::sync::Arc;

use crate::template::TemplateGroup;
use crate::Error;

use super::cache::LoadOnceMap;
use super::factory::Locators;
use super::identity::TypeIdentity;
use super::resolver::GroupResolver;
use super::{StatementContext, StatementResolver};

/// Resolves each statement against the group of the context's identity
///
/// Contexts without an identity use the fallback group. With caching on, the
/// resolver built for an identity is kept for later calls; with it off, the
/// identity's group is located and loaded again on every call.
#[derive(Debug)]
pub struct PerIdentityResolver {
    locators: Locators,
    use_cache: bool,
    fallback: Arc<TemplateGroup>,
    fallback_resolver: GroupResolver,
    resolvers: LoadOnceMap<TypeIdentity, GroupResolver>,
}

impl PerIdentityResolver {
    pub(crate) fn new(locators: Locators, use_cache: bool, fallback: Arc<TemplateGroup>) -> Self {
        Self {
            locators,
            use_cache,
            fallback_resolver: GroupResolver::fixed(Arc::clone(&fallback)),
            fallback,
            resolvers: LoadOnceMap::new(),
        }
    }

    pub fn fallback(&self) -> &Arc<TemplateGroup> {
        &self.fallback
    }

    pub fn uses_cache(&self) -> bool {
        self.use_cache
    }

    /// Number of identities with a memoized resolver
    pub fn resolved_identities(&self) -> usize {
        self.resolvers.len()
    }

    fn resolver_for(&self, identity: &TypeIdentity) -> Result<Arc<GroupResolver>, Error> {
        self.resolvers.get_or_load(identity, self.use_cache, || {
            self.locators.resolver_for_type(identity, self.use_cache)
        })
    }
}

impl StatementResolver for PerIdentityResolver {
    fn render(&self, name: &str, ctx: &StatementContext) -> Result<String, Error> {
        match ctx.identity() {
            Some(identity) => self.resolver_for(identity)?.render(name, ctx),
            None => {
                tracing::trace!(statement = name, "no identity, using fallback group");
                self.fallback_resolver.render(name, ctx)
            }
        }
    }
}
