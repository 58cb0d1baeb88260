//! Construction of statement resolvers

use std::sync::Arc;

use crate::config::LocatorConfig;
use crate::template::TemplateGroup;
use crate::Error;

use super::cache::GroupCache;
use super::identity::{Locator, TypeIdentity};
use super::loader::{FileSystemLoader, ResourceLoader};
use super::per_identity::PerIdentityResolver;
use super::resolver::GroupResolver;
use super::StatementContext;

/// Builds resolvers that share one loader and one group cache
///
/// Cloning is cheap and clones share the cache. Factories created separately
/// have separate caches unless given the same one with
/// [`Locators::with_cache`].
#[derive(Debug, Clone)]
pub struct Locators {
    config: LocatorConfig,
    loader: Arc<dyn ResourceLoader>,
    cache: Arc<GroupCache>,
}

impl Locators {
    /// Factory loading groups from the filesystem under `config.roots`
    pub fn new(config: LocatorConfig) -> Self {
        let loader = FileSystemLoader::new(config.roots.clone());
        Self::with_loader(config, loader)
    }

    pub fn with_loader(config: LocatorConfig, loader: impl ResourceLoader + 'static) -> Self {
        Self {
            config,
            loader: Arc::new(loader),
            cache: Arc::new(GroupCache::new()),
        }
    }

    /// Use `cache` instead of this factory's own
    pub fn with_cache(mut self, cache: Arc<GroupCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<GroupCache> {
        &self.cache
    }

    pub fn loader(&self) -> &Arc<dyn ResourceLoader> {
        &self.loader
    }

    /// Locator of the group file belonging to `identity`
    pub fn locate_type(&self, identity: &TypeIdentity) -> Result<Locator, Error> {
        let path = identity.resource_path(&self.config.suffix);
        Ok(self.loader.resolve(&path)?)
    }

    pub fn locate_path(&self, path: &str) -> Result<Locator, Error> {
        Ok(self.loader.resolve(path)?)
    }

    /// Read and parse a group, bypassing the cache
    pub fn load_group(&self, locator: &Locator) -> Result<TemplateGroup, Error> {
        tracing::debug!(%locator, "loading template group");
        let text = self.loader.read_text(locator, self.config.encoding)?;
        Ok(TemplateGroup::from_source(
            locator.to_string(),
            &text,
            self.config.delimiters,
        )?)
    }

    /// The group at `locator`, from the cache when `use_cache` is set
    pub fn group(&self, locator: &Locator, use_cache: bool) -> Result<Arc<TemplateGroup>, Error> {
        self.cache
            .get_or_load(locator, use_cache, || self.load_group(locator))
    }

    pub fn resolver_for_type(
        &self,
        identity: &TypeIdentity,
        use_cache: bool,
    ) -> Result<GroupResolver, Error> {
        let locator = self.locate_type(identity)?;
        self.resolver_for_locator(&locator, use_cache)
    }

    pub fn resolver_for_path(&self, path: &str, use_cache: bool) -> Result<GroupResolver, Error> {
        let locator = self.locate_path(path)?;
        self.resolver_for_locator(&locator, use_cache)
    }

    pub fn resolver_for_locator(
        &self,
        locator: &Locator,
        use_cache: bool,
    ) -> Result<GroupResolver, Error> {
        Ok(GroupResolver::fixed(self.group(locator, use_cache)?))
    }

    /// Resolver whose group is chosen per call by `provider`
    ///
    /// The provider's groups never go through the cache.
    pub fn resolver_with_dynamic_group<F>(&self, provider: F) -> GroupResolver
    where
        F: Fn(&StatementContext) -> Result<Arc<TemplateGroup>, Error> + Send + Sync + 'static,
    {
        GroupResolver::dynamic(provider)
    }

    pub fn per_identity_resolver(
        &self,
        use_cache: bool,
        fallback: Arc<TemplateGroup>,
    ) -> PerIdentityResolver {
        PerIdentityResolver::new(self.clone(), use_cache, fallback)
    }

    /// Per-identity resolver whose fallback group is loaded from `path`
    pub fn per_identity_resolver_with_fallback_path(
        &self,
        use_cache: bool,
        path: &str,
    ) -> Result<PerIdentityResolver, Error> {
        let locator = self.locate_path(path)?;
        let fallback = self.group(&locator, use_cache)?;
        Ok(self.per_identity_resolver(use_cache, fallback))
    }

    /// [`Locators::resolver_for_type`] with the configured cache policy
    pub fn resolver_for_type_default(
        &self,
        identity: &TypeIdentity,
    ) -> Result<GroupResolver, Error> {
        self.resolver_for_type(identity, self.config.use_cache)
    }

    /// [`Locators::resolver_for_path`] with the configured cache policy
    pub fn resolver_for_path_default(&self, path: &str) -> Result<GroupResolver, Error> {
        self.resolver_for_path(path, self.config.use_cache)
    }

    /// [`Locators::per_identity_resolver`] with the configured cache policy
    pub fn per_identity_resolver_default(
        &self,
        fallback: Arc<TemplateGroup>,
    ) -> PerIdentityResolver {
        self.per_identity_resolver(self.config.use_cache, fallback)
    }

    /// Empty group with the configured delimiters
    pub fn empty_group(&self) -> Arc<TemplateGroup> {
        Arc::new(TemplateGroup::empty(self.config.delimiters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{EmbeddedLoader, StatementResolver};

    fn loader() -> EmbeddedLoader {
        EmbeddedLoader::new()
            .with("p/Outer.Inner.sql.stg", r#"q() ::= "select inner""#)
            .with("base.sql.stg", r#"q() ::= "select base""#)
            .with("broken.sql.stg", "q( ::=")
    }

    fn factory() -> Locators {
        Locators::with_loader(LocatorConfig::default(), loader())
    }

    #[test]
    fn test_resolver_for_nested_type() {
        let locators = factory();
        let identity = TypeIdentity::new("p", "Outer$Inner", "$");
        assert_eq!(
            locators.locate_type(&identity).unwrap(),
            Locator::embedded("p/Outer.Inner.sql.stg")
        );
        let resolver = locators.resolver_for_type(&identity, true).unwrap();
        assert_eq!(
            resolver.render("q", &StatementContext::new()).unwrap(),
            "select inner"
        );
    }

    #[test]
    fn test_cached_groups_are_shared() {
        let locators = factory();
        let locator = locators.locate_path("/base.sql.stg").unwrap();
        let first = locators.group(&locator, true).unwrap();
        let second = locators.clone().group(&locator, true).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(locators.cache().len(), 1);
    }

    #[test]
    fn test_uncached_groups_are_fresh() {
        let locators = factory();
        let locator = locators.locate_path("base.sql.stg").unwrap();
        let first = locators.group(&locator, false).unwrap();
        let second = locators.group(&locator, false).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(locators.cache().is_empty());
    }

    #[test]
    fn test_shared_cache_between_factories() {
        let cache = Arc::new(GroupCache::new());
        let one = factory().with_cache(Arc::clone(&cache));
        let two = factory().with_cache(Arc::clone(&cache));
        let locator = one.locate_path("base.sql.stg").unwrap();
        assert!(Arc::ptr_eq(
            &one.group(&locator, true).unwrap(),
            &two.group(&locator, true).unwrap()
        ));
    }

    #[test]
    fn test_parse_failure_is_not_cached() {
        let locators = factory();
        let err = locators.resolver_for_path("broken.sql.stg", true).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(locators.cache().is_empty());
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let err = factory().resolver_for_path("nope.sql.stg", true).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_fallback_path() {
        let resolver = factory()
            .per_identity_resolver_with_fallback_path(true, "base.sql.stg")
            .unwrap();
        assert_eq!(
            resolver.render("q", &StatementContext::new()).unwrap(),
            "select base"
        );
    }

    #[test]
    fn test_empty_fallback_renders_literals() {
        let locators = factory();
        let resolver = locators.per_identity_resolver(true, locators.empty_group());
        let ctx = StatementContext::new().with_attribute("n", 1);
        assert_eq!(resolver.render("select <n>", &ctx).unwrap(), "select 1");
    }

    #[test]
    fn test_default_policy_follows_config() {
        let config = LocatorConfig::from_str("use_cache = false").unwrap();
        let locators = Locators::with_loader(config, loader());
        let identity = TypeIdentity::new("p", "Outer$Inner", "$");
        let ctx = StatementContext::new();

        let by_type = locators.resolver_for_type_default(&identity).unwrap();
        assert_eq!(by_type.render("q", &ctx).unwrap(), "select inner");
        let by_path = locators.resolver_for_path_default("base.sql.stg").unwrap();
        assert_eq!(by_path.render("q", &ctx).unwrap(), "select base");
        assert!(locators.cache().is_empty());

        let per_identity = locators.per_identity_resolver_default(locators.empty_group());
        assert!(!per_identity.uses_cache());
        let inner = StatementContext::new().with_identity(identity);
        assert_eq!(per_identity.render("q", &inner).unwrap(), "select inner");
        assert_eq!(per_identity.resolved_identities(), 0);
        assert!(locators.cache().is_empty());
    }

    #[test]
    fn test_default_policy_caches_by_default() {
        let locators = factory();
        locators.resolver_for_path_default("base.sql.stg").unwrap();
        let per_identity = locators.per_identity_resolver_default(locators.empty_group());
        assert!(per_identity.uses_cache());
        assert_eq!(locators.cache().len(), 1);
    }
}
