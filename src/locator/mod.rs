//! Statement resolution over cached template groups
//!
//! A [`StatementResolver`] turns a statement name and a [`StatementContext`]
//! into rendered text. [`Locators`] builds resolvers for a type, a resource
//! path or a locator, and per-identity resolvers that pick the group from the
//! context's [`TypeIdentity`].

mod cache;
mod factory;
mod identity;
mod loader;
mod per_identity;
mod resolver;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::template::Value;
use crate::Error;

pub use cache::{GroupCache, LoadOnceMap};
pub use factory::Locators;
pub use identity::{Locator, TypeIdentity};
pub use loader::{EmbeddedLoader, FileSystemLoader, ResourceError, ResourceLoader};
pub use per_identity::PerIdentityResolver;
pub use resolver::{GroupProvider, GroupResolver, GroupSource};

/// Named attribute values bound into a statement
pub type AttributeBag = BTreeMap<String, Value>;

/// Per-call inputs to statement resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementContext {
    identity: Option<TypeIdentity>,
    attributes: AttributeBag,
}

impl StatementContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose identity is the Rust type `T`
    pub fn for_type<T: ?Sized>() -> Self {
        Self::new().with_identity(TypeIdentity::of::<T>())
    }

    pub fn with_identity(mut self, identity: TypeIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Set an attribute, returning the value it replaced
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.attributes.insert(name.into(), value.into())
    }

    pub fn identity(&self) -> Option<&TypeIdentity> {
        self.identity.as_ref()
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &AttributeBag {
        &self.attributes
    }
}

impl From<AttributeBag> for StatementContext {
    fn from(attributes: AttributeBag) -> Self {
        Self {
            identity: None,
            attributes,
        }
    }
}

/// Resolves statement names to rendered text
pub trait StatementResolver: Send + Sync {
    fn render(&self, name: &str, ctx: &StatementContext) -> Result<String, Error>;
}

impl<R: StatementResolver + ?Sized> StatementResolver for Arc<R> {
    fn render(&self, name: &str, ctx: &StatementContext) -> Result<String, Error> {
        (**self).render(name, ctx)
    }
}

impl<R: StatementResolver + ?Sized> StatementResolver for Box<R> {
    fn render(&self, name: &str, ctx: &StatementContext) -> Result<String, Error> {
        (**self).render(name, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dao;

    #[test]
    fn test_context_builder() {
        let ctx = StatementContext::for_type::<Dao>()
            .with_attribute("table", "users")
            .with_attribute("limit", 10);
        assert_eq!(ctx.identity().map(|i| i.name()), Some("Dao"));
        assert_eq!(ctx.attribute("table"), Some(&Value::from("users")));
        assert_eq!(ctx.attributes().len(), 2);
    }

    #[test]
    fn test_set_attribute_last_write_wins() {
        let mut ctx = StatementContext::new();
        assert_eq!(ctx.set_attribute("a", 1), None);
        assert_eq!(ctx.set_attribute("a", 2), Some(Value::Int(1)));
        assert_eq!(ctx.attribute("a"), Some(&Value::Int(2)));
        assert!(ctx.identity().is_none());
    }
}
