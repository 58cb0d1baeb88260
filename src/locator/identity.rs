//! Type identities and the group locators derived from them

use std::fmt;
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";
const EMBEDDED_SCHEME: &str = "embedded:/";

/// Stable key naming where a template group lives
///
/// Filesystem groups are `file://<canonical path>`, embedded groups are
/// `embedded:/<path>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator(String);

impl Locator {
    pub fn file(path: &Path) -> Self {
        Locator(format!("{}{}", FILE_SCHEME, path.display()))
    }

    pub fn embedded(path: &str) -> Self {
        Locator(format!("{}{}", EMBEDDED_SCHEME, path.trim_start_matches('/')))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem path of a `file://` locator
    pub fn file_path(&self) -> Option<PathBuf> {
        self.0.strip_prefix(FILE_SCHEME).map(PathBuf::from)
    }

    /// Resource path of an `embedded:/` locator
    pub fn embedded_path(&self) -> Option<&str> {
        self.0.strip_prefix(EMBEDDED_SCHEME)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Namespace and (possibly nested) name of a statement owner type
///
/// Nested names use `.` between levels regardless of how the owner spelled
/// them, so `Outer$Inner` and `Outer::Inner` both become `Outer.Inner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdentity {
    namespace: String,
    name: String,
}

impl TypeIdentity {
    /// Build an identity from its components, normalizing `separator` in
    /// `nested_name` to `.`
    pub fn new(namespace: impl Into<String>, nested_name: &str, separator: &str) -> Self {
        let name = if separator.is_empty() {
            nested_name.to_string()
        } else {
            nested_name.replace(separator, ".")
        };
        Self {
            namespace: namespace.into(),
            name,
        }
    }

    /// Identity of a Rust type: module path as namespace, type name as name
    ///
    /// Generic arguments are dropped, so `dao::UserDao<Pg>` maps to the same
    /// group as `dao::UserDao`. References, raw pointers and `dyn` map to the
    /// type they point at. Tuples, slices and arrays have no module path and
    /// are not supported.
    pub fn of<T: ?Sized>() -> Self {
        let full = strip_indirection(std::any::type_name::<T>());
        let base = full.split('<').next().unwrap_or(full);
        match base.rsplit_once("::") {
            Some((namespace, name)) => Self::new(namespace, name, "::"),
            None => Self::new("", base, "::"),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Relative resource path of this identity's group file
    ///
    /// ```
    /// use stg_locator::locator::TypeIdentity;
    ///
    /// let identity = TypeIdentity::new("p", "Outer$Inner", "$");
    /// assert_eq!(identity.resource_path(".sql.stg"), "p/Outer.Inner.sql.stg");
    /// ```
    pub fn resource_path(&self, suffix: &str) -> String {
        let mut path: String = self
            .namespace
            .split("::")
            .flat_map(|segment| segment.split('.'))
            .filter(|segment| !segment.is_empty())
            .map(|segment| format!("{}/", segment))
            .collect();
        path.push_str(&self.name);
        path.push_str(suffix);
        path
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

fn strip_indirection(mut name: &str) -> &str {
    loop {
        let stripped = name
            .trim_start_matches(['&', '*'])
            .trim_start_matches("mut ")
            .trim_start_matches("const ")
            .trim_start_matches("dyn ");
        if stripped == name {
            return name;
        }
        name = stripped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod dao {
        pub struct UserDao;
        pub struct Generic<T>(pub T);
    }

    #[test]
    fn test_nested_separator_is_normalized() {
        let identity = TypeIdentity::new("p", "Outer$Inner", "$");
        assert_eq!(identity.name(), "Outer.Inner");
        assert_eq!(identity.resource_path(".sql.stg"), "p/Outer.Inner.sql.stg");
    }

    #[test]
    fn test_dotted_namespace() {
        let identity = TypeIdentity::new("com.example", "Foo", "$");
        assert_eq!(identity.resource_path(".sql.stg"), "com/example/Foo.sql.stg");
        assert_eq!(identity.to_string(), "com.example.Foo");
    }

    #[test]
    fn test_empty_namespace() {
        let identity = TypeIdentity::new("", "Foo", "$");
        assert_eq!(identity.resource_path(".stg"), "Foo.stg");
        assert_eq!(identity.to_string(), "Foo");
    }

    #[test]
    fn test_empty_separator_keeps_name() {
        assert_eq!(TypeIdentity::new("p", "A$B", "").name(), "A$B");
    }

    #[test]
    fn test_of_rust_type() {
        let identity = TypeIdentity::of::<dao::UserDao>();
        assert_eq!(identity.name(), "UserDao");
        assert!(identity.namespace().ends_with("identity::tests::dao"));
        assert!(identity
            .resource_path(".sql.stg")
            .ends_with("locator/identity/tests/dao/UserDao.sql.stg"));
    }

    #[test]
    fn test_of_generic_type_drops_arguments() {
        assert_eq!(
            TypeIdentity::of::<dao::Generic<String>>(),
            TypeIdentity::of::<dao::Generic<u8>>()
        );
        assert_eq!(TypeIdentity::of::<dao::Generic<u8>>().name(), "Generic");
    }

    #[test]
    fn test_of_reference_uses_pointee() {
        let owned = TypeIdentity::of::<dao::UserDao>();
        assert_eq!(TypeIdentity::of::<&dao::UserDao>(), owned);
        assert_eq!(TypeIdentity::of::<&mut dao::UserDao>(), owned);
        assert_eq!(TypeIdentity::of::<*const dao::UserDao>(), owned);
        assert_eq!(TypeIdentity::of::<&&dao::Generic<u8>>().name(), "Generic");
        assert!(!owned.resource_path(".sql.stg").contains('&'));
    }

    #[test]
    fn test_locator_schemes() {
        let file = Locator::file(Path::new("/tmp/a.sql.stg"));
        assert_eq!(file.as_str(), "file:///tmp/a.sql.stg");
        assert_eq!(file.file_path(), Some(PathBuf::from("/tmp/a.sql.stg")));
        assert_eq!(file.embedded_path(), None);

        let embedded = Locator::embedded("/p/A.sql.stg");
        assert_eq!(embedded.to_string(), "embedded:/p/A.sql.stg");
        assert_eq!(embedded.embedded_path(), Some("p/A.sql.stg"));
        assert_eq!(embedded, Locator::embedded("p/A.sql.stg"));
    }
}
