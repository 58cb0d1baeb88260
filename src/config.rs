//! Locator configuration
//!
//! Settings shared by every resolver a [`crate::Locators`] factory hands out:
//! the placeholder delimiter pair, the resource encoding, the default cache
//! policy, the group file suffix and the resource roots. Configuration can be
//! built in code or loaded from TOML:
//!
//! ```toml
//! use_cache = false
//! suffix = ".sql.stg"
//! roots = ["sql", "/opt/app/sql"]
//!
//! [delimiters]
//! start = "$"
//! stop = "$"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Suffix appended to a type's derived name to find its template group
pub const DEFAULT_SUFFIX: &str = ".sql.stg";

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Start/stop characters that surround expressions in template bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct Delimiters {
    pub start: char,
    pub stop: char,
}

impl Delimiters {
    pub const fn new(start: char, stop: char) -> Self {
        Self { start, stop }
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new('<', '>')
    }
}

/// Character encoding of template group resources
///
/// Rust strings are UTF-8, so that is the only encoding accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "UTF-8", alias = "utf-8", alias = "utf8", alias = "UTF8")]
    Utf8,
}

impl Encoding {
    /// Decode raw resource bytes, returning `None` on malformed input
    pub fn decode(self, bytes: Vec<u8>) -> Option<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes).ok(),
        }
    }
}

/// Configuration for a locator factory
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocatorConfig {
    /// Delimiters used when a group file does not declare its own
    pub delimiters: Delimiters,
    /// Encoding of group resources
    pub encoding: Encoding,
    /// Default cache policy for call sites that don't choose one
    pub use_cache: bool,
    /// Suffix appended to type-derived resource paths
    pub suffix: String,
    /// Directories searched, in order, for relative resource paths
    pub roots: Vec<PathBuf>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            encoding: Encoding::default(),
            use_cache: true,
            suffix: DEFAULT_SUFFIX.to_string(),
            roots: Vec::new(),
        }
    }
}

impl LocatorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Set the delimiter pair
    pub fn with_delimiters(mut self, start: char, stop: char) -> Self {
        self.delimiters = Delimiters::new(start, stop);
        self
    }

    /// Set the default cache policy
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Set the suffix for type-derived resource paths
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Add a resource root directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LocatorConfig::default();
        assert_eq!(config.delimiters, Delimiters::new('<', '>'));
        assert_eq!(config.encoding, Encoding::Utf8);
        assert!(config.use_cache);
        assert_eq!(config.suffix, ".sql.stg");
        assert!(config.roots.is_empty());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
use_cache = false
suffix = ".stg"
encoding = "utf-8"
roots = ["sql", "/opt/sql"]

[delimiters]
start = "$"
stop = "$"
"#;
        let config = LocatorConfig::from_str(toml_str).expect("Should parse");
        assert_eq!(config.delimiters, Delimiters::new('$', '$'));
        assert!(!config.use_cache);
        assert_eq!(config.suffix, ".stg");
        assert_eq!(
            config.roots,
            vec![PathBuf::from("sql"), PathBuf::from("/opt/sql")]
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LocatorConfig::from_str("use_cache = false").expect("Should parse");
        assert!(!config.use_cache);
        assert_eq!(config.delimiters, Delimiters::default());
        assert_eq!(config.suffix, DEFAULT_SUFFIX);
    }

    #[test]
    fn test_unsupported_encoding_rejected() {
        let result = LocatorConfig::from_str(r#"encoding = "ISO-8859-1""#);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_multi_char_delimiter_rejected() {
        let result = LocatorConfig::from_str("[delimiters]\nstart = \"<<\"\nstop = \">\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_builder() {
        let config = LocatorConfig::new()
            .with_delimiters('«', '»')
            .with_cache(false)
            .with_suffix(".stg")
            .with_root("templates");
        assert_eq!(config.delimiters.start, '«');
        assert!(!config.use_cache);
        assert_eq!(config.suffix, ".stg");
        assert_eq!(config.roots, vec![PathBuf::from("templates")]);
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert_eq!(Encoding::Utf8.decode(vec![0xff, 0xfe]), None);
        assert_eq!(Encoding::Utf8.decode(b"ok".to_vec()), Some("ok".to_string()));
    }
}
