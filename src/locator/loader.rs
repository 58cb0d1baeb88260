//! Resource loading for template group files

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Encoding;

use super::identity::Locator;

/// A group resource could not be found or read
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("template group '{path}' not found (searched: {})", .searched.join(", "))]
    NotFound { path: String, searched: Vec<String> },

    #[error("failed to read {locator}: {source}")]
    Read {
        locator: Locator,
        #[source]
        source: io::Error,
    },

    #[error("{locator} is not valid {encoding:?} text")]
    Decode { locator: Locator, encoding: Encoding },

    #[error("{0} cannot be read by this loader")]
    Unsupported(Locator),
}

/// Finds group resources and reads their bytes
pub trait ResourceLoader: Send + Sync + fmt::Debug {
    /// Map a resource path to the locator of an existing resource
    fn resolve(&self, path: &str) -> Result<Locator, ResourceError>;

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, ResourceError>;

    /// Read and decode a resource
    fn read_text(&self, locator: &Locator, encoding: Encoding) -> Result<String, ResourceError> {
        let bytes = self.read(locator)?;
        encoding.decode(bytes).ok_or_else(|| ResourceError::Decode {
            locator: locator.clone(),
            encoding,
        })
    }
}

impl<L: ResourceLoader + ?Sized> ResourceLoader for std::sync::Arc<L> {
    fn resolve(&self, path: &str) -> Result<Locator, ResourceError> {
        (**self).resolve(path)
    }

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, ResourceError> {
        (**self).read(locator)
    }
}

/// Loads groups from the filesystem
///
/// Relative paths, and paths with a leading `/`, are looked up under each root
/// in order. An absolute path that matches no root is then tried as is, and
/// `file://` references are only ever used as is.
#[derive(Debug, Clone, Default)]
pub struct FileSystemLoader {
    roots: Vec<PathBuf>,
}

impl FileSystemLoader {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn candidates(&self, path: &str) -> Vec<PathBuf> {
        if let Some(direct) = path.strip_prefix("file://") {
            return vec![PathBuf::from(direct)];
        }

        let relative = path.trim_start_matches('/');
        let mut candidates: Vec<PathBuf> =
            self.roots.iter().map(|root| root.join(relative)).collect();
        let as_given = Path::new(path);
        if as_given.is_absolute() || self.roots.is_empty() {
            candidates.push(as_given.to_path_buf());
        }
        candidates
    }
}

impl ResourceLoader for FileSystemLoader {
    fn resolve(&self, path: &str) -> Result<Locator, ResourceError> {
        let candidates = self.candidates(path);
        for candidate in &candidates {
            if !candidate.is_file() {
                continue;
            }
            let canonical = candidate
                .canonicalize()
                .map_err(|source| ResourceError::Read {
                    locator: Locator::file(candidate),
                    source,
                })?;
            tracing::trace!(path, resolved = %canonical.display(), "resolved group resource");
            return Ok(Locator::file(&canonical));
        }

        Err(ResourceError::NotFound {
            path: path.to_string(),
            searched: candidates
                .iter()
                .map(|c| c.display().to_string())
                .collect(),
        })
    }

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, ResourceError> {
        let path = locator
            .file_path()
            .ok_or_else(|| ResourceError::Unsupported(locator.clone()))?;
        fs::read(&path).map_err(|source| ResourceError::Read {
            locator: locator.clone(),
            source,
        })
    }
}

/// Serves groups from memory, e.g. files bundled with `include_str!`
#[derive(Debug, Clone, Default)]
pub struct EmbeddedLoader {
    resources: HashMap<String, String>,
}

impl EmbeddedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: &str, text: impl Into<String>) {
        self.resources
            .insert(path.trim_start_matches('/').to_string(), text.into());
    }
}

impl ResourceLoader for EmbeddedLoader {
    fn resolve(&self, path: &str) -> Result<Locator, ResourceError> {
        let key = path.trim_start_matches('/');
        if self.resources.contains_key(key) {
            Ok(Locator::embedded(key))
        } else {
            Err(ResourceError::NotFound {
                path: path.to_string(),
                searched: vec![Locator::embedded(key).to_string()],
            })
        }
    }

    fn read(&self, locator: &Locator) -> Result<Vec<u8>, ResourceError> {
        locator
            .embedded_path()
            .and_then(|key| self.resources.get(key))
            .map(|text| text.clone().into_bytes())
            .ok_or_else(|| ResourceError::Unsupported(locator.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileSystemLoader) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("p")).unwrap();
        fs::write(dir.path().join("p/Foo.sql.stg"), "q() ::= \"select 1\"").unwrap();
        let loader = FileSystemLoader::new([dir.path()]);
        (dir, loader)
    }

    #[test]
    fn test_resolve_relative_and_root_relative() {
        let (_dir, loader) = setup();
        let relative = loader.resolve("p/Foo.sql.stg").unwrap();
        let rooted = loader.resolve("/p/Foo.sql.stg").unwrap();
        assert_eq!(relative, rooted);
        assert!(relative.as_str().starts_with("file://"));
    }

    #[test]
    fn test_resolve_absolute_and_file_reference() {
        let (dir, loader) = setup();
        let absolute = dir.path().join("p/Foo.sql.stg");
        let by_path = loader.resolve(&absolute.display().to_string()).unwrap();
        let by_ref = loader.resolve(by_path.as_str()).unwrap();
        assert_eq!(by_path, by_ref);
    }

    #[test]
    fn test_not_found_lists_candidates() {
        let (_dir, loader) = setup();
        let err = loader.resolve("p/Missing.sql.stg").unwrap_err();
        match err {
            ResourceError::NotFound { path, searched } => {
                assert_eq!(path, "p/Missing.sql.stg");
                assert_eq!(searched.len(), 1);
                assert!(searched[0].ends_with("Missing.sql.stg"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_read_text() {
        let (_dir, loader) = setup();
        let locator = loader.resolve("p/Foo.sql.stg").unwrap();
        assert_eq!(
            loader.read_text(&locator, Encoding::Utf8).unwrap(),
            "q() ::= \"select 1\""
        );
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let (dir, loader) = setup();
        fs::write(dir.path().join("bad.sql.stg"), [0xff, 0xfe, 0x00]).unwrap();
        let locator = loader.resolve("bad.sql.stg").unwrap();
        assert!(matches!(
            loader.read_text(&locator, Encoding::Utf8),
            Err(ResourceError::Decode { .. })
        ));
    }

    #[test]
    fn test_embedded() {
        let loader = EmbeddedLoader::new().with("/p/A.sql.stg", "a() ::= \"A\"");
        let locator = loader.resolve("p/A.sql.stg").unwrap();
        assert_eq!(locator, Locator::embedded("p/A.sql.stg"));
        assert_eq!(loader.read(&locator).unwrap(), b"a() ::= \"A\"".to_vec());
        assert!(matches!(
            loader.resolve("p/B.sql.stg"),
            Err(ResourceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_loader_rejects_foreign_locator() {
        let loader = EmbeddedLoader::new();
        assert!(matches!(
            loader.read(&Locator::file(Path::new("/x"))),
            Err(ResourceError::Unsupported(_))
        ));
    }
}
