//! Path resolution collaborator
//!
//! The registry is keyed by canonical absolute paths. Turning whatever a
//! caller passes in into that form is delegated to a [`PathResolver`], so
//! mount-aware resolvers can be slotted in without touching the tree.

use alloc::string::{String, ToString};
use core::fmt::{self, Debug};

use crate::error::{DevfsError, Result};

/// Canonical absolute path: `/` followed by non-empty components
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPath {
    full: String,
}

impl CanonicalPath {
    /// The root directory
    pub fn root() -> Self {
        Self {
            full: String::from("/"),
        }
    }

    /// Build a path from its components
    ///
    /// # Errors
    /// Returns `InvalidPath` if a component is empty, `.`, `..` or contains `/`
    pub fn from_components<'a, I>(components: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut full = String::new();
        for component in components {
            if let Some(reason) = component_error(component) {
                full.push('/');
                full.push_str(component);
                return Err(DevfsError::InvalidPath { path: full, reason });
            }
            full.push('/');
            full.push_str(component);
        }

        if full.is_empty() {
            return Ok(Self::root());
        }
        Ok(Self { full })
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }

    pub fn is_root(&self) -> bool {
        self.full == "/"
    }

    /// Path components, root first
    pub fn components(&self) -> impl Iterator<Item = &str> + '_ {
        self.full.split('/').filter(|c| !c.is_empty())
    }

    /// Last component, `None` for the root
    pub fn file_name(&self) -> Option<&str> {
        self.components().last()
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

fn component_error(component: &str) -> Option<&'static str> {
    if component.is_empty() {
        Some("empty path component")
    } else if component.contains('/') {
        Some("component contains a separator")
    } else if component == "." || component == ".." {
        Some("relative component")
    } else if component.contains('\0') {
        Some("component contains NUL")
    } else {
        None
    }
}

/// Turns caller-supplied path strings into registry keys
pub trait PathResolver: Send + Sync + Debug {
    /// Canonicalise `path`
    ///
    /// # Errors
    /// Returns `InvalidPath` when `path` cannot name a registry node
    fn canonicalize(&self, path: &str) -> Result<CanonicalPath>;
}

/// Default resolver for absolute pseudo-filesystem paths
///
/// - path must start with `/`
/// - repeated and trailing separators are ignored
/// - `.` components are dropped, `..` is rejected (no parent traversal)
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsolutePathResolver;

impl PathResolver for AbsolutePathResolver {
    fn canonicalize(&self, path: &str) -> Result<CanonicalPath> {
        let invalid = |reason| DevfsError::InvalidPath {
            path: path.to_string(),
            reason,
        };

        if path.is_empty() {
            return Err(invalid("empty path"));
        }
        if !path.starts_with('/') {
            return Err(invalid("path is not absolute"));
        }

        let mut components = path.split('/').filter(|c| !c.is_empty() && *c != ".");
        if components.clone().any(|c| c == "..") {
            return Err(invalid("parent traversal not supported"));
        }
        CanonicalPath::from_components(&mut components).map_err(|err| match err {
            DevfsError::InvalidPath { reason, .. } => invalid(reason),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn canon(path: &str) -> Result<CanonicalPath> {
        AbsolutePathResolver.canonicalize(path)
    }

    #[test]
    fn test_canonical_paths() {
        assert_eq!(canon("/dev/mtd0").unwrap().as_str(), "/dev/mtd0");
        assert_eq!(canon("//dev///mtd0/").unwrap().as_str(), "/dev/mtd0");
        assert_eq!(canon("/dev/./mtd0").unwrap().as_str(), "/dev/mtd0");
        assert!(canon("/").unwrap().is_root());
        assert!(canon("///").unwrap().is_root());
    }

    #[test]
    fn test_rejected_paths() {
        assert!(matches!(canon(""), Err(DevfsError::InvalidPath { .. })));
        assert!(matches!(canon("dev/mtd0"), Err(DevfsError::InvalidPath { .. })));
        assert!(matches!(
            canon("/dev/../etc"),
            Err(DevfsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_components_and_file_name() {
        let path = canon("/dev/mtd/flash0").unwrap();
        let components: Vec<&str> = path.components().collect();
        assert_eq!(components, ["dev", "mtd", "flash0"]);
        assert_eq!(path.file_name(), Some("flash0"));
        assert_eq!(CanonicalPath::root().file_name(), None);
    }

    #[test]
    fn test_from_components_validates() {
        assert!(CanonicalPath::from_components(["dev", "sda"]).is_ok());
        assert!(CanonicalPath::from_components(["dev", ""]).is_err());
        assert!(CanonicalPath::from_components(["dev", "a/b"]).is_err());
        assert!(CanonicalPath::from_components(core::iter::empty())
            .unwrap()
            .is_root());
    }
}
