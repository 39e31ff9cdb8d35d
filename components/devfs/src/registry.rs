//! Node Registry
//!
//! Owns the path tree of registered driver nodes and their reference
//! counts. Every path component is one tree level; levels that only exist
//! because something is registered beneath them are pseudo-directories and
//! are pruned when their last descendant goes away.
//!
//! ```text
//! /
//! └─ dev                  (pseudo-directory)
//!    ├─ mtd0   [MTD]      refs: 1
//!    ├─ sda    [block]    refs: 0
//!    └─ mqueue            (pseudo-directory)
//!       └─ jobs [message queue] refs: 2
//! ```
//!
//! All state sits behind one spinlock. Lookups mutate reference counts, so
//! they take the same lock as registration; each operation holds it for one
//! tree walk.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use log::{debug, warn};
use spin::{Mutex, Once};
use static_assertions::assert_impl_all;

use crate::driver::{Capability, DriverPayload};
use crate::error::{DevfsError, Result};
use crate::node::{Node, NodeRef};
use crate::path::{AbsolutePathResolver, CanonicalPath, PathResolver};

/// Default maximum number of registered nodes
pub const MAX_NODES: usize = 256;

/// Default maximum canonical path length in bytes
pub const PATH_MAX: usize = 256;

/// Default maximum path component length in bytes
pub const NAME_MAX: usize = 32;

/// Registry limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of registered nodes
    pub max_nodes: usize,
    /// Maximum canonical path length in bytes
    pub max_path_len: usize,
    /// Maximum length of one path component in bytes
    pub max_name_len: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_nodes: MAX_NODES,
            max_path_len: PATH_MAX,
            max_name_len: NAME_MAX,
        }
    }
}

/// Child listing entry returned by [`NodeRegistry::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Component name
    pub name: String,
    /// Capability of the node at this entry, `None` for a pseudo-directory
    pub capability: Option<Capability>,
    /// Whether anything is registered beneath this entry
    pub has_children: bool,
}

/// A registered node and its outstanding reference count
#[derive(Debug)]
struct Slot {
    node: Arc<Node>,
    refs: usize,
}

#[derive(Debug, Default)]
struct TreeNode {
    slot: Option<Slot>,
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    fn walk(&self, path: &CanonicalPath) -> Option<&TreeNode> {
        let mut current = self;
        for component in path.components() {
            current = current.children.get(component)?;
        }
        Some(current)
    }

    fn walk_mut(&mut self, path: &CanonicalPath) -> Option<&mut TreeNode> {
        let mut current = self;
        for component in path.components() {
            current = current.children.get_mut(component)?;
        }
        Some(current)
    }

    fn walk_or_create(&mut self, path: &CanonicalPath) -> &mut TreeNode {
        let mut current = self;
        for component in path.components() {
            current = current.children.entry(component.to_string()).or_default();
        }
        current
    }

    /// Remove the slot at `components`, pruning branches left empty
    fn take_slot(&mut self, components: &[&str]) -> Option<Slot> {
        let Some((first, rest)) = components.split_first() else {
            return self.slot.take();
        };

        let child = self.children.get_mut(*first)?;
        let slot = child.take_slot(rest);
        if child.is_vacant() {
            self.children.remove(*first);
        }
        slot
    }

    fn is_vacant(&self) -> bool {
        self.slot.is_none() && self.children.is_empty()
    }
}

#[derive(Debug, Default)]
struct Tree {
    root: TreeNode,
    len: usize,
}

impl Tree {
    fn insert(&mut self, path: CanonicalPath, payload: DriverPayload, refs: usize) -> Arc<Node> {
        let node = Arc::new(Node::new(path, payload));
        let target = self.root.walk_or_create(node.path());
        target.slot = Some(Slot {
            node: Arc::clone(&node),
            refs,
        });
        self.len += 1;
        node
    }
}

/// Path-keyed registry of driver nodes
///
/// The single source of truth for which drivers exist and how many
/// references to each are outstanding.
#[derive(Debug)]
pub struct NodeRegistry {
    config: RegistryConfig,
    resolver: Box<dyn PathResolver>,
    tree: Mutex<Tree>,
}

assert_impl_all!(NodeRegistry: Send, Sync);

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl NodeRegistry {
    /// Create an empty registry using absolute-path resolution
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_resolver(config, Box::new(AbsolutePathResolver))
    }

    /// Create an empty registry with a custom path resolver
    pub fn with_resolver(config: RegistryConfig, resolver: Box<dyn PathResolver>) -> Self {
        Self {
            config,
            resolver,
            tree: Mutex::new(Tree::default()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Resolve `path` to a registry key and apply the configured limits
    ///
    /// # Errors
    /// `InvalidPath` from the resolver, `PathTooLong` if the path or one of
    /// its components exceeds the configured limits
    pub fn canonicalize(&self, path: &str) -> Result<CanonicalPath> {
        let canonical = self.resolver.canonicalize(path)?;

        if canonical.as_str().len() > self.config.max_path_len {
            return Err(DevfsError::PathTooLong {
                path: path.to_string(),
                limit: self.config.max_path_len,
            });
        }
        if canonical
            .components()
            .any(|c| c.len() > self.config.max_name_len)
        {
            return Err(DevfsError::PathTooLong {
                path: path.to_string(),
                limit: self.config.max_name_len,
            });
        }

        Ok(canonical)
    }

    /// Register a driver at `path`
    ///
    /// Missing intermediate directories are created implicitly.
    ///
    /// # Returns
    /// The new node (uncounted; use [`lookup`](Self::lookup) to take a reference)
    ///
    /// # Errors
    /// - `AlreadyExists` if a node is already registered at `path`
    /// - `RegistryFull` if `max_nodes` nodes are registered
    /// - `InvalidPath`/`PathTooLong` if `path` cannot be a registry key
    pub fn register(&self, path: &str, payload: DriverPayload) -> Result<Arc<Node>> {
        let path = self.canonicalize(path)?;
        let capability = payload.capability();

        let mut tree = self.tree.lock();
        self.check_insertable(&tree, &path)?;
        let node = tree.insert(path, payload, 0);
        drop(tree);

        debug!("devfs: registered {} driver at {}", capability, node.path());
        Ok(node)
    }

    /// Take a counted reference to the node at `path`
    ///
    /// # Errors
    /// `NotFound` if nothing is registered at `path`
    pub fn lookup(&self, path: &str) -> Result<NodeRef<'_>> {
        let path = self.canonicalize(path)?;
        self.lookup_canonical(&path)
    }

    pub(crate) fn lookup_canonical(&self, path: &CanonicalPath) -> Result<NodeRef<'_>> {
        let mut tree = self.tree.lock();
        let slot = tree
            .root
            .walk_mut(path)
            .and_then(|entry| entry.slot.as_mut())
            .ok_or_else(|| DevfsError::NotFound {
                path: path.to_string(),
            })?;

        slot.refs += 1;
        debug!("devfs: acquired {} (refs {})", path, slot.refs);
        Ok(NodeRef::new(self, Arc::clone(&slot.node)))
    }

    /// Take a counted reference to the node at `path`, registering the
    /// payload produced by `create` first if nothing is there
    ///
    /// Lookup and creation happen under one lock hold, so two racing
    /// callers never both create. An existing node is returned whatever its
    /// capability; the caller does the type check.
    pub(crate) fn lookup_or_insert_with<F>(
        &self,
        path: &CanonicalPath,
        create: F,
    ) -> Result<NodeRef<'_>>
    where
        F: FnOnce() -> DriverPayload,
    {
        let mut tree = self.tree.lock();

        if let Some(slot) = tree.root.walk_mut(path).and_then(|e| e.slot.as_mut()) {
            slot.refs += 1;
            debug!("devfs: acquired {} (refs {})", path, slot.refs);
            return Ok(NodeRef::new(self, Arc::clone(&slot.node)));
        }

        self.check_insertable(&tree, path)?;
        let payload = create();
        let capability = payload.capability();
        let node = tree.insert(path.clone(), payload, 1);
        drop(tree);

        debug!("devfs: created {} driver at {} (refs 1)", capability, path);
        Ok(NodeRef::new(self, node))
    }

    fn check_insertable(&self, tree: &Tree, path: &CanonicalPath) -> Result<()> {
        if path.is_root() {
            return Err(DevfsError::InvalidPath {
                path: path.to_string(),
                reason: "cannot register the root directory",
            });
        }
        if tree.root.walk(path).is_some_and(|e| e.slot.is_some()) {
            return Err(DevfsError::AlreadyExists {
                path: path.to_string(),
            });
        }
        if tree.len >= self.config.max_nodes {
            return Err(DevfsError::RegistryFull {
                capacity: self.config.max_nodes,
            });
        }
        Ok(())
    }

    /// Give back a reference obtained from a lookup
    ///
    /// Equivalent to dropping `node`; spelled out for call sites that want
    /// the release to be visible.
    pub fn release(&self, node: NodeRef<'_>) {
        debug_assert!(
            core::ptr::eq(node.registry(), self),
            "devfs: releasing {} to a foreign registry",
            node.path()
        );
        drop(node);
    }

    /// Decrement the count for `node`; called once per `NodeRef`
    pub(crate) fn release_node(&self, node: &Arc<Node>) {
        let mut tree = self.tree.lock();

        // A referenced node cannot be unregistered, so the slot is still there.
        let Some(slot) = tree
            .root
            .walk_mut(node.path())
            .and_then(|e| e.slot.as_mut())
            .filter(|slot| Arc::ptr_eq(&slot.node, node))
        else {
            debug_assert!(false, "devfs: released unregistered node {}", node.path());
            return;
        };

        debug_assert!(slot.refs > 0, "devfs: refcount underflow on {}", node.path());
        slot.refs = slot.refs.saturating_sub(1);
        debug!("devfs: released {} (refs {})", node.path(), slot.refs);
    }

    /// Remove the node at `path`
    ///
    /// # Errors
    /// - `NotFound` if nothing is registered at `path`
    /// - `Busy` if references to the node are outstanding
    pub fn unregister(&self, path: &str) -> Result<()> {
        let path = self.canonicalize(path)?;
        let mut tree = self.tree.lock();

        let refs = tree
            .root
            .walk(&path)
            .and_then(|e| e.slot.as_ref())
            .map(|slot| slot.refs)
            .ok_or_else(|| DevfsError::NotFound {
                path: path.to_string(),
            })?;

        if refs > 0 {
            drop(tree);
            warn!("devfs: cannot unregister {}: {} references outstanding", path, refs);
            return Err(DevfsError::Busy {
                path: path.to_string(),
                refs,
            });
        }

        let components: Vec<&str> = path.components().collect();
        let removed = tree.root.take_slot(&components);
        debug_assert!(removed.is_some());
        tree.len -= 1;
        drop(tree);

        debug!("devfs: unregistered {}", path);
        Ok(())
    }

    /// Outstanding reference count of the node at `path`
    pub fn refs(&self, path: &str) -> Option<usize> {
        let path = self.canonicalize(path).ok()?;
        let tree = self.tree.lock();
        tree.root
            .walk(&path)
            .and_then(|e| e.slot.as_ref())
            .map(|slot| slot.refs)
    }

    /// Whether a node is registered at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.refs(path).is_some()
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.tree.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// List the immediate children of `dir`, sorted by name
    ///
    /// # Errors
    /// `NotFound` if `dir` is neither a node nor a directory
    pub fn list(&self, dir: &str) -> Result<Vec<DirEntry>> {
        let dir = self.canonicalize(dir)?;
        let tree = self.tree.lock();

        let entry = tree.root.walk(&dir).ok_or_else(|| DevfsError::NotFound {
            path: dir.to_string(),
        })?;

        Ok(entry
            .children
            .iter()
            .map(|(name, child)| DirEntry {
                name: name.clone(),
                capability: child.slot.as_ref().map(|slot| slot.node.capability()),
                has_children: !child.children.is_empty(),
            })
            .collect())
    }
}

static GLOBAL: Once<NodeRegistry> = Once::new();

/// Install the system-wide registry
///
/// Called once during boot, before drivers register. Later calls return the
/// already installed registry and ignore `config`.
pub fn init_global(config: RegistryConfig) -> &'static NodeRegistry {
    GLOBAL.call_once(|| NodeRegistry::new(config))
}

/// The system-wide registry, if [`init_global`] has run
pub fn global() -> Option<&'static NodeRegistry> {
    GLOBAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock;

    fn registry() -> NodeRegistry {
        NodeRegistry::new(RegistryConfig::default())
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry();
        let node = registry.register("/dev/mtd0", mock::mtd()).unwrap();
        assert_eq!(node.capability(), Capability::Mtd);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.refs("/dev/mtd0"), Some(0));

        let found = registry.lookup("/dev/mtd0").unwrap();
        assert!(found.payload().same_driver(node.payload()));
        assert_eq!(registry.refs("/dev/mtd0"), Some(1));

        registry.release(found);
        assert_eq!(registry.refs("/dev/mtd0"), Some(0));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = registry();
        let first = registry.register("/dev/sda", mock::block()).unwrap();

        let result = registry.register("/dev//sda/", mock::char());
        assert!(matches!(result, Err(DevfsError::AlreadyExists { .. })));

        // The original node is untouched
        let found = registry.lookup("/dev/sda").unwrap();
        assert_eq!(found.capability(), Capability::Block);
        assert!(found.payload().same_driver(first.payload()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_missing() {
        let registry = registry();
        registry.register("/dev/mtd0", mock::mtd()).unwrap();

        assert!(matches!(
            registry.lookup("/dev/mtd9"),
            Err(DevfsError::NotFound { .. })
        ));
        // Pseudo-directories are not nodes
        assert!(matches!(
            registry.lookup("/dev"),
            Err(DevfsError::NotFound { .. })
        ));
        assert!(matches!(
            registry.lookup("/"),
            Err(DevfsError::NotFound { .. })
        ));
        assert_eq!(registry.refs("/dev/mtd0"), Some(0));
    }

    #[test]
    fn test_unregister_busy_then_ok() {
        let registry = registry();
        registry.register("/dev/mtd0", mock::mtd()).unwrap();

        let node = registry.lookup("/dev/mtd0").unwrap();
        assert_eq!(
            registry.unregister("/dev/mtd0"),
            Err(DevfsError::Busy {
                path: "/dev/mtd0".to_string(),
                refs: 1
            })
        );
        assert!(registry.contains("/dev/mtd0"));

        drop(node);
        registry.unregister("/dev/mtd0").unwrap();
        assert!(!registry.contains("/dev/mtd0"));
        assert!(registry.is_empty());
        assert!(matches!(
            registry.unregister("/dev/mtd0"),
            Err(DevfsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unregister_prunes_empty_directories() {
        let registry = registry();
        registry.register("/dev/mtd/flash0", mock::mtd()).unwrap();
        registry.register("/dev/sda", mock::block()).unwrap();

        registry.unregister("/dev/mtd/flash0").unwrap();

        let names: Vec<String> = registry
            .list("/dev")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["sda"]);
        assert!(matches!(
            registry.list("/dev/mtd"),
            Err(DevfsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_node_and_children_coexist() {
        let registry = registry();
        registry.register("/dev/mtd", mock::mtd()).unwrap();
        registry.register("/dev/mtd/part0", mock::mtd()).unwrap();

        registry.unregister("/dev/mtd").unwrap();
        assert!(registry.contains("/dev/mtd/part0"));
        assert!(!registry.contains("/dev/mtd"));

        let listing = registry.list("/dev").unwrap();
        assert_eq!(
            listing,
            [DirEntry {
                name: "mtd".to_string(),
                capability: None,
                has_children: true,
            }]
        );
    }

    #[test]
    fn test_list_sorted_with_capabilities() {
        let registry = registry();
        registry.register("/dev/ttyS0", mock::char()).unwrap();
        registry.register("/dev/mtd0", mock::mtd()).unwrap();
        registry.register("/dev/sda", mock::block()).unwrap();

        let listing = registry.list("/dev").unwrap();
        let summary: Vec<(&str, Option<Capability>)> = listing
            .iter()
            .map(|e| (e.name.as_str(), e.capability))
            .collect();
        assert_eq!(
            summary,
            [
                ("mtd0", Some(Capability::Mtd)),
                ("sda", Some(Capability::Block)),
                ("ttyS0", Some(Capability::Character)),
            ]
        );

        let root = registry.list("/").unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name, "dev");
    }

    #[test]
    fn test_registry_full() {
        let registry = NodeRegistry::new(RegistryConfig {
            max_nodes: 2,
            ..RegistryConfig::default()
        });
        registry.register("/dev/a", mock::char()).unwrap();
        registry.register("/dev/b", mock::char()).unwrap();

        assert_eq!(
            registry.register("/dev/c", mock::char()).unwrap_err(),
            DevfsError::RegistryFull { capacity: 2 }
        );
        // Failed registration leaves no pseudo-directory behind
        assert!(registry.list("/dev").unwrap().iter().all(|e| e.name != "c"));

        registry.unregister("/dev/a").unwrap();
        registry.register("/dev/c", mock::char()).unwrap();
    }

    #[test]
    fn test_path_limits() {
        let registry = NodeRegistry::new(RegistryConfig {
            max_path_len: 16,
            max_name_len: 8,
            ..RegistryConfig::default()
        });

        assert!(matches!(
            registry.register("/d/averylongname", mock::char()),
            Err(DevfsError::PathTooLong { limit: 8, .. })
        ));
        assert!(matches!(
            registry.register("/dev/abcdef/ghijkl", mock::char()),
            Err(DevfsError::PathTooLong { limit: 16, .. })
        ));
        assert!(matches!(
            registry.register("/", mock::char()),
            Err(DevfsError::InvalidPath { .. })
        ));
        assert!(matches!(
            registry.register("dev/x", mock::char()),
            Err(DevfsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_lookup_or_insert_with() {
        let registry = registry();
        let path = registry.canonicalize("/var/mqueue/jobs").unwrap();

        let created = registry
            .lookup_or_insert_with(&path, mock::mqueue)
            .unwrap();
        assert_eq!(created.capability(), Capability::MessageQueue);
        assert_eq!(registry.refs("/var/mqueue/jobs"), Some(1));

        let existing = registry
            .lookup_or_insert_with(&path, || panic!("must not create twice"))
            .unwrap();
        assert!(existing.ptr_eq(&created));
        assert_eq!(registry.refs("/var/mqueue/jobs"), Some(2));

        drop(created);
        drop(existing);
        assert_eq!(registry.refs("/var/mqueue/jobs"), Some(0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_global_registry() {
        let first = init_global(RegistryConfig::default());
        let second = init_global(RegistryConfig {
            max_nodes: 1,
            ..RegistryConfig::default()
        });

        assert!(core::ptr::eq(first, second));
        assert_eq!(first.config().max_nodes, MAX_NODES);
        assert!(global().is_some_and(|g| core::ptr::eq(g, first)));
    }
}
